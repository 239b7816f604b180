//! Provider-agnostic query specification.

use serde::{Deserialize, Serialize};
use serde_json::Value;

// =============================================================================
// FilterOp
// =============================================================================

/// A comparison operator applied to a single document field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FilterOp {
    /// Field equals the value.
    Eq,
    /// Field is strictly greater than the value.
    Gt,
    /// Field is greater than or equal to the value.
    Gte,
    /// Field is strictly less than the value.
    Lt,
    /// Field is less than or equal to the value.
    Lte,
    /// Field is an array containing the value.
    ArrayContains,
}

impl FilterOp {
    /// Whether this operator is an equality-style operator for index
    /// ordering purposes. Everything else is a range operator.
    pub fn is_equality(self) -> bool {
        matches!(self, FilterOp::Eq | FilterOp::ArrayContains)
    }
}

// =============================================================================
// FieldFilter
// =============================================================================

/// A single conjunctive predicate on a document field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldFilter {
    pub field: String,
    pub op: FilterOp,
    pub value: Value,
}

impl FieldFilter {
    pub fn new(field: impl Into<String>, op: FilterOp, value: impl Into<Value>) -> Self {
        Self {
            field: field.into(),
            op,
            value: value.into(),
        }
    }
}

// =============================================================================
// OrderBy
// =============================================================================

/// Sort direction for an order-by clause.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SortDirection {
    Ascending,
    Descending,
}

/// A single sort clause.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OrderBy {
    pub field: String,
    pub direction: SortDirection,
}

impl OrderBy {
    pub fn asc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: SortDirection::Ascending,
        }
    }

    pub fn desc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: SortDirection::Descending,
        }
    }
}

// =============================================================================
// QuerySpec
// =============================================================================

/// A complete query against one store collection.
///
/// Filters combine conjunctively. Filter ordering matters to the provider:
/// equality filters must precede range filters, and the first sort clause
/// must be on the range field when one exists. The builders in
/// [`super::builder`] produce specs that respect this; hand-built specs are
/// the caller's responsibility.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuerySpec {
    /// Name of the collection being queried.
    pub collection: String,
    /// Conjunctive field predicates, equality filters first.
    pub filters: Vec<FieldFilter>,
    /// Sort clauses, applied in order.
    pub order_by: Vec<OrderBy>,
    /// Maximum number of documents to return.
    pub limit: Option<usize>,
    /// Number of matching documents to skip before returning results.
    pub offset: Option<usize>,
}

impl QuerySpec {
    /// Create an empty query over `collection`.
    pub fn new(collection: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            filters: Vec::new(),
            order_by: Vec::new(),
            limit: None,
            offset: None,
        }
    }

    /// Append a filter.
    pub fn filter(mut self, field: impl Into<String>, op: FilterOp, value: impl Into<Value>) -> Self {
        self.filters.push(FieldFilter::new(field, op, value));
        self
    }

    /// Append a sort clause.
    pub fn order(mut self, order: OrderBy) -> Self {
        self.order_by.push(order);
        self
    }

    /// Set the result limit.
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Set the result offset.
    pub fn offset(mut self, offset: usize) -> Self {
        self.offset = Some(offset);
        self
    }

    /// Fields constrained by equality filters, in filter order.
    pub fn equality_fields(&self) -> Vec<&str> {
        self.filters
            .iter()
            .filter(|f| f.op.is_equality())
            .map(|f| f.field.as_str())
            .collect()
    }

    /// Fields constrained by range filters, in filter order, deduplicated.
    pub fn range_fields(&self) -> Vec<&str> {
        let mut fields: Vec<&str> = Vec::new();
        for filter in &self.filters {
            if !filter.op.is_equality() && !fields.contains(&filter.field.as_str()) {
                fields.push(filter.field.as_str());
            }
        }
        fields
    }

    /// The collection tag used for cache invalidation.
    pub fn cache_tag(&self) -> &str {
        &self.collection
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_equality_and_range_fields() {
        let spec = QuerySpec::new("items")
            .filter("userId", FilterOp::Eq, "u1")
            .filter("isFavorite", FilterOp::Eq, true)
            .filter("rating", FilterOp::Gte, 3.0)
            .filter("rating", FilterOp::Lt, 5.0)
            .order(OrderBy::desc("rating"));

        assert_eq!(spec.equality_fields(), vec!["userId", "isFavorite"]);
        assert_eq!(spec.range_fields(), vec!["rating"]);
    }

    #[test]
    fn test_builder_style_chaining() {
        let spec = QuerySpec::new("collections").limit(20).offset(40);
        assert_eq!(spec.limit, Some(20));
        assert_eq!(spec.offset, Some(40));
        assert!(spec.filters.is_empty());
    }
}
