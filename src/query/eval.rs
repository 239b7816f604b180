//! Local evaluation of query specs against JSON documents.
//!
//! The in-memory store and the LMDB offline mirror both answer queries by
//! filtering documents locally. Comparison semantics follow the backend:
//! scalars of the same JSON type compare naturally; mismatched or
//! non-comparable types never match a range filter.

use std::cmp::Ordering;

use serde_json::Value;

use crate::model::Document;

use super::spec::{FieldFilter, FilterOp, QuerySpec, SortDirection};

/// Compare two JSON scalars, if they are comparable.
///
/// Numbers compare numerically, strings lexicographically (which covers
/// RFC 3339 timestamps), booleans as false < true. Anything else is
/// incomparable.
fn compare_values(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => {
            let x = x.as_f64()?;
            let y = y.as_f64()?;
            x.partial_cmp(&y)
        }
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

fn matches_filter(filter: &FieldFilter, data: &Value) -> bool {
    let field_value = match data.get(&filter.field) {
        Some(v) => v,
        // Missing fields match nothing, mirroring the provider's sparse
        // index behavior.
        None => return false,
    };

    match filter.op {
        FilterOp::Eq => field_value == &filter.value,
        FilterOp::Gt => compare_values(field_value, &filter.value) == Some(Ordering::Greater),
        FilterOp::Gte => matches!(
            compare_values(field_value, &filter.value),
            Some(Ordering::Greater) | Some(Ordering::Equal)
        ),
        FilterOp::Lt => compare_values(field_value, &filter.value) == Some(Ordering::Less),
        FilterOp::Lte => matches!(
            compare_values(field_value, &filter.value),
            Some(Ordering::Less) | Some(Ordering::Equal)
        ),
        FilterOp::ArrayContains => field_value
            .as_array()
            .is_some_and(|arr| arr.contains(&filter.value)),
    }
}

/// Whether a document payload satisfies every filter of `spec`.
pub fn matches_document(spec: &QuerySpec, data: &Value) -> bool {
    spec.filters.iter().all(|f| matches_filter(f, data))
}

/// Apply `spec` to a set of candidate documents: filter, sort, offset, limit.
pub fn apply_query(spec: &QuerySpec, documents: Vec<Document>) -> Vec<Document> {
    let mut matched: Vec<Document> = documents
        .into_iter()
        .filter(|doc| matches_document(spec, &doc.data))
        .collect();

    if !spec.order_by.is_empty() {
        matched.sort_by(|a, b| {
            for clause in &spec.order_by {
                let av = a.data.get(&clause.field).unwrap_or(&Value::Null);
                let bv = b.data.get(&clause.field).unwrap_or(&Value::Null);
                let ord = compare_values(av, bv).unwrap_or(Ordering::Equal);
                let ord = match clause.direction {
                    SortDirection::Ascending => ord,
                    SortDirection::Descending => ord.reverse(),
                };
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            // Stable tiebreak on document id.
            a.reference.id.cmp(&b.reference.id)
        });
    }

    let offset = spec.offset.unwrap_or(0);
    let mut result: Vec<Document> = matched.into_iter().skip(offset).collect();
    if let Some(limit) = spec.limit {
        result.truncate(limit);
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::DocumentRef;
    use crate::query::spec::OrderBy;
    use serde_json::json;

    fn doc(id: &str, data: Value) -> Document {
        Document::new(DocumentRef::new("items", id), data)
    }

    #[test]
    fn test_equality_filter() {
        let spec = QuerySpec::new("items").filter("userId", FilterOp::Eq, "u1");
        assert!(matches_document(&spec, &json!({"userId": "u1"})));
        assert!(!matches_document(&spec, &json!({"userId": "u2"})));
        assert!(!matches_document(&spec, &json!({})));
    }

    #[test]
    fn test_range_filters_on_numbers() {
        let spec = QuerySpec::new("items")
            .filter("rating", FilterOp::Gte, 3.0)
            .filter("rating", FilterOp::Lt, 5.0);

        assert!(matches_document(&spec, &json!({"rating": 3.0})));
        assert!(matches_document(&spec, &json!({"rating": 4.9})));
        assert!(!matches_document(&spec, &json!({"rating": 5.0})));
        assert!(!matches_document(&spec, &json!({"rating": 2.0})));
        // Type mismatch never matches a range filter.
        assert!(!matches_document(&spec, &json!({"rating": "high"})));
    }

    #[test]
    fn test_string_prefix_range() {
        let spec = QuerySpec::new("items")
            .filter("name", FilterOp::Gte, "Cha")
            .filter("name", FilterOp::Lt, format!("Cha{}", '\u{f8ff}'));

        assert!(matches_document(&spec, &json!({"name": "Chablis"})));
        assert!(matches_document(&spec, &json!({"name": "Cha"})));
        assert!(!matches_document(&spec, &json!({"name": "Burgundy"})));
        assert!(!matches_document(&spec, &json!({"name": "chablis"})));
    }

    #[test]
    fn test_array_contains() {
        let spec = QuerySpec::new("items").filter("tags", FilterOp::ArrayContains, "red");
        assert!(matches_document(&spec, &json!({"tags": ["red", "dry"]})));
        assert!(!matches_document(&spec, &json!({"tags": ["white"]})));
        assert!(!matches_document(&spec, &json!({"tags": "red"})));
    }

    #[test]
    fn test_apply_sorts_offsets_and_limits() {
        let docs = vec![
            doc("a", json!({"rating": 2.0})),
            doc("b", json!({"rating": 5.0})),
            doc("c", json!({"rating": 4.0})),
            doc("d", json!({"rating": 3.0})),
        ];

        let spec = QuerySpec::new("items")
            .order(OrderBy::desc("rating"))
            .offset(1)
            .limit(2);

        let result = apply_query(&spec, docs);
        let ids: Vec<&str> = result.iter().map(|d| d.reference.id.as_str()).collect();
        assert_eq!(ids, vec!["c", "d"]);
    }

    #[test]
    fn test_apply_is_deterministic_on_ties() {
        let docs = vec![
            doc("b", json!({"rating": 1.0})),
            doc("a", json!({"rating": 1.0})),
        ];
        let spec = QuerySpec::new("items").order(OrderBy::asc("rating"));
        let result = apply_query(&spec, docs);
        let ids: Vec<&str> = result.iter().map(|d| d.reference.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
    }
}
