//! Validation of composite-index coverage for observed queries.
//!
//! The backend can only serve a multi-field query from a matching composite
//! index; a missing index fails the query at request time with a provider
//! error. This validator is the proactive side: collect the query shapes
//! the application issues, compare against the provisioned indexes, and
//! report the gaps before they are hit in production. It never gates
//! queries at runtime.

use std::sync::Mutex;

use serde::{Deserialize, Serialize};

use crate::query::{QuerySpec, SortDirection};

// =============================================================================
// IndexSpec
// =============================================================================

/// Field direction within a composite index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum IndexOrder {
    Ascending,
    Descending,
}

impl From<SortDirection> for IndexOrder {
    fn from(direction: SortDirection) -> Self {
        match direction {
            SortDirection::Ascending => IndexOrder::Ascending,
            SortDirection::Descending => IndexOrder::Descending,
        }
    }
}

/// One field of a composite index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexField {
    pub path: String,
    pub order: IndexOrder,
}

impl IndexField {
    pub fn asc(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            order: IndexOrder::Ascending,
        }
    }

    pub fn desc(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            order: IndexOrder::Descending,
        }
    }
}

/// A composite index over one collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexSpec {
    pub collection: String,
    pub fields: Vec<IndexField>,
}

impl IndexSpec {
    pub fn new(collection: impl Into<String>, fields: Vec<IndexField>) -> Self {
        Self {
            collection: collection.into(),
            fields,
        }
    }

    /// The composite index `query` needs, or `None` when the query touches
    /// at most one field and is served by the backend's automatic
    /// single-field indexes.
    ///
    /// Field order follows the backend's requirement: equality fields
    /// first (ascending), then range fields, then sort fields not already
    /// covered.
    pub fn for_query(query: &QuerySpec) -> Option<IndexSpec> {
        let mut fields: Vec<IndexField> = Vec::new();

        for field in query.equality_fields() {
            if !fields.iter().any(|f| f.path == field) {
                fields.push(IndexField::asc(field));
            }
        }
        for field in query.range_fields() {
            if !fields.iter().any(|f| f.path == field) {
                fields.push(IndexField::asc(field));
            }
        }
        for clause in &query.order_by {
            if !fields.iter().any(|f| f.path == clause.field) {
                fields.push(IndexField {
                    path: clause.field.clone(),
                    order: clause.direction.into(),
                });
            }
        }

        if fields.len() <= 1 {
            return None;
        }
        Some(IndexSpec::new(query.collection.clone(), fields))
    }
}

// =============================================================================
// IndexReport
// =============================================================================

/// The result of an index coverage check.
#[derive(Debug, Clone, Serialize)]
pub struct IndexReport {
    pub all_indexes_present: bool,
    pub missing_indexes: Vec<IndexSpec>,
}

// =============================================================================
// IndexCoverageValidator
// =============================================================================

/// Collects query shapes and diffs their index requirements against the
/// provisioned set.
pub struct IndexCoverageValidator {
    provisioned: Vec<IndexSpec>,
    observed: Mutex<Vec<IndexSpec>>,
}

impl IndexCoverageValidator {
    /// Create a validator aware of the indexes provisioned on the backend.
    pub fn new(provisioned: Vec<IndexSpec>) -> Self {
        Self {
            provisioned,
            observed: Mutex::new(Vec::new()),
        }
    }

    /// Record the shape of a query the application issued.
    pub fn record_query(&self, query: &QuerySpec) {
        if let Some(required) = IndexSpec::for_query(query) {
            let mut observed = self.observed.lock().unwrap();
            if !observed.contains(&required) {
                observed.push(required);
            }
        }
    }

    /// Number of distinct composite-index requirements observed so far.
    pub fn observed_count(&self) -> usize {
        self.observed.lock().unwrap().len()
    }

    /// Compare observed requirements against the provisioned set.
    pub fn validate(&self) -> IndexReport {
        let observed = self.observed.lock().unwrap();
        let missing_indexes: Vec<IndexSpec> = observed
            .iter()
            .filter(|required| !self.provisioned.contains(required))
            .cloned()
            .collect();

        IndexReport {
            all_indexes_present: missing_indexes.is_empty(),
            missing_indexes,
        }
    }
}
