//! Batched writes/reads and atomic transactions.
//!
//! The [`BatchExecutor`] trades atomicity for throughput: operations are
//! committed in provider-sized chunks and a failed chunk never rolls back
//! earlier ones. Callers that need all-or-nothing semantics across
//! documents use the [`TransactionRunner`] instead.

mod executor;
mod transaction;

pub use executor::{
    BatchExecutor, BatchReport, BatchWriteOperation, CancelFlag, FailedOperation,
};
pub use transaction::{TransactionReport, TransactionRunner, DEFAULT_MAX_TRANSACTION_ATTEMPTS};

use crate::model::DocumentRef;
use crate::store::StoreError;

/// Errors from batch and transaction operations.
#[derive(Debug, thiserror::Error)]
pub enum BatchError {
    /// The store failed outright (connectivity, backend).
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// A transaction kept hitting contention and gave up.
    #[error("transaction failed after {attempts} attempts: {source}")]
    RetriesExhausted {
        attempts: u32,
        #[source]
        source: StoreError,
    },

    /// A transaction body decided to abort.
    #[error("transaction aborted: {0}")]
    Aborted(String),

    /// A batch read reference failed to resolve.
    #[error("unresolved reference: {0}")]
    Unresolved(DocumentRef),
}

/// Result type for batch operations.
pub type Result<T> = std::result::Result<T, BatchError>;
