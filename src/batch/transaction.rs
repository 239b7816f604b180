//! Atomic multi-document transactions with bounded retry.

use std::collections::BTreeSet;
use std::sync::Arc;

use tracing::warn;

use crate::model::DocumentRef;
use crate::store::{DocumentStore, StoreError, TransactionSnapshot, WriteSet};

use super::{BatchError, Result};

/// Default ceiling on transaction attempts.
pub const DEFAULT_MAX_TRANSACTION_ATTEMPTS: u32 = 5;

/// Outcome of a committed transaction.
#[derive(Debug)]
pub struct TransactionReport<T> {
    /// The value produced by the transaction body.
    pub value: T,
    /// Collections touched by the committed write set, for cache
    /// invalidation.
    pub affected_collections: BTreeSet<String>,
    /// How many attempts it took, including the successful one.
    pub attempts: u32,
}

/// Runs optimistic transactions against the store.
///
/// The body is a pure function from the snapshot read-state to a write set:
/// it must not perform side effects outside the returned [`WriteSet`],
/// because contention re-runs it from scratch against a fresh snapshot.
/// Either every write in the committed set becomes visible or none do.
pub struct TransactionRunner {
    store: Arc<dyn DocumentStore>,
    max_attempts: u32,
}

impl TransactionRunner {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self {
            store,
            max_attempts: DEFAULT_MAX_TRANSACTION_ATTEMPTS,
        }
    }

    /// Override the retry ceiling.
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    /// Execute `body` atomically over the documents in `reads`.
    ///
    /// Retries the whole snapshot-body-commit cycle on
    /// [`StoreError::Contention`] up to the attempt ceiling, then fails
    /// with [`BatchError::RetriesExhausted`]. Any other error is surfaced
    /// immediately.
    pub async fn atomic_transaction<T, F>(
        &self,
        reads: &[DocumentRef],
        body: F,
    ) -> Result<TransactionReport<T>>
    where
        F: Fn(&TransactionSnapshot) -> Result<(WriteSet, T)>,
    {
        let mut last_contention: Option<StoreError> = None;

        for attempt in 1..=self.max_attempts {
            let snapshot = self.store.snapshot(reads).await?;
            let (writes, value) = body(&snapshot)?;

            match self.store.commit_transaction(&snapshot, &writes).await {
                Ok(()) => {
                    let affected_collections = writes
                        .ops()
                        .iter()
                        .map(|op| op.reference().collection.clone())
                        .collect();
                    return Ok(TransactionReport {
                        value,
                        affected_collections,
                        attempts: attempt,
                    });
                }
                Err(e @ StoreError::Contention(_)) => {
                    warn!(attempt, error = %e, "transaction contention, retrying");
                    last_contention = Some(e);
                }
                Err(e) => return Err(BatchError::Store(e)),
            }
        }

        Err(BatchError::RetriesExhausted {
            attempts: self.max_attempts,
            source: last_contention
                .unwrap_or_else(|| StoreError::Contention("unknown conflict".to_string())),
        })
    }
}
