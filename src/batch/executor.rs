//! Chunked batch writes and parallel batch reads.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures::future::join_all;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::model::{decode_document, DocumentRef};
use crate::store::{DocumentStore, ReadSource, WriteOp};

use super::Result;

// =============================================================================
// CancelFlag
// =============================================================================

/// Cooperative cancellation for long-running batches.
///
/// Checked between chunks: cancelling stops further commits but never rolls
/// back chunks already committed.
#[derive(Clone, Default)]
pub struct CancelFlag {
    cancelled: Arc<AtomicBool>,
}

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// Whether cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

// =============================================================================
// BatchWriteOperation
// =============================================================================

/// A caller-constructed write operation, consumed exactly once by
/// [`BatchExecutor::batch_write`].
///
/// Records are serialized eagerly at construction; a record that fails to
/// encode poisons only its own operation, which is reported in the failure
/// list without aborting the rest of the batch.
#[derive(Debug, Clone)]
pub struct BatchWriteOperation {
    reference: DocumentRef,
    kind: OperationKind,
}

#[derive(Debug, Clone)]
enum OperationKind {
    Create(std::result::Result<Value, String>),
    Update(std::result::Result<Value, String>),
    Delete,
}

impl BatchWriteOperation {
    /// Create (or overwrite) `reference` with `record`.
    pub fn create<T: Serialize>(reference: DocumentRef, record: &T) -> Self {
        Self {
            reference,
            kind: OperationKind::Create(encode(record)),
        }
    }

    /// Merge `record`'s fields into an existing document.
    pub fn update<T: Serialize>(reference: DocumentRef, record: &T) -> Self {
        Self {
            reference,
            kind: OperationKind::Update(encode(record)),
        }
    }

    /// Delete `reference`.
    pub fn delete(reference: DocumentRef) -> Self {
        Self {
            reference,
            kind: OperationKind::Delete,
        }
    }

    /// The document this operation targets.
    pub fn reference(&self) -> &DocumentRef {
        &self.reference
    }

    fn into_write_op(self) -> std::result::Result<WriteOp, (DocumentRef, String)> {
        let reference = self.reference;
        match self.kind {
            OperationKind::Create(Ok(data)) => Ok(WriteOp::Create { reference, data }),
            OperationKind::Update(Ok(data)) => Ok(WriteOp::Update { reference, data }),
            OperationKind::Delete => Ok(WriteOp::Delete { reference }),
            OperationKind::Create(Err(e)) | OperationKind::Update(Err(e)) => Err((reference, e)),
        }
    }
}

fn encode<T: Serialize>(record: &T) -> std::result::Result<Value, String> {
    serde_json::to_value(record).map_err(|e| e.to_string())
}

// =============================================================================
// BatchReport
// =============================================================================

/// One operation that did not make it into the store.
#[derive(Debug, Clone)]
pub struct FailedOperation {
    /// Index of the operation in the original list.
    pub index: usize,
    pub reference: DocumentRef,
    pub reason: String,
}

/// Aggregated outcome of a batch write.
///
/// `succeeded + failed.len()` always equals the number of submitted
/// operations. Failed chunks never roll back earlier ones.
#[derive(Debug, Clone, Default)]
pub struct BatchReport {
    pub succeeded: usize,
    pub failed: Vec<FailedOperation>,
    /// Number of chunk commits that were applied.
    pub chunks_committed: usize,
    /// Collections touched by committed chunks, for cache invalidation.
    pub affected_collections: BTreeSet<String>,
}

impl BatchReport {
    /// Whether every operation succeeded.
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }

    /// Total operations accounted for.
    pub fn total(&self) -> usize {
        self.succeeded + self.failed.len()
    }
}

// =============================================================================
// BatchExecutor
// =============================================================================

/// Executes grouped writes and reads against the store.
pub struct BatchExecutor {
    store: Arc<dyn DocumentStore>,
    max_batch_size: usize,
}

impl BatchExecutor {
    /// Create an executor using the store's own batch-size limit.
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        let max_batch_size = store.max_batch_size();
        Self {
            store,
            max_batch_size,
        }
    }

    /// Override the chunk size (must not exceed the provider's limit).
    pub fn with_max_batch_size(mut self, max_batch_size: usize) -> Self {
        self.max_batch_size = max_batch_size.max(1);
        self
    }

    /// Write `operations` in chunks of at most the provider batch limit.
    ///
    /// Chunks are committed sequentially in list order. A failed chunk
    /// marks all of its operations failed and the remaining chunks are
    /// still attempted; committed chunks stay committed. Zero operations
    /// returns an empty successful report without touching the store.
    pub async fn batch_write(&self, operations: Vec<BatchWriteOperation>) -> Result<BatchReport> {
        self.batch_write_cancellable(operations, &CancelFlag::new())
            .await
    }

    /// [`batch_write`](Self::batch_write) with cooperative cancellation
    /// between chunks.
    pub async fn batch_write_cancellable(
        &self,
        operations: Vec<BatchWriteOperation>,
        cancel: &CancelFlag,
    ) -> Result<BatchReport> {
        let mut report = BatchReport::default();
        if operations.is_empty() {
            return Ok(report);
        }

        // Separate poisoned operations (encode failures) from writable ones,
        // keeping original indexes for the failure list.
        let mut writable: Vec<(usize, WriteOp)> = Vec::with_capacity(operations.len());
        for (index, op) in operations.into_iter().enumerate() {
            match op.into_write_op() {
                Ok(write_op) => writable.push((index, write_op)),
                Err((reference, reason)) => {
                    warn!(%reference, %reason, "skipping unserializable batch operation");
                    report.failed.push(FailedOperation {
                        index,
                        reference,
                        reason: format!("serialization failed: {reason}"),
                    });
                }
            }
        }

        let mut chunks = writable.chunks(self.max_batch_size);
        while let Some(chunk) = chunks.next() {
            if cancel.is_cancelled() {
                for (index, op) in chunk.iter().chain(chunks.by_ref().flatten()) {
                    report.failed.push(FailedOperation {
                        index: *index,
                        reference: op.reference().clone(),
                        reason: "batch cancelled".to_string(),
                    });
                }
                debug!(
                    committed = report.chunks_committed,
                    "batch write cancelled between chunks"
                );
                break;
            }

            let ops: Vec<WriteOp> = chunk.iter().map(|(_, op)| op.clone()).collect();
            match self.store.commit(&ops).await {
                Ok(()) => {
                    report.succeeded += ops.len();
                    report.chunks_committed += 1;
                    for op in &ops {
                        report
                            .affected_collections
                            .insert(op.reference().collection.clone());
                    }
                    debug!(
                        chunk_size = ops.len(),
                        committed = report.chunks_committed,
                        "batch chunk committed"
                    );
                }
                Err(e) => {
                    warn!(chunk_size = ops.len(), error = %e, "batch chunk failed");
                    let reason = e.to_string();
                    for (index, op) in chunk {
                        report.failed.push(FailedOperation {
                            index: *index,
                            reference: op.reference().clone(),
                            reason: reason.clone(),
                        });
                    }
                }
            }
        }

        report.failed.sort_by_key(|f| f.index);
        Ok(report)
    }

    /// Fetch `references` in parallel, chunked to the batch limit, and
    /// decode into `T`.
    ///
    /// References that do not resolve, or whose documents fail to decode,
    /// are omitted from the result; callers reconcile counts.
    pub async fn batch_read<T: DeserializeOwned>(
        &self,
        references: &[DocumentRef],
    ) -> Result<Vec<T>> {
        let mut records = Vec::with_capacity(references.len());

        for chunk in references.chunks(self.max_batch_size) {
            let reads = chunk
                .iter()
                .map(|r| self.store.get_document(r, ReadSource::Default));
            for read in join_all(reads).await {
                match read {
                    Ok(Some(doc)) => {
                        if let Ok(record) = decode_document::<T>(&doc) {
                            records.push(record);
                        }
                    }
                    Ok(None) => {}
                    Err(e) => {
                        // A single unresolved reference is omitted, matching
                        // the write-side isolation policy.
                        warn!(error = %e, "batch read reference failed");
                    }
                }
            }
        }

        Ok(records)
    }
}
