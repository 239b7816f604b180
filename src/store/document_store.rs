//! The document-store client trait and its supporting types.

use async_trait::async_trait;
use serde_json::Value;

use crate::model::{Document, DocumentRef};
use crate::query::QuerySpec;

/// The provider's hard cap on operations per batch commit.
pub const PROVIDER_MAX_BATCH_SIZE: usize = 500;

// =============================================================================
// Error Types
// =============================================================================

/// Errors surfaced by document-store implementations.
///
/// Connectivity errors ([`Unavailable`](StoreError::Unavailable),
/// [`Timeout`](StoreError::Timeout)) pass through to callers unchanged;
/// the only automatic recovery is the source selector's server-to-cache
/// fallback.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The backend could not be reached.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// The backend did not answer in time.
    #[error("store timed out: {0}")]
    Timeout(String),

    /// A referenced document does not exist.
    #[error("document not found: {0}")]
    NotFound(DocumentRef),

    /// An optimistic-concurrency conflict. Transactions retry on this.
    #[error("transaction contention: {0}")]
    Contention(String),

    /// The query requires a composite index that is not provisioned.
    #[error("missing composite index: {0}")]
    MissingIndex(String),

    /// Any other backend failure.
    #[error("backend error: {0}")]
    Backend(String),
}

impl StoreError {
    /// Whether this error is a connectivity failure eligible for the
    /// server-to-cache fallback.
    pub fn is_connectivity(&self) -> bool {
        matches!(self, StoreError::Unavailable(_) | StoreError::Timeout(_))
    }
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

// =============================================================================
// WriteOp
// =============================================================================

/// A single provider-level write.
///
/// `Update` of a missing document fails the commit it is part of with
/// [`StoreError::NotFound`]; `Create` overwrites unconditionally.
#[derive(Debug, Clone, PartialEq)]
pub enum WriteOp {
    Create { reference: DocumentRef, data: Value },
    Update { reference: DocumentRef, data: Value },
    Delete { reference: DocumentRef },
}

impl WriteOp {
    /// The document this operation targets.
    pub fn reference(&self) -> &DocumentRef {
        match self {
            WriteOp::Create { reference, .. } => reference,
            WriteOp::Update { reference, .. } => reference,
            WriteOp::Delete { reference } => reference,
        }
    }
}

// =============================================================================
// Transactions
// =============================================================================

/// A versioned snapshot of a transaction's read set.
///
/// Version numbers are provider-internal; a document that does not exist
/// reads as version 0 with no data. The snapshot is the sole input to a
/// transaction body, which makes the body a pure function from read-state
/// to write-set and therefore safe to re-run on contention.
#[derive(Debug, Clone)]
pub struct TransactionSnapshot {
    reads: Vec<(DocumentRef, u64, Option<Document>)>,
}

impl TransactionSnapshot {
    /// Build a snapshot from (reference, version, document) triples.
    pub fn new(reads: Vec<(DocumentRef, u64, Option<Document>)>) -> Self {
        Self { reads }
    }

    /// The document read for `reference`, if it existed at snapshot time.
    pub fn get(&self, reference: &DocumentRef) -> Option<&Document> {
        self.reads
            .iter()
            .find(|(r, _, _)| r == reference)
            .and_then(|(_, _, doc)| doc.as_ref())
    }

    /// The (reference, version) pairs the commit must validate against.
    pub fn versions(&self) -> impl Iterator<Item = (&DocumentRef, u64)> {
        self.reads.iter().map(|(r, v, _)| (r, *v))
    }

    /// Number of documents in the read set.
    pub fn len(&self) -> usize {
        self.reads.len()
    }

    /// Whether the read set is empty.
    pub fn is_empty(&self) -> bool {
        self.reads.is_empty()
    }
}

/// The write set produced by a transaction body.
#[derive(Debug, Clone, Default)]
pub struct WriteSet {
    ops: Vec<WriteOp>,
}

impl WriteSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stage a create/overwrite of `reference`.
    pub fn create(&mut self, reference: DocumentRef, data: Value) -> &mut Self {
        self.ops.push(WriteOp::Create { reference, data });
        self
    }

    /// Stage an update of an existing document.
    pub fn update(&mut self, reference: DocumentRef, data: Value) -> &mut Self {
        self.ops.push(WriteOp::Update { reference, data });
        self
    }

    /// Stage a delete.
    pub fn delete(&mut self, reference: DocumentRef) -> &mut Self {
        self.ops.push(WriteOp::Delete { reference });
        self
    }

    /// The staged operations, in order.
    pub fn ops(&self) -> &[WriteOp] {
        &self.ops
    }

    /// Whether anything was staged.
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }
}

// =============================================================================
// ReadSource
// =============================================================================

/// Which data source a read should use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReadSource {
    /// Let the provider decide (usually server, falling back internally).
    #[default]
    Default,
    /// Force a network round trip.
    Server,
    /// Force the local persisted cache, if enabled.
    Cache,
}

// =============================================================================
// DocumentStore Trait
// =============================================================================

/// The document-store client interface.
///
/// All operations are async and safe for concurrent use from many callers;
/// the connection itself is owned by the implementation.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Execute a query and return the matching documents.
    async fn get_documents(&self, query: &QuerySpec, source: ReadSource) -> Result<Vec<Document>>;

    /// Fetch a single document, `None` if it does not exist.
    async fn get_document(
        &self,
        reference: &DocumentRef,
        source: ReadSource,
    ) -> Result<Option<Document>>;

    /// Commit a batch of writes as one provider commit.
    ///
    /// The batch executor enforces the chunk limit; a commit either applies
    /// every operation or none of them.
    async fn commit(&self, ops: &[WriteOp]) -> Result<()>;

    /// Take a versioned snapshot of a transaction's read set.
    async fn snapshot(&self, reads: &[DocumentRef]) -> Result<TransactionSnapshot>;

    /// Atomically apply a write set, provided no document in the snapshot's
    /// read set changed since the snapshot was taken. Fails with
    /// [`StoreError::Contention`] otherwise.
    async fn commit_transaction(
        &self,
        snapshot: &TransactionSnapshot,
        writes: &WriteSet,
    ) -> Result<()>;

    /// The provider's maximum number of operations per batch commit.
    fn max_batch_size(&self) -> usize {
        PROVIDER_MAX_BATCH_SIZE
    }
}
