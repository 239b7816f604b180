//! Document-store client abstraction and implementations.
//!
//! The engine talks to the backend through the [`DocumentStore`] trait:
//! queries with a source hint, single-commit batch apply, and versioned
//! snapshot reads with conditional commit for optimistic transactions.
//!
//! Implementations:
//! - [`MemoryStore`] - in-memory store with fault injection, the test double
//! - [`OfflineStore`] - LMDB-backed offline mirror wrapping another store

mod document_store;
mod memory_store;
mod offline_store;
mod source_selector;

pub use document_store::{
    DocumentStore, ReadSource, Result, StoreError, TransactionSnapshot, WriteOp, WriteSet,
    PROVIDER_MAX_BATCH_SIZE,
};
pub use memory_store::MemoryStore;
pub use offline_store::OfflineStore;
pub use source_selector::{ReadOutcome, SourceSelector};
