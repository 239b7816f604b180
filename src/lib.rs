//! favstore-rs - A batching, caching, and query-optimization engine for
//! document stores.

pub mod batch;
pub mod cache;
pub mod config;
pub mod engine;
pub mod index;
pub mod model;
pub mod perf;
pub mod query;
pub mod store;

pub use engine::{StoreEngine, StoreEngineBuilder};

pub use batch::{BatchExecutor, BatchReport, BatchWriteOperation, CancelFlag, TransactionRunner};
pub use cache::QueryCache;
pub use index::{IndexCoverageValidator, IndexReport, IndexSpec};
pub use model::{CollectionRecord, Document, DocumentRef, ItemRecord, TemplateRecord};
pub use perf::{PerformanceMonitor, PerformanceSummary};
pub use query::{
    optimized_collection_query, optimized_items_query, optimized_template_query, QuerySpec,
};
pub use store::{DocumentStore, MemoryStore, OfflineStore, ReadSource, StoreError};
