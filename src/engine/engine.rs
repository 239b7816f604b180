//! The store engine facade.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::de::DeserializeOwned;
use tracing::debug;

use crate::batch::{
    BatchError, BatchExecutor, BatchReport, BatchWriteOperation, CancelFlag, TransactionRunner,
};
use crate::cache::QueryCache;
use crate::config::EngineConfig;
use crate::index::{IndexCoverageValidator, IndexReport, IndexSpec};
use crate::model::{decode_documents, DocumentRef};
use crate::perf::{PerformanceMonitor, PerformanceSummary};
use crate::query::QuerySpec;
use crate::store::{
    DocumentStore, OfflineStore, ReadOutcome, ReadSource, SourceSelector, StoreError,
    TransactionSnapshot, WriteSet,
};

// =============================================================================
// Error Types
// =============================================================================

/// Errors surfaced by engine operations, wrapped with operation context.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// A store call failed.
    #[error("operation '{operation}' failed ({documents} documents): {source}")]
    Operation {
        operation: String,
        documents: usize,
        #[source]
        source: StoreError,
    },

    /// A batch or transaction failed.
    #[error("batch error: {0}")]
    Batch(#[from] BatchError),

    /// The offline mirror could not be opened.
    #[error("failed to open offline persistence: {0}")]
    Offline(#[source] StoreError),
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, EngineError>;

fn operation_context(
    operation: impl Into<String>,
    documents: usize,
) -> impl FnOnce(StoreError) -> EngineError {
    let operation = operation.into();
    move |source| EngineError::Operation {
        operation,
        documents,
        source,
    }
}

// =============================================================================
// StoreEngineBuilder
// =============================================================================

/// Builder for [`StoreEngine`].
pub struct StoreEngineBuilder {
    store: Arc<dyn DocumentStore>,
    config: EngineConfig,
    provisioned_indexes: Vec<IndexSpec>,
    offline_path: Option<PathBuf>,
}

impl StoreEngineBuilder {
    /// Start from a document-store client and default configuration.
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self {
            store,
            config: EngineConfig::default(),
            provisioned_indexes: Vec::new(),
            offline_path: None,
        }
    }

    /// Use an explicit configuration.
    pub fn with_config(mut self, config: EngineConfig) -> Self {
        if config.offline.enabled {
            self.offline_path = config.offline.path.clone();
        }
        self.config = config;
        self
    }

    /// Declare the composite indexes provisioned on the backend, for the
    /// index coverage validator.
    pub fn with_provisioned_indexes(mut self, indexes: Vec<IndexSpec>) -> Self {
        self.provisioned_indexes = indexes;
        self
    }

    /// Mirror reads and writes into an LMDB database at `path` so
    /// `ReadSource::Cache` keeps working without connectivity.
    pub fn enable_offline_persistence(mut self, path: impl Into<PathBuf>) -> Self {
        self.offline_path = Some(path.into());
        self
    }

    /// Build the engine.
    pub fn build(self) -> Result<StoreEngine> {
        let store: Arc<dyn DocumentStore> = match &self.offline_path {
            Some(path) => Arc::new(
                OfflineStore::open(self.store.clone(), path).map_err(EngineError::Offline)?,
            ),
            None => self.store,
        };

        Ok(StoreEngine::assemble(
            store,
            self.config,
            self.provisioned_indexes,
        ))
    }
}

// =============================================================================
// StoreEngine
// =============================================================================

/// The engine surface consumed by repository-layer callers.
///
/// Owns the query cache and the performance-sample log - the only mutable
/// shared state in the crate - and is safe to share across concurrent
/// callers behind an `Arc`.
pub struct StoreEngine {
    store: Arc<dyn DocumentStore>,
    executor: BatchExecutor,
    transactions: TransactionRunner,
    selector: SourceSelector,
    cache: QueryCache,
    cache_enabled: bool,
    monitor: Arc<PerformanceMonitor>,
    validator: IndexCoverageValidator,
}

impl StoreEngine {
    /// Shorthand for a default-configured engine over `store`.
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self::assemble(store, EngineConfig::default(), Vec::new())
    }

    fn assemble(
        store: Arc<dyn DocumentStore>,
        config: EngineConfig,
        provisioned_indexes: Vec<IndexSpec>,
    ) -> Self {
        let executor =
            BatchExecutor::new(store.clone()).with_max_batch_size(config.batch.max_batch_size);
        let transactions =
            TransactionRunner::new(store.clone()).with_max_attempts(config.transaction.max_attempts);
        let selector = SourceSelector::new(store.clone());
        let cache = QueryCache::with_settings(config.cache.max_entries, config.cache.default_ttl);

        Self {
            store,
            executor,
            transactions,
            selector,
            cache,
            cache_enabled: config.cache.enabled,
            monitor: Arc::new(PerformanceMonitor::new()),
            validator: IndexCoverageValidator::new(provisioned_indexes),
        }
    }

    // -------------------------------------------------------------------
    // Writes
    // -------------------------------------------------------------------

    /// Write operations in provider-sized chunks.
    ///
    /// Chunking trades atomicity for throughput: committed chunks stay
    /// committed when a later chunk fails. Successful writes invalidate
    /// every cache entry tagged with an affected collection.
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
        let started = Instant::now();
        let report = self
            .executor
            .batch_write_cancellable(operations, cancel)
            .await?;

        for collection in &report.affected_collections {
            self.cache.invalidate_collection(collection);
        }
        self.monitor
            .record_query("batch_write", started.elapsed(), report.succeeded, false);
        Ok(report)
    }

    /// Fetch and decode documents for `references`, omitting any that do
    /// not resolve.
    pub async fn batch_read<T: DeserializeOwned>(
        &self,
        references: &[DocumentRef],
    ) -> Result<Vec<T>> {
        let started = Instant::now();
        let records = self.executor.batch_read(references).await?;
        self.monitor
            .record_query("batch_read", started.elapsed(), records.len(), false);
        Ok(records)
    }

    /// Run `body` atomically over `reads` with bounded contention retry.
    ///
    /// `body` must be a pure function of the snapshot: it can run several
    /// times. Either all of its writes become visible or none do.
    pub async fn atomic_transaction<T, F>(&self, reads: &[DocumentRef], body: F) -> Result<T>
    where
        F: Fn(&TransactionSnapshot) -> std::result::Result<(WriteSet, T), BatchError>,
    {
        let started = Instant::now();
        let report = self.transactions.atomic_transaction(reads, body).await?;

        for collection in &report.affected_collections {
            self.cache.invalidate_collection(collection);
        }
        self.monitor
            .record_query("transaction", started.elapsed(), reads.len(), false);
        debug!(attempts = report.attempts, "transaction committed");
        Ok(report.value)
    }

    // -------------------------------------------------------------------
    // Reads
    // -------------------------------------------------------------------

    /// Execute `query`, memoizing the result under `cache_key` with the
    /// cache's default TTL.
    pub async fn execute_with_cache<T: DeserializeOwned>(
        &self,
        query: &QuerySpec,
        cache_key: &str,
    ) -> Result<Vec<T>> {
        self.execute_with_cache_ttl(query, cache_key, self.cache.default_ttl())
            .await
    }

    /// [`execute_with_cache`](Self::execute_with_cache) with an explicit
    /// TTL. A zero TTL makes every call a miss.
    ///
    /// The cache key must deterministically encode the query's identity;
    /// collisions between different queries are not detected here.
    pub async fn execute_with_cache_ttl<T: DeserializeOwned>(
        &self,
        query: &QuerySpec,
        cache_key: &str,
        ttl: Duration,
    ) -> Result<Vec<T>> {
        self.validator.record_query(query);
        let operation = format!("{}_query", query.collection);
        let started = Instant::now();

        if self.cache_enabled {
            if let Some(documents) = self.cache.get(cache_key) {
                let records = decode_documents(&documents);
                self.monitor
                    .record_query(&operation, started.elapsed(), documents.len(), true);
                debug!(cache_key, "query served from cache");
                return Ok(records);
            }
        }

        let outcome = self
            .selector
            .read(query, ReadSource::Default)
            .await
            .map_err(operation_context(&operation, 0))?;

        if self.cache_enabled {
            self.cache
                .put_with_ttl(cache_key, query.cache_tag(), outcome.documents.clone(), ttl);
        }
        self.monitor
            .record_query(&operation, started.elapsed(), outcome.documents.len(), false);
        Ok(decode_documents(&outcome.documents))
    }

    /// Execute `query` against the hinted source, bypassing the cache.
    ///
    /// Exposes the degraded flag from the server-to-cache fallback.
    pub async fn read_documents(
        &self,
        query: &QuerySpec,
        source: ReadSource,
    ) -> Result<ReadOutcome> {
        self.validator.record_query(query);
        let operation = format!("{}_query", query.collection);
        let started = Instant::now();

        let outcome = self
            .selector
            .read(query, source)
            .await
            .map_err(operation_context(&operation, 0))?;
        self.monitor.record_query(
            &operation,
            started.elapsed(),
            outcome.documents.len(),
            outcome.degraded,
        );
        Ok(outcome)
    }

    // -------------------------------------------------------------------
    // Diagnostics
    // -------------------------------------------------------------------

    /// Index coverage over every query shape seen so far.
    pub fn index_report(&self) -> IndexReport {
        self.validator.validate()
    }

    /// Aggregate performance statistics.
    pub fn performance_summary(&self) -> PerformanceSummary {
        self.monitor.summary()
    }

    /// The performance monitor, for direct sample inspection.
    pub fn monitor(&self) -> &PerformanceMonitor {
        &self.monitor
    }

    /// Number of live query-cache entries.
    pub fn cache_len(&self) -> usize {
        self.cache.len()
    }

    /// The underlying document store.
    pub fn store(&self) -> &Arc<dyn DocumentStore> {
        &self.store
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ItemRecord;
    use crate::query::{optimized_items_query, ItemFilters};
    use crate::store::MemoryStore;
    use chrono::Utc;
    use serde_json::json;
    use std::collections::BTreeMap;

    fn item(id: usize, user: &str, collection: &str, favorite: bool) -> ItemRecord {
        ItemRecord {
            id: format!("item-{id}"),
            user_id: user.to_string(),
            collection_id: collection.to_string(),
            name: format!("Item {id}"),
            description: None,
            image_urls: vec![],
            custom_fields: BTreeMap::new(),
            is_favorite: favorite,
            tags: vec![],
            location: None,
            rating: Some((id % 6) as f64),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn item_ref(id: usize) -> DocumentRef {
        DocumentRef::new("items", format!("item-{id}"))
    }

    fn create_op(record: &ItemRecord) -> BatchWriteOperation {
        BatchWriteOperation::create(DocumentRef::new("items", record.id.clone()), record)
    }

    fn engine_over_memory() -> (Arc<MemoryStore>, StoreEngine) {
        let store = Arc::new(MemoryStore::new());
        let engine = StoreEngine::new(store.clone());
        (store, engine)
    }

    #[tokio::test]
    async fn test_thousand_item_batch_write_meets_budget() {
        let (store, engine) = engine_over_memory();

        let ops: Vec<BatchWriteOperation> = (0..1000)
            .map(|i| create_op(&item(i, "u1", "c1", i % 2 == 0)))
            .collect();

        let started = Instant::now();
        let report = engine.batch_write(ops).await.unwrap();
        let elapsed = started.elapsed();

        assert_eq!(report.succeeded, 1000);
        assert!(report.is_complete());
        assert_eq!(store.commits(), 2); // ceil(1000/500)
        assert!(elapsed < Duration::from_secs(10));
        let throughput = 1000.0 / elapsed.as_secs_f64();
        assert!(throughput > 100.0, "throughput was {throughput:.0}/s");
    }

    #[tokio::test]
    async fn test_five_hundred_reference_batch_read() {
        let (_store, engine) = engine_over_memory();

        let ops: Vec<BatchWriteOperation> = (0..500)
            .map(|i| create_op(&item(i, "u1", "c1", false)))
            .collect();
        engine.batch_write(ops).await.unwrap();

        let references: Vec<DocumentRef> = (0..500).map(item_ref).collect();
        let started = Instant::now();
        let records: Vec<ItemRecord> = engine.batch_read(&references).await.unwrap();

        assert_eq!(records.len(), 500);
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_cache_hit_skips_the_store_and_is_recorded() {
        let (store, engine) = engine_over_memory();
        engine
            .batch_write(vec![create_op(&item(1, "u1", "c1", true))])
            .await
            .unwrap();

        let query = optimized_items_query("u1", None, None);
        let first: Vec<ItemRecord> = engine
            .execute_with_cache(&query, "items:u1:all")
            .await
            .unwrap();
        assert_eq!(first.len(), 1);

        // If the second call reaches the store it will fail; a cache hit
        // must not touch it.
        store.set_fail_server_reads(true);
        let second: Vec<ItemRecord> = engine
            .execute_with_cache(&query, "items:u1:all")
            .await
            .unwrap();
        assert_eq!(second.len(), 1);

        let samples = engine.monitor().samples_for("items_query");
        assert_eq!(samples.len(), 2);
        assert!(!samples[0].from_cache);
        assert!(samples[1].from_cache);
    }

    #[tokio::test]
    async fn test_write_invalidates_cached_queries_for_the_collection() {
        let (_store, engine) = engine_over_memory();
        engine
            .batch_write(vec![create_op(&item(1, "u1", "c1", true))])
            .await
            .unwrap();

        let query = optimized_items_query("u1", None, None);
        let before: Vec<ItemRecord> = engine
            .execute_with_cache(&query, "items:u1:all")
            .await
            .unwrap();
        assert_eq!(before.len(), 1);

        engine
            .batch_write(vec![create_op(&item(2, "u1", "c1", false))])
            .await
            .unwrap();

        // The same key must not serve stale pre-write data.
        let after: Vec<ItemRecord> = engine
            .execute_with_cache(&query, "items:u1:all")
            .await
            .unwrap();
        assert_eq!(after.len(), 2);
    }

    #[tokio::test]
    async fn test_zero_ttl_never_serves_cached_values() {
        let (_store, engine) = engine_over_memory();
        engine
            .batch_write(vec![create_op(&item(1, "u1", "c1", true))])
            .await
            .unwrap();

        let query = optimized_items_query("u1", None, None);
        for _ in 0..3 {
            let _: Vec<ItemRecord> = engine
                .execute_with_cache_ttl(&query, "items:u1:all", Duration::ZERO)
                .await
                .unwrap();
        }

        let samples = engine.monitor().samples_for("items_query");
        assert_eq!(samples.len(), 3);
        assert!(samples.iter().all(|s| !s.from_cache));
        assert_eq!(engine.cache_len(), 0);
    }

    #[tokio::test]
    async fn test_cross_collection_favorites_query() {
        let (_store, engine) = engine_over_memory();
        let ops = vec![
            create_op(&item(1, "u1", "c1", true)),
            create_op(&item(2, "u1", "c2", true)),
            create_op(&item(3, "u1", "c1", false)),
            create_op(&item(4, "u2", "c3", true)),
        ];
        engine.batch_write(ops).await.unwrap();

        let filters = ItemFilters {
            cross_collection: true,
            is_favorite: Some(true),
            ..Default::default()
        };
        let query = optimized_items_query("u1", Some(&filters), None);
        let records: Vec<ItemRecord> = engine
            .execute_with_cache(&query, "items:u1:favorites")
            .await
            .unwrap();

        assert_eq!(records.len(), 2);
        assert!(records
            .iter()
            .all(|r| r.user_id == "u1" && r.is_favorite));
    }

    #[tokio::test]
    async fn test_transaction_invalidates_affected_collections() {
        let (_store, engine) = engine_over_memory();
        engine
            .batch_write(vec![create_op(&item(1, "u1", "c1", true))])
            .await
            .unwrap();

        let query = optimized_items_query("u1", None, None);
        let _: Vec<ItemRecord> = engine
            .execute_with_cache(&query, "items:u1:all")
            .await
            .unwrap();
        assert_eq!(engine.cache_len(), 1);

        engine
            .atomic_transaction(&[item_ref(1)], |snapshot| {
                let current = snapshot.get(&item_ref(1)).expect("seeded above");
                let mut data = current.data.clone();
                data["isFavorite"] = json!(false);
                let mut writes = WriteSet::new();
                writes.update(item_ref(1), data);
                Ok((writes, ()))
            })
            .await
            .unwrap();

        assert_eq!(engine.cache_len(), 0);
        let after: Vec<ItemRecord> = engine
            .execute_with_cache(&query, "items:u1:all")
            .await
            .unwrap();
        assert!(!after[0].is_favorite);
    }

    #[tokio::test]
    async fn test_index_report_through_engine() {
        let store = Arc::new(MemoryStore::new());
        let engine = StoreEngineBuilder::new(store)
            .with_provisioned_indexes(vec![])
            .build()
            .unwrap();

        let filters = ItemFilters {
            is_favorite: Some(true),
            ..Default::default()
        };
        let query = optimized_items_query("u1", Some(&filters), None);
        let _: Vec<ItemRecord> = engine
            .execute_with_cache(&query, "items:u1:fav")
            .await
            .unwrap();

        let report = engine.index_report();
        assert!(!report.all_indexes_present);
        assert_eq!(report.missing_indexes[0].collection, "items");
    }

    #[tokio::test]
    async fn test_degraded_read_surfaces_flag() {
        let (store, engine) = engine_over_memory();
        engine
            .batch_write(vec![create_op(&item(1, "u1", "c1", true))])
            .await
            .unwrap();

        let query = optimized_items_query("u1", None, None);
        // Prime the provider's local cache mirror.
        engine
            .read_documents(&query, ReadSource::Server)
            .await
            .unwrap();

        store.set_fail_server_reads(true);
        let outcome = engine
            .read_documents(&query, ReadSource::Server)
            .await
            .unwrap();
        assert!(outcome.degraded);
        assert_eq!(outcome.documents.len(), 1);
    }

    #[tokio::test]
    async fn test_offline_persistence_serves_cache_reads() {
        let dir = tempfile::TempDir::new().unwrap();
        let memory = Arc::new(MemoryStore::new());
        let engine = StoreEngineBuilder::new(memory)
            .enable_offline_persistence(dir.path())
            .build()
            .unwrap();

        engine
            .batch_write(vec![create_op(&item(1, "u1", "c1", true))])
            .await
            .unwrap();

        let query = optimized_items_query("u1", None, None);
        let outcome = engine
            .read_documents(&query, ReadSource::Cache)
            .await
            .unwrap();
        assert_eq!(outcome.documents.len(), 1);
        assert!(!outcome.degraded);
    }

    #[tokio::test]
    async fn test_operation_context_wraps_store_errors() {
        let (store, engine) = engine_over_memory();
        store.set_fail_server_reads(true);

        let query = optimized_items_query("u1", None, None);
        let err = engine
            .execute_with_cache::<ItemRecord>(&query, "items:u1:all")
            .await
            .unwrap_err();
        let message = err.to_string();
        assert!(message.contains("items_query"), "message was: {message}");
    }

    #[tokio::test]
    async fn test_concurrent_queries_share_the_engine() {
        let (_store, engine) = engine_over_memory();
        let engine = Arc::new(engine);
        engine
            .batch_write((0..50).map(|i| create_op(&item(i, "u1", "c1", true))).collect())
            .await
            .unwrap();

        let query = optimized_items_query("u1", None, None);
        let mut handles = Vec::new();
        for i in 0..8 {
            let engine = engine.clone();
            let query = query.clone();
            handles.push(tokio::spawn(async move {
                let key = format!("items:u1:worker{}", i % 2);
                engine
                    .execute_with_cache::<ItemRecord>(&query, &key)
                    .await
                    .unwrap()
                    .len()
            }));
        }
        for handle in handles {
            assert_eq!(handle.await.unwrap(), 50);
        }
    }
}
