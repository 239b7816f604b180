//! An in-memory implementation of `DocumentStore`, intended primarily for
//! testing.
//!
//! Simulates the provider closely enough for engine-level tests: versioned
//! documents for contention detection, a local cache mirror standing in for
//! the provider's offline persistence, and fault-injection knobs for
//! connectivity failures, failing commits, and transaction contention.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, RwLock};

use async_trait::async_trait;
use serde_json::Value;

use crate::index::IndexSpec;
use crate::model::{Document, DocumentRef};
use crate::query::{apply_query, QuerySpec};

use super::document_store::{
    DocumentStore, ReadSource, Result, StoreError, TransactionSnapshot, WriteOp, WriteSet,
};

// =============================================================================
// Internal State
// =============================================================================

#[derive(Debug, Clone)]
struct VersionedDocument {
    data: Value,
    version: u64,
}

#[derive(Default)]
struct Faults {
    /// Fail the next server reads with `Unavailable`.
    fail_server_reads: bool,
    /// Fail the next N batch commits with `Unavailable`.
    fail_commits_remaining: u32,
    /// Fail the next N transaction commits with `Contention`.
    contend_commits_remaining: u32,
}

// =============================================================================
// MemoryStore
// =============================================================================

/// An in-memory document store with fault injection.
pub struct MemoryStore {
    documents: RwLock<HashMap<DocumentRef, VersionedDocument>>,
    /// Local cache mirror, filled by successful server reads and commits.
    local_cache: RwLock<HashMap<DocumentRef, Value>>,
    faults: Mutex<Faults>,
    commit_count: AtomicU64,
    /// When set, composite queries require a matching provisioned index.
    provisioned_indexes: RwLock<Option<Vec<IndexSpec>>>,
}

impl MemoryStore {
    /// Create a new empty in-memory store.
    pub fn new() -> Self {
        Self {
            documents: RwLock::new(HashMap::new()),
            local_cache: RwLock::new(HashMap::new()),
            faults: Mutex::new(Faults::default()),
            commit_count: AtomicU64::new(0),
            provisioned_indexes: RwLock::new(None),
        }
    }

    /// Number of batch commits issued so far (successful or not).
    pub fn commits(&self) -> u64 {
        self.commit_count.load(Ordering::SeqCst)
    }

    /// Number of documents currently stored.
    pub fn len(&self) -> usize {
        self.documents.read().unwrap().len()
    }

    /// Whether the store holds no documents.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Make server reads fail with `Unavailable` until cleared.
    pub fn set_fail_server_reads(&self, fail: bool) {
        self.faults.lock().unwrap().fail_server_reads = fail;
    }

    /// Make the next `n` batch commits fail with `Unavailable`.
    pub fn fail_next_commits(&self, n: u32) {
        self.faults.lock().unwrap().fail_commits_remaining = n;
    }

    /// Make the next `n` transaction commits fail with `Contention`.
    pub fn contend_next_transactions(&self, n: u32) {
        self.faults.lock().unwrap().contend_commits_remaining = n;
    }

    /// Enforce composite-index coverage: queries needing a composite index
    /// that is not in `indexes` fail with `MissingIndex`.
    pub fn set_provisioned_indexes(&self, indexes: Vec<IndexSpec>) {
        *self.provisioned_indexes.write().unwrap() = Some(indexes);
    }

    fn check_index_coverage(&self, query: &QuerySpec) -> Result<()> {
        let provisioned = self.provisioned_indexes.read().unwrap();
        let Some(provisioned) = provisioned.as_ref() else {
            return Ok(());
        };
        if let Some(required) = IndexSpec::for_query(query) {
            if !provisioned.contains(&required) {
                return Err(StoreError::MissingIndex(format!(
                    "query on '{}' requires composite index {:?}",
                    query.collection, required
                )));
            }
        }
        Ok(())
    }

    fn collection_documents(
        map: &HashMap<DocumentRef, impl AsData>,
        collection: &str,
    ) -> Vec<Document> {
        map.iter()
            .filter(|(r, _)| r.collection == collection)
            .map(|(r, d)| Document::new(r.clone(), d.as_data().clone()))
            .collect()
    }

    fn mirror_documents(&self, documents: &[Document]) {
        let mut cache = self.local_cache.write().unwrap();
        for doc in documents {
            cache.insert(doc.reference.clone(), doc.data.clone());
        }
    }

    /// Validate then apply a list of writes under one write lock.
    fn apply_ops(&self, ops: &[WriteOp]) -> Result<()> {
        let mut documents = self.documents.write().unwrap();

        // Validate first so a failing op leaves the commit unapplied.
        for op in ops {
            if let WriteOp::Update { reference, .. } = op {
                if !documents.contains_key(reference) {
                    return Err(StoreError::NotFound(reference.clone()));
                }
            }
        }

        let mut cache = self.local_cache.write().unwrap();
        for op in ops {
            match op {
                WriteOp::Create { reference, data } => {
                    let version = documents.get(reference).map(|d| d.version).unwrap_or(0);
                    documents.insert(
                        reference.clone(),
                        VersionedDocument {
                            data: data.clone(),
                            version: version + 1,
                        },
                    );
                    cache.insert(reference.clone(), data.clone());
                }
                WriteOp::Update { reference, data } => {
                    // Presence was checked in the validation pass above.
                    if let Some(existing) = documents.get_mut(reference) {
                        merge_into(&mut existing.data, data);
                        existing.version += 1;
                        cache.insert(reference.clone(), existing.data.clone());
                    }
                }
                WriteOp::Delete { reference } => {
                    documents.remove(reference);
                    cache.remove(reference);
                }
            }
        }
        Ok(())
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Shallow-merge `patch` fields into `target`, provider update semantics.
fn merge_into(target: &mut Value, patch: &Value) {
    match (target.as_object_mut(), patch.as_object()) {
        (Some(target_map), Some(patch_map)) => {
            for (k, v) in patch_map {
                target_map.insert(k.clone(), v.clone());
            }
        }
        _ => *target = patch.clone(),
    }
}

trait AsData {
    fn as_data(&self) -> &Value;
}

impl AsData for VersionedDocument {
    fn as_data(&self) -> &Value {
        &self.data
    }
}

impl AsData for Value {
    fn as_data(&self) -> &Value {
        self
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn get_documents(&self, query: &QuerySpec, source: ReadSource) -> Result<Vec<Document>> {
        if source == ReadSource::Cache {
            let cache = self.local_cache.read().unwrap();
            let candidates = Self::collection_documents(&cache, &query.collection);
            return Ok(apply_query(query, candidates));
        }

        if self.faults.lock().unwrap().fail_server_reads {
            return Err(StoreError::Unavailable(
                "simulated network failure".to_string(),
            ));
        }
        self.check_index_coverage(query)?;

        let candidates = {
            let documents = self.documents.read().unwrap();
            Self::collection_documents(&documents, &query.collection)
        };
        let result = apply_query(query, candidates);
        self.mirror_documents(&result);
        Ok(result)
    }

    async fn get_document(
        &self,
        reference: &DocumentRef,
        source: ReadSource,
    ) -> Result<Option<Document>> {
        if source == ReadSource::Cache {
            let cache = self.local_cache.read().unwrap();
            return Ok(cache
                .get(reference)
                .map(|data| Document::new(reference.clone(), data.clone())));
        }

        if self.faults.lock().unwrap().fail_server_reads {
            return Err(StoreError::Unavailable(
                "simulated network failure".to_string(),
            ));
        }

        let doc = {
            let documents = self.documents.read().unwrap();
            documents
                .get(reference)
                .map(|d| Document::new(reference.clone(), d.data.clone()))
        };
        if let Some(doc) = &doc {
            self.mirror_documents(std::slice::from_ref(doc));
        }
        Ok(doc)
    }

    async fn commit(&self, ops: &[WriteOp]) -> Result<()> {
        self.commit_count.fetch_add(1, Ordering::SeqCst);

        {
            let mut faults = self.faults.lock().unwrap();
            if faults.fail_commits_remaining > 0 {
                faults.fail_commits_remaining -= 1;
                return Err(StoreError::Unavailable(
                    "simulated commit failure".to_string(),
                ));
            }
        }

        self.apply_ops(ops)
    }

    async fn snapshot(&self, reads: &[DocumentRef]) -> Result<TransactionSnapshot> {
        let documents = self.documents.read().unwrap();
        let reads = reads
            .iter()
            .map(|r| {
                let entry = documents.get(r);
                (
                    r.clone(),
                    entry.map(|d| d.version).unwrap_or(0),
                    entry.map(|d| Document::new(r.clone(), d.data.clone())),
                )
            })
            .collect();
        Ok(TransactionSnapshot::new(reads))
    }

    async fn commit_transaction(
        &self,
        snapshot: &TransactionSnapshot,
        writes: &WriteSet,
    ) -> Result<()> {
        {
            let mut faults = self.faults.lock().unwrap();
            if faults.contend_commits_remaining > 0 {
                faults.contend_commits_remaining -= 1;
                return Err(StoreError::Contention(
                    "simulated transaction conflict".to_string(),
                ));
            }
        }

        {
            let documents = self.documents.read().unwrap();
            for (reference, version) in snapshot.versions() {
                let current = documents.get(reference).map(|d| d.version).unwrap_or(0);
                if current != version {
                    return Err(StoreError::Contention(format!(
                        "document {reference} changed since snapshot"
                    )));
                }
            }
        }

        self.apply_ops(writes.ops())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::FilterOp;
    use serde_json::json;

    fn item_ref(id: &str) -> DocumentRef {
        DocumentRef::new("items", id)
    }

    async fn seed(store: &MemoryStore) {
        store
            .commit(&[
                WriteOp::Create {
                    reference: item_ref("a"),
                    data: json!({"userId": "u1", "isFavorite": true, "rating": 4.0}),
                },
                WriteOp::Create {
                    reference: item_ref("b"),
                    data: json!({"userId": "u1", "isFavorite": false, "rating": 2.0}),
                },
                WriteOp::Create {
                    reference: item_ref("c"),
                    data: json!({"userId": "u2", "isFavorite": true, "rating": 5.0}),
                },
            ])
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_query_filters_by_owner() {
        let store = MemoryStore::new();
        seed(&store).await;

        let query = QuerySpec::new("items").filter("userId", FilterOp::Eq, "u1");
        let docs = store
            .get_documents(&query, ReadSource::Default)
            .await
            .unwrap();
        assert_eq!(docs.len(), 2);
    }

    #[tokio::test]
    async fn test_update_of_missing_document_fails_whole_commit() {
        let store = MemoryStore::new();
        seed(&store).await;

        let result = store
            .commit(&[
                WriteOp::Create {
                    reference: item_ref("d"),
                    data: json!({"userId": "u1"}),
                },
                WriteOp::Update {
                    reference: item_ref("missing"),
                    data: json!({"rating": 1.0}),
                },
            ])
            .await;

        assert!(matches!(result, Err(StoreError::NotFound(_))));
        // The create in the same commit must not have been applied.
        let doc = store
            .get_document(&item_ref("d"), ReadSource::Default)
            .await
            .unwrap();
        assert!(doc.is_none());
    }

    #[tokio::test]
    async fn test_update_merges_fields() {
        let store = MemoryStore::new();
        seed(&store).await;

        store
            .commit(&[WriteOp::Update {
                reference: item_ref("a"),
                data: json!({"rating": 1.5}),
            }])
            .await
            .unwrap();

        let doc = store
            .get_document(&item_ref("a"), ReadSource::Default)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(doc.data["rating"], 1.5);
        assert_eq!(doc.data["userId"], "u1");
    }

    #[tokio::test]
    async fn test_cache_source_serves_mirrored_reads_when_server_down() {
        let store = MemoryStore::new();
        seed(&store).await;

        let query = QuerySpec::new("items").filter("userId", FilterOp::Eq, "u1");
        // Prime the mirror.
        store
            .get_documents(&query, ReadSource::Server)
            .await
            .unwrap();

        store.set_fail_server_reads(true);
        assert!(store.get_documents(&query, ReadSource::Server).await.is_err());

        let cached = store
            .get_documents(&query, ReadSource::Cache)
            .await
            .unwrap();
        assert_eq!(cached.len(), 2);
    }

    #[tokio::test]
    async fn test_transaction_contention_on_version_change() {
        let store = MemoryStore::new();
        seed(&store).await;

        let snapshot = store.snapshot(&[item_ref("a")]).await.unwrap();

        // Concurrent writer bumps the version.
        store
            .commit(&[WriteOp::Update {
                reference: item_ref("a"),
                data: json!({"rating": 3.0}),
            }])
            .await
            .unwrap();

        let mut writes = WriteSet::new();
        writes.update(item_ref("a"), json!({"rating": 5.0}));
        let result = store.commit_transaction(&snapshot, &writes).await;
        assert!(matches!(result, Err(StoreError::Contention(_))));
    }

    #[tokio::test]
    async fn test_missing_index_enforcement() {
        let store = MemoryStore::new();
        seed(&store).await;
        store.set_provisioned_indexes(vec![]);

        let composite = QuerySpec::new("items")
            .filter("userId", FilterOp::Eq, "u1")
            .filter("rating", FilterOp::Gte, 3.0);
        let result = store.get_documents(&composite, ReadSource::Default).await;
        assert!(matches!(result, Err(StoreError::MissingIndex(_))));

        // Single-field queries need no composite index.
        let single = QuerySpec::new("items").filter("userId", FilterOp::Eq, "u1");
        assert!(store.get_documents(&single, ReadSource::Default).await.is_ok());
    }
}
