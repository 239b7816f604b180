//! Read-path selection between server and local cache.

use std::sync::Arc;

use tracing::warn;

use crate::model::Document;
use crate::query::QuerySpec;

use super::document_store::{DocumentStore, ReadSource, Result};

/// The outcome of a read, carrying whether it was served degraded.
#[derive(Debug, Clone)]
pub struct ReadOutcome {
    pub documents: Vec<Document>,
    /// True when a forced server read failed and the result came from the
    /// local cache instead.
    pub degraded: bool,
}

impl ReadOutcome {
    fn fresh(documents: Vec<Document>) -> Self {
        Self {
            documents,
            degraded: false,
        }
    }

    fn degraded(documents: Vec<Document>) -> Self {
        Self {
            documents,
            degraded: true,
        }
    }
}

/// Routes reads to the requested source, with server-to-cache fallback.
///
/// A `Server` read that fails on a connectivity error falls back to the
/// local cache; a non-empty cache result is returned marked degraded. An
/// empty or failing cache read surfaces the original network error - an
/// empty mirror means the cache has no data for that query. No other
/// automatic retry happens here.
pub struct SourceSelector {
    store: Arc<dyn DocumentStore>,
}

impl SourceSelector {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// Execute `query` against the hinted source.
    pub async fn read(&self, query: &QuerySpec, source: ReadSource) -> Result<ReadOutcome> {
        match source {
            ReadSource::Default | ReadSource::Cache => {
                let documents = self.store.get_documents(query, source).await?;
                Ok(ReadOutcome::fresh(documents))
            }
            ReadSource::Server => match self.store.get_documents(query, ReadSource::Server).await {
                Ok(documents) => Ok(ReadOutcome::fresh(documents)),
                Err(server_err) if server_err.is_connectivity() => {
                    warn!(
                        collection = %query.collection,
                        error = %server_err,
                        "server read failed, falling back to cache"
                    );
                    match self.store.get_documents(query, ReadSource::Cache).await {
                        Ok(documents) if !documents.is_empty() => {
                            Ok(ReadOutcome::degraded(documents))
                        }
                        // No cached data (or the cache itself failed):
                        // surface the original network error.
                        _ => Err(server_err),
                    }
                }
                Err(other) => Err(other),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::DocumentRef;
    use crate::query::FilterOp;
    use crate::store::{MemoryStore, StoreError, WriteOp};
    use serde_json::json;

    fn user_query() -> QuerySpec {
        QuerySpec::new("items").filter("userId", FilterOp::Eq, "u1")
    }

    async fn seeded_store() -> Arc<MemoryStore> {
        let store = Arc::new(MemoryStore::new());
        store
            .commit(&[WriteOp::Create {
                reference: DocumentRef::new("items", "a"),
                data: json!({"userId": "u1", "name": "A"}),
            }])
            .await
            .unwrap();
        store
    }

    #[tokio::test]
    async fn test_server_read_is_not_degraded() {
        let store = seeded_store().await;
        let selector = SourceSelector::new(store);

        let outcome = selector
            .read(&user_query(), ReadSource::Server)
            .await
            .unwrap();
        assert_eq!(outcome.documents.len(), 1);
        assert!(!outcome.degraded);
    }

    #[tokio::test]
    async fn test_server_failure_falls_back_to_cache() {
        let store = seeded_store().await;
        let selector = SourceSelector::new(store.clone());

        // Prime the local cache, then kill the network.
        selector
            .read(&user_query(), ReadSource::Server)
            .await
            .unwrap();
        store.set_fail_server_reads(true);

        let outcome = selector
            .read(&user_query(), ReadSource::Server)
            .await
            .unwrap();
        assert_eq!(outcome.documents.len(), 1);
        assert!(outcome.degraded);
    }

    #[tokio::test]
    async fn test_empty_cache_surfaces_original_error() {
        let store = seeded_store().await;
        let selector = SourceSelector::new(store.clone());

        // Network down and nothing was ever cached for this query.
        store.set_fail_server_reads(true);

        let result = selector.read(&user_query(), ReadSource::Server).await;
        assert!(matches!(result, Err(StoreError::Unavailable(_))));
    }

    #[tokio::test]
    async fn test_default_source_does_not_fall_back() {
        let store = seeded_store().await;
        let selector = SourceSelector::new(store.clone());
        store.set_fail_server_reads(true);

        let result = selector.read(&user_query(), ReadSource::Default).await;
        assert!(result.is_err());
    }
}
