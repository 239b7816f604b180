//! LMDB-backed offline persistence for document reads.
//!
//! Wraps another [`DocumentStore`] and mirrors every successfully read or
//! written document into a local LMDB database, keyed `collection/id`.
//! `ReadSource::Cache` queries are answered entirely from the mirror by
//! scanning the collection prefix and evaluating the query locally, so
//! reads keep working when the backend is unreachable.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use heed::types::Bytes;
use heed::{Database, Env, EnvOpenOptions};
use serde_json::Value;

use crate::model::{Document, DocumentRef};
use crate::query::{apply_query, QuerySpec};

use super::document_store::{
    DocumentStore, ReadSource, Result, StoreError, TransactionSnapshot, WriteOp, WriteSet,
};

fn db_err(e: impl std::fmt::Display) -> StoreError {
    StoreError::Backend(e.to_string())
}

fn mirror_key(reference: &DocumentRef) -> Vec<u8> {
    format!("{}/{}", reference.collection, reference.id).into_bytes()
}

// =============================================================================
// OfflineStore
// =============================================================================

/// A `DocumentStore` decorator with an LMDB offline mirror.
pub struct OfflineStore {
    inner: Arc<dyn DocumentStore>,
    env: Arc<Env>,
    db: Database<Bytes, Bytes>,
}

impl OfflineStore {
    /// Open (or create) the offline mirror at `path`, wrapping `inner`.
    pub fn open(inner: Arc<dyn DocumentStore>, path: &Path) -> Result<Self> {
        std::fs::create_dir_all(path).map_err(db_err)?;

        let env = unsafe {
            EnvOpenOptions::new()
                .map_size(1024 * 1024 * 1024) // 1GB max size
                .max_dbs(1)
                .open(path)
                .map_err(db_err)?
        };

        let mut wtxn = env.write_txn().map_err(db_err)?;
        let db: Database<Bytes, Bytes> = env.create_database(&mut wtxn, None).map_err(db_err)?;
        wtxn.commit().map_err(db_err)?;

        Ok(Self {
            inner,
            env: Arc::new(env),
            db,
        })
    }

    /// Persist documents into the mirror.
    async fn mirror_documents(&self, documents: Vec<Document>) -> Result<()> {
        if documents.is_empty() {
            return Ok(());
        }
        let env = self.env.clone();
        let db = self.db;

        tokio::task::spawn_blocking(move || {
            let mut wtxn = env.write_txn().map_err(db_err)?;
            for doc in &documents {
                let value = serde_json::to_vec(&doc.data).map_err(db_err)?;
                db.put(&mut wtxn, &mirror_key(&doc.reference), &value)
                    .map_err(db_err)?;
            }
            wtxn.commit().map_err(db_err)
        })
        .await
        .map_err(db_err)?
    }

    /// Apply committed write operations to the mirror.
    async fn mirror_ops(&self, ops: Vec<WriteOp>) -> Result<()> {
        if ops.is_empty() {
            return Ok(());
        }
        let env = self.env.clone();
        let db = self.db;

        tokio::task::spawn_blocking(move || {
            let mut wtxn = env.write_txn().map_err(db_err)?;
            for op in &ops {
                match op {
                    WriteOp::Create { reference, data } => {
                        let value = serde_json::to_vec(data).map_err(db_err)?;
                        db.put(&mut wtxn, &mirror_key(reference), &value)
                            .map_err(db_err)?;
                    }
                    WriteOp::Update { reference, data } => {
                        let key = mirror_key(reference);
                        let merged = match db.get(&wtxn, &key).map_err(db_err)? {
                            Some(existing) => {
                                let mut current: Value =
                                    serde_json::from_slice(existing).map_err(db_err)?;
                                if let (Some(target), Some(patch)) =
                                    (current.as_object_mut(), data.as_object())
                                {
                                    for (k, v) in patch {
                                        target.insert(k.clone(), v.clone());
                                    }
                                }
                                current
                            }
                            None => data.clone(),
                        };
                        let value = serde_json::to_vec(&merged).map_err(db_err)?;
                        db.put(&mut wtxn, &key, &value).map_err(db_err)?;
                    }
                    WriteOp::Delete { reference } => {
                        db.delete(&mut wtxn, &mirror_key(reference)).map_err(db_err)?;
                    }
                }
            }
            wtxn.commit().map_err(db_err)
        })
        .await
        .map_err(db_err)?
    }

    /// Load every mirrored document of one collection.
    async fn load_collection(&self, collection: &str) -> Result<Vec<Document>> {
        let env = self.env.clone();
        let db = self.db;
        let collection = collection.to_string();

        tokio::task::spawn_blocking(move || {
            let rtxn = env.read_txn().map_err(db_err)?;
            let prefix = format!("{collection}/").into_bytes();
            let mut documents = Vec::new();

            let iter = db.prefix_iter(&rtxn, &prefix).map_err(db_err)?;
            for entry in iter {
                let (key, value) = entry.map_err(db_err)?;
                let key = std::str::from_utf8(key).map_err(db_err)?;
                let id = &key[prefix.len()..];
                let data: Value = serde_json::from_slice(value).map_err(db_err)?;
                documents.push(Document::new(DocumentRef::new(collection.clone(), id), data));
            }
            Ok(documents)
        })
        .await
        .map_err(db_err)?
    }

    async fn load_document(&self, reference: &DocumentRef) -> Result<Option<Document>> {
        let env = self.env.clone();
        let db = self.db;
        let reference = reference.clone();

        tokio::task::spawn_blocking(move || {
            let rtxn = env.read_txn().map_err(db_err)?;
            match db.get(&rtxn, &mirror_key(&reference)).map_err(db_err)? {
                Some(value) => {
                    let data: Value = serde_json::from_slice(value).map_err(db_err)?;
                    Ok(Some(Document::new(reference, data)))
                }
                None => Ok(None),
            }
        })
        .await
        .map_err(db_err)?
    }
}

#[async_trait]
impl DocumentStore for OfflineStore {
    async fn get_documents(&self, query: &QuerySpec, source: ReadSource) -> Result<Vec<Document>> {
        if source == ReadSource::Cache {
            let candidates = self.load_collection(&query.collection).await?;
            return Ok(apply_query(query, candidates));
        }

        let documents = self.inner.get_documents(query, source).await?;
        self.mirror_documents(documents.clone()).await?;
        Ok(documents)
    }

    async fn get_document(
        &self,
        reference: &DocumentRef,
        source: ReadSource,
    ) -> Result<Option<Document>> {
        if source == ReadSource::Cache {
            return self.load_document(reference).await;
        }

        let document = self.inner.get_document(reference, source).await?;
        if let Some(document) = &document {
            self.mirror_documents(vec![document.clone()]).await?;
        }
        Ok(document)
    }

    async fn commit(&self, ops: &[WriteOp]) -> Result<()> {
        self.inner.commit(ops).await?;
        self.mirror_ops(ops.to_vec()).await
    }

    async fn snapshot(&self, reads: &[DocumentRef]) -> Result<TransactionSnapshot> {
        self.inner.snapshot(reads).await
    }

    async fn commit_transaction(
        &self,
        snapshot: &TransactionSnapshot,
        writes: &WriteSet,
    ) -> Result<()> {
        self.inner.commit_transaction(snapshot, writes).await?;
        self.mirror_ops(writes.ops().to_vec()).await
    }

    fn max_batch_size(&self) -> usize {
        self.inner.max_batch_size()
    }
}
