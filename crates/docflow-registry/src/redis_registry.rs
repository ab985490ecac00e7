//! Redis-backed document registry
//!
//! Records are JSON strings under `document:{id}`; membership indexes are
//! Redis sets. Every multi-key mutation is issued as one atomic pipeline
//! (MULTI/EXEC) so a crash can never leave an index pointing at a record
//! with a different attribute. Registration uses SET NX on the record key as
//! the existence CAS; the loser of a racy registration gets `AlreadyExists`.

use async_trait::async_trait;
use chrono::{Duration, Utc};
use redis::AsyncCommands;
use redis::aio::ConnectionManager;
use std::collections::HashMap;

use crate::error::{RegistryError, RegistryResult};
use crate::keys;
use crate::models::{Document, DocumentPatch, DocumentStatus};
use crate::traits::DocumentRegistry;

/// Document registry over a shared Redis connection manager
#[derive(Clone)]
pub struct RedisDocumentRegistry {
    conn: ConnectionManager,
}

impl RedisDocumentRegistry {
    /// Wrap an existing connection manager.
    pub const fn new(conn: ConnectionManager) -> Self {
        Self { conn }
    }

    /// Connect to the given Redis URL.
    ///
    /// # Errors
    /// Returns `RegistryError::Store` if the client cannot be created or the
    /// connection cannot be established.
    pub async fn connect(url: &str) -> RegistryResult<Self> {
        let client = redis::Client::open(url)
            .map_err(|e| RegistryError::store("connect", url, e))?;
        let conn = client
            .get_connection_manager()
            .await
            .map_err(|e| RegistryError::store("connect", url, e))?;
        Ok(Self::new(conn))
    }

    /// Batch-load documents for a list of ids, skipping ids whose records
    /// have disappeared between the index scan and the fetch.
    async fn batch_get(&self, ids: Vec<String>) -> RegistryResult<Vec<Document>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let mut conn = self.conn.clone();
        let record_keys: Vec<String> = ids.iter().map(|id| keys::document(id)).collect();
        let raw: Vec<Option<String>> = conn
            .mget(&record_keys)
            .await
            .map_err(|e| RegistryError::store("batch_get", ids.join(","), e))?;

        let mut docs = Vec::with_capacity(raw.len());
        for json in raw.into_iter().flatten() {
            docs.push(serde_json::from_str(&json)?);
        }
        Ok(docs)
    }

    async fn scan_index(&self, index_key: &str) -> RegistryResult<Vec<Document>> {
        let mut conn = self.conn.clone();
        let ids: Vec<String> = conn
            .smembers(index_key)
            .await
            .map_err(|e| RegistryError::store("scan_index", index_key, e))?;
        self.batch_get(ids).await
    }
}

#[async_trait]
impl DocumentRegistry for RedisDocumentRegistry {
    #[tracing::instrument(skip(self, doc), fields(document_id = %doc.id))]
    async fn register(&self, mut doc: Document) -> RegistryResult<Document> {
        doc.validate()?;
        let now = Utc::now();
        doc.created_at = now;
        doc.updated_at = now;

        let record = serde_json::to_string(&doc)?;
        let mut conn = self.conn.clone();

        // CAS on the record key: the first writer wins, the loser sees
        // AlreadyExists instead of clobbering an existing record.
        let created: bool = conn
            .set_nx(keys::document(&doc.id), &record)
            .await
            .map_err(|e| RegistryError::store("register", &doc.id, e))?;
        if !created {
            return Err(RegistryError::AlreadyExists { id: doc.id });
        }

        let mut pipe = redis::pipe();
        pipe.atomic()
            .sadd(keys::DOCUMENTS_INDEX, &doc.id)
            .sadd(keys::collection(&doc.collection), &doc.id)
            .sadd(keys::status(doc.status), &doc.id)
            .set(keys::filename(&doc.filename), &doc.id);
        let _: () = pipe
            .query_async(&mut conn)
            .await
            .map_err(|e| RegistryError::store("register", &doc.id, e))?;

        tracing::debug!(document_id = %doc.id, collection = %doc.collection, "Document registered");
        Ok(doc)
    }

    async fn get(&self, id: &str) -> RegistryResult<Document> {
        let mut conn = self.conn.clone();
        let json: Option<String> = conn
            .get(keys::document(id))
            .await
            .map_err(|e| RegistryError::store("get", id, e))?;
        match json {
            Some(json) => Ok(serde_json::from_str(&json)?),
            None => Err(RegistryError::NotFound { id: id.to_string() }),
        }
    }

    #[tracing::instrument(skip(self, patch))]
    async fn update(&self, id: &str, patch: DocumentPatch) -> RegistryResult<Document> {
        let old = self.get(id).await?;
        let mut doc = old.clone();
        patch.apply(&mut doc);
        doc.validate()?;

        let record = serde_json::to_string(&doc)?;
        let mut pipe = redis::pipe();
        pipe.atomic().set(keys::document(id), &record);

        if old.collection != doc.collection {
            pipe.srem(keys::collection(&old.collection), id)
                .sadd(keys::collection(&doc.collection), id);
        }
        if old.status != doc.status {
            pipe.srem(keys::status(old.status), id)
                .sadd(keys::status(doc.status), id);
        }
        if old.filename != doc.filename {
            pipe.del(keys::filename(&old.filename))
                .set(keys::filename(&doc.filename), id);
        }

        let mut conn = self.conn.clone();
        let _: () = pipe
            .query_async(&mut conn)
            .await
            .map_err(|e| RegistryError::store("update", id, e))?;
        Ok(doc)
    }

    #[tracing::instrument(skip(self))]
    async fn delete(&self, id: &str) -> RegistryResult<()> {
        let doc = self.get(id).await?;

        let mut pipe = redis::pipe();
        pipe.atomic()
            .del(keys::document(id))
            .srem(keys::DOCUMENTS_INDEX, id)
            .srem(keys::collection(&doc.collection), id)
            .srem(keys::status(doc.status), id)
            .del(keys::filename(&doc.filename));

        let mut conn = self.conn.clone();
        let _: () = pipe
            .query_async(&mut conn)
            .await
            .map_err(|e| RegistryError::store("delete", id, e))?;
        Ok(())
    }

    async fn list(&self) -> RegistryResult<Vec<Document>> {
        self.scan_index(keys::DOCUMENTS_INDEX).await
    }

    async fn list_by_collection(&self, collection: &str) -> RegistryResult<Vec<Document>> {
        self.scan_index(&keys::collection(collection)).await
    }

    async fn list_by_status(&self, status: DocumentStatus) -> RegistryResult<Vec<Document>> {
        self.scan_index(&keys::status(status)).await
    }

    async fn find_by_filename(&self, filename: &str) -> RegistryResult<Option<Document>> {
        let mut conn = self.conn.clone();
        let id: Option<String> = conn
            .get(keys::filename(filename))
            .await
            .map_err(|e| RegistryError::store("find_by_filename", filename, e))?;
        match id {
            Some(id) => match self.get(&id).await {
                Ok(doc) => Ok(Some(doc)),
                // Stale pointer left by an out-of-band deletion
                Err(RegistryError::NotFound { .. }) => Ok(None),
                Err(e) => Err(e),
            },
            None => Ok(None),
        }
    }

    async fn filter_by_metadata(
        &self,
        filters: &HashMap<String, serde_json::Value>,
    ) -> RegistryResult<Vec<Document>> {
        let docs = self.list().await?;
        Ok(docs
            .into_iter()
            .filter(|doc| {
                doc.metadata.as_ref().is_some_and(|meta| {
                    filters.iter().all(|(k, v)| meta.get(k) == Some(v))
                })
            })
            .collect())
    }

    #[tracing::instrument(skip(self))]
    async fn cleanup(&self, older_than: Duration) -> RegistryResult<usize> {
        let cutoff = Utc::now() - older_than;
        let deleted = self.list_by_status(DocumentStatus::Deleted).await?;
        let mut removed = 0usize;
        for doc in deleted {
            if doc.created_at < cutoff {
                self.delete(&doc.id).await?;
                removed = removed.saturating_add(1);
            }
        }
        if removed > 0 {
            tracing::info!(removed, "Cleaned up deleted documents");
        }
        Ok(removed)
    }
}
