//! Qdrant vector repository
//!
//! One Qdrant collection per docflow collection, cosine distance, payload
//! carrying the chunk identity plus the flattened chunk metadata. Point ids
//! are UUIDv5 of the deterministic chunk id, which makes `store_chunks` an
//! upsert: retried pipelines overwrite instead of duplicating.
//!
//! Qdrant has no predicate-delete in the API surface used here, so
//! `delete_document` scrolls the `document_id` filter for point ids and
//! deletes by id list.

use async_trait::async_trait;
use docflow_common::CorrelationId;
use qdrant_client::qdrant::value::Kind;
use qdrant_client::qdrant::{
    CollectionExistsRequest, Condition, CreateCollection, DeleteCollection, DeletePoints,
    Distance, Filter, GetCollectionInfoRequest, PointId, PointStruct, PointsIdsList,
    PointsSelector, ScrollPoints, SearchPoints, UpsertPoints, Value, VectorParams,
    points_selector::PointsSelectorOneOf,
};
use qdrant_client::{Payload, Qdrant};
use std::collections::HashMap;

use crate::error::{VectorDataError, VectorDataResult};
use crate::models::{
    ChunkRecord, CollectionStats, DocumentChunk, DocumentSummary, SearchHit, flatten_metadata,
};
use crate::traits::VectorRepository;

const SCROLL_PAGE: u32 = 256;

/// Payload fields reserved for chunk identity
const FIELD_CHUNK_ID: &str = "chunk_id";
const FIELD_DOCUMENT_ID: &str = "document_id";
const FIELD_CHUNK_INDEX: &str = "chunk_index";
const FIELD_TEXT: &str = "text";

/// Vector repository backed by a Qdrant server
pub struct QdrantRepository {
    client: Qdrant,
    dimension: usize,
}

impl QdrantRepository {
    /// Connect to a Qdrant server.
    ///
    /// # Errors
    /// Returns `VectorDataError::StorageUnavailable` if the client cannot be
    /// built from the URL.
    pub fn connect(url: &str, dimension: usize) -> VectorDataResult<Self> {
        let client = Qdrant::from_url(url)
            .build()
            .map_err(|e| VectorDataError::StorageUnavailable(e.to_string()))?;
        Ok(Self { client, dimension })
    }

    fn check_dimension(&self, len: usize, what: &str) -> VectorDataResult<()> {
        if len == self.dimension {
            Ok(())
        } else {
            Err(VectorDataError::DimensionMismatch(format!(
                "{what} has {len} dimensions, collection expects {}",
                self.dimension
            )))
        }
    }

    fn equality_filter(filter: &HashMap<String, serde_json::Value>) -> Filter {
        let must: Vec<Condition> = filter
            .iter()
            .map(|(key, value)| match value {
                serde_json::Value::Bool(b) => Condition::matches(key.clone(), *b),
                serde_json::Value::Number(n) if n.is_i64() => {
                    Condition::matches(key.clone(), n.as_i64().unwrap_or_default())
                }
                serde_json::Value::String(s) => Condition::matches(key.clone(), s.clone()),
                other => Condition::matches(key.clone(), other.to_string()),
            })
            .collect();
        Filter {
            must,
            ..Default::default()
        }
    }

    fn document_filter(document_id: &str) -> Filter {
        Filter {
            must: vec![Condition::matches(
                FIELD_DOCUMENT_ID,
                document_id.to_string(),
            )],
            ..Default::default()
        }
    }

    /// Scroll all points matching a filter, invoking `visit` per point.
    async fn scroll_filtered<F>(
        &self,
        collection: &str,
        filter: Filter,
        with_payload: bool,
        mut visit: F,
    ) -> VectorDataResult<()>
    where
        F: FnMut(qdrant_client::qdrant::RetrievedPoint),
    {
        let mut offset: Option<PointId> = None;
        loop {
            let request = ScrollPoints {
                collection_name: collection.to_string(),
                filter: Some(filter.clone()),
                limit: Some(SCROLL_PAGE),
                with_payload: Some(with_payload.into()),
                offset: offset.clone(),
                ..Default::default()
            };
            let response = self
                .client
                .scroll(request)
                .await
                .map_err(|e| VectorDataError::storage("scroll", e))?;

            for point in response.result {
                visit(point);
            }
            match response.next_page_offset {
                Some(next) => offset = Some(next),
                None => return Ok(()),
            }
        }
    }
}

fn json_to_payload_value(value: &serde_json::Value) -> Value {
    match value {
        serde_json::Value::Bool(b) => Value::from(*b),
        serde_json::Value::Number(n) => n.as_i64().map_or_else(
            || Value::from(n.as_f64().unwrap_or_default()),
            Value::from,
        ),
        serde_json::Value::String(s) => Value::from(s.clone()),
        // Arrays/maps were flattened upstream; anything left becomes a string
        other => Value::from(other.to_string()),
    }
}

fn payload_value_to_json(value: &Value) -> serde_json::Value {
    match &value.kind {
        Some(Kind::BoolValue(b)) => serde_json::Value::Bool(*b),
        Some(Kind::IntegerValue(i)) => serde_json::Value::from(*i),
        Some(Kind::DoubleValue(d)) => serde_json::Value::from(*d),
        Some(Kind::StringValue(s)) => serde_json::Value::String(s.clone()),
        _ => serde_json::Value::Null,
    }
}

fn payload_str(payload: &HashMap<String, Value>, key: &str) -> String {
    payload
        .get(key)
        .and_then(|v| v.as_str())
        .map(ToString::to_string)
        .unwrap_or_default()
}

fn payload_usize(payload: &HashMap<String, Value>, key: &str) -> usize {
    payload
        .get(key)
        .and_then(|v| v.as_integer())
        .and_then(|v| usize::try_from(v).ok())
        .unwrap_or_default()
}

fn payload_metadata(payload: &HashMap<String, Value>) -> HashMap<String, serde_json::Value> {
    payload
        .iter()
        .filter(|(key, _)| {
            !matches!(
                key.as_str(),
                FIELD_CHUNK_ID | FIELD_CHUNK_INDEX | FIELD_TEXT
            )
        })
        .map(|(key, value)| (key.clone(), payload_value_to_json(value)))
        .collect()
}

#[async_trait]
impl VectorRepository for QdrantRepository {
    #[tracing::instrument(skip(self))]
    async fn create_collection(&self, name: &str) -> VectorDataResult<()> {
        if self.collection_exists(name).await? {
            return Ok(());
        }

        let request = CreateCollection {
            collection_name: name.to_string(),
            vectors_config: Some(
                VectorParams {
                    size: self.dimension as u64,
                    distance: Distance::Cosine as i32,
                    ..Default::default()
                }
                .into(),
            ),
            ..Default::default()
        };

        match self.client.create_collection(request).await {
            Ok(_) => Ok(()),
            Err(e) => {
                // Lost a creation race with another process; that is fine
                if e.to_string().contains("already exists") {
                    Ok(())
                } else {
                    Err(VectorDataError::storage("create_collection", e))
                }
            }
        }
    }

    async fn delete_collection(&self, name: &str) -> VectorDataResult<bool> {
        if !self.collection_exists(name).await? {
            return Ok(false);
        }
        let request = DeleteCollection {
            collection_name: name.to_string(),
            ..Default::default()
        };
        self.client
            .delete_collection(request)
            .await
            .map_err(|e| VectorDataError::storage("delete_collection", e))?;
        Ok(true)
    }

    async fn collection_exists(&self, name: &str) -> VectorDataResult<bool> {
        let request = CollectionExistsRequest {
            collection_name: name.to_string(),
        };
        self.client
            .collection_exists(request)
            .await
            .map_err(|e| VectorDataError::storage("collection_exists", e))
    }

    async fn list_collections(&self) -> VectorDataResult<Vec<String>> {
        let response = self
            .client
            .list_collections()
            .await
            .map_err(|e| VectorDataError::storage("list_collections", e))?;
        Ok(response
            .collections
            .into_iter()
            .map(|c| c.name)
            .collect())
    }

    async fn collection_stats(&self, name: &str) -> VectorDataResult<CollectionStats> {
        let request = GetCollectionInfoRequest {
            collection_name: name.to_string(),
        };
        let info = self
            .client
            .collection_info(request)
            .await
            .map_err(|e| VectorDataError::storage("collection_stats", e))?;
        let result = info
            .result
            .ok_or_else(|| VectorDataError::CollectionNotFound(name.to_string()))?;

        Ok(CollectionStats {
            name: name.to_string(),
            vector_count: result.points_count.unwrap_or(0) as usize,
            dimension: self.dimension,
        })
    }

    #[tracing::instrument(skip(self, chunks), fields(collection, chunk_count = chunks.len()))]
    async fn store_chunks(
        &self,
        collection: &str,
        chunks: &[DocumentChunk],
        correlation_id: &CorrelationId,
    ) -> VectorDataResult<Vec<String>> {
        let mut points = Vec::with_capacity(chunks.len());
        let mut stored_ids = Vec::with_capacity(chunks.len());

        for chunk in chunks {
            self.check_dimension(chunk.embedding.len(), &chunk.id)?;

            let mut payload: HashMap<String, Value> = HashMap::new();
            payload.insert(FIELD_CHUNK_ID.to_string(), Value::from(chunk.id.clone()));
            payload.insert(
                FIELD_DOCUMENT_ID.to_string(),
                Value::from(chunk.document_id.clone()),
            );
            payload.insert(
                FIELD_CHUNK_INDEX.to_string(),
                Value::from(chunk.index as i64),
            );
            payload.insert(FIELD_TEXT.to_string(), Value::from(chunk.text.clone()));

            for (key, value) in flatten_metadata(&chunk.metadata) {
                // Identity fields win over metadata with the same name
                payload
                    .entry(key)
                    .or_insert_with(|| json_to_payload_value(&value));
            }

            stored_ids.push(chunk.id.clone());
            points.push(PointStruct::new(
                chunk.point_id().to_string(),
                chunk.embedding.clone(),
                Payload::from(payload),
            ));
        }

        if points.is_empty() {
            return Ok(stored_ids);
        }

        tracing::info!(
            correlation_id = %correlation_id,
            collection = %collection,
            chunk_count = points.len(),
            "Upserting chunks"
        );

        let request = UpsertPoints {
            collection_name: collection.to_string(),
            points,
            ..Default::default()
        };
        self.client
            .upsert_points(request)
            .await
            .map_err(|e| VectorDataError::storage("store_chunks", e))?;

        Ok(stored_ids)
    }

    #[tracing::instrument(skip(self, query_embedding, filter), fields(collection, top_k))]
    async fn search_chunks(
        &self,
        collection: &str,
        query_embedding: Vec<f32>,
        top_k: usize,
        filter: Option<&HashMap<String, serde_json::Value>>,
        correlation_id: &CorrelationId,
    ) -> VectorDataResult<Vec<SearchHit>> {
        self.check_dimension(query_embedding.len(), "query")?;

        tracing::info!(
            correlation_id = %correlation_id,
            collection = %collection,
            top_k,
            "Vector search"
        );

        let request = SearchPoints {
            collection_name: collection.to_string(),
            vector: query_embedding,
            limit: top_k as u64,
            with_payload: Some(true.into()),
            filter: filter.map(Self::equality_filter),
            ..Default::default()
        };

        let response = self
            .client
            .search_points(request)
            .await
            .map_err(|e| VectorDataError::storage("search_chunks", e))?;

        let hits = response
            .result
            .into_iter()
            .map(|point| {
                // Cosine similarity from the backend; the contract reports
                // distance plus score = 1 - distance
                let distance = 1.0 - point.score;
                SearchHit {
                    chunk_id: payload_str(&point.payload, FIELD_CHUNK_ID),
                    document_id: payload_str(&point.payload, FIELD_DOCUMENT_ID),
                    text: payload_str(&point.payload, FIELD_TEXT),
                    distance,
                    score: 1.0 - distance,
                    metadata: payload_metadata(&point.payload),
                }
            })
            .collect();

        Ok(hits)
    }

    #[tracing::instrument(skip(self))]
    async fn delete_document(
        &self,
        collection: &str,
        document_id: &str,
    ) -> VectorDataResult<usize> {
        let mut ids: Vec<PointId> = Vec::new();
        self.scroll_filtered(
            collection,
            Self::document_filter(document_id),
            false,
            |point| {
                if let Some(id) = point.id {
                    ids.push(id);
                }
            },
        )
        .await?;

        if ids.is_empty() {
            return Ok(0);
        }
        let deleted = ids.len();

        let request = DeletePoints {
            collection_name: collection.to_string(),
            points: Some(PointsSelector {
                points_selector_one_of: Some(PointsSelectorOneOf::Points(PointsIdsList {
                    ids,
                })),
            }),
            ..Default::default()
        };
        self.client
            .delete_points(request)
            .await
            .map_err(|e| VectorDataError::storage("delete_document", e))?;

        tracing::debug!(document_id, deleted, "Deleted document chunks");
        Ok(deleted)
    }

    async fn get_document_chunks(
        &self,
        collection: &str,
        document_id: &str,
        limit: usize,
        offset: usize,
    ) -> VectorDataResult<Vec<ChunkRecord>> {
        let mut records: Vec<ChunkRecord> = Vec::new();
        self.scroll_filtered(
            collection,
            Self::document_filter(document_id),
            true,
            |point| {
                records.push(ChunkRecord {
                    chunk_id: payload_str(&point.payload, FIELD_CHUNK_ID),
                    document_id: payload_str(&point.payload, FIELD_DOCUMENT_ID),
                    index: payload_usize(&point.payload, FIELD_CHUNK_INDEX),
                    text: payload_str(&point.payload, FIELD_TEXT),
                    metadata: payload_metadata(&point.payload),
                });
            },
        )
        .await?;

        records.sort_by_key(|r| r.index);
        Ok(records.into_iter().skip(offset).take(limit).collect())
    }

    async fn list_documents(&self, collection: &str) -> VectorDataResult<Vec<DocumentSummary>> {
        let mut counts: HashMap<String, usize> = HashMap::new();
        self.scroll_filtered(collection, Filter::default(), true, |point| {
            let document_id = payload_str(&point.payload, FIELD_DOCUMENT_ID);
            if !document_id.is_empty() {
                *counts.entry(document_id).or_default() += 1;
            }
        })
        .await?;

        let mut summaries: Vec<DocumentSummary> = counts
            .into_iter()
            .map(|(document_id, chunk_count)| DocumentSummary {
                document_id,
                chunk_count,
            })
            .collect();
        summaries.sort_by(|a, b| a.document_id.cmp(&b.document_id));
        Ok(summaries)
    }
}
