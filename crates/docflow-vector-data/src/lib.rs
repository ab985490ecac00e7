//! Vector storage contract and backends
//!
//! The [`VectorRepository`] trait abstracts the vector database: collection
//! CRUD plus chunk upsert/search/delete. [`QdrantRepository`] is the
//! production backend; [`MockVectorRepository`] is an in-memory stand-in
//! with real cosine scoring for tests.

pub mod error;
pub mod mock;
pub mod models;
pub mod qdrant;
pub mod traits;

pub use error::{VectorDataError, VectorDataResult};
pub use mock::MockVectorRepository;
pub use models::{
    ChunkRecord, CollectionStats, DocumentChunk, DocumentSummary, SearchHit, chunk_id,
    flatten_metadata, validate_collection_name,
};
pub use qdrant::QdrantRepository;
pub use traits::VectorRepository;
