//! Client for the external parsing/chunking/embedding service
//!
//! The ingestion pipeline consumes three HTTP endpoints (`/parse`, `/chunk`,
//! `/embed`) through the [`ProcessingClient`] trait; the mock implementation
//! scripts per-call behavior for tests.

pub mod error;
pub mod http;
pub mod mock;
pub mod models;
pub mod traits;

pub use error::{ProcessingError, ProcessingResult};
pub use http::HttpProcessingClient;
pub use mock::{EmbedScript, MockProcessingClient};
pub use models::{ChunkRequest, ChunkedText, ChunkingStrategy, ParseRequest, ParsedDocument};
pub use traits::ProcessingClient;
