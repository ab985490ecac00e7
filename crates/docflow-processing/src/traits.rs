//! Processing client trait

use async_trait::async_trait;

use crate::error::ProcessingResult;
use crate::models::{ChunkRequest, ChunkedText, ParseRequest, ParsedDocument};

/// Client for the external parsing/chunking/embedding service
#[async_trait]
pub trait ProcessingClient: Send + Sync {
    /// Parse the file at a path into text plus document metadata.
    async fn parse(&self, request: ParseRequest) -> ProcessingResult<ParsedDocument>;

    /// Split text into chunks with the requested strategy.
    async fn chunk(&self, request: ChunkRequest) -> ProcessingResult<ChunkedText>;

    /// Embed each text; the response has exactly one vector per input.
    async fn embed(&self, texts: &[String]) -> ProcessingResult<Vec<Vec<f32>>>;
}
