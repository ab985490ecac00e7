//! Scriptable mock `ProcessingClient` for tests
//!
//! Defaults to a deterministic happy path (text parses, chunks split on
//! whitespace groups configured by `set_chunks`, one embedding per text).
//! Per-call scripts let tests inject count mismatches and transient errors
//! on specific attempts.

// Allow test-specific patterns in mock implementation
#![allow(clippy::unwrap_used)] // Mocks can panic on lock poisoning

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::error::{ProcessingError, ProcessingResult};
use crate::models::{ChunkRequest, ChunkedText, ParseRequest, ParsedDocument};
use crate::traits::ProcessingClient;

/// Behavior of one scripted embed call
#[derive(Debug, Clone)]
pub enum EmbedScript {
    /// Return exactly this many vectors regardless of the input count
    Vectors(usize),
    /// Fail with a transport error
    Error(String),
}

#[derive(Default)]
struct Inner {
    parse_text: Mutex<String>,
    parse_metadata: Mutex<Option<HashMap<String, serde_json::Value>>>,
    parse_error: Mutex<Option<String>>,
    chunks: Mutex<Vec<String>>,
    chunk_metadata: Mutex<Option<Vec<HashMap<String, serde_json::Value>>>>,
    chunk_error: Mutex<Option<String>>,
    embed_script: Mutex<VecDeque<EmbedScript>>,
    parse_calls: AtomicUsize,
    chunk_calls: AtomicUsize,
    embed_calls: AtomicUsize,
}

/// Mock processing client with call counters and per-call scripting
#[derive(Clone, Default)]
pub struct MockProcessingClient {
    inner: Arc<Inner>,
}

impl MockProcessingClient {
    pub fn new() -> Self {
        let mock = Self::default();
        mock.set_parse_text("parsed text");
        mock
    }

    /// Text the parse endpoint will return.
    pub fn set_parse_text(&self, text: &str) {
        *self.inner.parse_text.lock().unwrap() = text.to_string();
    }

    /// Metadata the parse endpoint will return.
    pub fn set_parse_metadata(&self, metadata: HashMap<String, serde_json::Value>) {
        *self.inner.parse_metadata.lock().unwrap() = Some(metadata);
    }

    /// Make every parse call fail until cleared.
    pub fn fail_parse(&self, message: &str) {
        *self.inner.parse_error.lock().unwrap() = Some(message.to_string());
    }

    /// Chunks the chunk endpoint will return.
    pub fn set_chunks(&self, chunks: &[&str]) {
        *self.inner.chunks.lock().unwrap() = chunks.iter().map(ToString::to_string).collect();
    }

    /// Per-chunk metadata the chunk endpoint will return.
    pub fn set_chunk_metadata(&self, metadata: Vec<HashMap<String, serde_json::Value>>) {
        *self.inner.chunk_metadata.lock().unwrap() = Some(metadata);
    }

    /// Make every chunk call fail until cleared.
    pub fn fail_chunk(&self, message: &str) {
        *self.inner.chunk_error.lock().unwrap() = Some(message.to_string());
    }

    /// Queue a scripted behavior for the next embed call. Calls beyond the
    /// script fall back to one vector per text.
    pub fn push_embed_script(&self, script: EmbedScript) {
        self.inner.embed_script.lock().unwrap().push_back(script);
    }

    pub fn parse_calls(&self) -> usize {
        self.inner.parse_calls.load(Ordering::SeqCst)
    }

    pub fn chunk_calls(&self) -> usize {
        self.inner.chunk_calls.load(Ordering::SeqCst)
    }

    pub fn embed_calls(&self) -> usize {
        self.inner.embed_calls.load(Ordering::SeqCst)
    }

    /// Deterministic fake embedding derived from the text bytes.
    fn embedding_for(text: &str) -> Vec<f32> {
        let sum: u32 = text.bytes().map(u32::from).sum();
        vec![
            (text.len() % 97) as f32 / 97.0,
            (sum % 89) as f32 / 89.0,
            (sum % 13) as f32 / 13.0,
            1.0,
        ]
    }
}

#[async_trait]
impl ProcessingClient for MockProcessingClient {
    async fn parse(&self, _request: ParseRequest) -> ProcessingResult<ParsedDocument> {
        self.inner.parse_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(message) = self.inner.parse_error.lock().unwrap().clone() {
            return Err(ProcessingError::transport("parse", message));
        }
        Ok(ParsedDocument {
            text: self.inner.parse_text.lock().unwrap().clone(),
            metadata: self.inner.parse_metadata.lock().unwrap().clone(),
        })
    }

    async fn chunk(&self, request: ChunkRequest) -> ProcessingResult<ChunkedText> {
        self.inner.chunk_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(message) = self.inner.chunk_error.lock().unwrap().clone() {
            return Err(ProcessingError::transport("chunk", message));
        }
        let configured = self.inner.chunks.lock().unwrap().clone();
        let chunks = if configured.is_empty() {
            // Fall back to whitespace splitting of the input
            request
                .text
                .split_whitespace()
                .map(ToString::to_string)
                .collect()
        } else {
            configured
        };
        Ok(ChunkedText {
            chunks,
            metadata: self.inner.chunk_metadata.lock().unwrap().clone(),
        })
    }

    async fn embed(&self, texts: &[String]) -> ProcessingResult<Vec<Vec<f32>>> {
        self.inner.embed_calls.fetch_add(1, Ordering::SeqCst);
        let script = self.inner.embed_script.lock().unwrap().pop_front();
        match script {
            Some(EmbedScript::Error(message)) => Err(ProcessingError::transport("embed", message)),
            Some(EmbedScript::Vectors(count)) => Ok((0..count)
                .map(|i| Self::embedding_for(texts.get(i).map_or("", String::as_str)))
                .collect()),
            None => Ok(texts.iter().map(|t| Self::embedding_for(t)).collect()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ChunkingStrategy;

    #[tokio::test]
    async fn default_embed_returns_one_vector_per_text() {
        let mock = MockProcessingClient::new();
        let texts = vec!["a".to_string(), "bb".to_string()];
        let vectors = mock.embed(&texts).await.unwrap();
        assert_eq!(vectors.len(), 2);
        assert_eq!(mock.embed_calls(), 1);
    }

    #[tokio::test]
    async fn scripted_mismatch_applies_to_one_call_only() {
        let mock = MockProcessingClient::new();
        mock.push_embed_script(EmbedScript::Vectors(2));

        let texts = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        assert_eq!(mock.embed(&texts).await.unwrap().len(), 2);
        assert_eq!(mock.embed(&texts).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn chunk_falls_back_to_whitespace_splitting() {
        let mock = MockProcessingClient::new();
        let chunked = mock
            .chunk(ChunkRequest {
                text: "one two three".to_string(),
                strategy: ChunkingStrategy::Sentence,
                chunk_size: 512,
                chunk_overlap: 50,
                extract_metadata: false,
                num_questions: 0,
            })
            .await
            .unwrap();
        assert_eq!(chunked.chunks, vec!["one", "two", "three"]);
    }
}
