//! HTTP client for the processing service

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::time::Duration;

use crate::error::{ProcessingError, ProcessingResult};
use crate::models::{ChunkRequest, ChunkedText, ParseRequest, ParsedDocument};
use crate::traits::ProcessingClient;

#[derive(Serialize)]
struct EmbedRequest<'a> {
    texts: &'a [String],
}

#[derive(serde::Deserialize)]
struct EmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

/// Reqwest-based client for the parse/chunk/embed endpoints
#[derive(Clone)]
pub struct HttpProcessingClient {
    client: reqwest::Client,
    base_url: String,
}

impl HttpProcessingClient {
    /// Build a client with a per-request timeout.
    ///
    /// # Errors
    /// Returns `ProcessingError::Transport` if the underlying HTTP client
    /// cannot be constructed.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> ProcessingResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ProcessingError::transport("client_init", e))?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    async fn post<Req: Serialize + Sync, Resp: DeserializeOwned>(
        &self,
        operation: &'static str,
        path: &str,
        body: &Req,
    ) -> ProcessingResult<Resp> {
        let url = format!("{}{path}", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| ProcessingError::transport(operation, e))?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(ProcessingError::Service {
                operation,
                status: status.as_u16(),
                message,
            });
        }

        response
            .json()
            .await
            .map_err(|e| ProcessingError::invalid(operation, e.to_string()))
    }
}

#[async_trait]
impl ProcessingClient for HttpProcessingClient {
    #[tracing::instrument(skip(self), fields(file_path = %request.file_path))]
    async fn parse(&self, request: ParseRequest) -> ProcessingResult<ParsedDocument> {
        self.post("parse", "/parse", &request).await
    }

    #[tracing::instrument(skip(self, request), fields(strategy = %request.strategy, text_len = request.text.len()))]
    async fn chunk(&self, request: ChunkRequest) -> ProcessingResult<ChunkedText> {
        let chunked: ChunkedText = self.post("chunk", "/chunk", &request).await?;
        if let Some(metadata) = &chunked.metadata {
            if metadata.len() > chunked.chunks.len() {
                return Err(ProcessingError::invalid(
                    "chunk",
                    format!(
                        "{} metadata entries for {} chunks",
                        metadata.len(),
                        chunked.chunks.len()
                    ),
                ));
            }
        }
        Ok(chunked)
    }

    #[tracing::instrument(skip(self, texts), fields(text_count = texts.len()))]
    async fn embed(&self, texts: &[String]) -> ProcessingResult<Vec<Vec<f32>>> {
        let response: EmbedResponse = self
            .post("embed", "/embed", &EmbedRequest { texts })
            .await?;
        Ok(response.embeddings)
    }
}
