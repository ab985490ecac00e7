//! Request/response shapes for the processing service

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Chunking strategies understood by the chunk endpoint
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ChunkingStrategy {
    Sentence,
    Semantic,
    Markdown,
    Hierarchical,
    Token,
}

impl std::str::FromStr for ChunkingStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sentence" => Ok(Self::Sentence),
            "semantic" => Ok(Self::Semantic),
            "markdown" => Ok(Self::Markdown),
            "hierarchical" => Ok(Self::Hierarchical),
            "token" => Ok(Self::Token),
            _ => Err(format!("Invalid chunking strategy: {s}")),
        }
    }
}

impl std::fmt::Display for ChunkingStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Sentence => "sentence",
            Self::Semantic => "semantic",
            Self::Markdown => "markdown",
            Self::Hierarchical => "hierarchical",
            Self::Token => "token",
        };
        write!(f, "{name}")
    }
}

/// Input for the parse endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParseRequest {
    pub file_path: String,
    pub extract_metadata: bool,
    pub num_questions: u32,
    /// 0 means no page cap
    pub max_pages: u32,
}

/// Parsed text plus whatever the parser learned about the document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParsedDocument {
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<HashMap<String, serde_json::Value>>,
}

/// Input for the chunk endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkRequest {
    pub text: String,
    pub strategy: ChunkingStrategy,
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub extract_metadata: bool,
    pub num_questions: u32,
}

/// Chunked text with optional per-chunk extracted metadata
///
/// The service may return metadata for a prefix of the chunks only
/// (`metadata.len() <= chunks.len()`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkedText {
    pub chunks: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Vec<HashMap<String, serde_json::Value>>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strategies_round_trip_through_strings() {
        for name in ["sentence", "semantic", "markdown", "hierarchical", "token"] {
            let strategy: ChunkingStrategy = name.parse().unwrap();
            assert_eq!(strategy.to_string(), name);
        }
        assert!("paragraph".parse::<ChunkingStrategy>().is_err());
    }
}
