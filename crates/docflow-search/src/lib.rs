//! Query-time search over embedded chunks
//!
//! [`SearchService`] embeds the query through the processing service, runs
//! the vector search, enriches hits with document metadata, and memoizes
//! recent results in a bounded TTL [`SearchCache`].

pub mod cache;
pub mod error;
pub mod models;
pub mod service;

pub use cache::SearchCache;
pub use error::{SearchError, SearchResult};
pub use models::{SearchMatch, SearchOptions, SearchRequest};
pub use service::SearchService;
