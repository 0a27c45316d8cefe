//! Bibliographic provider adapters.
//!
//! Every provider implements the [`Source`] trait and emits the normalized
//! [`Paper`](crate::models::Paper) record shape; the resolution pipeline
//! never touches a provider's native response format. Providers are queried
//! sequentially - there is no parallel fan-out even when several are asked
//! for the same keyword.

mod arxiv;
pub mod mock;
mod openalex;
mod semantic;

pub use arxiv::ArxivSource;
pub use mock::MockSource;
pub use openalex::OpenAlexSource;
pub use semantic::{SemanticScholarSource, S2_MIN_REQUEST_INTERVAL};

use crate::models::Paper;
use async_trait::async_trait;

/// Interface implemented by all bibliographic providers.
#[async_trait]
pub trait Source: Send + Sync + std::fmt::Debug {
    /// Unique identifier for this source (e.g. "s2", "openalex")
    fn id(&self) -> &str;

    /// Human-readable name of this source
    fn name(&self) -> &str;

    /// Whether this source supports lookup by DOI
    fn supports_doi_lookup(&self) -> bool {
        false
    }

    /// Search for papers matching the keyword
    async fn search(&self, keyword: &str, limit: usize) -> Result<Vec<Paper>, SourceError>;

    /// Get a paper by its DOI; `Ok(None)` when the provider has no record
    async fn get_by_doi(&self, _doi: &str) -> Result<Option<Paper>, SourceError> {
        Err(SourceError::NotImplemented)
    }
}

/// Errors that can occur when interacting with a source
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    /// The requested operation is not implemented for this source
    #[error("Operation not implemented for this source")]
    NotImplemented,

    /// Network or HTTP transport error
    #[error("Network error: {0}")]
    Network(String),

    /// Parsing error (JSON, Atom, etc.)
    #[error("Parse error: {0}")]
    Parse(String),

    /// Invalid request parameters
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Rate limit exceeded; callers may fall back to an alternate provider
    #[error("Rate limit exceeded")]
    RateLimit,

    /// API error from the source
    #[error("API error: {0}")]
    Api(String),
}

impl From<reqwest::Error> for SourceError {
    fn from(err: reqwest::Error) -> Self {
        SourceError::Network(err.to_string())
    }
}

impl From<serde_json::Error> for SourceError {
    fn from(err: serde_json::Error) -> Self {
        SourceError::Parse(format!("JSON: {}", err))
    }
}
