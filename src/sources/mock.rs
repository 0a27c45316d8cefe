//! Mock source for testing purposes.

use async_trait::async_trait;

use crate::models::Paper;
use crate::sources::{Source, SourceError};

/// A mock source returning predefined papers.
///
/// `search` returns the configured papers regardless of keyword;
/// `get_by_doi` scans them for an exact case-insensitive DOI match. Set
/// `rate_limited` to make every call fail with [`SourceError::RateLimit`],
/// which exercises the pipeline's provider fallback.
#[derive(Debug, Default)]
pub struct MockSource {
    id: String,
    papers: Vec<Paper>,
    rate_limited: bool,
}

impl MockSource {
    /// Create a mock with a source id and canned search results
    pub fn new(id: impl Into<String>, papers: Vec<Paper>) -> Self {
        Self {
            id: id.into(),
            papers,
            rate_limited: false,
        }
    }

    /// Create a mock that always reports a rate limit
    pub fn rate_limited(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            papers: Vec::new(),
            rate_limited: true,
        }
    }
}

#[async_trait]
impl Source for MockSource {
    fn id(&self) -> &str {
        &self.id
    }

    fn name(&self) -> &str {
        "Mock Source"
    }

    fn supports_doi_lookup(&self) -> bool {
        true
    }

    async fn search(&self, _keyword: &str, limit: usize) -> Result<Vec<Paper>, SourceError> {
        if self.rate_limited {
            return Err(SourceError::RateLimit);
        }
        Ok(self.papers.iter().take(limit).cloned().collect())
    }

    async fn get_by_doi(&self, doi: &str) -> Result<Option<Paper>, SourceError> {
        if self.rate_limited {
            return Err(SourceError::RateLimit);
        }
        Ok(self
            .papers
            .iter()
            .find(|paper| {
                paper
                    .doi()
                    .is_some_and(|d| d.eq_ignore_ascii_case(doi.trim()))
            })
            .cloned())
    }
}
