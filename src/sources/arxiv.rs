//! arXiv provider implementation.

use async_trait::async_trait;
use chrono::Datelike;
use feed_rs::model::Entry;
use feed_rs::parser;
use reqwest::Client;
use std::time::Duration;

use crate::models::{DocType, Paper};
use crate::sources::{Source, SourceError};

const ARXIV_API_URL: &str = "http://export.arxiv.org/api/query";

/// arXiv Atom API source.
///
/// Everything arXiv returns is a preprint: venue is fixed to "arXiv", the
/// document type to `EB/OL`, and the citation count to zero.
#[derive(Debug, Clone)]
pub struct ArxivSource {
    client: Client,
}

impl ArxivSource {
    /// Create a new arXiv source
    pub fn new() -> Result<Self, SourceError> {
        let client = Client::builder()
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self { client })
    }

    fn parse_entry(entry: Entry) -> Paper {
        let title = entry
            .title
            .as_ref()
            .map(|t| t.content.replace('\n', " ").trim().to_string())
            .unwrap_or_default();
        let abstract_text = entry
            .summary
            .as_ref()
            .map(|s| s.content.replace('\n', " ").trim().to_string())
            .unwrap_or_default();
        let arxiv_id = extract_arxiv_id(&entry.id);

        let pdf_url = entry
            .links
            .iter()
            .find(|link| link.media_type.as_deref() == Some("application/pdf"))
            .map(|link| link.href.clone())
            .or_else(|| {
                if arxiv_id.is_empty() {
                    None
                } else {
                    Some(format!("https://arxiv.org/pdf/{}.pdf", arxiv_id))
                }
            });

        let mut paper = Paper::new(title);
        paper.paper_id = if arxiv_id.is_empty() {
            Some(entry.id.clone()).filter(|id| !id.is_empty())
        } else {
            Some(arxiv_id.clone())
        };
        paper.abstract_text = abstract_text;
        paper.authors = entry
            .authors
            .iter()
            .map(|person| person.name.trim().to_string())
            .filter(|name| !name.is_empty())
            .collect();
        paper.year = entry.published.map(|date| date.year());
        paper.publication_date = entry.published.map(|date| date.format("%Y-%m-%d").to_string());
        paper.venue = "arXiv".to_string();
        paper.doc_type = DocType::Online;
        paper.raw_type = Some("preprint".to_string());
        paper.url = entry.id;
        if !arxiv_id.is_empty() {
            paper.external_ids.insert("ArXiv".to_string(), arxiv_id);
        }
        if let Some(url) = pdf_url {
            paper.push_pdf_url(url);
        }
        paper
    }
}

/// Pull the bare arXiv id out of an entry id URL like
/// `http://arxiv.org/abs/1512.03385v1`
fn extract_arxiv_id(id_url: &str) -> String {
    id_url.trim().rsplit('/').next().unwrap_or("").to_string()
}

#[async_trait]
impl Source for ArxivSource {
    fn id(&self) -> &str {
        "arxiv"
    }

    fn name(&self) -> &str {
        "arXiv"
    }

    async fn search(&self, keyword: &str, limit: usize) -> Result<Vec<Paper>, SourceError> {
        let query = keyword.trim();
        if query.is_empty() {
            return Ok(Vec::new());
        }
        let max_results = limit.clamp(1, 100);

        let response = self
            .client
            .get(ARXIV_API_URL)
            .query(&[
                ("search_query", format!("all:\"{}\"", query)),
                ("start", "0".to_string()),
                ("max_results", max_results.to_string()),
            ])
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(SourceError::Api(format!(
                "arXiv returned status {}",
                response.status()
            )));
        }

        let body = response.bytes().await?;
        let feed = parser::parse(body.as_ref())
            .map_err(|e| SourceError::Parse(format!("Atom: {}", e)))?;
        Ok(feed.entries.into_iter().map(Self::parse_entry).collect())
    }
}
