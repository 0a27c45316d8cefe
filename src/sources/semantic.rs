//! Semantic Scholar provider implementation.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use crate::models::{DocType, Paper};
use crate::sources::{Source, SourceError};
use crate::utils::RateLimiter;

const SEMANTIC_API_BASE: &str = "https://api.semanticscholar.org/graph/v1";

/// Minimum spacing between Semantic Scholar requests. The public API starts
/// returning 429 well below 1 rps without a key.
pub const S2_MIN_REQUEST_INTERVAL: Duration = Duration::from_millis(1050);

const FIELDS: &str = "paperId,title,abstract,authors,year,publicationDate,venue,\
publicationTypes,citationCount,openAccessPdf,externalIds,url";

/// Semantic Scholar Graph API source.
///
/// All requests go through an injected [`RateLimiter`]; a 429 response is
/// surfaced as the distinct [`SourceError::RateLimit`] so the pipeline can
/// fall back to another provider.
#[derive(Debug, Clone)]
pub struct SemanticScholarSource {
    client: Client,
    api_key: Option<String>,
    limiter: Arc<RateLimiter>,
}

impl SemanticScholarSource {
    /// Create a new source with an optional API key and injected limiter
    pub fn new(api_key: Option<String>, limiter: Arc<RateLimiter>) -> Result<Self, SourceError> {
        let client = Client::builder()
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self {
            client,
            api_key,
            limiter,
        })
    }

    fn add_api_key_if_present(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        if let Some(ref key) = self.api_key {
            builder.header("x-api-key", key)
        } else {
            builder
        }
    }

    async fn get(&self, url: String, query: &[(&str, String)]) -> Result<reqwest::Response, SourceError> {
        self.limiter.acquire().await;
        let response = self
            .add_api_key_if_present(self.client.get(url).query(query))
            .send()
            .await?;
        if response.status() == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(SourceError::RateLimit);
        }
        Ok(response)
    }

    fn parse_paper(data: S2Paper) -> Paper {
        let mut external_ids: BTreeMap<String, String> = BTreeMap::new();
        for (scheme, value) in data.external_ids.unwrap_or_default() {
            let text = match value {
                serde_json::Value::String(s) => s.trim().to_string(),
                serde_json::Value::Number(n) => n.to_string(),
                _ => continue,
            };
            if !text.is_empty() {
                external_ids.insert(scheme, text);
            }
        }

        let title = data.title.unwrap_or_default().trim().to_string();
        let venue = data.venue.unwrap_or_default().trim().to_string();
        let doi = external_ids
            .get("DOI")
            .or_else(|| external_ids.get("doi"))
            .cloned();
        let doc_type = map_publication_types(
            data.publication_types.as_deref(),
            &title,
            &venue,
            doi.as_deref(),
            &external_ids,
        );

        let mut paper = Paper::new(title);
        paper.paper_id = data.paper_id.filter(|id| !id.trim().is_empty());
        paper.abstract_text = data.r#abstract.unwrap_or_default();
        paper.authors = data
            .authors
            .unwrap_or_default()
            .into_iter()
            .filter_map(|a| a.name)
            .map(|name| name.trim().to_string())
            .filter(|name| !name.is_empty())
            .collect();
        paper.year = data.year;
        paper.publication_date = data
            .publication_date
            .map(|d| d.trim().to_string())
            .filter(|d| !d.is_empty());
        paper.venue = venue;
        paper.doc_type = doc_type;
        paper.raw_type = data
            .publication_types
            .filter(|types| !types.is_empty())
            .map(|types| types.join(","));
        paper.citation_count = data.citation_count.unwrap_or(0).max(0) as u32;
        paper.url = data.url.unwrap_or_default();

        if let Some(open_access) = data.open_access_pdf {
            if let Some(url) = open_access.url {
                paper.push_pdf_url(url);
            }
        }
        let arxiv_id = external_ids
            .get("ArXiv")
            .or_else(|| external_ids.get("arXiv"))
            .cloned();
        if let Some(arxiv_id) = arxiv_id {
            paper.push_pdf_url(format!("https://arxiv.org/pdf/{}.pdf", arxiv_id));
        }
        paper.external_ids = external_ids;
        paper
    }
}

/// Map Semantic Scholar publicationTypes to a document-type tag, falling
/// back to venue/title/DOI hints when the list is empty or unmapped.
fn map_publication_types(
    publication_types: Option<&[String]>,
    title: &str,
    venue: &str,
    doi: Option<&str>,
    external_ids: &BTreeMap<String, String>,
) -> DocType {
    let normalized: Vec<String> = publication_types
        .unwrap_or_default()
        .iter()
        .map(|t| t.trim().to_lowercase())
        .collect();
    let has = |name: &str| normalized.iter().any(|t| t == name);

    if has("journalarticle") || has("review") {
        return DocType::Journal;
    }
    if has("conference") {
        return DocType::Conference;
    }
    if has("book") {
        return DocType::Monograph;
    }
    if has("bookchapter") {
        return DocType::Chapter;
    }
    if has("thesis") {
        return DocType::Dissertation;
    }
    if has("report") {
        return DocType::Report;
    }
    if has("preprint") {
        return DocType::Online;
    }
    DocType::infer(venue, title, doi, external_ids)
}

#[async_trait]
impl Source for SemanticScholarSource {
    fn id(&self) -> &str {
        "s2"
    }

    fn name(&self) -> &str {
        "Semantic Scholar"
    }

    fn supports_doi_lookup(&self) -> bool {
        true
    }

    async fn search(&self, keyword: &str, limit: usize) -> Result<Vec<Paper>, SourceError> {
        let response = self
            .get(
                format!("{}/paper/search", SEMANTIC_API_BASE),
                &[
                    ("query", keyword.to_string()),
                    ("limit", limit.to_string()),
                    ("fields", FIELDS.to_string()),
                ],
            )
            .await?;

        if !response.status().is_success() {
            return Err(SourceError::Api(format!(
                "Semantic Scholar returned status {}",
                response.status()
            )));
        }

        let data: S2SearchResponse = response
            .json()
            .await
            .map_err(|e| SourceError::Parse(format!("Failed to parse JSON: {}", e)))?;

        Ok(data
            .data
            .unwrap_or_default()
            .into_iter()
            .map(Self::parse_paper)
            .collect())
    }

    async fn get_by_doi(&self, doi: &str) -> Result<Option<Paper>, SourceError> {
        let doi = doi.trim();
        if doi.is_empty() {
            return Ok(None);
        }

        let encoded = urlencoding::encode(&format!("DOI:{}", doi)).into_owned();
        let response = self
            .get(
                format!("{}/paper/{}", SEMANTIC_API_BASE, encoded),
                &[("fields", FIELDS.to_string())],
            )
            .await?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(SourceError::Api(format!(
                "Semantic Scholar returned status {}",
                response.status()
            )));
        }

        let data: S2Paper = response
            .json()
            .await
            .map_err(|e| SourceError::Parse(format!("Failed to parse JSON: {}", e)))?;
        Ok(Some(Self::parse_paper(data)))
    }
}

#[derive(Debug, Deserialize)]
struct S2SearchResponse {
    data: Option<Vec<S2Paper>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct S2Paper {
    paper_id: Option<String>,
    title: Option<String>,
    r#abstract: Option<String>,
    authors: Option<Vec<S2Author>>,
    year: Option<i32>,
    publication_date: Option<String>,
    venue: Option<String>,
    publication_types: Option<Vec<String>>,
    citation_count: Option<i64>,
    open_access_pdf: Option<S2OpenAccessPdf>,
    external_ids: Option<BTreeMap<String, serde_json::Value>>,
    url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct S2Author {
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct S2OpenAccessPdf {
    url: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_paper_maps_fields_and_pdf_urls() {
        let raw = serde_json::json!({
            "paperId": "abc123",
            "title": "Deep Residual Learning for Image Recognition",
            "abstract": "We present a residual learning framework.",
            "authors": [{"name": "Kaiming He"}, {"name": ""}],
            "year": 2016,
            "publicationDate": "2016-06-27",
            "venue": "CVPR",
            "publicationTypes": ["Conference"],
            "citationCount": 150000,
            "openAccessPdf": {"url": "https://example.com/resnet.pdf"},
            "externalIds": {"DOI": "10.1109/CVPR.2016.90", "ArXiv": "1512.03385", "CorpusId": 206594692},
            "url": "https://semanticscholar.org/paper/abc123"
        });
        let parsed: S2Paper = serde_json::from_value(raw).unwrap();
        let paper = SemanticScholarSource::parse_paper(parsed);

        assert_eq!(paper.paper_id.as_deref(), Some("abc123"));
        assert_eq!(paper.doc_type, DocType::Conference);
        assert_eq!(paper.authors, vec!["Kaiming He".to_string()]);
        assert_eq!(paper.citation_count, 150_000);
        assert_eq!(paper.doi(), Some("10.1109/CVPR.2016.90"));
        assert_eq!(paper.external_ids.get("CorpusId").map(String::as_str), Some("206594692"));
        assert_eq!(
            paper.pdf_urls,
            vec![
                "https://example.com/resnet.pdf".to_string(),
                "https://arxiv.org/pdf/1512.03385.pdf".to_string(),
            ]
        );
    }

    #[test]
    fn test_publication_type_mapping_falls_back_to_hints() {
        let ids = BTreeMap::new();
        assert_eq!(
            map_publication_types(Some(&["JournalArticle".to_string()]), "", "", None, &ids),
            DocType::Journal
        );
        assert_eq!(
            map_publication_types(Some(&["Preprint".to_string()]), "", "", None, &ids),
            DocType::Online
        );
        assert_eq!(
            map_publication_types(None, "A study", "NeurIPS workshop", None, &ids),
            DocType::Conference
        );
        assert_eq!(
            map_publication_types(None, "A study", "", None, &ids),
            DocType::Unknown
        );
    }

    #[test]
    fn test_negative_citation_count_is_clamped() {
        let raw = serde_json::json!({"title": "T", "citationCount": -5});
        let parsed: S2Paper = serde_json::from_value(raw).unwrap();
        let paper = SemanticScholarSource::parse_paper(parsed);
        assert_eq!(paper.citation_count, 0);
    }
}
