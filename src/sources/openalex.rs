//! OpenAlex provider implementation.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::collections::HashMap;
use std::time::Duration;

use crate::models::{DocType, Paper};
use crate::sources::{Source, SourceError};

const OPENALEX_WORKS_URL: &str = "https://api.openalex.org/works";

/// OpenAlex works API source.
///
/// Supplying a contact email via `mailto` moves requests into the polite
/// pool, so it is threaded through from configuration when present.
#[derive(Debug, Clone)]
pub struct OpenAlexSource {
    client: Client,
    contact_email: Option<String>,
}

impl OpenAlexSource {
    /// Create a new source with an optional polite-pool contact email
    pub fn new(contact_email: Option<String>) -> Result<Self, SourceError> {
        let client = Client::builder()
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self {
            client,
            contact_email,
        })
    }

    async fn get_works(&self, query: Vec<(&str, String)>) -> Result<Vec<Work>, SourceError> {
        let mut query = query;
        if let Some(ref email) = self.contact_email {
            query.push(("mailto", email.clone()));
        }
        let response = self.client.get(OPENALEX_WORKS_URL).query(&query).send().await?;
        if !response.status().is_success() {
            return Err(SourceError::Api(format!(
                "OpenAlex returned status {}",
                response.status()
            )));
        }
        let data: WorksResponse = response
            .json()
            .await
            .map_err(|e| SourceError::Parse(format!("Failed to parse JSON: {}", e)))?;
        Ok(data.results.unwrap_or_default())
    }

    fn parse_work(work: Work) -> Paper {
        let doi = work
            .doi
            .as_deref()
            .map(strip_doi_url)
            .filter(|d| !d.is_empty());

        let mut external_ids: BTreeMap<String, String> = BTreeMap::new();
        if let Some(ref doi) = doi {
            external_ids.insert("DOI".to_string(), doi.clone());
        }
        if let Some(arxiv_id) = work
            .ids
            .as_ref()
            .and_then(|ids| ids.arxiv.as_deref())
            .and_then(normalize_arxiv_id)
        {
            external_ids.insert("ArXiv".to_string(), arxiv_id);
        }

        let title = work.display_name.clone().unwrap_or_default().trim().to_string();
        let venue = extract_venue(&work);
        let raw_type = work
            .r#type
            .as_deref()
            .map(|t| t.trim().to_lowercase())
            .filter(|t| !t.is_empty());
        let doc_type = map_work_type(
            raw_type.as_deref(),
            &venue,
            &title,
            doi.as_deref(),
            &external_ids,
        );

        let publisher = work
            .primary_location
            .as_ref()
            .and_then(|loc| loc.source.as_ref())
            .and_then(|source| source.host_organization_name.as_deref())
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());

        let mut paper = Paper::new(title);
        paper.paper_id = work.id.clone().filter(|id| !id.trim().is_empty());
        paper.abstract_text = restore_abstract(work.abstract_inverted_index.as_ref());
        paper.authors = work
            .authorships
            .unwrap_or_default()
            .into_iter()
            .filter_map(|a| a.author)
            .filter_map(|a| a.display_name)
            .map(|name| name.trim().to_string())
            .filter(|name| !name.is_empty())
            .collect();
        paper.year = work.publication_year;
        paper.publication_date = work
            .publication_date
            .map(|d| d.trim().to_string())
            .filter(|d| !d.is_empty());
        paper.venue = venue;
        paper.publisher = publisher;
        paper.doc_type = doc_type;
        paper.raw_type = raw_type;
        paper.citation_count = work.cited_by_count.unwrap_or(0).max(0) as u32;
        paper.url = work.id.unwrap_or_default();

        if let Some(ref biblio) = work.biblio {
            paper.volume = non_empty(biblio.volume.as_deref());
            paper.issue = non_empty(biblio.issue.as_deref());
            paper.pages = join_pages(biblio.first_page.as_deref(), biblio.last_page.as_deref());
        }

        for location in [work.best_oa_location.as_ref(), work.primary_location.as_ref()]
            .into_iter()
            .flatten()
        {
            if let Some(ref url) = location.pdf_url {
                paper.push_pdf_url(url.clone());
            }
            if let Some(ref url) = location.landing_page_url {
                paper.push_pdf_url(url.clone());
            }
        }
        if let Some(oa_url) = work.open_access.and_then(|oa| oa.oa_url) {
            paper.push_pdf_url(oa_url);
        }
        for location in work.locations.unwrap_or_default() {
            if let Some(url) = location.pdf_url {
                paper.push_pdf_url(url);
            }
            if let Some(url) = location.landing_page_url {
                paper.push_pdf_url(url);
            }
        }
        if let Some(arxiv_id) = external_ids.get("ArXiv") {
            paper.push_pdf_url(format!("https://arxiv.org/pdf/{}.pdf", arxiv_id));
        }
        paper.external_ids = external_ids;
        paper
    }
}

fn strip_doi_url(doi: &str) -> String {
    doi.trim()
        .strip_prefix("https://doi.org/")
        .or_else(|| doi.trim().strip_prefix("http://doi.org/"))
        .unwrap_or(doi.trim())
        .to_string()
}

fn normalize_arxiv_id(value: &str) -> Option<String> {
    let mut text = value.trim();
    for prefix in [
        "https://arxiv.org/abs/",
        "http://arxiv.org/abs/",
        "arXiv:",
        "arxiv:",
    ] {
        text = text.strip_prefix(prefix).unwrap_or(text);
    }
    if text.is_empty() {
        None
    } else {
        Some(text.to_string())
    }
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value.map(str::trim).filter(|v| !v.is_empty()).map(String::from)
}

fn join_pages(first: Option<&str>, last: Option<&str>) -> Option<String> {
    match (non_empty(first), non_empty(last)) {
        (Some(first), Some(last)) => Some(format!("{}-{}", first, last)),
        (Some(first), None) => Some(first),
        (None, Some(last)) => Some(last),
        (None, None) => None,
    }
}

fn extract_venue(work: &Work) -> String {
    if let Some(name) = work
        .primary_location
        .as_ref()
        .and_then(|loc| loc.source.as_ref())
        .and_then(|source| source.display_name.as_deref())
        .map(str::trim)
        .filter(|name| !name.is_empty())
    {
        return name.to_string();
    }
    for location in work.locations.as_deref().unwrap_or_default() {
        if let Some(name) = location
            .source
            .as_ref()
            .and_then(|source| source.display_name.as_deref())
            .map(str::trim)
            .filter(|name| !name.is_empty())
        {
            return name.to_string();
        }
    }
    String::new()
}

fn map_work_type(
    work_type: Option<&str>,
    venue: &str,
    title: &str,
    doi: Option<&str>,
    external_ids: &BTreeMap<String, String>,
) -> DocType {
    match work_type {
        Some("journal-article") => DocType::Journal,
        Some("proceedings-article") => DocType::Conference,
        Some("book") => DocType::Monograph,
        Some("book-chapter") => DocType::Chapter,
        Some("dissertation") => DocType::Dissertation,
        Some("report") => DocType::Report,
        Some("dataset") => DocType::Dataset,
        Some("posted-content") => DocType::Online,
        _ => DocType::infer(venue, title, doi, external_ids),
    }
}

/// Rebuild abstract text from OpenAlex's inverted index representation
fn restore_abstract(inverted: Option<&HashMap<String, Vec<i64>>>) -> String {
    let Some(inverted) = inverted else {
        return String::new();
    };
    let mut positions: Vec<(i64, &str)> = Vec::new();
    for (token, indexes) in inverted {
        for index in indexes {
            positions.push((*index, token.as_str()));
        }
    }
    positions.sort_by_key(|(index, _)| *index);
    positions
        .into_iter()
        .map(|(_, token)| token)
        .collect::<Vec<_>>()
        .join(" ")
        .trim()
        .to_string()
}

#[async_trait]
impl Source for OpenAlexSource {
    fn id(&self) -> &str {
        "openalex"
    }

    fn name(&self) -> &str {
        "OpenAlex"
    }

    fn supports_doi_lookup(&self) -> bool {
        true
    }

    async fn search(&self, keyword: &str, limit: usize) -> Result<Vec<Paper>, SourceError> {
        let per_page = limit.clamp(1, 200);
        let works = self
            .get_works(vec![
                ("search", keyword.to_string()),
                ("per-page", per_page.to_string()),
            ])
            .await?;
        Ok(works.into_iter().map(Self::parse_work).collect())
    }

    async fn get_by_doi(&self, doi: &str) -> Result<Option<Paper>, SourceError> {
        let doi = doi.trim();
        if doi.is_empty() {
            return Ok(None);
        }

        // OpenAlex indexes DOIs in URL form; try the bare form first.
        let filters = [
            format!("doi:{}", doi),
            format!("doi:https://doi.org/{}", doi),
        ];
        for filter in filters {
            let works = self
                .get_works(vec![("filter", filter), ("per-page", "3".to_string())])
                .await?;
            if let Some(work) = works.into_iter().next() {
                return Ok(Some(Self::parse_work(work)));
            }
        }
        Ok(None)
    }
}

#[derive(Debug, Deserialize)]
struct WorksResponse {
    results: Option<Vec<Work>>,
}

#[derive(Debug, Deserialize)]
struct Work {
    id: Option<String>,
    display_name: Option<String>,
    doi: Option<String>,
    publication_year: Option<i32>,
    publication_date: Option<String>,
    r#type: Option<String>,
    cited_by_count: Option<i64>,
    ids: Option<WorkIds>,
    biblio: Option<Biblio>,
    authorships: Option<Vec<Authorship>>,
    abstract_inverted_index: Option<HashMap<String, Vec<i64>>>,
    primary_location: Option<Location>,
    best_oa_location: Option<Location>,
    open_access: Option<OpenAccess>,
    locations: Option<Vec<Location>>,
}

#[derive(Debug, Deserialize)]
struct WorkIds {
    arxiv: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Biblio {
    volume: Option<String>,
    issue: Option<String>,
    first_page: Option<String>,
    last_page: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Authorship {
    author: Option<Author>,
}

#[derive(Debug, Deserialize)]
struct Author {
    display_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Location {
    pdf_url: Option<String>,
    landing_page_url: Option<String>,
    source: Option<LocationSource>,
}

#[derive(Debug, Deserialize)]
struct LocationSource {
    display_name: Option<String>,
    host_organization_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAccess {
    oa_url: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_work_maps_biblio_and_doi() {
        let raw = serde_json::json!({
            "id": "https://openalex.org/W2194775991",
            "display_name": "Deep Residual Learning for Image Recognition",
            "doi": "https://doi.org/10.1109/cvpr.2016.90",
            "publication_year": 2016,
            "publication_date": "2016-06-27",
            "type": "proceedings-article",
            "cited_by_count": 120000,
            "biblio": {"volume": null, "issue": null, "first_page": "770", "last_page": "778"},
            "authorships": [{"author": {"display_name": "Kaiming He"}}],
            "primary_location": {
                "pdf_url": "https://example.com/resnet.pdf",
                "landing_page_url": "https://doi.org/10.1109/cvpr.2016.90",
                "source": {"display_name": "CVPR", "host_organization_name": "IEEE"}
            }
        });
        let work: Work = serde_json::from_value(raw).unwrap();
        let paper = OpenAlexSource::parse_work(work);

        assert_eq!(paper.doi(), Some("10.1109/cvpr.2016.90"));
        assert_eq!(paper.doc_type, DocType::Conference);
        assert_eq!(paper.pages.as_deref(), Some("770-778"));
        assert_eq!(paper.venue, "CVPR");
        assert_eq!(paper.publisher.as_deref(), Some("IEEE"));
        assert_eq!(paper.pdf_url.as_deref(), Some("https://example.com/resnet.pdf"));
        assert_eq!(paper.url, "https://openalex.org/W2194775991");
    }

    #[test]
    fn test_restore_abstract_orders_tokens() {
        let mut inverted = HashMap::new();
        inverted.insert("residual".to_string(), vec![2]);
        inverted.insert("We".to_string(), vec![0]);
        inverted.insert("present".to_string(), vec![1]);
        inverted.insert("learning".to_string(), vec![3]);
        assert_eq!(
            restore_abstract(Some(&inverted)),
            "We present residual learning"
        );
        assert_eq!(restore_abstract(None), "");
    }

    #[test]
    fn test_normalize_arxiv_id_strips_prefixes() {
        assert_eq!(
            normalize_arxiv_id("https://arxiv.org/abs/1512.03385").as_deref(),
            Some("1512.03385")
        );
        assert_eq!(normalize_arxiv_id("arXiv:1512.03385").as_deref(), Some("1512.03385"));
        assert_eq!(normalize_arxiv_id("  "), None);
    }

    #[test]
    fn test_join_pages_variants() {
        assert_eq!(join_pages(Some("770"), Some("778")).as_deref(), Some("770-778"));
        assert_eq!(join_pages(Some("770"), None).as_deref(), Some("770"));
        assert_eq!(join_pages(None, Some("778")).as_deref(), Some("778"));
        assert_eq!(join_pages(None, None), None);
    }
}
