//! Paper model representing a bibliographic record from any provider.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Venue/title substrings that suggest a conference publication.
pub const CONFERENCE_HINTS: &[&str] = &[
    "conference",
    "proceedings",
    "symposium",
    "workshop",
    "cvpr",
    "iccv",
    "eccv",
    "neurips",
    "nips",
    "icml",
    "iclr",
    "aaai",
    "ijcai",
    "acl",
    "emnlp",
    "naacl",
    "coling",
    "kdd",
    "siggraph",
];

/// Venue substrings that suggest a journal publication.
pub const JOURNAL_HINTS: &[&str] = &["journal", "transactions", "letters", "review"];

/// Document-type tag taxonomy used for citation formatting.
///
/// Tags follow the GB/T 7714 convention: `J` journal, `C` conference,
/// `M` monograph, `A` chapter, `D` dissertation, `R` report, `N` news,
/// `S` standard, `P` patent, `DB` dataset, `EB/OL` online/preprint,
/// `Z` unknown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DocType {
    #[serde(rename = "J")]
    Journal,
    #[serde(rename = "C")]
    Conference,
    #[serde(rename = "M")]
    Monograph,
    #[serde(rename = "A")]
    Chapter,
    #[serde(rename = "D")]
    Dissertation,
    #[serde(rename = "R")]
    Report,
    #[serde(rename = "N")]
    News,
    #[serde(rename = "S")]
    Standard,
    #[serde(rename = "P")]
    Patent,
    #[serde(rename = "DB")]
    Dataset,
    #[serde(rename = "EB/OL")]
    Online,
    #[serde(rename = "Z")]
    Unknown,
}

impl DocType {
    /// Returns the citation tag for this document type
    pub fn tag(&self) -> &'static str {
        match self {
            DocType::Journal => "J",
            DocType::Conference => "C",
            DocType::Monograph => "M",
            DocType::Chapter => "A",
            DocType::Dissertation => "D",
            DocType::Report => "R",
            DocType::News => "N",
            DocType::Standard => "S",
            DocType::Patent => "P",
            DocType::Dataset => "DB",
            DocType::Online => "EB/OL",
            DocType::Unknown => "Z",
        }
    }

    /// Parse a tag string back into a document type
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag.trim().to_uppercase().as_str() {
            "J" => Some(DocType::Journal),
            "C" => Some(DocType::Conference),
            "M" => Some(DocType::Monograph),
            "A" => Some(DocType::Chapter),
            "D" => Some(DocType::Dissertation),
            "R" => Some(DocType::Report),
            "N" => Some(DocType::News),
            "S" => Some(DocType::Standard),
            "P" => Some(DocType::Patent),
            "DB" => Some(DocType::Dataset),
            "EB/OL" => Some(DocType::Online),
            "Z" => Some(DocType::Unknown),
            _ => None,
        }
    }

    /// Infer a document type from venue/title/DOI hints when the provider's
    /// own type is missing or unknown.
    ///
    /// arXiv markers win over everything else, then conference hints, then
    /// journal hints.
    pub fn infer(
        venue: &str,
        title: &str,
        doi: Option<&str>,
        external_ids: &BTreeMap<String, String>,
    ) -> Self {
        let venue_l = venue.to_lowercase();
        let title_l = title.to_lowercase();
        let doi_l = doi.unwrap_or("").to_lowercase();

        if external_ids.contains_key("ArXiv")
            || venue_l.contains("arxiv")
            || title_l.contains("arxiv")
            || doi_l.contains("arxiv")
        {
            return DocType::Online;
        }
        for haystack in [&venue_l, &title_l, &doi_l] {
            if CONFERENCE_HINTS.iter().any(|hint| haystack.contains(hint)) {
                return DocType::Conference;
            }
        }
        if JOURNAL_HINTS.iter().any(|hint| venue_l.contains(hint)) {
            return DocType::Journal;
        }
        DocType::Unknown
    }
}

impl std::fmt::Display for DocType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.tag())
    }
}

/// A normalized paper record, the common currency of the pipeline.
///
/// Every provider adapter emits this shape; the resolution core never sees
/// a provider's native format. Records are value types: enrichment always
/// builds a new merged record instead of mutating one in place.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Paper {
    /// Provider-native identifier, if any
    pub paper_id: Option<String>,

    /// Paper title
    pub title: String,

    /// Abstract text (may be empty)
    #[serde(rename = "abstract")]
    pub abstract_text: String,

    /// Ordered author display names
    pub authors: Vec<String>,

    /// Publication year
    pub year: Option<i32>,

    /// Full publication date (ISO format) when the provider has one
    pub publication_date: Option<String>,

    /// Venue name (journal, conference, or repository)
    pub venue: String,

    /// Publisher name
    pub publisher: Option<String>,

    /// Publisher place
    pub publisher_place: Option<String>,

    /// Document-type tag
    pub doc_type: DocType,

    /// Raw provider type string, before tag mapping
    pub raw_type: Option<String>,

    /// Volume
    pub volume: Option<String>,

    /// Issue
    pub issue: Option<String>,

    /// Page range
    pub pages: Option<String>,

    /// Citation count (never negative)
    pub citation_count: u32,

    /// External identifier scheme -> value (e.g. "DOI", "ArXiv")
    pub external_ids: BTreeMap<String, String>,

    /// Primary PDF URL
    pub pdf_url: Option<String>,

    /// Ordered PDF URL candidates, case-insensitively deduplicated
    pub pdf_urls: Vec<String>,

    /// Landing-page URL
    pub url: String,
}

impl Paper {
    /// Create an empty record with just a title
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            paper_id: None,
            title: title.into(),
            abstract_text: String::new(),
            authors: Vec::new(),
            year: None,
            publication_date: None,
            venue: String::new(),
            publisher: None,
            publisher_place: None,
            doc_type: DocType::Unknown,
            raw_type: None,
            volume: None,
            issue: None,
            pages: None,
            citation_count: 0,
            external_ids: BTreeMap::new(),
            pdf_url: None,
            pdf_urls: Vec::new(),
            url: String::new(),
        }
    }

    /// DOI from the external-id map, either key casing
    pub fn doi(&self) -> Option<&str> {
        self.external_ids
            .get("DOI")
            .or_else(|| self.external_ids.get("doi"))
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
    }

    /// arXiv identifier from the external-id map, either key casing
    pub fn arxiv_id(&self) -> Option<&str> {
        self.external_ids
            .get("ArXiv")
            .or_else(|| self.external_ids.get("arXiv"))
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
    }

    /// Whether this record looks like a preprint (arXiv id or arXiv venue)
    pub fn is_preprint(&self) -> bool {
        self.arxiv_id().is_some() || self.venue.eq_ignore_ascii_case("arxiv")
    }

    /// Append a PDF URL candidate, skipping non-http values and
    /// case-insensitive duplicates. The first accepted URL also becomes the
    /// primary `pdf_url` if none is set.
    pub fn push_pdf_url(&mut self, url: impl Into<String>) {
        let url = url.into();
        let trimmed = url.trim();
        if !trimmed.starts_with("http") {
            return;
        }
        let lowered = trimmed.to_lowercase();
        if self.pdf_urls.iter().any(|u| u.to_lowercase() == lowered) {
            return;
        }
        self.pdf_urls.push(trimmed.to_string());
        if self.pdf_url.is_none() {
            self.pdf_url = Some(trimmed.to_string());
        }
    }
}

/// Whether a DOI points at an arXiv deposit rather than a publisher record
pub fn is_arxiv_doi(doi: &str) -> bool {
    let normalized = doi.to_lowercase();
    normalized.starts_with("10.48550/arxiv.") || normalized.contains("arxiv")
}
