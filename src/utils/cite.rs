//! GB/T 7714 style citation rendering and the daily citation log.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::Local;

use crate::models::{DocType, Paper};
use crate::resolve::LlmTrace;

/// Resolution provenance recorded beneath each citation
#[derive(Debug, Clone, Copy)]
pub struct CitationMeta<'a> {
    pub keyword: &'a str,
    pub provider: &'a str,
    pub selected_by: &'a str,
    pub llm: Option<&'a LlmTrace>,
}

fn authors_text(paper: &Paper) -> String {
    let names: Vec<&str> = paper
        .authors
        .iter()
        .map(|name| name.trim())
        .filter(|name| !name.is_empty())
        .collect();
    if names.is_empty() {
        return "Unknown Author".to_string();
    }
    if names.len() <= 3 {
        return names.join(", ");
    }
    format!("{}, et al", names[..3].join(", "))
}

/// The record's type tag for rendering, re-inferred from venue/title/DOI
/// hints when the providers never supplied a known type.
fn effective_doc_type(paper: &Paper) -> DocType {
    if paper.doc_type != DocType::Unknown {
        return paper.doc_type;
    }
    DocType::infer(&paper.venue, &paper.title, paper.doi(), &paper.external_ids)
}

fn source_segment(paper: &Paper, year: &str, doc_type: DocType) -> String {
    let pages = paper.pages.as_deref().unwrap_or("").trim();
    match doc_type {
        DocType::Journal => {
            let venue = non_empty_or(&paper.venue, "Unknown Venue");
            let mut segment = format!("{venue}, {year}");
            if let Some(volume) = paper.volume.as_deref().map(str::trim).filter(|v| !v.is_empty()) {
                segment.push_str(&format!(", {volume}"));
                if let Some(issue) =
                    paper.issue.as_deref().map(str::trim).filter(|i| !i.is_empty())
                {
                    segment.push_str(&format!("({issue})"));
                }
            }
            if !pages.is_empty() {
                segment.push_str(&format!(": {pages}"));
            }
            segment
        }
        DocType::Conference => {
            let venue = non_empty_or(&paper.venue, "Unknown Conference");
            let mut segment = format!("{venue}, {year}");
            if !pages.is_empty() {
                segment.push_str(&format!(": {pages}"));
            }
            segment
        }
        _ => {
            let venue = non_empty_or(&paper.venue, "Unknown Source");
            let mut segment = format!("{venue}, {year}");
            if !pages.is_empty() {
                segment.push_str(&format!(": {pages}"));
            }
            segment
        }
    }
}

fn non_empty_or<'a>(value: &'a str, fallback: &'a str) -> &'a str {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        fallback
    } else {
        trimmed
    }
}

/// Render one citation block: the GB/T 7714 line followed by `[meta]`
/// provenance lines and a `---` separator.
pub fn build_citation_text(paper: &Paper, meta: &CitationMeta<'_>) -> String {
    let title = non_empty_or(&paper.title, "Unknown Title");
    let year = paper
        .year
        .map(|y| y.to_string())
        .unwrap_or_else(|| "n.d.".to_string());
    let doi = paper.doi();
    let authors = authors_text(paper);
    let doc_type = effective_doc_type(paper);
    let timestamp = Local::now().format("%Y-%m-%d %H:%M:%S");
    let source_info = source_segment(paper, &year, doc_type);

    let mut citation = format!("{authors}. {title}[{doc_type}]. {source_info}.");
    if let Some(doi) = doi {
        citation.push_str(&format!(" DOI:{doi}."));
    }

    let url = non_empty_or(&paper.url, "N/A");
    let (confidence, matched_title, similarity, titles, reason) = match meta.llm {
        Some(trace) => (
            format!("{}", trace.confidence),
            trace.matched_title.as_str(),
            format!("{:.3}", trace.similarity),
            trace.proposed_titles.join(" | "),
            non_empty_or(&trace.reason, "N/A").to_string(),
        ),
        None => (
            "N/A".to_string(),
            "N/A",
            "N/A".to_string(),
            "N/A".to_string(),
            "N/A".to_string(),
        ),
    };

    let lines = [
        citation,
        format!(
            "[meta] keyword={} provider={} selected_by={} time={}",
            meta.keyword, meta.provider, meta.selected_by, timestamp
        ),
        format!("[meta] doi={} url={}", doi.unwrap_or("N/A"), url),
        format!(
            "[meta] llm_confidence={confidence} matched_title={matched_title} similarity={similarity}"
        ),
        format!("[meta] llm_titles={titles}"),
        format!("[meta] llm_reason={reason}"),
        "---".to_string(),
        String::new(),
    ];
    lines.join("\n") + "\n"
}

/// Append a citation block to today's log file (`YYYY-MM-DD.txt`) in the
/// output directory, creating both as needed.
pub fn append_daily_citation(output_dir: &Path, citation_text: &str) -> std::io::Result<PathBuf> {
    std::fs::create_dir_all(output_dir)?;
    let date_name = Local::now().format("%Y-%m-%d");
    let citation_path = output_dir.join(format!("{date_name}.txt"));
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&citation_path)?;
    file.write_all(citation_text.as_bytes())?;
    Ok(citation_path)
}
