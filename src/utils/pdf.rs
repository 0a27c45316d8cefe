//! Open-access PDF download with candidate URL collection.

use std::path::{Path, PathBuf};
use std::time::Duration;

use reqwest::Client;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::debug;

use crate::models::Paper;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const MAX_FILENAME_CHARS: usize = 120;

#[derive(Debug, thiserror::Error)]
pub enum PdfError {
    #[error("PDF timeout must be > 0.")]
    InvalidTimeout,

    #[error("No PDF candidate URL found in metadata.")]
    NoCandidates,

    #[error("Failed to download PDF from {attempts} candidate URL(s). Last error: {last_error}")]
    AllFailed { attempts: usize, last_error: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Collect candidate PDF URLs for a record, best first.
///
/// An arXiv mirror link is synthesized when the record carries an arXiv id
/// since it is reliably open access. URLs that look like direct PDFs
/// (`.pdf` suffix, `/pdf/` path, `pdf=` query) are tried before landing
/// pages. Case-insensitive dedup, non-http values dropped.
pub fn collect_candidate_urls(paper: &Paper) -> Vec<String> {
    let mut pdf_like: Vec<String> = Vec::new();
    let mut fallback: Vec<String> = Vec::new();
    let mut seen: Vec<String> = Vec::new();

    let mut add_url = |value: &str| {
        let url = value.trim();
        if url.is_empty() || !url.starts_with("http") {
            return;
        }
        let lowered = url.to_lowercase();
        if seen.contains(&lowered) {
            return;
        }
        let is_pdf_like =
            lowered.ends_with(".pdf") || lowered.contains("/pdf/") || lowered.contains("pdf=");
        seen.push(lowered);
        if is_pdf_like {
            pdf_like.push(url.to_string());
        } else {
            fallback.push(url.to_string());
        }
    };

    if let Some(arxiv_id) = paper.arxiv_id() {
        let arxiv_id = arxiv_id.trim();
        if !arxiv_id.is_empty() {
            add_url(&format!("https://arxiv.org/pdf/{arxiv_id}.pdf"));
        }
    }
    if let Some(primary) = &paper.pdf_url {
        add_url(primary);
    }
    for url in &paper.pdf_urls {
        add_url(url);
    }
    if paper.url.trim().to_lowercase().ends_with(".pdf") {
        add_url(&paper.url);
    }

    pdf_like.extend(fallback);
    pdf_like
}

/// Whether a failed download is worth retrying after an arXiv metadata
/// merge: bot blocks (418), landing pages served instead of PDFs, and
/// records with no candidate URL at all.
pub fn should_try_arxiv_fallback(error_text: Option<&str>) -> bool {
    match error_text {
        None => true,
        Some(text) => {
            let lowered = text.to_lowercase();
            lowered.contains("418") || lowered.contains("non-pdf") || lowered.contains("no pdf")
        }
    }
}

fn sanitize_filename(text: &str) -> String {
    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
    let mut cleaned: String = collapsed
        .chars()
        .map(|c| {
            if matches!(c, '\\' | '/' | ':' | '*' | '?' | '"' | '<' | '>' | '|') {
                '_'
            } else {
                c
            }
        })
        .collect();
    cleaned = cleaned.trim_matches(|c| c == ' ' || c == '.').to_string();
    if cleaned.chars().count() > MAX_FILENAME_CHARS {
        cleaned = cleaned.chars().take(MAX_FILENAME_CHARS).collect();
        cleaned = cleaned.trim_end_matches(|c| c == ' ' || c == '.').to_string();
    }
    if cleaned.is_empty() {
        "paper".to_string()
    } else {
        cleaned
    }
}

fn target_pdf_path(output_dir: &Path, paper: &Paper) -> PathBuf {
    let title = non_empty_or(&paper.title, "paper");
    let stem = match paper.year {
        Some(year) => sanitize_filename(&format!("{year}-{title}")),
        None => sanitize_filename(title),
    };
    let path = output_dir.join(format!("{stem}.pdf"));
    if !path.exists() {
        return path;
    }
    let mut index = 2;
    loop {
        let candidate = output_dir.join(format!("{stem}-{index}.pdf"));
        if !candidate.exists() {
            return candidate;
        }
        index += 1;
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

fn is_pdf_response(response: &reqwest::Response, first_chunk: &[u8], source_url: &str) -> bool {
    let content_type = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("")
        .to_lowercase();
    if content_type.contains("application/pdf") {
        return true;
    }
    if first_chunk.starts_with(b"%PDF") {
        return true;
    }
    let final_url = response.url().as_str();
    let effective = if final_url.is_empty() { source_url } else { final_url };
    effective.to_lowercase().ends_with(".pdf")
}

/// Try each candidate URL in order and stream the first real PDF to disk.
///
/// A response only counts when it looks like a PDF (content type, `%PDF`
/// magic, or a `.pdf` final URL after redirects); HTML landing pages are
/// skipped and the next candidate is tried.
pub async fn download_pdf(
    paper: &Paper,
    output_dir: &Path,
    timeout: Duration,
) -> Result<PathBuf, PdfError> {
    if timeout.is_zero() {
        return Err(PdfError::InvalidTimeout);
    }
    let urls = collect_candidate_urls(paper);
    if urls.is_empty() {
        return Err(PdfError::NoCandidates);
    }

    fs::create_dir_all(output_dir).await?;
    let client = Client::builder()
        .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
        .connect_timeout(CONNECT_TIMEOUT)
        .build()
        .map_err(|e| PdfError::AllFailed {
            attempts: urls.len(),
            last_error: e.to_string(),
        })?;

    let mut last_error = String::new();
    for url in &urls {
        debug!(url, "trying PDF candidate");
        let mut response = match client.get(url).timeout(timeout).send().await {
            Ok(response) => response,
            Err(err) => {
                last_error = format!("{url} -> {err}");
                continue;
            }
        };
        if let Err(err) = response.error_for_status_ref() {
            last_error = format!("{url} -> {err}");
            continue;
        }

        let first_chunk = match response.chunk().await {
            Ok(Some(chunk)) if !chunk.is_empty() => chunk,
            Ok(_) => {
                last_error = format!("{url} -> empty body");
                continue;
            }
            Err(err) => {
                last_error = format!("{url} -> {err}");
                continue;
            }
        };
        if !is_pdf_response(&response, &first_chunk, url) {
            last_error = format!("{url} -> non-pdf response");
            continue;
        }

        let target_path = target_pdf_path(output_dir, paper);
        let mut file = fs::File::create(&target_path).await?;
        file.write_all(&first_chunk).await?;
        let mut failed = false;
        loop {
            match response.chunk().await {
                Ok(Some(chunk)) => file.write_all(&chunk).await?,
                Ok(None) => break,
                Err(err) => {
                    last_error = format!("{url} -> {err}");
                    failed = true;
                    break;
                }
            }
        }
        file.flush().await?;
        if failed {
            // Partial file from a dropped connection; remove and move on.
            let _ = fs::remove_file(&target_path).await;
            continue;
        }
        return Ok(target_path);
    }

    Err(PdfError::AllFailed {
        attempts: urls.len(),
        last_error,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_arxiv_link_synthesized_first() {
        let mut paper = Paper::new("Focal Loss");
        paper
            .external_ids
            .insert("ArXiv".to_string(), "1708.02002".to_string());
        paper.pdf_url = Some("https://example.com/landing".to_string());
        paper.pdf_urls = vec![
            "https://example.com/landing".to_string(),
            "https://example.com/paper.pdf".to_string(),
        ];
        let urls = collect_candidate_urls(&paper);
        assert_eq!(
            urls,
            vec![
                "https://arxiv.org/pdf/1708.02002.pdf",
                "https://example.com/paper.pdf",
                "https://example.com/landing",
            ]
        );
    }

    #[test]
    fn test_candidates_dedupe_case_insensitively() {
        let mut paper = Paper::new("x");
        paper.pdf_url = Some("https://Example.com/A.PDF".to_string());
        paper.pdf_urls = vec!["https://example.com/a.pdf".to_string()];
        assert_eq!(collect_candidate_urls(&paper).len(), 1);
    }

    #[test]
    fn test_landing_url_used_only_when_pdf() {
        let mut paper = Paper::new("x");
        paper.url = "https://example.com/abs/123".to_string();
        assert!(collect_candidate_urls(&paper).is_empty());
        paper.url = "https://example.com/files/123.pdf".to_string();
        assert_eq!(collect_candidate_urls(&paper).len(), 1);
    }

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(sanitize_filename("  A/B:C*D?  "), "A_B_C_D");
        assert_eq!(sanitize_filename("..."), "paper");
        let long = "x".repeat(200);
        assert_eq!(sanitize_filename(&long).chars().count(), MAX_FILENAME_CHARS);
    }

    #[test]
    fn test_target_path_collision_suffix() {
        let dir = tempfile::tempdir().unwrap();
        let mut paper = Paper::new("Focal Loss");
        paper.year = Some(2017);
        let first = target_pdf_path(dir.path(), &paper);
        assert_eq!(first.file_name().unwrap(), "2017-Focal Loss.pdf");
        std::fs::write(&first, b"x").unwrap();
        let second = target_pdf_path(dir.path(), &paper);
        assert_eq!(second.file_name().unwrap(), "2017-Focal Loss-2.pdf");
    }

    #[test]
    fn test_arxiv_fallback_trigger() {
        assert!(should_try_arxiv_fallback(None));
        assert!(should_try_arxiv_fallback(Some("HTTP 418 I'm a teapot")));
        assert!(should_try_arxiv_fallback(Some("url -> non-pdf response")));
        assert!(should_try_arxiv_fallback(Some("No PDF candidate URL found in metadata.")));
        assert!(!should_try_arxiv_fallback(Some("connection refused")));
    }

    #[tokio::test]
    async fn test_zero_timeout_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let err = download_pdf(&Paper::new("x"), dir.path(), Duration::ZERO)
            .await
            .unwrap_err();
        assert!(matches!(err, PdfError::InvalidTimeout));
    }

    #[tokio::test]
    async fn test_no_candidates_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let err = download_pdf(&Paper::new("x"), dir.path(), Duration::from_secs(5))
            .await
            .unwrap_err();
        assert!(matches!(err, PdfError::NoCandidates));
    }
}
