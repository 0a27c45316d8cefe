//! Cross-provider enrichment of a selected record.

use crate::models::{DocType, Paper};
use crate::resolve::normalize_text;

/// Minimum weighted match score for a backup record to be accepted
const MIN_ACCEPT_SCORE: f64 = 20.0;

const DOI_MATCH_SCORE: f64 = 100.0;
const EXACT_TITLE_SCORE: f64 = 50.0;
const TITLE_CONTAINMENT_SCORE: f64 = 20.0;
const SAME_YEAR_SCORE: f64 = 8.0;
const ADJACENT_YEAR_SCORE: f64 = 3.0;

/// Pick the most plausible backup-provider match for the selected record.
///
/// Weighted score: exact DOI +100, exact normalized title +50 (else +20 for
/// containment either direction), same year +8 (within one year +3). A best
/// candidate below 20 is rejected - enrichment then simply does not happen.
pub fn pick_best_backup_match<'a>(primary: &Paper, candidates: &'a [Paper]) -> Option<&'a Paper> {
    let primary_title = normalize_text(&primary.title);
    let primary_doi = primary.doi().map(str::to_lowercase);

    let mut best: Option<(&Paper, (f64, u32, i64))> = None;
    for candidate in candidates {
        let mut score = 0.0;
        if let (Some(primary_doi), Some(candidate_doi)) = (&primary_doi, candidate.doi()) {
            if *primary_doi == candidate_doi.to_lowercase() {
                score += DOI_MATCH_SCORE;
            }
        }

        let candidate_title = normalize_text(&candidate.title);
        if !primary_title.is_empty() && !candidate_title.is_empty() {
            if candidate_title == primary_title {
                score += EXACT_TITLE_SCORE;
            } else if candidate_title.contains(&primary_title)
                || primary_title.contains(&candidate_title)
            {
                score += TITLE_CONTAINMENT_SCORE;
            }
        }

        if let (Some(primary_year), Some(candidate_year)) = (primary.year, candidate.year) {
            if candidate_year == primary_year {
                score += SAME_YEAR_SCORE;
            } else if (candidate_year - primary_year).abs() <= 1 {
                score += ADJACENT_YEAR_SCORE;
            }
        }

        // Tie-break: more cited, then older (seminal-work bias).
        let key = (
            score,
            candidate.citation_count,
            -i64::from(candidate.year.unwrap_or(0)),
        );
        let beats = match &best {
            None => true,
            Some((_, best_key)) => {
                key.0
                    .total_cmp(&best_key.0)
                    .then_with(|| key.1.cmp(&best_key.1))
                    .then_with(|| key.2.cmp(&best_key.2))
                    == std::cmp::Ordering::Greater
            }
        };
        if beats {
            best = Some((candidate, key));
        }
    }

    best.filter(|(_, key)| key.0 >= MIN_ACCEPT_SCORE)
        .map(|(candidate, _)| candidate)
}

/// Merge a backup record into the primary, producing a new record.
///
/// Scalar fields fill only when the primary's are empty; the document type
/// is overridden only when the primary's is unknown and the backup's is
/// not; external ids union with primary winning on collision; authors copy
/// over only when the primary has none; PDF URL candidates union with
/// primary first; the citation count becomes the maximum of the two.
pub fn merge_with_backup(primary: &Paper, backup: &Paper) -> Paper {
    let mut merged = primary.clone();

    fill_string(&mut merged.title, &backup.title);
    fill_string(&mut merged.venue, &backup.venue);
    fill_string(&mut merged.url, &backup.url);
    fill_option(&mut merged.volume, &backup.volume);
    fill_option(&mut merged.issue, &backup.issue);
    fill_option(&mut merged.pages, &backup.pages);
    fill_option(&mut merged.raw_type, &backup.raw_type);
    fill_option(&mut merged.pdf_url, &backup.pdf_url);
    fill_option(&mut merged.publisher, &backup.publisher);
    fill_option(&mut merged.publisher_place, &backup.publisher_place);
    fill_option(&mut merged.publication_date, &backup.publication_date);
    if merged.year.is_none() {
        merged.year = backup.year;
    }

    if merged.doc_type == DocType::Unknown && backup.doc_type != DocType::Unknown {
        merged.doc_type = backup.doc_type;
    }

    for (scheme, value) in &backup.external_ids {
        merged
            .external_ids
            .entry(scheme.clone())
            .or_insert_with(|| value.clone());
    }

    if merged.authors.is_empty() && !backup.authors.is_empty() {
        merged.authors = backup.authors.clone();
    }

    let mut pdf_urls: Vec<String> = Vec::new();
    let mut seen = std::collections::HashSet::new();
    for url in primary.pdf_urls.iter().chain(backup.pdf_urls.iter()) {
        let trimmed = url.trim();
        if trimmed.starts_with("http") && seen.insert(trimmed.to_lowercase()) {
            pdf_urls.push(trimmed.to_string());
        }
    }
    merged.pdf_urls = pdf_urls;
    if merged.pdf_url.is_none() {
        merged.pdf_url = merged.pdf_urls.first().cloned();
    }

    merged.citation_count = primary.citation_count.max(backup.citation_count);
    merged
}

fn fill_string(target: &mut String, incoming: &str) {
    if target.trim().is_empty() && !incoming.trim().is_empty() {
        *target = incoming.to_string();
    }
}

fn fill_option(target: &mut Option<String>, incoming: &Option<String>) {
    let empty = target.as_deref().map_or(true, |v| v.trim().is_empty());
    if empty {
        if let Some(value) = incoming.as_deref().map(str::trim).filter(|v| !v.is_empty()) {
            *target = Some(value.to_string());
        }
    }
}
