//! Identity-based merge of candidate lists from multiple providers.

use std::collections::HashSet;

use crate::models::Paper;
use crate::resolve::normalize_text;

/// Identity key for a record: the provider-native id when present,
/// otherwise `normalized_title::year`.
fn identity_key(paper: &Paper) -> String {
    if let Some(id) = paper.paper_id.as_deref() {
        let id = id.trim();
        if !id.is_empty() {
            return id.to_string();
        }
    }
    let year = paper.year.map(|y| y.to_string()).unwrap_or_default();
    format!("{}::{}", normalize_text(&paper.title), year)
}

/// Collapse records sharing an identity key to the first-seen instance,
/// preserving input order. Later duplicates are dropped, not merged;
/// callers concatenate inputs in provider-priority order so the preferred
/// provider's record survives.
pub fn merge_dedupe(papers: Vec<Paper>) -> Vec<Paper> {
    let mut seen: HashSet<String> = HashSet::new();
    let mut deduped: Vec<Paper> = Vec::with_capacity(papers.len());
    for paper in papers {
        let key = identity_key(&paper);
        if !seen.insert(key) {
            continue;
        }
        deduped.push(paper);
    }
    deduped
}
