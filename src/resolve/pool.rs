//! Bounded validation pool for LLM reranking.

use serde::Serialize;
use std::collections::HashSet;

use crate::models::Paper;
use crate::resolve::{normalize_text, score_paper_with, ScoreWeights};

/// Abstracts handed to the LLM are truncated to this many characters
pub const POOL_ABSTRACT_MAX_CHARS: usize = 800;

/// Condensed projection of a record for the LLM reranker. Candidate ids
/// are sequential (`C1`, `C2`, ...) and stable within one pool; pools are
/// built fresh per resolution attempt and never persisted.
#[derive(Debug, Clone, Serialize)]
pub struct PoolCandidate {
    pub candidate_id: String,
    pub title: String,
    pub year: Option<i32>,
    pub venue: String,
    pub doi: Option<String>,
    #[serde(rename = "citationCount")]
    pub citation_count: u32,
    #[serde(rename = "abstract")]
    pub abstract_text: String,
    pub url: String,
}

/// Assemble up to `size` candidates for LLM reranking.
///
/// Exact normalized-title hits for each proposed title come first (in
/// proposal order, descending citation count within a title, list order on
/// ties), so literal matches are never crowded out by generic scoring.
/// Remaining slots fill from the whole list ordered by score. Candidates
/// dedupe on `normalized_title::year` so provider variants of the same work
/// occupy one slot.
pub fn build_validation_pool(
    keyword: &str,
    papers: &[Paper],
    size: usize,
    proposed_titles: &[String],
    weights: &ScoreWeights,
) -> Vec<Paper> {
    let size = size.max(1);
    let mut seen: HashSet<String> = HashSet::new();
    let mut pool: Vec<Paper> = Vec::new();

    let pool_key = |paper: &Paper| {
        let year = paper.year.map(|y| y.to_string()).unwrap_or_default();
        format!("{}::{}", normalize_text(&paper.title), year)
    };

    for target_title in proposed_titles {
        let target_norm = normalize_text(target_title);
        if target_norm.is_empty() {
            continue;
        }
        let mut exact_hits: Vec<&Paper> = papers
            .iter()
            .filter(|paper| normalize_text(&paper.title) == target_norm)
            .collect();
        exact_hits.sort_by(|a, b| b.citation_count.cmp(&a.citation_count));
        for hit in exact_hits {
            if seen.insert(pool_key(hit)) {
                pool.push(hit.clone());
            }
        }
    }

    let mut ranked: Vec<(f64, &Paper)> = papers
        .iter()
        .map(|paper| (score_paper_with(keyword, paper, weights), paper))
        .collect();
    ranked.sort_by(|a, b| b.0.total_cmp(&a.0));
    for (_, paper) in ranked {
        if pool.len() >= size {
            break;
        }
        if seen.insert(pool_key(paper)) {
            pool.push(paper.clone());
        }
    }

    pool.truncate(size);
    pool
}

/// Project pool records into the condensed candidate shape, assigning
/// sequential ids in pool order.
pub fn project_pool(papers: &[Paper]) -> Vec<PoolCandidate> {
    papers
        .iter()
        .enumerate()
        .map(|(index, paper)| {
            let abstract_text: String = paper
                .abstract_text
                .trim()
                .chars()
                .take(POOL_ABSTRACT_MAX_CHARS)
                .collect::<String>()
                .trim_end()
                .to_string();
            PoolCandidate {
                candidate_id: format!("C{}", index + 1),
                title: paper.title.trim().to_string(),
                year: paper.year,
                venue: paper.venue.trim().to_string(),
                doi: paper.doi().map(String::from),
                citation_count: paper.citation_count,
                abstract_text,
                url: paper.url.trim().to_string(),
            }
        })
        .collect()
}
