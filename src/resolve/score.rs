//! Relevance/quality scoring of candidate records against the keyword.

use std::collections::HashSet;

use crate::models::{is_arxiv_doi, Paper};
use crate::resolve::normalize_text;

/// Scoring constants, overridable by callers.
///
/// These are relative weights, not probabilities; only the ordering they
/// induce matters. The recency baseline year will age and can be moved
/// without changing the weighting semantics.
#[derive(Debug, Clone)]
pub struct ScoreWeights {
    /// Bonus when the normalized keyword is a substring of the title
    pub substring_bonus: f64,
    /// Maximum token-overlap bonus, scaled by overlap fraction
    pub token_overlap_bonus: f64,
    /// Penalty when no keyword token appears in the title
    pub no_overlap_penalty: f64,
    /// Penalty when either title or keyword normalizes to nothing
    pub empty_text_penalty: f64,
    /// Penalty per side for hyphenated variants of a short acronym keyword
    pub acronym_variant_penalty: f64,
    /// Maximum keyword length for the acronym-variant check
    pub acronym_max_len: usize,
    /// Bonus for a non-arXiv DOI
    pub doi_bonus: f64,
    /// Penalty applied to preprints
    pub preprint_penalty: f64,
    /// Bonus applied to non-preprints
    pub published_bonus: f64,
    /// Weight on `ln(1 + citations)`
    pub citation_log_weight: f64,
    /// Penalty when the title contains "survey" or "review" as a word
    pub survey_penalty: f64,
    /// Year against which the age bonus is computed
    pub recency_baseline_year: i32,
    /// Bonus per year of `(baseline - year)`, floored at zero
    pub recency_per_year: f64,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            substring_bonus: 20.0,
            token_overlap_bonus: 15.0,
            no_overlap_penalty: 10.0,
            empty_text_penalty: 8.0,
            acronym_variant_penalty: 8.0,
            acronym_max_len: 8,
            doi_bonus: 80.0,
            preprint_penalty: 20.0,
            published_bonus: 40.0,
            citation_log_weight: 14.0,
            survey_penalty: 30.0,
            recency_baseline_year: 2030,
            recency_per_year: 0.8,
        }
    }
}

/// Score a candidate with the default weights. Pure: identical inputs
/// always yield bit-identical output.
pub fn score_paper(keyword: &str, paper: &Paper) -> f64 {
    score_paper_with(keyword, paper, &ScoreWeights::default())
}

/// Score a candidate for relative ranking; higher is better.
pub fn score_paper_with(keyword: &str, paper: &Paper, weights: &ScoreWeights) -> f64 {
    let mut score = relevance_score(keyword, &paper.title, weights);

    if paper.doi().is_some_and(|doi| !is_arxiv_doi(doi)) {
        score += weights.doi_bonus;
    }
    if paper.is_preprint() {
        score -= weights.preprint_penalty;
    } else {
        score += weights.published_bonus;
    }

    score += f64::from(paper.citation_count).ln_1p() * weights.citation_log_weight;

    let title_norm = normalize_text(&paper.title);
    if title_norm
        .split(' ')
        .any(|token| token == "survey" || token == "review")
    {
        score -= weights.survey_penalty;
    }

    if let Some(year) = paper.year {
        let age = f64::from(weights.recency_baseline_year - year);
        score += (age * weights.recency_per_year).max(0.0);
    }
    score
}

fn relevance_score(keyword: &str, title: &str, weights: &ScoreWeights) -> f64 {
    let title_norm = normalize_text(title);
    let keyword_norm = normalize_text(keyword);
    if title_norm.is_empty() || keyword_norm.is_empty() {
        return -weights.empty_text_penalty;
    }

    let mut score = 0.0;
    if title_norm.contains(&keyword_norm) {
        score += weights.substring_bonus;
    }

    let keyword_tokens: HashSet<&str> = keyword_norm.split(' ').collect();
    let title_tokens: HashSet<&str> = title_norm.split(' ').collect();
    let overlap = keyword_tokens.intersection(&title_tokens).count();
    if overlap > 0 {
        score += weights.token_overlap_bonus * (overlap as f64 / keyword_tokens.len().max(1) as f64);
    } else {
        // Do not hard-filter; keep the candidate with a small penalty.
        score -= weights.no_overlap_penalty;
    }

    // Penalize obvious variant naming around short acronyms,
    // e.g. DN-DETR / DETR-v2 when the keyword is DETR.
    if keyword_norm.len() <= weights.acronym_max_len && !keyword_norm.contains(' ') {
        let (prefixed, suffixed) = hyphen_variants(&title.to_lowercase(), &keyword_norm);
        if prefixed {
            score -= weights.acronym_variant_penalty;
        }
        if suffixed {
            score -= weights.acronym_variant_penalty;
        }
    }
    score
}

/// Whether the lowercased title contains the keyword inside a hyphenated
/// compound: `x-keyword` (prefixed) or `keyword-x` (suffixed), as whole
/// tokens.
fn hyphen_variants(title_lower: &str, keyword: &str) -> (bool, bool) {
    let mut prefixed = false;
    let mut suffixed = false;
    for token in title_lower.split(|c: char| !(c.is_ascii_alphanumeric() || c == '-')) {
        let token = token.trim_matches('-');
        if token.is_empty() {
            continue;
        }
        if let Some(head) = token
            .strip_suffix(keyword)
            .and_then(|rest| rest.strip_suffix('-'))
        {
            if !head.is_empty() {
                prefixed = true;
            }
        }
        if let Some(tail) = token
            .strip_prefix(keyword)
            .and_then(|rest| rest.strip_prefix('-'))
        {
            if !tail.is_empty() {
                suffixed = true;
            }
        }
    }
    (prefixed, suffixed)
}
