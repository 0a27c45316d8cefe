//! Candidate resolution: merging, scoring, selection, and enrichment.
//!
//! This is the decision-making core. Provider results are merged into one
//! identity-deduplicated candidate list, scored against the keyword, and a
//! winner is picked either by deterministic ranking or by a two-stage LLM
//! protocol (title proposal, then pool reranking). The winner is then
//! enriched from the other primary provider on a best-effort basis.

mod backup;
mod dedupe;
mod pipeline;
mod pool;
mod score;
mod select;

pub use backup::{merge_with_backup, pick_best_backup_match};
pub use dedupe::merge_dedupe;
pub use pipeline::{
    LlmTrace, ProviderMode, Resolution, Resolver, ResolverOptions, SelectorMode,
};
pub use pool::{build_validation_pool, project_pool, PoolCandidate, POOL_ABSTRACT_MAX_CHARS};
pub use score::{score_paper, score_paper_with, ScoreWeights};
pub use select::pick_best;

use crate::llm::LlmError;
use crate::sources::SourceError;

/// Fatal errors from the resolution pipeline
#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    /// No provider returned any candidate
    #[error("No papers returned from search provider: {0}")]
    EmptyResult(String),

    /// The candidate list handed to the selector was empty
    #[error("No candidate was selected from search results")]
    EmptyCandidates,

    /// The LLM chose a candidate id outside the provided pool
    #[error("LLM selected invalid candidate id: {0}")]
    InvalidSelection(String),

    /// The selected title is too far from the proposed title
    #[error("Selected title similarity {similarity:.3} < {threshold:.3}")]
    TitleMismatch { similarity: f64, threshold: f64 },

    /// The LLM selector was requested but no LLM client is configured
    #[error("LLM selector requested but no LLM client is configured")]
    LlmUnavailable,

    /// LLM protocol failure (malformed output, transport error)
    #[error(transparent)]
    Llm(#[from] LlmError),

    /// Provider failure that could not be recovered by fallback
    #[error(transparent)]
    Source(#[from] SourceError),
}

/// Normalize free text for identity and comparison: lowercase, strip
/// non-alphanumerics, collapse whitespace.
pub fn normalize_text(text: &str) -> String {
    text.to_lowercase()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { ' ' })
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Similarity between two titles in [0, 1].
///
/// The maximum of normalized Levenshtein similarity and token Jaccard
/// overlap on normalized text; exact normalized matches score 1.0.
pub fn title_similarity(left: &str, right: &str) -> f64 {
    let left_norm = normalize_text(left);
    let right_norm = normalize_text(right);
    if left_norm.is_empty() || right_norm.is_empty() {
        return 0.0;
    }
    if left_norm == right_norm {
        return 1.0;
    }

    let ratio = strsim::normalized_levenshtein(&left_norm, &right_norm);

    let left_tokens: std::collections::HashSet<&str> = left_norm.split(' ').collect();
    let right_tokens: std::collections::HashSet<&str> = right_norm.split(' ').collect();
    let intersection = left_tokens.intersection(&right_tokens).count() as f64;
    let union = left_tokens.union(&right_tokens).count().max(1) as f64;

    ratio.max(intersection / union)
}
