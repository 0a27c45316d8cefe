//! Deterministic rule-based selection of the best candidate.

use crate::models::Paper;
use crate::resolve::{score_paper_with, ResolveError, ScoreWeights};

/// Pick the highest-ranked record for the keyword.
///
/// Ranking key: score descending, then citation count descending, then year
/// descending with unknown years last. On a full tie the first-seen record
/// wins. Fails with [`ResolveError::EmptyCandidates`] on an empty input.
pub fn pick_best<'a>(
    keyword: &str,
    papers: &'a [Paper],
    weights: &ScoreWeights,
) -> Result<&'a Paper, ResolveError> {
    let mut best: Option<(&Paper, (f64, u32, i64))> = None;
    for paper in papers {
        let score = score_paper_with(keyword, paper, weights);
        let year_rank = paper.year.map_or(i64::MIN, i64::from);
        let key = (score, paper.citation_count, year_rank);
        let beats = match &best {
            None => true,
            Some((_, best_key)) => {
                key.0.total_cmp(&best_key.0).then_with(|| {
                    key.1.cmp(&best_key.1).then_with(|| key.2.cmp(&best_key.2))
                }) == std::cmp::Ordering::Greater
            }
        };
        if beats {
            best = Some((paper, key));
        }
    }
    best.map(|(paper, _)| paper).ok_or(ResolveError::EmptyCandidates)
}
