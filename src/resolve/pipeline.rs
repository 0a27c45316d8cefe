//! End-to-end resolution: provider fan-in, selection, and enrichment.

use std::str::FromStr;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::llm::{propose_titles, select_from_pool, LlmClient};
use crate::models::Paper;
use crate::resolve::{
    build_validation_pool, merge_dedupe, merge_with_backup, normalize_text, pick_best,
    pick_best_backup_match, project_pool, title_similarity, ResolveError, ScoreWeights,
};
use crate::sources::{Source, SourceError};

const BACKUP_SEARCH_LIMIT: usize = 8;
const ARXIV_FALLBACK_LIMIT: usize = 3;

/// Which providers a search fans out to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderMode {
    /// Query every provider and merge (rate-limited Semantic Scholar is
    /// skipped silently)
    All,
    /// Semantic Scholar, falling back to OpenAlex on rate limit
    Auto,
    SemanticScholar,
    OpenAlex,
    Arxiv,
}

impl ProviderMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderMode::All => "all",
            ProviderMode::Auto => "auto",
            ProviderMode::SemanticScholar => "s2",
            ProviderMode::OpenAlex => "openalex",
            ProviderMode::Arxiv => "arxiv",
        }
    }
}

impl FromStr for ProviderMode {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "all" => Ok(ProviderMode::All),
            "auto" => Ok(ProviderMode::Auto),
            "s2" => Ok(ProviderMode::SemanticScholar),
            "openalex" => Ok(ProviderMode::OpenAlex),
            "arxiv" => Ok(ProviderMode::Arxiv),
            other => Err(format!(
                "unknown provider '{other}' (expected all, auto, s2, openalex, or arxiv)"
            )),
        }
    }
}

/// How the winner is chosen from the candidate list
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectorMode {
    /// Two-stage LLM protocol: title proposal then pool reranking
    Llm,
    /// Deterministic scoring only
    Rule,
}

impl FromStr for SelectorMode {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "llm" => Ok(SelectorMode::Llm),
            "rule" => Ok(SelectorMode::Rule),
            other => Err(format!("unknown selector '{other}' (expected llm or rule)")),
        }
    }
}

/// Tunables for one resolution run
#[derive(Debug, Clone)]
pub struct ResolverOptions {
    /// Per-query candidate limit
    pub limit: usize,
    pub provider: ProviderMode,
    pub selector: SelectorMode,
    /// Validation pool size for the LLM reranker
    pub pool_size: usize,
    /// Minimum similarity between the winner's title and the top proposed
    /// title before the resolution is accepted
    pub min_title_similarity: f64,
    pub weights: ScoreWeights,
}

impl Default for ResolverOptions {
    fn default() -> Self {
        Self {
            limit: 50,
            provider: ProviderMode::All,
            selector: SelectorMode::Llm,
            pool_size: 10,
            min_title_similarity: 0.6,
            weights: ScoreWeights::default(),
        }
    }
}

/// What the LLM contributed to a resolution, kept for citation metadata
#[derive(Debug, Clone)]
pub struct LlmTrace {
    pub proposed_titles: Vec<String>,
    /// Reason from the title proposal stage
    pub reason: String,
    pub confidence: f64,
    /// The top proposed title the winner was validated against
    pub matched_title: String,
    pub similarity: f64,
}

/// A resolved keyword: the winning record plus provenance
#[derive(Debug, Clone)]
pub struct Resolution {
    pub paper: Paper,
    /// Provider label the winner was searched from (`all`, `s2`, ...)
    pub provider: &'static str,
    /// Selection strategy label (`rule` or `llm-title+pool-llm`)
    pub selected_by: &'static str,
    pub llm: Option<LlmTrace>,
}

/// Orchestrates providers and the optional LLM selector.
///
/// Queries run sequentially, never in parallel, so provider rate limits
/// stay predictable.
#[derive(Debug)]
pub struct Resolver {
    s2: Arc<dyn Source>,
    openalex: Arc<dyn Source>,
    arxiv: Arc<dyn Source>,
    llm: Option<LlmClient>,
}

impl Resolver {
    pub fn new(
        s2: Arc<dyn Source>,
        openalex: Arc<dyn Source>,
        arxiv: Arc<dyn Source>,
        llm: Option<LlmClient>,
    ) -> Self {
        Self {
            s2,
            openalex,
            arxiv,
            llm,
        }
    }

    /// Resolve one keyword to a single enriched record.
    pub async fn resolve(
        &self,
        keyword: &str,
        options: &ResolverOptions,
    ) -> Result<Resolution, ResolveError> {
        let Resolution {
            paper,
            provider,
            selected_by,
            llm,
        } = match options.selector {
            SelectorMode::Llm => self.resolve_with_llm(keyword, options).await?,
            SelectorMode::Rule => self.resolve_with_rules(keyword, options).await?,
        };
        let paper = self.enrich(paper, provider).await;
        Ok(Resolution {
            paper,
            provider,
            selected_by,
            llm,
        })
    }

    async fn resolve_with_rules(
        &self,
        keyword: &str,
        options: &ResolverOptions,
    ) -> Result<Resolution, ResolveError> {
        let (papers, provider) = self
            .search_candidates(keyword, options.limit, options.provider)
            .await?;
        if papers.is_empty() {
            return Err(ResolveError::EmptyResult(provider.to_string()));
        }
        let winner = pick_best(keyword, &papers, &options.weights)?.clone();
        info!(keyword, provider, title = %winner.title, "selected by rule scoring");
        Ok(Resolution {
            paper: winner,
            provider,
            selected_by: "rule",
            llm: None,
        })
    }

    async fn resolve_with_llm(
        &self,
        keyword: &str,
        options: &ResolverOptions,
    ) -> Result<Resolution, ResolveError> {
        let client = self.llm.as_ref().ok_or(ResolveError::LlmUnavailable)?;
        let proposal = propose_titles(client, keyword).await?;
        info!(
            keyword,
            titles = ?proposal.titles,
            confidence = proposal.confidence,
            "LLM proposed titles"
        );

        let (merged, provider) = self
            .search_titles_pool(&proposal.titles, options.limit, options.provider)
            .await?;
        if merged.is_empty() {
            return Err(ResolveError::EmptyResult(provider.to_string()));
        }

        let pool = build_validation_pool(
            keyword,
            &merged,
            options.pool_size,
            &proposal.titles,
            &options.weights,
        );
        let candidates = project_pool(&pool);
        let selection = select_from_pool(client, keyword, &proposal.titles, &candidates).await?;
        debug!(
            candidate_id = %selection.candidate_id,
            reason = %selection.reason,
            "LLM pool selection"
        );

        let index = candidates
            .iter()
            .position(|candidate| candidate.candidate_id == selection.candidate_id)
            .ok_or_else(|| ResolveError::InvalidSelection(selection.candidate_id.clone()))?;
        let winner = pool[index].clone();

        let matched_title = proposal.titles[0].clone();
        let similarity = title_similarity(&winner.title, &matched_title);
        if similarity < options.min_title_similarity {
            return Err(ResolveError::TitleMismatch {
                similarity,
                threshold: options.min_title_similarity,
            });
        }
        info!(keyword, provider, title = %winner.title, similarity, "selected by LLM pool");

        Ok(Resolution {
            paper: winner,
            provider,
            selected_by: "llm-title+pool-llm",
            llm: Some(LlmTrace {
                proposed_titles: proposal.titles,
                reason: proposal.reason,
                confidence: proposal.confidence,
                matched_title,
                similarity,
            }),
        })
    }

    /// Search all configured providers for one keyword according to the
    /// provider mode, returning the merged list and its provider label.
    pub async fn search_candidates(
        &self,
        keyword: &str,
        limit: usize,
        provider: ProviderMode,
    ) -> Result<(Vec<Paper>, &'static str), ResolveError> {
        match provider {
            ProviderMode::All => {
                let mut merged = Vec::new();
                match self.s2.search(keyword, limit).await {
                    Ok(papers) => merged.extend(papers),
                    Err(SourceError::RateLimit) => {
                        warn!(keyword, "Semantic Scholar rate limited, continuing without it");
                    }
                    Err(err) => return Err(err.into()),
                }
                merged.extend(self.openalex.search(keyword, limit).await?);
                merged.extend(self.arxiv.search(keyword, limit).await?);
                Ok((merge_dedupe(merged), "all"))
            }
            ProviderMode::SemanticScholar => Ok((self.s2.search(keyword, limit).await?, "s2")),
            ProviderMode::OpenAlex => Ok((self.openalex.search(keyword, limit).await?, "openalex")),
            ProviderMode::Arxiv => Ok((self.arxiv.search(keyword, limit).await?, "arxiv")),
            ProviderMode::Auto => match self.s2.search(keyword, limit).await {
                Ok(papers) => Ok((papers, "s2")),
                Err(SourceError::RateLimit) => {
                    warn!(keyword, "Semantic Scholar rate limited, falling back to OpenAlex");
                    Ok((self.openalex.search(keyword, limit).await?, "openalex"))
                }
                Err(err) => Err(err.into()),
            },
        }
    }

    /// Search providers once per proposed title and merge the results.
    /// Per-title query limits are clamped to a sane range so a large
    /// keyword limit does not multiply across titles.
    pub async fn search_titles_pool(
        &self,
        titles: &[String],
        limit: usize,
        provider: ProviderMode,
    ) -> Result<(Vec<Paper>, &'static str), ResolveError> {
        if titles.is_empty() {
            let label = match provider {
                ProviderMode::Auto => "openalex",
                other => other.as_str(),
            };
            return Ok((Vec::new(), label));
        }
        let per_title = limit.clamp(10, 30);

        match provider {
            ProviderMode::All => {
                let mut merged = Vec::new();
                for title in titles {
                    match self.s2.search(title, per_title).await {
                        Ok(papers) => merged.extend(papers),
                        Err(SourceError::RateLimit) => {
                            warn!(title, "Semantic Scholar rate limited for title query");
                        }
                        Err(err) => return Err(err.into()),
                    }
                    merged.extend(self.openalex.search(title, per_title).await?);
                    merged.extend(self.arxiv.search(title, per_title).await?);
                }
                Ok((merge_dedupe(merged), "all"))
            }
            ProviderMode::Auto => {
                let mut merged = Vec::new();
                let mut rate_limited = false;
                for title in titles {
                    match self.s2.search(title, per_title).await {
                        Ok(papers) => merged.extend(papers),
                        Err(SourceError::RateLimit) => {
                            rate_limited = true;
                            break;
                        }
                        Err(err) => return Err(err.into()),
                    }
                }
                if !rate_limited {
                    return Ok((merge_dedupe(merged), "s2"));
                }
                warn!("Semantic Scholar rate limited, re-querying titles via OpenAlex");
                let mut merged = Vec::new();
                for title in titles {
                    merged.extend(self.openalex.search(title, per_title).await?);
                }
                Ok((merge_dedupe(merged), "openalex"))
            }
            ProviderMode::SemanticScholar => {
                let mut merged = Vec::new();
                for title in titles {
                    merged.extend(self.s2.search(title, per_title).await?);
                }
                Ok((merge_dedupe(merged), "s2"))
            }
            ProviderMode::OpenAlex => {
                let mut merged = Vec::new();
                for title in titles {
                    merged.extend(self.openalex.search(title, per_title).await?);
                }
                Ok((merge_dedupe(merged), "openalex"))
            }
            ProviderMode::Arxiv => {
                let mut merged = Vec::new();
                for title in titles {
                    merged.extend(self.arxiv.search(title, per_title).await?);
                }
                Ok((merge_dedupe(merged), "arxiv"))
            }
        }
    }

    /// Enrich the winner from the other primary provider. Best-effort:
    /// every backup failure is swallowed and the winner returned as-is.
    async fn enrich(&self, paper: Paper, provider: &str) -> Paper {
        let backup_source: &Arc<dyn Source> = match provider {
            "openalex" => &self.s2,
            "s2" => &self.openalex,
            _ => return paper,
        };
        match self.find_backup(&paper, backup_source).await {
            Some(backup) => {
                debug!(backup_source = backup_source.id(), "merging backup metadata");
                merge_with_backup(&paper, &backup)
            }
            None => paper,
        }
    }

    async fn find_backup(&self, paper: &Paper, source: &Arc<dyn Source>) -> Option<Paper> {
        if let Some(doi) = paper.doi() {
            match source.get_by_doi(doi).await {
                Ok(Some(backup)) => return Some(backup),
                Ok(None) => {}
                Err(err) => {
                    debug!(source = source.id(), error = %err, "backup DOI lookup failed");
                }
            }
        }
        let title = paper.title.trim();
        if title.is_empty() {
            return None;
        }
        match source.search(title, BACKUP_SEARCH_LIMIT).await {
            Ok(candidates) => pick_best_backup_match(paper, &candidates).cloned(),
            Err(err) => {
                debug!(source = source.id(), error = %err, "backup title search failed");
                None
            }
        }
    }

    /// Merge arXiv metadata into the winner by title, used when a PDF
    /// download fails and an arXiv mirror might carry one. Best-effort.
    pub async fn merge_arxiv_fallback(&self, paper: Paper) -> Paper {
        let title = paper.title.trim().to_string();
        if title.is_empty() {
            return paper;
        }
        let candidates = match self.arxiv.search(&title, ARXIV_FALLBACK_LIMIT).await {
            Ok(candidates) if !candidates.is_empty() => candidates,
            Ok(_) => return paper,
            Err(err) => {
                debug!(error = %err, "arXiv fallback search failed");
                return paper;
            }
        };
        let target = normalize_text(&title);
        let best = candidates
            .iter()
            .find(|candidate| normalize_text(&candidate.title) == target)
            .unwrap_or(&candidates[0]);
        merge_with_backup(&paper, best)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::MockSource;

    fn paper(title: &str, id: &str, citations: u32) -> Paper {
        let mut paper = Paper::new(title);
        paper.paper_id = Some(id.to_string());
        paper.citation_count = citations;
        paper
    }

    fn resolver(s2: MockSource, openalex: MockSource, arxiv: MockSource) -> Resolver {
        Resolver::new(Arc::new(s2), Arc::new(openalex), Arc::new(arxiv), None)
    }

    #[test]
    fn test_provider_mode_round_trip() {
        for label in ["all", "auto", "s2", "openalex", "arxiv"] {
            let mode: ProviderMode = label.parse().unwrap();
            assert_eq!(mode.as_str(), label);
        }
        assert!("scholar".parse::<ProviderMode>().is_err());
    }

    #[tokio::test]
    async fn test_all_mode_merges_and_dedupes() {
        let shared = paper("Focal Loss for Dense Object Detection", "x1", 100);
        let resolver = resolver(
            MockSource::new("s2", vec![shared.clone()]),
            MockSource::new("openalex", vec![shared.clone(), paper("Other Paper", "x2", 5)]),
            MockSource::new("arxiv", vec![]),
        );
        let (papers, provider) = resolver
            .search_candidates("focal loss", 10, ProviderMode::All)
            .await
            .unwrap();
        assert_eq!(provider, "all");
        assert_eq!(papers.len(), 2);
    }

    #[tokio::test]
    async fn test_all_mode_survives_s2_rate_limit() {
        let resolver = resolver(
            MockSource::rate_limited("s2"),
            MockSource::new("openalex", vec![paper("Focal Loss", "w1", 10)]),
            MockSource::new("arxiv", vec![]),
        );
        let (papers, _) = resolver
            .search_candidates("focal loss", 10, ProviderMode::All)
            .await
            .unwrap();
        assert_eq!(papers.len(), 1);
    }

    #[tokio::test]
    async fn test_auto_mode_falls_back_to_openalex() {
        let resolver = resolver(
            MockSource::rate_limited("s2"),
            MockSource::new("openalex", vec![paper("Focal Loss", "w1", 10)]),
            MockSource::new("arxiv", vec![]),
        );
        let (papers, provider) = resolver
            .search_candidates("focal loss", 10, ProviderMode::Auto)
            .await
            .unwrap();
        assert_eq!(provider, "openalex");
        assert_eq!(papers.len(), 1);
    }

    #[tokio::test]
    async fn test_rule_resolution_empty_is_fatal() {
        let resolver = resolver(
            MockSource::new("s2", vec![]),
            MockSource::new("openalex", vec![]),
            MockSource::new("arxiv", vec![]),
        );
        let options = ResolverOptions {
            selector: SelectorMode::Rule,
            ..ResolverOptions::default()
        };
        let err = resolver.resolve("nothing", &options).await.unwrap_err();
        assert!(matches!(err, ResolveError::EmptyResult(_)));
    }

    #[tokio::test]
    async fn test_llm_selector_without_client_fails() {
        let resolver = resolver(
            MockSource::new("s2", vec![paper("Focal Loss", "p1", 10)]),
            MockSource::new("openalex", vec![]),
            MockSource::new("arxiv", vec![]),
        );
        let err = resolver
            .resolve("focal loss", &ResolverOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ResolveError::LlmUnavailable));
    }

    #[tokio::test]
    async fn test_title_pool_limit_clamped() {
        let resolver = resolver(
            MockSource::new("s2", vec![paper("Focal Loss", "p1", 10)]),
            MockSource::new("openalex", vec![]),
            MockSource::new("arxiv", vec![]),
        );
        let titles = vec!["Focal Loss".to_string()];
        let (papers, provider) = resolver
            .search_titles_pool(&titles, 500, ProviderMode::SemanticScholar)
            .await
            .unwrap();
        assert_eq!(provider, "s2");
        assert_eq!(papers.len(), 1);
    }

    #[tokio::test]
    async fn test_arxiv_fallback_prefers_exact_title() {
        let mut exact = paper("Focal Loss for Dense Object Detection", "", 0);
        exact.pdf_urls = vec!["https://arxiv.org/pdf/1708.02002".to_string()];
        exact.pdf_url = Some("https://arxiv.org/pdf/1708.02002".to_string());
        let other = paper("A Survey of Loss Functions", "", 0);
        let resolver = resolver(
            MockSource::new("s2", vec![]),
            MockSource::new("openalex", vec![]),
            MockSource::new("arxiv", vec![other, exact]),
        );
        let selected = paper("Focal Loss for Dense Object Detection", "s2:1", 1000);
        let merged = resolver.merge_arxiv_fallback(selected).await;
        assert_eq!(merged.pdf_url.as_deref(), Some("https://arxiv.org/pdf/1708.02002"));
        assert_eq!(merged.citation_count, 1000);
    }
}
