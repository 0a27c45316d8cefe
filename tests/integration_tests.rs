//! End-to-end resolution through mock providers.

use std::sync::Arc;
use std::time::Duration;

use paperfetch::llm::{LlmClient, LlmOptions};
use paperfetch::models::{DocType, Paper};
use paperfetch::resolve::{
    ProviderMode, ResolveError, Resolver, ResolverOptions, SelectorMode,
};
use paperfetch::sources::MockSource;
use paperfetch::utils::{build_citation_text, CitationMeta};

fn rule_options(provider: ProviderMode) -> ResolverOptions {
    ResolverOptions {
        provider,
        selector: SelectorMode::Rule,
        ..ResolverOptions::default()
    }
}

fn llm_client(base_url: &str) -> LlmClient {
    LlmClient::new(LlmOptions {
        base_url: base_url.to_string(),
        api_key: "test-key".to_string(),
        model: "test-model".to_string(),
        timeout: Duration::from_secs(5),
        disable_reasoning: false,
        system_prompt: String::new(),
    })
    .unwrap()
}

fn chat_body(content: &str) -> String {
    serde_json::json!({
        "choices": [{"message": {"content": content}}]
    })
    .to_string()
}

/// The published ResNet record as Semantic Scholar would return it,
/// missing the volume/pages that only OpenAlex knows.
fn resnet_published() -> Paper {
    let mut paper = Paper::new("Deep Residual Learning for Image Recognition");
    paper.paper_id = Some("s2:resnet".to_string());
    paper.authors = vec![
        "Kaiming He".to_string(),
        "Xiangyu Zhang".to_string(),
        "Shaoqing Ren".to_string(),
        "Jian Sun".to_string(),
    ];
    paper.year = Some(2016);
    paper.venue = "2016 IEEE Conference on Computer Vision and Pattern Recognition".to_string();
    paper.doc_type = DocType::Conference;
    paper.citation_count = 150_000;
    paper
        .external_ids
        .insert("DOI".to_string(), "10.1109/CVPR.2016.90".to_string());
    paper.url = "https://www.semanticscholar.org/paper/resnet".to_string();
    paper
}

fn resnet_preprint() -> Paper {
    let mut paper = Paper::new("Deep Residual Learning for Image Recognition");
    paper.paper_id = Some("arxiv:1512.03385".to_string());
    paper.year = Some(2015);
    paper.venue = "arXiv".to_string();
    paper.doc_type = DocType::Online;
    paper.raw_type = Some("preprint".to_string());
    paper.citation_count = 0;
    paper
        .external_ids
        .insert("ArXiv".to_string(), "1512.03385".to_string());
    paper
}

fn resnet_survey() -> Paper {
    let mut paper = Paper::new("A Survey of Residual Networks for Image Recognition");
    paper.paper_id = Some("s2:survey".to_string());
    paper.year = Some(2022);
    paper.venue = "ACM Computing Surveys".to_string();
    paper.doc_type = DocType::Journal;
    paper.citation_count = 300;
    paper
        .external_ids
        .insert("DOI".to_string(), "10.1145/survey.123".to_string());
    paper
}

/// The same work as OpenAlex knows it: volume/pages present, a lower
/// citation count, a PDF mirror.
fn resnet_backup() -> Paper {
    let mut paper = Paper::new("Deep Residual Learning for Image Recognition");
    paper.paper_id = Some("W:resnet".to_string());
    paper.year = Some(2016);
    paper.pages = Some("770-778".to_string());
    paper.volume = Some("1".to_string());
    paper.citation_count = 120_000;
    paper
        .external_ids
        .insert("DOI".to_string(), "10.1109/CVPR.2016.90".to_string());
    paper
        .external_ids
        .insert("OpenAlex".to_string(), "W123".to_string());
    paper.pdf_urls = vec!["https://openaccess.example.org/resnet.pdf".to_string()];
    paper.pdf_url = Some("https://openaccess.example.org/resnet.pdf".to_string());
    paper
}

#[tokio::test]
async fn rule_selection_prefers_published_doi_record() {
    let resolver = Resolver::new(
        Arc::new(MockSource::new(
            "s2",
            vec![resnet_preprint(), resnet_published(), resnet_survey()],
        )),
        Arc::new(MockSource::new("openalex", vec![])),
        Arc::new(MockSource::new("arxiv", vec![])),
        None,
    );

    let resolution = resolver
        .resolve("resnet", &rule_options(ProviderMode::SemanticScholar))
        .await
        .unwrap();

    assert_eq!(resolution.provider, "s2");
    assert_eq!(resolution.selected_by, "rule");
    assert_eq!(resolution.paper.paper_id.as_deref(), Some("s2:resnet"));
    assert!(resolution.llm.is_none());
}

#[tokio::test]
async fn enrichment_fills_missing_fields_without_overwriting() {
    let resolver = Resolver::new(
        Arc::new(MockSource::new(
            "s2",
            vec![resnet_preprint(), resnet_published()],
        )),
        Arc::new(MockSource::new("openalex", vec![resnet_backup()])),
        Arc::new(MockSource::new("arxiv", vec![])),
        None,
    );

    let resolution = resolver
        .resolve("resnet", &rule_options(ProviderMode::SemanticScholar))
        .await
        .unwrap();
    let paper = &resolution.paper;

    // Backup filled the gaps
    assert_eq!(paper.pages.as_deref(), Some("770-778"));
    assert_eq!(paper.volume.as_deref(), Some("1"));
    assert_eq!(
        paper.pdf_url.as_deref(),
        Some("https://openaccess.example.org/resnet.pdf")
    );
    assert_eq!(paper.external_ids.get("OpenAlex").map(String::as_str), Some("W123"));

    // Primary values survived the merge
    assert_eq!(paper.paper_id.as_deref(), Some("s2:resnet"));
    assert_eq!(paper.citation_count, 150_000);
    assert_eq!(paper.authors.len(), 4);
    assert_eq!(
        paper.url,
        "https://www.semanticscholar.org/paper/resnet"
    );
}

#[tokio::test]
async fn auto_mode_falls_back_and_swallows_backup_failures() {
    let resolver = Resolver::new(
        Arc::new(MockSource::rate_limited("s2")),
        Arc::new(MockSource::new("openalex", vec![resnet_published()])),
        Arc::new(MockSource::new("arxiv", vec![])),
        None,
    );

    let resolution = resolver
        .resolve("resnet", &rule_options(ProviderMode::Auto))
        .await
        .unwrap();

    // Fallback provider answered, and the rate-limited backup lookup did
    // not break enrichment.
    assert_eq!(resolution.provider, "openalex");
    assert_eq!(resolution.paper.paper_id.as_deref(), Some("s2:resnet"));
}

#[tokio::test]
async fn all_mode_merges_provider_duplicates() {
    let resolver = Resolver::new(
        Arc::new(MockSource::new("s2", vec![resnet_published()])),
        Arc::new(MockSource::new("openalex", vec![resnet_published()])),
        Arc::new(MockSource::new("arxiv", vec![resnet_preprint()])),
        None,
    );

    let (papers, provider) = resolver
        .search_candidates("resnet", 10, ProviderMode::All)
        .await
        .unwrap();

    assert_eq!(provider, "all");
    // The identical paper_id collapses, the preprint stays distinct.
    assert_eq!(papers.len(), 2);
}

#[tokio::test]
async fn empty_providers_are_a_fatal_error() {
    let resolver = Resolver::new(
        Arc::new(MockSource::new("s2", vec![])),
        Arc::new(MockSource::new("openalex", vec![])),
        Arc::new(MockSource::new("arxiv", vec![])),
        None,
    );

    let err = resolver
        .resolve("unheard-of keyword", &rule_options(ProviderMode::All))
        .await
        .unwrap_err();
    assert!(matches!(err, ResolveError::EmptyResult(_)));
}

#[tokio::test]
async fn resolved_record_renders_as_citation() {
    let resolver = Resolver::new(
        Arc::new(MockSource::new("s2", vec![resnet_published()])),
        Arc::new(MockSource::new("openalex", vec![resnet_backup()])),
        Arc::new(MockSource::new("arxiv", vec![])),
        None,
    );

    let resolution = resolver
        .resolve("resnet", &rule_options(ProviderMode::SemanticScholar))
        .await
        .unwrap();

    let meta = CitationMeta {
        keyword: "resnet",
        provider: resolution.provider,
        selected_by: resolution.selected_by,
        llm: resolution.llm.as_ref(),
    };
    let text = build_citation_text(&resolution.paper, &meta);
    let first_line = text.lines().next().unwrap();

    assert!(first_line.contains("Kaiming He, Xiangyu Zhang, Shaoqing Ren, et al."));
    assert!(first_line.contains("[C]"));
    // Conference segment: venue, year: pages (volume is a journal detail)
    assert!(first_line.contains("Pattern Recognition, 2016: 770-778"));
    assert!(first_line.contains("DOI:10.1109/CVPR.2016.90."));
    assert!(text.contains("[meta] keyword=resnet provider=s2 selected_by=rule"));
}

#[tokio::test]
async fn llm_selection_outside_pool_is_fatal() {
    let mut server = mockito::Server::new_async().await;
    let proposal = r#"{"titles": ["Deep Residual Learning for Image Recognition"], "reason": "the ResNet paper", "confidence": 0.9}"#;
    let selection = r#"{"selected_candidate_id": "C99", "reason": "sounds plausible", "confidence": 0.8}"#;

    // Registered first so the pool-selection mock below takes precedence
    // for the second request, which carries the selection schema.
    let _propose = server
        .mock("POST", "/chat/completions")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(chat_body(proposal))
        .create_async()
        .await;
    let select = server
        .mock("POST", "/chat/completions")
        .match_body(mockito::Matcher::Regex("selected_candidate_id".to_string()))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(chat_body(selection))
        .expect(1)
        .create_async()
        .await;

    let resolver = Resolver::new(
        Arc::new(MockSource::new(
            "s2",
            vec![resnet_preprint(), resnet_published(), resnet_survey()],
        )),
        Arc::new(MockSource::new("openalex", vec![])),
        Arc::new(MockSource::new("arxiv", vec![])),
        Some(llm_client(&server.url())),
    );
    let options = ResolverOptions {
        provider: ProviderMode::SemanticScholar,
        selector: SelectorMode::Llm,
        ..ResolverOptions::default()
    };

    let err = resolver.resolve("resnet", &options).await.unwrap_err();

    select.assert_async().await;
    assert!(matches!(err, ResolveError::InvalidSelection(id) if id == "C99"));
}
