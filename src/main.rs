use anyhow::{bail, Context, Result};
use clap::{Parser, ValueEnum};
use paperfetch::config::AppConfig;
use paperfetch::llm::LlmClient;
use paperfetch::resolve::{ProviderMode, Resolver, ResolverOptions, SelectorMode};
use paperfetch::sources::{
    ArxivSource, OpenAlexSource, SemanticScholarSource, S2_MIN_REQUEST_INTERVAL,
};
use paperfetch::utils::{
    append_daily_citation, build_citation_text, download_pdf, should_try_arxiv_fallback,
    CitationMeta, RateLimiter,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Fetch one likely canonical paper citation by keyword
#[derive(Parser, Debug)]
#[command(name = "paperfetch")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Fetch one likely canonical paper citation by keyword", long_about = None)]
struct Cli {
    /// Keyword words; spaces work without quotes (e.g. focal loss for dense object detection)
    #[arg(required = true)]
    keyword: Vec<String>,

    /// Citation output directory
    #[arg(long, default_value = "./citations")]
    out: PathBuf,

    /// Search candidates per query
    #[arg(long, default_value_t = 50)]
    limit: usize,

    /// Search provider
    #[arg(long, value_enum, default_value_t = ProviderArg::All)]
    provider: ProviderArg,

    /// Selection strategy
    #[arg(long, value_enum, default_value_t = SelectorArg::Llm)]
    selector: SelectorArg,

    /// Top-N papers kept for validation after multi-query retrieval
    #[arg(long = "llm-candidates", default_value_t = 10)]
    llm_candidates: usize,

    /// Timeout (seconds) for each LLM API call
    #[arg(long = "llm-timeout", default_value_t = 90.0)]
    llm_timeout: f64,

    /// Try to download the selected paper PDF (open-access only, default enabled)
    #[arg(long = "download-pdf", overrides_with = "no_download_pdf")]
    download_pdf: bool,

    /// Skip the PDF download step
    #[arg(long = "no-download-pdf")]
    no_download_pdf: bool,

    /// PDF output directory
    #[arg(long = "pdf-out", default_value = "./papers")]
    pdf_out: PathBuf,

    /// Timeout (seconds) for the PDF download
    #[arg(long = "pdf-timeout", default_value_t = 45.0)]
    pdf_timeout: f64,

    /// If the PDF download fails, retry using arXiv search by title (default enabled)
    #[arg(long = "pdf-arxiv-fallback", overrides_with = "no_pdf_arxiv_fallback")]
    pdf_arxiv_fallback: bool,

    /// Skip the arXiv PDF fallback
    #[arg(long = "no-pdf-arxiv-fallback")]
    no_pdf_arxiv_fallback: bool,

    /// Minimum similarity between the LLM's first title and the selected title
    #[arg(long = "min-title-sim", default_value_t = 0.6)]
    min_title_sim: f64,

    /// Enable verbose logging (-v for debug, -vv for trace)
    #[arg(long, short, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(long, short)]
    quiet: bool,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum ProviderArg {
    All,
    Auto,
    S2,
    Openalex,
    Arxiv,
}

impl From<ProviderArg> for ProviderMode {
    fn from(arg: ProviderArg) -> Self {
        match arg {
            ProviderArg::All => ProviderMode::All,
            ProviderArg::Auto => ProviderMode::Auto,
            ProviderArg::S2 => ProviderMode::SemanticScholar,
            ProviderArg::Openalex => ProviderMode::OpenAlex,
            ProviderArg::Arxiv => ProviderMode::Arxiv,
        }
    }
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum SelectorArg {
    Llm,
    Rule,
}

impl From<SelectorArg> for SelectorMode {
    fn from(arg: SelectorArg) -> Self {
        match arg {
            SelectorArg::Llm => SelectorMode::Llm,
            SelectorArg::Rule => SelectorMode::Rule,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = match cli.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let env_filter = if cli.quiet { "error" } else { log_level };
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| format!("paperfetch={}", env_filter)),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let keyword = cli.keyword.join(" ").trim().to_string();
    if keyword.is_empty() {
        bail!("Keyword cannot be empty.");
    }
    let want_pdf = cli.download_pdf || !cli.no_download_pdf;
    let pdf_arxiv_fallback = cli.pdf_arxiv_fallback || !cli.no_pdf_arxiv_fallback;

    let config = AppConfig::load()?;

    let selector: SelectorMode = cli.selector.into();
    let llm = match selector {
        SelectorMode::Llm => {
            let options = config.llm_options(Duration::from_secs_f64(cli.llm_timeout))?;
            Some(LlmClient::new(options)?)
        }
        SelectorMode::Rule => None,
    };

    let limiter = Arc::new(RateLimiter::new(S2_MIN_REQUEST_INTERVAL));
    let resolver = Resolver::new(
        Arc::new(SemanticScholarSource::new(config.s2_api_key(), limiter)?),
        Arc::new(OpenAlexSource::new(config.openalex_email())?),
        Arc::new(ArxivSource::new()?),
        llm,
    );

    let options = ResolverOptions {
        limit: cli.limit,
        provider: cli.provider.into(),
        selector,
        pool_size: cli.llm_candidates,
        min_title_similarity: cli.min_title_sim,
        ..ResolverOptions::default()
    };

    let resolution = resolver.resolve(&keyword, &options).await?;
    let mut selected = resolution.paper;

    let mut pdf_path = None;
    let mut pdf_error = None;
    if want_pdf {
        let timeout = Duration::from_secs_f64(cli.pdf_timeout);
        match download_pdf(&selected, &cli.pdf_out, timeout).await {
            Ok(path) => pdf_path = Some(path),
            Err(err) => {
                let message = err.to_string();
                if pdf_arxiv_fallback && should_try_arxiv_fallback(Some(&message)) {
                    selected = resolver.merge_arxiv_fallback(selected).await;
                    match download_pdf(&selected, &cli.pdf_out, timeout).await {
                        Ok(path) => pdf_path = Some(path),
                        Err(retry_err) => pdf_error = Some(retry_err.to_string()),
                    }
                } else {
                    pdf_error = Some(message);
                }
            }
        }
    }

    let meta = CitationMeta {
        keyword: &keyword,
        provider: resolution.provider,
        selected_by: resolution.selected_by,
        llm: resolution.llm.as_ref(),
    };
    let citation_text = build_citation_text(&selected, &meta);
    let citation_path = append_daily_citation(&cli.out, &citation_text)
        .with_context(|| format!("Failed to write citation under {}", cli.out.display()))?;

    println!("OK: citation appended to {}", citation_path.display());
    if want_pdf {
        match (&pdf_path, &pdf_error) {
            (Some(path), _) => println!("OK: pdf downloaded to {}", path.display()),
            (None, Some(error)) => println!("WARN: pdf download failed. {}", error),
            (None, None) => {}
        }
    }
    Ok(())
}
