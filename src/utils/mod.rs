//! Shared utilities: citation formatting, PDF download, rate limiting.

mod cite;
mod pdf;
mod rate_limit;

pub use cite::{append_daily_citation, build_citation_text, CitationMeta};
pub use pdf::{collect_candidate_urls, download_pdf, should_try_arxiv_fallback, PdfError};
pub use rate_limit::RateLimiter;
