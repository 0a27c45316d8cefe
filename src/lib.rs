//! # paperfetch
//!
//! Resolve a shorthand research keyword (e.g. "focal loss") to one likely
//! canonical paper citation by querying bibliographic providers, optionally
//! letting an LLM propose and validate the intended title.
//!
//! ## Architecture
//!
//! - [`models`]: the normalized paper record and document-type taxonomy
//! - [`sources`]: provider adapters (Semantic Scholar, OpenAlex, arXiv)
//! - [`resolve`]: merging, scoring, selection, and enrichment
//! - [`llm`]: OpenAI-compatible chat transport plus the title-proposal and
//!   pool-selection protocols
//! - [`utils`]: citation formatting, PDF download, rate limiting
//! - [`config`]: TOML configuration with environment overrides

pub mod config;
pub mod llm;
pub mod models;
pub mod resolve;
pub mod sources;
pub mod utils;

// Re-export commonly used types
pub use models::Paper;
pub use resolve::{Resolution, Resolver, ResolverOptions};
pub use sources::Source;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
