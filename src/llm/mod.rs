//! LLM-assisted title proposal and pool reranking.
//!
//! Two calls against an OpenAI-compatible chat endpoint: propose up to
//! three likely seminal-paper titles for a keyword, and pick one candidate
//! out of a bounded validation pool. Both validate the model's JSON output
//! strictly and reject a response as a whole when any field is invalid.

mod client;
mod json;
pub mod rerank;
pub mod title;

pub use client::{ChatMessage, ChatOutput, LlmClient, LlmOptions};
pub use json::extract_object;
pub use rerank::{select_from_pool, PoolSelection};
pub use title::{propose_titles, TitleProposal};

/// Errors from LLM calls: transport failures and protocol violations
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    /// The request exceeded its timeout
    #[error("LLM request timed out")]
    Timeout,

    /// The request failed before a response arrived
    #[error("LLM request failed before response: {0}")]
    Request(String),

    /// The server answered with an error status (after the one
    /// reasoning-hint retry)
    #[error("LLM request failed: HTTP {status} {body}")]
    Http { status: u16, body: String },

    /// The response violated the expected schema
    #[error("{0}")]
    Protocol(String),
}
