//! Core data structures shared across the pipeline.

mod paper;

pub use paper::{is_arxiv_doi, DocType, Paper, CONFERENCE_HINTS, JOURNAL_HINTS};
