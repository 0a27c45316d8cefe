//! LLM pool selector: pick the canonical paper from a candidate pool.

use serde_json::Value;
use tracing::debug;

use crate::llm::client::{ChatMessage, LlmClient};
use crate::llm::json::{confidence_from, extract_object};
use crate::llm::LlmError;
use crate::resolve::PoolCandidate;

const DEFAULT_SYSTEM_PROMPT: &str =
    "Select the most likely original/seminal paper from candidates. Return strict JSON only.";

/// The model's pick from a candidate pool
#[derive(Debug, Clone)]
pub struct PoolSelection {
    /// One of the `candidate_id` values that were offered
    pub candidate_id: String,
    pub reason: String,
    /// In `[0, 1]`
    pub confidence: f64,
}

/// Ask the model which pool candidate is the paper the keyword refers to.
///
/// Unlike the title proposer there is no salvage path here: a selection
/// that cannot be parsed from the primary content is an error, because
/// guessing a candidate id from reasoning text would silently pick the
/// wrong paper.
pub async fn select_from_pool(
    client: &LlmClient,
    keyword: &str,
    proposed_titles: &[String],
    candidates: &[PoolCandidate],
) -> Result<PoolSelection, LlmError> {
    if candidates.is_empty() {
        return Err(LlmError::Protocol("candidate pool is empty".to_string()));
    }
    if proposed_titles.is_empty() {
        return Err(LlmError::Protocol("no proposed titles to select against".to_string()));
    }

    let user_payload = serde_json::json!({
        "keyword": keyword,
        "proposed_titles": proposed_titles,
        "candidates": candidates,
        "output_schema": {
            "selected_candidate_id": "string",
            "reason": "string",
            "confidence": "number in [0, 1]"
        },
        "constraints": [
            "selected_candidate_id must be one of the candidate_id values",
            "prefer the original publication over surveys and follow-ups",
            "return one JSON object and nothing else"
        ]
    });
    let messages = vec![
        ChatMessage {
            role: "system",
            content: client.system_prompt(DEFAULT_SYSTEM_PROMPT),
        },
        ChatMessage {
            role: "user",
            content: user_payload.to_string(),
        },
    ];

    let output = client.chat(messages).await?;
    let content = output
        .content
        .filter(|c| !c.trim().is_empty())
        .ok_or_else(|| LlmError::Protocol("pool selection has no content".to_string()))?;
    let selection = parse_selection(&content)?;
    debug!(
        keyword,
        candidate_id = %selection.candidate_id,
        confidence = selection.confidence,
        "pool selection parsed"
    );
    Ok(selection)
}

fn parse_selection(text: &str) -> Result<PoolSelection, LlmError> {
    let object = extract_object(text, Some("selected_candidate_id"))?;
    let candidate_id = object
        .get("selected_candidate_id")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .ok_or_else(|| {
            LlmError::Protocol("selection has no selected_candidate_id".to_string())
        })?
        .to_string();
    let reason = object
        .get("reason")
        .and_then(Value::as_str)
        .unwrap_or("")
        .trim()
        .to_string();
    if reason.is_empty() {
        return Err(LlmError::Protocol("LLM reason is empty.".to_string()));
    }
    let confidence = confidence_from(object.get("confidence"))?;
    Ok(PoolSelection {
        candidate_id,
        reason,
        confidence,
    })
}
