//! LLM title proposer: turn a shorthand keyword into likely paper titles.

use regex::Regex;
use serde_json::Value;
use tracing::{debug, warn};

use crate::llm::client::{ChatMessage, LlmClient};
use crate::llm::json::{confidence_from, extract_object};
use crate::llm::LlmError;

const DEFAULT_SYSTEM_PROMPT: &str =
    "Given a keyword, propose likely original/seminal paper titles. Return strict JSON only.";

/// Confidence reported when titles had to be salvaged from reasoning text
const SALVAGE_CONFIDENCE: f64 = 0.35;
const SALVAGE_REASON: &str =
    "LLM JSON output was truncated; extracted candidate titles from reasoning content.";

const MAX_TITLES: usize = 3;

/// Proposed paper titles for one keyword
#[derive(Debug, Clone)]
pub struct TitleProposal {
    /// Up to three titles, most likely first
    pub titles: Vec<String>,
    pub reason: String,
    /// In `[0, 1]`
    pub confidence: f64,
}

/// Ask the model which real papers a keyword most likely refers to.
pub async fn propose_titles(client: &LlmClient, keyword: &str) -> Result<TitleProposal, LlmError> {
    let keyword = keyword.trim();
    if keyword.is_empty() {
        return Err(LlmError::Protocol("keyword is empty".to_string()));
    }

    let user_payload = serde_json::json!({
        "keyword": keyword,
        "output_schema": {
            "titles": ["string"],
            "reason": "string",
            "confidence": "number in [0, 1]"
        },
        "constraints": [
            "titles must be real paper titles, most likely first",
            "at most 3 titles",
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
    let reasoning = output.reasoning_content.clone().unwrap_or_default();
    let text = match output.content {
        Some(content) if !content.trim().is_empty() => content,
        // Reasoning models sometimes spend the whole token budget on
        // reasoning and leave content empty.
        _ => reasoning.clone(),
    };

    match parse_proposal(&text, keyword) {
        Ok(proposal) => Ok(proposal),
        Err(err) => {
            let titles = salvage_titles(&reasoning, keyword);
            if titles.is_empty() {
                Err(err)
            } else {
                warn!(keyword, "title proposal JSON unusable, salvaged from reasoning");
                Ok(TitleProposal {
                    titles,
                    reason: SALVAGE_REASON.to_string(),
                    confidence: SALVAGE_CONFIDENCE,
                })
            }
        }
    }
}

fn parse_proposal(text: &str, keyword: &str) -> Result<TitleProposal, LlmError> {
    let object = extract_object(text, Some("titles"))?;
    let raw_titles = object
        .get("titles")
        .and_then(Value::as_array)
        .ok_or_else(|| LlmError::Protocol("proposal has no titles array".to_string()))?;
    let titles = normalize_titles(raw_titles.iter().filter_map(Value::as_str));
    if titles.is_empty() {
        return Err(LlmError::Protocol("proposal titles are all empty".to_string()));
    }
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
    debug!(keyword, count = titles.len(), confidence, "title proposal parsed");
    Ok(TitleProposal {
        titles,
        reason,
        confidence,
    })
}

/// Collapse whitespace, drop empties, dedupe case-insensitively, keep at
/// most three in original order.
fn normalize_titles<'a>(raw: impl Iterator<Item = &'a str>) -> Vec<String> {
    let mut seen = Vec::new();
    let mut titles = Vec::new();
    for title in raw {
        let cleaned = title.split_whitespace().collect::<Vec<_>>().join(" ");
        if cleaned.is_empty() {
            continue;
        }
        let key = cleaned.to_lowercase();
        if seen.contains(&key) {
            continue;
        }
        seen.push(key);
        titles.push(cleaned);
        if titles.len() == MAX_TITLES {
            break;
        }
    }
    titles
}

/// Pull plausible title strings out of free-form reasoning text. Used only
/// when the structured output was truncated or malformed.
fn salvage_titles(reasoning: &str, keyword: &str) -> Vec<String> {
    if reasoning.trim().is_empty() {
        return Vec::new();
    }
    let patterns = [
        r#""([^"]{6,260})""#,
        r"'([^']{6,260})'",
        r"(?i)titled\s+([a-zA-Z][^.:\n]{8,260})",
    ];
    let mut candidates = Vec::new();
    for pattern in patterns {
        // Patterns are fixed literals; compilation cannot fail.
        if let Ok(re) = Regex::new(pattern) {
            for capture in re.captures_iter(reasoning) {
                if let Some(m) = capture.get(1) {
                    candidates.push(m.as_str().to_string());
                }
            }
        }
    }
    normalize_titles(
        candidates
            .iter()
            .map(|c| c.trim_matches(|ch: char| ch.is_whitespace() || " .,:;".contains(ch)))
            .filter(|c| looks_like_title(c, keyword))
            .map(|c| c as &str),
    )
}

fn looks_like_title(candidate: &str, keyword: &str) -> bool {
    let length = candidate.chars().count();
    if !(12..=240).contains(&length) {
        return false;
    }
    if candidate.split_whitespace().count() < 3 {
        return false;
    }
    let lowered = candidate.to_lowercase();
    if lowered == keyword.to_lowercase() {
        return false;
    }
    const BANNED: [&str; 6] = [
        "output format",
        "schema",
        "constraints",
        "json",
        "confidence",
        "reason",
    ];
    !BANNED.iter().any(|banned| lowered.contains(banned))
}
