//! Tolerant extraction of a JSON object from model output.

use serde_json::{Map, Value};

use crate::llm::LlmError;

/// Extract a JSON object from free-form model text.
///
/// Strategy: try a strict whole-text parse first; failing that, attempt a
/// greedy decode from every `{` offset and collect the objects found. When
/// several objects parse, one containing `preferred_key` wins, else the
/// first. Isolated here so it stays testable independent of transport.
pub fn extract_object(
    raw_text: &str,
    preferred_key: Option<&str>,
) -> Result<Map<String, Value>, LlmError> {
    let text = raw_text.trim();
    if text.is_empty() {
        return Err(LlmError::Protocol("LLM returned empty text.".to_string()));
    }

    if let Ok(Value::Object(map)) = serde_json::from_str::<Value>(text) {
        return Ok(map);
    }

    let mut parsed: Vec<Map<String, Value>> = Vec::new();
    for (offset, byte) in text.bytes().enumerate() {
        if byte != b'{' {
            continue;
        }
        // Greedy decode: take the first complete value at this offset and
        // ignore whatever trails it.
        let mut stream = serde_json::Deserializer::from_str(&text[offset..]).into_iter::<Value>();
        if let Some(Ok(Value::Object(map))) = stream.next() {
            parsed.push(map);
        }
    }

    if parsed.is_empty() {
        return Err(LlmError::Protocol(
            "LLM text does not contain JSON object.".to_string(),
        ));
    }
    if let Some(key) = preferred_key {
        if let Some(index) = parsed.iter().position(|map| map.contains_key(key)) {
            return Ok(parsed.swap_remove(index));
        }
    }
    Ok(parsed.swap_remove(0))
}

/// Parse a confidence field as a float in [0, 1]. Numeric strings are
/// accepted; anything else is a protocol violation.
pub(crate) fn confidence_from(value: Option<&Value>) -> Result<f64, LlmError> {
    let confidence = match value {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
    .ok_or_else(|| LlmError::Protocol("LLM confidence is missing or invalid.".to_string()))?;

    if !(0.0..=1.0).contains(&confidence) {
        return Err(LlmError::Protocol(
            "LLM confidence must be in [0, 1].".to_string(),
        ));
    }
    Ok(confidence)
}
