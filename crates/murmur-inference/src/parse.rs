//! Helpers for parsing structured output from language models.
//!
//! Models frequently wrap JSON in markdown fences, add prose around it,
//! or emit trailing commas. These helpers normalize the output before
//! handing it to serde.

use std::sync::OnceLock;

use regex::Regex;
use serde::de::DeserializeOwned;

use murmur_core::{Error, Result};

fn trailing_comma_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r",\s*([}\]])").expect("static regex"))
}

/// Remove trailing commas before closing braces and brackets.
pub fn sanitize_json(raw: &str) -> String {
    trailing_comma_re().replace_all(raw, "$1").into_owned()
}

/// Extract the first JSON object from model output.
///
/// Prefers the content of a fenced code block if one is present,
/// otherwise takes the substring between the first `{` and the last `}`.
pub fn extract_json_object(raw: &str) -> Result<String> {
    let candidate = if let Some(start) = raw.find("```") {
        let after = &raw[start + 3..];
        let after = after.strip_prefix("json").unwrap_or(after);
        match after.find("```") {
            Some(end) => &after[..end],
            None => after,
        }
    } else {
        raw
    };

    let open = candidate
        .find('{')
        .ok_or_else(|| Error::Inference(format!("No JSON object in model output: {raw}")))?;
    let close = candidate
        .rfind('}')
        .ok_or_else(|| Error::Inference(format!("Unterminated JSON object in model output: {raw}")))?;
    if close < open {
        return Err(Error::Inference(format!(
            "Malformed JSON object in model output: {raw}"
        )));
    }
    Ok(sanitize_json(&candidate[open..=close]))
}

/// Parse a single key out of a JSON object in model output.
pub fn parse_keyed<T: DeserializeOwned>(raw: &str, key: &str) -> Result<T> {
    let json = extract_json_object(raw)?;
    let value: serde_json::Value = serde_json::from_str(&json)
        .map_err(|e| Error::Inference(format!("Invalid JSON from model: {e}")))?;
    let field = value
        .get(key)
        .cloned()
        .ok_or_else(|| Error::Inference(format!("Missing key '{key}' in model output")))?;
    serde_json::from_value(field)
        .map_err(|e| Error::Inference(format!("Unexpected shape for key '{key}': {e}")))
}
