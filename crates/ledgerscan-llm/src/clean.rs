//! Cleanup of model output before JSON parsing.

use once_cell::sync::Lazy;
use regex::Regex;

use ledgerscan_core::{Error, Result};

static OPENING_JSON_FENCE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^```json").unwrap());
static OPENING_FENCE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^```\s*").unwrap());
static CLOSING_FENCE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s*```$").unwrap());

/// Strip markdown code fences and any prose before the first `[` or `{`.
pub fn clean_json_output(raw: &str) -> String {
    let cleaned = OPENING_JSON_FENCE.replace(raw, "");
    let cleaned = OPENING_FENCE.replace(&cleaned, "");
    let cleaned = CLOSING_FENCE.replace(&cleaned, "");

    let start = [cleaned.find('['), cleaned.find('{')]
        .into_iter()
        .flatten()
        .min()
        .unwrap_or(0);
    cleaned[start..].trim().to_string()
}

/// Clean and parse a model reply; unparseable output is an `Error::Llm`.
pub fn parse_model_json(raw: &str) -> Result<serde_json::Value> {
    let cleaned = clean_json_output(raw);
    serde_json::from_str(&cleaned).map_err(|e| {
        let preview: String = cleaned.chars().take(200).collect();
        Error::Llm(format!("invalid JSON from model ({}): {}", e, preview))
    })
}
