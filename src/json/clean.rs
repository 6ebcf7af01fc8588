use crate::error::{Error, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

use super::repair::repair_json;

static ANSI_ESCAPE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\x1b\[[0-9;?]*[a-zA-Z]").expect("valid ANSI escape regex"));

/// Remove terminal escape sequences (spinner and colour codes from `ollama run`)
pub fn strip_ansi(text: &str) -> String {
    ANSI_ESCAPE.replace_all(text, "").into_owned()
}

/// Find and parse the JSON embedded in free-form model output.
///
/// The candidate runs from the first `{` or `[` to just after the last `}` or
/// `]` (or to the end of the text when no closer exists). A strict parse is
/// tried first, then [`repair_json`].
pub fn clean_and_parse_json(raw: &str) -> Result<Value> {
    if raw.trim().is_empty() {
        return Err(Error::EmptyResponse);
    }

    let text = strip_ansi(raw);

    let start = text.find(|c: char| c == '{' || c == '[').ok_or(Error::NoJsonFound)?;
    let end = text
        .rfind(|c: char| c == '}' || c == ']')
        .map(|i| i + 1)
        .filter(|&end| end > start)
        .unwrap_or(text.len());
    let candidate = &text[start..end];

    match serde_json::from_str::<Value>(candidate) {
        Ok(value) => Ok(value),
        Err(strict_err) => {
            tracing::info!(error = %strict_err, "standard JSON parse failed, attempting repair");
            repair_json(candidate).map_err(|e| {
                tracing::error!(raw_output = %raw, "could not repair JSON from model output");
                e
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_plain_json() {
        let value = clean_and_parse_json(r#"{"a": 1, "b": [true, null]}"#).unwrap();
        assert_eq!(value, json!({"a": 1, "b": [true, null]}));
    }

    #[test]
    fn test_surrounding_chatter_and_fences() {
        let raw = "Sure! Here is the data:\n```json\n{\"parties\": {\"consignee\": \"RETAIL HOLDINGS PTY LIMITED\"}}\n```\nLet me know.";
        let value = clean_and_parse_json(raw).unwrap();
        assert_eq!(
            value,
            json!({"parties": {"consignee": "RETAIL HOLDINGS PTY LIMITED"}})
        );
    }

    #[test]
    fn test_ansi_sequences_removed() {
        let raw = "\x1b[?25l\x1b[2K\x1b[1G{\"value\": \"澳大利亚\"}\x1b[?25h";
        let value = clean_and_parse_json(raw).unwrap();
        assert_eq!(value, json!({"value": "澳大利亚"}));
    }

    #[test]
    fn test_array_start_wins_when_first() {
        let value = clean_and_parse_json("result: [{\"a\": 1}] done").unwrap();
        assert_eq!(value, json!([{"a": 1}]));
    }

    #[test]
    fn test_empty_response() {
        assert!(matches!(clean_and_parse_json(""), Err(Error::EmptyResponse)));
        assert!(matches!(
            clean_and_parse_json("  \n\t "),
            Err(Error::EmptyResponse)
        ));
    }

    #[test]
    fn test_no_json_found() {
        assert!(matches!(
            clean_and_parse_json("I could not read the document."),
            Err(Error::NoJsonFound)
        ));
    }

    #[test]
    fn test_truncated_output_is_repaired() {
        let raw = "{\"document_info\": {\"customs_declaration_no\": \"5316202";
        let value = clean_and_parse_json(raw).unwrap();
        assert_eq!(
            value,
            json!({"document_info": {"customs_declaration_no": "5316202"}})
        );
    }

    #[test]
    fn test_trailing_comma_repaired() {
        let value = clean_and_parse_json("{\"a\": 1, \"b\": 2,}").unwrap();
        assert_eq!(value, json!({"a": 1, "b": 2}));
    }
}
