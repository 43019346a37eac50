//! Recovering a single JSON value from free-form model output.
//!
//! Pure functions, no async. Models wrap JSON in code fences, add prose
//! around it, or nest fences inside fences. The pipeline here picks the most
//! likely payload and then runs an ordered list of parse strategies, stopping
//! at the first one that yields valid JSON.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

const FENCE: &str = "```";
const SNIPPET_CHARS: usize = 200;

/// Outer fence wrapper: "```<info>\n<body>\n```" spanning the whole text.
static OUTER_FENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)\A```.*?\n(.*?)\n```\z").expect("outer fence regex"));

/// Failure to recover any valid JSON from the input.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ExtractionError {
    #[error("no valid JSON recoverable from input ({input_len} bytes): {snippet}")]
    NoJson { input_len: usize, snippet: String },
}

impl ExtractionError {
    fn no_json(input: &str) -> Self {
        Self::NoJson {
            input_len: input.len(),
            snippet: input.chars().take(SNIPPET_CHARS).collect(),
        }
    }
}

/// A fenced code block carrying a non-empty language tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FencedBlock {
    pub language: String,
    pub content: String,
}

type Strategy = fn(&str) -> Option<Value>;

/// Parse strategies in the order they are attempted.
const STRATEGIES: &[(&str, Strategy)] = &[("direct", parse_direct), ("balanced", parse_balanced)];

/// Extract the JSON payload of `raw` and return it re-serialized compactly.
pub fn extract_json_string(raw: &str) -> Result<String, ExtractionError> {
    let value = extract_json_value(raw)?;
    // Serializing a `Value` cannot fail: every map key is already a string.
    serde_json::to_string(&value).map_err(|_| ExtractionError::no_json(raw))
}

/// Extract the JSON payload of `raw` as a generic JSON value.
pub fn extract_json_value(raw: &str) -> Result<Value, ExtractionError> {
    let candidate = select_candidate(raw);

    for (name, strategy) in STRATEGIES {
        if let Some(value) = strategy(&candidate) {
            debug!("JSON recovered with '{}' strategy ({} chars)", name, candidate.len());
            return Ok(value);
        }
    }

    warn!(
        "No JSON recoverable from model output ({} bytes): {}",
        raw.len(),
        raw.chars().take(SNIPPET_CHARS).collect::<String>()
    );
    Err(ExtractionError::no_json(raw))
}

/// Pick the text most likely to hold the JSON payload.
///
/// The first `json`-tagged block wins, then the first tagged block of any
/// language, then the whole input. Up to two layers of outer fences are
/// stripped from the result.
pub fn select_candidate(raw: &str) -> String {
    let blocks = find_fenced_blocks(raw);

    let selected = blocks
        .iter()
        .find(|b| b.language.eq_ignore_ascii_case("json"))
        .or_else(|| blocks.first());

    match selected {
        Some(block) => {
            debug!("Selected fenced block tagged '{}' of {}", block.language, blocks.len());
            strip_outer_fences(&block.content)
        }
        None => strip_outer_fences(raw.trim()),
    }
}

/// Collect fenced blocks with a language tag, in order of appearance.
///
/// Fences with an empty info string are skipped without recording a block.
/// An opening fence with no closing fence ends the scan.
pub fn find_fenced_blocks(raw: &str) -> Vec<FencedBlock> {
    let text = normalize_line_endings(raw);
    let mut blocks = Vec::new();
    let mut search_from = 0;

    while let Some(open) = find_from(&text, FENCE, search_from) {
        let info_start = open + FENCE.len();
        let Some(line_end) = find_from(&text, "\n", info_start) else {
            break;
        };

        let language = text[info_start..line_end]
            .split_whitespace()
            .next()
            .unwrap_or_default();

        if language.is_empty() {
            search_from = line_end + 1;
            continue;
        }

        let Some(close) = find_from(&text, FENCE, line_end + 1) else {
            break;
        };

        blocks.push(FencedBlock {
            language: language.to_string(),
            content: text[line_end + 1..close].to_string(),
        });
        search_from = close + FENCE.len();
    }

    blocks
}

/// Remove up to two nested outer fence wrappers, trimming at each layer.
pub fn strip_outer_fences(content: &str) -> String {
    let mut result = content.trim();
    for _ in 0..2 {
        match OUTER_FENCE.captures(result).and_then(|c| c.get(1)) {
            Some(inner) => result = inner.as_str().trim(),
            None => break,
        }
    }
    result.to_string()
}

/// Slice of `text` spanning the first balanced object or array.
///
/// Starts at whichever of `{` or `[` comes first and tracks depth of that
/// delimiter pair only. Quoted strings are opaque, honoring backslash escapes.
/// Returns `None` if the value never closes.
pub fn find_balanced_json(text: &str) -> Option<&str> {
    let text = text.trim();
    let start = text.find(['{', '['])?;
    let bytes = text.as_bytes();
    let opener = bytes[start];
    let closer = if opener == b'{' { b'}' } else { b']' };

    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, &byte) in bytes.iter().enumerate().skip(start) {
        if in_string {
            if escaped {
                escaped = false;
            } else if byte == b'\\' {
                escaped = true;
            } else if byte == b'"' {
                in_string = false;
            }
            continue;
        }

        if byte == b'"' {
            in_string = true;
        } else if byte == opener {
            depth += 1;
        } else if byte == closer {
            depth -= 1;
            if depth == 0 {
                return Some(&text[start..=i]);
            }
        }
    }

    None
}

fn parse_direct(candidate: &str) -> Option<Value> {
    serde_json::from_str(candidate.trim()).ok()
}

fn parse_balanced(candidate: &str) -> Option<Value> {
    find_balanced_json(candidate).and_then(|slice| serde_json::from_str(slice).ok())
}

fn normalize_line_endings(text: &str) -> String {
    text.replace("\r\n", "\n").replace('\r', "\n")
}

fn find_from(haystack: &str, needle: &str, from: usize) -> Option<usize> {
    haystack.get(from..)?.find(needle).map(|i| from + i)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_json_block_surrounded_by_prose() {
        let raw = "Here is the result:\n```json\n{\"a\":1}\n```\nThanks!";
        assert_eq!(extract_json_string(raw).unwrap(), r#"{"a":1}"#);
    }

    #[test]
    fn test_bare_json_without_fences() {
        let raw = "  {\"x\": [1,2,3]}  ";
        assert_eq!(extract_json_string(raw).unwrap(), r#"{"x":[1,2,3]}"#);
    }

    #[test]
    fn test_balanced_scan_inside_prose() {
        let raw = "Sure! {\"a\": {\"b\": 2}} — hope that helps";
        assert_eq!(extract_json_string(raw).unwrap(), r#"{"a":{"b":2}}"#);
    }

    #[test]
    fn test_prose_only_fails() {
        let err = extract_json_string("I could not read the image, sorry.").unwrap_err();
        let ExtractionError::NoJson { input_len, snippet } = err;
        assert_eq!(input_len, 34);
        assert!(snippet.starts_with("I could not"));
    }

    #[test]
    fn test_first_json_block_wins() {
        let raw = "```json\n{\"n\":1}\n```\ntext\n```json\n{\"n\":2}\n```";
        assert_eq!(extract_json_string(raw).unwrap(), r#"{"n":1}"#);
    }

    #[test]
    fn test_json_tag_is_case_insensitive() {
        let raw = "```yaml\nnot: json\n```\n```JSON\n{\"ok\":true}\n```";
        assert_eq!(extract_json_string(raw).unwrap(), r#"{"ok":true}"#);
    }

    #[test]
    fn test_first_tagged_block_when_no_json_tag() {
        let raw = "```text\n[1, 2]\n```\n```js\n{\"later\": 1}\n```";
        assert_eq!(extract_json_string(raw).unwrap(), "[1,2]");
    }

    #[test]
    fn test_untagged_fence_skipped_but_scan_continues() {
        let raw = "```\nignored\n```\nthen\n```json\n{\"k\":\"v\"}\n```";
        let blocks = find_fenced_blocks(raw);
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].language, "json");
        assert_eq!(extract_json_string(raw).unwrap(), r#"{"k":"v"}"#);
    }

    #[test]
    fn test_unterminated_fence_not_recorded() {
        let raw = "```json\n{\"a\": 1}";
        assert!(find_fenced_blocks(raw).is_empty());
        // Falls back to the whole input, recovered by the balanced scan.
        assert_eq!(extract_json_string(raw).unwrap(), r#"{"a":1}"#);
    }

    #[test]
    fn test_info_string_takes_first_token() {
        let blocks = find_fenced_blocks("```json title=w2\n{}\n```");
        assert_eq!(
            blocks,
            vec![FencedBlock {
                language: "json".to_string(),
                content: "{}\n".to_string(),
            }]
        );
    }

    #[test]
    fn test_crlf_line_endings() {
        let raw = "intro\r\n```json\r\n{\"a\": 1}\r\n```\r\n";
        assert_eq!(extract_json_string(raw).unwrap(), r#"{"a":1}"#);
    }

    #[test]
    fn test_strip_nested_fences() {
        let nested = "```json\n```json\n{\"deep\": true}\n```\n```";
        assert_eq!(strip_outer_fences(nested), r#"{"deep": true}"#);
        assert_eq!(strip_outer_fences("  {\"a\":1}  "), r#"{"a":1}"#);
    }

    #[test]
    fn test_balanced_scan_ignores_braces_in_strings() {
        let text = r#"prefix {"s": "a } tricky \" { quote", "n": [1]} suffix }"#;
        assert_eq!(
            find_balanced_json(text).unwrap(),
            r#"{"s": "a } tricky \" { quote", "n": [1]}"#
        );
    }

    #[test]
    fn test_balanced_scan_prefers_earliest_delimiter() {
        assert_eq!(find_balanced_json("list: [1, {\"a\": 2}] end").unwrap(), r#"[1, {"a": 2}]"#);
        assert_eq!(find_balanced_json("{\"a\": [1, 2"), None);
        assert_eq!(find_balanced_json("no delimiters"), None);
    }

    #[test]
    fn test_truncated_structure_fails() {
        let raw = "```json\n{\"a\": {\"b\": 2}\n```";
        assert!(extract_json_string(raw).is_err());
    }

    #[test]
    fn test_canonical_output_is_idempotent() {
        let raw = "```json\n{ \"b\" : [ 1 , 2 ],\n  \"a\": null }\n```";
        let once = extract_json_string(raw).unwrap();
        let twice = extract_json_string(&once).unwrap();
        assert_eq!(once, twice);
        let parsed: Value = serde_json::from_str(&once).unwrap();
        assert_eq!(parsed, json!({"a": null, "b": [1, 2]}));
    }

    #[test]
    fn test_extract_value_scalar_payload() {
        assert_eq!(extract_json_value("```json\n42\n```").unwrap(), json!(42));
    }
}
