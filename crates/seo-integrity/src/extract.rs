//! Pull a JSON payload out of noisy model output and repair common defects.
//!
//! Model responses wrap JSON in prose and code fences, leave trailing commas
//! before closers, and get cut off mid-structure when they hit an output
//! limit. Extraction works in stages:
//!
//! 1. Text that already parses is returned as-is.
//! 2. Fence markers and commas directly before `}`/`]` are stripped.
//! 3. The first `{` or `[` starts a candidate; a string-aware scan finds the
//!    matching closer.
//! 4. A candidate that never closes is auto-closed, unless the cut happened
//!    inside a string literal: that is reported, never patched.
//! 5. The candidate is parsed, with one more trailing-comma pass on failure.

use std::sync::OnceLock;

use regex::Regex;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// How much of the candidate came straight from the input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Completeness {
    /// A balanced span was found in the text.
    Exact,
    /// The input was truncated and missing closers were appended.
    AutoClosed,
}

/// A recognised structured span.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedPayload {
    pub text: String,
    pub completeness: Completeness,
}

/// Extraction failures. Candidates are carried in full for diagnostics.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ExtractError {
    #[error("no JSON object or array found in response")]
    NoStructure,

    #[error("response was truncated inside a string literal: {}", preview(.candidate))]
    UnterminatedString { candidate: String },

    #[error("could not parse extracted JSON ({reason}): {}", preview(.candidate))]
    Unparsable { candidate: String, reason: String },
}

impl ExtractError {
    /// The text that was attempted, when one was found.
    pub fn candidate(&self) -> Option<&str> {
        match self {
            Self::NoStructure => None,
            Self::UnterminatedString { candidate } | Self::Unparsable { candidate, .. } => {
                Some(candidate)
            }
        }
    }
}

fn preview(candidate: &str) -> String {
    const MAX: usize = 200;
    if candidate.chars().count() <= MAX {
        candidate.to_string()
    } else {
        let head: String = candidate.chars().take(MAX).collect();
        format!("{head}...")
    }
}

// ── Public API ──────────────────────────────────────────────────────────────

/// Extract the payload text from `text`.
pub fn extract(text: &str) -> Result<String, ExtractError> {
    extract_payload(text).map(|p| p.text)
}

/// Extract the payload and deserialize it into `T`.
pub fn extract_json<T: DeserializeOwned>(text: &str) -> Result<T, ExtractError> {
    let payload = extract_payload(text)?;
    serde_json::from_str(&payload.text).map_err(|e| ExtractError::Unparsable {
        reason: e.to_string(),
        candidate: payload.text,
    })
}

/// Extract the payload along with its completeness flag.
pub fn extract_payload(text: &str) -> Result<ExtractedPayload, ExtractError> {
    if parses(text) {
        return Ok(ExtractedPayload {
            text: text.to_string(),
            completeness: Completeness::Exact,
        });
    }

    let unfenced = strip_fences(text);
    let start = unfenced.find(['{', '[']).ok_or(ExtractError::NoStructure)?;
    // Prose before the opener may hold stray quotes, so commas are only
    // stripped from the structure onwards.
    let cleaned = strip_trailing_commas(&unfenced[start..]);
    let scan = scan_balanced(&cleaned);

    let (candidate, completeness) = match scan {
        Scan::Balanced(len) => (cleaned[..len].to_string(), Completeness::Exact),
        Scan::OpenString => {
            tracing::debug!("extraction failed: truncated inside string literal");
            return Err(ExtractError::UnterminatedString { candidate: cleaned });
        }
        Scan::Truncated(open) => {
            let mut closed = cleaned.trim_end().to_string();
            closed.extend(open.iter().rev().map(|&c| closer_for(c)));
            tracing::debug!(appended = open.len(), "auto-closed truncated payload");
            (closed, Completeness::AutoClosed)
        }
    };

    if parses(&candidate) {
        return Ok(ExtractedPayload {
            text: candidate,
            completeness,
        });
    }

    let repaired = strip_trailing_commas(&candidate);
    match serde_json::from_str::<serde_json::Value>(&repaired) {
        Ok(_) => Ok(ExtractedPayload {
            text: repaired,
            completeness,
        }),
        Err(e) => Err(ExtractError::Unparsable {
            candidate: repaired,
            reason: e.to_string(),
        }),
    }
}

// ── Internals ───────────────────────────────────────────────────────────────

fn parses(text: &str) -> bool {
    serde_json::from_str::<serde_json::Value>(text).is_ok()
}

fn strip_fences(text: &str) -> String {
    static FENCE: OnceLock<Regex> = OnceLock::new();
    let re = FENCE.get_or_init(|| Regex::new(r"```[A-Za-z0-9_-]*").expect("fence regex is valid"));
    re.replace_all(text, "").into_owned()
}

/// Drop commas that directly precede a closing bracket, outside string
/// literals.
fn strip_trailing_commas(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_string = false;
    let mut escaped = false;

    for (i, c) in text.char_indices() {
        if escaped {
            escaped = false;
        } else if in_string {
            match c {
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
        } else if c == '"' {
            in_string = true;
        } else if c == ',' {
            let next = text[i + 1..].trim_start().chars().next();
            if matches!(next, Some('}' | ']')) {
                continue;
            }
        }
        out.push(c);
    }
    out
}

fn closer_for(open: char) -> char {
    if open == '[' {
        ']'
    } else {
        '}'
    }
}

enum Scan {
    /// Byte length of the balanced span.
    Balanced(usize),
    /// Ran out of input inside a string literal.
    OpenString,
    /// Ran out of input with these openers still unclosed, outermost first.
    Truncated(Vec<char>),
}

/// Scan from an opening bracket to its matching closer. Brackets inside
/// string literals are ignored; a backslash skips the next character.
fn scan_balanced(text: &str) -> Scan {
    let mut stack: Vec<char> = Vec::new();
    let mut in_string = false;
    let mut escaped = false;

    for (i, c) in text.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' => escaped = true,
            '"' => in_string = !in_string,
            _ if in_string => {}
            '{' | '[' => stack.push(c),
            '}' | ']' => {
                stack.pop();
                if stack.is_empty() {
                    return Scan::Balanced(i + c.len_utf8());
                }
            }
            _ => {}
        }
    }

    if in_string {
        Scan::OpenString
    } else {
        Scan::Truncated(stack)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    fn value(text: &str) -> Value {
        serde_json::from_str(text).unwrap()
    }

    #[test]
    fn test_valid_json_returned_unchanged() {
        let text = "  {\"a\": 1}\n";
        assert_eq!(extract(text).unwrap(), text);
    }

    #[test]
    fn test_fenced_with_trailing_commas() {
        let text = "Sure! Here's the JSON:\n```json\n{\"a\":1,\"b\":[1,2,], }\n```";
        let out = extract(text).unwrap();
        assert_eq!(value(&out), json!({"a": 1, "b": [1, 2]}));
    }

    #[test]
    fn test_idempotent() {
        let inputs = [
            "prefix {\"k\": \"v\"} suffix",
            "```\n[1, 2, 3,]\n```",
            "{\"outer\": {\"inner\": [1, {\"x\": 2}",
        ];
        for input in inputs {
            let once = extract(input).unwrap();
            assert_eq!(extract(&once).unwrap(), once, "input: {input}");
        }
    }

    #[test]
    fn test_prose_around_array() {
        let text = "The titles are below.\n[\"One\", \"Two\"]\nLet me know!";
        assert_eq!(value(&extract(text).unwrap()), json!(["One", "Two"]));
    }

    #[test]
    fn test_brackets_inside_strings_ignored() {
        let text = r#"Result: {"title": "Use {braces} and [brackets]", "n": 2} done"#;
        let out = extract(text).unwrap();
        assert_eq!(
            value(&out),
            json!({"title": "Use {braces} and [brackets]", "n": 2})
        );
    }

    #[test]
    fn test_escaped_quotes_inside_strings() {
        let text = r#"ok {"quote": "she said \"hi {\"", "z": 1} trailing"#;
        let out = extract(text).unwrap();
        assert_eq!(value(&out)["z"], json!(1));
    }

    #[test]
    fn test_truncated_structure_auto_closed() {
        let text = "```json\n{\"sections\": [{\"h\": \"Intro\"}, {\"h\": \"Body\"}";
        let payload = extract_payload(text).unwrap();
        assert_eq!(payload.completeness, Completeness::AutoClosed);
        assert_eq!(
            value(&payload.text),
            json!({"sections": [{"h": "Intro"}, {"h": "Body"}]})
        );
    }

    #[test]
    fn test_truncated_after_comma_repaired() {
        let text = "{\"a\": [1, 2,";
        let payload = extract_payload(text).unwrap();
        assert_eq!(value(&payload.text), json!({"a": [1, 2]}));
    }

    #[test]
    fn test_truncated_inside_string_fails() {
        let text = "{\"title\": \"Ten tips for [better] sle";
        let err = extract(text).unwrap_err();
        assert!(matches!(err, ExtractError::UnterminatedString { .. }));
        assert!(err.candidate().unwrap().starts_with("{\"title\""));
    }

    #[test]
    fn test_commas_inside_strings_kept() {
        let text = "He said \"ok\": {\"note\": \"a, ]\", \"tags\": [\"x, }\",],}";
        let payload = extract(text).unwrap();
        assert_eq!(value(&payload), json!({"note": "a, ]", "tags": ["x, }"]}));
    }

    #[test]
    fn test_no_structure() {
        assert_eq!(extract("no json here").unwrap_err(), ExtractError::NoStructure);
    }

    #[test]
    fn test_unparsable_includes_candidate() {
        let err = extract("look: {not: valid}").unwrap_err();
        match &err {
            ExtractError::Unparsable { candidate, .. } => assert_eq!(candidate, "{not: valid}"),
            other => panic!("unexpected: {other:?}"),
        }
        assert!(err.to_string().contains("{not: valid}"));
    }

    #[test]
    fn test_extract_json_typed() {
        #[derive(serde::Deserialize, Debug, PartialEq)]
        struct Outline {
            title: String,
            sections: Vec<String>,
        }
        let out: Outline =
            extract_json("```json\n{\"title\": \"T\", \"sections\": [\"a\", \"b\",]}\n```").unwrap();
        assert_eq!(
            out,
            Outline {
                title: "T".to_string(),
                sections: vec!["a".to_string(), "b".to_string()]
            }
        );
    }
}
