//! Minimum-length gate for generated content.
//!
//! Short output is not thrown away: the error carries the content and its
//! measured length so callers can salvage partial work.

use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Quality thresholds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QualityConfig {
    /// Minimum visible words a finished document must have.
    pub min_words: usize,
}

impl Default for QualityConfig {
    fn default() -> Self {
        Self { min_words: 300 }
    }
}

/// Content fell under the minimum length.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("content too short: {length} words, minimum is {minimum}")]
pub struct ContentTooShort {
    pub content: String,
    pub length: usize,
    pub minimum: usize,
}

impl ContentTooShort {
    /// Take the salvaged content.
    pub fn into_content(self) -> String {
        self.content
    }
}

/// Count words outside markup tags.
pub fn visible_word_count(content: &str) -> usize {
    static TAG: OnceLock<Regex> = OnceLock::new();
    let re = TAG.get_or_init(|| Regex::new(r"<[^>]*>").expect("tag regex is valid"));
    re.replace_all(content, " ").split_whitespace().count()
}

/// Pass `content` through if it has at least `minimum` visible words.
pub fn check_length(content: &str, minimum: usize) -> Result<&str, ContentTooShort> {
    let length = visible_word_count(content);
    if length >= minimum {
        return Ok(content);
    }
    tracing::warn!(length, minimum, "content below minimum length");
    Err(ContentTooShort {
        content: content.to_string(),
        length,
        minimum,
    })
}
