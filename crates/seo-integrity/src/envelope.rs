//! Request/response envelopes for running the integrity passes in a
//! separate worker process.
//!
//! A worker receives one [`Request`] per message and answers with exactly
//! one [`Response`] carrying the same id. [`handle`] is pure and synchronous;
//! transports only move envelopes around.
//!
//! ```json
//! {"id": 1, "op": "extract", "text": "Sure! {\"a\": 1,}"}
//! {"id": 1, "status": "ok", "result": {"text": "{\"a\": 1}", "completeness": "exact"}}
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::IntegrityConfig;
use crate::error::IntegrityError;
use crate::extract::extract_payload;
use crate::links::LinkIntegrityEngine;
use crate::media::MediaIntegrityGuardian;
use crate::quality::check_length;
use crate::types::{Destination, LinkDirectory, MediaItem};

/// Correlation id: string, number, or null.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RequestId {
    String(String),
    Number(i64),
    #[default]
    Null,
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RequestId::String(s) => write!(f, "{s}"),
            RequestId::Number(n) => write!(f, "{n}"),
            RequestId::Null => write!(f, "null"),
        }
    }
}

/// Work a worker can be asked to do.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Operation {
    /// Pull a JSON payload out of noisy text.
    Extract { text: String },
    /// Run the link passes.
    Links {
        document: String,
        directory: Vec<Destination>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        min_links: Option<usize>,
    },
    /// Repair duplicate media embeds.
    Media {
        document: String,
        items: Vec<MediaItem>,
    },
    /// Apply the minimum-length gate.
    Quality {
        content: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        min_words: Option<usize>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    #[serde(default)]
    pub id: RequestId,
    #[serde(flatten)]
    pub op: Operation,
}

impl Request {
    pub fn new(id: RequestId, op: Operation) -> Self {
        Self { id, op }
    }
}

/// Result or failure of one request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome {
    Ok {
        result: Value,
    },
    Error {
        message: String,
        /// Partial work that survived the failure.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        salvaged: Option<String>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub id: RequestId,
    #[serde(flatten)]
    pub outcome: Outcome,
}

impl Response {
    pub fn ok(id: RequestId, result: Value) -> Self {
        Self {
            id,
            outcome: Outcome::Ok { result },
        }
    }

    pub fn error(id: RequestId, message: impl Into<String>) -> Self {
        Self {
            id,
            outcome: Outcome::Error {
                message: message.into(),
                salvaged: None,
            },
        }
    }

    fn from_error(id: RequestId, err: &IntegrityError) -> Self {
        Self {
            id,
            outcome: Outcome::Error {
                message: err.to_string(),
                salvaged: err.salvaged().map(str::to_string),
            },
        }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self.outcome, Outcome::Ok { .. })
    }
}

/// Execute one request.
pub fn handle(config: &IntegrityConfig, request: Request) -> Response {
    let id = request.id;
    tracing::debug!(id = %id, "handling envelope");
    match dispatch(config, request.op) {
        Ok(result) => Response::ok(id, result),
        Err(e) => {
            tracing::warn!(id = %id, error = %e, "envelope failed");
            Response::from_error(id, &e)
        }
    }
}

fn dispatch(config: &IntegrityConfig, op: Operation) -> Result<Value, IntegrityError> {
    match op {
        Operation::Extract { text } => {
            let payload = extract_payload(&text)?;
            Ok(serde_json::to_value(payload)?)
        }
        Operation::Links {
            document,
            directory,
            min_links,
        } => {
            let engine = LinkIntegrityEngine::new(config.links.clone());
            let directory = LinkDirectory::new(directory);
            let quota = min_links.unwrap_or(config.links.min_links);
            let outcome = engine.run_with_quota(&document, &directory, quota);
            Ok(serde_json::to_value(outcome)?)
        }
        Operation::Media { document, items } => {
            let guardian = MediaIntegrityGuardian::new(&config.media)?;
            let fixed = guardian.fix(&document, &items);
            Ok(serde_json::json!({
                "changed": fixed != document,
                "document": fixed,
            }))
        }
        Operation::Quality { content, min_words } => {
            let minimum = min_words.unwrap_or(config.quality.min_words);
            let length = crate::quality::visible_word_count(&content);
            check_length(&content, minimum)?;
            Ok(serde_json::json!({ "length": length, "minimum": minimum }))
        }
    }
}
