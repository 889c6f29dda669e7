//! Direct-then-fallback HTTP fetching.
//!
//! Not a retry loop: each path gets exactly one attempt, bounded by the
//! configured timeout. The direct request goes first; when it fails, the
//! same request is re-issued through each fallback path template in order
//! and the first success wins. Wrap `fetch` in a
//! [`BackoffRetryController`](crate::retry::BackoffRetryController) for
//! repeated rounds.
//!
//! Requests carrying a credential header only use fallback paths marked as
//! able to forward credentials, and any HTTP response counts as a
//! connection success: the caller interprets 4xx/5xx itself. Only timeouts
//! and transport errors advance to the next path.

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::progress::{ProgressEvent, ProgressObserver};
use crate::retry::ApiFailure;

const GUIDANCE: &str = "check network connectivity, confirm the endpoint is reachable from this host, \
     or configure additional fallback paths";

// ── Configuration ───────────────────────────────────────────────────────────

/// A fallback route that re-issues a request through an intermediary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FallbackPath {
    /// URL template; `{url}` is replaced by the percent-encoded target.
    pub template: String,
    /// Whether the intermediary forwards credential headers.
    #[serde(default)]
    pub carries_credentials: bool,
}

impl FallbackPath {
    pub fn new(template: &str, carries_credentials: bool) -> Self {
        Self {
            template: template.to_string(),
            carries_credentials,
        }
    }

    /// Build the URL that routes `target` through this path.
    pub fn render(&self, target: &str) -> String {
        let encoded: String = url::form_urlencoded::byte_serialize(target.as_bytes()).collect();
        if self.template.contains("{url}") {
            self.template.replace("{url}", &encoded)
        } else {
            format!("{}{}", self.template, encoded)
        }
    }
}

/// Fetcher settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    /// Per-attempt timeout covering connect, send and body read.
    pub timeout_ms: u64,
    pub user_agent: String,
    /// Header names (case-insensitive) that mark a request as authenticated.
    pub credential_headers: Vec<String>,
    /// Headers sent on every request unless the caller overrides them.
    pub default_headers: BTreeMap<String, String>,
    pub fallback_paths: Vec<FallbackPath>,
}

impl Default for FetchConfig {
    fn default() -> Self {
        let mut default_headers = BTreeMap::new();
        default_headers.insert(
            "accept".to_string(),
            "application/json, text/plain, */*".to_string(),
        );
        Self {
            timeout_ms: 15_000,
            user_agent: concat!("seo-integrity/", env!("CARGO_PKG_VERSION")).to_string(),
            credential_headers: vec![
                "authorization".to_string(),
                "x-api-key".to_string(),
                "api-key".to_string(),
            ],
            default_headers,
            fallback_paths: vec![
                FallbackPath::new("https://corsproxy.io/?url={url}", true),
                FallbackPath::new("https://api.allorigins.win/raw?url={url}", false),
                FallbackPath::new("https://api.codetabs.com/v1/proxy?quest={url}", false),
            ],
        }
    }
}

// ── Request / response ──────────────────────────────────────────────────────

/// Method, headers and body of an outbound request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchRequest {
    pub method: String,
    #[serde(default)]
    pub headers: Vec<(String, String)>,
    #[serde(default)]
    pub body: Option<String>,
}

impl FetchRequest {
    pub fn get() -> Self {
        Self {
            method: "GET".to_string(),
            ..Default::default()
        }
    }

    pub fn post(body: impl Into<String>) -> Self {
        Self {
            method: "POST".to_string(),
            body: Some(body.into()),
            ..Default::default()
        }
    }

    pub fn header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    /// Whether any header name appears in `credential_headers`.
    pub fn has_credentials(&self, credential_headers: &[String]) -> bool {
        self.headers
            .iter()
            .any(|(k, _)| credential_headers.iter().any(|c| c.eq_ignore_ascii_case(k)))
    }
}

/// Which route an attempt took.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FetchPath {
    Direct,
    /// Index into the configured fallback list.
    Fallback(usize),
}

impl fmt::Display for FetchPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Direct => write!(f, "direct"),
            Self::Fallback(i) => write!(f, "fallback-{}", i + 1),
        }
    }
}

/// Response handed back to the caller, identical in shape for every path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: String,
    pub path: FetchPath,
}

impl FetchResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// First header with the given name, case-insensitive.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Turn a non-2xx response into an [`ApiFailure`] the retry controller
    /// can classify (status, headers and a body excerpt are kept).
    pub fn error_for_status(self) -> Result<Self, ApiFailure> {
        if self.is_success() {
            return Ok(self);
        }
        let excerpt: String = self.body.chars().take(300).collect();
        Err(ApiFailure::new(format!("HTTP {} via {}: {excerpt}", self.status, self.path))
            .with_status(self.status)
            .with_response(self.status, self.headers))
    }
}

/// How one attempt ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptOutcome {
    /// The response was accepted and returned.
    Accepted(u16),
    /// A response arrived but does not count as success.
    Rejected(u16),
    TimedOut,
    Network(String),
}

impl fmt::Display for AttemptOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Accepted(s) => write!(f, "HTTP {s}"),
            Self::Rejected(s) => write!(f, "HTTP {s}"),
            Self::TimedOut => write!(f, "timed out"),
            Self::Network(e) => write!(f, "network error: {e}"),
        }
    }
}

/// Record of one attempt on one path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchAttempt {
    pub path: FetchPath,
    pub target_url: String,
    pub timeout: Duration,
    pub outcome: AttemptOutcome,
    /// `Retry-After` header of a rejected response.
    pub retry_after: Option<String>,
}

/// Fetch failures.
#[derive(thiserror::Error, Debug)]
pub enum FetchError {
    /// Direct and every fallback path failed. Only the last cause is kept.
    #[error("all {attempts} network paths failed for {url}; last error: {last_error}. Try to {guidance}")]
    AllPathsFailed {
        url: String,
        attempts: usize,
        last_status: Option<u16>,
        /// `Retry-After` sent with the last rejected response.
        last_retry_after: Option<String>,
        last_error: String,
        guidance: &'static str,
    },

    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl FetchError {
    /// HTTP status of the last rejected attempt, if it got that far.
    pub fn last_status(&self) -> Option<u16> {
        match self {
            Self::AllPathsFailed { last_status, .. } => *last_status,
            Self::InvalidRequest(_) => None,
        }
    }

    /// Retry hint the server attached to the last rejected response.
    pub fn retry_after(&self) -> Option<&str> {
        match self {
            Self::AllPathsFailed { last_retry_after, .. } => last_retry_after.as_deref(),
            Self::InvalidRequest(_) => None,
        }
    }
}

// ── Fetcher ─────────────────────────────────────────────────────────────────

/// HTTP fetcher that tries the direct route, then each fallback path.
#[derive(Clone)]
pub struct MultiPathFetcher {
    client: reqwest::Client,
    config: FetchConfig,
}

impl MultiPathFetcher {
    pub fn new(config: FetchConfig) -> Self {
        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::limited(5))
            .user_agent(config.user_agent.as_str())
            .build()
            .unwrap_or_default();
        Self { client, config }
    }

    pub fn config(&self) -> &FetchConfig {
        &self.config
    }

    /// Ordered routes for `url`: direct first, then the fallbacks allowed for
    /// this request.
    pub fn plan(&self, url: &str, request: &FetchRequest) -> Vec<(FetchPath, String)> {
        let authenticated = request.has_credentials(&self.config.credential_headers);
        let mut routes = vec![(FetchPath::Direct, url.to_string())];
        routes.extend(
            self.config
                .fallback_paths
                .iter()
                .enumerate()
                .filter(|(_, p)| !authenticated || p.carries_credentials)
                .map(|(i, p)| (FetchPath::Fallback(i), p.render(url))),
        );
        routes
    }

    /// Fetch `url`, falling back through the configured paths.
    pub async fn fetch(
        &self,
        url: &str,
        request: &FetchRequest,
        observer: &dyn ProgressObserver,
    ) -> Result<FetchResponse, FetchError> {
        let method = reqwest::Method::from_bytes(request.method.to_uppercase().as_bytes())
            .map_err(|_| FetchError::InvalidRequest(format!("bad method '{}'", request.method)))?;
        let headers = self.merged_headers(request)?;
        let authenticated = request.has_credentials(&self.config.credential_headers);
        let timeout = Duration::from_millis(self.config.timeout_ms);

        let routes = self.plan(url, request);
        let total = routes.len();
        let mut last: Option<FetchAttempt> = None;

        for (path, target) in routes {
            observer.on_event(&ProgressEvent::FetchStarted {
                path: path.to_string(),
                url: target.clone(),
            });

            let (attempt, response) = self
                .attempt(path, &target, method.clone(), headers.clone(), request, timeout, authenticated)
                .await;

            if let Some(response) = response {
                tracing::debug!(%path, url = %target, status = response.status, "fetch succeeded");
                observer.on_event(&ProgressEvent::FetchSucceeded {
                    path: path.to_string(),
                    url: target,
                    status: response.status,
                });
                return Ok(response);
            }

            tracing::warn!(%path, url = %target, outcome = %attempt.outcome, "fetch path failed");
            observer.on_event(&ProgressEvent::FetchFailed {
                path: path.to_string(),
                url: target,
                reason: attempt.outcome.to_string(),
            });
            last = Some(attempt);
        }

        let (last_status, last_retry_after, last_error) = match last {
            Some(FetchAttempt {
                path,
                outcome: AttemptOutcome::Rejected(status),
                retry_after,
                ..
            }) => (Some(status), retry_after, format!("{path}: HTTP {status}")),
            Some(a) => (None, None, format!("{}: {}", a.path, a.outcome)),
            None => (None, None, "no route attempted".to_string()),
        };

        tracing::error!(url, attempts = total, "all fetch paths failed");
        Err(FetchError::AllPathsFailed {
            url: url.to_string(),
            attempts: total,
            last_status,
            last_retry_after,
            last_error,
            guidance: GUIDANCE,
        })
    }

    #[allow(clippy::too_many_arguments)]
    async fn attempt(
        &self,
        path: FetchPath,
        target: &str,
        method: reqwest::Method,
        headers: reqwest::header::HeaderMap,
        request: &FetchRequest,
        timeout: Duration,
        authenticated: bool,
    ) -> (FetchAttempt, Option<FetchResponse>) {
        let mut builder = self.client.request(method, target).headers(headers);
        if let Some(body) = &request.body {
            builder = builder.body(body.clone());
        }

        // The whole exchange is bounded; dropping the future cancels it.
        let exchange = async {
            let r = builder.send().await?;
            let status = r.status().as_u16();
            let headers: Vec<(String, String)> = r
                .headers()
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_str().unwrap_or("").to_string()))
                .collect();
            let body = r.text().await?;
            Ok::<_, reqwest::Error>((status, headers, body))
        };

        let record = |outcome| FetchAttempt {
            path,
            target_url: target.to_string(),
            timeout,
            outcome,
            retry_after: None,
        };

        match tokio::time::timeout(timeout, exchange).await {
            Err(_) => (record(AttemptOutcome::TimedOut), None),
            Ok(Err(e)) => (record(AttemptOutcome::Network(e.to_string())), None),
            Ok(Ok((status, headers, body))) => {
                let accepted = authenticated || (200..300).contains(&status);
                if !accepted {
                    let retry_after = headers
                        .iter()
                        .find(|(k, _)| k.eq_ignore_ascii_case("retry-after"))
                        .map(|(_, v)| v.clone());
                    let attempt = FetchAttempt {
                        retry_after,
                        ..record(AttemptOutcome::Rejected(status))
                    };
                    return (attempt, None);
                }
                let response = FetchResponse {
                    status,
                    headers,
                    body,
                    path,
                };
                (record(AttemptOutcome::Accepted(status)), Some(response))
            }
        }
    }

    fn merged_headers(&self, request: &FetchRequest) -> Result<reqwest::header::HeaderMap, FetchError> {
        use reqwest::header::{HeaderMap, HeaderName, HeaderValue};

        let mut map = HeaderMap::new();
        let defaults = self.config.default_headers.iter().map(|(k, v)| (k.as_str(), v.as_str()));
        let caller = request.headers.iter().map(|(k, v)| (k.as_str(), v.as_str()));
        for (name, value) in defaults.chain(caller) {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|_| FetchError::InvalidRequest(format!("bad header name '{name}'")))?;
            let value = HeaderValue::from_str(value)
                .map_err(|_| FetchError::InvalidRequest(format!("bad value for header '{name}'")))?;
            map.insert(name, value);
        }
        Ok(map)
    }
}
