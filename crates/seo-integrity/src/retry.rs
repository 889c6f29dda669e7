//! Classification-aware retry with exponential backoff.
//!
//! `BackoffRetryController` wraps one async operation. Every failure is run
//! through [`classify`], which probes the error for a status code (explicit
//! field, then nested response, then a bracketed or worded code in the
//! message) and decides whether another attempt can help:
//!
//! - 4xx other than 429, invalid credentials and context/token-length limits
//!   are fatal and returned immediately.
//! - 429 waits for the server's retry hint plus a buffer, or falls back to a
//!   steeper exponential curve.
//! - Everything else backs off with `base_delay * factor^n` plus jitter.
//!
//! The operation's own error type comes back untouched once attempts are
//! exhausted.

use std::future::Future;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use rand::Rng;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::progress::{NoopObserver, ProgressEvent, ProgressObserver};

// ── Policy ──────────────────────────────────────────────────────────────────

/// Tunables for the retry controller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Total invocations allowed, including the first.
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub backoff_factor: f64,
    /// Steeper factor used for 429 when the server gave no hint.
    pub rate_limit_backoff_factor: f64,
    pub max_jitter_ms: u64,
    /// Added on top of an explicit retry hint.
    pub retry_after_buffer_ms: u64,
    /// Ceiling applied before jitter.
    pub max_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay_ms: 5_000,
            backoff_factor: 2.0,
            rate_limit_backoff_factor: 3.0,
            max_jitter_ms: 1_000,
            retry_after_buffer_ms: 1_000,
            max_delay_ms: 300_000,
        }
    }
}

impl RetryPolicy {
    /// Policy with the given attempt bound and base delay, other fields default.
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay_ms: base_delay.as_millis() as u64,
            ..Default::default()
        }
    }

    /// Delay before the retry that follows failed attempt `retry_index`
    /// (zero-based), without jitter.
    ///
    /// Returns `true` in the second slot when jitter should be added.
    pub fn base_delay_for(&self, retry_index: u32, classification: &Classification) -> (Duration, bool) {
        if classification.kind == FailureKind::RateLimited {
            if let Some(hint) = classification.retry_after {
                let wait = hint.saturating_add(Duration::from_millis(self.retry_after_buffer_ms));
                return (wait.min(self.max_delay()), false);
            }
            return (self.exponential(self.rate_limit_backoff_factor, retry_index), true);
        }
        (self.exponential(self.backoff_factor, retry_index), true)
    }

    /// Full delay including jitter.
    pub fn delay_for(&self, retry_index: u32, classification: &Classification) -> Duration {
        let (delay, jitter) = self.base_delay_for(retry_index, classification);
        if jitter && self.max_jitter_ms > 0 {
            let extra = rand::thread_rng().gen_range(0..=self.max_jitter_ms);
            delay + Duration::from_millis(extra)
        } else {
            delay
        }
    }

    fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_delay_ms)
    }

    fn exponential(&self, factor: f64, retry_index: u32) -> Duration {
        let exp = retry_index.min(32) as i32;
        let ms = (self.base_delay_ms as f64) * factor.max(1.0).powi(exp);
        let capped = ms.min(self.max_delay_ms as f64).max(0.0);
        Duration::from_millis(capped as u64)
    }
}

// ── Classification ──────────────────────────────────────────────────────────

/// Why an operation failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    RateLimited,
    ServerError,
    ClientError,
    InvalidCredential,
    ContextLimit,
    Unclassified,
}

/// Result of classifying one failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub status: Option<u16>,
    pub kind: FailureKind,
    pub retriable: bool,
    /// Server-provided wait, when one could be found.
    pub retry_after: Option<Duration>,
}

/// A failure from a remote service, reduced to the fields classification
/// cares about. Every probe defaults to "absent".
pub trait RemoteFailure: std::fmt::Display {
    /// Status code carried directly on the error.
    fn status(&self) -> Option<u16> {
        None
    }

    /// Status code of a response nested inside the error.
    fn response_status(&self) -> Option<u16> {
        None
    }

    /// Raw retry hint: delta-seconds or an HTTP date.
    fn retry_after(&self) -> Option<String> {
        None
    }

    fn message(&self) -> String {
        self.to_string()
    }
}

const CONTEXT_LIMIT_PHRASES: &[&str] = &[
    "context length",
    "context_length_exceeded",
    "context window",
    "maximum context",
    "token limit",
    "too many tokens",
    "maximum number of tokens",
    "prompt is too long",
    "input is too long",
];

const CREDENTIAL_PHRASES: &[&str] = &[
    "invalid api key",
    "api key not valid",
    "incorrect api key",
    "invalid_api_key",
    "invalid x-api-key",
    "invalid authentication",
    "authentication_error",
];

const RATE_LIMIT_PHRASES: &[&str] = &["too many requests", "rate limit", "rate_limit"];

/// Classify a failure into a status code and a retry decision.
pub fn classify<E: RemoteFailure + ?Sized>(err: &E) -> Classification {
    let message = err.message();
    let lower = message.to_lowercase();

    let status = err
        .status()
        .or_else(|| err.response_status())
        .or_else(|| status_from_message(&message))
        .or_else(|| {
            RATE_LIMIT_PHRASES
                .iter()
                .any(|p| lower.contains(p))
                .then_some(429)
        });

    let kind = if status == Some(401) || CREDENTIAL_PHRASES.iter().any(|p| lower.contains(p)) {
        FailureKind::InvalidCredential
    } else if CONTEXT_LIMIT_PHRASES.iter().any(|p| lower.contains(p)) {
        FailureKind::ContextLimit
    } else {
        match status {
            Some(429) => FailureKind::RateLimited,
            Some(s) if (400..500).contains(&s) => FailureKind::ClientError,
            Some(s) if s >= 500 => FailureKind::ServerError,
            _ => FailureKind::Unclassified,
        }
    };

    let retriable = !matches!(
        kind,
        FailureKind::InvalidCredential | FailureKind::ContextLimit | FailureKind::ClientError
    );

    let retry_after = if kind == FailureKind::RateLimited {
        err.retry_after()
            .and_then(|raw| parse_retry_after(&raw))
            .or_else(|| retry_hint_from_message(&message))
    } else {
        None
    };

    Classification {
        status,
        kind,
        retriable,
        retry_after,
    }
}

/// Pull a 3-digit HTTP status out of an error message.
///
/// Bracketed codes (`[429 Too Many Requests]`) win over worded ones
/// (`status 503`, `HTTP 502`, `code: 500`).
pub fn status_from_message(message: &str) -> Option<u16> {
    static BRACKETED: OnceLock<Regex> = OnceLock::new();
    static WORDED: OnceLock<Regex> = OnceLock::new();

    let bracketed = BRACKETED.get_or_init(|| {
        Regex::new(r"\[(\d{3})(?:\s[^\]]*)?\]").expect("bracketed status regex is valid")
    });
    let worded = WORDED.get_or_init(|| {
        Regex::new(r"(?i)\b(?:status(?:\s*code)?|code|http|error)\s*[:=]?\s*(\d{3})\b")
            .expect("worded status regex is valid")
    });

    [bracketed, worded].into_iter().find_map(|re| {
        re.captures_iter(message)
            .filter_map(|c| c.get(1)?.as_str().parse::<u16>().ok())
            .find(|code| (100..=599).contains(code))
    })
}

/// Parse a `Retry-After` value: delta-seconds or an HTTP date.
pub fn parse_retry_after(value: &str) -> Option<Duration> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    if let Ok(secs) = value.parse::<f64>() {
        return Duration::try_from_secs_f64(secs).ok();
    }
    let when = chrono::DateTime::parse_from_rfc2822(value).ok()?;
    let wait = when.with_timezone(&chrono::Utc) - chrono::Utc::now();
    Some(wait.to_std().unwrap_or(Duration::ZERO))
}

/// Find phrases like "retry after 30s" or "please retry in 12.5 seconds".
fn retry_hint_from_message(message: &str) -> Option<Duration> {
    static HINT: OnceLock<Regex> = OnceLock::new();
    let re = HINT.get_or_init(|| {
        Regex::new(r"(?i)retry(?:[\s_-]+after|\s+in)\s*:?\s*(\d+(?:\.\d+)?)\s*(ms|milliseconds?|s|sec|secs|seconds?)?\b")
            .expect("retry hint regex is valid")
    });
    let caps = re.captures(message)?;
    let amount: f64 = caps.get(1)?.as_str().parse().ok()?;
    let millis = matches!(caps.get(2).map(|m| m.as_str().to_lowercase()), Some(u) if u.starts_with("ms") || u.starts_with("milli"));
    let secs = if millis { amount / 1000.0 } else { amount };
    Duration::try_from_secs_f64(secs).ok()
}

// ── Failure shapes ──────────────────────────────────────────────────────────

/// Generic vendor error: optional top-level status, optional nested
/// response, free-form message.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApiFailure {
    pub status: Option<u16>,
    pub response: Option<ApiResponseInfo>,
    pub message: String,
    pub retry_after: Option<String>,
}

/// The response portion of a vendor error.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApiResponseInfo {
    pub status: Option<u16>,
    pub headers: Vec<(String, String)>,
}

impl ApiFailure {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            ..Default::default()
        }
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_response(mut self, status: u16, headers: Vec<(String, String)>) -> Self {
        self.response = Some(ApiResponseInfo {
            status: Some(status),
            headers,
        });
        self
    }

    pub fn with_retry_after(mut self, value: impl Into<String>) -> Self {
        self.retry_after = Some(value.into());
        self
    }
}

impl std::fmt::Display for ApiFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for ApiFailure {}

impl RemoteFailure for ApiFailure {
    fn status(&self) -> Option<u16> {
        self.status
    }

    fn response_status(&self) -> Option<u16> {
        self.response.as_ref().and_then(|r| r.status)
    }

    fn retry_after(&self) -> Option<String> {
        self.retry_after.clone().or_else(|| {
            self.response.as_ref().and_then(|r| {
                r.headers
                    .iter()
                    .find(|(k, _)| k.eq_ignore_ascii_case("retry-after"))
                    .map(|(_, v)| v.clone())
            })
        })
    }
}

impl RemoteFailure for reqwest::Error {
    fn status(&self) -> Option<u16> {
        reqwest::Error::status(self).map(|s| s.as_u16())
    }
}

impl RemoteFailure for crate::fetch::FetchError {
    fn status(&self) -> Option<u16> {
        self.last_status()
    }

    fn retry_after(&self) -> Option<String> {
        crate::fetch::FetchError::retry_after(self).map(str::to_string)
    }
}

impl RemoteFailure for anyhow::Error {
    fn status(&self) -> Option<u16> {
        if let Some(e) = self.downcast_ref::<ApiFailure>() {
            return e.status;
        }
        if let Some(e) = self.downcast_ref::<crate::fetch::FetchError>() {
            return e.last_status();
        }
        self.downcast_ref::<reqwest::Error>()
            .and_then(|e| e.status())
            .map(|s| s.as_u16())
    }

    fn response_status(&self) -> Option<u16> {
        self.downcast_ref::<ApiFailure>()
            .and_then(|e| e.response_status())
    }

    fn retry_after(&self) -> Option<String> {
        if let Some(e) = self.downcast_ref::<crate::fetch::FetchError>() {
            return RemoteFailure::retry_after(e);
        }
        self.downcast_ref::<ApiFailure>()
            .and_then(|e| RemoteFailure::retry_after(e))
    }

    fn message(&self) -> String {
        format!("{self:#}")
    }
}

// ── Controller ──────────────────────────────────────────────────────────────

/// Runs one operation at a time, retrying transient failures.
#[derive(Clone)]
pub struct BackoffRetryController {
    policy: RetryPolicy,
    observer: Arc<dyn ProgressObserver>,
}

impl Default for BackoffRetryController {
    fn default() -> Self {
        Self::new(RetryPolicy::default())
    }
}

impl BackoffRetryController {
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            policy,
            observer: Arc::new(NoopObserver),
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn ProgressObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Invoke `operation` until it succeeds, fails fatally, or runs out of
    /// attempts. `label` only shows up in logs and progress events.
    ///
    /// Never more than one invocation is in flight, and never more than
    /// `max_attempts` invocations happen in total.
    pub async fn run<F, Fut, T, E>(&self, label: &str, mut operation: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: RemoteFailure,
    {
        let max_attempts = self.policy.max_attempts.max(1);
        let mut attempt = 0u32;

        loop {
            attempt += 1;

            let err = match operation().await {
                Ok(value) => {
                    if attempt > 1 {
                        tracing::debug!(label, attempt, "operation succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(err) => err,
            };

            let classification = classify(&err);

            if !classification.retriable {
                tracing::warn!(
                    label,
                    attempt,
                    status = classification.status,
                    kind = ?classification.kind,
                    "non-retriable failure: {err}"
                );
                return Err(err);
            }

            if attempt >= max_attempts {
                tracing::error!(
                    label,
                    attempt,
                    status = classification.status,
                    "giving up after {attempt} attempts: {err}"
                );
                return Err(err);
            }

            let delay = self.policy.delay_for(attempt - 1, &classification);
            let delay_ms = delay.as_millis() as u64;
            tracing::warn!(
                label,
                attempt,
                max_attempts,
                status = classification.status,
                kind = ?classification.kind,
                delay_ms,
                "transient failure, retrying: {err}"
            );
            self.observer.on_event(&ProgressEvent::RetryScheduled {
                label: label.to_string(),
                attempt,
                max_attempts,
                status: classification.status,
                delay_ms,
            });

            tokio::time::sleep(delay).await;
        }
    }
}

/// Retry `operation` with the given bound and base delay.
pub async fn run_with_backoff<F, Fut, T, E>(
    operation: F,
    max_attempts: u32,
    base_delay: Duration,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: RemoteFailure,
{
    BackoffRetryController::new(RetryPolicy::new(max_attempts, base_delay))
        .run("operation", operation)
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn no_jitter() -> RetryPolicy {
        RetryPolicy {
            max_jitter_ms: 0,
            ..RetryPolicy::new(5, Duration::from_millis(100))
        }
    }

    #[test]
    fn test_status_priority_explicit_over_message() {
        let err = ApiFailure::new("upstream said [503 Service Unavailable]")
            .with_status(429)
            .with_response(500, vec![]);
        assert_eq!(classify(&err).status, Some(429));

        let nested = ApiFailure::new("status 418").with_response(500, vec![]);
        assert_eq!(classify(&nested).status, Some(500));
    }

    #[test]
    fn test_status_from_message_patterns() {
        assert_eq!(
            status_from_message("[GoogleGenerativeAI Error]: fetch failed: [429 Too Many Requests] quota"),
            Some(429)
        );
        assert_eq!(status_from_message("request failed with status code 502"), Some(502));
        assert_eq!(status_from_message("HTTP 404 not found"), Some(404));
        assert_eq!(status_from_message("took 1500 ms"), None);
        assert_eq!(status_from_message("error 999"), None);
    }

    #[test]
    fn test_classification_table() {
        let c = classify(&ApiFailure::new("boom").with_status(404));
        assert_eq!(c.kind, FailureKind::ClientError);
        assert!(!c.retriable);

        let c = classify(&ApiFailure::new("slow down").with_status(429));
        assert_eq!(c.kind, FailureKind::RateLimited);
        assert!(c.retriable);

        let c = classify(&ApiFailure::new("bad gateway").with_status(502));
        assert_eq!(c.kind, FailureKind::ServerError);
        assert!(c.retriable);

        let c = classify(&ApiFailure::new("connection reset by peer"));
        assert_eq!(c.kind, FailureKind::Unclassified);
        assert!(c.retriable);

        let c = classify(&ApiFailure::new("nope").with_status(401));
        assert_eq!(c.kind, FailureKind::InvalidCredential);
        assert!(!c.retriable);

        let c = classify(&ApiFailure::new("API key not valid. Please pass a valid API key."));
        assert_eq!(c.kind, FailureKind::InvalidCredential);

        let c = classify(&ApiFailure::new("This model's maximum context length is 8192 tokens"));
        assert_eq!(c.kind, FailureKind::ContextLimit);
        assert!(!c.retriable);

        let c = classify(&ApiFailure::new("Too Many Requests, please slow down"));
        assert_eq!(c.status, Some(429));
        assert_eq!(c.kind, FailureKind::RateLimited);
    }

    #[test]
    fn test_retry_after_sources() {
        let c = classify(&ApiFailure::new("limited").with_status(429).with_retry_after("7"));
        assert_eq!(c.retry_after, Some(Duration::from_secs(7)));

        let c = classify(
            &ApiFailure::new("limited")
                .with_response(429, vec![("Retry-After".to_string(), "3".to_string())]),
        );
        assert_eq!(c.retry_after, Some(Duration::from_secs(3)));

        let c = classify(&ApiFailure::new("[429 Too Many Requests] Please retry in 12.5s."));
        assert_eq!(c.retry_after, Some(Duration::from_millis(12_500)));

        let c = classify(&ApiFailure::new("server error, retry after 4s").with_status(503));
        assert_eq!(c.retry_after, None);
    }

    #[test]
    fn test_parse_retry_after_http_date_in_past() {
        let wait = parse_retry_after("Wed, 21 Oct 2015 07:28:00 GMT").unwrap();
        assert_eq!(wait, Duration::ZERO);
        assert_eq!(parse_retry_after("soon"), None);
        assert_eq!(parse_retry_after("-3"), None);
    }

    #[test]
    fn test_delay_curves() {
        let policy = no_jitter();
        let server = classify(&ApiFailure::new("x").with_status(500));
        assert_eq!(policy.delay_for(0, &server), Duration::from_millis(100));
        assert_eq!(policy.delay_for(2, &server), Duration::from_millis(400));

        let limited = classify(&ApiFailure::new("x").with_status(429));
        assert_eq!(policy.delay_for(2, &limited), Duration::from_millis(900));

        let hinted = classify(&ApiFailure::new("x").with_status(429).with_retry_after("2"));
        assert_eq!(policy.delay_for(4, &hinted), Duration::from_millis(3_000));
    }

    #[test]
    fn test_retry_hint_is_capped() {
        let policy = RetryPolicy::default();
        let day = classify(&ApiFailure::new("slow down").with_status(429).with_retry_after("86400"));
        assert_eq!(day.retry_after, Some(Duration::from_secs(86_400)));
        assert_eq!(policy.delay_for(0, &day), Duration::from_millis(policy.max_delay_ms));
    }

    #[test]
    fn test_out_of_range_retry_hints_are_ignored() {
        assert_eq!(parse_retry_after("1e300"), None);
        assert_eq!(parse_retry_after("NaN"), None);
        assert_eq!(parse_retry_after("inf"), None);

        let huge = classify(&ApiFailure::new("limited").with_status(429).with_retry_after("1e300"));
        assert_eq!(huge.kind, FailureKind::RateLimited);
        assert_eq!(huge.retry_after, None);

        let worded = classify(
            &ApiFailure::new("429: retry after 99999999999999999999999 seconds").with_status(429),
        );
        assert_eq!(worded.retry_after, None);

        let max_hint = ApiFailure::new("x").with_status(429).with_retry_after("1e18");
        let policy = no_jitter();
        assert_eq!(
            policy.delay_for(0, &classify(&max_hint)),
            Duration::from_millis(policy.max_delay_ms)
        );
    }

    #[test]
    fn test_delay_is_capped_and_jitter_bounded() {
        let policy = RetryPolicy {
            max_delay_ms: 1_000,
            max_jitter_ms: 50,
            ..RetryPolicy::new(5, Duration::from_millis(400))
        };
        let server = classify(&ApiFailure::new("x").with_status(503));
        for _ in 0..20 {
            let d = policy.delay_for(6, &server);
            assert!(d >= Duration::from_millis(1_000));
            assert!(d <= Duration::from_millis(1_050));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limited_then_success_invocation_count() {
        let calls = AtomicU32::new(0);
        let controller = BackoffRetryController::new(no_jitter());
        let result: Result<&str, ApiFailure> = controller
            .run("generate", || {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n < 3 {
                        Err(ApiFailure::new("quota").with_status(429))
                    } else {
                        Ok("done")
                    }
                }
            })
            .await;
        assert_eq!(result.unwrap(), "done");
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_not_found_fails_once_with_original_error() {
        let calls = AtomicU32::new(0);
        let original = ApiFailure::new("no such model").with_status(404);
        let controller = BackoffRetryController::new(no_jitter());
        let result: Result<(), ApiFailure> = controller
            .run("generate", || {
                calls.fetch_add(1, Ordering::SeqCst);
                let e = original.clone();
                async move { Err(e) }
            })
            .await;
        assert_eq!(result.unwrap_err(), original);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_attempt_bound_is_respected() {
        let calls = AtomicU32::new(0);
        let result: Result<(), ApiFailure> = run_with_backoff(
            || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(ApiFailure::new("upstream exploded").with_status(500)) }
            },
            3,
            Duration::from_millis(10),
        )
        .await;
        assert_eq!(result.unwrap_err().status, Some(500));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_backoff_sleeps_between_attempts() {
        let start = tokio::time::Instant::now();
        let calls = AtomicU32::new(0);
        let controller = BackoffRetryController::new(no_jitter());
        let _: Result<(), ApiFailure> = controller
            .run("x", || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(ApiFailure::new("oops").with_status(503)) }
            })
            .await;
        // 100 + 200 + 400 + 800 between five attempts
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(1_500), "{elapsed:?}");
        assert!(elapsed < Duration::from_millis(1_520), "{elapsed:?}");
        assert_eq!(calls.load(Ordering::SeqCst), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_observer_sees_scheduled_retries() {
        let seen = Arc::new(std::sync::Mutex::new(Vec::new()));
        let sink = seen.clone();
        let controller = BackoffRetryController::new(no_jitter()).with_observer(Arc::new(
            move |e: &ProgressEvent| sink.lock().unwrap().push(e.clone()),
        ));
        let calls = AtomicU32::new(0);
        let _: Result<(), ApiFailure> = controller
            .run("x", || {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n == 0 {
                        Err(ApiFailure::new("busy").with_status(503))
                    } else {
                        Ok(())
                    }
                }
            })
            .await;
        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert!(matches!(
            seen[0],
            ProgressEvent::RetryScheduled { attempt: 1, status: Some(503), delay_ms: 100, .. }
        ));
    }

    #[test]
    fn test_anyhow_downcast_probes() {
        let err: anyhow::Error = ApiFailure::new("limited").with_status(429).into();
        let c = classify(&err);
        assert_eq!(c.status, Some(429));
        let err = anyhow::anyhow!("wrapped: [503 Service Unavailable]");
        assert_eq!(classify(&err).status, Some(503));
    }
}
