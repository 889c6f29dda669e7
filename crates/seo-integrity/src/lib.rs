//! SEO Integrity: the resilience and text-integrity layer of an automated
//! content pipeline.
//!
//! Outbound calls go through [`BackoffRetryController`] and
//! [`MultiPathFetcher`]; batches run under [`BoundedConcurrencyScheduler`].
//! Model output passes through [`extract`] before it is trusted as JSON, and
//! finished documents go through [`LinkIntegrityEngine`] and
//! [`MediaIntegrityGuardian`] before publishing.

pub mod cache;
pub mod config;
pub mod envelope;
pub mod error;
pub mod extract;
pub mod fetch;
pub mod links;
pub mod media;
pub mod progress;
pub mod quality;
pub mod retry;
pub mod scheduler;
pub mod types;

pub use cache::TtlCache;
pub use config::IntegrityConfig;
pub use envelope::{handle, Operation, Outcome, Request, RequestId, Response};
pub use error::{ConfigError, IntegrityError, IntegrityResult};
pub use extract::{extract, extract_json, extract_payload, Completeness, ExtractError, ExtractedPayload};
pub use fetch::{FetchConfig, FetchError, FetchPath, FetchRequest, FetchResponse, MultiPathFetcher};
pub use links::{LinkConfig, LinkIntegrityEngine, LinkOutcome, LinkReport};
pub use media::{MediaConfig, MediaIntegrityGuardian, MediaLedger};
pub use progress::{NoopObserver, ProgressEvent, ProgressObserver};
pub use quality::{check_length, ContentTooShort, QualityConfig};
pub use retry::{
    classify, run_with_backoff, ApiFailure, BackoffRetryController, Classification, FailureKind,
    RemoteFailure, RetryPolicy,
};
pub use scheduler::{run_bounded, BoundedConcurrencyScheduler, SchedulerConfig, SchedulerReport};
pub use types::*;
