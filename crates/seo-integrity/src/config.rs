//! Aggregated configuration for every integrity component.
//!
//! Every section defaults independently, so a TOML file only needs the keys
//! it wants to change:
//!
//! ```toml
//! [retry]
//! max_attempts = 3
//!
//! [links]
//! min_links = 5
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::fetch::FetchConfig;
use crate::links::LinkConfig;
use crate::media::MediaConfig;
use crate::quality::QualityConfig;
use crate::retry::RetryPolicy;
use crate::scheduler::SchedulerConfig;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IntegrityConfig {
    pub retry: RetryPolicy,
    pub fetch: FetchConfig,
    pub scheduler: SchedulerConfig,
    pub links: LinkConfig,
    pub media: MediaConfig,
    pub quality: QualityConfig,
}

impl IntegrityConfig {
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse a TOML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        tracing::debug!(path = %path.display(), "loaded config file");
        Self::from_toml_str(&raw)
    }

    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Reject values no component can work with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.retry.max_attempts == 0 {
            return Err(ConfigError::Invalid(
                "retry.max_attempts must be at least 1".to_string(),
            ));
        }
        if self.retry.backoff_factor < 1.0 || self.retry.rate_limit_backoff_factor < 1.0 {
            return Err(ConfigError::Invalid(
                "retry backoff factors must be at least 1.0".to_string(),
            ));
        }
        if self.fetch.timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "fetch.timeout_ms must be positive".to_string(),
            ));
        }
        if let Some(bad) = self
            .fetch
            .fallback_paths
            .iter()
            .find(|p| p.template.trim().is_empty())
        {
            return Err(ConfigError::Invalid(format!(
                "fetch fallback template is empty: {:?}",
                bad.template
            )));
        }
        if self.scheduler.concurrency == 0 {
            return Err(ConfigError::Invalid(
                "scheduler.concurrency must be at least 1".to_string(),
            ));
        }
        if !self.links.repair_threshold.is_finite() {
            return Err(ConfigError::Invalid(
                "links.repair_threshold must be a finite number".to_string(),
            ));
        }
        Ok(())
    }
}
