//! Configuration file resolution.
//!
//! Lookup order: explicit `--config`, the `SEO_INTEGRITY_CONFIG` variable,
//! `./.seo-integrity.toml`, then `$HOME/.seo-integrity/config.toml`.
//! With none of them present the built-in defaults apply.

use std::path::{Path, PathBuf};

use seo_integrity::{ConfigError, IntegrityConfig};

/// Environment variable naming a config file.
pub const CONFIG_ENV: &str = "SEO_INTEGRITY_CONFIG";

const CWD_CONFIG: &str = ".seo-integrity.toml";

/// Resolve the config file path, if any applies.
pub fn resolve_config_path(explicit: Option<&str>) -> Option<PathBuf> {
    let env = std::env::var(CONFIG_ENV).ok();
    let home = std::env::var("HOME")
        .or_else(|_| std::env::var("USERPROFILE"))
        .ok()
        .map(PathBuf::from);
    resolve_config_path_from(explicit, env.as_deref(), Path::new("."), home.as_deref())
}

/// Same as [`resolve_config_path`] with every input given explicitly.
///
/// Explicit and environment paths are returned even when missing so the
/// load reports them; the two default locations only count when they exist.
pub fn resolve_config_path_from(
    explicit: Option<&str>,
    env: Option<&str>,
    cwd: &Path,
    home: Option<&Path>,
) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(PathBuf::from(path));
    }

    if let Some(path) = env.filter(|p| !p.trim().is_empty()) {
        return Some(PathBuf::from(path));
    }

    let cwd_config = cwd.join(CWD_CONFIG);
    if cwd_config.exists() {
        return Some(cwd_config);
    }

    let home_config = home?.join(".seo-integrity").join("config.toml");
    home_config.exists().then_some(home_config)
}

/// Load the effective configuration and report where it came from.
pub fn load_config(explicit: Option<&str>) -> Result<(IntegrityConfig, Option<PathBuf>), ConfigError> {
    match resolve_config_path(explicit) {
        Some(path) => {
            let config = IntegrityConfig::load(&path)?;
            tracing::info!(path = %path.display(), "using config file");
            Ok((config, Some(path)))
        }
        None => {
            tracing::debug!("no config file found, using defaults");
            Ok((IntegrityConfig::default(), None))
        }
    }
}
