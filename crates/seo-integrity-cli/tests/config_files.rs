//! Config file loading through the CLI resolution rules.

use std::path::PathBuf;

use seo_integrity::ConfigError;
use seo_integrity_cli::config::{load_config, resolve_config_path_from};

#[test]
fn test_explicit_config_file_loaded() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("custom.toml");
    std::fs::write(
        &path,
        "[scheduler]\nconcurrency = 5\n\n[quality]\nmin_words = 120\n",
    )
    .unwrap();

    let (config, source) = load_config(Some(path.to_str().unwrap())).unwrap();
    assert_eq!(source, Some(path));
    assert_eq!(config.scheduler.concurrency, 5);
    assert_eq!(config.quality.min_words, 120);
    assert_eq!(config.retry.max_attempts, 5);
}

#[test]
fn test_explicit_missing_file_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("nope.toml");
    let err = load_config(Some(missing.to_str().unwrap())).unwrap_err();
    assert!(matches!(err, ConfigError::Read { .. }));
}

#[test]
fn test_invalid_config_file_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bad.toml");
    std::fs::write(&path, "[retry]\nmax_attempts = 0\n").unwrap();
    let err = load_config(Some(path.to_str().unwrap())).unwrap_err();
    assert!(matches!(err, ConfigError::Invalid(_)));
}

#[test]
fn test_cwd_file_found_without_flags() {
    let cwd = tempfile::tempdir().unwrap();
    std::fs::write(cwd.path().join(".seo-integrity.toml"), "").unwrap();
    assert_eq!(
        resolve_config_path_from(None, None, cwd.path(), None),
        Some(cwd.path().join(".seo-integrity.toml"))
    );
    assert_eq!(
        resolve_config_path_from(Some("flag.toml"), None, cwd.path(), None),
        Some(PathBuf::from("flag.toml"))
    );
}
