//! Integration tests for configuration resolution and graceful degradation
//!
//! - Missing TOML files do not cause failures
//! - Priority order for config path resolution (CLI → ENV → defaults)
//! - Credential resolution (ENV → TOML)
//!
//! Note: Uses serial_test to prevent ENV variable race conditions.

use huerta_common::config::{
    load_toml_config, resolve_config_path, resolve_secret, LoggingConfig,
};
use serde::Deserialize;
use serial_test::serial;
use std::env;
use std::path::PathBuf;
use tempfile::TempDir;

#[derive(Debug, Default, Deserialize, PartialEq)]
#[serde(default)]
struct SampleConfig {
    logging: LoggingConfig,
    name: Option<String>,
}

#[test]
fn test_missing_file_uses_defaults() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("absent.toml");

    let config: SampleConfig = load_toml_config(Some(&path)).unwrap();
    assert_eq!(config, SampleConfig::default());
}

#[test]
fn test_no_path_uses_defaults() {
    let config: SampleConfig = load_toml_config(None).unwrap();
    assert_eq!(config.logging.level, "info");
}

#[test]
fn test_partial_file_keeps_defaults_for_missing_fields() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("config.toml");
    std::fs::write(&path, "name = \"nursery\"\n").unwrap();

    let config: SampleConfig = load_toml_config(Some(&path)).unwrap();
    assert_eq!(config.name.as_deref(), Some("nursery"));
    assert_eq!(config.logging, LoggingConfig::default());
}

#[test]
fn test_logging_section_parsed() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("config.toml");
    std::fs::write(&path, "[logging]\nlevel = \"debug\"\ncompact = true\n").unwrap();

    let config: SampleConfig = load_toml_config(Some(&path)).unwrap();
    assert_eq!(config.logging.level, "debug");
    assert!(config.logging.compact);
}

#[test]
fn test_malformed_file_is_config_error() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("broken.toml");
    std::fs::write(&path, "[logging\nlevel = ").unwrap();

    let result: huerta_common::Result<SampleConfig> = load_toml_config(Some(&path));
    assert!(matches!(result, Err(huerta_common::Error::Config(_))));
}

#[test]
#[serial]
fn test_env_var_path_used_without_cli_arg() {
    env::set_var("HUERTA_TEST_CONFIG", "/srv/huerta/config.toml");

    let resolved = resolve_config_path(None, "HUERTA_TEST_CONFIG");
    assert_eq!(resolved, Some(PathBuf::from("/srv/huerta/config.toml")));

    env::remove_var("HUERTA_TEST_CONFIG");
}

#[test]
#[serial]
fn test_cli_arg_beats_env_var() {
    env::set_var("HUERTA_TEST_CONFIG", "/srv/huerta/config.toml");

    let cli = PathBuf::from("/opt/custom.toml");
    let resolved = resolve_config_path(Some(&cli), "HUERTA_TEST_CONFIG");
    assert_eq!(resolved, Some(cli));

    env::remove_var("HUERTA_TEST_CONFIG");
}

#[test]
#[serial]
fn test_secret_env_beats_toml() {
    env::set_var("HUERTA_TEST_SECRET", "from-env");

    let secret = resolve_secret("Test key", "HUERTA_TEST_SECRET", Some("from-toml"));
    assert_eq!(secret.as_deref(), Some("from-env"));

    env::remove_var("HUERTA_TEST_SECRET");
}

#[test]
#[serial]
fn test_secret_falls_back_to_toml() {
    env::remove_var("HUERTA_TEST_SECRET");

    let secret = resolve_secret("Test key", "HUERTA_TEST_SECRET", Some("from-toml"));
    assert_eq!(secret.as_deref(), Some("from-toml"));
}

#[test]
#[serial]
fn test_blank_secrets_are_ignored() {
    env::set_var("HUERTA_TEST_SECRET", "   ");

    let secret = resolve_secret("Test key", "HUERTA_TEST_SECRET", Some(""));
    assert!(secret.is_none());

    env::remove_var("HUERTA_TEST_SECRET");
}
