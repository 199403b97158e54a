//! Integration tests for driveseal-config
//!
//! These tests verify config loading with real files on disk.

use driveseal_bloom::BitLayout;
use driveseal_config::{Config, LogLevel};
use tempfile::tempdir;

#[test]
fn test_load_config_from_file() {
    let temp = tempdir().unwrap();
    let path = temp.path().join("config.toml");
    let config_content = r#"
[filter]
capacity_hint = 250000
target_rate = 0.0001
layout = "byte-per-bit"

[walk]
sorted = true

[log]
level = "debug"
"#;
    std::fs::write(&path, config_content).unwrap();

    let contents = std::fs::read_to_string(&path).unwrap();
    let config: Config = toml::from_str(&contents).unwrap();

    assert_eq!(config.filter.capacity_hint, 250_000);
    assert_eq!(config.filter.target_rate, 0.0001);
    assert_eq!(config.filter.layout, BitLayout::BytePerBit);
    assert!(config.walk.sorted);
    assert_eq!(config.log.level, LogLevel::Debug);
}

#[test]
fn test_partial_config_keeps_defaults() {
    let config: Config = toml::from_str("[walk]\nsorted = true\n").unwrap();
    assert!(config.walk.sorted);
    assert_eq!(config.filter, Config::default().filter);
    assert_eq!(config.log.level, LogLevel::Warn);
}

#[test]
fn test_load_from_rejects_invalid_rate() {
    let temp = tempdir().unwrap();
    let path = temp.path().join("config.toml");
    std::fs::write(&path, "[filter]\ntarget_rate = 1.5\n").unwrap();
    assert!(Config::load_from(&path).is_err());
}

#[test]
fn test_load_from_missing_file() {
    let temp = tempdir().unwrap();
    assert!(Config::load_from(&temp.path().join("absent.toml")).is_err());
}

#[test]
fn test_invalid_toml_is_reported() {
    let temp = tempdir().unwrap();
    let path = temp.path().join("config.toml");
    std::fs::write(&path, "[filter\ncapacity_hint = ").unwrap();
    let err = Config::load_from(&path).unwrap_err();
    assert!(err.to_string().contains("TOML"));
}
