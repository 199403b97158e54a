//! # driveseal-config
//!
//! Configuration management for driveseal.
//!
//! Loads configuration from:
//! 1. `~/.driveseal/config.toml` (global), or an explicit file
//! 2. Environment variables (highest priority)
//!
//! The resulting [`Config`] is passed explicitly into each operation.

pub mod logging;

pub use logging::{init_logging, Component, LogLevel};

use std::path::{Path, PathBuf};

use driveseal_bloom::{BitLayout, DEFAULT_CAPACITY_HINT, DEFAULT_TARGET_RATE};
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("TOML render error: {0}")]
    TomlSer(#[from] toml::ser::Error),
    #[error("Invalid value for {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}

pub type Result<T> = std::result::Result<T, ConfigError>;

/// Main configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub filter: FilterConfig,
    pub walk: WalkConfig,
    pub log: LogConfig,
}

impl Config {
    /// Load config from the global location, then apply env overrides.
    pub fn load() -> Result<Self> {
        let mut config = match Self::global_config_path() {
            Some(path) if path.exists() => Self::from_file(&path)?,
            _ => Config::default(),
        };
        config.apply_env_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Load config from an explicit file, then apply env overrides.
    pub fn load_from(path: &Path) -> Result<Self> {
        let mut config = Self::from_file(path)?;
        config.apply_env_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    fn from_file(path: &Path) -> Result<Self> {
        debug!("Loading config from {:?}", path);
        let contents = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&contents)?)
    }

    /// Global config path: ~/.driveseal/config.toml
    pub fn global_config_path() -> Option<PathBuf> {
        dirs::home_dir().map(|h| h.join(".driveseal/config.toml"))
    }

    /// Apply `DRIVESEAL_*` overrides read through `lookup`.
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("DRIVESEAL_CAPACITY") {
            self.filter.capacity_hint = v.trim().parse().map_err(|e| ConfigError::Invalid {
                key: "DRIVESEAL_CAPACITY",
                reason: format!("{}", e),
            })?;
        }
        if let Some(v) = lookup("DRIVESEAL_RATE") {
            self.filter.target_rate = v.trim().parse().map_err(|e| ConfigError::Invalid {
                key: "DRIVESEAL_RATE",
                reason: format!("{}", e),
            })?;
        }
        if let Some(v) = lookup("DRIVESEAL_LAYOUT") {
            self.filter.layout = match v.trim() {
                "packed" => BitLayout::Packed,
                "byte-per-bit" => BitLayout::BytePerBit,
                other => {
                    return Err(ConfigError::Invalid {
                        key: "DRIVESEAL_LAYOUT",
                        reason: format!("expected packed or byte-per-bit, got {}", other),
                    })
                }
            };
        }
        if let Some(v) = lookup("DRIVESEAL_SORTED") {
            self.walk.sorted = matches!(
                v.trim().to_ascii_lowercase().as_str(),
                "1" | "true" | "yes" | "on"
            );
        }
        Ok(())
    }

    /// Reject values the filter cannot be built from.
    pub fn validate(&self) -> Result<()> {
        if self.filter.capacity_hint == 0 {
            return Err(ConfigError::Invalid {
                key: "filter.capacity_hint",
                reason: "must be greater than zero".into(),
            });
        }
        let rate = self.filter.target_rate;
        if !(rate > 0.0 && rate < 1.0) {
            return Err(ConfigError::Invalid {
                key: "filter.target_rate",
                reason: format!("{} is outside (0, 1)", rate),
            });
        }
        Ok(())
    }

    /// Render this config as TOML
    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Generate default config TOML string
    pub fn default_toml() -> Result<String> {
        Config::default().to_toml()
    }
}

/// Filter sizing, used when a volume is authorized
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    /// Distinct entries the filter is sized for
    pub capacity_hint: u32,
    /// Design false-positive rate
    pub target_rate: f64,
    /// Bit buffer layout
    pub layout: BitLayout,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            capacity_hint: DEFAULT_CAPACITY_HINT,
            target_rate: DEFAULT_TARGET_RATE,
            layout: BitLayout::Packed,
        }
    }
}

/// Directory walk options
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WalkConfig {
    /// Visit siblings in file-name order instead of directory order
    pub sorted: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    pub level: LogLevel,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.filter.capacity_hint, 1_000_000);
        assert_eq!(config.filter.target_rate, 0.00001);
        assert_eq!(config.filter.layout, BitLayout::Packed);
        assert!(!config.walk.sorted);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_default_toml_generation() {
        let toml_str = Config::default_toml().unwrap();
        assert!(toml_str.contains("[filter]"));
        assert!(toml_str.contains("[walk]"));
        assert!(toml_str.contains("layout = \"packed\""));
    }

    #[test]
    fn test_toml_roundtrip() {
        let config = Config::default();
        let toml_str = toml::to_string(&config).unwrap();
        let parsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(config, parsed);
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("DRIVESEAL_CAPACITY", "5000"),
            ("DRIVESEAL_RATE", "0.001"),
            ("DRIVESEAL_LAYOUT", "byte-per-bit"),
            ("DRIVESEAL_SORTED", "yes"),
        ]);
        let mut config = Config::default();
        config
            .apply_env_overrides(|k| env.get(k).map(|v| v.to_string()))
            .unwrap();
        assert_eq!(config.filter.capacity_hint, 5000);
        assert_eq!(config.filter.target_rate, 0.001);
        assert_eq!(config.filter.layout, BitLayout::BytePerBit);
        assert!(config.walk.sorted);
    }

    #[test]
    fn test_env_override_rejects_garbage() {
        let mut config = Config::default();
        let err = config
            .apply_env_overrides(|k| (k == "DRIVESEAL_CAPACITY").then(|| "lots".to_string()))
            .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid {
                key: "DRIVESEAL_CAPACITY",
                ..
            }
        ));
    }

    #[test]
    fn test_validate_rejects_zero_capacity() {
        let mut config = Config::default();
        config.filter.capacity_hint = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_bad_rate() {
        let mut config = Config::default();
        config.filter.target_rate = 1.0;
        assert!(config.validate().is_err());
        config.filter.target_rate = 0.0;
        assert!(config.validate().is_err());
    }
}
