//! Structured logging utilities for driveseal components.
//!
//! Provides consistent logging with component prefixes and structured fields.
//!
//! # Usage
//!
//! ```ignore
//! use driveseal_config::log_walk_debug;
//!
//! log_walk_debug!("Fingerprinted entry", path = "docs/readme.txt");
//! ```

use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Component identifiers for log filtering
pub struct Component;

impl Component {
    pub const FILTER: &'static str = "FILTER";
    pub const WALK: &'static str = "WALK";
    pub const CALIB: &'static str = "CALIB";
    pub const SEAL: &'static str = "SEAL";
    pub const CLI: &'static str = "CLI";
}

/// Log levels for runtime configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    #[default]
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn as_filter(self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "error" => Ok(LogLevel::Error),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "info" => Ok(LogLevel::Info),
            "debug" => Ok(LogLevel::Debug),
            "trace" => Ok(LogLevel::Trace),
            other => Err(format!("unknown log level: {}", other)),
        }
    }
}

// === WALK logging macros ===

#[macro_export]
macro_rules! log_walk_debug {
    ($msg:literal $(, $key:ident = $value:expr)* $(,)?) => {
        tracing::debug!(component = "WALK", $($key = $value,)* $msg)
    };
}

#[macro_export]
macro_rules! log_walk_trace {
    ($msg:literal $(, $key:ident = $value:expr)* $(,)?) => {
        tracing::trace!(component = "WALK", $($key = $value,)* $msg)
    };
}

// === CALIB logging macros ===

#[macro_export]
macro_rules! log_calib_info {
    ($msg:literal $(, $key:ident = $value:expr)* $(,)?) => {
        tracing::info!(component = "CALIB", $($key = $value,)* $msg)
    };
}

#[macro_export]
macro_rules! log_calib_debug {
    ($msg:literal $(, $key:ident = $value:expr)* $(,)?) => {
        tracing::debug!(component = "CALIB", $($key = $value,)* $msg)
    };
}

// === SEAL logging macros ===

#[macro_export]
macro_rules! log_seal_info {
    ($msg:literal $(, $key:ident = $value:expr)* $(,)?) => {
        tracing::info!(component = "SEAL", $($key = $value,)* $msg)
    };
}

#[macro_export]
macro_rules! log_seal_warn {
    ($msg:literal $(, $key:ident = $value:expr)* $(,)?) => {
        tracing::warn!(component = "SEAL", $($key = $value,)* $msg)
    };
}

// === CLI logging macros ===

#[macro_export]
macro_rules! log_cli_info {
    ($msg:literal $(, $key:ident = $value:expr)* $(,)?) => {
        tracing::info!(component = "CLI", $($key = $value,)* $msg)
    };
}

#[macro_export]
macro_rules! log_cli_debug {
    ($msg:literal $(, $key:ident = $value:expr)* $(,)?) => {
        tracing::debug!(component = "CLI", $($key = $value,)* $msg)
    };
}

/// Initialize logging with the given level filter.
/// Call this once at application startup.
///
/// `DRIVESEAL_LOG` takes precedence, then `RUST_LOG`, then `level`.
pub fn init_logging(level: LogLevel) {
    use tracing_subscriber::EnvFilter;

    let env_filter = EnvFilter::try_from_env("DRIVESEAL_LOG")
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new(level.as_filter()));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_component_constants() {
        assert_eq!(Component::FILTER, "FILTER");
        assert_eq!(Component::WALK, "WALK");
        assert_eq!(Component::CALIB, "CALIB");
    }

    #[test]
    fn test_log_level_parse() {
        assert_eq!("DEBUG".parse::<LogLevel>().unwrap(), LogLevel::Debug);
        assert_eq!("warning".parse::<LogLevel>().unwrap(), LogLevel::Warn);
        assert!("loud".parse::<LogLevel>().is_err());
    }

    #[test]
    fn test_macros_expand() {
        crate::log_walk_debug!("walk", path = "a/b");
        crate::log_calib_info!("calib", skew = 0i64);
        crate::log_seal_warn!("seal");
    }
}
