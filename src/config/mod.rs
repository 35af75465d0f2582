//! Application configuration loading, validation, and management.
//!
//! This module provides the top-level `Settings` structure that aggregates
//! logging, sampling, and server configurations, loaded from an optional
//! TOML file with environment override. It also hosts the `SiteConfig`
//! collaborator that reads the three deployment labels from a properties
//! file.
//!
//! All configuration is loaded early in the application lifecycle and is
//! immutable thereafter.

use std::{
    fs,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};
use validator::Validate;

use self::{
    logger::LoggerConfig,
    sampling::{SamplingConfig, ServerConfig},
};

pub mod logger;
pub mod sampling;
pub mod site;

/// Simple macros for printing timestamped messages before the tracing
/// subscriber is initialized. These are used during early configuration
/// loading.
#[macro_export]
macro_rules! print_info {
    ($($arg:tt)*) => {
        println!("{}  {} {}",
            console::style(
                time::OffsetDateTime::now_utc()
                    .format(&time::format_description::parse(
                        "[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond digits:6]Z"
                    ).unwrap())
                    .unwrap()
            ).dim(),
            console::style("INFO").green(),
            format_args!($($arg)*)
        );
    };
}

#[macro_export]
macro_rules! print_warn {
    ($($arg:tt)*) => {
        println!("{}  {} {}",
            console::style(
                time::OffsetDateTime::now_utc()
                    .format(&time::format_description::parse(
                        "[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond digits:6]Z"
                    ).unwrap())
                    .unwrap()
            ).dim(),
            console::style("WARN").yellow(),
            format_args!($($arg)*)
        );
    };
}

#[macro_export]
macro_rules! print_error {
    ($($arg:tt)*) => {
        println!("{}  {} {}",
            console::style(
                time::OffsetDateTime::now_utc()
                    .format(&time::format_description::parse(
                        "[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond digits:6]Z"
                    ).unwrap())
                    .unwrap()
            ).dim(),
            console::style("ERROR").red(),
            format_args!($($arg)*)
        );
    };
}

/// Errors that can occur during configuration loading, parsing, or
/// validation. All of them are fatal at startup.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// IO error while accessing a configuration file.
    #[error("IO error while reading {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Failure to parse the TOML settings file.
    #[error("Parse error in {path}: {reason}")]
    Parse { path: String, reason: String },

    /// A required key is absent (or empty) in the site properties file.
    #[error("Missing required property '{key}' in {path}")]
    MissingKey { path: String, key: String },

    /// Validation failure after successful parsing.
    #[error("Validation error: {0}")]
    Validation(String),
}

/// Top-level application settings.
///
/// Every field has a sensible default, so the settings file is optional;
/// when present it only needs to name the sections it overrides.
#[derive(Serialize, Deserialize, Debug, Validate, Clone, Default)]
#[serde(default)]
pub struct Settings {
    /// Logging subsystem configuration.
    #[validate(nested)]
    pub logger: LoggerConfig,

    /// Measurement loop configuration.
    #[validate(nested)]
    pub sampling: SamplingConfig,

    /// Exposition server configuration.
    #[validate(nested)]
    pub server: ServerConfig,
}

impl Settings {
    /// Constructs settings by locating and loading the settings file, or
    /// falling back to defaults when no file exists.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if a settings file exists but cannot be
    /// read, parsed, or validated.
    pub fn load() -> Result<Self, ConfigError> {
        match Self::find_config_path() {
            Some(path) => Self::from_file(&path),
            None => {
                print_info!("No settings file found, using built-in defaults");
                Ok(Settings::default())
            }
        }
    }

    /// Determines the settings file path.
    ///
    /// Priority:
    /// 1. `AMPWATCH_CONFIG` environment variable
    /// 2. `/etc/ampwatch/config.toml`, if present
    fn find_config_path() -> Option<PathBuf> {
        if let Ok(config_path) = std::env::var("AMPWATCH_CONFIG") {
            let path = PathBuf::from(config_path);
            print_info!("Using settings from AMPWATCH_CONFIG: {}", path.display());
            return Some(path);
        }

        let fallback = Path::new("/etc/ampwatch/config.toml");
        if fallback.exists() {
            print_info!("Using default settings path: {}", fallback.display());
            return Some(fallback.to_path_buf());
        }

        None
    }

    /// Loads and validates settings from the specified path.
    ///
    /// # Errors
    ///
    /// Propagates IO, parsing, and validation errors as `ConfigError`.
    pub fn from_file(path: &Path) -> Result<Settings, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;

        let settings: Settings = toml::from_str(&text).map_err(|e| ConfigError::Parse {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;

        settings
            .validate()
            .map_err(|e| ConfigError::Validation(e.to_string()))?;

        print_info!("Loaded settings from {}", path.display());
        Ok(settings)
    }
}
