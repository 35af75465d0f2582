//! Site labels loaded from a line-oriented `key=value` properties file.
//!
//! The file is the contract with the deployment tooling: it carries the
//! location label and the two system labels that end up in the exposition
//! output. A missing file is created with defaults and the process keeps
//! going; a file that exists but lacks a required key is a startup failure.

use std::{fs, path::Path};

use crate::{config::ConfigError, print_warn};

const KEY_POINT: &str = "point";
const KEY_SYSTEM0: &str = "system0";
const KEY_SYSTEM1: &str = "system1";

const DEFAULT_PROPERTIES: &str = "point=point\nsystem0=0\nsystem1=1\n";

/// The three deployment labels, immutable for the process lifetime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiteConfig {
    /// Deployment location label.
    pub point: String,
    /// Label of the system measured on channel 0.
    pub system0: String,
    /// Label of the system measured on channel 1.
    pub system1: String,
}

impl SiteConfig {
    /// Loads the site labels from `path`, creating the file with default
    /// labels first if it does not exist.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` naming the file and the offending key when a
    /// required key is absent or empty, and an IO error when the file cannot
    /// be created or read.
    pub fn load_or_create(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            print_warn!(
                "Properties file {} not found, creating it with defaults",
                path.display()
            );
            fs::write(path, DEFAULT_PROPERTIES).map_err(|source| ConfigError::Io {
                path: path.display().to_string(),
                source,
            })?;
        }

        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;

        Self::parse(&text, path)
    }

    /// Parses the properties text. Lines are `key=value`; blank lines and
    /// `#` comments are skipped; later occurrences of a key win.
    fn parse(text: &str, path: &Path) -> Result<Self, ConfigError> {
        let mut point = None;
        let mut system0 = None;
        let mut system1 = None;

        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let Some((key, value)) = line.split_once('=') else {
                continue;
            };
            let value = value.trim().to_string();
            match key.trim() {
                KEY_POINT => point = Some(value),
                KEY_SYSTEM0 => system0 = Some(value),
                KEY_SYSTEM1 => system1 = Some(value),
                _ => {}
            }
        }

        let require = |key: &str, value: Option<String>| -> Result<String, ConfigError> {
            match value {
                Some(v) if !v.is_empty() => Ok(v),
                _ => Err(ConfigError::MissingKey {
                    path: path.display().to_string(),
                    key: key.to_string(),
                }),
            }
        };

        Ok(SiteConfig {
            point: require(KEY_POINT, point)?,
            system0: require(KEY_SYSTEM0, system0)?,
            system1: require(KEY_SYSTEM1, system1)?,
        })
    }
}
