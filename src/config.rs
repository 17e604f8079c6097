//! Configuration - library selection and logging, from `pylink.toml`
//!
//! ```toml
//! [library]
//! path = "/opt/python/lib/libpython3.12.so.1.0"
//! defaults = ["libpython3.12.so.1.0", "libpython3.11.so.1.0"]
//!
//! [logging]
//! level = "debug"
//! json = false
//! ```
//!
//! The `PYLINK_PYTHON_LIBRARY` environment variable still outranks
//! `library.path`.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// File name searched for by [`Config::discover`]
pub const CONFIG_FILE: &str = "pylink.toml";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub library: LibraryConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LibraryConfig {
    /// Library to try before the defaults
    #[serde(default)]
    pub path: Option<String>,

    /// Replaces the built-in version-qualified default list
    #[serde(default)]
    pub defaults: Option<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_level")]
    pub level: String,

    #[serde(default)]
    pub json: bool,

    /// Write to this file instead of stderr
    #[serde(default)]
    pub file: Option<PathBuf>,

    #[serde(default)]
    pub spans: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            json: false,
            file: None,
            spans: false,
        }
    }
}

fn default_level() -> String {
    "info".to_string()
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("failed to parse config {path}: {source}")]
    Invalid {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("failed to write config {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl Config {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Nearest `pylink.toml` from the current directory upward, or defaults
    pub fn discover() -> Result<Self, ConfigError> {
        match std::env::current_dir() {
            Ok(dir) => Self::discover_from(&dir),
            Err(_) => Ok(Self::default()),
        }
    }

    /// Nearest `pylink.toml` from `start` upward, or defaults
    ///
    /// The walk stops at the first file found; if it does not load, that is
    /// the error.
    pub fn discover_from(start: &Path) -> Result<Self, ConfigError> {
        for dir in start.ancestors() {
            let candidate = dir.join(CONFIG_FILE);
            if candidate.is_file() {
                tracing::debug!(path = %candidate.display(), "using config");
                return Self::load(&candidate).map_err(|e| match e {
                    ConfigError::Parse(source) => ConfigError::Invalid {
                        path: candidate,
                        source,
                    },
                    other => other,
                });
            }
        }

        Ok(Self::default())
    }

    pub fn generate_default() -> String {
        toml::to_string_pretty(&Self::default())
            .unwrap_or_else(|_| String::from("# Failed to generate config"))
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self)?;
        fs::write(path, content).map_err(|source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        })
    }
}
