//! Configuration management for Tally.
//!
//! This module provides configuration loading, validation and defaults.
//! Configuration is stored in TOML format in a platform-appropriate location.

use crate::error::{Result, TallyError};
use crate::parser::{ParseOptions, DEFAULT_MAX_DEPTH};
use crate::persistence::IndexFile;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// File name of the index inside the data directory
pub const INDEX_FILE_NAME: &str = "tally.idx";

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Main configuration structure for Tally.
///
/// ## Example Configuration File (tally.toml)
///
/// ```toml
/// [general]
/// index_path = "/srv/tally/news.idx"
/// log_level = "info"
///
/// [query]
/// fold_case = true
/// max_depth = 256
///
/// [storage]
/// compress = false
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General settings
    pub general: GeneralConfig,

    /// Query parsing
    pub query: QueryConfig,

    /// Index storage
    pub storage: StorageConfig,
}

/// General configuration options
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Index file location (None = default location)
    pub index_path: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        GeneralConfig {
            index_path: None,
            log_level: "info".to_string(),
        }
    }
}

/// Query parsing configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryConfig {
    /// Lowercase every query term before lookup
    pub fold_case: bool,

    /// Deepest nesting accepted by the parser
    pub max_depth: usize,
}

impl Default for QueryConfig {
    fn default() -> Self {
        QueryConfig {
            fold_case: false,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

/// Index storage configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Use LZ4 compression for the index file
    pub compress: bool,
}

impl Config {
    /// Load configuration from the default location.
    ///
    /// Returns default config if no config file exists.
    pub fn load() -> Result<Self> {
        let config_path = Self::default_config_path()?;
        Self::load_from(&config_path)
    }

    /// Load configuration from a specific path.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!(path = %path.display(), "Config file not found, using defaults");
            return Ok(Config::default());
        }

        info!(path = %path.display(), "Loading configuration");
        let contents = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents).map_err(|e| TallyError::Config {
            reason: format!("failed to parse {}: {}", path.display(), e),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Reject values that parse as TOML but cannot be used.
    pub fn validate(&self) -> Result<()> {
        let level = self.general.log_level.to_ascii_lowercase();
        if !LOG_LEVELS.contains(&level.as_str()) {
            return Err(TallyError::Config {
                reason: format!(
                    "unknown log level {:?}, expected one of {}",
                    self.general.log_level,
                    LOG_LEVELS.join(", ")
                ),
            });
        }
        if self.query.max_depth == 0 {
            return Err(TallyError::Config {
                reason: "query.max_depth must be at least 1".to_string(),
            });
        }
        Ok(())
    }

    fn project_dirs() -> Option<ProjectDirs> {
        ProjectDirs::from("", "", "tally")
    }

    /// Get the default configuration file path.
    pub fn default_config_path() -> Result<PathBuf> {
        let dirs = Self::project_dirs().ok_or_else(|| TallyError::Config {
            reason: "could not determine config directory".to_string(),
        })?;

        Ok(dirs.config_dir().join("tally.toml"))
    }

    /// Get the default data directory path.
    pub fn default_data_dir() -> Result<PathBuf> {
        let dirs = Self::project_dirs().ok_or_else(|| TallyError::Config {
            reason: "could not determine data directory".to_string(),
        })?;

        Ok(dirs.data_dir().to_path_buf())
    }

    /// Get the index file path (from config or default).
    pub fn index_path(&self) -> Result<PathBuf> {
        if let Some(ref path) = self.general.index_path {
            Ok(path.clone())
        } else {
            Ok(Self::default_data_dir()?.join(INDEX_FILE_NAME))
        }
    }

    /// Index file handle carrying the configured storage options.
    pub fn index_file(&self) -> Result<IndexFile> {
        Ok(IndexFile::new(self.index_path()?).with_compression(self.storage.compress))
    }

    /// Parser options from the `[query]` section.
    pub fn parse_options(&self) -> ParseOptions {
        ParseOptions::default()
            .with_fold_case(self.query.fold_case)
            .with_max_depth(self.query.max_depth)
    }
}
