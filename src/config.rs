//! Configuration
//!
//! Layered configuration built with the `config` crate. Precedence, lowest to
//! highest: built-in defaults, `$XDG_CONFIG_HOME/sharetree/config.toml`, an
//! explicit file, then `SHARETREE__*` environment variables.

pub mod facade;
pub mod merge {
    pub mod policy;
    pub mod service;
}
pub mod paths {
    pub mod xdg_root;
}
pub mod sources {
    pub mod environment;
    pub mod global_file;
}

pub use facade::ConfigLoader;
pub use paths::xdg_root as xdg;

use crate::error::ApiError;
use crate::logging::LoggingConfig;
use crate::tree::hasher::DEFAULT_BUFFER_SIZE;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Top-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShareTreeConfig {
    /// Filesystem roots mirrored under the tree's virtual root
    #[serde(default = "default_roots")]
    pub roots: Vec<PathBuf>,

    /// Where collection manifests are written; None means the XDG data default
    #[serde(default)]
    pub collection_dir: Option<PathBuf>,

    #[serde(default)]
    pub hashing: HashingConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

fn default_roots() -> Vec<PathBuf> {
    vec![PathBuf::from(std::path::MAIN_SEPARATOR_STR)]
}

impl Default for ShareTreeConfig {
    fn default() -> Self {
        Self {
            roots: default_roots(),
            collection_dir: None,
            hashing: HashingConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl ShareTreeConfig {
    /// Collection directory, falling back to `$XDG_DATA_HOME/sharetree/collections`.
    pub fn resolve_collection_dir(&self) -> Result<PathBuf, ApiError> {
        match &self.collection_dir {
            Some(dir) if !dir.as_os_str().is_empty() => Ok(dir.clone()),
            _ => Ok(xdg::sharetree_data_dir()?.join("collections")),
        }
    }

    pub fn validate(&self) -> Result<(), ApiError> {
        if self.roots.is_empty() {
            return Err(ApiError::ConfigError("at least one root is required".to_string()));
        }
        if let Some(root) = self.roots.iter().find(|r| !r.is_absolute()) {
            return Err(ApiError::ConfigError(format!(
                "root must be an absolute path: {}",
                root.display()
            )));
        }
        self.hashing.validate()
    }
}

/// Sizing of the local session's hashing pool
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HashingConfig {
    /// Number of hashing threads
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Read buffer size in bytes
    #[serde(default = "default_buffer_size")]
    pub buffer_size: usize,
}

fn default_workers() -> usize {
    2
}

fn default_buffer_size() -> usize {
    DEFAULT_BUFFER_SIZE
}

impl Default for HashingConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            buffer_size: default_buffer_size(),
        }
    }
}

impl HashingConfig {
    pub fn validate(&self) -> Result<(), ApiError> {
        if self.workers == 0 {
            return Err(ApiError::ConfigError("hashing.workers must be at least 1".to_string()));
        }
        if self.buffer_size == 0 {
            return Err(ApiError::ConfigError(
                "hashing.buffer_size must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}
