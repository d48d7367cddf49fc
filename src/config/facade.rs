//! ConfigLoader facade delegating to merge service.

use super::merge::service::MergeService;
use super::ShareTreeConfig;
use crate::error::ApiError;
use std::path::Path;

/// Configuration loader facade.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load from the global file and environment.
    pub fn load() -> Result<ShareTreeConfig, ApiError> {
        Self::finish(MergeService::load(None)?)
    }

    /// Load with `path` layered over the global file, environment still on top.
    pub fn load_with_file(path: &Path) -> Result<ShareTreeConfig, ApiError> {
        Self::finish(MergeService::load(Some(path))?)
    }

    /// Load only `path` over the defaults.
    pub fn load_from_file(path: &Path) -> Result<ShareTreeConfig, ApiError> {
        Self::finish(MergeService::load_file_only(path)?)
    }

    /// Create default configuration.
    pub fn default() -> ShareTreeConfig {
        ShareTreeConfig::default()
    }

    fn finish(config: ShareTreeConfig) -> Result<ShareTreeConfig, ApiError> {
        config.validate()?;
        Ok(config)
    }
}
