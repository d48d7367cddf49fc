//! MergeService: orchestrates sources, applies merge policy, deserializes to ShareTreeConfig.

use crate::config::sources::{environment, global_file};
use crate::config::ShareTreeConfig;
use config::ConfigError;
use std::path::Path;

use super::policy;

/// Merge service for config composition.
pub struct MergeService;

impl MergeService {
    /// Load from the standard sources.
    /// Precedence: defaults (lowest) -> global file -> explicit file -> environment (highest).
    pub fn load(explicit: Option<&Path>) -> Result<ShareTreeConfig, ConfigError> {
        let builder = policy::builder_with_defaults()?;
        let builder = global_file::add_to_builder(builder)?;
        let builder = match explicit {
            Some(path) => global_file::add_file(builder, path, true),
            None => builder,
        };
        let builder = environment::add_to_builder(builder)?;

        builder.build()?.try_deserialize()
    }

    /// Load a single file over the defaults, without the global file or
    /// environment overlay.
    pub fn load_file_only(path: &Path) -> Result<ShareTreeConfig, ConfigError> {
        let builder = policy::builder_with_defaults()?;
        let builder = global_file::add_file(builder, path, true);

        builder.build()?.try_deserialize()
    }
}
