//! Merge policy: the default layer every load starts from.

use crate::config::ShareTreeConfig;
use config::builder::DefaultState;
use config::{Config, ConfigBuilder, ConfigError};

/// A builder seeded with [`ShareTreeConfig::default`].
pub fn builder_with_defaults() -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    let defaults = Config::try_from(&ShareTreeConfig::default())?;
    Ok(Config::builder().add_source(defaults))
}
