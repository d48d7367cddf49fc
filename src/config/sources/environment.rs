//! Environment variable source: SHARETREE__ prefix with __ separator

use config::builder::DefaultState;
use config::ConfigBuilder;
use config::ConfigError;
use config::Environment;

pub const ENV_PREFIX: &str = "SHARETREE";

/// Add the environment overlay to `builder`.
///
/// Nested keys use `__`, e.g. `SHARETREE__HASHING__WORKERS=4`. `roots` takes
/// a comma-separated list.
pub fn add_to_builder(
    builder: ConfigBuilder<DefaultState>,
) -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    let builder = builder.add_source(
        Environment::with_prefix(ENV_PREFIX)
            .separator("__")
            .try_parsing(true)
            .list_separator(",")
            .with_list_parse_key("roots"),
    );
    Ok(builder)
}
