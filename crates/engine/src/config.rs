//! Engine configuration loading

use anyhow::{Context, Result};
use engine_lib::EngineConfig;

/// Load configuration from an optional file plus the environment.
///
/// `ENGINE_CONFIG_PATH` names a config file in any format the `config`
/// crate understands; environment variables prefixed with `ENGINE` (using
/// `__` as the section separator) override it. With neither present, every
/// field falls back to its serde default.
pub fn load() -> Result<EngineConfig> {
    let mut builder = config::Config::builder();

    if let Ok(path) = std::env::var("ENGINE_CONFIG_PATH") {
        builder = builder.add_source(config::File::with_name(&path));
    }
    builder = builder.add_source(
        config::Environment::with_prefix("ENGINE")
            .separator("__")
            .try_parsing(true),
    );

    builder
        .build()
        .context("assembling configuration sources")?
        .try_deserialize()
        .context("deserializing engine configuration")
}
