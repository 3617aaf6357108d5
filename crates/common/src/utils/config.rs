use anyhow::{Context, Result};
use ::config::{Config, Environment, File};
use serde::de::DeserializeOwned;
use std::path::Path;

/// Environment variable prefix shared with the node tooling
/// (`CARDANO_NODE_SOCKET_PATH`, `CARDANO_NODE_ADDRESS`, ...).
pub const ENV_PREFIX: &str = "CARDANO_NODE";

/// Loads configuration from a file into a struct.
/// Supports TOML, YAML, JSON, etc. based on file extension.
pub fn load_config<T: DeserializeOwned, P: AsRef<Path>>(path: P) -> Result<T> {
    let path_str = path.as_ref().to_str().context("Invalid config path")?;

    let settings = Config::builder()
        .add_source(File::with_name(path_str))
        .build()
        .context("Failed to build configuration")?;

    settings.try_deserialize::<T>().context("Failed to deserialize configuration")
}

/// Layers an optional file and `CARDANO_NODE_*` environment variables over
/// the struct's serde defaults. Later sources win.
pub fn load_layered<T: DeserializeOwned>(path: Option<&Path>, env_prefix: &str) -> Result<T> {
    let mut builder = Config::builder();

    if let Some(path) = path {
        let path_str = path.to_str().context("Invalid config path")?;
        builder = builder.add_source(File::with_name(path_str));
    }

    let settings = builder
        .add_source(Environment::with_prefix(env_prefix).try_parsing(true))
        .build()
        .context("Failed to build configuration")?;

    settings.try_deserialize::<T>().context("Failed to deserialize configuration")
}
