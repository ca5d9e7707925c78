// src/config/loader.rs

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::config::model::{ConfigFile, RawConfigFile};
use crate::errors::Result;

/// Load a configuration file from a given path and return the raw `RawConfigFile`.
///
/// This only performs TOML deserialization; it does **not** perform semantic
/// validation. Use [`load_and_validate`] for that.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<RawConfigFile> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path)?;

    let config: RawConfigFile = toml::from_str(&contents)?;

    Ok(config)
}

/// Load a configuration file from path and validate it.
pub fn load_and_validate(path: impl AsRef<Path>) -> Result<ConfigFile> {
    let raw_config = load_from_path(&path)?;
    let config = ConfigFile::try_from(raw_config)?;
    Ok(config)
}

/// Load the configuration the CLI asked for.
///
/// An explicitly given path must exist. When no path was given, the default
/// file is used if present, otherwise built-in defaults apply (connection
/// settings then have to come from the environment).
pub fn load_or_default(explicit: Option<&Path>) -> Result<ConfigFile> {
    if let Some(path) = explicit {
        return load_and_validate(path);
    }

    let path = default_config_path();
    if path.is_file() {
        return load_and_validate(&path);
    }

    debug!(path = %path.display(), "no config file found; using defaults");
    ConfigFile::try_from(RawConfigFile::default())
}

/// Default config location: `Flowkeeper.toml` in the working directory.
pub fn default_config_path() -> PathBuf {
    PathBuf::from("Flowkeeper.toml")
}
