// src/config/mod.rs

//! Configuration loading and validation for flowkeeper.
//!
//! Responsibilities:
//! - Define the TOML-backed data model (`model.rs`).
//! - Load a config file from disk (`loader.rs`).
//! - Validate it into typed settings (`validate.rs`).
//! - Resolve connection settings against the environment and hand each
//!   component its settings (`settings.rs`).

pub mod loader;
pub mod model;
pub mod settings;
pub mod validate;

pub use loader::{load_and_validate, load_from_path, load_or_default};
pub use model::{
    ConfigFile, EngineConfig, HumanTaskConfig, ProcessConfig, RawConfigFile, WorkerConfig,
};
pub use settings::{REQUIRED_SETTINGS, resolve_endpoints};
pub use validate::{millis, parse_duration};
