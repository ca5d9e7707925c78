// src/errors.rs

//! Crate-wide error type and result alias.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum FlowkeeperError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Missing required environment variables: {}", .0.join(", "))]
    MissingSettings(Vec<String>),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    /// A search against the engine failed (definitions, instances, tasks).
    #[error("Failed to fetch {what}: {source}")]
    Lookup {
        what: &'static str,
        #[source]
        source: Box<FlowkeeperError>,
    },

    #[error("Failed to create process instance of '{process_id}': {source}")]
    Creation {
        process_id: String,
        #[source]
        source: Box<FlowkeeperError>,
    },

    #[error("Creating process instance of '{process_id}' timed out after {timeout_ms}ms")]
    CreateTimeout { process_id: String, timeout_ms: u64 },

    /// The engine answered with a non-success status.
    #[error("Engine returned {status}: {body}")]
    Engine { status: u16, body: String },

    /// A claim was rejected because the task belongs to someone else.
    #[error("Task {task_id} could not be claimed: {reason}")]
    ClaimConflict { task_id: String, reason: String },

    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Decode error: {0}")]
    DecodeError(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl FlowkeeperError {
    /// Wrap an engine error as a failed lookup of `what`.
    pub fn lookup(what: &'static str, source: FlowkeeperError) -> Self {
        FlowkeeperError::Lookup {
            what,
            source: Box::new(source),
        }
    }

    pub fn creation(process_id: impl Into<String>, source: FlowkeeperError) -> Self {
        FlowkeeperError::Creation {
            process_id: process_id.into(),
            source: Box::new(source),
        }
    }
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, FlowkeeperError>;
