//! Typed error hierarchy for the operator CLI harness.
//!
//! The harness itself only wraps `swarm_runtime::error::LifecycleError` and
//! config/IO failures; per-subsystem errors (transport, channel, group,
//! spawn) live in `swarm_runtime::error` next to the code that raises them.

use thiserror::Error;

/// Errors raised while loading or validating the harness configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file at {path}: {source}")]
    ReadFailed {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file at {path}: {source}")]
    ParseFailed {
        path: std::path::PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Errors raised while loading an agent roster file for the CLI harness.
#[derive(Debug, Error)]
pub enum RosterError {
    #[error("failed to read roster file at {path}: {source}")]
    ReadFailed {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse roster file at {path}: {source}")]
    ParseFailed {
        path: std::path::PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("roster is empty")]
    Empty,

    #[error("duplicate agent name '{name}' in roster")]
    DuplicateName { name: String },
}

/// Top-level error returned by the harness binary's `run` entry point.
#[derive(Debug, Error)]
pub enum HarnessError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Roster(#[from] RosterError),

    #[error(transparent)]
    Lifecycle(#[from] swarm_runtime::error::LifecycleError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
