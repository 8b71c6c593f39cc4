//! Runtime error types.

use std::path::PathBuf;

use thiserror::Error;

use quill_core::ClientError;

/// Errors raised while loading configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// A configuration file was named explicitly but does not exist.
    #[error("Configuration file not found: {0}")]
    FileNotFound(PathBuf),

    /// The merged configuration could not be parsed into the schema.
    #[error("Failed to parse configuration: {0}")]
    Parse(String),
}

/// Result type for configuration loading.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Errors that can occur while wiring or running a bot.
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// Configuration loading or validation failed.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// A platform call failed beyond recovery.
    #[error(transparent)]
    Client(#[from] ClientError),

    /// A command template could not be parsed.
    #[error(transparent)]
    Pattern(#[from] quill_activity::PatternError),
}

/// Result type for runtime operations.
pub type RuntimeResult<T> = Result<T, RuntimeError>;
