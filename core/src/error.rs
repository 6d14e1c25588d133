//! Error types and handling for narrow core

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for narrow core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for narrow core
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Worker process could not be started
    #[error("Spawn error: {0}")]
    Spawn(#[from] SpawnError),

    /// Worker output could not be decoded
    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),

    /// Forerunner enumeration errors
    #[error("Prefetch error: {0}")]
    Prefetch(#[from] PrefetchError),
}

/// Configuration-specific errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing required field: {field}")]
    MissingField { field: String },

    #[error("Invalid value for field '{field}': {value}")]
    InvalidValue { field: String, value: String },
}

/// Failures to launch the matching worker
#[derive(Error, Debug)]
pub enum SpawnError {
    #[error("worker executable not found: {program}")]
    NotFound { program: String },

    #[error("failed to spawn {program}: {source}")]
    Launch {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid worker invocation: {message}")]
    InvalidArgs { message: String },
}

/// Malformed worker output
#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("worker line is not valid UTF-8")]
    InvalidUtf8,

    #[error("worker line is not a known record: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("record has {lines} lines but {indices} index lists")]
    IndicesMismatch { lines: usize, indices: usize },
}

/// Forerunner enumeration failures
#[derive(Error, Debug)]
pub enum PrefetchError {
    #[error("enumeration command failed in {dir}: {message}")]
    CommandFailed { dir: PathBuf, message: String },

    #[error("working directory does not exist: {dir}")]
    MissingDir { dir: PathBuf },

    #[error("prefetch for {dir} was cancelled")]
    Cancelled { dir: PathBuf },

    #[error("{dir} is not inside a git repository")]
    NotGitRepo { dir: PathBuf },

    #[error("failed to store enumeration of {dir}: {source}")]
    Store {
        dir: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
