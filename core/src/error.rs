//! Error types for shelltrace

use std::path::PathBuf;

use thiserror::Error;

/// Core error type for shelltrace operations.
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("recorder already running (pid {pid})")]
    AlreadyRunning { pid: u32 },

    #[error("recorder is not running")]
    NotRunning,

    #[error("log file not found at {}", path.display())]
    LogMissing { path: PathBuf },

    #[error("invalid search pattern: {0}")]
    InvalidPattern(#[from] regex::Error),

    #[error("failed to detach: {0}")]
    Detach(String),

    #[error("invalid config: {0}")]
    Config(String),
}

/// Result alias for core operations.
pub type Result<T> = std::result::Result<T, Error>;
