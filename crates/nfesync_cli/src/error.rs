//! Errors surfaced by the command layer.

use nfesync_engine::SyncError;
use nfesync_protocol::ProtocolError;
use nfesync_storage::StorageError;
use std::path::PathBuf;
use std::process::ExitCode;
use thiserror::Error;

/// Result type for commands.
pub type CliResult<T> = Result<T, CliError>;

/// Everything a command can fail with.
#[derive(Debug, Error)]
pub enum CliError {
    /// The configuration file is missing, unreadable or invalid.
    #[error("configuration error: {0}")]
    Config(String),

    /// The named taxpayer is not configured.
    #[error("taxpayer '{name}' not found; available: {available}")]
    UnknownTaxpayer {
        /// Requested name.
        name: String,
        /// Comma-separated configured names.
        available: String,
    },

    /// A command-line argument is invalid.
    #[error("invalid argument: {0}")]
    Argument(#[from] ProtocolError),

    /// I/O outside the stores (audit log, legacy directories).
    #[error("I/O error on {path}: {source}")]
    Io {
        /// The file or directory involved.
        path: PathBuf,
        /// The underlying error.
        source: std::io::Error,
    },

    /// Writing to the terminal failed.
    #[error("failed to write output: {0}")]
    Output(#[from] std::io::Error),

    /// Storage failed.
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// The engine failed.
    #[error(transparent)]
    Sync(#[from] SyncError),
}

impl CliError {
    /// Creates a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Wraps an I/O error with its path.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Process exit code: 3 for configuration and argument errors, 1 otherwise.
    pub fn exit_code(&self) -> ExitCode {
        match self {
            CliError::Config(_) | CliError::UnknownTaxpayer { .. } | CliError::Argument(_) => {
                ExitCode::from(3)
            }
            _ => ExitCode::from(1),
        }
    }
}
