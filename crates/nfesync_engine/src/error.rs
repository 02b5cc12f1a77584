//! Error types for the sync engine.

use crate::report::SyncReport;
use nfesync_protocol::ProtocolError;
use nfesync_storage::StorageError;
use thiserror::Error;

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors that can occur during sync operations.
///
/// Rejections by the Authority and an active cooldown are not errors; they
/// are reported through [`crate::SyncOutcome`].
#[derive(Error, Debug)]
pub enum SyncError {
    /// Network or client failure.
    #[error("transport error: {message}")]
    Transport {
        /// Error message.
        message: String,
        /// Whether the failure looks transient.
        retryable: bool,
    },

    /// The response could not be understood.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// State or document storage failed.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// A run failed after consuming some pages.
    ///
    /// Documents in `partial` are already stored and the state reflects them.
    #[error("sync interrupted after {} page(s): {source}", .partial.pages)]
    Interrupted {
        /// Everything gathered before the failure.
        partial: Box<SyncReport>,
        /// The failure that ended the run.
        source: Box<SyncError>,
    },
}

impl SyncError {
    /// Creates a retryable transport error.
    pub fn transport_retryable(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            retryable: true,
        }
    }

    /// Creates a non-retryable transport error.
    pub fn transport_fatal(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            retryable: false,
        }
    }

    /// Returns true if this error looks transient.
    ///
    /// Informational only: the retrier retries every error.
    pub fn is_retryable(&self) -> bool {
        match self {
            SyncError::Transport { retryable, .. } => *retryable,
            SyncError::Interrupted { source, .. } => source.is_retryable(),
            _ => false,
        }
    }

    /// Partial results of an interrupted run.
    pub fn partial_report(&self) -> Option<&SyncReport> {
        match self {
            SyncError::Interrupted { partial, .. } => Some(partial),
            _ => None,
        }
    }

    /// The innermost error, unwrapping [`SyncError::Interrupted`].
    pub fn root_cause(&self) -> &SyncError {
        match self {
            SyncError::Interrupted { source, .. } => source.root_cause(),
            other => other,
        }
    }
}
