//! Results of engine runs.

use chrono::{Duration, NaiveDateTime};
use nfesync_protocol::{DecodedDocument, DocumentKind, FailedDocument, StatusCode};
use std::path::{Path, PathBuf};

/// Progress reported after each page with documents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncProgress {
    /// 1-based page number.
    pub page: u32,
    /// Documents gathered so far, failed ones included.
    pub documents: usize,
    /// High-water mark after this page.
    pub last_sequence: u64,
    /// Feed tip reported by this page.
    pub max_sequence: u64,
}

/// A feed document after the engine handled it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncedDocument {
    /// Decoded and written to the document store.
    Stored {
        /// The decoded document.
        document: DecodedDocument,
        /// Where it was written.
        path: PathBuf,
        /// True if a complete form overwrote a stored summary.
        replaced_summary: bool,
    },
    /// Could not be decoded; nothing was written.
    Failed(FailedDocument),
}

impl SyncedDocument {
    /// Sequence number as given by the feed.
    pub fn sequence(&self) -> &str {
        match self {
            SyncedDocument::Stored { document, .. } => &document.sequence,
            SyncedDocument::Failed(failed) => &failed.sequence,
        }
    }

    /// Schema identifier.
    pub fn schema(&self) -> &str {
        match self {
            SyncedDocument::Stored { document, .. } => &document.schema,
            SyncedDocument::Failed(failed) => &failed.schema,
        }
    }

    /// Completeness tier, for stored documents.
    pub fn kind(&self) -> Option<DocumentKind> {
        match self {
            SyncedDocument::Stored { document, .. } => Some(document.kind()),
            SyncedDocument::Failed(_) => None,
        }
    }

    /// Stored path, for stored documents.
    pub fn path(&self) -> Option<&Path> {
        match self {
            SyncedDocument::Stored { path, .. } => Some(path),
            SyncedDocument::Failed(_) => None,
        }
    }

    /// Failure message, for failed documents.
    pub fn error(&self) -> Option<&str> {
        match self {
            SyncedDocument::Stored { .. } => None,
            SyncedDocument::Failed(failed) => Some(&failed.error),
        }
    }

    /// Returns true if decoding failed.
    pub fn is_failed(&self) -> bool {
        matches!(self, SyncedDocument::Failed(_))
    }
}

/// Everything one feed run produced.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    /// Status of the last page, absent if it carried none or no page completed.
    pub status: Option<StatusCode>,
    /// Status message of the last page.
    pub message: Option<String>,
    /// Position the run started from.
    pub start_sequence: u64,
    /// Last high-water mark reported.
    pub last_sequence: u64,
    /// Last feed tip reported.
    pub max_sequence: u64,
    /// Pages fetched.
    pub pages: u32,
    /// Documents in feed order, failed ones included.
    pub documents: Vec<SyncedDocument>,
    /// Raw page responses, in order.
    pub responses: Vec<String>,
    /// Cooldown armed at the end of the run.
    pub cooldown_until: Option<NaiveDateTime>,
}

impl SyncReport {
    /// Creates an empty report for a run starting at `start_sequence`.
    pub fn new(start_sequence: u64) -> Self {
        Self {
            start_sequence,
            last_sequence: start_sequence,
            max_sequence: start_sequence,
            ..Self::default()
        }
    }

    /// Status digits of the last page.
    pub fn status_code(&self) -> Option<&str> {
        self.status.as_ref().map(StatusCode::as_str)
    }

    /// True when the run ended on `137` or `138`.
    pub fn is_success(&self) -> bool {
        self.status
            .as_ref()
            .is_some_and(|s| s.is_documents_found() || s.is_no_documents())
    }

    /// True when the Authority rejected the request.
    pub fn is_rejected(&self) -> bool {
        !self.is_success()
    }

    /// Stored documents.
    pub fn stored(&self) -> impl Iterator<Item = &SyncedDocument> {
        self.documents.iter().filter(|d| !d.is_failed())
    }

    /// Number of documents that failed to decode.
    pub fn failed_count(&self) -> usize {
        self.documents.iter().filter(|d| d.is_failed()).count()
    }
}

/// The cooldown refused the run before any remote call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CooldownBlock {
    /// When polling is allowed again.
    pub until: NaiveDateTime,
    /// Time left, as of the check.
    pub remaining: Duration,
}

impl CooldownBlock {
    /// Human-readable description.
    pub fn message(&self) -> String {
        format!(
            "distribution feed blocked until {} ({} min remaining)",
            self.until.format("%H:%M:%S"),
            self.remaining.num_minutes()
        )
    }
}

/// Result of [`crate::SyncEngine::sync`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    /// The cooldown is active; nothing was fetched.
    Blocked(CooldownBlock),
    /// The loop ran to its end.
    Completed(SyncReport),
}

impl SyncOutcome {
    /// True only for a completed run ending on `137` or `138`.
    pub fn is_success(&self) -> bool {
        match self {
            SyncOutcome::Blocked(_) => false,
            SyncOutcome::Completed(report) => report.is_success(),
        }
    }

    /// The report of a completed run.
    pub fn report(&self) -> Option<&SyncReport> {
        match self {
            SyncOutcome::Blocked(_) => None,
            SyncOutcome::Completed(report) => Some(report),
        }
    }

    /// Returns true if the cooldown refused the run.
    pub fn is_blocked(&self) -> bool {
        matches!(self, SyncOutcome::Blocked(_))
    }
}

/// Result of [`crate::SyncEngine::fetch_by_key`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyLookup {
    /// Status of the response.
    pub status: Option<StatusCode>,
    /// Status message.
    pub message: Option<String>,
    /// Documents returned with `138`, already stored.
    pub documents: Vec<SyncedDocument>,
    /// Raw response.
    pub response: String,
    /// Raw response kept as the cancellation record when the status is `653`.
    pub cancellation: Option<String>,
}

impl KeyLookup {
    /// True when documents were returned (`138`).
    pub fn is_success(&self) -> bool {
        self.status.as_ref().is_some_and(StatusCode::is_documents_found)
    }

    /// True when the document is canceled (`653`).
    pub fn is_canceled(&self) -> bool {
        self.cancellation.is_some()
    }
}
