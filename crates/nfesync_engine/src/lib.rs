//! # nfe-sync Engine
//!
//! Synchronization of a taxpayer's documents against the Authority's
//! distribution feed.
//!
//! This crate provides:
//! - Cooldown gate honoring the Authority's rate-limit window
//! - Paginated fetch with bounded exponential-delay retry
//! - Classification and storage of every page's documents
//! - Periodic checkpointing of the last consumed sequence number
//! - Lookup of a single document by access key
//! - Cancellation lifecycle for stored documents
//! - Transport abstraction with a subprocess client and a mock
//!
//! ## Architecture
//!
//! One run is a sequential loop: each page's starting position is the
//! previous page's reported high-water mark.
//!
//! 1. Refuse to call the feed while the cooldown is active
//! 2. Fetch a page, retrying transient failures
//! 3. Store decoded documents, then advance the in-memory sequence
//! 4. Checkpoint every N pages and when the feed tip is reached
//! 5. Arm the cooldown unless the run ended on a page with documents
//!
//! ## Key Invariants
//!
//! - The persisted sequence never moves backwards
//! - A document is stored before its page is marked consumed
//! - No network call happens while the cooldown is active
//! - State locks are never held across a network call

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod clock;
mod command;
mod config;
mod engine;
mod error;
mod lifecycle;
mod report;
mod retry;
mod transport;

pub use clock::{Clock, FixedClock, SystemClock};
pub use command::{ClientCommand, CommandTransport};
pub use config::{RetryConfig, SyncConfig};
pub use engine::SyncEngine;
pub use error::{SyncError, SyncResult};
pub use lifecycle::{apply_cancellation, record_cancellation, CancellationOutcome, CancellationRecord};
pub use report::{CooldownBlock, KeyLookup, SyncOutcome, SyncProgress, SyncReport, SyncedDocument};
pub use retry::{retry, retry_with_sleep};
pub use transport::{DistributionTransport, MockCall, MockTransport};
