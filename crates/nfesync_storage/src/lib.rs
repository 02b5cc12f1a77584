//! # nfe-sync Storage
//!
//! Filesystem persistence for nfe-sync.
//!
//! This crate provides the two stores the synchronization engine writes to:
//!
//! - [`DocumentStore`] - one directory per taxpayer holding the fetched
//!   documents, with root-tag inspection to tell summaries from complete
//!   documents
//! - [`StateFile`] - the single JSON file holding [`SyncState`] (last
//!   sequence, cooldowns and document numbering), read under a shared lock
//!   and rewritten under an exclusive lock
//!
//! ## Layout
//!
//! ```text
//! <state_file>                 # .state.json, one per deployment
//! <downloads>/
//! └─ <cnpj>/
//!    ├─ <accessKey>.xml        # summary or complete form
//!    ├─ <accessKey>-evento-ciencia-1.xml
//!    └─ <dest>-<emit>-<serie>-<nNF>.xml
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod documents;
mod error;
mod lock;
mod state;

pub use documents::DocumentStore;
pub use error::{StorageError, StorageResult};
pub use state::{StateFile, SyncState};
