//! # nfe-sync Testkit
//!
//! Test utilities for nfe-sync.
//!
//! This crate provides:
//! - [`ResponseBuilder`] for distribution feed responses, so tests never
//!   hand-write base64
//! - [`zip_document`] to compress a document the way the feed does
//! - Sample documents and valid taxpayer identifiers
//! - [`TestWorkspace`], a temporary downloads directory and state file
//! - Proptest strategies for access keys and feed pages
//!
//! ## Usage
//!
//! ```rust,ignore
//! use nfesync_testkit::prelude::*;
//!
//! #[test]
//! fn drained_feed() {
//!     let body = ResponseBuilder::no_documents().build();
//!     // ... hand `body` to a mock transport
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;
pub mod responses;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::responses::*;
}

pub use fixtures::*;
pub use generators::*;
pub use responses::*;
