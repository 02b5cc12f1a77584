//! # nfe-sync Protocol
//!
//! Distribution feed types and document classification for nfe-sync.
//!
//! This crate provides:
//! - Taxpayer identity (`TaxpayerId`, `AccessKey`, `Environment`)
//! - Parsing of the Authority's distribution responses (`DistributionResponse`)
//! - Decompression of `docZip` payloads
//! - The document classifier that turns a feed entry into a [`Document`]
//!   with a stable file name
//!
//! This is a pure protocol crate with no I/O operations.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod classifier;
mod document;
mod error;
mod response;
mod taxpayer;
pub mod xml;

pub use classifier::{
    classify, decompress, event_label, file_base_name, infer_schema, DocumentName, EVENT_LABELS,
};
pub use document::{DecodedDocument, Document, DocumentKind, FailedDocument};
pub use error::{ProtocolError, ProtocolResult};
pub use response::{DistributionResponse, FeedEntry, StatusCode};
pub use taxpayer::{uf_for_code, AccessKey, Environment, Taxpayer, TaxpayerId, UF_CODES};
