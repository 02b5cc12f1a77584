//! Error types for the protocol crate.

use thiserror::Error;

/// Result type for protocol operations.
pub type ProtocolResult<T> = Result<T, ProtocolError>;

/// Errors that can occur while decoding feed data or validating identifiers.
#[derive(Error, Debug)]
pub enum ProtocolError {
    /// The taxpayer identifier is not a valid CNPJ.
    #[error("invalid taxpayer id '{value}': {reason}")]
    InvalidTaxpayerId {
        /// The rejected input.
        value: String,
        /// Why it was rejected.
        reason: &'static str,
    },

    /// The access key is not 44 digits.
    #[error("invalid access key '{0}': expected 44 digits")]
    InvalidAccessKey(String),

    /// A response from the Authority could not be understood.
    #[error("malformed response: {0}")]
    MalformedResponse(String),

    /// A sequence marker in a response is not a non-negative integer.
    #[error("invalid sequence in <{field}>: '{value}'")]
    InvalidSequence {
        /// Element name (`ultNSU`, `maxNSU`).
        field: &'static str,
        /// Raw element text.
        value: String,
    },

    /// A compressed payload could not be decoded.
    #[error("payload decode failed: {0}")]
    Decode(String),

    /// A name derived from document content is not a safe file name.
    #[error("invalid document name '{0}'")]
    InvalidDocumentName(String),

    /// XML parsing failed.
    #[error("xml error: {0}")]
    Xml(#[from] roxmltree::Error),
}

impl ProtocolError {
    /// Creates a malformed-response error.
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::MalformedResponse(message.into())
    }
}
