//! Distribution feed responses (`retDistDFeInt`).

use crate::error::{ProtocolError, ProtocolResult};
use crate::xml;
use std::fmt;

/// Status code reported by the Authority (`cStat`), kept with its exact digits.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StatusCode(String);

impl StatusCode {
    /// Documents were found at the requested position.
    pub const DOCUMENTS_FOUND: &'static str = "138";
    /// No documents exist at the requested position.
    pub const NO_DOCUMENTS: &'static str = "137";
    /// The looked-up document has been canceled.
    pub const CANCELED: &'static str = "653";

    /// Wraps a raw status code.
    pub fn new(code: impl Into<String>) -> Self {
        Self(code.into())
    }

    /// Returns the raw digits.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// `138`: the page carries documents.
    pub fn is_documents_found(&self) -> bool {
        self.0 == Self::DOCUMENTS_FOUND
    }

    /// `137`: the feed is drained at this position.
    pub fn is_no_documents(&self) -> bool {
        self.0 == Self::NO_DOCUMENTS
    }

    /// `653`: the document was canceled.
    pub fn is_canceled(&self) -> bool {
        self.0 == Self::CANCELED
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One compressed entry of a feed page (`docZip`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedEntry {
    /// Sequence number exactly as given by the feed (leading zeros kept).
    pub sequence: String,
    /// Schema identifier, e.g. `procNFe_v4.00.xsd`.
    pub schema: String,
    /// Base64 of the gzip-compressed document.
    pub payload: String,
}

impl FeedEntry {
    /// Creates a feed entry.
    pub fn new(
        sequence: impl Into<String>,
        schema: impl Into<String>,
        payload: impl Into<String>,
    ) -> Self {
        Self {
            sequence: sequence.into(),
            schema: schema.into(),
            payload: payload.into(),
        }
    }
}

/// A parsed page of the distribution feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DistributionResponse {
    /// Status code, absent if the response carried none.
    pub status: Option<StatusCode>,
    /// Human-readable status message.
    pub message: Option<String>,
    /// Resumable high-water mark of this page (`ultNSU`).
    pub last_sequence: u64,
    /// Current tip of the feed (`maxNSU`).
    pub max_sequence: u64,
    /// Compressed documents of this page.
    pub entries: Vec<FeedEntry>,
    /// The raw response text, kept for audit logging.
    pub raw: String,
}

impl DistributionResponse {
    /// Parses a response body.
    ///
    /// `current_sequence` is used when the response has no `ultNSU`;
    /// a missing `maxNSU` defaults to the resulting `last_sequence`.
    pub fn parse(body: &[u8], current_sequence: u64) -> ProtocolResult<Self> {
        let text = std::str::from_utf8(body)
            .map_err(|e| ProtocolError::malformed(format!("response is not UTF-8: {e}")))?;
        let doc = xml::parse(text)?;

        let status = xml::descendant_text(&doc, "cStat").map(StatusCode::new);
        let message = xml::descendant_text(&doc, "xMotivo").map(str::to_string);

        let last_sequence = match xml::descendant_text(&doc, "ultNSU") {
            Some(value) => parse_sequence("ultNSU", value)?,
            None => current_sequence,
        };
        let max_sequence = match xml::descendant_text(&doc, "maxNSU") {
            Some(value) => parse_sequence("maxNSU", value)?,
            None => last_sequence,
        };

        let entries = xml::elements(&doc, "docZip")
            .map(|node| FeedEntry {
                sequence: node.attribute("NSU").unwrap_or_default().to_string(),
                schema: node.attribute("schema").unwrap_or_default().to_string(),
                payload: node.text().unwrap_or_default().trim().to_string(),
            })
            .collect();

        Ok(Self {
            status,
            message,
            last_sequence,
            max_sequence,
            entries,
            raw: text.to_string(),
        })
    }

    /// Returns the status digits, if any.
    pub fn status_code(&self) -> Option<&str> {
        self.status.as_ref().map(StatusCode::as_str)
    }

    /// True when the page carries documents (`138`).
    pub fn has_documents(&self) -> bool {
        self.status.as_ref().is_some_and(StatusCode::is_documents_found)
    }

    /// True when the feed is drained at this position (`137`).
    pub fn is_drained(&self) -> bool {
        self.status.as_ref().is_some_and(StatusCode::is_no_documents)
    }

    /// True when the looked-up document is canceled (`653`).
    pub fn is_canceled(&self) -> bool {
        self.status.as_ref().is_some_and(StatusCode::is_canceled)
    }
}

fn parse_sequence(field: &'static str, value: &str) -> ProtocolResult<u64> {
    value
        .trim()
        .parse::<u64>()
        .map_err(|_| ProtocolError::InvalidSequence {
            field,
            value: value.to_string(),
        })
}
