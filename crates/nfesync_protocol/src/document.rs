//! Classified feed documents.

/// Completeness tier of a document, derived from its schema identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    /// Full authorized document (`procNFe`).
    Complete,
    /// Summary form (`resNFe`), superseded once the complete form arrives.
    Summary,
    /// Event attached to a document (acknowledgement, cancellation, ...).
    Event,
    /// Anything else the feed distributes.
    Other,
}

impl DocumentKind {
    /// Root element tag of a stored summary.
    pub const SUMMARY_TAG: &'static str = "resNFe";
    /// Fragment contained in the root tag of a stored complete document.
    pub const COMPLETE_TAG: &'static str = "procNFe";
    /// Root tag the Authority actually uses for complete documents.
    pub const COMPLETE_ROOT: &'static str = "nfeProc";

    /// Classifies a schema identifier such as `procNFe_v4.00.xsd`.
    pub fn from_schema(schema: &str) -> Self {
        if schema.contains(Self::COMPLETE_TAG) {
            DocumentKind::Complete
        } else if schema.contains(Self::SUMMARY_TAG) {
            DocumentKind::Summary
        } else if schema.contains("Evento") || schema.contains("evento") {
            DocumentKind::Event
        } else {
            DocumentKind::Other
        }
    }

    /// Classifies a stored file by its root element's local name.
    pub fn from_root_tag(tag: &str) -> Self {
        if tag == Self::SUMMARY_TAG {
            DocumentKind::Summary
        } else if tag.contains(Self::COMPLETE_TAG) || tag == Self::COMPLETE_ROOT {
            DocumentKind::Complete
        } else if tag.contains("Evento") || tag.contains("evento") {
            DocumentKind::Event
        } else {
            DocumentKind::Other
        }
    }
}

/// A feed entry that decompressed and classified cleanly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedDocument {
    /// Sequence number exactly as given by the feed.
    pub sequence: String,
    /// Schema identifier.
    pub schema: String,
    /// Access key, when the document carries one.
    pub access_key: Option<String>,
    /// Stable file name without extension.
    pub base_name: String,
    /// Decompressed XML, with declaration.
    pub content: String,
}

impl DecodedDocument {
    /// File name used in the document store.
    pub fn file_name(&self) -> String {
        format!("{}.xml", self.base_name)
    }

    /// Completeness tier from the schema.
    pub fn kind(&self) -> DocumentKind {
        DocumentKind::from_schema(&self.schema)
    }
}

/// A feed entry that could not be decompressed or classified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedDocument {
    /// Sequence number exactly as given by the feed.
    pub sequence: String,
    /// Schema identifier.
    pub schema: String,
    /// Description of the failure.
    pub error: String,
}

/// Outcome of classifying one feed entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Document {
    /// Content is available.
    Decoded(DecodedDocument),
    /// Decoding failed; siblings are unaffected.
    Failed(FailedDocument),
}

impl Document {
    /// Sequence number of the originating feed entry.
    pub fn sequence(&self) -> &str {
        match self {
            Document::Decoded(doc) => &doc.sequence,
            Document::Failed(doc) => &doc.sequence,
        }
    }

    /// Schema identifier of the originating feed entry.
    pub fn schema(&self) -> &str {
        match self {
            Document::Decoded(doc) => &doc.schema,
            Document::Failed(doc) => &doc.schema,
        }
    }

    /// Returns the decoded document, if any.
    pub fn as_decoded(&self) -> Option<&DecodedDocument> {
        match self {
            Document::Decoded(doc) => Some(doc),
            Document::Failed(_) => None,
        }
    }

    /// Returns the failure message, if any.
    pub fn error(&self) -> Option<&str> {
        match self {
            Document::Decoded(_) => None,
            Document::Failed(doc) => Some(&doc.error),
        }
    }

    /// Returns true if decoding failed.
    pub fn is_failed(&self) -> bool {
        matches!(self, Document::Failed(_))
    }
}
