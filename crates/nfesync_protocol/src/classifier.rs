//! Document classifier.
//!
//! Turns a raw feed entry into a [`Document`], deriving a file name that
//! depends only on the document's own content:
//!
//! - documents with an access key are named by the key;
//! - events append `-evento-<label>-<sequenceInEvent>` to the key;
//! - documents without a key (invalidation records) use
//!   `<recipient>-<issuer>-<series>-<number>`, or the feed sequence if all
//!   four are blank.

use crate::document::{DecodedDocument, Document, FailedDocument};
use crate::error::{ProtocolError, ProtocolResult};
use crate::response::FeedEntry;
use crate::taxpayer::AccessKey;
use crate::xml;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use flate2::read::GzDecoder;
use std::io::Read;
use tracing::warn;

/// Event type codes and their short labels.
pub const EVENT_LABELS: &[(&str, &str)] = &[
    ("110110", "carta-correcao"),
    ("110111", "cancelamento"),
    ("110140", "epec"),
    ("210200", "confirmacao"),
    ("210210", "ciencia"),
    ("210220", "desconhecimento"),
    ("210240", "nao-realizada"),
    ("510630", "registro-passagem"),
    ("610600", "cancelamento-substituicao"),
    ("610614", "cancelamento-ct"),
    ("790700", "averbacao"),
    ("990900", "vistoria-suframa"),
    ("990910", "internalizacao-suframa"),
];

/// Label for an event type code; unknown codes pass through verbatim.
pub fn event_label(code: &str) -> &str {
    EVENT_LABELS
        .iter()
        .find(|(c, _)| *c == code)
        .map_or(code, |(_, label)| *label)
}

/// Derived name of a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentName {
    /// File name without extension.
    pub base_name: String,
    /// Access key found in the document.
    pub access_key: Option<String>,
}

impl DocumentName {
    /// Checks that the name can be used as a file name in a taxpayer directory.
    ///
    /// An embedded access key must be 44 digits. The base name must be
    /// non-empty and free of path separators, `..` and control characters.
    pub fn validated(self) -> ProtocolResult<Self> {
        if let Some(key) = &self.access_key {
            AccessKey::parse(key)?;
        }
        let base = &self.base_name;
        if base.is_empty()
            || base.contains(['/', '\\'])
            || base.contains("..")
            || base.chars().any(char::is_control)
        {
            return Err(ProtocolError::InvalidDocumentName(base.clone()));
        }
        Ok(self)
    }
}

fn is_event_schema(schema: &str) -> bool {
    schema.contains("Evento") || schema.contains("evento")
}

/// Derives the stable base name of a parsed document.
///
/// `fallback` (the feed sequence) is used when the document has neither an
/// access key nor any of the composite fields.
pub fn file_base_name(doc: &roxmltree::Document<'_>, schema: &str, fallback: &str) -> DocumentName {
    if let Some(key) = xml::descendant_text(doc, "chNFe") {
        let base_name = if is_event_schema(schema) {
            let event_type = xml::descendant_text(doc, "tpEvento").unwrap_or_default();
            let sequence = xml::descendant_text(doc, "nSeqEvento").unwrap_or("1");
            format!("{key}-evento-{}-{sequence}", event_label(event_type))
        } else {
            key.to_string()
        };
        return DocumentName {
            base_name,
            access_key: Some(key.to_string()),
        };
    }

    let parts = [
        xml::child_text(doc, "dest", "CNPJ").unwrap_or_default(),
        xml::child_text(doc, "emit", "CNPJ").unwrap_or_default(),
        xml::child_text(doc, "ide", "serie").unwrap_or_default(),
        xml::child_text(doc, "ide", "nNF").unwrap_or_default(),
    ];
    let base_name = if parts.iter().any(|p| !p.is_empty()) {
        parts.join("-")
    } else {
        fallback.to_string()
    };

    DocumentName {
        base_name,
        access_key: None,
    }
}

/// Decodes a `docZip` payload: base64, then gzip, then UTF-8.
pub fn decompress(payload: &str) -> ProtocolResult<String> {
    let compact: String = payload.split_ascii_whitespace().collect();
    let compressed = STANDARD
        .decode(compact.as_bytes())
        .map_err(|e| ProtocolError::Decode(format!("base64: {e}")))?;

    let mut text = String::new();
    GzDecoder::new(compressed.as_slice())
        .read_to_string(&mut text)
        .map_err(|e| ProtocolError::Decode(format!("gzip: {e}")))?;
    Ok(text)
}

fn decode_entry(entry: &FeedEntry) -> ProtocolResult<DecodedDocument> {
    let text = decompress(&entry.payload)?;
    let doc = xml::parse(&text)?;
    let name = file_base_name(&doc, &entry.schema, &entry.sequence).validated()?;

    Ok(DecodedDocument {
        sequence: entry.sequence.clone(),
        schema: entry.schema.clone(),
        access_key: name.access_key,
        base_name: name.base_name,
        content: xml::with_declaration(&text),
    })
}

/// Classifies one feed entry.
///
/// Never fails: a decoding error is logged and returned as
/// [`Document::Failed`] so that sibling entries are still processed.
pub fn classify(entry: &FeedEntry) -> Document {
    match decode_entry(entry) {
        Ok(doc) => Document::Decoded(doc),
        Err(err) => {
            warn!(
                sequence = %entry.sequence,
                schema = %entry.schema,
                payload_len = entry.payload.len(),
                error = ?err,
                "failed to decode feed entry: {err}"
            );
            Document::Failed(FailedDocument {
                sequence: entry.sequence.clone(),
                schema: entry.schema.clone(),
                error: err.to_string(),
            })
        }
    }
}

/// Infers a schema identifier from a stored document's root tag.
///
/// Used when re-deriving names of files that were saved without their
/// feed metadata.
pub fn infer_schema(root_tag: &str) -> &'static str {
    if root_tag.contains("procEventoNFe") || root_tag.contains("retEnvEvento") {
        "procEventoNFe_v1.00.xsd"
    } else if root_tag.contains("resEvento") {
        "resEvento_v1.01.xsd"
    } else {
        ""
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use proptest::prelude::*;
    use std::io::Write;

    const KEY: &str = "35240611222333000181550010000000011000000010";

    fn zip(xml: &str) -> String {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(xml.as_bytes()).unwrap();
        STANDARD.encode(encoder.finish().unwrap())
    }

    fn entry(sequence: &str, schema: &str, xml: &str) -> FeedEntry {
        FeedEntry::new(sequence, schema, zip(xml))
    }

    fn summary(key: &str) -> String {
        format!(
            r#"<resNFe xmlns="http://www.portalfiscal.inf.br/nfe" versao="1.01"><chNFe>{key}</chNFe><CNPJ>11222333000181</CNPJ></resNFe>"#
        )
    }

    fn event(key: &str, code: &str, seq: Option<&str>) -> String {
        let seq = seq
            .map(|s| format!("<nSeqEvento>{s}</nSeqEvento>"))
            .unwrap_or_default();
        format!(
            r#"<procEventoNFe xmlns="http://www.portalfiscal.inf.br/nfe"><evento><infEvento><chNFe>{key}</chNFe><tpEvento>{code}</tpEvento>{seq}</infEvento></evento></procEventoNFe>"#
        )
    }

    #[test]
    fn summary_named_by_key() {
        let doc = classify(&entry("000000000000042", "resNFe_v1.01.xsd", &summary(KEY)));
        let decoded = doc.as_decoded().unwrap();
        assert_eq!(decoded.base_name, KEY);
        assert_eq!(decoded.access_key.as_deref(), Some(KEY));
        assert_eq!(decoded.sequence, "000000000000042");
        assert!(decoded.content.starts_with(xml::DECLARATION));
        assert!(decoded.content.contains("<resNFe"));
    }

    #[test]
    fn event_gets_label_and_sequence() {
        let doc = classify(&entry(
            "43",
            "procEventoNFe_v1.00.xsd",
            &event(KEY, "210210", Some("2")),
        ));
        let decoded = doc.as_decoded().unwrap();
        assert_eq!(decoded.base_name, format!("{KEY}-evento-ciencia-2"));
        assert_eq!(decoded.access_key.as_deref(), Some(KEY));
    }

    #[test]
    fn event_defaults_and_unknown_code() {
        let doc = classify(&entry("44", "resEvento_v1.01.xsd", &event(KEY, "999999", None)));
        assert_eq!(
            doc.as_decoded().unwrap().base_name,
            format!("{KEY}-evento-999999-1")
        );
    }

    #[test]
    fn event_key_without_event_schema_uses_plain_key() {
        let doc = classify(&entry("45", "procNFe_v4.00.xsd", &event(KEY, "110111", Some("1"))));
        assert_eq!(doc.as_decoded().unwrap().base_name, KEY);
    }

    #[test]
    fn composite_name_without_key() {
        let xml = r#"<procInutNFe><inutNFe><infInut>
            <ide><serie>1</serie><nNF>100</nNF></ide>
            <emit><CNPJ>11222333000181</CNPJ></emit>
        </infInut></inutNFe></procInutNFe>"#;
        let doc = classify(&entry("46", "procInutNFe_v4.00.xsd", xml));
        let decoded = doc.as_decoded().unwrap();
        assert_eq!(decoded.base_name, "-11222333000181-1-100");
        assert_eq!(decoded.access_key, None);
    }

    #[test]
    fn falls_back_to_sequence() {
        let doc = classify(&entry("000000000000047", "", "<empty/>"));
        assert_eq!(doc.as_decoded().unwrap().base_name, "000000000000047");
    }

    #[test]
    fn bad_payloads_fail_in_isolation() {
        let not_base64 = classify(&FeedEntry::new("1", "resNFe_v1.01.xsd", "%%%"));
        assert!(not_base64.error().unwrap().contains("base64"));

        let not_gzip = classify(&FeedEntry::new("2", "resNFe_v1.01.xsd", STANDARD.encode("plain")));
        assert!(not_gzip.error().unwrap().contains("gzip"));

        let not_xml = classify(&entry("3", "resNFe_v1.01.xsd", "<unclosed>"));
        assert!(not_xml.error().unwrap().contains("xml"));
        assert_eq!(not_xml.sequence(), "3");
        assert_eq!(not_xml.schema(), "resNFe_v1.01.xsd");
    }

    #[test]
    fn unsafe_names_fail_in_isolation() {
        let slashed = classify(&entry("4", "resNFe_v1.01.xsd", &summary("3524/0611")));
        assert!(slashed.is_failed());
        assert!(slashed.error().unwrap().contains("invalid access key"));

        let short_key = classify(&entry("5", "resNFe_v1.01.xsd", &summary("123")));
        assert!(short_key.is_failed());

        let xml = r#"<procInutNFe><inutNFe><infInut>
            <ide><serie>../..</serie><nNF>1</nNF></ide>
        </infInut></inutNFe></procInutNFe>"#;
        let traversal = classify(&entry("6", "procInutNFe_v4.00.xsd", xml));
        assert!(traversal.error().unwrap().contains("invalid document name"));

        let backslash = classify(&entry("7\\x", "", "<empty/>"));
        assert!(backslash.is_failed());
    }

    #[test]
    fn validated_accepts_derived_names() {
        let name = DocumentName {
            base_name: format!("{KEY}-evento-ciencia-1"),
            access_key: Some(KEY.to_string()),
        };
        assert_eq!(name.clone().validated().unwrap(), name);

        let composite = DocumentName {
            base_name: "-11222333000181-1-100".into(),
            access_key: None,
        };
        assert!(composite.validated().is_ok());
    }

    #[test]
    fn decompress_tolerates_line_breaks() {
        let payload = zip("<a/>");
        let wrapped = format!("{}\n  {}", &payload[..10], &payload[10..]);
        assert_eq!(decompress(&wrapped).unwrap(), "<a/>");
    }

    #[test]
    fn labels() {
        assert_eq!(event_label("110111"), "cancelamento");
        assert_eq!(event_label("210200"), "confirmacao");
        assert_eq!(event_label("123"), "123");
        assert_eq!(event_label(""), "");
    }

    #[test]
    fn schema_inference() {
        assert_eq!(infer_schema("procEventoNFe"), "procEventoNFe_v1.00.xsd");
        assert_eq!(infer_schema("retEnvEvento"), "procEventoNFe_v1.00.xsd");
        assert_eq!(infer_schema("resEvento"), "resEvento_v1.01.xsd");
        assert_eq!(infer_schema("nfeProc"), "");
    }

    proptest! {
        #[test]
        fn names_are_stable_and_order_independent(
            keys in prop::collection::vec("[0-9]{44}", 1..8),
            code_index in 0usize..EVENT_LABELS.len(),
        ) {
            let code = EVENT_LABELS[code_index].0;
            let entries: Vec<FeedEntry> = keys
                .iter()
                .enumerate()
                .map(|(i, key)| {
                    if i % 2 == 0 {
                        entry(&i.to_string(), "resNFe_v1.01.xsd", &summary(key))
                    } else {
                        entry(&i.to_string(), "procEventoNFe_v1.00.xsd", &event(key, code, Some("1")))
                    }
                })
                .collect();

            let forward: Vec<_> = entries.iter().map(classify).collect();
            let mut backward: Vec<_> = entries.iter().rev().map(classify).collect();
            backward.reverse();
            prop_assert_eq!(&forward, &backward);

            for (doc, key) in forward.iter().zip(&keys) {
                let decoded = doc.as_decoded().unwrap();
                prop_assert!(decoded.base_name.starts_with(key.as_str()));
                prop_assert_eq!(decoded.access_key.as_deref(), Some(key.as_str()));
            }
        }
    }
}
