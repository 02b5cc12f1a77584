//! Builders for distribution feed responses.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use flate2::write::GzEncoder;
use flate2::Compression;
use std::fmt::Write as _;
use std::io::Write;

/// Compresses a document the way the feed delivers it: gzip, then base64.
pub fn zip_document(xml: &str) -> String {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(xml.as_bytes())
        .expect("writing to a Vec cannot fail");
    STANDARD.encode(encoder.finish().expect("finishing a Vec cannot fail"))
}

/// Formats a sequence number with the feed's 15-digit zero padding.
pub fn feed_sequence(sequence: u64) -> String {
    format!("{sequence:015}")
}

#[derive(Debug, Clone)]
struct Entry {
    sequence: String,
    schema: String,
    payload: String,
}

/// Builds a `retDistDFeInt` response body.
///
/// # Example
///
/// ```
/// use nfesync_testkit::{ResponseBuilder, summary_xml, SAMPLE_KEY};
///
/// let body = ResponseBuilder::documents_found(42, 100)
///     .document(42, "resNFe_v1.01.xsd", &summary_xml(SAMPLE_KEY))
///     .build();
/// assert!(String::from_utf8(body).unwrap().contains("<maxNSU>000000000000100</maxNSU>"));
/// ```
#[derive(Debug, Clone)]
pub struct ResponseBuilder {
    status: Option<String>,
    message: Option<String>,
    last_sequence: Option<u64>,
    max_sequence: Option<u64>,
    entries: Vec<Entry>,
    soap: bool,
}

impl ResponseBuilder {
    /// Starts a response with the given status code.
    pub fn new(status: &str) -> Self {
        Self {
            status: Some(status.to_string()),
            message: None,
            last_sequence: None,
            max_sequence: None,
            entries: Vec::new(),
            soap: false,
        }
    }

    /// `138` page with the given markers.
    pub fn documents_found(last_sequence: u64, max_sequence: u64) -> Self {
        Self::new("138")
            .message("Documento localizado")
            .last_sequence(last_sequence)
            .max_sequence(max_sequence)
    }

    /// `137` drained response with zero markers.
    pub fn no_documents() -> Self {
        Self::new("137")
            .message("Nenhum documento localizado")
            .last_sequence(0)
            .max_sequence(0)
    }

    /// `653` response to a lookup by key.
    pub fn canceled() -> Self {
        Self::new("653").message("Rejeicao: NF-e cancelada, arquivo indisponivel para download")
    }

    /// A rejection with an arbitrary code.
    pub fn rejected(code: &str, message: &str) -> Self {
        Self::new(code).message(message)
    }

    /// A response without `cStat`.
    pub fn without_status() -> Self {
        Self {
            status: None,
            ..Self::new("")
        }
    }

    /// Sets `xMotivo`.
    pub fn message(mut self, message: &str) -> Self {
        self.message = Some(message.to_string());
        self
    }

    /// Sets `ultNSU`.
    pub fn last_sequence(mut self, sequence: u64) -> Self {
        self.last_sequence = Some(sequence);
        self
    }

    /// Sets `maxNSU`.
    pub fn max_sequence(mut self, sequence: u64) -> Self {
        self.max_sequence = Some(sequence);
        self
    }

    /// Adds a compressed document.
    pub fn document(self, sequence: u64, schema: &str, xml: &str) -> Self {
        self.raw_entry(&feed_sequence(sequence), schema, &zip_document(xml))
    }

    /// Adds an entry with a verbatim payload (for corrupt-payload tests).
    pub fn raw_entry(mut self, sequence: &str, schema: &str, payload: &str) -> Self {
        self.entries.push(Entry {
            sequence: sequence.to_string(),
            schema: schema.to_string(),
            payload: payload.to_string(),
        });
        self
    }

    /// Wraps the response in a SOAP 1.2 envelope.
    pub fn soap(mut self) -> Self {
        self.soap = true;
        self
    }

    /// Renders the response text.
    pub fn build_string(&self) -> String {
        let mut out = String::from(r#"<retDistDFeInt xmlns="http://www.portalfiscal.inf.br/nfe" versao="1.01">"#);
        out.push_str("<tpAmb>2</tpAmb><verAplic>1.0.0</verAplic>");
        if let Some(status) = &self.status {
            let _ = write!(out, "<cStat>{status}</cStat>");
        }
        if let Some(message) = &self.message {
            let _ = write!(out, "<xMotivo>{message}</xMotivo>");
        }
        out.push_str("<dhResp>2024-06-01T10:00:00-03:00</dhResp>");
        if let Some(last) = self.last_sequence {
            let _ = write!(out, "<ultNSU>{}</ultNSU>", feed_sequence(last));
        }
        if let Some(max) = self.max_sequence {
            let _ = write!(out, "<maxNSU>{}</maxNSU>", feed_sequence(max));
        }
        if !self.entries.is_empty() {
            out.push_str("<loteDistDFeInt>");
            for entry in &self.entries {
                let _ = write!(
                    out,
                    r#"<docZip NSU="{}" schema="{}">{}</docZip>"#,
                    entry.sequence, entry.schema, entry.payload
                );
            }
            out.push_str("</loteDistDFeInt>");
        }
        out.push_str("</retDistDFeInt>");

        if self.soap {
            format!(
                r#"<?xml version="1.0" encoding="utf-8"?><soap:Envelope xmlns:soap="http://www.w3.org/2003/05/soap-envelope"><soap:Body><nfeDistDFeInteresseResponse xmlns="http://www.portalfiscal.inf.br/nfe/wsdl/NFeDistribuicaoDFe"><nfeDistDFeInteresseResult>{out}</nfeDistDFeInteresseResult></nfeDistDFeInteresseResponse></soap:Body></soap:Envelope>"#
            )
        } else {
            format!(r#"<?xml version="1.0" encoding="utf-8"?>{out}"#)
        }
    }

    /// Renders the response body.
    pub fn build(&self) -> Vec<u8> {
        self.build_string().into_bytes()
    }
}
