//! XML helpers shared by response parsing, classification and the document store.
//!
//! Lookups match elements by local name and ignore namespaces, since the
//! Authority's documents may arrive with or without a SOAP envelope and
//! with varying namespace prefixes.

use crate::error::ProtocolResult;
use roxmltree::{Document, Node};

/// XML declaration written at the top of every stored document.
pub const DECLARATION: &str = r#"<?xml version="1.0" encoding="UTF-8"?>"#;

/// Parses a document. DTDs are rejected and entities are never resolved.
pub fn parse(text: &str) -> ProtocolResult<Document<'_>> {
    Ok(Document::parse(text)?)
}

/// Returns the local name of the root element of `text`.
pub fn root_local_name(text: &str) -> ProtocolResult<String> {
    let doc = parse(text)?;
    Ok(doc.root_element().tag_name().name().to_string())
}

fn is_named(node: &Node<'_, '_>, name: &str) -> bool {
    node.is_element() && node.tag_name().name() == name
}

fn non_empty_text<'a>(node: Node<'a, '_>) -> Option<&'a str> {
    node.text().map(str::trim).filter(|t| !t.is_empty())
}

/// First non-empty text of any element named `name`, anywhere in the document.
pub fn descendant_text<'a>(doc: &'a Document<'_>, name: &str) -> Option<&'a str> {
    doc.descendants()
        .filter(|n| is_named(n, name))
        .find_map(non_empty_text)
}

/// First non-empty text of a `child` element directly under any `parent` element.
pub fn child_text<'a>(doc: &'a Document<'_>, parent: &str, child: &str) -> Option<&'a str> {
    doc.descendants()
        .filter(|n| is_named(n, parent))
        .flat_map(|p| p.children())
        .filter(|n| is_named(n, child))
        .find_map(non_empty_text)
}

/// Iterates all elements named `name`.
pub fn elements<'a, 'input>(
    doc: &'a Document<'input>,
    name: &'a str,
) -> impl Iterator<Item = Node<'a, 'input>> + 'a {
    doc.descendants().filter(move |n| is_named(n, name))
}

/// Ensures `text` starts with an XML declaration.
pub fn with_declaration(text: &str) -> String {
    let trimmed = text.trim_start_matches('\u{feff}').trim_start();
    if trimmed.starts_with("<?xml") {
        trimmed.to_string()
    } else {
        format!("{DECLARATION}\n{trimmed}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"<nfeProc xmlns="http://www.portalfiscal.inf.br/nfe">
        <NFe><infNFe>
            <ide><serie>1</serie><nNF>42</nNF></ide>
            <emit><CNPJ>11222333000181</CNPJ></emit>
            <dest><CPF>12345678909</CPF><CNPJ></CNPJ></dest>
        </infNFe></NFe>
        <protNFe><infProt><chNFe></chNFe><chNFe>123</chNFe></infProt></protNFe>
    </nfeProc>"#;

    #[test]
    fn root_name_strips_namespace() {
        assert_eq!(root_local_name(SAMPLE).unwrap(), "nfeProc");
        assert_eq!(
            root_local_name(r#"<ns:resNFe xmlns:ns="urn:x"/>"#).unwrap(),
            "resNFe"
        );
    }

    #[test]
    fn lookups_skip_empty_text() {
        let doc = parse(SAMPLE).unwrap();
        assert_eq!(descendant_text(&doc, "chNFe"), Some("123"));
        assert_eq!(child_text(&doc, "emit", "CNPJ"), Some("11222333000181"));
        assert_eq!(child_text(&doc, "dest", "CNPJ"), None);
        assert_eq!(child_text(&doc, "ide", "nNF"), Some("42"));
        assert_eq!(descendant_text(&doc, "missing"), None);
    }

    #[test]
    fn rejects_dtd() {
        let text = r#"<!DOCTYPE x [<!ENTITY e SYSTEM "file:///etc/passwd">]><x>&e;</x>"#;
        assert!(parse(text).is_err());
    }

    #[test]
    fn declaration_added_once() {
        assert_eq!(with_declaration("<a/>"), format!("{DECLARATION}\n<a/>"));
        let declared = r#"<?xml version="1.0"?><a/>"#;
        assert_eq!(with_declaration(declared), declared);
    }
}
