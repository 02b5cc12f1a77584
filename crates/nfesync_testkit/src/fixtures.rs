//! Sample documents, identifiers and temporary workspaces.

use nfesync_protocol::{Environment, Taxpayer, TaxpayerId};
use nfesync_storage::{DocumentStore, StateFile};
use std::path::Path;
use tempfile::TempDir;

/// A CNPJ with valid check digits.
pub const SAMPLE_CNPJ: &str = "11222333000181";

/// A second valid CNPJ, for multi-taxpayer scenarios.
pub const OTHER_CNPJ: &str = "99999999000191";

/// An access key issued in SP (code 35) by [`SAMPLE_CNPJ`].
pub const SAMPLE_KEY: &str = "35240611222333000181550010000000011000000010";

/// A second access key issued in MG (code 31).
pub const OTHER_KEY: &str = "31240699999999000191550010000000021000000020";

/// The sample taxpayer, in SP, against production.
pub fn sample_taxpayer() -> Taxpayer {
    taxpayer("ACME", SAMPLE_CNPJ, "sp")
}

/// A taxpayer from a known-valid CNPJ.
pub fn taxpayer(name: &str, cnpj: &str, uf: &str) -> Taxpayer {
    let id = TaxpayerId::parse(cnpj).expect("fixture CNPJ must be valid");
    Taxpayer::new(name, id, uf, Environment::Production)
}

/// A summary (`resNFe`) for `key`.
pub fn summary_xml(key: &str) -> String {
    format!(
        r#"<resNFe xmlns="http://www.portalfiscal.inf.br/nfe" versao="1.01"><chNFe>{key}</chNFe><CNPJ>{}</CNPJ><xNome>FORNECEDOR LTDA</xNome><IE>110042490114</IE><dhEmi>2024-06-01T09:00:00-03:00</dhEmi><tpNF>1</tpNF><vNF>150.00</vNF><cSitNFe>1</cSitNFe></resNFe>"#,
        &key[6..20]
    )
}

/// A complete authorized document (`nfeProc`) for `key`.
pub fn complete_xml(key: &str) -> String {
    format!(
        r#"<nfeProc xmlns="http://www.portalfiscal.inf.br/nfe" versao="4.00"><NFe><infNFe Id="NFe{key}" versao="4.00"><ide><serie>1</serie><nNF>1</nNF></ide><emit><CNPJ>{}</CNPJ></emit><dest><CNPJ>{SAMPLE_CNPJ}</CNPJ></dest></infNFe></NFe><protNFe versao="4.00"><infProt><chNFe>{key}</chNFe><cStat>100</cStat></infProt></protNFe></nfeProc>"#,
        &key[6..20]
    )
}

/// An event (`procEventoNFe`) of type `code` attached to `key`.
pub fn event_xml(key: &str, code: &str, sequence: u32) -> String {
    format!(
        r#"<procEventoNFe xmlns="http://www.portalfiscal.inf.br/nfe" versao="1.00"><evento versao="1.00"><infEvento><cOrgao>91</cOrgao><CNPJ>{SAMPLE_CNPJ}</CNPJ><chNFe>{key}</chNFe><tpEvento>{code}</tpEvento><nSeqEvento>{sequence}</nSeqEvento></infEvento></evento><retEvento versao="1.00"><infEvento><cStat>135</cStat></infEvento></retEvento></procEventoNFe>"#
    )
}

/// An invalidation record (no access key) for a number range.
pub fn invalidation_xml(series: &str, number: &str) -> String {
    format!(
        r#"<procInutNFe xmlns="http://www.portalfiscal.inf.br/nfe" versao="4.00"><inutNFe><infInut><ide><serie>{series}</serie><nNF>{number}</nNF></ide><emit><CNPJ>{SAMPLE_CNPJ}</CNPJ></emit></infInut></inutNFe></procInutNFe>"#
    )
}

/// A temporary downloads directory and state file, removed on drop.
pub struct TestWorkspace {
    /// Document store rooted in the temporary directory.
    pub store: DocumentStore,
    /// State file inside the temporary directory.
    pub state_file: StateFile,
    temp_dir: TempDir,
}

impl TestWorkspace {
    /// Creates a fresh workspace.
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let store = DocumentStore::new(temp_dir.path().join("downloads"));
        let state_file = StateFile::new(temp_dir.path().join(".state.json"));
        Self {
            store,
            state_file,
            temp_dir,
        }
    }

    /// Root of the temporary directory.
    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }
}

impl Default for TestWorkspace {
    fn default() -> Self {
        Self::new()
    }
}
