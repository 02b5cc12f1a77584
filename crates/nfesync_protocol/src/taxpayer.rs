//! Taxpayer identity and environment.

use crate::error::{ProtocolError, ProtocolResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// IBGE state codes (first two digits of an access key) to lowercase UF.
pub const UF_CODES: &[(&str, &str)] = &[
    ("11", "ro"),
    ("12", "ac"),
    ("13", "am"),
    ("14", "rr"),
    ("15", "pa"),
    ("16", "ap"),
    ("17", "to"),
    ("21", "ma"),
    ("22", "pi"),
    ("23", "ce"),
    ("24", "rn"),
    ("25", "pb"),
    ("26", "pe"),
    ("27", "al"),
    ("28", "se"),
    ("29", "ba"),
    ("31", "mg"),
    ("32", "es"),
    ("33", "rj"),
    ("35", "sp"),
    ("41", "pr"),
    ("42", "sc"),
    ("43", "rs"),
    ("50", "ms"),
    ("51", "mt"),
    ("52", "go"),
    ("53", "df"),
];

/// Looks up the UF for an IBGE state code.
pub fn uf_for_code(code: &str) -> Option<&'static str> {
    UF_CODES
        .iter()
        .find(|(c, _)| *c == code)
        .map(|(_, uf)| *uf)
}

const WEIGHTS_FIRST: [u32; 12] = [5, 4, 3, 2, 9, 8, 7, 6, 5, 4, 3, 2];
const WEIGHTS_SECOND: [u32; 13] = [6, 5, 4, 3, 2, 9, 8, 7, 6, 5, 4, 3, 2];

fn check_digit(digits: &[u32], weights: &[u32]) -> u32 {
    let sum: u32 = digits.iter().zip(weights).map(|(d, w)| d * w).sum();
    let rest = sum % 11;
    if rest < 2 {
        0
    } else {
        11 - rest
    }
}

/// A validated CNPJ identifying a taxpayer.
///
/// Parsing strips formatting (`11.222.333/0001-81`), then requires 14 digits,
/// rejects sequences of one repeated digit and verifies both mod-11 check digits.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TaxpayerId(String);

impl TaxpayerId {
    /// Parses and validates a CNPJ.
    pub fn parse(raw: &str) -> ProtocolResult<Self> {
        let digits: String = raw.chars().filter(char::is_ascii_digit).collect();
        let invalid = |reason| ProtocolError::InvalidTaxpayerId {
            value: raw.to_string(),
            reason,
        };

        if digits.len() != 14 || raw.chars().any(|c| c.is_alphabetic()) {
            return Err(invalid("expected 14 digits"));
        }

        let values: Vec<u32> = digits.chars().filter_map(|c| c.to_digit(10)).collect();
        if values.iter().all(|d| *d == values[0]) {
            return Err(invalid("all digits are equal"));
        }
        if check_digit(&values[..12], &WEIGHTS_FIRST) != values[12]
            || check_digit(&values[..13], &WEIGHTS_SECOND) != values[13]
        {
            return Err(invalid("check digits do not match"));
        }

        Ok(Self(digits))
    }

    /// Returns the 14 digits.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TaxpayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for TaxpayerId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl FromStr for TaxpayerId {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for TaxpayerId {
    type Error = ProtocolError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<TaxpayerId> for String {
    fn from(id: TaxpayerId) -> Self {
        id.0
    }
}

/// Deployment mode a taxpayer operates against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Environment {
    /// Live environment.
    Production,
    /// Test ("homologacao") environment.
    Homologation,
}

impl Environment {
    /// Maps the configuration flag to an environment.
    pub fn from_homologation(homologation: bool) -> Self {
        if homologation {
            Environment::Homologation
        } else {
            Environment::Production
        }
    }

    /// Returns the name used in persisted state keys.
    pub fn state_key(&self) -> &'static str {
        match self {
            Environment::Production => "producao",
            Environment::Homologation => "homologacao",
        }
    }

    /// Returns true for the test environment.
    pub fn is_homologation(&self) -> bool {
        matches!(self, Environment::Homologation)
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Environment::Production => f.write_str("production"),
            Environment::Homologation => f.write_str("homologation"),
        }
    }
}

/// A configured taxpayer: who is synchronizing, where, and against which environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Taxpayer {
    /// Configuration name (section name in the config file).
    pub name: String,
    /// Validated CNPJ.
    pub id: TaxpayerId,
    /// Lowercase UF of the taxpayer's home state.
    pub uf: String,
    /// Environment for this invocation.
    pub environment: Environment,
}

impl Taxpayer {
    /// Creates a new taxpayer.
    pub fn new(
        name: impl Into<String>,
        id: TaxpayerId,
        uf: impl Into<String>,
        environment: Environment,
    ) -> Self {
        Self {
            name: name.into(),
            id,
            uf: uf.into().to_lowercase(),
            environment,
        }
    }

    /// Returns a copy operating against another environment.
    pub fn with_environment(mut self, environment: Environment) -> Self {
        self.environment = environment;
        self
    }
}

/// A 44-digit access key naming one fiscal document.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AccessKey(String);

impl AccessKey {
    /// Parses an access key.
    pub fn parse(raw: &str) -> ProtocolResult<Self> {
        let raw = raw.trim();
        if raw.len() != 44 || !raw.chars().all(|c| c.is_ascii_digit()) {
            return Err(ProtocolError::InvalidAccessKey(raw.to_string()));
        }
        Ok(Self(raw.to_string()))
    }

    /// Returns the key digits.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// UF of the issuing state, from the leading IBGE code.
    pub fn issuer_uf(&self) -> Option<&'static str> {
        uf_for_code(&self.0[..2])
    }

    /// CNPJ digits of the issuer embedded in the key.
    pub fn issuer_id(&self) -> &str {
        &self.0[6..20]
    }
}

impl fmt::Display for AccessKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for AccessKey {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}
