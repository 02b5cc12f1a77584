//! Deployment configuration.
//!
//! Loaded from a TOML file (default: `nfe-sync.toml`):
//!
//! ```toml
//! [paths]
//! state_file = ".state.json"
//! downloads_dir = "downloads"
//! log_dir = "log"
//!
//! [client]
//! program = "nfe-client"
//! args = ["--profile", "default"]
//!
//! [audit]
//! retention_days = 7
//!
//! [taxpayers.ACME]
//! cnpj = "11.222.333/0001-81"
//! uf = "SP"
//! homologation = false
//! ```

use crate::error::{CliError, CliResult};
use nfesync_engine::ClientCommand;
use nfesync_protocol::{Environment, Taxpayer, TaxpayerId, UF_CODES};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Root configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// File locations.
    #[serde(default)]
    pub paths: PathsConfig,
    /// External communication client.
    pub client: ClientConfig,
    /// Audit log retention.
    #[serde(default)]
    pub audit: AuditConfig,
    /// Configured taxpayers by name.
    #[serde(default)]
    pub taxpayers: BTreeMap<String, TaxpayerConfig>,
}

/// File locations.
#[derive(Debug, Clone, Deserialize)]
pub struct PathsConfig {
    /// Progress state file (default: `.state.json`).
    #[serde(default = "default_state_file")]
    pub state_file: PathBuf,
    /// Root of the document tree (default: `downloads`).
    #[serde(default = "default_downloads_dir")]
    pub downloads_dir: PathBuf,
    /// Audit log directory (default: `log`).
    #[serde(default = "default_log_dir")]
    pub log_dir: PathBuf,
}

/// External communication client invocation.
#[derive(Debug, Clone, Deserialize)]
pub struct ClientConfig {
    /// Executable to run.
    pub program: String,
    /// Arguments placed before the generated ones.
    #[serde(default)]
    pub args: Vec<String>,
}

/// Audit log settings.
#[derive(Debug, Clone, Deserialize)]
pub struct AuditConfig {
    /// Days raw responses are kept (default: 7).
    #[serde(default = "default_retention_days")]
    pub retention_days: u32,
}

/// One `[taxpayers.<NAME>]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct TaxpayerConfig {
    /// CNPJ, formatted or not.
    pub cnpj: String,
    /// Home state.
    pub uf: String,
    /// Use the homologation environment by default.
    #[serde(default)]
    pub homologation: bool,
    /// Registered name, for display only.
    pub legal_name: Option<String>,
}

fn default_state_file() -> PathBuf {
    PathBuf::from(".state.json")
}

fn default_downloads_dir() -> PathBuf {
    PathBuf::from("downloads")
}

fn default_log_dir() -> PathBuf {
    PathBuf::from("log")
}

fn default_retention_days() -> u32 {
    7
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            state_file: default_state_file(),
            downloads_dir: default_downloads_dir(),
            log_dir: default_log_dir(),
        }
    }
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            retention_days: default_retention_days(),
        }
    }
}

impl Config {
    /// Loads and validates a configuration file.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the file cannot be read, parsed or
    /// validated.
    pub fn from_file(path: &Path) -> CliResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            CliError::config(format!("failed to read {}: {e}", path.display()))
        })?;
        Self::parse(&content)
            .map_err(|e| CliError::config(format!("{}: {}", path.display(), config_message(e))))
    }

    /// Parses and validates configuration text.
    pub fn parse(content: &str) -> CliResult<Self> {
        let config: Config =
            toml::from_str(content).map_err(|e| CliError::config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> CliResult<()> {
        if self.taxpayers.is_empty() {
            return Err(CliError::config("no [taxpayers.<NAME>] section configured"));
        }
        if self.client.program.trim().is_empty() {
            return Err(CliError::config("[client] program is empty"));
        }
        for (name, section) in &self.taxpayers {
            section.resolve(name, Environment::Production)?;
        }
        Ok(())
    }

    /// Configured taxpayer names, sorted.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.taxpayers.keys().map(String::as_str)
    }

    /// Builds the taxpayer named `name`.
    ///
    /// `environment` overrides the configured one when given.
    pub fn taxpayer(&self, name: &str, environment: Option<Environment>) -> CliResult<Taxpayer> {
        let section = self
            .taxpayers
            .get(name)
            .ok_or_else(|| CliError::UnknownTaxpayer {
                name: name.to_string(),
                available: self.names().collect::<Vec<_>>().join(", "),
            })?;
        let default = Environment::from_homologation(section.homologation);
        section.resolve(name, environment.unwrap_or(default))
    }

    /// Builds every configured taxpayer, in name order.
    pub fn all_taxpayers(&self, environment: Option<Environment>) -> CliResult<Vec<Taxpayer>> {
        self.names()
            .map(|name| self.taxpayer(name, environment))
            .collect()
    }

    /// The client invocation.
    pub fn client_command(&self) -> ClientCommand {
        ClientCommand::new(&self.client.program).with_args(self.client.args.iter().cloned())
    }
}

impl TaxpayerConfig {
    fn resolve(&self, name: &str, environment: Environment) -> CliResult<Taxpayer> {
        let id = TaxpayerId::parse(&self.cnpj)
            .map_err(|e| CliError::config(format!("[taxpayers.{name}]: {e}")))?;
        let uf = self.uf.trim().to_lowercase();
        if !UF_CODES.iter().any(|(_, known)| *known == uf) {
            return Err(CliError::config(format!(
                "[taxpayers.{name}]: unknown uf '{}'",
                self.uf
            )));
        }
        Ok(Taxpayer::new(name, id, uf, environment))
    }
}

fn config_message(err: CliError) -> String {
    match err {
        CliError::Config(message) => message,
        other => other.to_string(),
    }
}
