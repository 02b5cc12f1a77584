//! Transport that delegates each call to an external communication client.
//!
//! Signing, certificates and the SOAP wire format stay in the client. For
//! every call the configured program is run once as
//!
//! ```text
//! <program> <args..> distribution --cnpj <cnpj> --uf <uf> --environment <producao|homologacao> --nsu <n>
//! <program> <args..> distribution --cnpj <cnpj> --uf <uf> --environment <producao|homologacao> --key <key>
//! ```
//!
//! and its standard output is taken as the response body.

use crate::error::{SyncError, SyncResult};
use crate::transport::DistributionTransport;
use nfesync_protocol::{AccessKey, Taxpayer};
use std::process::Command;
use tracing::debug;

/// Program and leading arguments of the communication client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientCommand {
    /// Executable to run.
    pub program: String,
    /// Arguments placed before the per-call arguments.
    pub args: Vec<String>,
}

impl ClientCommand {
    /// Creates a client command.
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    /// Appends leading arguments.
    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }
}

/// [`DistributionTransport`] backed by a subprocess.
#[derive(Debug, Clone)]
pub struct CommandTransport {
    client: ClientCommand,
}

impl CommandTransport {
    /// Creates a transport running `client`.
    pub fn new(client: ClientCommand) -> Self {
        Self { client }
    }

    /// Returns the client command.
    pub fn client(&self) -> &ClientCommand {
        &self.client
    }

    fn call_args(taxpayer: &Taxpayer, uf: &str, selector: [String; 2]) -> Vec<String> {
        let mut args = vec![
            "distribution".to_string(),
            "--cnpj".to_string(),
            taxpayer.id.to_string(),
            "--uf".to_string(),
            uf.to_string(),
            "--environment".to_string(),
            taxpayer.environment.state_key().to_string(),
        ];
        args.extend(selector);
        args
    }

    fn run(&self, call_args: Vec<String>) -> SyncResult<Vec<u8>> {
        debug!(program = %self.client.program, args = ?call_args, "running communication client");
        let output = Command::new(&self.client.program)
            .args(&self.client.args)
            .args(&call_args)
            .output()
            .map_err(|e| {
                SyncError::transport_fatal(format!(
                    "failed to execute {}: {e}",
                    self.client.program
                ))
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(SyncError::transport_retryable(format!(
                "{} exited with {}: {}",
                self.client.program,
                output.status,
                stderr.trim()
            )));
        }
        if output.stdout.iter().all(u8::is_ascii_whitespace) {
            return Err(SyncError::transport_retryable(format!(
                "{} returned an empty response",
                self.client.program
            )));
        }
        Ok(output.stdout)
    }
}

impl DistributionTransport for CommandTransport {
    fn fetch(&self, taxpayer: &Taxpayer, sequence: u64) -> SyncResult<Vec<u8>> {
        let args = Self::call_args(
            taxpayer,
            &taxpayer.uf,
            ["--nsu".to_string(), sequence.to_string()],
        );
        self.run(args)
    }

    fn fetch_by_key(&self, taxpayer: &Taxpayer, key: &AccessKey, uf: &str) -> SyncResult<Vec<u8>> {
        let args = Self::call_args(taxpayer, uf, ["--key".to_string(), key.to_string()]);
        self.run(args)
    }
}
