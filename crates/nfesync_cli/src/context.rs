//! Everything a command needs, resolved once per invocation.

use crate::audit::AuditLog;
use crate::config::Config;
use crate::error::CliResult;
use nfesync_engine::{Clock, CommandTransport, DistributionTransport, SyncConfig, SyncEngine, SystemClock};
use nfesync_protocol::{Environment, Taxpayer};
use nfesync_storage::{DocumentStore, StateFile};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Path overrides from flags or environment variables.
#[derive(Debug, Clone, Default)]
pub struct PathOverrides {
    /// Replaces `[paths] state_file`.
    pub state_file: Option<PathBuf>,
    /// Replaces `[paths] log_dir`.
    pub log_dir: Option<PathBuf>,
}

/// Configuration, engine and stores for one invocation.
pub struct Context<T: DistributionTransport, C: Clock = SystemClock> {
    /// Loaded configuration.
    pub config: Config,
    /// Engine wired to the configured stores.
    pub engine: SyncEngine<T, C>,
    /// Shared state file.
    pub state_file: StateFile,
    /// Audit log of raw responses.
    pub audit: AuditLog,
    /// Environment forced on the command line.
    pub environment: Option<Environment>,
}

impl Context<CommandTransport> {
    /// Loads `config_path` and wires the subprocess transport.
    pub fn load(
        config_path: &Path,
        overrides: PathOverrides,
        environment: Option<Environment>,
    ) -> CliResult<Self> {
        let mut config = Config::from_file(config_path)?;
        if let Some(state_file) = overrides.state_file {
            config.paths.state_file = state_file;
        }
        if let Some(log_dir) = overrides.log_dir {
            config.paths.log_dir = log_dir;
        }
        debug!(config = %config_path.display(), paths = ?config.paths, "configuration loaded");

        let transport = CommandTransport::new(config.client_command());
        let engine = SyncEngine::new(
            SyncConfig::default(),
            transport,
            DocumentStore::new(&config.paths.downloads_dir),
        );
        Ok(Self::assemble(config, engine, environment))
    }
}

impl<T: DistributionTransport, C: Clock> Context<T, C> {
    /// Wires an existing engine to the state file and audit log named in `config`.
    pub fn assemble(
        config: Config,
        engine: SyncEngine<T, C>,
        environment: Option<Environment>,
    ) -> Self {
        let state_file = StateFile::new(&config.paths.state_file);
        let audit = AuditLog::new(&config.paths.log_dir, config.audit.retention_days);
        Self {
            engine: engine.with_state_file(state_file.clone()),
            state_file,
            audit,
            config,
            environment,
        }
    }

    /// The document store.
    pub fn store(&self) -> &DocumentStore {
        self.engine.store()
    }

    /// Resolves a configured taxpayer.
    pub fn taxpayer(&self, name: &str) -> CliResult<Taxpayer> {
        self.config.taxpayer(name, self.environment)
    }

    /// Resolves every configured taxpayer.
    pub fn taxpayers(&self) -> CliResult<Vec<Taxpayer>> {
        self.config.all_taxpayers(self.environment)
    }

    /// Saves a raw response to the audit log.
    ///
    /// Failures are logged and yield `None`; they never fail the command.
    pub fn save_response(&self, operation: &str, reference: &str, content: &str) -> Option<PathBuf> {
        match self
            .audit
            .write(self.engine.clock(), operation, reference, content)
        {
            Ok(path) => Some(path),
            Err(e) => {
                warn!(operation, reference, error = %e, "failed to save response");
                None
            }
        }
    }
}
