//! The synchronization loop.

use crate::clock::{Clock, SystemClock};
use crate::config::SyncConfig;
use crate::error::{SyncError, SyncResult};
use crate::report::{CooldownBlock, KeyLookup, SyncOutcome, SyncProgress, SyncReport, SyncedDocument};
use crate::retry::retry_with_sleep;
use crate::transport::DistributionTransport;
use nfesync_protocol::{classify, AccessKey, DistributionResponse, Document, DocumentKind, FeedEntry, Taxpayer, TaxpayerId};
use nfesync_storage::{DocumentStore, StateFile, SyncState};
use std::thread;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Drives the distribution feed for one deployment.
///
/// The engine owns no state between runs: callers load a [`SyncState`], hand
/// it to [`SyncEngine::sync`] and the engine flushes it to the configured
/// [`StateFile`] at checkpoints. Runs for the same taxpayer and environment
/// must not overlap.
pub struct SyncEngine<T: DistributionTransport, C: Clock = SystemClock> {
    config: SyncConfig,
    transport: T,
    store: DocumentStore,
    state_file: Option<StateFile>,
    clock: C,
    sleep: fn(Duration),
}

impl<T: DistributionTransport> SyncEngine<T> {
    /// Creates an engine using the system clock and no state file.
    pub fn new(config: SyncConfig, transport: T, store: DocumentStore) -> Self {
        Self {
            config,
            transport,
            store,
            state_file: None,
            clock: SystemClock,
            sleep: thread::sleep,
        }
    }
}

impl<T: DistributionTransport, C: Clock> SyncEngine<T, C> {
    /// Persists state to `state_file` at checkpoints and at run end.
    pub fn with_state_file(mut self, state_file: StateFile) -> Self {
        self.state_file = Some(state_file);
        self
    }

    /// Replaces the clock.
    pub fn with_clock<C2: Clock>(self, clock: C2) -> SyncEngine<T, C2> {
        SyncEngine {
            config: self.config,
            transport: self.transport,
            store: self.store,
            state_file: self.state_file,
            clock,
            sleep: self.sleep,
        }
    }

    /// Replaces the function used to wait between retries.
    pub fn with_sleep(mut self, sleep: fn(Duration)) -> Self {
        self.sleep = sleep;
        self
    }

    /// Returns the configuration.
    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Returns the transport.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Returns the document store.
    pub fn store(&self) -> &DocumentStore {
        &self.store
    }

    /// Returns the clock.
    pub fn clock(&self) -> &C {
        &self.clock
    }

    /// Returns the active cooldown, if any.
    pub fn cooldown(&self, taxpayer: &Taxpayer, state: &SyncState) -> Option<CooldownBlock> {
        let until = state.cooldown_until(&taxpayer.id, taxpayer.environment)?;
        let now = self.clock.now();
        (now < until).then(|| CooldownBlock {
            until,
            remaining: until - now,
        })
    }

    /// Runs the feed loop for one taxpayer.
    ///
    /// Starts from `start_sequence` if given, else from the persisted
    /// position. `on_progress` is called after every page with documents.
    ///
    /// # Errors
    ///
    /// A remote call that still fails after all retries, an unparsable
    /// response, or a failed document or state write ends the run with
    /// [`SyncError::Interrupted`], carrying everything gathered so far.
    pub fn sync<P>(
        &self,
        taxpayer: &Taxpayer,
        state: &mut SyncState,
        start_sequence: Option<u64>,
        mut on_progress: P,
    ) -> SyncResult<SyncOutcome>
    where
        P: FnMut(&SyncProgress),
    {
        let id = &taxpayer.id;
        let environment = taxpayer.environment;

        if let Some(block) = self.cooldown(taxpayer, state) {
            info!(taxpayer = %id, %environment, until = %block.until, "cooldown active, not polling");
            return Ok(SyncOutcome::Blocked(block));
        }

        let start = start_sequence.unwrap_or_else(|| state.last_sequence(id, environment));
        info!(taxpayer = %id, %environment, start, "starting distribution sync");

        let mut report = SyncReport::new(start);
        let mut position = start;

        loop {
            let page = report.pages + 1;
            let body = match self.fetch_with_retry(|| self.transport.fetch(taxpayer, position)) {
                Ok(body) => body,
                Err(err) => return Err(self.interrupt(id, state, report, err)),
            };
            let response = match DistributionResponse::parse(&body, position) {
                Ok(response) => response,
                Err(err) => return Err(self.interrupt(id, state, report, err.into())),
            };

            report.pages = page;
            report.status = response.status.clone();
            report.message = response.message.clone();
            report.last_sequence = response.last_sequence;
            report.max_sequence = response.max_sequence;
            report.responses.push(response.raw.clone());

            debug!(
                taxpayer = %id,
                page,
                status = response.status_code().unwrap_or("-"),
                last_sequence = response.last_sequence,
                max_sequence = response.max_sequence,
                entries = response.entries.len(),
                "page received"
            );

            if !response.has_documents() {
                break;
            }

            if let Err(err) = self.store_entries(id, &response.entries, &mut report.documents) {
                return Err(self.interrupt(id, state, report, err));
            }

            position = response.last_sequence;
            state.advance_last_sequence(id, environment, position);

            let drained = position >= response.max_sequence;
            if page % self.config.checkpoint_interval() == 0 || drained {
                if let Err(err) = self.checkpoint(state) {
                    return Err(self.interrupt(id, state, report, err));
                }
            }

            on_progress(&SyncProgress {
                page,
                documents: report.documents.len(),
                last_sequence: position,
                max_sequence: response.max_sequence,
            });

            if drained {
                break;
            }
        }

        let ended_on_documents = report
            .status
            .as_ref()
            .is_some_and(|s| s.is_documents_found());
        if !ended_on_documents {
            let until = self.clock.now() + self.config.cooldown;
            state.set_cooldown_until(id, environment, until);
            report.cooldown_until = Some(until);
            info!(
                taxpayer = %id,
                status = report.status_code().unwrap_or("-"),
                %until,
                "cooldown armed"
            );
            if let Err(err) = self.checkpoint(state) {
                return Err(self.interrupt(id, state, report, err));
            }
        }

        info!(
            taxpayer = %id,
            pages = report.pages,
            documents = report.documents.len(),
            failed = report.failed_count(),
            last_sequence = report.last_sequence,
            max_sequence = report.max_sequence,
            success = report.is_success(),
            "distribution sync finished"
        );
        Ok(SyncOutcome::Completed(report))
    }

    /// Looks up one document by access key.
    ///
    /// Neither the sequence nor the cooldown is touched. Documents returned
    /// with `138` are stored; with `653` the raw response is kept as the
    /// cancellation record for the caller to file.
    pub fn fetch_by_key(&self, taxpayer: &Taxpayer, key: &AccessKey) -> SyncResult<KeyLookup> {
        let uf = key.issuer_uf().unwrap_or(taxpayer.uf.as_str());
        info!(taxpayer = %taxpayer.id, key = %key, uf, "looking up document by key");

        let body = self.fetch_with_retry(|| self.transport.fetch_by_key(taxpayer, key, uf))?;
        let response = DistributionResponse::parse(&body, 0)?;

        let mut documents = Vec::new();
        if response.has_documents() {
            self.store_entries(&taxpayer.id, &response.entries, &mut documents)?;
        }
        let cancellation = response.is_canceled().then(|| response.raw.clone());

        Ok(KeyLookup {
            status: response.status,
            message: response.message,
            documents,
            response: response.raw,
            cancellation,
        })
    }

    fn fetch_with_retry<F>(&self, operation: F) -> SyncResult<Vec<u8>>
    where
        F: FnMut() -> SyncResult<Vec<u8>>,
    {
        retry_with_sleep(&self.config.retry, self.sleep, operation)
    }

    /// Classifies and stores every entry, in feed order.
    fn store_entries(
        &self,
        id: &TaxpayerId,
        entries: &[FeedEntry],
        out: &mut Vec<SyncedDocument>,
    ) -> SyncResult<()> {
        for entry in entries {
            match classify(entry) {
                Document::Decoded(document) => {
                    let file_name = document.file_name();
                    let replaced_summary = document.kind() == DocumentKind::Complete
                        && self.store.kind(id, &file_name) == Some(DocumentKind::Summary);
                    let path = self.store.save(id, &file_name, &document.content)?;
                    out.push(SyncedDocument::Stored {
                        document,
                        path,
                        replaced_summary,
                    });
                }
                Document::Failed(failed) => out.push(SyncedDocument::Failed(failed)),
            }
        }
        Ok(())
    }

    fn checkpoint(&self, state: &SyncState) -> SyncResult<()> {
        if let Some(file) = &self.state_file {
            file.save(state)?;
            debug!(path = %file.path().display(), "checkpoint written");
        }
        Ok(())
    }

    /// Wraps a fatal error with the partial report, flushing what was consumed.
    fn interrupt(
        &self,
        id: &TaxpayerId,
        state: &SyncState,
        report: SyncReport,
        source: SyncError,
    ) -> SyncError {
        warn!(taxpayer = %id, pages = report.pages, error = %source, "sync interrupted");
        if let Err(err) = self.checkpoint(state) {
            warn!(error = %err, "failed to save state after interruption");
        }
        SyncError::Interrupted {
            partial: Box::new(report),
            source: Box::new(source),
        }
    }
}
