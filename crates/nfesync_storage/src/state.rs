//! Persistent synchronization state.
//!
//! One JSON file per deployment holds three maps, keyed the same way existing
//! state files are:
//!
//! ```json
//! {
//!   "nsu":       { "<cnpj>:<environment>": 1234 },
//!   "cooldown":  { "<cnpj>:<environment>": "2024-06-01T10:15:00" },
//!   "numeracao": { "<cnpj>:<series>:<environment>": 57 }
//! }
//! ```
//!
//! Cooldown timestamps are naive local (BRT) times with second precision.
//! Unknown top-level members are preserved across load and save so the file
//! stays safe to edit by hand.

use crate::error::{StorageError, StorageResult};
use crate::lock::FileLock;
use chrono::NaiveDateTime;
use nfesync_protocol::{Environment, TaxpayerId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

fn taxpayer_key(id: &TaxpayerId, environment: Environment) -> String {
    format!("{}:{}", id, environment.state_key())
}

fn numbering_key(id: &TaxpayerId, series: &str, environment: Environment) -> String {
    format!("{}:{}:{}", id, series, environment.state_key())
}

/// In-memory copy of the persisted state.
///
/// Sequence numbers only move forward through [`SyncState::advance_last_sequence`];
/// [`SyncState::reset_last_sequence`] is the single way to move one back.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SyncState {
    #[serde(rename = "nsu", default, skip_serializing_if = "BTreeMap::is_empty")]
    last_sequence: BTreeMap<String, u64>,

    #[serde(rename = "cooldown", default, skip_serializing_if = "BTreeMap::is_empty")]
    cooldown_until: BTreeMap<String, NaiveDateTime>,

    #[serde(rename = "numeracao", default, skip_serializing_if = "BTreeMap::is_empty")]
    last_document_number: BTreeMap<String, u64>,

    #[serde(flatten)]
    extra: BTreeMap<String, serde_json::Value>,
}

impl SyncState {
    /// Creates an empty state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if nothing has been recorded.
    pub fn is_empty(&self) -> bool {
        self.last_sequence.is_empty()
            && self.cooldown_until.is_empty()
            && self.last_document_number.is_empty()
            && self.extra.is_empty()
    }

    /// Last consumed sequence number, 0 if none.
    pub fn last_sequence(&self, id: &TaxpayerId, environment: Environment) -> u64 {
        self.last_sequence
            .get(&taxpayer_key(id, environment))
            .copied()
            .unwrap_or(0)
    }

    /// Records a consumed sequence number without ever moving backwards.
    ///
    /// Returns the value now stored.
    pub fn advance_last_sequence(
        &mut self,
        id: &TaxpayerId,
        environment: Environment,
        sequence: u64,
    ) -> u64 {
        let entry = self
            .last_sequence
            .entry(taxpayer_key(id, environment))
            .or_insert(0);
        *entry = (*entry).max(sequence);
        *entry
    }

    /// Resets the sequence so the next run starts from the beginning of the feed.
    pub fn reset_last_sequence(&mut self, id: &TaxpayerId, environment: Environment) {
        self.last_sequence.insert(taxpayer_key(id, environment), 0);
    }

    /// Earliest time the feed may be polled again.
    pub fn cooldown_until(&self, id: &TaxpayerId, environment: Environment) -> Option<NaiveDateTime> {
        self.cooldown_until
            .get(&taxpayer_key(id, environment))
            .copied()
    }

    /// Arms the cooldown.
    pub fn set_cooldown_until(
        &mut self,
        id: &TaxpayerId,
        environment: Environment,
        until: NaiveDateTime,
    ) {
        self.cooldown_until
            .insert(taxpayer_key(id, environment), until);
    }

    /// Removes the cooldown, returning the previous value.
    pub fn clear_cooldown(
        &mut self,
        id: &TaxpayerId,
        environment: Environment,
    ) -> Option<NaiveDateTime> {
        self.cooldown_until.remove(&taxpayer_key(id, environment))
    }

    /// Last issued document number for a series, 0 if none.
    pub fn last_document_number(
        &self,
        id: &TaxpayerId,
        series: &str,
        environment: Environment,
    ) -> u64 {
        self.last_document_number
            .get(&numbering_key(id, series, environment))
            .copied()
            .unwrap_or(0)
    }

    /// Records the last issued document number for a series.
    pub fn set_last_document_number(
        &mut self,
        id: &TaxpayerId,
        series: &str,
        environment: Environment,
        number: u64,
    ) {
        self.last_document_number
            .insert(numbering_key(id, series, environment), number);
    }
}

/// The durable state file.
///
/// `load` holds a shared lock and `save` an exclusive lock, each only for the
/// duration of the I/O, so independent processes never observe or produce a
/// partially written file. Locks block; there is no timeout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateFile {
    path: PathBuf,
}

impl StateFile {
    /// Creates a handle for the state file at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Returns the file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads the state.
    ///
    /// A missing or zero-length file yields an empty state. Any other content
    /// that does not parse is [`StorageError::CorruptState`].
    pub fn load(&self) -> StorageResult<SyncState> {
        let file = match File::open(&self.path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "no state file, starting empty");
                return Ok(SyncState::default());
            }
            Err(e) => return Err(StorageError::io(&self.path, e)),
        };

        let mut text = String::new();
        {
            let _lock = FileLock::shared(&file).map_err(|e| StorageError::io(&self.path, e))?;
            let mut reader = &file;
            reader
                .read_to_string(&mut text)
                .map_err(|e| StorageError::io(&self.path, e))?;
        }

        if text.trim().is_empty() {
            return Ok(SyncState::default());
        }

        serde_json::from_str(&text).map_err(|source| StorageError::CorruptState {
            path: self.path.clone(),
            source,
        })
    }

    /// Overwrites the file with `state`.
    ///
    /// The file is truncated and rewritten while the exclusive lock is held,
    /// so concurrent writers produce exactly one of their serializations.
    pub fn save(&self, state: &SyncState) -> StorageResult<()> {
        let mut json = serde_json::to_string_pretty(state).map_err(StorageError::Serialize)?;
        json.push('\n');

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| StorageError::io(parent, e))?;
        }

        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(&self.path)
            .map_err(|e| StorageError::io(&self.path, e))?;

        let _lock = FileLock::exclusive(&file).map_err(|e| StorageError::io(&self.path, e))?;
        let write = || -> io::Result<()> {
            let mut writer = &file;
            file.set_len(0)?;
            writer.seek(SeekFrom::Start(0))?;
            writer.write_all(json.as_bytes())?;
            file.sync_all()
        };
        write().map_err(|e| StorageError::io(&self.path, e))?;

        debug!(path = %self.path.display(), bytes = json.len(), "state saved");
        Ok(())
    }
}
