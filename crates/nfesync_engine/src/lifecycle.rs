//! Stored-document transitions when the Authority reports a cancellation.

use nfesync_protocol::{AccessKey, DocumentKind, TaxpayerId};
use nfesync_storage::{DocumentStore, StorageResult};
use std::path::PathBuf;
use tracing::{info, warn};

/// What happened to the stored copy of a canceled document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CancellationOutcome {
    /// Only the summary was stored; it was deleted.
    SummaryRemoved,
    /// The stored document was kept under a `-cancelada` name.
    Renamed(PathBuf),
    /// Nothing was stored under the key.
    NotStored,
}

/// The filed cancellation record and the transition applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CancellationRecord {
    /// Path of `<key>-cancelamento.xml`.
    pub record: PathBuf,
    /// The transition, or `None` if it failed (already logged).
    pub outcome: Option<CancellationOutcome>,
}

/// Applies the cancellation transition to the document stored as `<key>.xml`.
///
/// A summary is deleted. Anything else, including a file whose root tag
/// cannot be read, is renamed to `<key>-cancelada.xml`.
pub fn apply_cancellation(
    store: &DocumentStore,
    id: &TaxpayerId,
    key: &AccessKey,
) -> StorageResult<CancellationOutcome> {
    let file_name = format!("{key}.xml");
    if !store.exists(id, &file_name) {
        return Ok(CancellationOutcome::NotStored);
    }

    let kind = store
        .root_tag(id, &file_name)
        .map(|tag| DocumentKind::from_root_tag(&tag));
    if kind == Some(DocumentKind::Summary) {
        store.remove(id, &file_name)?;
        info!(taxpayer = %id, key = %key, "summary of canceled document removed");
        return Ok(CancellationOutcome::SummaryRemoved);
    }

    let path = store.rename(id, &file_name, &format!("{key}-cancelada.xml"))?;
    info!(taxpayer = %id, key = %key, path = %path.display(), "canceled document renamed");
    Ok(CancellationOutcome::Renamed(path))
}

/// Files the cancellation response and applies [`apply_cancellation`].
///
/// Failing to write the record is an error; a failed transition is logged
/// and reported as `outcome: None`.
pub fn record_cancellation(
    store: &DocumentStore,
    id: &TaxpayerId,
    key: &AccessKey,
    response: &str,
) -> StorageResult<CancellationRecord> {
    let record = store.save(id, &format!("{key}-cancelamento.xml"), response)?;
    let outcome = match apply_cancellation(store, id, key) {
        Ok(outcome) => Some(outcome),
        Err(err) => {
            warn!(taxpayer = %id, key = %key, error = %err, "cancellation transition failed");
            None
        }
    };
    Ok(CancellationRecord { record, outcome })
}
