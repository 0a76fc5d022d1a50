//! JSON backup and restore of the blocked set.
//!
//! A snapshot is a JSON array of objects with a single `PhoneNumber` field:
//!
//! ```json
//! [{"PhoneNumber": "+15551230000"}, {"PhoneNumber": "+15559998888"}]
//! ```
//!
//! Retention windows are not part of the format. Imported numbers are always
//! blocked indefinitely.

use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};

use crate::Result;
use crate::blocklist::{BlockOutcome, BlocklistEngine, RetentionStore};
use crate::time::Clock;

/// Field name used by the interchange format.
const PHONE_NUMBER_FIELD: &str = "PhoneNumber";

/// One exported identifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotEntry {
    /// The blocked identifier.
    #[serde(rename = "PhoneNumber")]
    pub phone_number: String,
}

impl SnapshotEntry {
    /// Creates an entry.
    #[must_use]
    pub fn new(phone_number: impl Into<String>) -> Self {
        Self {
            phone_number: phone_number.into(),
        }
    }
}

/// A parsed snapshot document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DecodedSnapshot {
    /// Usable entries, in document order.
    pub entries: Vec<SnapshotEntry>,
    /// Entries dropped because they had no usable `PhoneNumber`.
    pub skipped: usize,
}

/// Outcome of an import.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportReport {
    /// Identifiers that were newly blocked.
    pub imported: usize,
    /// Identifiers that were already blocked.
    pub already_blocked: usize,
    /// Malformed entries that were skipped.
    pub skipped: usize,
}

/// Collect the currently active identifiers. Lapsed blocks are left out.
///
/// # Errors
///
/// Returns an error if the store fails.
pub async fn export_entries<S: RetentionStore, C: Clock>(
    engine: &BlocklistEngine<S, C>,
) -> Result<Vec<SnapshotEntry>> {
    Ok(engine
        .list_active()
        .await?
        .into_iter()
        .map(SnapshotEntry::new)
        .collect())
}

/// Serialize entries to the interchange format.
///
/// # Errors
///
/// Returns an error if serialization fails.
pub fn encode(entries: &[SnapshotEntry]) -> Result<String> {
    Ok(serde_json::to_string_pretty(entries)?)
}

/// Parse a snapshot document.
///
/// Elements that are not objects, lack `PhoneNumber`, or carry a blank or
/// non-string value are counted in [`DecodedSnapshot::skipped`].
///
/// # Errors
///
/// Returns an error if the document is not a JSON array.
pub fn decode(json: &str) -> Result<DecodedSnapshot> {
    let values: Vec<Value> = serde_json::from_str(json)?;
    let mut decoded = DecodedSnapshot::default();

    for (index, value) in values.iter().enumerate() {
        match value
            .get(PHONE_NUMBER_FIELD)
            .and_then(Value::as_str)
            .filter(|number| !number.trim().is_empty())
        {
            Some(number) => decoded.entries.push(SnapshotEntry::new(number)),
            None => {
                warn!("Skipping snapshot entry {index}: no usable {PHONE_NUMBER_FIELD}");
                decoded.skipped += 1;
            }
        }
    }

    Ok(decoded)
}

/// Block every entry of a decoded snapshot.
///
/// # Errors
///
/// Returns an error if the store fails. Entries processed before the failure
/// stay blocked.
pub async fn import_entries<S: RetentionStore, C: Clock>(
    engine: &BlocklistEngine<S, C>,
    snapshot: &DecodedSnapshot,
) -> Result<ImportReport> {
    let mut report = ImportReport {
        skipped: snapshot.skipped,
        ..ImportReport::default()
    };

    for entry in &snapshot.entries {
        match engine.block(&entry.phone_number).await? {
            BlockOutcome::Blocked => report.imported += 1,
            BlockOutcome::AlreadyBlocked => report.already_blocked += 1,
        }
    }

    info!(
        "Import finished: {} imported, {} already blocked, {} skipped",
        report.imported, report.already_blocked, report.skipped
    );
    Ok(report)
}

/// Write entries to a snapshot file, replacing it.
///
/// # Errors
///
/// Returns an error if serialization or the write fails.
pub async fn write_entries(path: &Path, entries: &[SnapshotEntry]) -> Result<()> {
    let contents = encode(entries)?;
    tokio::fs::write(path, contents).await?;
    info!("Exported {} blocked numbers to {}", entries.len(), path.display());
    Ok(())
}

/// Export the active set to a file. Returns how many entries were written.
///
/// # Errors
///
/// Returns an error if the store, serialization, or the write fails.
pub async fn export_to_file<S: RetentionStore, C: Clock>(
    engine: &BlocklistEngine<S, C>,
    path: &Path,
) -> Result<usize> {
    let entries = export_entries(engine).await?;
    write_entries(path, &entries).await?;
    Ok(entries.len())
}

/// Import a snapshot file.
///
/// # Errors
///
/// Returns an error if the file cannot be read, is not a JSON array, or the
/// store fails.
pub async fn import_from_file<S: RetentionStore, C: Clock>(
    engine: &BlocklistEngine<S, C>,
    path: &Path,
) -> Result<ImportReport> {
    let contents = tokio::fs::read_to_string(path).await?;
    let snapshot = decode(&contents)?;
    import_entries(engine, &snapshot).await
}
