//! Persisted idempotency ledger — the durable record of which
//! (contact, step) pairs have already been delivered.
//!
//! The ledger is a plain owned value, loaded once at run start and threaded
//! explicitly through the evaluator and runner. Persistence is a full
//! rewrite after every confirmed send, so a crash loses at most the
//! in-flight send.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use drip_core::error::DripResult;
use drip_core::types::TrackingRecord;

/// Mapping from contact address to the ordered list of sends confirmed for
/// that address. Records are append-only.
#[derive(Debug, Clone, Default)]
pub struct TrackingLedger {
    entries: BTreeMap<String, Vec<TrackingRecord>>,
}

impl TrackingLedger {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Reads the ledger from disk. Never fails the run: a missing file is a
    /// first run, an unreadable or corrupt file is logged and treated as
    /// empty.
    pub fn load(path: &Path) -> Self {
        let raw = match fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!(path = %path.display(), "no tracking ledger yet, starting empty");
                return Self::empty();
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "failed to read tracking ledger, starting empty");
                return Self::empty();
            }
        };

        match serde_json::from_str::<BTreeMap<String, Vec<TrackingRecord>>>(&raw) {
            Ok(entries) => {
                let ledger = Self { entries };
                info!(
                    path = %path.display(),
                    contacts = ledger.entries.len(),
                    records = ledger.sent_count(),
                    "loaded tracking ledger"
                );
                ledger
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "tracking ledger is corrupt, starting empty");
                Self::empty()
            }
        }
    }

    /// True iff a record exists for this exact (address, step) pair.
    pub fn has_sent(&self, address: &str, step_name: &str) -> bool {
        self.entries
            .get(address)
            .map(|records| records.iter().any(|r| r.step_name == step_name))
            .unwrap_or(false)
    }

    /// Appends a record for a confirmed send.
    pub fn record(&mut self, address: &str, step_name: &str, sent_at: DateTime<Utc>) {
        self.entries
            .entry(address.to_string())
            .or_default()
            .push(TrackingRecord {
                address: address.to_string(),
                step_name: step_name.to_string(),
                sent_at,
            });
    }

    /// Writes the full ledger to disk, creating the parent directory if
    /// missing. Writes a sibling temp file first and renames it over the
    /// target, so a failure mid-write leaves the previous state readable.
    pub fn persist(&self, path: &Path) -> DripResult<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let tmp = path.with_extension("json.tmp");
        let raw = serde_json::to_string_pretty(&self.entries)?;
        fs::write(&tmp, raw)?;
        fs::rename(&tmp, path)?;
        Ok(())
    }

    /// Appends a record and immediately flushes the ledger.
    ///
    /// A flush failure does not fail the run: the send already happened, so
    /// the in-memory record is kept and the durability gap is logged as a
    /// duplicate-delivery risk for the next invocation.
    pub fn record_and_persist(
        &mut self,
        path: &Path,
        address: &str,
        step_name: &str,
        sent_at: DateTime<Utc>,
    ) {
        self.record(address, step_name, sent_at);
        if let Err(e) = self.persist(path) {
            warn!(
                path = %path.display(),
                address = %address,
                step = %step_name,
                error = %e,
                "failed to persist tracking ledger; this send may be repeated on the next run"
            );
        }
    }

    /// Total number of tracking records across all contacts.
    pub fn sent_count(&self) -> usize {
        self.entries.values().map(|records| records.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Records for one address, oldest first. Empty if the address is unknown.
    pub fn records_for(&self, address: &str) -> &[TrackingRecord] {
        self.entries
            .get(address)
            .map(|records| records.as_slice())
            .unwrap_or(&[])
    }
}
