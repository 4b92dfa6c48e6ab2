use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, instrument, warn};

use crate::github::PrKey;

/// How long an announced review stays in the ledger.
pub const RETENTION_DAYS: i64 = 7;

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("Failed to write ledger file: {0}")]
    Write(#[from] std::io::Error),

    #[error("Failed to serialize ledger: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Ledger key of a review: `owner/repo#number:reviewId`.
pub fn review_key(pr: &PrKey, review_id: u64) -> String {
    format!("{}:{}", pr, review_id)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub key: String,
    pub notified_at: DateTime<Utc>,
}

/// Reviews already announced, persisted between runs.
///
/// Append-only: `record` never deduplicates, `prune` is the only cleanup.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ledger {
    #[serde(default)]
    pub notified_reviews: Vec<LedgerEntry>,
}

impl Ledger {
    /// Drop entries notified more than [`RETENTION_DAYS`] before `now`.
    /// Returns how many were dropped.
    pub fn prune(&mut self, now: DateTime<Utc>) -> usize {
        let oldest = now - Duration::days(RETENTION_DAYS);
        let before = self.notified_reviews.len();
        self.notified_reviews.retain(|e| e.notified_at >= oldest);
        before - self.notified_reviews.len()
    }

    pub fn record<I>(&mut self, keys: I, now: DateTime<Utc>)
    where
        I: IntoIterator<Item = String>,
    {
        self.notified_reviews
            .extend(keys.into_iter().map(|key| LedgerEntry { key, notified_at: now }));
    }

    pub fn keys(&self) -> HashSet<String> {
        self.notified_reviews.iter().map(|e| e.key.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.notified_reviews.len()
    }
}

/// JSON file holding the [`Ledger`]. Read once at start, written once at end.
#[derive(Debug, Clone)]
pub struct LedgerStore {
    path: PathBuf,
}

impl LedgerStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the ledger. A missing or unreadable file is an empty ledger.
    #[instrument(skip(self), fields(path = %self.path.display()))]
    pub fn load(&self) -> Ledger {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("no ledger file yet");
                return Ledger::default();
            }
            Err(e) => {
                warn!(error = %e, "could not read ledger, starting empty");
                return Ledger::default();
            }
        };

        match serde_json::from_str::<Ledger>(&contents) {
            Ok(ledger) => {
                debug!(entries = ledger.len(), "loaded ledger");
                ledger
            }
            Err(e) => {
                warn!(error = %e, "ledger is corrupt, starting empty");
                Ledger::default()
            }
        }
    }

    /// Replace the file with `ledger`, via a temp file and rename.
    #[instrument(skip(self, ledger), fields(path = %self.path.display(), entries = ledger.len()))]
    pub fn save(&self, ledger: &Ledger) -> Result<(), LedgerError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(ledger)?;
        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, json)?;
        fs::rename(&tmp, &self.path)?;
        debug!("saved ledger");
        Ok(())
    }
}
