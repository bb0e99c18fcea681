//! Durable quota records, one JSON file per category.

use std::fs;
use std::io;
use std::path::PathBuf;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Persisted consumption counters for one rate-limit category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuotaRecord {
    /// Category key this record belongs to.
    pub category: String,
    /// Local calendar day the count applies to.
    pub day: NaiveDate,
    /// Operations admitted on `day`.
    pub count: u32,
    /// Scheduled execution time of the most recent admitted operation.
    pub last_action_at: Option<DateTime<Utc>>,
}

impl QuotaRecord {
    /// Fresh zero record for `category` on `today`.
    pub fn fresh(category: &str, today: NaiveDate) -> Self {
        Self {
            category: category.to_string(),
            day: today,
            count: 0,
            last_action_at: None,
        }
    }
}

/// File-backed store: one JSON record per category under `dir`.
///
/// Writes go to a sibling `.tmp` file which is then renamed over the
/// final path, so a reader (including one in a freshly started
/// process) never observes a partially written record.
#[derive(Debug, Clone)]
pub struct QuotaStore {
    dir: PathBuf,
}

impl QuotaStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn record_path(&self, category: &str) -> PathBuf {
        self.dir.join(format!("{category}.json"))
    }

    /// Load the record for `category`, materializing a zeroed one when
    /// none exists. When the stored day marker is not `today` the
    /// returned record is reset in memory; the reset is only persisted
    /// by the next `save`, so a read-only status check never mutates
    /// stored state.
    ///
    /// A corrupt or unreadable record is treated as "no record": the
    /// tool stays available at the cost of the lost counter, and the
    /// reset is logged.
    pub fn load(&self, category: &str, today: NaiveDate) -> QuotaRecord {
        let path = self.record_path(category);
        let stored = match fs::read_to_string(&path) {
            Ok(raw) => match serde_json::from_str::<QuotaRecord>(&raw) {
                Ok(record) => Some(record),
                Err(e) => {
                    tracing::warn!(category, error = %e, "Corrupt quota record, resetting to zero");
                    None
                }
            },
            Err(e) if e.kind() == io::ErrorKind::NotFound => None,
            Err(e) => {
                tracing::warn!(category, error = %e, "Unreadable quota record, resetting to zero");
                None
            }
        };

        match stored {
            Some(record) if record.day == today => record,
            _ => QuotaRecord::fresh(category, today),
        }
    }

    /// Durably persist `record` with atomic replace-on-write. A `load`
    /// in a new process observes either the previous record or this
    /// one, never a torn write.
    pub fn save(&self, record: &QuotaRecord) -> io::Result<()> {
        fs::create_dir_all(&self.dir)?;
        let path = self.record_path(&record.category);
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_vec_pretty(record)?)?;
        fs::rename(&tmp, &path)
    }
}
