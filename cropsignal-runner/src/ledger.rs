//! Signal ledger — keyed CSV persistence of emitted signals.
//!
//! One row per (date, commodity, variant). Re-running generation for a date
//! already recorded replaces that row instead of appending a duplicate. The
//! file is rewritten whole through a temporary sibling and a rename, so a
//! reader never sees a half-written ledger.
//!
//! The ledger is single-writer: mutation goes through `&mut self`, and
//! concurrent processes must serialize externally.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use cropsignal_core::domain::{Action, Signal};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("ledger I/O on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("malformed ledger {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
}

/// Composite ledger key.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LedgerKey {
    pub date: NaiveDate,
    pub commodity: String,
    pub variant: String,
}

/// One ledger row. Column order is the file's column order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerRecord {
    pub date: NaiveDate,
    pub commodity: String,
    pub variant: String,
    pub action: Action,
    pub confidence: f64,
    pub prediction: f64,
    pub percentile: f64,
    pub entry_price: f64,
    pub stop_loss: Option<f64>,
    pub profit_target: Option<f64>,
    pub position_size_pct: f64,
    pub atr: f64,
    pub time_stop_date: Option<NaiveDate>,
}

impl LedgerRecord {
    pub fn from_signal(commodity: &str, variant: &str, s: &Signal) -> Self {
        Self {
            date: s.date,
            commodity: commodity.to_string(),
            variant: variant.to_string(),
            action: s.action,
            confidence: s.confidence,
            prediction: s.prediction,
            percentile: s.percentile,
            entry_price: s.entry_price,
            stop_loss: s.stop_loss,
            profit_target: s.profit_target,
            position_size_pct: s.position_size_pct,
            atr: s.atr,
            time_stop_date: s.time_stop_date,
        }
    }

    pub fn key(&self) -> LedgerKey {
        LedgerKey {
            date: self.date,
            commodity: self.commodity.clone(),
            variant: self.variant.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Upsert {
    Inserted,
    Replaced,
}

#[derive(Debug)]
pub struct SignalLedger {
    path: PathBuf,
    records: BTreeMap<LedgerKey, LedgerRecord>,
}

impl SignalLedger {
    /// Open the ledger at `path`; a missing file is an empty ledger.
    ///
    /// Duplicate keys in an existing file (from an older append-only ledger)
    /// collapse to the last row.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, LedgerError> {
        let path = path.into();
        let mut records = BTreeMap::new();

        if path.exists() {
            let mut rdr = csv::Reader::from_path(&path).map_err(|source| LedgerError::Csv {
                path: path.clone(),
                source,
            })?;
            for row in rdr.deserialize::<LedgerRecord>() {
                let record = row.map_err(|source| LedgerError::Csv {
                    path: path.clone(),
                    source,
                })?;
                records.insert(record.key(), record);
            }
            debug!(path = %path.display(), rows = records.len(), "opened signal ledger");
        }

        Ok(Self { path, records })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, key: &LedgerKey) -> Option<&LedgerRecord> {
        self.records.get(key)
    }

    /// Rows in key order.
    pub fn records(&self) -> impl Iterator<Item = &LedgerRecord> {
        self.records.values()
    }

    pub fn upsert(&mut self, record: LedgerRecord) -> Upsert {
        match self.records.insert(record.key(), record) {
            Some(_) => Upsert::Replaced,
            None => Upsert::Inserted,
        }
    }

    /// Write the whole ledger atomically.
    pub fn save(&self) -> Result<(), LedgerError> {
        let io_err = |source| LedgerError::Io {
            path: self.path.clone(),
            source,
        };

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(io_err)?;
        }

        let mut tmp_name = self.path.file_name().unwrap_or_default().to_os_string();
        tmp_name.push(".tmp");
        let tmp = self.path.with_file_name(tmp_name);

        let csv_err = |source| LedgerError::Csv {
            path: tmp.clone(),
            source,
        };
        let mut wtr = csv::Writer::from_path(&tmp).map_err(csv_err)?;
        for record in self.records.values() {
            wtr.serialize(record).map_err(csv_err)?;
        }
        wtr.flush().map_err(io_err)?;
        drop(wtr);

        fs::rename(&tmp, &self.path).map_err(io_err)?;
        debug!(path = %self.path.display(), rows = self.records.len(), "saved signal ledger");
        Ok(())
    }
}
