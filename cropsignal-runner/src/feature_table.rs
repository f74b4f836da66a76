//! Feature table loading — one CSV row per date.
//!
//! Required columns: `date` and `close`. `high` and `low` are optional; when
//! either is absent the engine falls back to the close-only range estimate.
//! Every other column is a candidate feature, selected later by the frozen
//! feature names of a model bundle.
//!
//! Empty cells, `nan`, and non-finite numbers load as NaN. Text in a column is
//! tolerated until that column is selected as a model input.

use std::io;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use cropsignal_core::domain::{to_missing_policy, FeatureRow, FeatureWindow, WindowError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TableError {
    #[error("failed to read feature table {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("malformed feature table: {0}")]
    Csv(#[from] csv::Error),

    #[error("feature table is missing required column '{column}'")]
    MissingColumn { column: String },

    #[error("row {row}: cannot parse date '{value}'")]
    BadDate { row: usize, value: String },

    #[error("duplicate date {date} in feature table")]
    DuplicateDate { date: NaiveDate },

    #[error("column '{column}' holds non-numeric text at row {row}")]
    NonNumeric { column: String, row: usize },

    #[error("feature table has no rows")]
    Empty,

    #[error("no row dated {date} in feature table")]
    UnknownDate { date: NaiveDate },

    #[error(transparent)]
    Window(#[from] WindowError),
}

/// Parse a `date` cell. Accepts `YYYY-MM-DD` with an optional time suffix.
pub fn parse_date(value: &str) -> Option<NaiveDate> {
    let v = value.trim();
    let day = match v.char_indices().nth(10) {
        Some((i, ' ' | 'T')) => &v[..i],
        _ => v,
    };
    NaiveDate::parse_from_str(day, "%Y-%m-%d").ok()
}

/// Parse a numeric cell; `Err(())` for text that is not a number.
fn parse_cell(value: &str) -> Result<f64, ()> {
    let v = value.trim();
    if v.is_empty() || v.eq_ignore_ascii_case("nan") || v.eq_ignore_ascii_case("na") {
        return Ok(f64::NAN);
    }
    v.parse::<f64>().map(to_missing_policy).map_err(|_| ())
}

/// A fully loaded feature table, sorted by date.
#[derive(Debug, Clone)]
pub struct FeatureTable {
    path: Option<PathBuf>,
    columns: Vec<String>,
    dates: Vec<NaiveDate>,
    /// Column-major values aligned to `columns`.
    data: Vec<Vec<f64>>,
    /// First row holding text, per column.
    first_text_row: Vec<Option<usize>>,
    close: usize,
    high: Option<usize>,
    low: Option<usize>,
}

impl FeatureTable {
    pub fn load(path: &Path) -> Result<Self, TableError> {
        let file = std::fs::File::open(path).map_err(|source| TableError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut table = Self::from_reader(file)?;
        table.path = Some(path.to_path_buf());
        Ok(table)
    }

    pub fn from_reader<R: io::Read>(reader: R) -> Result<Self, TableError> {
        let mut rdr = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
        let headers = rdr.headers()?.clone();

        let date_idx = headers
            .iter()
            .position(|h| h == "date")
            .ok_or_else(|| TableError::MissingColumn {
                column: "date".into(),
            })?;
        let columns: Vec<String> = headers
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != date_idx)
            .map(|(_, h)| h.to_string())
            .collect();

        let mut rows: Vec<(NaiveDate, Vec<f64>, Vec<bool>)> = Vec::new();
        for (row, record) in rdr.records().enumerate() {
            let record = record?;
            let raw_date = record.get(date_idx).unwrap_or("");
            let date = parse_date(raw_date).ok_or_else(|| TableError::BadDate {
                row,
                value: raw_date.to_string(),
            })?;
            let mut values = Vec::with_capacity(columns.len());
            let mut text = Vec::with_capacity(columns.len());
            for (i, cell) in record.iter().enumerate() {
                if i == date_idx {
                    continue;
                }
                match parse_cell(cell) {
                    Ok(v) => {
                        values.push(v);
                        text.push(false);
                    }
                    Err(()) => {
                        values.push(f64::NAN);
                        text.push(true);
                    }
                }
            }
            rows.push((date, values, text));
        }

        if rows.is_empty() {
            return Err(TableError::Empty);
        }
        rows.sort_by_key(|(d, _, _)| *d);
        if let Some(pair) = rows.windows(2).find(|p| p[0].0 == p[1].0) {
            return Err(TableError::DuplicateDate { date: pair[0].0 });
        }

        let mut data = vec![Vec::with_capacity(rows.len()); columns.len()];
        let mut first_text_row = vec![None; columns.len()];
        let mut dates = Vec::with_capacity(rows.len());
        for (r, (date, values, text)) in rows.into_iter().enumerate() {
            dates.push(date);
            for (c, v) in values.into_iter().enumerate() {
                data[c].push(v);
                if text[c] && first_text_row[c].is_none() {
                    first_text_row[c] = Some(r);
                }
            }
        }

        let find = |name: &str| columns.iter().position(|c| c == name);
        let close = find("close").ok_or_else(|| TableError::MissingColumn {
            column: "close".into(),
        })?;
        if let Some(row) = first_text_row[close] {
            return Err(TableError::NonNumeric {
                column: "close".into(),
                row,
            });
        }
        let high = find("high");
        let low = find("low");

        Ok(Self {
            path: None,
            columns,
            dates,
            data,
            first_text_row,
            close,
            high,
            low,
        })
    }

    /// Source file, when loaded from disk.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    /// All non-date column names, in file order.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.dates.last().copied()
    }

    pub fn close_at(&self, index: usize) -> f64 {
        self.data[self.close][index]
    }

    /// True when both `high` and `low` columns exist.
    pub fn has_range(&self) -> bool {
        self.high.is_some() && self.low.is_some()
    }

    /// Row index of `date`.
    pub fn index_of(&self, date: NaiveDate) -> Result<usize, TableError> {
        self.dates
            .binary_search(&date)
            .map_err(|_| TableError::UnknownDate { date })
    }

    fn column_index(&self, name: &str) -> Result<usize, TableError> {
        let c = self
            .columns
            .iter()
            .position(|col| col == name)
            .ok_or_else(|| TableError::MissingColumn {
                column: name.to_string(),
            })?;
        if let Some(row) = self.first_text_row[c] {
            return Err(TableError::NonNumeric {
                column: name.to_string(),
                row,
            });
        }
        Ok(c)
    }

    /// The trailing `rows` rows ending at `end` (exclusive), with features
    /// selected by name in the given order.
    ///
    /// This is the only window builder: the live path and replay both use it.
    pub fn window(
        &self,
        feature_names: &[String],
        end: usize,
        rows: usize,
    ) -> Result<FeatureWindow, TableError> {
        let selected: Vec<usize> = feature_names
            .iter()
            .map(|name| self.column_index(name))
            .collect::<Result<_, _>>()?;

        let end = end.min(self.len());
        let start = end.saturating_sub(rows);
        // High/low only count as present when both columns exist.
        let range = self.high.zip(self.low);

        let window_rows = (start..end)
            .map(|i| FeatureRow {
                date: self.dates[i],
                values: selected.iter().map(|&c| self.data[c][i]).collect(),
                close: self.data[self.close][i],
                high: range.map(|(h, _)| self.data[h][i]),
                low: range.map(|(_, l)| self.data[l][i]),
            })
            .collect();

        Ok(FeatureWindow::new(feature_names.to_vec(), window_rows)?)
    }

    /// Window whose evaluation row is the most recent date.
    pub fn latest_window(
        &self,
        feature_names: &[String],
        rows: usize,
    ) -> Result<FeatureWindow, TableError> {
        if self.is_empty() {
            return Err(TableError::Empty);
        }
        self.window(feature_names, self.len(), rows)
    }

    /// Deterministic BLAKE3 hash over dates and all column values.
    pub fn content_hash(&self) -> String {
        let mut hasher = blake3::Hasher::new();
        for name in &self.columns {
            hasher.update(name.as_bytes());
        }
        for (i, date) in self.dates.iter().enumerate() {
            hasher.update(date.to_string().as_bytes());
            for col in &self.data {
                hasher.update(&col[i].to_le_bytes());
            }
        }
        hasher.finalize().to_hex().to_string()
    }

    /// Row counts and the most recent closes, for data verification.
    pub fn summary(&self, recent: usize) -> TableSummary {
        let start = self.len().saturating_sub(recent);
        TableSummary {
            rows: self.len(),
            columns: self.columns.len() + 1,
            first_date: self.dates.first().copied(),
            last_date: self.last_date(),
            has_range: self.has_range(),
            recent_closes: (start..self.len())
                .map(|i| (self.dates[i], self.close_at(i)))
                .collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TableSummary {
    pub rows: usize,
    /// Including `date`.
    pub columns: usize,
    pub first_date: Option<NaiveDate>,
    pub last_date: Option<NaiveDate>,
    pub has_range: bool,
    pub recent_closes: Vec<(NaiveDate, f64)>,
}
