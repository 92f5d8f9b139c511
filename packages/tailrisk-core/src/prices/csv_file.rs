//! CSV file price source.

use super::{PriceSource, RawPrices};
use crate::Result;
use chrono::NaiveDate;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// CSV record: `date,symbol,close`. An empty `close` is a missing price.
#[derive(Debug, Deserialize)]
struct PriceRecord {
    date: NaiveDate,
    symbol: String,
    close: Option<f64>,
}

/// Long-format CSV of adjusted closes, e.g. an end-of-day export.
///
/// The file is read on every fetch so edits are picked up without a restart.
#[derive(Debug, Clone)]
pub struct CsvPriceSource {
    file_path: PathBuf,
}

impl CsvPriceSource {
    pub fn new(file_path: impl AsRef<Path>) -> Self {
        Self {
            file_path: file_path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.file_path
    }
}

impl PriceSource for CsvPriceSource {
    fn fetch(&self, symbols: &[String], start: NaiveDate, end: NaiveDate) -> Result<RawPrices> {
        let mut reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_path(&self.file_path)?;

        let mut observations = Vec::new();
        for result in reader.deserialize() {
            let record: PriceRecord = result?;
            if record.date < start || record.date >= end {
                continue;
            }
            if !symbols.iter().any(|s| s.eq_ignore_ascii_case(&record.symbol)) {
                continue;
            }
            observations.push((record.date, record.symbol.to_uppercase(), record.close));
        }

        tracing::debug!(
            path = %self.file_path.display(),
            observations = observations.len(),
            "Read price file"
        );
        Ok(RawPrices::from_observations(observations))
    }
}
