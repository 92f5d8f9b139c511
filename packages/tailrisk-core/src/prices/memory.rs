//! In-memory price source.

use super::{PriceSource, RawPrices};
use crate::Result;
use chrono::NaiveDate;

/// Price source backed by observations held in memory.
///
/// Useful for tests and for callers that already have prices from elsewhere.
#[derive(Debug, Clone, Default)]
pub struct InMemoryPriceSource {
    observations: Vec<(NaiveDate, String, Option<f64>)>,
}

impl InMemoryPriceSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add closes for one symbol.
    pub fn with_series<I>(mut self, symbol: &str, closes: I) -> Self
    where
        I: IntoIterator<Item = (NaiveDate, f64)>,
    {
        for (date, close) in closes {
            self.insert(date, symbol, Some(close));
        }
        self
    }

    /// Add missing cells for one symbol.
    pub fn with_gaps<I>(mut self, symbol: &str, dates: I) -> Self
    where
        I: IntoIterator<Item = NaiveDate>,
    {
        for date in dates {
            self.insert(date, symbol, None);
        }
        self
    }

    /// Record a single observation. Later observations win on the same date.
    pub fn insert(&mut self, date: NaiveDate, symbol: &str, close: Option<f64>) {
        self.observations.push((date, symbol.to_uppercase(), close));
    }

    /// Number of stored observations.
    pub fn len(&self) -> usize {
        self.observations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }
}

impl PriceSource for InMemoryPriceSource {
    fn fetch(&self, symbols: &[String], start: NaiveDate, end: NaiveDate) -> Result<RawPrices> {
        Ok(RawPrices::from_observations(
            self.observations
                .iter()
                .filter(|(date, symbol, _)| {
                    *date >= start && *date < end && symbols.iter().any(|s| s == symbol)
                })
                .map(|(date, symbol, close)| (*date, symbol.clone(), *close)),
        ))
    }
}
