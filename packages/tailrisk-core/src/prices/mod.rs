//! Price retrieval and cleaning.
//!
//! A [`PriceSource`] returns raw, possibly ragged close prices. [`PriceSeriesLoader`] turns
//! them into a clean [`PriceTable`]: rows sorted by date, gaps forward-filled, incomplete rows
//! dropped, and requested symbols that never showed up reported as a notice.

mod csv_file;
mod memory;

pub use csv_file::CsvPriceSource;
pub use memory::InMemoryPriceSource;

use crate::types::{Notice, Outcome, PriceTable};
use crate::{Error, Result};
use chrono::NaiveDate;
use std::collections::{BTreeMap, BTreeSet};

/// External market-data collaborator.
///
/// Implementations own their transport, timeouts and adjustment convention. A failed
/// retrieval is returned as an error and is not retried by the loader.
pub trait PriceSource {
    /// Fetch adjusted close prices for `symbols` over `[start, end)`.
    fn fetch(&self, symbols: &[String], start: NaiveDate, end: NaiveDate) -> Result<RawPrices>;
}

impl<S: PriceSource + ?Sized> PriceSource for &S {
    fn fetch(&self, symbols: &[String], start: NaiveDate, end: NaiveDate) -> Result<RawPrices> {
        (**self).fetch(symbols, start, end)
    }
}

/// One symbol's closes aligned to [`RawPrices::dates`]. `None` marks a missing cell.
#[derive(Debug, Clone, PartialEq)]
pub struct RawColumn {
    pub symbol: String,
    pub closes: Vec<Option<f64>>,
}

/// Unvalidated price data as delivered by a source.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawPrices {
    pub dates: Vec<NaiveDate>,
    pub columns: Vec<RawColumn>,
}

impl RawPrices {
    /// Build a date-aligned table from `(date, symbol, close)` observations.
    ///
    /// Dates are the sorted union over all symbols; a later observation for the same
    /// date and symbol replaces an earlier one.
    pub fn from_observations<I, S>(observations: I) -> Self
    where
        I: IntoIterator<Item = (NaiveDate, S, Option<f64>)>,
        S: Into<String>,
    {
        let mut dates = BTreeSet::new();
        let mut order: Vec<String> = Vec::new();
        let mut by_symbol: BTreeMap<String, BTreeMap<NaiveDate, Option<f64>>> = BTreeMap::new();

        for (date, symbol, close) in observations {
            let symbol = symbol.into();
            dates.insert(date);
            if !by_symbol.contains_key(&symbol) {
                order.push(symbol.clone());
            }
            by_symbol.entry(symbol).or_default().insert(date, close);
        }

        let dates: Vec<NaiveDate> = dates.into_iter().collect();
        let columns = order
            .into_iter()
            .map(|symbol| {
                let series = &by_symbol[&symbol];
                let closes = dates
                    .iter()
                    .map(|d| series.get(d).copied().flatten())
                    .collect();
                RawColumn { symbol, closes }
            })
            .collect();

        Self { dates, columns }
    }

    /// True when the source delivered no rows or no columns.
    pub fn is_empty(&self) -> bool {
        self.dates.is_empty() || self.columns.is_empty()
    }

    /// Find a column by symbol.
    pub fn column(&self, symbol: &str) -> Option<&RawColumn> {
        self.columns.iter().find(|c| c.symbol == symbol)
    }
}

/// Propagate the last known price into following gaps.
///
/// Non-finite values count as gaps. Leading gaps stay empty.
pub fn forward_fill(closes: &[Option<f64>]) -> Vec<Option<f64>> {
    let mut last = None;
    closes
        .iter()
        .copied()
        .map(|close| {
            if let Some(price) = close.filter(|p| p.is_finite()) {
                last = Some(price);
            }
            last
        })
        .collect()
}

/// Loads clean price tables from a [`PriceSource`].
#[derive(Debug, Clone)]
pub struct PriceSeriesLoader<S> {
    source: S,
}

impl<S: PriceSource> PriceSeriesLoader<S> {
    pub fn new(source: S) -> Self {
        Self { source }
    }

    /// Get a reference to the wrapped source.
    pub fn source(&self) -> &S {
        &self.source
    }

    /// Fetch and clean prices for `symbols` over `[start, end)`.
    ///
    /// Symbols are upper-cased. Columns follow the request order (duplicates collapse to the
    /// first occurrence). Requested symbols that the source did not return produce a
    /// [`Notice::MissingSymbols`]; the table is built from the rest.
    pub fn load<T: AsRef<str>>(
        &self,
        symbols: &[T],
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Outcome<PriceTable>> {
        let mut requested: Vec<String> = Vec::with_capacity(symbols.len());
        for symbol in symbols {
            let symbol = symbol.as_ref().trim().to_uppercase();
            if !symbol.is_empty() && !requested.contains(&symbol) {
                requested.push(symbol);
            }
        }
        if requested.is_empty() {
            return Err(Error::EmptySymbols);
        }
        if start >= end {
            return Err(Error::InvalidDateRange { start, end });
        }

        let raw = self.source.fetch(&requested, start, end)?;
        tracing::debug!(
            rows = raw.dates.len(),
            columns = raw.columns.len(),
            "Fetched raw prices for {:?}",
            requested
        );
        if raw.is_empty() {
            return Err(Error::NoData { symbols: requested });
        }

        let (found, missing): (Vec<String>, Vec<String>) = requested
            .iter()
            .cloned()
            .partition(|s| raw.column(s).is_some());
        if found.is_empty() {
            return Err(Error::NoData { symbols: requested });
        }

        let mut outcome = Outcome::new(());
        if !missing.is_empty() {
            outcome.push(Notice::MissingSymbols { symbols: missing });
        }

        let table = clean(&raw, &found)?;
        tracing::debug!(
            rows = table.row_count(),
            dropped = raw.dates.len() - table.row_count(),
            "Cleaned price table"
        );
        Ok(outcome.map(|_| table))
    }
}

/// Sort rows, forward-fill each column and drop rows that still have a gap.
fn clean(raw: &RawPrices, symbols: &[String]) -> Result<PriceTable> {
    let mut columns: Vec<&RawColumn> = Vec::with_capacity(symbols.len());
    for symbol in symbols {
        let column = raw
            .column(symbol)
            .ok_or_else(|| Error::NoData {
                symbols: vec![symbol.clone()],
            })?;
        if column.closes.len() != raw.dates.len() {
            return Err(Error::Source(format!(
                "Column {} has {} closes for {} dates",
                symbol,
                column.closes.len(),
                raw.dates.len()
            )));
        }
        columns.push(column);
    }

    // Stable sort keeps source order among equal dates, so the last one wins below.
    let mut rows: Vec<usize> = (0..raw.dates.len()).collect();
    rows.sort_by_key(|&i| raw.dates[i]);
    let mut unique: Vec<usize> = Vec::with_capacity(rows.len());
    for i in rows {
        if unique.last().is_some_and(|&last| raw.dates[last] == raw.dates[i]) {
            unique.pop();
        }
        unique.push(i);
    }

    let filled: Vec<Vec<Option<f64>>> = columns
        .iter()
        .map(|c| {
            let ordered: Vec<Option<f64>> = unique.iter().map(|&i| c.closes[i]).collect();
            forward_fill(&ordered)
        })
        .collect();

    let mut dates = Vec::with_capacity(unique.len());
    let mut prices: Vec<Vec<f64>> = vec![Vec::with_capacity(unique.len()); symbols.len()];
    for (row, &i) in unique.iter().enumerate() {
        let cells: Option<Vec<f64>> = filled.iter().map(|c| c[row]).collect();
        if let Some(cells) = cells {
            dates.push(raw.dates[i]);
            for (column, price) in prices.iter_mut().zip(cells) {
                column.push(price);
            }
        }
    }

    if dates.is_empty() {
        return Err(Error::EmptyAfterCleaning {
            symbols: symbols.to_vec(),
        });
    }

    PriceTable::new(dates, symbols.to_vec(), prices)
}
