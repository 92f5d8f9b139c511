//! Core data types for the tailrisk pipeline.

use crate::{Error, Result};
use chrono::NaiveDate;
use serde::{de, Deserialize, Deserializer, Serialize};
use std::fmt;

/// Clean, aligned table of adjusted close prices.
///
/// Rows are trading days in strictly ascending order, columns are symbols. Every cell holds a
/// finite price and there is at least one row. A single symbol is still a one-column table.
/// Deserialization goes through [`PriceTable::new`].
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PriceTable {
    dates: Vec<NaiveDate>,
    symbols: Vec<String>,
    /// Column-major prices, one vector per symbol
    columns: Vec<Vec<f64>>,
}

#[derive(Deserialize)]
struct PriceTableParts {
    dates: Vec<NaiveDate>,
    symbols: Vec<String>,
    columns: Vec<Vec<f64>>,
}

impl<'de> Deserialize<'de> for PriceTable {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let parts = PriceTableParts::deserialize(deserializer)?;
        Self::new(parts.dates, parts.symbols, parts.columns).map_err(de::Error::custom)
    }
}

impl PriceTable {
    /// Build a table, checking every invariant.
    pub fn new(dates: Vec<NaiveDate>, symbols: Vec<String>, columns: Vec<Vec<f64>>) -> Result<Self> {
        if symbols.is_empty() {
            return Err(Error::EmptySymbols);
        }
        if dates.is_empty() {
            return Err(Error::EmptyAfterCleaning { symbols });
        }
        if columns.len() != symbols.len() {
            return Err(Error::InsufficientData(format!(
                "{} price columns for {} symbols",
                columns.len(),
                symbols.len()
            )));
        }
        if dates.windows(2).any(|w| w[0] >= w[1]) {
            return Err(Error::InsufficientData(
                "Price dates must be strictly ascending".to_string(),
            ));
        }
        for (symbol, column) in symbols.iter().zip(&columns) {
            if column.len() != dates.len() {
                return Err(Error::InsufficientData(format!(
                    "Column {} has {} prices for {} dates",
                    symbol,
                    column.len(),
                    dates.len()
                )));
            }
            if let Some(idx) = column.iter().position(|p| !p.is_finite()) {
                return Err(Error::InvalidPrice {
                    symbol: symbol.clone(),
                    date: dates[idx],
                    price: column[idx],
                });
            }
        }

        Ok(Self {
            dates,
            symbols,
            columns,
        })
    }

    /// Trading days, ascending.
    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    /// Symbols in column order.
    pub fn symbols(&self) -> &[String] {
        &self.symbols
    }

    /// All price columns in symbol order.
    pub fn columns(&self) -> &[Vec<f64>] {
        &self.columns
    }

    /// Prices for one symbol.
    pub fn column(&self, symbol: &str) -> Option<&[f64]> {
        self.symbols
            .iter()
            .position(|s| s == symbol)
            .map(|idx| self.columns[idx].as_slice())
    }

    /// Number of trading days.
    pub fn row_count(&self) -> usize {
        self.dates.len()
    }

    /// Number of symbols.
    pub fn symbol_count(&self) -> usize {
        self.symbols.len()
    }

    /// Keep only the last `n` rows.
    ///
    /// `n == 0` is treated as 1 so the table never becomes empty.
    pub fn tail(&self, n: usize) -> Self {
        let keep = n.max(1).min(self.row_count());
        let start = self.row_count() - keep;
        Self {
            dates: self.dates[start..].to_vec(),
            symbols: self.symbols.clone(),
            columns: self.columns.iter().map(|c| c[start..].to_vec()).collect(),
        }
    }
}

/// Dated series of daily returns.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ReturnSeries {
    dates: Vec<NaiveDate>,
    values: Vec<f64>,
}

#[derive(Deserialize)]
struct ReturnSeriesParts {
    dates: Vec<NaiveDate>,
    values: Vec<f64>,
}

impl<'de> Deserialize<'de> for ReturnSeries {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let parts = ReturnSeriesParts::deserialize(deserializer)?;
        Self::new(parts.dates, parts.values).map_err(de::Error::custom)
    }
}

impl ReturnSeries {
    /// Create a series; dates and values must have the same length.
    pub fn new(dates: Vec<NaiveDate>, values: Vec<f64>) -> Result<Self> {
        if dates.len() != values.len() {
            return Err(Error::InsufficientData(format!(
                "{} return values for {} dates",
                values.len(),
                dates.len()
            )));
        }
        Ok(Self { dates, values })
    }

    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Iterate `(date, return)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (NaiveDate, f64)> + '_ {
        self.dates.iter().copied().zip(self.values.iter().copied())
    }
}

/// Historical risk metrics for one return series.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct RiskMetrics {
    /// Confidence level used for VaR (e.g., 0.95 for 95%)
    pub confidence_level: f64,
    /// Return at the `1 - confidence` quantile (signed, usually negative)
    pub var: f64,
    /// Mean of returns at or below VaR; NaN when that tail is empty
    pub cvar: f64,
    /// Sample standard deviation scaled by sqrt(252)
    pub annualised_volatility: f64,
    /// Number of returns the metrics were computed from
    pub sample_size: usize,
}

impl RiskMetrics {
    /// VaR expressed as a positive loss magnitude.
    pub fn var_loss(&self) -> f64 {
        self.var.abs()
    }

    /// CVaR expressed as a positive loss magnitude (NaN if undefined).
    pub fn cvar_loss(&self) -> f64 {
        self.cvar.abs()
    }

    /// Whether the CVaR tail contained at least one return.
    pub fn has_cvar(&self) -> bool {
        !self.cvar.is_nan()
    }
}

/// A non-fatal condition raised alongside a successful result.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Notice {
    /// Requested symbols absent from the source result
    MissingSymbols { symbols: Vec<String> },
    /// Weights did not sum to 1.0 and were rescaled
    WeightsNormalised { original_sum: f64, weights: Vec<f64> },
    /// Fewer trading days than the reliability threshold
    InsufficientSample {
        available: usize,
        minimum: usize,
        target: usize,
    },
    /// No return fell at or below VaR, so CVaR is undefined
    UndefinedTail { var: f64 },
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Notice::MissingSymbols { symbols } => write!(
                f,
                "The following symbols were not found in the returned data: {}",
                symbols.join(", ")
            ),
            Notice::WeightsNormalised { original_sum, .. } => {
                write!(f, "Weights sum to {}, not 1.0; normalised", original_sum)
            }
            Notice::InsufficientSample {
                available,
                minimum,
                target,
            } => write!(
                f,
                "Only {} of {} targeted trading days available (minimum {}); results may be less reliable",
                available, target, minimum
            ),
            Notice::UndefinedTail { var } => {
                write!(f, "No returns at or below VaR {}; CVaR is undefined", var)
            }
        }
    }
}

/// A computed value together with the notices raised while producing it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Outcome<T> {
    pub value: T,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub notices: Vec<Notice>,
}

impl<T> Outcome<T> {
    /// Wrap a value with no notices.
    pub fn new(value: T) -> Self {
        Self {
            value,
            notices: Vec::new(),
        }
    }

    /// Wrap a value with notices already collected elsewhere.
    pub fn with_notices(value: T, notices: Vec<Notice>) -> Self {
        Self { value, notices }
    }

    /// Record a notice and log it.
    pub fn push(&mut self, notice: Notice) {
        tracing::warn!("{}", notice);
        self.notices.push(notice);
    }

    pub fn has_notices(&self) -> bool {
        !self.notices.is_empty()
    }

    /// Transform the value, keeping the notices.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Outcome<U> {
        Outcome {
            value: f(self.value),
            notices: self.notices,
        }
    }

    pub fn into_parts(self) -> (T, Vec<Notice>) {
        (self.value, self.notices)
    }
}

/// API response wrapper used by the CLI.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    /// Create a successful response.
    pub fn ok(data: T) -> Self {
        Self {
            ok: true,
            data: Some(data),
            error: None,
        }
    }

    /// Create an error response.
    pub fn err(error: impl Into<String>) -> Self {
        Self {
            ok: false,
            data: None,
            error: Some(error.into()),
        }
    }
}
