//! Tailrisk Core - Historical market-risk library.
//!
//! This crate measures realised risk for long-only equity portfolios:
//!
//! - **Price loading**: Fetch, align and clean adjusted close prices
//! - **Return aggregation**: Weighted daily portfolio returns
//! - **Risk metrics**: Historical VaR, CVaR, annualised volatility
//! - **Reporting**: Return distribution plots rendered as SVG
//!
//! # Example
//!
//! ```rust,no_run
//! use chrono::NaiveDate;
//! use tailrisk_core::prices::{InMemoryPriceSource, PriceSeriesLoader};
//! use tailrisk_core::portfolio::{aggregate, compute};
//!
//! let day = |d| NaiveDate::from_ymd_opt(2024, 1, d).unwrap();
//! let source = InMemoryPriceSource::new()
//!     .with_series("AAPL", [(day(2), 185.6), (day(3), 184.2), (day(4), 181.9)]);
//!
//! let loader = PriceSeriesLoader::new(source);
//! let prices = loader.load(&["AAPL"], day(1), day(31)).unwrap().value;
//! let returns = aggregate(&prices, None).unwrap().value;
//! let metrics = compute(returns.values(), 0.95).unwrap();
//! println!("VaR 95%: {:.2}%", metrics.var * 100.0);
//! ```

pub mod analysis;
pub mod config;
pub mod portfolio;
pub mod prices;
pub mod report;
pub mod types;

// Re-export commonly used types
pub use types::{ApiResponse, Notice, Outcome, PriceTable, ReturnSeries, RiskMetrics};

// Re-export main functionality
pub use analysis::{measure, Comparison, PortfolioOutcome, PortfolioReport, RiskAnalyzer, RunSummary};
pub use config::{AnalysisConfig, PortfolioSpec};
pub use portfolio::{aggregate, compute, resolve_weights, simple_returns};
pub use prices::{CsvPriceSource, InMemoryPriceSource, PriceSeriesLoader, PriceSource, RawPrices};
pub use report::{DistributionReport, Histogram, ReportSink, SvgHistogramSink};

/// Error types for tailrisk-core operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Config parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    #[error("Price source error: {0}")]
    Source(String),

    #[error("No symbols requested")]
    EmptySymbols,

    #[error("Invalid date range: start {start} must be before end {end}")]
    InvalidDateRange {
        start: chrono::NaiveDate,
        end: chrono::NaiveDate,
    },

    #[error("No data returned for symbols {symbols:?}")]
    NoData { symbols: Vec<String> },

    #[error("All rows dropped after cleaning for symbols {symbols:?}")]
    EmptyAfterCleaning { symbols: Vec<String> },

    #[error("Invalid price {price} for {symbol} on {date}")]
    InvalidPrice {
        symbol: String,
        date: chrono::NaiveDate,
        price: f64,
    },

    #[error("Weight length ({weights}) does not match number of assets ({assets})")]
    WeightLengthMismatch { weights: usize, assets: usize },

    #[error("Negative weight {weight} at position {index}; only long-only portfolios are supported")]
    NegativeWeight { index: usize, weight: f64 },

    #[error("Weight {weight} at position {index} is not a finite number")]
    InvalidWeight { index: usize, weight: f64 },

    #[error("Weights sum to zero, cannot normalise")]
    ZeroWeightSum,

    #[error("Confidence level must be in (0, 1), got {0}")]
    InvalidConfidence(f64),

    #[error("Insufficient data: {0}")]
    InsufficientData(String),
}

/// Result type for tailrisk-core operations.
pub type Result<T> = std::result::Result<T, Error>;
