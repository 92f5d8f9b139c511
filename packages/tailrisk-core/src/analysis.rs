//! Multi-portfolio risk analysis.
//!
//! [`RiskAnalyzer`] runs the load → aggregate → compute pipeline per portfolio. A failure
//! stops only the portfolio that caused it; every result ends up in a [`RunSummary`] owned by
//! the caller.

use crate::config::{AnalysisConfig, PortfolioSpec};
use crate::portfolio::{aggregate, compute};
use crate::prices::{PriceSeriesLoader, PriceSource};
use crate::report::{DistributionReport, ReportSink};
use crate::types::{Notice, Outcome, PriceTable, ReturnSeries, RiskMetrics};
use crate::Result;
use chrono::NaiveDate;
use serde::Serialize;
use std::path::PathBuf;

/// Result of analysing one portfolio.
#[derive(Debug, Clone, Serialize)]
pub struct PortfolioReport {
    pub name: String,
    /// Symbols that made it into the price table
    pub symbols: Vec<String>,
    pub first_date: NaiveDate,
    pub last_date: NaiveDate,
    /// Trading days in the analysed window
    pub trading_days: usize,
    pub metrics: RiskMetrics,
    /// Plot written by the report sink, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plot: Option<PathBuf>,
    #[serde(skip)]
    pub returns: ReturnSeries,
}

/// Per-portfolio entry of a [`RunSummary`].
#[derive(Debug, Clone, Serialize)]
pub struct PortfolioOutcome {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report: Option<PortfolioReport>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub notices: Vec<Notice>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Set when the metrics were computed but the report sink failed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub render_error: Option<String>,
}

impl PortfolioOutcome {
    fn completed(outcome: Outcome<PortfolioReport>) -> Self {
        let (report, notices) = outcome.into_parts();
        Self {
            name: report.name.clone(),
            report: Some(report),
            notices,
            error: None,
            render_error: None,
        }
    }

    fn failed(name: &str, error: impl ToString) -> Self {
        Self {
            name: name.to_string(),
            report: None,
            notices: Vec::new(),
            error: Some(error.to_string()),
            render_error: None,
        }
    }

    pub fn is_success(&self) -> bool {
        self.report.is_some()
    }
}

/// Cross-portfolio comparison of downside risk.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Comparison {
    /// At least two portfolios completed; ordered by VaR loss magnitude, largest first
    Ranked {
        ranking: Vec<(String, f64)>,
        conclusion: String,
    },
    /// Fewer than two portfolios completed
    Skipped { available: Vec<String> },
}

/// Outcomes of a multi-portfolio run, in processing order.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunSummary {
    pub portfolios: Vec<PortfolioOutcome>,
}

impl RunSummary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, outcome: PortfolioOutcome) {
        self.portfolios.push(outcome);
    }

    /// Reports of portfolios that completed.
    pub fn successes(&self) -> impl Iterator<Item = &PortfolioReport> {
        self.portfolios.iter().filter_map(|p| p.report.as_ref())
    }

    /// `(name, error)` of portfolios that failed.
    pub fn failures(&self) -> impl Iterator<Item = (&str, &str)> {
        self.portfolios
            .iter()
            .filter_map(|p| p.error.as_deref().map(|e| (p.name.as_str(), e)))
    }

    /// `(name, error)` of completed portfolios whose report could not be rendered.
    pub fn render_failures(&self) -> impl Iterator<Item = (&str, &str)> {
        self.portfolios
            .iter()
            .filter_map(|p| p.render_error.as_deref().map(|e| (p.name.as_str(), e)))
    }

    /// Look up a portfolio outcome by name.
    pub fn get(&self, name: &str) -> Option<&PortfolioOutcome> {
        self.portfolios.iter().find(|p| p.name == name)
    }

    /// Completed portfolios ordered by VaR loss magnitude, largest first.
    ///
    /// On equal magnitudes the later-processed portfolio ranks first.
    pub fn ranking(&self) -> Vec<&PortfolioReport> {
        let mut ranked: Vec<&PortfolioReport> = self.successes().collect();
        ranked.reverse();
        ranked.sort_by(|a, b| b.metrics.var_loss().total_cmp(&a.metrics.var_loss()));
        ranked
    }

    /// Portfolio with the largest VaR loss magnitude.
    pub fn riskiest(&self) -> Option<&PortfolioReport> {
        self.ranking().into_iter().next()
    }

    /// Compare downside risk across completed portfolios.
    pub fn comparison(&self) -> Comparison {
        let ranking = self.ranking();
        if ranking.len() < 2 {
            return Comparison::Skipped {
                available: ranking.iter().map(|r| r.name.clone()).collect(),
            };
        }

        let conclusion = if ranking.len() == 2 {
            format!(
                "The {} portfolio exhibits higher downside risk compared to {}.",
                ranking[0].name, ranking[1].name
            )
        } else {
            format!(
                "The {} portfolio exhibits the highest downside risk of {} portfolios.",
                ranking[0].name,
                ranking.len()
            )
        };

        Comparison::Ranked {
            ranking: ranking
                .iter()
                .map(|r| (r.name.clone(), r.metrics.var_loss()))
                .collect(),
            conclusion,
        }
    }
}

/// Aggregate a cleaned price table into portfolio returns and compute their risk metrics.
///
/// Weight notices are kept; an empty CVaR tail adds [`Notice::UndefinedTail`].
pub fn measure(
    prices: &PriceTable,
    weights: Option<&[f64]>,
    confidence: f64,
) -> Result<Outcome<(ReturnSeries, RiskMetrics)>> {
    let (returns, notices) = aggregate(prices, weights)?.into_parts();
    let metrics = compute(returns.values(), confidence)?;

    let mut outcome = Outcome::with_notices((returns, metrics), notices);
    if !metrics.has_cvar() {
        outcome.push(Notice::UndefinedTail { var: metrics.var });
    }
    Ok(outcome)
}

/// Runs the risk pipeline for one or more portfolios.
#[derive(Debug, Clone)]
pub struct RiskAnalyzer<S> {
    loader: PriceSeriesLoader<S>,
    confidence: f64,
    lookback_days: usize,
    min_sample_days: usize,
}

impl<S: PriceSource> RiskAnalyzer<S> {
    /// Create an analyzer with the default settings.
    pub fn new(source: S) -> Self {
        Self::from_config(source, &AnalysisConfig::default())
    }

    /// Create an analyzer using the settings of `config`.
    pub fn from_config(source: S, config: &AnalysisConfig) -> Self {
        Self {
            loader: PriceSeriesLoader::new(source),
            confidence: config.confidence_level,
            lookback_days: config.lookback_days,
            min_sample_days: config.min_sample_days,
        }
    }

    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = confidence;
        self
    }

    /// Set the trading-day window and the reliability threshold.
    pub fn with_sample_window(mut self, lookback_days: usize, min_sample_days: usize) -> Self {
        self.lookback_days = lookback_days;
        self.min_sample_days = min_sample_days;
        self
    }

    pub fn confidence(&self) -> f64 {
        self.confidence
    }

    /// Analyse a single portfolio over `[start, end)`.
    pub fn analyze(
        &self,
        spec: &PortfolioSpec,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Outcome<PortfolioReport>> {
        let (table, notices) = self.loader.load(&spec.symbols, start, end)?.into_parts();
        let mut outcome = Outcome::with_notices((), notices);

        let table = table.tail(self.lookback_days);
        let trading_days = table.row_count();
        if trading_days < self.min_sample_days {
            outcome.push(Notice::InsufficientSample {
                available: trading_days,
                minimum: self.min_sample_days,
                target: self.lookback_days,
            });
        }

        let ((returns, metrics), measure_notices) =
            measure(&table, spec.weights.as_deref(), self.confidence)?.into_parts();
        outcome.notices.extend(measure_notices);

        tracing::info!(
            portfolio = %spec.name,
            var = metrics.var,
            cvar = metrics.cvar,
            volatility = metrics.annualised_volatility,
            "Computed risk metrics"
        );

        let dates = table.dates();
        Ok(outcome.map(|_| PortfolioReport {
            name: spec.name.clone(),
            symbols: table.symbols().to_vec(),
            first_date: dates[0],
            last_date: dates[dates.len() - 1],
            trading_days,
            metrics,
            plot: None,
            returns,
        }))
    }

    /// Analyse every portfolio, passing completed ones to `sink`.
    ///
    /// Analysis failures are recorded against the portfolio and processing moves on to the next
    /// one. A sink failure keeps the computed report and sets `render_error`.
    pub fn run(
        &self,
        portfolios: &[PortfolioSpec],
        start: NaiveDate,
        end: NaiveDate,
        mut sink: Option<&mut dyn ReportSink>,
    ) -> RunSummary {
        let mut summary = RunSummary::new();

        for spec in portfolios {
            tracing::info!("Processing {}...", spec.name);

            let mut outcome = match self.analyze(spec, start, end) {
                Ok(outcome) => outcome,
                Err(e) => {
                    tracing::error!("Error processing {}: {}", spec.name, e);
                    summary.push(PortfolioOutcome::failed(&spec.name, e));
                    continue;
                }
            };

            if let Some(sink) = sink.as_deref_mut() {
                let report = &outcome.value;
                let distribution = DistributionReport::new(
                    &report.name,
                    &report.returns,
                    &report.metrics,
                    report.trading_days,
                );
                match sink.render(&distribution) {
                    Ok(path) => outcome.value.plot = path,
                    Err(e) => {
                        tracing::error!("Error rendering {}: {}", spec.name, e);
                        let mut completed = PortfolioOutcome::completed(outcome);
                        completed.render_error = Some(e.to_string());
                        summary.push(completed);
                        continue;
                    }
                }
            }

            summary.push(PortfolioOutcome::completed(outcome));
        }

        summary
    }
}
