//! Return distribution reporting.
//!
//! A [`ReportSink`] receives one [`DistributionReport`] per portfolio. The bundled
//! [`SvgHistogramSink`] draws a histogram of daily returns with the VaR and CVaR thresholds.

mod svg;

pub use svg::SvgHistogramSink;

use crate::types::{ReturnSeries, RiskMetrics};
use crate::Result;
use std::path::PathBuf;

/// Everything a sink needs to visualise one portfolio.
#[derive(Debug, Clone, Copy)]
pub struct DistributionReport<'a> {
    pub label: &'a str,
    pub returns: &'a ReturnSeries,
    pub var: f64,
    pub cvar: f64,
    /// Trading days in the analysed price window
    pub sample_size: usize,
    pub confidence: f64,
}

impl<'a> DistributionReport<'a> {
    /// Build a report from computed metrics.
    pub fn new(
        label: &'a str,
        returns: &'a ReturnSeries,
        metrics: &RiskMetrics,
        sample_size: usize,
    ) -> Self {
        Self {
            label,
            returns,
            var: metrics.var,
            cvar: metrics.cvar,
            sample_size,
            confidence: metrics.confidence_level,
        }
    }

    /// Confidence level as a whole percentage, e.g. 95.
    pub fn confidence_pct(&self) -> u32 {
        (self.confidence * 100.0).round() as u32
    }

    /// Legend text for the VaR threshold.
    pub fn var_label(&self) -> String {
        threshold_label("VaR", self.confidence_pct(), self.var)
    }

    /// Legend text for the CVaR threshold.
    pub fn cvar_label(&self) -> String {
        threshold_label("CVaR", self.confidence_pct(), self.cvar)
    }

    pub fn title(&self) -> String {
        format!(
            "Historical Distribution: {} (Last {} Trading Days)",
            self.label, self.sample_size
        )
    }
}

fn threshold_label(name: &str, pct: u32, value: f64) -> String {
    format!(
        "{} {}%: {} (|Loss|={})",
        name,
        pct,
        format_percent(value),
        format_percent(value.abs())
    )
}

/// Format a fraction as a percentage with two decimals, e.g. `-0.0123` -> `-1.23%`.
pub fn format_percent(value: f64) -> String {
    if value.is_nan() {
        return "n/a".to_string();
    }
    format!("{:.2}%", value * 100.0)
}

/// Consumer of per-portfolio distribution reports.
pub trait ReportSink {
    /// Render or persist a report. Returns the written path, if any.
    fn render(&mut self, report: &DistributionReport<'_>) -> Result<Option<PathBuf>>;
}

/// Equal-width histogram of a set of values.
#[derive(Debug, Clone, PartialEq)]
pub struct Histogram {
    /// Bin edges, `counts.len() + 1` of them
    pub edges: Vec<f64>,
    pub counts: Vec<usize>,
}

impl Histogram {
    /// Bin `values` into `bins` equal-width bins spanning their range.
    ///
    /// Non-finite values are ignored. The last bin includes its right edge. A single distinct
    /// value is centred in `[v - 0.5, v + 0.5]`; no values at all give the range `[0, 1]`.
    pub fn from_values(values: &[f64], bins: usize) -> Self {
        let bins = bins.max(1);
        let finite: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();

        let (mut min, mut max) = finite
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
                (lo.min(v), hi.max(v))
            });
        if finite.is_empty() {
            min = 0.0;
            max = 1.0;
        } else if min == max {
            min -= 0.5;
            max += 0.5;
        }

        let width = (max - min) / bins as f64;
        let edges = (0..=bins).map(|i| min + width * i as f64).collect();

        let mut counts = vec![0usize; bins];
        for v in finite {
            let idx = (((v - min) / width).floor() as usize).min(bins - 1);
            counts[idx] += 1;
        }

        Self { edges, counts }
    }

    pub fn bins(&self) -> usize {
        self.counts.len()
    }

    pub fn total(&self) -> usize {
        self.counts.iter().sum()
    }

    pub fn max_count(&self) -> usize {
        self.counts.iter().copied().max().unwrap_or(0)
    }

    /// Lower edge of the first bin.
    pub fn min(&self) -> f64 {
        self.edges[0]
    }

    /// Upper edge of the last bin.
    pub fn max(&self) -> f64 {
        self.edges[self.edges.len() - 1]
    }
}
