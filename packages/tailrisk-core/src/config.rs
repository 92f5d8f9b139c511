//! Analysis configuration.
//!
//! Stored as TOML. Default path: `~/.tailrisk/config.toml`, overridable with the
//! `TAILRISK_CONFIG` environment variable. A missing file means the built-in defaults.

use crate::{Error, Result};
use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

/// A named portfolio to analyse.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PortfolioSpec {
    /// Label used in logs, summaries and plot file names
    pub name: String,
    /// Ticker symbols, in weight order
    pub symbols: Vec<String>,
    /// Optional weights; equal weighting when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weights: Option<Vec<f64>>,
}

impl PortfolioSpec {
    /// Create an equally weighted portfolio.
    pub fn new(name: &str, symbols: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            symbols: symbols.iter().map(|s| s.to_uppercase()).collect(),
            weights: None,
        }
    }

    /// Attach explicit weights.
    pub fn with_weights(mut self, weights: Vec<f64>) -> Self {
        self.weights = Some(weights);
        self
    }
}

/// Settings for a risk analysis run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Confidence level for VaR and CVaR (e.g., 0.95)
    pub confidence_level: f64,
    /// Trading days kept from the end of each price table
    pub lookback_days: usize,
    /// Below this many trading days results are flagged as less reliable
    pub min_sample_days: usize,
    /// Calendar days of history requested from the price source
    pub history_days: i64,
    /// Directory for rendered plots
    pub output_dir: PathBuf,
    /// Histogram bins in rendered plots
    pub histogram_bins: usize,
    /// Portfolios to analyse
    pub portfolios: Vec<PortfolioSpec>,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            confidence_level: 0.95,
            lookback_days: 500,
            min_sample_days: 450,
            history_days: 730,
            output_dir: PathBuf::from("outputs"),
            histogram_bins: 50,
            portfolios: vec![
                PortfolioSpec::new("Tech_Portfolio", &["AAPL", "MSFT", "NVDA", "GOOGL"]),
                PortfolioSpec::new("Banking_Portfolio", &["JPM", "BAC", "GS", "MS"]),
            ],
        }
    }
}

impl AnalysisConfig {
    /// Get the default config file path.
    pub fn default_path() -> PathBuf {
        if let Ok(path) = env::var("TAILRISK_CONFIG") {
            return PathBuf::from(path);
        }

        directories::BaseDirs::new()
            .map(|dirs| dirs.home_dir().join(".tailrisk/config.toml"))
            .unwrap_or_else(|| PathBuf::from("tailrisk.toml"))
    }

    /// Load config from the default path.
    pub fn load() -> Result<Self> {
        Self::load_from_path(&Self::default_path())
    }

    /// Load config from a specific path, falling back to defaults if it does not exist.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::debug!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Parse and validate a TOML document.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize to TOML.
    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| Error::InvalidConfig(e.to_string()))
    }

    /// Save config to a specific path.
    pub fn save_to_path(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, self.to_toml_string()?)?;
        Ok(())
    }

    /// Check that the settings describe a runnable analysis.
    pub fn validate(&self) -> Result<()> {
        if !self.confidence_level.is_finite()
            || self.confidence_level <= 0.0
            || self.confidence_level >= 1.0
        {
            return Err(Error::InvalidConfidence(self.confidence_level));
        }
        if self.lookback_days < 2 {
            return Err(Error::InvalidConfig(
                "lookback_days must be at least 2".to_string(),
            ));
        }
        if self.min_sample_days > self.lookback_days {
            return Err(Error::InvalidConfig(format!(
                "min_sample_days ({}) exceeds lookback_days ({})",
                self.min_sample_days, self.lookback_days
            )));
        }
        if self.history_days <= 0 {
            return Err(Error::InvalidConfig(
                "history_days must be positive".to_string(),
            ));
        }
        if self.histogram_bins == 0 {
            return Err(Error::InvalidConfig(
                "histogram_bins must be positive".to_string(),
            ));
        }
        if self.portfolios.is_empty() {
            return Err(Error::InvalidConfig("No portfolios configured".to_string()));
        }

        let mut names = HashSet::new();
        for portfolio in &self.portfolios {
            if portfolio.symbols.is_empty() {
                return Err(Error::InvalidConfig(format!(
                    "Portfolio {} has no symbols",
                    portfolio.name
                )));
            }
            if !names.insert(portfolio.name.as_str()) {
                return Err(Error::InvalidConfig(format!(
                    "Duplicate portfolio name: {}",
                    portfolio.name
                )));
            }
        }
        Ok(())
    }

    /// Find a portfolio by name.
    pub fn portfolio(&self, name: &str) -> Option<&PortfolioSpec> {
        self.portfolios.iter().find(|p| p.name == name)
    }

    /// Date range `[end - history_days, end)` to request from the price source.
    pub fn date_window(&self, end: NaiveDate) -> (NaiveDate, NaiveDate) {
        (end - Duration::days(self.history_days), end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_defaults() {
        let config = AnalysisConfig::default();
        assert_eq!(config.confidence_level, 0.95);
        assert_eq!(config.lookback_days, 500);
        assert_eq!(config.min_sample_days, 450);
        assert_eq!(config.portfolios.len(), 2);
        assert_eq!(
            config.portfolio("Banking_Portfolio").unwrap().symbols,
            vec!["JPM", "BAC", "GS", "MS"]
        );
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_partial_toml() {
        let config = AnalysisConfig::from_toml_str(
            r#"
confidence_level = 0.99

[[portfolios]]
name = "Energy"
symbols = ["XOM", "CVX"]
weights = [0.6, 0.4]
"#,
        )
        .unwrap();

        assert_eq!(config.confidence_level, 0.99);
        assert_eq!(config.lookback_days, 500);
        assert_eq!(config.portfolios.len(), 1);
        assert_eq!(config.portfolios[0].weights, Some(vec![0.6, 0.4]));
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(matches!(
            AnalysisConfig::from_toml_str("confidence_level = 1.5"),
            Err(Error::InvalidConfidence(_))
        ));
        assert!(matches!(
            AnalysisConfig::from_toml_str("lookback_days = 100\nmin_sample_days = 200"),
            Err(Error::InvalidConfig(_))
        ));
        assert!(matches!(
            AnalysisConfig::from_toml_str("confidence_level = \"high\""),
            Err(Error::Toml(_))
        ));
    }

    #[test]
    fn test_duplicate_portfolio_names_rejected() {
        let mut config = AnalysisConfig::default();
        config.portfolios[1].name = "Tech_Portfolio".to_string();
        assert!(matches!(config.validate(), Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = AnalysisConfig::default();
        config.portfolios[0] = config.portfolios[0]
            .clone()
            .with_weights(vec![0.4, 0.3, 0.2, 0.1]);
        config.save_to_path(&path).unwrap();

        let loaded = AnalysisConfig::load_from_path(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempdir().unwrap();
        let loaded = AnalysisConfig::load_from_path(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(loaded, AnalysisConfig::default());
    }

    #[test]
    fn test_date_window() {
        let config = AnalysisConfig::default();
        let end = NaiveDate::from_ymd_opt(2026, 10, 18).unwrap();
        let (start, stop) = config.date_window(end);

        assert_eq!(stop, end);
        assert_eq!(start, NaiveDate::from_ymd_opt(2024, 10, 18).unwrap());
    }
}
