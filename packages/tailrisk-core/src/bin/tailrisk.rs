//! Tailrisk CLI - Historical VaR, CVaR and volatility from the command line.
//!
//! Results are printed to stdout as JSON; logs go to stderr.

use anyhow::{bail, Context, Result};
use chrono::{Local, NaiveDate};
use clap::{Parser, Subcommand};
use serde_json::{json, Value};
use std::path::PathBuf;
use tailrisk_core::{
    analysis::measure, AnalysisConfig, ApiResponse, CsvPriceSource, PriceSeriesLoader,
    ReportSink, RiskAnalyzer, SvgHistogramSink,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "tailrisk")]
#[command(about = "Historical market-risk metrics for equity portfolios")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Analyse every configured portfolio and compare their downside risk
    Run {
        /// Config file (defaults to ~/.tailrisk/config.toml or $TAILRISK_CONFIG)
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// CSV file with date,symbol,close rows
        #[arg(short, long)]
        prices: PathBuf,
        /// Output directory for plots (overrides config)
        #[arg(short, long)]
        out: Option<PathBuf>,
        /// Exclusive end date of the analysis window (defaults to today)
        #[arg(short, long)]
        end: Option<NaiveDate>,
        /// Confidence level (overrides config)
        #[arg(long)]
        confidence: Option<f64>,
        /// Skip rendering plots
        #[arg(long)]
        no_plots: bool,
    },
    /// Compute risk metrics for an ad-hoc portfolio
    Metrics {
        /// CSV file with date,symbol,close rows
        #[arg(short, long)]
        prices: PathBuf,
        /// Symbols (comma-separated)
        #[arg(short = 'y', long)]
        symbols: String,
        /// Weights (comma-separated, same order as symbols)
        #[arg(short, long)]
        weights: Option<String>,
        /// Confidence level for VaR (0.95 = 95%)
        #[arg(long, default_value = "0.95")]
        confidence: f64,
        /// Inclusive start date (defaults to two years before end)
        #[arg(short, long)]
        start: Option<NaiveDate>,
        /// Exclusive end date (defaults to today)
        #[arg(short, long)]
        end: Option<NaiveDate>,
    },
    /// Show the effective configuration
    Config {
        /// Config file (defaults to ~/.tailrisk/config.toml or $TAILRISK_CONFIG)
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Write the effective configuration back to the file
        #[arg(long)]
        init: bool,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Run {
            config,
            prices,
            out,
            end,
            confidence,
            no_plots,
        } => handle_run(config, prices, out, end, confidence, no_plots),
        Commands::Metrics {
            prices,
            symbols,
            weights,
            confidence,
            start,
            end,
        } => handle_metrics(prices, &symbols, weights.as_deref(), confidence, start, end),
        Commands::Config { config, init } => handle_config(config, init),
    };

    let failed = result.is_err();
    let response = match result {
        Ok(data) => ApiResponse::ok(data),
        Err(e) => {
            tracing::error!("{:#}", e);
            ApiResponse::<Value>::err(format!("{:#}", e))
        }
    };
    println!("{}", serde_json::to_string_pretty(&response)?);

    if failed {
        std::process::exit(1);
    }
    Ok(())
}

fn load_config(path: Option<PathBuf>) -> Result<(AnalysisConfig, PathBuf)> {
    let path = path.unwrap_or_else(AnalysisConfig::default_path);
    let config = AnalysisConfig::load_from_path(&path)
        .with_context(|| format!("Failed to load config from {}", path.display()))?;
    Ok((config, path))
}

fn handle_run(
    config: Option<PathBuf>,
    prices: PathBuf,
    out: Option<PathBuf>,
    end: Option<NaiveDate>,
    confidence: Option<f64>,
    no_plots: bool,
) -> Result<Value> {
    let (mut config, _) = load_config(config)?;
    if let Some(out) = out {
        config.output_dir = out;
    }
    if let Some(confidence) = confidence {
        config.confidence_level = confidence;
    }
    config.validate()?;

    let end = end.unwrap_or_else(|| Local::now().date_naive());
    let (start, end) = config.date_window(end);

    let analyzer = RiskAnalyzer::from_config(CsvPriceSource::new(&prices), &config);
    let mut sink = SvgHistogramSink::new(&config.output_dir).with_bins(config.histogram_bins);
    let sink: Option<&mut dyn ReportSink> = if no_plots { None } else { Some(&mut sink) };

    let summary = analyzer.run(&config.portfolios, start, end, sink);
    if summary.successes().next().is_none() {
        tracing::warn!("No results available");
    }

    Ok(json!({
        "start": start,
        "end": end,
        "confidence_level": config.confidence_level,
        "portfolios": summary.portfolios,
        "comparison": summary.comparison(),
    }))
}

fn handle_metrics(
    prices: PathBuf,
    symbols: &str,
    weights: Option<&str>,
    confidence: f64,
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
) -> Result<Value> {
    let symbols: Vec<&str> = symbols
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect();
    let weights = weights.map(parse_weights).transpose()?;

    let end = end.unwrap_or_else(|| Local::now().date_naive());
    let start = match start {
        Some(start) => start,
        None => AnalysisConfig::default().date_window(end).0,
    };

    let loader = PriceSeriesLoader::new(CsvPriceSource::new(&prices));
    let (table, mut notices) = loader.load(&symbols, start, end)?.into_parts();
    let ((_, metrics), measure_notices) =
        measure(&table, weights.as_deref(), confidence)?.into_parts();
    notices.extend(measure_notices);

    Ok(json!({
        "symbols": table.symbols(),
        "trading_days": table.row_count(),
        "metrics": metrics,
        "notices": notices,
    }))
}

fn parse_weights(raw: &str) -> Result<Vec<f64>> {
    if raw.trim().is_empty() {
        bail!("No weights given");
    }
    raw.split(',')
        .map(|w| {
            w.trim()
                .parse::<f64>()
                .with_context(|| format!("Invalid weight: {}", w.trim()))
        })
        .collect()
}

fn handle_config(config: Option<PathBuf>, init: bool) -> Result<Value> {
    let (config, path) = load_config(config)?;
    if init {
        config.save_to_path(&path)?;
        tracing::info!("Config written to {}", path.display());
    }

    Ok(json!({
        "path": path,
        "config": config,
    }))
}
