//! Portfolio analytics module.
//!
//! Provides weighted return aggregation and historical risk metrics.

mod returns;
mod risk;

pub use returns::{aggregate, resolve_weights, simple_returns, WEIGHT_TOLERANCE};
pub use risk::{
    annualised_volatility, compute, conditional_var, historical_var, median, quantile_linear,
    sample_std_dev, TRADING_DAYS_PER_YEAR,
};
