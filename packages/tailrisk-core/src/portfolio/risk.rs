//! Historical portfolio risk metrics.
//!
//! Provides historical VaR, CVaR (expected shortfall) and annualised volatility.

use crate::types::RiskMetrics;
use crate::{Error, Result};

/// Trading days per year used to annualise daily volatility.
pub const TRADING_DAYS_PER_YEAR: f64 = 252.0;

/// Calculate historical risk metrics for a return series.
///
/// # Arguments
///
/// * `returns` - Daily returns (e.g., 0.01 for a 1% daily return)
/// * `confidence` - Confidence level for VaR, strictly between 0 and 1 (typically 0.95)
///
/// # Returns
///
/// `RiskMetrics` with signed VaR and CVaR in the return domain, or an error for an invalid
/// confidence level or fewer than two returns. An empty CVaR tail yields a NaN `cvar`.
pub fn compute(returns: &[f64], confidence: f64) -> Result<RiskMetrics> {
    if !confidence.is_finite() || confidence <= 0.0 || confidence >= 1.0 {
        return Err(Error::InvalidConfidence(confidence));
    }

    if returns.len() < 2 {
        return Err(Error::InsufficientData(format!(
            "Need at least 2 returns for risk calculation, got {}",
            returns.len()
        )));
    }

    if returns.iter().any(|r| !r.is_finite()) {
        return Err(Error::InsufficientData(
            "Return series contains non-finite values".to_string(),
        ));
    }

    let var = historical_var(returns, confidence);
    let cvar = conditional_var(returns, var);
    let annualised_volatility = annualised_volatility(returns);

    Ok(RiskMetrics {
        confidence_level: confidence,
        var,
        cvar,
        annualised_volatility,
        sample_size: returns.len(),
    })
}

/// Quantile of `values` using linear interpolation between closest ranks.
///
/// The virtual index is `h = (n - 1) * q`. With `lo = floor(h)` and `t = h - lo` the result
/// interpolates between the sorted values `a = x[lo]` and `b = x[lo + 1]`, evaluated as
/// `a + (b - a) * t` below `t = 0.5` and `b - (b - a) * (1 - t)` from `t = 0.5` on. This is
/// the default estimator of the common numeric libraries, including their rounding.
///
/// Returns NaN for an empty slice. `q` is clamped to `[0, 1]`.
pub fn quantile_linear(values: &[f64], q: f64) -> f64 {
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    quantile_sorted(&sorted, q)
}

fn quantile_sorted(sorted: &[f64], q: f64) -> f64 {
    let n = sorted.len();
    if n == 0 {
        return f64::NAN;
    }

    let h = (n - 1) as f64 * q.clamp(0.0, 1.0);
    let lo = (h.floor() as usize).min(n - 1);
    let hi = (lo + 1).min(n - 1);
    let t = h - lo as f64;

    let a = sorted[lo];
    let b = sorted[hi];
    let diff = b - a;
    if t >= 0.5 {
        b - diff * (1.0 - t)
    } else {
        a + diff * t
    }
}

/// Median of `values` (the 0.5 linear quantile).
pub fn median(values: &[f64]) -> f64 {
    quantile_linear(values, 0.5)
}

/// Historical Value at Risk.
///
/// The return at the `1 - confidence` quantile, e.g. the 5th percentile at 95% confidence.
/// The value is signed: a loss threshold is negative.
pub fn historical_var(returns: &[f64], confidence: f64) -> f64 {
    quantile_linear(returns, 1.0 - confidence)
}

/// Conditional Value at Risk (expected shortfall).
///
/// Mean of every return at or below `var`. Returns NaN when no return qualifies.
pub fn conditional_var(returns: &[f64], var: f64) -> f64 {
    let (sum, count) = returns
        .iter()
        .filter(|&&r| r <= var)
        .fold((0.0, 0usize), |(sum, count), r| (sum + r, count + 1));

    if count == 0 {
        return f64::NAN;
    }
    sum / count as f64
}

/// Sample standard deviation (N - 1 denominator). NaN for fewer than two values.
pub fn sample_std_dev(returns: &[f64]) -> f64 {
    if returns.len() < 2 {
        return f64::NAN;
    }

    let n = returns.len() as f64;
    let mean = returns.iter().sum::<f64>() / n;
    let variance = returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / (n - 1.0);
    variance.sqrt()
}

/// Calculate annualized volatility from daily returns.
pub fn annualised_volatility(returns: &[f64]) -> f64 {
    sample_std_dev(returns) * TRADING_DAYS_PER_YEAR.sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    // Deterministic, skewed pseudo-returns
    fn generate_returns(n: usize) -> Vec<f64> {
        (0..n)
            .map(|i| {
                let x = (i as f64 * 0.7).sin() * 0.015 + (i as f64 * 1.3).cos() * 0.006;
                if i % 17 == 0 {
                    x - 0.03
                } else {
                    x
                }
            })
            .collect()
    }

    #[test]
    fn test_quantile_linear_interpolates() {
        let values = [0.04, -0.02, 0.01, -0.05, 0.0];
        // sorted: -0.05, -0.02, 0.0, 0.01, 0.04

        assert_eq!(quantile_linear(&values, 0.0), -0.05);
        assert_eq!(quantile_linear(&values, 1.0), 0.04);
        assert_eq!(quantile_linear(&values, 0.5), 0.0);

        // h = 4 * 0.1 = 0.4 -> -0.05 + 0.03 * 0.4
        assert_relative_eq!(quantile_linear(&values, 0.1), -0.038, epsilon = 1e-15);
        // h = 4 * 0.8 = 3.2 -> 0.01 + 0.03 * 0.2
        assert_relative_eq!(quantile_linear(&values, 0.8), 0.016, epsilon = 1e-15);
    }

    #[test]
    fn test_quantile_linear_upper_branch_rounding() {
        // t = 0.75 takes the `b - (b - a) * (1 - t)` branch.
        let values = [1.0, 2.0, 3.0, 4.0, 5.0];
        assert_eq!(quantile_linear(&values, 0.6875), 3.75);
        assert!(quantile_linear(&[], 0.5).is_nan());
        assert_eq!(quantile_linear(&[0.3], 0.05), 0.3);
    }

    #[test]
    fn test_var_five_percent_of_one_hundred() {
        // Returns -0.50, -0.49, ..., 0.49
        let returns: Vec<f64> = (0..100).map(|i| (i as f64 - 50.0) / 100.0).collect();

        // h = 99 * 0.05 = 4.95, between -0.46 and -0.45
        let var = historical_var(&returns, 0.95);
        assert_relative_eq!(var, -0.4505, epsilon = 1e-9);

        // Tail: -0.50 .. -0.46
        let cvar = conditional_var(&returns, var);
        assert_relative_eq!(cvar, -0.48, epsilon = 1e-12);
    }

    #[test]
    fn test_compute_risk_metrics() {
        let returns = vec![
            0.01, -0.005, 0.008, -0.003, 0.012, -0.007, 0.005, 0.002, -0.004, 0.006, 0.003, -0.002,
            0.007, -0.001, 0.004,
        ];

        let result = compute(&returns, 0.95).unwrap();

        assert!(result.var < 0.0);
        assert!(result.cvar <= result.var);
        assert!(result.annualised_volatility > 0.0);
        assert_eq!(result.sample_size, 15);
        assert_eq!(result.confidence_level, 0.95);
        // Only the minimum is at or below the interpolated 5th percentile.
        assert_eq!(result.cvar, -0.007);
    }

    #[test]
    fn test_var_below_median_and_cvar_below_var() {
        let returns = generate_returns(500);
        let med = median(&returns);

        for confidence in [0.5, 0.9, 0.95, 0.975, 0.99] {
            let metrics = compute(&returns, confidence).unwrap();
            assert!(metrics.var <= med, "VaR above median at {}", confidence);
            assert!(metrics.cvar <= metrics.var, "CVaR above VaR at {}", confidence);
        }
    }

    #[test]
    fn test_volatility_scales_with_deviation() {
        let returns = generate_returns(250);
        let mean = returns.iter().sum::<f64>() / returns.len() as f64;
        let stretched: Vec<f64> = returns.iter().map(|r| mean + 2.0 * (r - mean)).collect();

        let base = annualised_volatility(&returns);
        assert_relative_eq!(annualised_volatility(&stretched), 2.0 * base, max_relative = 1e-12);
        assert_relative_eq!(base, sample_std_dev(&returns) * 252f64.sqrt());
    }

    #[test]
    fn test_sample_std_dev_uses_n_minus_one() {
        // mean 2.5, squared deviations sum 5.0, / 3
        let std = sample_std_dev(&[1.0, 2.0, 3.0, 4.0]);
        assert_relative_eq!(std, (5.0f64 / 3.0).sqrt(), epsilon = 1e-15);
        assert!(sample_std_dev(&[1.0]).is_nan());
    }

    #[test]
    fn test_all_zero_returns() {
        let returns = vec![0.0; 500];
        let metrics = compute(&returns, 0.95).unwrap();

        assert_eq!(metrics.var, 0.0);
        // Every return sits on the inclusive boundary, so the tail is the whole series.
        assert_eq!(metrics.cvar, 0.0);
        assert!(metrics.has_cvar());
        assert_eq!(metrics.annualised_volatility, 0.0);
    }

    #[test]
    fn test_empty_tail_is_nan() {
        let cvar = conditional_var(&[0.01, 0.02], -0.5);
        assert!(cvar.is_nan());
    }

    #[test]
    fn test_compute_rejects_bad_confidence() {
        let returns = generate_returns(20);
        for confidence in [0.0, 1.0, -0.5, 1.5, f64::NAN] {
            assert!(matches!(
                compute(&returns, confidence),
                Err(Error::InvalidConfidence(_))
            ));
        }
    }

    #[test]
    fn test_compute_insufficient_data() {
        let result = compute(&[0.01], 0.95);
        assert!(matches!(result, Err(Error::InsufficientData(_))));

        let result = compute(&[0.01, f64::NAN, 0.02], 0.95);
        assert!(matches!(result, Err(Error::InsufficientData(_))));
    }
}
