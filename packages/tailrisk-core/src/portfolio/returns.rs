//! Weighted portfolio return aggregation.

use crate::types::{Notice, Outcome, PriceTable, ReturnSeries};
use crate::{Error, Result};

/// Absolute tolerance for weight comparisons against zero and one.
pub const WEIGHT_TOLERANCE: f64 = 1e-9;

/// Resolve the weight vector for `assets` columns.
///
/// # Arguments
///
/// * `assets` - Number of price columns
/// * `weights` - Explicit weights, or `None` for equal weighting
///
/// # Returns
///
/// Weights summing to 1.0. When explicit weights had to be rescaled the outcome carries a
/// [`Notice::WeightsNormalised`].
pub fn resolve_weights(assets: usize, weights: Option<&[f64]>) -> Result<Outcome<Vec<f64>>> {
    if assets == 0 {
        return Err(Error::InsufficientData(
            "Cannot weight a portfolio with no assets".to_string(),
        ));
    }

    let weights = match weights {
        None => return Ok(Outcome::new(vec![1.0 / assets as f64; assets])),
        Some(w) => w,
    };

    if weights.len() != assets {
        return Err(Error::WeightLengthMismatch {
            weights: weights.len(),
            assets,
        });
    }

    for (index, &weight) in weights.iter().enumerate() {
        if weight.is_nan() || weight.is_infinite() {
            return Err(Error::InvalidWeight { index, weight });
        }
        if weight < 0.0 {
            return Err(Error::NegativeWeight { index, weight });
        }
    }

    let total: f64 = weights.iter().sum();
    if total.abs() <= WEIGHT_TOLERANCE {
        return Err(Error::ZeroWeightSum);
    }

    if (total - 1.0).abs() <= WEIGHT_TOLERANCE {
        return Ok(Outcome::new(weights.to_vec()));
    }

    let normalised: Vec<f64> = weights.iter().map(|w| w / total).collect();
    let mut outcome = Outcome::new(normalised.clone());
    outcome.push(Notice::WeightsNormalised {
        original_sum: total,
        weights: normalised,
    });
    Ok(outcome)
}

/// Daily simple returns for every column of a price table.
///
/// Returns one vector per symbol, each with `rows - 1` values:
/// `(p[t] - p[t-1]) / p[t-1]`.
pub fn simple_returns(prices: &PriceTable) -> Result<Vec<Vec<f64>>> {
    if prices.row_count() < 2 {
        return Err(Error::InsufficientData(format!(
            "Need at least 2 trading days to compute returns, got {}",
            prices.row_count()
        )));
    }

    let dates = prices.dates();
    prices
        .symbols()
        .iter()
        .zip(prices.columns())
        .map(|(symbol, column)| {
            if let Some(idx) = column.iter().position(|&p| p <= 0.0) {
                return Err(Error::InvalidPrice {
                    symbol: symbol.clone(),
                    date: dates[idx],
                    price: column[idx],
                });
            }
            Ok(column.windows(2).map(|w| (w[1] - w[0]) / w[0]).collect())
        })
        .collect()
}

/// Combine a price table into a single weighted portfolio return series.
///
/// Weights are validated before any return is computed, so a bad weight vector is reported
/// even when the prices themselves are unusable.
pub fn aggregate(prices: &PriceTable, weights: Option<&[f64]>) -> Result<Outcome<ReturnSeries>> {
    let (weights, notices) = resolve_weights(prices.symbol_count(), weights)?.into_parts();
    let returns = simple_returns(prices)?;

    let rows = prices.row_count() - 1;
    let values: Vec<f64> = (0..rows)
        .map(|row| {
            returns
                .iter()
                .zip(&weights)
                .map(|(column, w)| column[row] * w)
                .sum()
        })
        .collect();

    let series = ReturnSeries::new(prices.dates()[1..].to_vec(), values)?;
    tracing::debug!(
        returns = series.len(),
        assets = weights.len(),
        "Aggregated portfolio returns"
    );
    Ok(Outcome::with_notices(series, notices))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use chrono::NaiveDate;

    fn table(columns: &[(&str, &[f64])]) -> PriceTable {
        let rows = columns[0].1.len();
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let dates = (0..rows)
            .map(|i| start + chrono::Duration::days(i as i64))
            .collect();
        PriceTable::new(
            dates,
            columns.iter().map(|(s, _)| s.to_string()).collect(),
            columns.iter().map(|(_, c)| c.to_vec()).collect(),
        )
        .unwrap()
    }

    fn three_assets() -> PriceTable {
        table(&[
            ("AAPL", &[100.0, 102.0, 101.0, 104.0, 103.5]),
            ("MSFT", &[400.0, 396.0, 401.0, 410.0, 408.0]),
            ("NVDA", &[500.0, 520.0, 505.0, 530.0, 540.0]),
        ])
    }

    #[test]
    fn test_single_asset_returns() {
        let prices = table(&[("AAPL", &[100.0, 101.0, 99.0, 99.0, 102.0])]);

        let series = aggregate(&prices, None).unwrap();
        let values = series.value.values();

        assert_eq!(values.len(), 4);
        assert_relative_eq!(values[0], 0.01, epsilon = 1e-12);
        assert_relative_eq!(values[1], -0.019801980198019802, epsilon = 1e-12);
        assert_eq!(values[2], 0.0);
        assert_relative_eq!(values[3], 0.030303030303030304, epsilon = 1e-12);
        assert!(series.notices.is_empty());

        // Equal weight over one asset is the asset itself.
        assert_eq!(values, simple_returns(&prices).unwrap()[0].as_slice());
        assert_eq!(series.value.dates(), &prices.dates()[1..]);
    }

    #[test]
    fn test_one_hot_weights_select_asset() {
        let prices = three_assets();
        let per_asset = simple_returns(&prices).unwrap();

        for asset in 0..3 {
            let mut weights = vec![0.0; 3];
            weights[asset] = 1.0;
            let series = aggregate(&prices, Some(weights.as_slice())).unwrap().value;
            assert_eq!(series.values(), per_asset[asset].as_slice());
        }
    }

    #[test]
    fn test_equal_weight_default_matches_explicit() {
        let prices = three_assets();
        let explicit = vec![1.0 / 3.0; 3];

        let implicit = aggregate(&prices, None).unwrap();
        let explicit = aggregate(&prices, Some(explicit.as_slice())).unwrap();

        assert_eq!(implicit.value, explicit.value);
        assert!(explicit.notices.is_empty());
    }

    #[test]
    fn test_weighted_dot_product() {
        let prices = table(&[("A", &[100.0, 110.0]), ("B", &[50.0, 45.0])]);
        let series = aggregate(&prices, Some(&[0.25, 0.75])).unwrap().value;

        // 0.25 * 0.10 + 0.75 * -0.10
        assert_relative_eq!(series.values()[0], -0.05, epsilon = 1e-12);
    }

    #[test]
    fn test_weights_normalised_with_notice() {
        let outcome = resolve_weights(3, Some(&[0.5, 0.3, 0.3])).unwrap();

        assert_relative_eq!(outcome.value[0], 0.45454545454545453, epsilon = 1e-12);
        assert_relative_eq!(outcome.value[1], 0.2727272727272727, epsilon = 1e-12);
        assert_relative_eq!(outcome.value[2], 0.2727272727272727, epsilon = 1e-12);
        assert_relative_eq!(outcome.value.iter().sum::<f64>(), 1.0, epsilon = 1e-12);

        match outcome.notices.as_slice() {
            [Notice::WeightsNormalised { original_sum, .. }] => {
                assert_relative_eq!(*original_sum, 1.1, epsilon = 1e-12)
            }
            other => panic!("expected one normalisation notice, got {:?}", other),
        }
    }

    #[test]
    fn test_normalisation_is_idempotent() {
        let first = resolve_weights(3, Some(&[0.5, 0.3, 0.3])).unwrap().value;
        let second = resolve_weights(3, Some(first.as_slice())).unwrap();

        assert!(second.notices.is_empty());
        for (a, b) in first.iter().zip(&second.value) {
            assert!((a - b).abs() <= WEIGHT_TOLERANCE);
        }
    }

    #[test]
    fn test_negative_weight_rejected_before_returns() {
        // A single row cannot produce returns, so reaching the weight error proves ordering.
        let prices = table(&[("A", &[100.0]), ("B", &[50.0])]);

        let result = aggregate(&prices, Some(&[-0.1, 1.1]));
        match result {
            Err(Error::NegativeWeight { index, weight }) => {
                assert_eq!(index, 0);
                assert_eq!(weight, -0.1);
            }
            other => panic!("expected NegativeWeight, got {:?}", other),
        }
    }

    #[test]
    fn test_weight_length_mismatch() {
        let result = aggregate(&three_assets(), Some(&[0.5, 0.5]));
        assert!(matches!(
            result,
            Err(Error::WeightLengthMismatch {
                weights: 2,
                assets: 3
            })
        ));
    }

    #[test]
    fn test_zero_weight_sum() {
        assert!(matches!(
            resolve_weights(2, Some(&[0.0, 0.0])),
            Err(Error::ZeroWeightSum)
        ));
        assert!(matches!(
            resolve_weights(2, Some(&[1e-12, 0.0])),
            Err(Error::ZeroWeightSum)
        ));
    }

    #[test]
    fn test_non_finite_weight() {
        assert!(matches!(
            resolve_weights(2, Some(&[f64::NAN, 1.0])),
            Err(Error::InvalidWeight { index: 0, .. })
        ));
        assert!(matches!(
            resolve_weights(2, Some(&[0.5, f64::NEG_INFINITY])),
            Err(Error::InvalidWeight { index: 1, .. })
        ));
    }

    #[test]
    fn test_near_unit_sum_is_not_rescaled() {
        let weights = [0.5, 0.5 + 1e-12];
        let outcome = resolve_weights(2, Some(weights.as_slice())).unwrap();
        assert!(outcome.notices.is_empty());
        assert_eq!(outcome.value, weights.to_vec());
    }

    #[test]
    fn test_single_row_is_insufficient() {
        let prices = table(&[("A", &[100.0])]);
        assert!(matches!(
            aggregate(&prices, None),
            Err(Error::InsufficientData(_))
        ));
    }

    #[test]
    fn test_non_positive_price_rejected() {
        let prices = table(&[("A", &[100.0, 0.0, 50.0])]);
        assert!(matches!(
            simple_returns(&prices),
            Err(Error::InvalidPrice { .. })
        ));
    }
}
