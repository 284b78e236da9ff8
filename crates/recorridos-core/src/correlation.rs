//! Correlation and trend statistics between monthly series.

use crate::error::{AnalysisError, Result};
use crate::month::MonthKey;
use anofox_regression::prelude::*;
use statrs::statistics::Statistics;
use std::collections::BTreeMap;

/// Cross-correlation coefficients by lag, with the significance band.
#[derive(Debug, Clone, PartialEq)]
pub struct CrossCorrelation {
    /// Coefficient at lag `k` is `coefficients[k]`.
    pub coefficients: Vec<f64>,
    /// Half-width of the band `±1/√n`.
    pub bound: f64,
}

impl CrossCorrelation {
    /// Lags whose coefficient lies outside the significance band.
    pub fn significant_lags(&self) -> Vec<usize> {
        self.coefficients
            .iter()
            .enumerate()
            .filter(|(_, c)| c.abs() > self.bound)
            .map(|(lag, _)| lag)
            .collect()
    }
}

/// Least-squares line `y = intercept + slope * x`.
#[derive(Debug, Clone, PartialEq)]
pub struct LinearTrend {
    pub slope: f64,
    pub intercept: f64,
    pub fitted: Vec<f64>,
}

fn validate_pair(x: &[f64], y: &[f64]) -> Result<()> {
    if x.len() != y.len() {
        return Err(AnalysisError::InvalidInput(format!(
            "Series must have the same length: {} vs {}",
            x.len(),
            y.len()
        )));
    }
    if x.len() < 2 {
        return Err(AnalysisError::InsufficientData {
            needed: 2,
            got: x.len(),
        });
    }
    if x.iter().chain(y.iter()).any(|v| !v.is_finite()) {
        return Err(AnalysisError::InvalidInput(
            "Series must not contain NaN or infinite values".to_string(),
        ));
    }
    Ok(())
}

/// Pearson correlation coefficient.
pub fn pearson(x: &[f64], y: &[f64]) -> Result<f64> {
    validate_pair(x, y)?;
    let sx = x.iter().std_dev();
    let sy = y.iter().std_dev();
    if sx.abs() < f64::EPSILON || sy.abs() < f64::EPSILON {
        return Err(AnalysisError::ComputationError(
            "correlation is undefined for a constant series".to_string(),
        ));
    }
    Ok(x.iter().covariance(y.iter()) / (sx * sy))
}

/// Significance band half-width for `n` paired observations.
pub fn significance_bound(n: usize) -> f64 {
    1.0 / (n as f64).sqrt()
}

/// Unadjusted cross-correlation of `x` leading `y`.
///
/// `ccf[k] = Σ_{t=0}^{n-1-k} (x[t+k] - x̄)(y[t] - ȳ) / (n σx σy)` with
/// population standard deviations, for lags `0..=max_lag` (all lags when `None`).
pub fn cross_correlation(x: &[f64], y: &[f64], max_lag: Option<usize>) -> Result<CrossCorrelation> {
    validate_pair(x, y)?;
    let n = x.len();
    let last_lag = match max_lag {
        Some(lag) if lag >= n => {
            return Err(AnalysisError::InvalidParameter {
                param: "max_lag".to_string(),
                value: lag.to_string(),
                reason: format!("must be below the series length {n}"),
            })
        }
        Some(lag) => lag,
        None => n - 1,
    };

    let mx = x.iter().mean();
    let my = y.iter().mean();
    let denom = n as f64 * x.iter().population_std_dev() * y.iter().population_std_dev();
    if denom.abs() < f64::EPSILON {
        return Err(AnalysisError::ComputationError(
            "cross-correlation is undefined for a constant series".to_string(),
        ));
    }

    let coefficients = (0..=last_lag)
        .map(|lag| {
            (0..n - lag)
                .map(|t| (x[t + lag] - mx) * (y[t] - my))
                .sum::<f64>()
                / denom
        })
        .collect();

    Ok(CrossCorrelation {
        coefficients,
        bound: significance_bound(n),
    })
}

/// Fit a least-squares line through `(xs, ys)`.
pub fn linear_trend(xs: &[f64], ys: &[f64]) -> Result<LinearTrend> {
    validate_pair(xs, ys)?;
    let n = xs.len();

    let x_mat = faer::Mat::from_fn(n, 1, |i, _| xs[i]);
    let y_col = faer::Col::from_fn(n, |i| ys[i]);

    let fitted_model = OlsRegressor::builder()
        .with_intercept(true)
        .build()
        .fit(&x_mat, &y_col)
        .map_err(|_| AnalysisError::ComputationError("least-squares fit failed".to_string()))?;

    let intercept = fitted_model.intercept().unwrap_or(0.0);
    let coefficients = fitted_model.coefficients();
    if coefficients.nrows() == 0 {
        return Err(AnalysisError::ComputationError(
            "least-squares fit returned no slope".to_string(),
        ));
    }
    let slope = coefficients[0];
    let predictions = fitted_model.predict(&x_mat);
    let fitted = (0..n).map(|i| predictions[i]).collect();

    Ok(LinearTrend {
        slope,
        intercept,
        fitted,
    })
}

/// Mean value per year, skipping years without any value.
pub fn annual_means(keys: &[MonthKey], values: &[f64]) -> Result<(Vec<f64>, Vec<f64>)> {
    if keys.len() != values.len() {
        return Err(AnalysisError::InvalidInput(format!(
            "Keys and values must have the same length: {} vs {}",
            keys.len(),
            values.len()
        )));
    }

    let mut by_year: BTreeMap<i32, Vec<f64>> = BTreeMap::new();
    for (key, &value) in keys.iter().zip(values) {
        if value.is_finite() {
            by_year.entry(key.year()).or_default().push(value);
        }
    }

    Ok(by_year
        .into_iter()
        .map(|(year, vals)| (year as f64, vals.iter().mean()))
        .unzip())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_pearson_perfect() {
        let x = [1.0, 2.0, 3.0, 4.0];
        let y = [2.0, 4.0, 6.0, 8.0];
        assert_relative_eq!(pearson(&x, &y).unwrap(), 1.0, epsilon = 1e-12);
        let neg: Vec<f64> = y.iter().map(|v| -v).collect();
        assert_relative_eq!(pearson(&x, &neg).unwrap(), -1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_pearson_known_value() {
        let x = [1.0, 2.0, 3.0, 4.0, 5.0];
        let y = [2.0, 1.0, 4.0, 3.0, 5.0];
        assert_relative_eq!(pearson(&x, &y).unwrap(), 0.8, epsilon = 1e-12);
    }

    #[test]
    fn test_pearson_errors() {
        assert!(pearson(&[1.0, 2.0], &[1.0]).is_err());
        assert!(pearson(&[1.0], &[1.0]).is_err());
        assert!(pearson(&[1.0, 1.0, 1.0], &[1.0, 2.0, 3.0]).is_err());
        assert!(pearson(&[1.0, f64::NAN], &[1.0, 2.0]).is_err());
    }

    #[test]
    fn test_cross_correlation_lag_zero_matches_pearson() {
        let x = [3.0, 1.0, 4.0, 1.0, 5.0, 9.0, 2.0, 6.0];
        let y = [2.0, 7.0, 1.0, 8.0, 2.0, 8.0, 1.0, 8.0];
        let ccf = cross_correlation(&x, &y, None).unwrap();
        assert_eq!(ccf.coefficients.len(), x.len());
        assert_relative_eq!(
            ccf.coefficients[0],
            pearson(&x, &y).unwrap(),
            epsilon = 1e-12
        );
        assert_relative_eq!(ccf.bound, 1.0 / 8f64.sqrt());
    }

    #[test]
    fn test_cross_correlation_detects_shift() {
        // x leads y by two steps.
        let y: Vec<f64> = (0..24).map(|i| ((i as f64) * 0.7).sin()).collect();
        let mut x = vec![0.0, 0.0];
        x.extend_from_slice(&y[..22]);
        let ccf = cross_correlation(&x, &y, Some(5)).unwrap();
        assert_eq!(ccf.coefficients.len(), 6);
        let best = ccf
            .coefficients
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(lag, _)| lag);
        assert_eq!(best, Some(2));
        assert!(ccf.significant_lags().contains(&2));
    }

    #[test]
    fn test_cross_correlation_unadjusted_decay() {
        let x = [1.0, 2.0, 3.0, 4.0];
        let ccf = cross_correlation(&x, &x, None).unwrap();
        // mean 2.5, population variance 1.25, n σ² = 5
        assert_relative_eq!(ccf.coefficients[0], 1.0, epsilon = 1e-12);
        assert_relative_eq!(ccf.coefficients[1], 0.25, epsilon = 1e-12);
        assert_relative_eq!(ccf.coefficients[2], -0.3, epsilon = 1e-12);
        assert_relative_eq!(ccf.coefficients[3], -0.45, epsilon = 1e-12);
    }

    #[test]
    fn test_cross_correlation_rejects_large_lag() {
        let x = [1.0, 2.0, 3.0];
        assert!(cross_correlation(&x, &x, Some(3)).is_err());
    }

    #[test]
    fn test_linear_trend() {
        let xs = [2000.0, 2001.0, 2002.0, 2003.0];
        let ys = [17.0, 17.5, 18.0, 18.5];
        let trend = linear_trend(&xs, &ys).unwrap();
        assert_relative_eq!(trend.slope, 0.5, epsilon = 1e-6);
        assert_relative_eq!(trend.intercept, 17.0 - 0.5 * 2000.0, epsilon = 1e-4);
        assert_eq!(trend.fitted.len(), 4);
        assert_relative_eq!(trend.fitted[3], 18.5, epsilon = 1e-6);
    }

    #[test]
    fn test_annual_means() {
        let keys = [
            MonthKey::new(2020, 1).unwrap(),
            MonthKey::new(2020, 2).unwrap(),
            MonthKey::new(2021, 1).unwrap(),
        ];
        let (years, means) = annual_means(&keys, &[10.0, 20.0, 7.0]).unwrap();
        assert_eq!(years, vec![2020.0, 2021.0]);
        assert_eq!(means, vec![15.0, 7.0]);
    }
}
