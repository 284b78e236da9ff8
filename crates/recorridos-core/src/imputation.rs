//! Missing value imputation primitives.

use crate::error::{AnalysisError, Result};
use std::str::FromStr;

/// Strategy for filling missing measurement cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FillMethod {
    /// Leave missing cells untouched.
    #[default]
    None,
    /// Interpolate between the nearest known cells; edges take the nearest known value.
    Linear,
    /// Carry the last known value forward (LOCF).
    Forward,
    /// Carry the next known value backward (NOCB).
    Backward,
    /// Substitute the mean of the known cells.
    Mean,
}

impl FromStr for FillMethod {
    type Err = AnalysisError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "none" => Ok(FillMethod::None),
            "linear" | "interpolate" => Ok(FillMethod::Linear),
            "forward" | "locf" => Ok(FillMethod::Forward),
            "backward" | "nocb" => Ok(FillMethod::Backward),
            "mean" => Ok(FillMethod::Mean),
            other => Err(AnalysisError::InvalidParameter {
                param: "fill".to_string(),
                value: other.to_string(),
                reason: "expected one of none, linear, forward, backward, mean".to_string(),
            }),
        }
    }
}

/// Value on the straight line through `(0, start)` and `(span, end)` at `offset`.
///
/// `span` must be non-zero.
pub fn interpolate_linear(start: f64, end: f64, offset: i64, span: i64) -> f64 {
    start + offset as f64 * (end - start) / span as f64
}

/// Arithmetic mean, `None` for an empty slice.
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Fill missing cells of a column whose rows sit at the given positions.
///
/// `positions` are strictly increasing (month ordinals), so interpolation
/// weights by calendar distance even when rows are not contiguous.
pub fn fill_cells(
    positions: &[i64],
    values: &[Option<f64>],
    method: FillMethod,
) -> Result<Vec<Option<f64>>> {
    if positions.len() != values.len() {
        return Err(AnalysisError::InvalidInput(format!(
            "Positions and values must have the same length: {} vs {}",
            positions.len(),
            values.len()
        )));
    }
    if positions.windows(2).any(|w| w[1] <= w[0]) {
        return Err(AnalysisError::InvalidInput(
            "Positions must be strictly increasing".to_string(),
        ));
    }

    let filled = match method {
        FillMethod::None => values.to_vec(),
        FillMethod::Linear => fill_linear(positions, values),
        FillMethod::Forward => fill_forward(values),
        FillMethod::Backward => fill_backward(values),
        FillMethod::Mean => {
            let known: Vec<f64> = values.iter().filter_map(|v| *v).collect();
            match mean(&known) {
                Some(m) => values.iter().map(|v| Some(v.unwrap_or(m))).collect(),
                None => values.to_vec(),
            }
        }
    };
    Ok(filled)
}

fn fill_forward(values: &[Option<f64>]) -> Vec<Option<f64>> {
    let mut last = None;
    values
        .iter()
        .map(|v| {
            if v.is_some() {
                last = *v;
            }
            last
        })
        .collect()
}

fn fill_backward(values: &[Option<f64>]) -> Vec<Option<f64>> {
    let mut result = vec![None; values.len()];
    let mut next = None;
    for (i, v) in values.iter().enumerate().rev() {
        if v.is_some() {
            next = *v;
        }
        result[i] = next;
    }
    result
}

fn fill_linear(positions: &[i64], values: &[Option<f64>]) -> Vec<Option<f64>> {
    let known: Vec<usize> = (0..values.len()).filter(|&i| values[i].is_some()).collect();
    let (first, last) = match (known.first(), known.last()) {
        (Some(&f), Some(&l)) => (f, l),
        _ => return values.to_vec(),
    };

    let mut result = values.to_vec();
    for item in result.iter_mut().take(first) {
        *item = values[first];
    }
    for item in result.iter_mut().skip(last + 1) {
        *item = values[last];
    }

    for pair in known.windows(2) {
        let (lo, hi) = (pair[0], pair[1]);
        if let (Some(start), Some(end)) = (values[lo], values[hi]) {
            let span = positions[hi] - positions[lo];
            for (j, item) in result.iter_mut().enumerate().take(hi).skip(lo + 1) {
                *item = Some(interpolate_linear(
                    start,
                    end,
                    positions[j] - positions[lo],
                    span,
                ));
            }
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_interpolate_linear() {
        assert_relative_eq!(interpolate_linear(10.0, 20.0, 1, 2), 15.0);
        assert_relative_eq!(interpolate_linear(0.0, 30.0, 3, 4), 22.5);
        assert_relative_eq!(interpolate_linear(8.0, 2.0, 1, 3), 6.0);
    }

    #[test]
    fn test_mean() {
        assert_eq!(mean(&[]), None);
        assert_relative_eq!(mean(&[1.0, 2.0, 6.0]).unwrap(), 3.0);
    }

    #[test]
    fn test_fill_forward_and_backward() {
        let positions = [0, 1, 2, 3, 4];
        let values = [None, Some(2.0), None, Some(4.0), None];
        assert_eq!(
            fill_cells(&positions, &values, FillMethod::Forward).unwrap(),
            vec![None, Some(2.0), Some(2.0), Some(4.0), Some(4.0)]
        );
        assert_eq!(
            fill_cells(&positions, &values, FillMethod::Backward).unwrap(),
            vec![Some(2.0), Some(2.0), Some(4.0), Some(4.0), None]
        );
    }

    #[test]
    fn test_fill_mean() {
        let positions = [0, 1, 2];
        let values = [Some(1.0), None, Some(5.0)];
        let filled = fill_cells(&positions, &values, FillMethod::Mean).unwrap();
        assert_relative_eq!(filled[1].unwrap(), 3.0);
    }

    #[test]
    fn test_fill_linear_weights_by_position() {
        // Row at position 3 is absent from the table, so the gap spans 3 months.
        let positions = [0, 1, 3];
        let values = [Some(0.0), None, Some(30.0)];
        let filled = fill_cells(&positions, &values, FillMethod::Linear).unwrap();
        assert_relative_eq!(filled[1].unwrap(), 10.0);
    }

    #[test]
    fn test_fill_linear_edges_take_nearest() {
        let positions = [0, 1, 2, 3];
        let values = [None, Some(2.0), Some(4.0), None];
        let filled = fill_cells(&positions, &values, FillMethod::Linear).unwrap();
        assert_eq!(filled, vec![Some(2.0), Some(2.0), Some(4.0), Some(4.0)]);
    }

    #[test]
    fn test_fill_all_missing_is_untouched() {
        let positions = [0, 1];
        let values = [None, None];
        for method in [FillMethod::Linear, FillMethod::Mean, FillMethod::Forward] {
            assert_eq!(fill_cells(&positions, &values, method).unwrap(), vec![None, None]);
        }
    }

    #[test]
    fn test_fill_rejects_bad_positions() {
        assert!(fill_cells(&[0, 1], &[Some(1.0)], FillMethod::None).is_err());
        assert!(fill_cells(&[1, 1], &[Some(1.0), None], FillMethod::Linear).is_err());
    }

    #[test]
    fn test_fill_method_parse() {
        assert_eq!("linear".parse::<FillMethod>().unwrap(), FillMethod::Linear);
        assert_eq!("LOCF".parse::<FillMethod>().unwrap(), FillMethod::Forward);
        assert!("spline".parse::<FillMethod>().is_err());
    }
}
