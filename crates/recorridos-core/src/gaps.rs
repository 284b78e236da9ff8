//! Gap filling for monthly count series.
//!
//! A series of monthly observations (one value per calendar month, possibly
//! with holes) is completed over a fixed range that starts in January of the
//! first observed year and ends just before a caller-supplied upper bound.
//! Every missing month is replaced by a linear interpolation between the
//! nearest observed months on each side, measured in calendar months.
//!
//! The set of missing months is computed once and never changes while
//! values are being imputed, so the result does not depend on the order in
//! which missing months are processed.

use crate::error::{AnalysisError, Result, WalkDirection};
use crate::imputation::{interpolate_linear, mean};
use crate::month::{MonthKey, MonthRange};
use std::collections::{BTreeMap, BTreeSet};
use std::str::FromStr;

/// Observed monthly values keyed by month.
pub type ObservedSeries = BTreeMap<MonthKey, f64>;

/// Exclusive upper bound used when none is configured: May 2024.
pub const DEFAULT_UPPER_BOUND: (i32, u32) = (2024, 5);

/// How imputed values are rounded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Rounding {
    /// Round to the nearest integer (half away from zero), for count series.
    #[default]
    Nearest,
    /// Keep fractional values.
    None,
}

impl Rounding {
    fn apply(self, value: f64) -> f64 {
        match self {
            Rounding::Nearest => value.round(),
            Rounding::None => value,
        }
    }
}

impl FromStr for Rounding {
    type Err = AnalysisError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "nearest" | "round" => Ok(Rounding::Nearest),
            "none" | "fractional" => Ok(Rounding::None),
            other => Err(AnalysisError::InvalidParameter {
                param: "rounding".to_string(),
                value: other.to_string(),
                reason: "expected nearest or none".to_string(),
            }),
        }
    }
}

/// What to do when a neighbour walk leaves the expected range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AnchorPolicy {
    /// Fail with [`AnalysisError::UnterminatedWalk`].
    #[default]
    Strict,
    /// Anchor on the first month outside the range and value it through
    /// the observed series, falling back to the series mean.
    MeanFallback,
}

impl FromStr for AnchorPolicy {
    type Err = AnalysisError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "strict" => Ok(AnchorPolicy::Strict),
            "mean" | "mean_fallback" | "mean-fallback" => Ok(AnchorPolicy::MeanFallback),
            other => Err(AnalysisError::InvalidParameter {
                param: "anchors".to_string(),
                value: other.to_string(),
                reason: "expected strict or mean_fallback".to_string(),
            }),
        }
    }
}

/// Options for [`fill_missing_months`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GapFillOptions {
    /// First month NOT included in the completed series.
    pub upper_bound: MonthKey,
    pub rounding: Rounding,
    pub anchors: AnchorPolicy,
}

impl Default for GapFillOptions {
    fn default() -> Self {
        let (year, month) = DEFAULT_UPPER_BOUND;
        Self {
            upper_bound: MonthKey::from_parts(year, month),
            rounding: Rounding::default(),
            anchors: AnchorPolicy::default(),
        }
    }
}

/// One month of a completed series.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MonthlyValue {
    pub key: MonthKey,
    pub value: f64,
    /// Whether the value was imputed rather than observed.
    pub imputed: bool,
}

/// Result of gap filling.
#[derive(Debug, Clone, Default)]
pub struct GapFillResult {
    /// One entry per month of the expected range, ascending.
    pub complete: Vec<MonthlyValue>,
    /// Imputed values only, keyed by month.
    pub imputed: BTreeMap<MonthKey, f64>,
    /// Mean of all observed values.
    pub series_mean: f64,
    /// Number of anchor lookups that fell back to the series mean.
    pub mean_fallbacks: usize,
}

impl GapFillResult {
    /// Values of the completed series in month order.
    pub fn values(&self) -> Vec<f64> {
        self.complete.iter().map(|m| m.value).collect()
    }

    /// Completed series as a plain month → value map.
    pub fn to_series(&self) -> ObservedSeries {
        self.complete.iter().map(|m| (m.key, m.value)).collect()
    }
}

/// Months a complete series must cover: January of the first observed year
/// up to, not including, `upper_bound`.
pub fn expected_range(observed: &ObservedSeries, upper_bound: MonthKey) -> Result<MonthRange> {
    let first = observed
        .keys()
        .next()
        .ok_or(AnalysisError::EmptySeries)?;
    let lower = MonthKey::january(first.year());
    if upper_bound <= lower {
        return Err(AnalysisError::InvertedRange {
            lower,
            upper: upper_bound,
        });
    }
    Ok(lower.range_to(upper_bound))
}

/// Months of the expected range without an observation.
pub fn missing_months(
    observed: &ObservedSeries,
    upper_bound: MonthKey,
) -> Result<BTreeSet<MonthKey>> {
    Ok(expected_range(observed, upper_bound)?
        .filter(|key| !observed.contains_key(key))
        .collect())
}

/// Nearest month before `start` that is not missing.
///
/// The walk never goes below `lower`; under [`AnchorPolicy::MeanFallback`]
/// the month just below `lower` is returned instead of failing.
pub fn find_prev(
    start: MonthKey,
    missing: &BTreeSet<MonthKey>,
    lower: MonthKey,
    anchors: AnchorPolicy,
) -> Result<MonthKey> {
    walk(start, missing, anchors, WalkDirection::Backward, |key| {
        key < lower
    })
}

/// Nearest month after `start` that is not missing.
///
/// The walk stops at `upper_bound`, which is outside the expected range.
pub fn find_next(
    start: MonthKey,
    missing: &BTreeSet<MonthKey>,
    upper_bound: MonthKey,
    anchors: AnchorPolicy,
) -> Result<MonthKey> {
    walk(start, missing, anchors, WalkDirection::Forward, |key| {
        key >= upper_bound
    })
}

fn walk(
    start: MonthKey,
    missing: &BTreeSet<MonthKey>,
    anchors: AnchorPolicy,
    direction: WalkDirection,
    out_of_range: impl Fn(MonthKey) -> bool,
) -> Result<MonthKey> {
    let limit = missing.len();
    let unterminated = || AnalysisError::UnterminatedWalk {
        start,
        direction,
        limit,
    };
    let step = |key: MonthKey| match direction {
        WalkDirection::Backward => key.predecessor(),
        WalkDirection::Forward => key.successor(),
    };

    let mut key = step(start);
    for _ in 0..=limit {
        if out_of_range(key) {
            return match anchors {
                AnchorPolicy::Strict => Err(unterminated()),
                AnchorPolicy::MeanFallback => Ok(key),
            };
        }
        if !missing.contains(&key) {
            return Ok(key);
        }
        key = step(key);
    }
    Err(unterminated())
}

/// Complete a monthly series by imputing every missing month.
///
/// Each missing month `g` is valued on the line between its nearest
/// non-missing neighbours `prev` and `next`:
///
/// `value(g) = v(prev) + d(prev, g) * (v(next) - v(prev)) / d(prev, next)`
///
/// where `d` counts calendar months and `v` reads the observed series,
/// falling back to the series mean for anchors without an observation.
///
/// # Errors
/// * [`AnalysisError::EmptySeries`] if nothing was observed
/// * [`AnalysisError::InvertedRange`] if the upper bound is not after January
///   of the first observed year
/// * [`AnalysisError::UnterminatedWalk`] if a run of missing months touches an
///   edge of the range under [`AnchorPolicy::Strict`]
/// * [`AnalysisError::InvalidInput`] if an observed value is not finite
pub fn fill_missing_months(
    observed: &ObservedSeries,
    options: &GapFillOptions,
) -> Result<GapFillResult> {
    if let Some((key, value)) = observed.iter().find(|(_, v)| !v.is_finite()) {
        return Err(AnalysisError::InvalidInput(format!(
            "observed value for {key} is not finite: {value}"
        )));
    }

    let range = expected_range(observed, options.upper_bound)?;
    let lower = MonthKey::january(
        observed
            .keys()
            .next()
            .ok_or(AnalysisError::EmptySeries)?
            .year(),
    );
    let missing = missing_months(observed, options.upper_bound)?;
    let values: Vec<f64> = observed.values().copied().collect();
    let series_mean = mean(&values).ok_or(AnalysisError::EmptySeries)?;

    log::debug!(
        "expected range {}..{} ({} months), {} missing",
        lower,
        options.upper_bound,
        range.len(),
        missing.len()
    );

    let mut mean_fallbacks = 0usize;
    let mut lookup = |key: MonthKey| match observed.get(&key) {
        Some(&value) => value,
        None => {
            mean_fallbacks += 1;
            log::warn!("no observation for anchor {key}, using series mean {series_mean}");
            series_mean
        }
    };

    let mut imputed = BTreeMap::new();
    for &gap in &missing {
        let prev = find_prev(gap, &missing, lower, options.anchors)?;
        let next = find_next(gap, &missing, options.upper_bound, options.anchors)?;
        let prev_value = lookup(prev);
        let next_value = lookup(next);

        let span = prev.months_until(&next);
        if span <= 0 {
            return Err(AnalysisError::ComputationError(format!(
                "anchors {prev} and {next} for {gap} are not ordered"
            )));
        }
        let raw = interpolate_linear(prev_value, next_value, prev.months_until(&gap), span);
        let value = options.rounding.apply(raw);
        log::debug!("imputed {gap} = {value} (between {prev} and {next})");
        imputed.insert(gap, value);
    }

    let complete = range
        .map(|key| match observed.get(&key) {
            Some(&value) => Ok(MonthlyValue {
                key,
                value,
                imputed: false,
            }),
            None => imputed
                .get(&key)
                .map(|&value| MonthlyValue {
                    key,
                    value,
                    imputed: true,
                })
                .ok_or_else(|| {
                    AnalysisError::ComputationError(format!("no value produced for {key}"))
                }),
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(GapFillResult {
        complete,
        imputed,
        series_mean,
        mean_fallbacks,
    })
}
