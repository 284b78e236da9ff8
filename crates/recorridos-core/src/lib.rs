//! Monthly ride-count analysis against weather records.
//!
//! This crate completes irregular monthly count series by linear
//! interpolation, joins monthly series on (year, month) and computes
//! the correlation and trend statistics used to compare them.

pub mod aggregate;
pub mod correlation;
pub mod error;
pub mod gaps;
pub mod imputation;
pub mod month;
pub mod table;

// Re-exports for convenience
pub use aggregate::{count_by_month, sum_by_month};
pub use correlation::{
    annual_means, cross_correlation, linear_trend, pearson, significance_bound,
    CrossCorrelation, LinearTrend,
};
pub use error::{AnalysisError, Result, WalkDirection};
pub use gaps::{
    expected_range, fill_missing_months, find_next, find_prev, missing_months, AnchorPolicy,
    GapFillOptions, GapFillResult, MonthlyValue, ObservedSeries, Rounding, DEFAULT_UPPER_BOUND,
};
pub use imputation::{fill_cells, interpolate_linear, FillMethod};
pub use month::{MonthKey, MonthNumber, MonthRange, MONTH_NAMES};
pub use table::{inner_join, join_all, MonthlyTable};
