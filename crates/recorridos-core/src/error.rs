//! Error types for monthly series analysis.

use crate::month::MonthKey;
use thiserror::Error;

/// Result type for analysis operations.
pub type Result<T> = std::result::Result<T, AnalysisError>;

/// Direction of a neighbour walk across missing months.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalkDirection {
    Backward,
    Forward,
}

impl std::fmt::Display for WalkDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WalkDirection::Backward => write!(f, "backward"),
            WalkDirection::Forward => write!(f, "forward"),
        }
    }
}

/// Error types for analysis operations.
#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error("Empty series: at least one observed month is required")]
    EmptySeries,

    #[error("Inverted range: upper bound {upper} must be after lower bound {lower}")]
    InvertedRange { lower: MonthKey, upper: MonthKey },

    #[error("Unterminated {direction} walk from {start}: no observed month within {limit} steps")]
    UnterminatedWalk {
        start: MonthKey,
        direction: WalkDirection,
        limit: usize,
    },

    #[error("Invalid month: {0}")]
    InvalidMonth(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Insufficient data: need at least {needed} observations, got {got}")]
    InsufficientData { needed: usize, got: usize },

    #[error("Invalid parameter '{param}' = '{value}': {reason}")]
    InvalidParameter {
        param: String,
        value: String,
        reason: String,
    },

    #[error("Duplicate column: {0}")]
    DuplicateColumn(String),

    #[error("Computation error: {0}")]
    ComputationError(String),
}

impl AnalysisError {
    /// Stable numeric code, used as the process exit status by the CLI.
    pub fn to_code(&self) -> i32 {
        match self {
            AnalysisError::EmptySeries => 2,
            AnalysisError::InvertedRange { .. } => 3,
            AnalysisError::UnterminatedWalk { .. } => 4,
            AnalysisError::InvalidMonth(_) => 5,
            AnalysisError::InvalidInput(_) => 6,
            AnalysisError::InsufficientData { .. } => 7,
            AnalysisError::InvalidParameter { .. } => 8,
            AnalysisError::DuplicateColumn(_) => 9,
            AnalysisError::ComputationError(_) => 10,
        }
    }

    /// Whether the error signals caller data violating a gap-filling invariant
    /// rather than malformed input.
    pub fn is_consistency_error(&self) -> bool {
        matches!(self, AnalysisError::UnterminatedWalk { .. })
    }
}
