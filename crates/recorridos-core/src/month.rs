//! Calendar month keys and Spanish month names.

use crate::error::{AnalysisError, Result};
use chrono::Datelike;
use std::fmt;
use std::str::FromStr;

/// Spanish month names, indexed by `month - 1`.
pub const MONTH_NAMES: [&str; 12] = [
    "Enero",
    "Febrero",
    "Marzo",
    "Abril",
    "Mayo",
    "Junio",
    "Julio",
    "Agosto",
    "Septiembre",
    "Octubre",
    "Noviembre",
    "Diciembre",
];

/// A calendar month identified by (year, month-number).
///
/// Ordered by year first, then month.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MonthKey {
    year: i32,
    month: u32,
}

impl MonthKey {
    /// Create a key, rejecting month numbers outside `1..=12`.
    pub fn new(year: i32, month: u32) -> Result<Self> {
        if !(1..=12).contains(&month) {
            return Err(AnalysisError::InvalidMonth(format!(
                "month number must be in 1..=12, got {month}"
            )));
        }
        Ok(Self { year, month })
    }

    /// Key from compile-time constants; `month` is clamped into `1..=12`.
    pub(crate) const fn from_parts(year: i32, month: u32) -> Self {
        let month = if month < 1 {
            1
        } else if month > 12 {
            12
        } else {
            month
        };
        Self { year, month }
    }

    /// First month of the given year.
    pub fn january(year: i32) -> Self {
        Self { year, month: 1 }
    }

    /// Month containing the given date.
    pub fn from_date<D: Datelike>(date: &D) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn month(&self) -> u32 {
        self.month
    }

    /// Spanish name of the month.
    pub fn month_name(&self) -> &'static str {
        MONTH_NAMES[(self.month - 1) as usize]
    }

    /// Previous month, rolling the year back at January.
    pub fn predecessor(&self) -> Self {
        if self.month == 1 {
            Self {
                year: self.year - 1,
                month: 12,
            }
        } else {
            Self {
                year: self.year,
                month: self.month - 1,
            }
        }
    }

    /// Next month, rolling the year forward at December.
    pub fn successor(&self) -> Self {
        if self.month == 12 {
            Self {
                year: self.year + 1,
                month: 1,
            }
        } else {
            Self {
                year: self.year,
                month: self.month + 1,
            }
        }
    }

    /// Signed number of months from `self` to `other`.
    pub fn months_until(&self, other: &MonthKey) -> i64 {
        (other.year as i64 - self.year as i64) * 12 + (other.month as i64 - self.month as i64)
    }

    /// Months from `self` (inclusive) to `end` (exclusive), ascending.
    pub fn range_to(self, end: MonthKey) -> MonthRange {
        MonthRange { next: self, end }
    }
}

impl fmt::Display for MonthKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

/// Iterator over a half-open range of months.
#[derive(Debug, Clone)]
pub struct MonthRange {
    next: MonthKey,
    end: MonthKey,
}

impl Iterator for MonthRange {
    type Item = MonthKey;

    fn next(&mut self) -> Option<MonthKey> {
        if self.next >= self.end {
            return None;
        }
        let current = self.next;
        self.next = current.successor();
        Some(current)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.next.months_until(&self.end).max(0) as usize;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for MonthRange {}

/// A month number parsed from a name, abbreviation or number.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonthNumber(pub u32);

impl FromStr for MonthNumber {
    type Err = AnalysisError;

    fn from_str(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        if let Ok(n) = trimmed.parse::<u32>() {
            return if (1..=12).contains(&n) {
                Ok(MonthNumber(n))
            } else {
                Err(AnalysisError::InvalidMonth(trimmed.to_string()))
            };
        }

        let normalized = fold_accents(&trimmed.to_lowercase());
        let number = match normalized.as_str() {
            "enero" | "ene" => 1,
            "febrero" | "feb" => 2,
            "marzo" | "mar" => 3,
            "abril" | "abr" => 4,
            "mayo" | "may" => 5,
            "junio" | "jun" => 6,
            "julio" | "jul" => 7,
            "agosto" | "ago" => 8,
            "septiembre" | "setiembre" | "sep" | "set" => 9,
            "octubre" | "oct" => 10,
            "noviembre" | "nov" => 11,
            "diciembre" | "dic" => 12,
            _ => return Err(AnalysisError::InvalidMonth(trimmed.to_string())),
        };
        Ok(MonthNumber(number))
    }
}

fn fold_accents(s: &str) -> String {
    s.chars()
        .map(|c| match c {
            'á' => 'a',
            'é' => 'e',
            'í' => 'i',
            'ó' => 'o',
            'ú' | 'ü' => 'u',
            other => other,
        })
        .collect()
}
