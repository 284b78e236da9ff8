//! Long-format monthly tables and joins on (year, month).

use crate::error::{AnalysisError, Result};
use crate::gaps::GapFillResult;
use crate::imputation::{fill_cells, FillMethod};
use crate::month::MonthKey;
use std::collections::BTreeMap;

/// Numeric columns keyed by month. Cells may be missing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MonthlyTable {
    columns: Vec<String>,
    rows: BTreeMap<MonthKey, Vec<Option<f64>>>,
}

impl MonthlyTable {
    /// Create an empty table with the given column names.
    pub fn new<S: Into<String>>(columns: impl IntoIterator<Item = S>) -> Result<Self> {
        let mut names: Vec<String> = Vec::new();
        for name in columns {
            let name = name.into();
            if names.contains(&name) {
                return Err(AnalysisError::DuplicateColumn(name));
            }
            names.push(name);
        }
        Ok(Self {
            columns: names,
            rows: BTreeMap::new(),
        })
    }

    /// Single-column table from a completed series.
    pub fn from_series(name: &str, series: &GapFillResult) -> Self {
        Self {
            columns: vec![name.to_string()],
            rows: series
                .complete
                .iter()
                .map(|m| (m.key, vec![Some(m.value)]))
                .collect(),
        }
    }

    /// Melt a wide grid into a single-column table.
    ///
    /// `grid` has one row per calendar month (January first) and one column
    /// per entry of `years`.
    pub fn from_wide(name: &str, years: &[i32], grid: &[Vec<Option<f64>>]) -> Result<Self> {
        if grid.len() != 12 {
            return Err(AnalysisError::InvalidInput(format!(
                "wide grid must have 12 month rows, got {}",
                grid.len()
            )));
        }

        let mut table = Self::new([name])?;
        for (row_idx, row) in grid.iter().enumerate() {
            if row.len() != years.len() {
                return Err(AnalysisError::InvalidInput(format!(
                    "month row {} has {} cells, expected {}",
                    row_idx + 1,
                    row.len(),
                    years.len()
                )));
            }
            for (&year, &cell) in years.iter().zip(row.iter()) {
                let key = MonthKey::new(year, row_idx as u32 + 1)?;
                table.insert_row(key, vec![cell])?;
            }
        }
        Ok(table)
    }

    /// Add a row. Each month may appear only once.
    pub fn insert_row(&mut self, key: MonthKey, values: Vec<Option<f64>>) -> Result<()> {
        if values.len() != self.columns.len() {
            return Err(AnalysisError::InvalidInput(format!(
                "row {key} has {} cells, expected {}",
                values.len(),
                self.columns.len()
            )));
        }
        if self.rows.contains_key(&key) {
            return Err(AnalysisError::InvalidInput(format!("duplicate row for {key}")));
        }
        self.rows.insert(key, values);
        Ok(())
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Month keys in ascending order.
    pub fn keys(&self) -> impl Iterator<Item = &MonthKey> {
        self.rows.keys()
    }

    fn column_index(&self, name: &str) -> Result<usize> {
        self.columns
            .iter()
            .position(|c| c == name)
            .ok_or_else(|| AnalysisError::InvalidInput(format!("unknown column '{name}'")))
    }

    /// Cells of one column in month order.
    pub fn column(&self, name: &str) -> Result<Vec<Option<f64>>> {
        let idx = self.column_index(name)?;
        Ok(self.rows.values().map(|row| row[idx]).collect())
    }

    pub fn get(&self, key: &MonthKey, name: &str) -> Option<f64> {
        let idx = self.column_index(name).ok()?;
        self.rows.get(key).and_then(|row| row[idx])
    }

    /// Fill missing cells of a column. Returns how many cells were filled.
    pub fn fill_column(&mut self, name: &str, method: FillMethod) -> Result<usize> {
        let idx = self.column_index(name)?;
        let Some(first) = self.rows.keys().next().copied() else {
            return Ok(0);
        };

        let positions: Vec<i64> = self.rows.keys().map(|k| first.months_until(k)).collect();
        let values: Vec<Option<f64>> = self.rows.values().map(|row| row[idx]).collect();
        let filled = fill_cells(&positions, &values, method)?;

        let mut count = 0;
        for (row, value) in self.rows.values_mut().zip(filled) {
            if row[idx].is_none() && value.is_some() {
                count += 1;
            }
            row[idx] = value;
        }
        Ok(count)
    }

    /// Rows where every named column has a value, as one vector per column.
    pub fn complete_columns(&self, names: &[&str]) -> Result<(Vec<MonthKey>, Vec<Vec<f64>>)> {
        let indices = names
            .iter()
            .map(|name| self.column_index(name))
            .collect::<Result<Vec<_>>>()?;

        let mut keys = Vec::new();
        let mut columns = vec![Vec::new(); indices.len()];
        for (key, row) in &self.rows {
            let cells: Option<Vec<f64>> = indices.iter().map(|&i| row[i]).collect();
            if let Some(cells) = cells {
                keys.push(*key);
                for (column, cell) in columns.iter_mut().zip(cells) {
                    column.push(cell);
                }
            }
        }
        Ok((keys, columns))
    }
}

/// Inner join on month: keeps months present in both tables, with the
/// columns of `left` followed by the columns of `right`.
pub fn inner_join(left: &MonthlyTable, right: &MonthlyTable) -> Result<MonthlyTable> {
    let mut joined = MonthlyTable::new(
        left.columns
            .iter()
            .chain(right.columns.iter())
            .cloned(),
    )?;

    for (key, left_row) in &left.rows {
        if let Some(right_row) = right.rows.get(key) {
            let mut row = left_row.clone();
            row.extend_from_slice(right_row);
            joined.rows.insert(*key, row);
        }
    }
    Ok(joined)
}

/// Inner-join every table, left to right.
pub fn join_all(tables: &[MonthlyTable]) -> Result<MonthlyTable> {
    let (first, rest) = tables
        .split_first()
        .ok_or_else(|| AnalysisError::InvalidInput("no tables to join".to_string()))?;
    rest.iter()
        .try_fold(first.clone(), |acc, table| inner_join(&acc, table))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gaps::{fill_missing_months, GapFillOptions, ObservedSeries};

    fn key(year: i32, month: u32) -> MonthKey {
        MonthKey::new(year, month).unwrap()
    }

    fn table(name: &str, rows: &[((i32, u32), Option<f64>)]) -> MonthlyTable {
        let mut t = MonthlyTable::new([name]).unwrap();
        for &((y, m), v) in rows {
            t.insert_row(key(y, m), vec![v]).unwrap();
        }
        t
    }

    #[test]
    fn test_inner_join_drops_unmatched() {
        let rides = table("Rides", &[((2020, 1), Some(5.0)), ((2020, 2), Some(7.0))]);
        let temp = table("TempMean", &[((2020, 2), Some(24.1)), ((2020, 3), Some(21.0))]);

        let joined = inner_join(&rides, &temp).unwrap();
        assert_eq!(joined.columns(), &["Rides".to_string(), "TempMean".to_string()]);
        assert_eq!(joined.len(), 1);
        assert_eq!(joined.get(&key(2020, 2), "Rides"), Some(7.0));
        assert_eq!(joined.get(&key(2020, 2), "TempMean"), Some(24.1));
        assert_eq!(joined.get(&key(2020, 1), "Rides"), None);
    }

    #[test]
    fn test_join_all_folds_left_to_right() {
        let a = table("A", &[((2020, 1), Some(1.0)), ((2020, 2), Some(2.0))]);
        let b = table("B", &[((2020, 1), Some(10.0)), ((2020, 2), None)]);
        let c = table("C", &[((2020, 2), Some(200.0))]);

        let joined = join_all(&[a, b, c]).unwrap();
        assert_eq!(joined.columns().len(), 3);
        assert_eq!(joined.len(), 1);
        assert_eq!(joined.column("B").unwrap(), vec![None]);
        assert_eq!(joined.column("C").unwrap(), vec![Some(200.0)]);
    }

    #[test]
    fn test_join_rejects_column_collision() {
        let a = table("A", &[((2020, 1), Some(1.0))]);
        let err = inner_join(&a, &a).unwrap_err();
        assert!(matches!(err, AnalysisError::DuplicateColumn(_)));
        assert!(join_all(&[]).is_err());
    }

    #[test]
    fn test_from_wide_melts_months_by_year() {
        let years = [2019, 2020];
        let mut grid: Vec<Vec<Option<f64>>> = (1..=12)
            .map(|m| vec![Some(m as f64), Some(100.0 + m as f64)])
            .collect();
        grid[6][0] = None;

        let t = MonthlyTable::from_wide("TempMean", &years, &grid).unwrap();
        assert_eq!(t.len(), 24);
        assert_eq!(t.get(&key(2019, 3), "TempMean"), Some(3.0));
        assert_eq!(t.get(&key(2020, 12), "TempMean"), Some(112.0));
        assert_eq!(t.get(&key(2019, 7), "TempMean"), None);
        assert_eq!(t.keys().next(), Some(&key(2019, 1)));
    }

    #[test]
    fn test_from_wide_rejects_bad_shape() {
        let grid = vec![vec![Some(1.0)]; 13];
        assert!(MonthlyTable::from_wide("x", &[2020], &grid).is_err());
        let mut grid = vec![vec![Some(1.0)]; 12];
        grid[3] = vec![];
        assert!(MonthlyTable::from_wide("x", &[2020], &grid).is_err());
    }

    #[test]
    fn test_insert_row_validation() {
        let mut t = MonthlyTable::new(["A", "B"]).unwrap();
        assert!(t.insert_row(key(2020, 1), vec![Some(1.0)]).is_err());
        t.insert_row(key(2020, 1), vec![Some(1.0), None]).unwrap();
        assert!(t.insert_row(key(2020, 1), vec![None, None]).is_err());
        assert!(MonthlyTable::new(["A", "A"]).is_err());
    }

    #[test]
    fn test_fill_column_linear() {
        let mut t = table(
            "Hum",
            &[((2020, 1), Some(60.0)), ((2020, 2), None), ((2020, 4), Some(90.0))],
        );
        let filled = t.fill_column("Hum", FillMethod::Linear).unwrap();
        assert_eq!(filled, 1);
        assert_eq!(t.get(&key(2020, 2), "Hum"), Some(70.0));
    }

    #[test]
    fn test_complete_columns_skips_partial_rows() {
        let mut t = MonthlyTable::new(["A", "B"]).unwrap();
        t.insert_row(key(2020, 1), vec![Some(1.0), Some(2.0)]).unwrap();
        t.insert_row(key(2020, 2), vec![Some(3.0), None]).unwrap();
        t.insert_row(key(2020, 3), vec![Some(5.0), Some(6.0)]).unwrap();

        let (keys, cols) = t.complete_columns(&["A", "B"]).unwrap();
        assert_eq!(keys, vec![key(2020, 1), key(2020, 3)]);
        assert_eq!(cols, vec![vec![1.0, 5.0], vec![2.0, 6.0]]);
        assert!(t.complete_columns(&["C"]).is_err());
    }

    #[test]
    fn test_from_series() {
        let observed: ObservedSeries = [(key(2023, 1), 4.0), (key(2023, 3), 8.0)]
            .into_iter()
            .collect();
        let options = GapFillOptions {
            upper_bound: key(2023, 4),
            ..Default::default()
        };
        let filled = fill_missing_months(&observed, &options).unwrap();
        let t = MonthlyTable::from_series("Rides", &filled);
        assert_eq!(
            t.column("Rides").unwrap(),
            vec![Some(4.0), Some(6.0), Some(8.0)]
        );
    }
}
