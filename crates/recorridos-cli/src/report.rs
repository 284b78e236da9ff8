use anyhow::{Context, Result};
use recorridos_core::{CrossCorrelation, GapFillResult, LinearTrend, Rounding};
use serde::Serialize;
use std::{fs::File, io::BufWriter, path::Path};

/// One row of the completed series CSV.
#[derive(Debug, Serialize)]
struct SeriesRecord<'a> {
    year: i32,
    month_number: u32,
    month_name: &'a str,
    count: Count,
    is_imputed: bool,
}

/// Rounded series are written as integers.
#[derive(Debug, Serialize)]
#[serde(untagged)]
enum Count {
    Whole(i64),
    Fractional(f64),
}

impl Count {
    fn new(value: f64, rounding: Rounding) -> Self {
        match rounding {
            Rounding::Nearest => Count::Whole(value.round() as i64),
            Rounding::None => Count::Fractional(value),
        }
    }
}

/// Write the completed series as CSV, one row per month.
pub fn write_series_csv<P: AsRef<Path>>(
    file: P,
    result: &GapFillResult,
    rounding: Rounding,
) -> Result<()> {
    let file = file.as_ref();
    if let Some(parent) = file.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {parent:?}"))?;
    }
    let mut writer =
        csv::Writer::from_path(file).with_context(|| format!("failed to create {file:?}"))?;

    for month in &result.complete {
        writer.serialize(SeriesRecord {
            year: month.key.year(),
            month_number: month.key.month(),
            month_name: month.key.month_name(),
            count: Count::new(month.value, rounding),
            is_imputed: month.imputed,
        })?;
    }
    writer
        .flush()
        .with_context(|| format!("failed to write {file:?}"))?;

    log::info!("wrote {} months to {file:?}", result.complete.len());
    Ok(())
}

#[derive(Debug, Serialize)]
pub struct ImputedMonth {
    pub month: String,
    pub value: f64,
}

#[derive(Debug, Serialize)]
pub struct CorrelationReport {
    pub coefficients: Vec<f64>,
    pub bound: f64,
    pub significant_lags: Vec<usize>,
}

impl From<&CrossCorrelation> for CorrelationReport {
    fn from(ccf: &CrossCorrelation) -> Self {
        Self {
            coefficients: ccf.coefficients.clone(),
            bound: ccf.bound,
            significant_lags: ccf.significant_lags(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct TrendReport {
    pub slope: f64,
    pub intercept: f64,
    pub points: usize,
}

impl From<&LinearTrend> for TrendReport {
    fn from(trend: &LinearTrend) -> Self {
        Self {
            slope: trend.slope,
            intercept: trend.intercept,
            points: trend.fitted.len(),
        }
    }
}

/// Summary of a gap-fill run and its comparison against the measurements.
#[derive(Debug, Serialize)]
pub struct AnalysisReport {
    pub first_month: String,
    pub end_month: String,
    pub months: usize,
    pub observed: usize,
    pub imputed: Vec<ImputedMonth>,
    pub series_mean: f64,
    pub mean_fallbacks: usize,
    pub temperature_column: String,
    pub measurement_cells_filled: usize,
    pub joined_months: usize,
    pub pearson: f64,
    pub cross_correlation: CorrelationReport,
    /// Annual mean rides against year; `None` with less than two years.
    pub rides_trend: Option<TrendReport>,
    /// Annual mean temperature against year.
    pub temperature_trend: Option<TrendReport>,
}

impl AnalysisReport {
    pub fn imputed_months(result: &GapFillResult) -> Vec<ImputedMonth> {
        result
            .imputed
            .iter()
            .map(|(key, &value)| ImputedMonth {
                month: key.to_string(),
                value,
            })
            .collect()
    }

    pub fn save<P: AsRef<Path>>(&self, file: P) -> Result<()> {
        let file = file.as_ref();
        if let Some(parent) = file.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {parent:?}"))?;
        }
        let handle = File::create(file).with_context(|| format!("failed to create {file:?}"))?;
        let writer = BufWriter::new(handle);

        serde_json::to_writer_pretty(writer, self)
            .with_context(|| format!("failed to write {file:?}"))?;
        log::info!("wrote report to {file:?}");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use recorridos_core::{fill_missing_months, GapFillOptions, MonthKey, ObservedSeries};
    use std::{env, fs};

    #[test]
    fn test_write_series_csv() {
        let observed: ObservedSeries = [
            (MonthKey::new(2020, 1).unwrap(), 5.0),
            (MonthKey::new(2020, 3).unwrap(), 15.0),
        ]
        .into_iter()
        .collect();
        let options = GapFillOptions {
            upper_bound: MonthKey::new(2020, 4).unwrap(),
            ..Default::default()
        };
        let result = fill_missing_months(&observed, &options).unwrap();

        let path = env::temp_dir()
            .join("recorridos-report-tests")
            .join("series.csv");
        write_series_csv(&path, &result, Rounding::Nearest).unwrap();

        let text = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(
            lines,
            vec![
                "year,month_number,month_name,count,is_imputed",
                "2020,1,Enero,5,false",
                "2020,2,Febrero,10,true",
                "2020,3,Marzo,15,false",
            ]
        );
    }

    #[test]
    fn test_write_series_csv_fractional() {
        let observed: ObservedSeries = [
            (MonthKey::new(2020, 1).unwrap(), 0.0),
            (MonthKey::new(2020, 5).unwrap(), 30.0),
        ]
        .into_iter()
        .collect();
        let options = GapFillOptions {
            upper_bound: MonthKey::new(2020, 6).unwrap(),
            rounding: Rounding::None,
            ..Default::default()
        };
        let result = fill_missing_months(&observed, &options).unwrap();

        let path = env::temp_dir()
            .join("recorridos-report-tests")
            .join("series_fractional.csv");
        write_series_csv(&path, &result, Rounding::None).unwrap();

        let text = fs::read_to_string(&path).unwrap();
        let counts: Vec<&str> = text
            .lines()
            .skip(1)
            .filter_map(|line| line.split(',').nth(3))
            .collect();
        assert_eq!(counts, vec!["0.0", "7.5", "15.0", "22.5", "30.0"]);
    }

    #[test]
    fn test_significant_lags_in_report() {
        let ccf = CrossCorrelation {
            coefficients: vec![0.9, 0.1, -0.6],
            bound: 0.5,
        };
        let report = CorrelationReport::from(&ccf);
        assert_eq!(report.significant_lags, vec![0, 2]);
    }
}
