use crate::config::Config;
use crate::ingest::{load_measurements, load_trip_dates};
use crate::report::{write_series_csv, AnalysisReport, CorrelationReport, TrendReport};
use anyhow::{bail, Context, Result};
use recorridos_core::{
    annual_means, count_by_month, cross_correlation, expected_range, fill_missing_months,
    inner_join, linear_trend, missing_months, pearson, FillMethod, GapFillOptions, GapFillResult,
    LinearTrend, MonthKey, MonthlyTable, ObservedSeries,
};

/// Column holding the ride counts in joined tables.
const COUNT_COLUMN: &str = "recorridos";

pub struct Pipeline {
    cfg: Config,
    options: GapFillOptions,
}

impl Pipeline {
    pub fn new(cfg: Config, options: GapFillOptions) -> Self {
        log::info!("{cfg:#?}");
        log::info!("{options:?}");
        Self { cfg, options }
    }

    fn load_observed(&self) -> Result<ObservedSeries> {
        let trips = load_trip_dates(&self.cfg.trips).context("failed to load trips")?;
        let observed = count_by_month(trips.dates.iter().copied());
        log::info!(
            "aggregated {} rides into {} months",
            trips.dates.len(),
            observed.len()
        );
        Ok(observed)
    }

    /// Complete the monthly ride counts and write them as CSV.
    pub fn fill(&self) -> Result<GapFillResult> {
        let observed = self.load_observed()?;

        let result =
            fill_missing_months(&observed, &self.options).context("failed to fill gaps")?;
        log::info!(
            "completed {} months, {} imputed",
            result.complete.len(),
            result.imputed.len()
        );
        if result.mean_fallbacks > 0 {
            log::warn!(
                "{} anchors fell back to the series mean {}",
                result.mean_fallbacks,
                result.series_mean
            );
        }

        write_series_csv(&self.cfg.output.series_path, &result, self.options.rounding)
            .context("failed to write series")?;

        Ok(result)
    }

    /// Fill the series, then compare it with the measurement table.
    pub fn analyze(&self) -> Result<AnalysisReport> {
        let Some(measurements_cfg) = &self.cfg.measurements else {
            bail!("analysis requires a [measurements] section in the config");
        };
        let result = self.fill()?;

        let mut measurements =
            load_measurements(measurements_cfg).context("failed to load measurements")?;
        let temperature_column = measurements_cfg.temperature_column.as_str();
        let fill_method = measurements_cfg.fill.parse::<FillMethod>()?;
        let cells_filled = measurements
            .table
            .fill_column(temperature_column, fill_method)
            .with_context(|| format!("failed to fill column {temperature_column:?}"))?;
        if cells_filled > 0 {
            log::info!("filled {cells_filled} missing {temperature_column:?} cells");
        }

        let rides = MonthlyTable::from_series(COUNT_COLUMN, &result);
        let joined = inner_join(&rides, &measurements.table).context("failed to join tables")?;
        let (keys, columns) = joined.complete_columns(&[COUNT_COLUMN, temperature_column])?;
        let [counts, temperatures] = columns.as_slice() else {
            bail!("joined table returned {} columns", columns.len());
        };
        log::info!(
            "{} of {} months have both rides and {temperature_column:?}",
            keys.len(),
            joined.len()
        );

        let r = pearson(counts, temperatures).context("failed to correlate")?;

        let max_lag = self.cfg.output.max_lag.map(|lag| {
            let limit = keys.len().saturating_sub(1);
            if lag > limit {
                log::warn!("maximum lag {lag} reduced to {limit}");
            }
            lag.min(limit)
        });
        let ccf = cross_correlation(counts, temperatures, max_lag)
            .context("failed to cross-correlate")?;

        let rides_trend = annual_trend(&keys, counts).context("failed to fit ride trend")?;
        let temperature_trend =
            annual_trend(&keys, temperatures).context("failed to fit temperature trend")?;

        let report = AnalysisReport {
            first_month: result
                .complete
                .first()
                .map(|m| m.key.to_string())
                .unwrap_or_default(),
            end_month: self.options.upper_bound.to_string(),
            months: result.complete.len(),
            observed: result.complete.len() - result.imputed.len(),
            imputed: AnalysisReport::imputed_months(&result),
            series_mean: result.series_mean,
            mean_fallbacks: result.mean_fallbacks,
            temperature_column: temperature_column.to_string(),
            measurement_cells_filled: cells_filled,
            joined_months: keys.len(),
            pearson: r,
            cross_correlation: CorrelationReport::from(&ccf),
            rides_trend: rides_trend.as_ref().map(TrendReport::from),
            temperature_trend: temperature_trend.as_ref().map(TrendReport::from),
        };
        log::info!(
            "pearson = {:.3}, {} significant lags",
            report.pearson,
            report.cross_correlation.significant_lags.len()
        );

        if let Some(report_path) = &self.cfg.output.report_path {
            report.save(report_path).context("failed to save report")?;
        }

        Ok(report)
    }

    /// Print the expected range and the months without observations.
    pub fn months(&self) -> Result<Vec<MonthKey>> {
        let observed = self.load_observed()?;
        let upper_bound = self.options.upper_bound;

        let range = expected_range(&observed, upper_bound)?;
        let total = range.len();
        let missing: Vec<MonthKey> = missing_months(&observed, upper_bound)?
            .into_iter()
            .collect();

        if let Some(first) = observed.keys().next() {
            println!(
                "expected range: {}..{} ({total} months)",
                MonthKey::january(first.year()),
                upper_bound
            );
        }
        println!("missing months: {}", missing.len());
        for key in &missing {
            println!("{key} {}", key.month_name());
        }

        Ok(missing)
    }
}

/// Line through the annual means against the year, if at least two years have values.
fn annual_trend(keys: &[MonthKey], values: &[f64]) -> Result<Option<LinearTrend>> {
    let (years, means) = annual_means(keys, values)?;
    if years.len() < 2 {
        log::warn!("trend skipped: {} year(s) of joined data", years.len());
        return Ok(None);
    }
    Ok(Some(linear_trend(&years, &means)?))
}
