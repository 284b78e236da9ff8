use anyhow::{bail, Context, Result};
use recorridos_core::{AnchorPolicy, FillMethod, GapFillOptions, MonthKey, Rounding};
use serde::{Deserialize, Serialize};
use std::{
    fmt::Debug,
    fs,
    ops::RangeBounds,
    path::{Path, PathBuf},
};

/// Run configuration.
///
/// Loaded from a TOML file and validated before use.
/// Relative paths are resolved against the directory of the file.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    pub trips: TripsConfig,
    pub measurements: Option<MeasurementsConfig>,
    #[serde(default)]
    pub gaps: GapsConfig,
    pub output: OutputConfig,
}

/// Raw ride records, one row per ride.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TripsConfig {
    pub path: PathBuf,
    #[serde(default = "default_date_column")]
    pub date_column: String,
    /// chrono format string; a date-only format is accepted too.
    #[serde(default = "default_date_format")]
    pub date_format: String,
    #[serde(default = "default_delimiter")]
    pub delimiter: char,
}

/// Long-format monthly weather table: `year`, `month`, then one column per measurement.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MeasurementsConfig {
    pub path: PathBuf,
    #[serde(default = "default_temperature_column")]
    pub temperature_column: String,
    /// How missing measurement cells are filled before joining.
    #[serde(default = "default_fill")]
    pub fill: String,
    #[serde(default = "default_delimiter")]
    pub delimiter: char,
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GapsConfig {
    /// Exclusive upper bound of the completed series.
    pub end_year: i32,
    pub end_month: u32,
    pub rounding: String,
    pub anchors: String,
}

impl Default for GapsConfig {
    fn default() -> Self {
        let (end_year, end_month) = recorridos_core::DEFAULT_UPPER_BOUND;
        Self {
            end_year,
            end_month,
            rounding: String::from("nearest"),
            anchors: String::from("strict"),
        }
    }
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OutputConfig {
    pub series_path: PathBuf,
    pub report_path: Option<PathBuf>,
    pub max_lag: Option<usize>,
}

fn default_date_column() -> String {
    String::from("fecha_origen_recorrido")
}

fn default_date_format() -> String {
    String::from("%Y-%m-%d %H:%M:%S")
}

fn default_delimiter() -> char {
    ','
}

fn default_temperature_column() -> String {
    String::from("TempMean")
}

fn default_fill() -> String {
    String::from("none")
}

impl Config {
    /// Load a [`Config`] from a TOML file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read, deserialized,
    /// or if the configuration values are invalid.
    pub fn from_file<P: AsRef<Path>>(file: P) -> Result<Self> {
        let file = file.as_ref();
        let contents =
            fs::read_to_string(file).with_context(|| format!("failed to read {file:?}"))?;

        let mut config: Config =
            toml::from_str(&contents).context("failed to deserialize config")?;

        let base_dir = file.parent().unwrap_or_else(|| Path::new("."));
        config.resolve_paths(base_dir);

        config.validate().context("failed to validate config")?;

        Ok(config)
    }

    fn resolve_paths(&mut self, base_dir: &Path) {
        let resolve = |path: &mut PathBuf| {
            if path.is_relative() {
                *path = base_dir.join(&*path);
            }
        };
        resolve(&mut self.trips.path);
        if let Some(measurements) = self.measurements.as_mut() {
            resolve(&mut measurements.path);
        }
        resolve(&mut self.output.series_path);
        if let Some(report_path) = self.output.report_path.as_mut() {
            resolve(report_path);
        }
    }

    pub fn validate(&self) -> Result<()> {
        check_text(&self.trips.date_column).context("invalid trips date column")?;
        check_text(&self.trips.date_format).context("invalid trips date format")?;

        if let Some(measurements) = &self.measurements {
            check_text(&measurements.temperature_column)
                .context("invalid temperature column")?;
            measurements
                .fill
                .parse::<FillMethod>()
                .context("invalid measurement fill method")?;
        }

        check_num(self.gaps.end_year, 1900..=2100).context("invalid end year")?;
        check_num(self.gaps.end_month, 1..=12).context("invalid end month")?;
        self.gaps
            .rounding
            .parse::<Rounding>()
            .context("invalid rounding")?;
        self.gaps
            .anchors
            .parse::<AnchorPolicy>()
            .context("invalid anchor policy")?;

        if let Some(max_lag) = self.output.max_lag {
            check_num(max_lag, 1..=1200).context("invalid maximum lag")?;
        }

        Ok(())
    }

    /// Gap-filling options, with an optional override of the upper bound.
    pub fn gap_fill_options(
        &self,
        end_year: Option<i32>,
        end_month: Option<u32>,
    ) -> Result<GapFillOptions> {
        let year = end_year.unwrap_or(self.gaps.end_year);
        let month = end_month.unwrap_or(self.gaps.end_month);
        check_num(year, 1900..=2100).context("invalid end year")?;

        Ok(GapFillOptions {
            upper_bound: MonthKey::new(year, month).context("invalid upper bound")?,
            rounding: self.gaps.rounding.parse()?,
            anchors: self.gaps.anchors.parse()?,
        })
    }
}

fn check_num<T, R>(num: T, range: R) -> Result<()>
where
    T: PartialOrd + Debug,
    R: RangeBounds<T> + Debug,
{
    if !range.contains(&num) {
        bail!("number must be in the range {range:?}, but is {num:?}");
    }
    Ok(())
}

fn check_text(text: &str) -> Result<()> {
    if text.trim().is_empty() {
        bail!("value must not be empty");
    }
    Ok(())
}
