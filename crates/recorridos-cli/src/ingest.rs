//! CSV ingest of ride records and monthly measurement tables.
//!
//! Bad rows are skipped and reported; a file without any usable row is an error.

use crate::config::{MeasurementsConfig, TripsConfig};
use anyhow::{bail, Context, Result};
use chrono::{NaiveDate, NaiveDateTime};
use csv::StringRecord;
use recorridos_core::{MonthKey, MonthNumber, MonthlyTable};
use std::{collections::HashMap, fs::File, path::Path};

/// Number of skipped rows logged individually before only counting.
const MAX_LOGGED_ROW_ERRORS: usize = 10;

/// Cell contents that stand for a missing measurement.
const MISSING_MARKERS: [&str; 6] = ["", "…", "...", "-", "nan", "s/d"];

/// A row that could not be used.
#[derive(Debug, Clone)]
pub struct RowError {
    pub line: usize,
    pub message: String,
}

/// Dates of all rides that could be parsed.
#[derive(Debug, Clone)]
pub struct TripDates {
    pub dates: Vec<NaiveDate>,
    pub rows_read: usize,
    pub row_errors: Vec<RowError>,
}

/// Measurement table plus the rows that were skipped.
#[derive(Debug, Clone)]
pub struct Measurements {
    pub table: MonthlyTable,
    pub rows_read: usize,
    pub row_errors: Vec<RowError>,
}

fn open_reader(path: &Path, delimiter: char) -> Result<csv::Reader<File>> {
    if !delimiter.is_ascii() {
        bail!("delimiter must be an ASCII character, but is {delimiter:?}");
    }
    let file = File::open(path).with_context(|| format!("failed to open {path:?}"))?;
    Ok(csv::ReaderBuilder::new()
        .delimiter(delimiter as u8)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(file))
}

fn build_header_map(headers: &StringRecord) -> HashMap<String, usize> {
    headers
        .iter()
        .enumerate()
        .map(|(idx, name)| (normalize_header_name(name), idx))
        .collect()
}

fn normalize_header_name(name: &str) -> String {
    // Spreadsheet exports may prefix the first header with a BOM.
    name.trim().trim_start_matches('\u{feff}').to_lowercase()
}

fn find_column(header_map: &HashMap<String, usize>, candidates: &[&str]) -> Option<usize> {
    candidates
        .iter()
        .find_map(|name| header_map.get(&normalize_header_name(name)).copied())
}

fn log_row_errors(path: &Path, row_errors: &[RowError]) {
    for error in row_errors.iter().take(MAX_LOGGED_ROW_ERRORS) {
        log::warn!("{path:?} line {}: {}", error.line, error.message);
    }
    if row_errors.len() > MAX_LOGGED_ROW_ERRORS {
        log::warn!(
            "{path:?}: {} more rows skipped",
            row_errors.len() - MAX_LOGGED_ROW_ERRORS
        );
    }
}

/// Parse a ride timestamp, accepting date-only formats.
pub fn parse_trip_date(text: &str, format: &str) -> Result<NaiveDate> {
    if let Ok(datetime) = NaiveDateTime::parse_from_str(text, format) {
        return Ok(datetime.date());
    }
    NaiveDate::parse_from_str(text, format)
        .with_context(|| format!("date {text:?} does not match format {format:?}"))
}

/// Parse a measurement cell; missing markers become `None`.
pub fn parse_cell(text: &str) -> Result<Option<f64>> {
    let trimmed = text.trim();
    if MISSING_MARKERS.contains(&trimmed.to_lowercase().as_str()) {
        return Ok(None);
    }
    // Spanish-locale exports: `.` groups thousands and `,` is the decimal mark.
    let normalized = if trimmed.contains(',') {
        trimmed.replace('.', "").replace(',', ".")
    } else {
        trimmed.to_string()
    };
    let value: f64 = normalized
        .parse()
        .with_context(|| format!("cell {trimmed:?} is not a number"))?;
    Ok(value.is_finite().then_some(value))
}

/// Load the date of every ride.
pub fn load_trip_dates(config: &TripsConfig) -> Result<TripDates> {
    let path = config.path.as_path();
    let mut reader = open_reader(path, config.delimiter)?;

    let headers = reader
        .headers()
        .with_context(|| format!("failed to read headers of {path:?}"))?
        .clone();
    let header_map = build_header_map(&headers);
    let date_idx = find_column(&header_map, &[&config.date_column])
        .with_context(|| format!("{path:?} has no column {:?}", config.date_column))?;

    let mut dates = Vec::new();
    let mut row_errors = Vec::new();
    let mut rows_read = 0usize;

    for (idx, result) in reader.records().enumerate() {
        // Data rows start on line 2.
        let line = idx + 2;
        rows_read += 1;

        let parsed = result
            .context("CSV parse error")
            .and_then(|record| {
                record
                    .get(date_idx)
                    .map(str::to_string)
                    .context("row has no date cell")
            })
            .and_then(|cell| parse_trip_date(&cell, &config.date_format));

        match parsed {
            Ok(date) => dates.push(date),
            Err(e) => row_errors.push(RowError {
                line,
                message: format!("{e:#}"),
            }),
        }
    }

    log_row_errors(path, &row_errors);
    if dates.is_empty() {
        bail!("{path:?} has no valid ride rows ({rows_read} read)");
    }
    log::info!(
        "loaded {} rides from {path:?} ({} rows skipped)",
        dates.len(),
        row_errors.len()
    );

    Ok(TripDates {
        dates,
        rows_read,
        row_errors,
    })
}

/// Load a long-format monthly measurement table.
///
/// The first columns named `year`/`año` and `month`/`mes` locate the month;
/// every other column becomes a measurement column.
pub fn load_measurements(config: &MeasurementsConfig) -> Result<Measurements> {
    let path = config.path.as_path();
    let mut reader = open_reader(path, config.delimiter)?;

    let headers = reader
        .headers()
        .with_context(|| format!("failed to read headers of {path:?}"))?
        .clone();
    let header_map = build_header_map(&headers);
    let year_idx = find_column(&header_map, &["year", "año", "anio"])
        .with_context(|| format!("{path:?} has no year column"))?;
    let month_idx = find_column(&header_map, &["month", "mes"])
        .with_context(|| format!("{path:?} has no month column"))?;

    let value_columns: Vec<(usize, String)> = headers
        .iter()
        .enumerate()
        .filter(|(idx, _)| *idx != year_idx && *idx != month_idx)
        .map(|(idx, name)| (idx, name.trim().trim_start_matches('\u{feff}').to_string()))
        .collect();
    if value_columns.is_empty() {
        bail!("{path:?} has no measurement columns");
    }

    let mut table = MonthlyTable::new(value_columns.iter().map(|(_, name)| name.clone()))
        .with_context(|| format!("invalid columns in {path:?}"))?;
    let mut row_errors = Vec::new();
    let mut rows_read = 0usize;

    for (idx, result) in reader.records().enumerate() {
        let line = idx + 2;
        rows_read += 1;

        let parsed = result.context("CSV parse error").and_then(|record| {
            let key = parse_month_key(&record, year_idx, month_idx)?;
            let cells = value_columns
                .iter()
                .map(|(col, name)| {
                    parse_cell(record.get(*col).unwrap_or(""))
                        .with_context(|| format!("invalid value in column {name:?}"))
                })
                .collect::<Result<Vec<_>>>()?;
            table.insert_row(key, cells)?;
            Ok(())
        });

        if let Err(e) = parsed {
            row_errors.push(RowError {
                line,
                message: format!("{e:#}"),
            });
        }
    }

    log_row_errors(path, &row_errors);
    if table.is_empty() {
        bail!("{path:?} has no valid measurement rows ({rows_read} read)");
    }
    log::info!(
        "loaded {} months x {} columns from {path:?} ({} rows skipped)",
        table.len(),
        table.columns().len(),
        row_errors.len()
    );

    Ok(Measurements {
        table,
        rows_read,
        row_errors,
    })
}

fn parse_month_key(record: &StringRecord, year_idx: usize, month_idx: usize) -> Result<MonthKey> {
    let year_text = record.get(year_idx).context("row has no year cell")?;
    let year: i32 = year_text
        .parse()
        .with_context(|| format!("year {year_text:?} is not a number"))?;
    let month_text = record.get(month_idx).context("row has no month cell")?;
    let MonthNumber(month) = month_text.parse::<MonthNumber>()?;
    Ok(MonthKey::new(year, month)?)
}
