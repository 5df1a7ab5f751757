//! CSV ingest for offline analysis.
//!
//! A data directory holds one CSV per record kind:
//!
//! - `raw.csv`: `timestamp,raw` (`raw` may be empty)
//! - `checks.csv`: `timestamp,glucose[,calibration]`
//! - `sensor_starts.csv`: `timestamp`
//! - `calibrations.csv` (optional): `timestamp,slope,intercept`
//!
//! Timestamps are RFC 3339 or epoch milliseconds. Bad rows are skipped and
//! reported; missing files or columns are hard errors (exit code 2).

use std::collections::HashMap;
use std::fs::File;
use std::path::Path;

use chrono::{DateTime, Utc};
use csv::StringRecord;

use crate::data::MemoryStore;
use crate::domain::{CalibrationRecord, FingerCheck, RawEntry};
use crate::error::AppError;

pub const RAW_FILE: &str = "raw.csv";
pub const CHECKS_FILE: &str = "checks.csv";
pub const SENSOR_STARTS_FILE: &str = "sensor_starts.csv";
pub const CALIBRATIONS_FILE: &str = "calibrations.csv";

/// A row-level error encountered during ingest.
#[derive(Debug, Clone)]
pub struct RowError {
    pub file: &'static str,
    pub line: usize,
    pub message: String,
}

/// Ingest output: the populated store plus any skipped rows.
#[derive(Debug, Clone)]
pub struct IngestedData {
    pub store: MemoryStore,
    pub row_errors: Vec<RowError>,
    pub rows_read: usize,
}

/// Load every CSV in `dir` into a `MemoryStore`.
pub fn load_store(dir: &Path) -> Result<IngestedData, AppError> {
    let mut row_errors = Vec::new();
    let mut rows_read = 0usize;

    let raw = read_rows(dir, RAW_FILE, &["timestamp", "raw"], &mut row_errors, &mut rows_read, |r| {
        Ok(RawEntry {
            timestamp: parse_timestamp(r.required("timestamp")?)?,
            raw: r.optional("raw").map(parse_f64).transpose()?,
        })
    })?;

    let checks = read_rows(
        dir,
        CHECKS_FILE,
        &["timestamp", "glucose"],
        &mut row_errors,
        &mut rows_read,
        |r| {
            Ok(FingerCheck {
                timestamp: parse_timestamp(r.required("timestamp")?)?,
                glucose: parse_f64(r.required("glucose")?)?,
                is_calibration: r
                    .optional("calibration")
                    .map(parse_bool)
                    .transpose()?
                    .unwrap_or(false),
            })
        },
    )?;

    let starts = read_rows(
        dir,
        SENSOR_STARTS_FILE,
        &["timestamp"],
        &mut row_errors,
        &mut rows_read,
        |r| parse_timestamp(r.required("timestamp")?),
    )?;

    let calibrations = if dir.join(CALIBRATIONS_FILE).exists() {
        read_rows(
            dir,
            CALIBRATIONS_FILE,
            &["timestamp", "slope", "intercept"],
            &mut row_errors,
            &mut rows_read,
            |r| {
                Ok(CalibrationRecord {
                    timestamp: parse_timestamp(r.required("timestamp")?)?,
                    slope: parse_f64(r.required("slope")?)?,
                    intercept: parse_f64(r.required("intercept")?)?,
                })
            },
        )?
    } else {
        Vec::new()
    };

    for e in &row_errors {
        log::warn!("{}:{}: {}", e.file, e.line, e.message);
    }
    log::info!(
        "Loaded {} raw entries, {} finger checks, {} sensor starts, {} calibrations from {}.",
        raw.len(),
        checks.len(),
        starts.len(),
        calibrations.len(),
        dir.display()
    );

    let store = MemoryStore::new()
        .with_raw_entries(raw)
        .with_finger_checks(checks)
        .with_sensor_starts(starts)
        .with_calibrations(calibrations);

    Ok(IngestedData {
        store,
        row_errors,
        rows_read,
    })
}

/// A CSV record with named column access.
struct Row<'a> {
    record: &'a StringRecord,
    header_map: &'a HashMap<String, usize>,
}

impl<'a> Row<'a> {
    fn required(&self, name: &str) -> Result<&'a str, String> {
        self.optional(name)
            .ok_or_else(|| format!("Missing required value: `{name}`"))
    }

    fn optional(&self, name: &str) -> Option<&'a str> {
        let idx = self.header_map.get(name)?;
        self.record.get(*idx).map(str::trim).filter(|s| !s.is_empty())
    }
}

fn read_rows<T>(
    dir: &Path,
    file_name: &'static str,
    required_columns: &[&str],
    row_errors: &mut Vec<RowError>,
    rows_read: &mut usize,
    parse: impl Fn(&Row<'_>) -> Result<T, String>,
) -> Result<Vec<T>, AppError> {
    let path = dir.join(file_name);
    let file = File::open(&path)
        .map_err(|e| AppError::new(2, format!("Failed to open CSV '{}': {e}", path.display())))?;

    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(file);

    let headers = reader
        .headers()
        .map_err(|e| AppError::new(2, format!("Failed to read CSV headers of '{file_name}': {e}")))?
        .clone();
    let header_map = build_header_map(&headers);

    for col in required_columns {
        if !header_map.contains_key(*col) {
            return Err(AppError::new(
                2,
                format!("Missing required column in {file_name}: `{col}`"),
            ));
        }
    }

    let mut out = Vec::new();
    for (idx, result) in reader.records().enumerate() {
        // +2: 1-based lines, plus the header line.
        let line = idx + 2;
        *rows_read += 1;

        let parsed = result
            .map_err(|e| format!("CSV parse error: {e}"))
            .and_then(|record| {
                parse(&Row {
                    record: &record,
                    header_map: &header_map,
                })
            });

        match parsed {
            Ok(v) => out.push(v),
            Err(message) => row_errors.push(RowError {
                file: file_name,
                line,
                message,
            }),
        }
    }

    Ok(out)
}

fn build_header_map(headers: &StringRecord) -> HashMap<String, usize> {
    headers
        .iter()
        .enumerate()
        .map(|(idx, name)| (normalize_header_name(name), idx))
        .collect()
}

fn normalize_header_name(name: &str) -> String {
    // Spreadsheet exports sometimes prefix the first header with a UTF-8 BOM.
    let name = name.trim().trim_start_matches('\u{feff}');
    name.to_ascii_lowercase()
}

/// RFC 3339, or integer epoch milliseconds (Nightscout's `date` field).
pub fn parse_timestamp(s: &str) -> Result<DateTime<Utc>, String> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }
    s.parse::<i64>()
        .ok()
        .and_then(DateTime::<Utc>::from_timestamp_millis)
        .ok_or_else(|| format!("Invalid timestamp '{s}'. Expected RFC 3339 or epoch milliseconds."))
}

fn parse_f64(s: &str) -> Result<f64, String> {
    match s.parse::<f64>() {
        Ok(v) if v.is_finite() => Ok(v),
        _ => Err(format!("Invalid number '{s}'.")),
    }
}

fn parse_bool(s: &str) -> Result<bool, String> {
    match s.to_ascii_lowercase().as_str() {
        "true" | "yes" | "y" | "1" => Ok(true),
        "false" | "no" | "n" | "0" => Ok(false),
        _ => Err(format!("Invalid boolean '{s}'.")),
    }
}
