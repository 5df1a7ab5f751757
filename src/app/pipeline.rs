//! Shared analysis workflows used by the CLI commands.
//!
//! Keeping these here keeps `app` focused on dispatch and printing:
//! source -> segmentation / retrieval -> fits -> summaries

use crate::calibration::{CheckFilter, device_calibration, points_in_range, segment_from_source};
use crate::cli::SourceArgs;
use crate::data::{DataSource, NightscoutClient, NightscoutConfig};
use crate::domain::{Point, TimeRange};
use crate::error::AppError;
use crate::io::load_store;
use crate::report::{FitOutcome, SensorSummary, summarise_sensor};

/// Build the data source selected on the command line.
pub fn open_source(args: &SourceArgs) -> Result<Box<dyn DataSource>, AppError> {
    if let Some(dir) = &args.csv_dir {
        let ingested = load_store(dir)?;
        if !ingested.row_errors.is_empty() {
            log::warn!(
                "Skipped {} of {} CSV rows; see warnings above.",
                ingested.row_errors.len(),
                ingested.rows_read
            );
        }
        log::info!("Loaded {} raw readings from {}.", ingested.store.raw_len(), dir.display());
        return Ok(Box::new(ingested.store));
    }

    let config = match &args.url {
        Some(url) => {
            dotenvy::dotenv().ok();
            let token = args
                .token
                .clone()
                .or_else(|| std::env::var("NIGHTSCOUT_TOKEN").ok());
            NightscoutConfig::new(url.clone(), token)
        }
        None => {
            let mut config = NightscoutConfig::from_env()?;
            if args.token.is_some() {
                config.token = args.token.clone();
            }
            config
        }
    };

    Ok(Box::new(NightscoutClient::new(config)?))
}

/// Segment the latest `limit` sensors and summarise each one.
pub fn run_sensors<S: DataSource + ?Sized>(
    source: &S,
    limit: usize,
) -> Result<Vec<SensorSummary>, AppError> {
    if limit == 0 {
        return Err(AppError::new(2, "Sensor limit must be at least 1."));
    }

    let sensors = segment_from_source(source, limit)?;

    let mut summaries = Vec::with_capacity(sensors.len());
    for sensor in sensors {
        let device = device_calibration(source, sensor.window())?;
        summaries.push(summarise_sensor(sensor, device));
    }
    Ok(summaries)
}

/// Points and fit for the finger checks in `range`.
pub fn run_fit<S: DataSource + ?Sized>(
    source: &S,
    range: TimeRange,
    filter: CheckFilter,
) -> Result<(Vec<Point>, FitOutcome), AppError> {
    if range.end.is_some_and(|end| end <= range.start) {
        return Err(AppError::new(2, "`--to` must be later than `--from`."));
    }

    let points = points_in_range(source, range, filter)?;
    if points.is_empty() {
        return Err(AppError::new(3, "No finger checks with raw readings in the requested range."));
    }
    let outcome = FitOutcome::from_points(&points);
    Ok((points, outcome))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::MemoryStore;
    use crate::domain::{CalibrationRecord, FingerCheck, RawEntry};
    use chrono::{DateTime, TimeZone, Utc};

    fn ts(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    /// Raw follows raw = 1000 * glucose + 5000 for a glucose trace of t / 10.
    fn store() -> MemoryStore {
        MemoryStore::new()
            .with_raw_entries((0..=200).map(|i| RawEntry {
                timestamp: ts(i * 10),
                raw: Some(1000.0 * i as f64 + 5000.0),
            }))
            .with_sensor_starts([ts(0), ts(1000)])
            .with_finger_checks([55, 70, 100, 130, 150, 180].map(|g| FingerCheck {
                timestamp: ts(g * 10 + 5),
                glucose: g as f64,
                is_calibration: g % 2 == 0,
            }))
            .with_calibrations([
                CalibrationRecord {
                    timestamp: ts(995),
                    slope: 1004.0,
                    intercept: 8331.0,
                },
                CalibrationRecord {
                    timestamp: ts(1100),
                    slope: 970.0,
                    intercept: 13_481.0,
                },
            ])
    }

    #[test]
    fn sensors_are_summarised_with_device_calibration() {
        let summaries = run_sensors(&store(), 5).unwrap();
        assert_eq!(summaries.len(), 2);

        // The check at t=1005 falls after the second sensor start.
        let newest = &summaries[0];
        assert_eq!(newest.n_points, 4);
        assert_eq!(newest.device_calibration.unwrap().slope, 970.0);

        // The record at t=995 was reported during the first sensor.
        let oldest = &summaries[1];
        assert_eq!(oldest.n_points, 2);
        assert_eq!(oldest.device_calibration.unwrap().slope, 1004.0);
    }

    #[test]
    fn fit_over_range_recovers_the_generating_line() {
        let range = TimeRange::unbounded(ts(0));
        let (points, outcome) = run_fit(&store(), range, CheckFilter::All).unwrap();
        assert_eq!(points.len(), 6);
        let cal = outcome.calibration().unwrap();
        // Interpolated raw sits halfway between readings: +500 on the intercept.
        assert!((cal.slope - 1000.0).abs() < 1e-6, "slope={}", cal.slope);
        assert!((cal.intercept - 5500.0).abs() < 1e-3, "intercept={}", cal.intercept);
    }

    #[test]
    fn empty_or_inverted_ranges_are_rejected() {
        let inverted = TimeRange::new(ts(10), Some(ts(5)));
        let err = run_fit(&store(), inverted, CheckFilter::All).unwrap_err();
        assert_eq!(err.exit_code(), 2);

        let err = run_fit(&store(), TimeRange::unbounded(ts(5000)), CheckFilter::All).unwrap_err();
        assert_eq!(err.exit_code(), 3);

        assert_eq!(run_sensors(&store(), 0).unwrap_err().exit_code(), 2);
    }
}
