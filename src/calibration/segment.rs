//! Partition finger checks into per-sensor lifetime windows.
//!
//! Window `i` is the open interval `(starts[i], starts[i - 1])`; the most recent
//! sensor (`i = 0`) has no upper bound. Each check inside a window is paired
//! with the interpolated raw value at its timestamp. Checks that fall in a data
//! gap are dropped from their window without affecting the others.

use chrono::{DateTime, Utc};
use rayon::prelude::*;

use crate::calibration::interpolate::point_for_check;
use crate::data::DataSource;
use crate::domain::{FingerCheck, Point, Sensor, TimeRange};
use crate::error::CalibrationError;

/// Lifetime windows for `sensor_starts` (most recent first), in the same order.
pub fn sensor_windows(sensor_starts: &[DateTime<Utc>]) -> Vec<TimeRange> {
    sensor_starts
        .iter()
        .enumerate()
        .map(|(i, &start)| {
            let end = i.checked_sub(1).map(|prev| sensor_starts[prev]);
            TimeRange::new(start, end)
        })
        .collect()
}

/// Build one `Sensor` per entry of `sensor_starts`.
///
/// `sensor_starts` must be most recent first. Point order inside each sensor
/// follows the order of `finger_checks`. Lookups run in parallel.
///
/// Only data source failures abort; data gaps drop the affected point.
pub fn segment<S: DataSource + ?Sized>(
    sensor_starts: &[DateTime<Utc>],
    finger_checks: &[FingerCheck],
    source: &S,
) -> Result<Vec<Sensor>, CalibrationError> {
    if sensor_starts.windows(2).any(|w| w[0] <= w[1]) {
        log::warn!("Sensor starts are not strictly most-recent-first; some windows will be empty.");
    }

    sensor_windows(sensor_starts)
        .into_iter()
        .map(|window| build_sensor(window, finger_checks, source))
        .collect()
}

/// Fetch the latest `limit` sensor starts and every finger check since the
/// oldest of them, then segment.
pub fn segment_from_source<S: DataSource + ?Sized>(
    source: &S,
    limit: usize,
) -> Result<Vec<Sensor>, CalibrationError> {
    let starts = source.fetch_sensor_starts(limit)?;
    let Some(&oldest) = starts.last() else {
        log::info!("No sensor starts found.");
        return Ok(Vec::new());
    };

    let checks = source.fetch_finger_checks(TimeRange::unbounded(oldest))?;
    log::info!("Segmenting {} finger checks across {} sensors.", checks.len(), starts.len());
    segment(&starts, &checks, source)
}

fn build_sensor<S: DataSource + ?Sized>(
    window: TimeRange,
    finger_checks: &[FingerCheck],
    source: &S,
) -> Result<Sensor, CalibrationError> {
    let in_window: Vec<&FingerCheck> = finger_checks
        .iter()
        .filter(|c| window.contains(c.timestamp))
        .collect();

    // `collect` on an indexed parallel iterator keeps input order.
    let looked_up: Vec<(bool, Result<Point, CalibrationError>)> = in_window
        .par_iter()
        .map(|check| (check.is_calibration, point_for_check(check, source)))
        .collect();

    let mut glucose_points = Vec::with_capacity(looked_up.len());
    let mut calibration_points = Vec::new();
    let mut dropped = 0usize;

    for (is_calibration, result) in looked_up {
        match result {
            Ok(point) => {
                if is_calibration {
                    calibration_points.push(point);
                }
                glucose_points.push(point);
            }
            Err(CalibrationError::DataGap { at }) => {
                log::debug!("Dropping finger check at {at}: no bracketing raw readings.");
                dropped += 1;
            }
            Err(e) => return Err(e),
        }
    }

    log::debug!(
        "Sensor started {}: {} points ({} calibrations), {} dropped.",
        window.start,
        glucose_points.len(),
        calibration_points.len(),
        dropped
    );

    Ok(Sensor::new(window, glucose_points, calibration_points))
}
