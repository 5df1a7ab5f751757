//! Point retrieval for a time range, outside of sensor segmentation.

use chrono::{DateTime, Duration, Utc};

use crate::calibration::interpolate::point_for_check;
use crate::data::DataSource;
use crate::domain::{CalibrationRecord, Point, TimeRange};
use crate::error::CalibrationError;

/// Which finger checks to pair with raw values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckFilter {
    /// Only checks flagged as calibration events.
    CalibrationOnly,
    All,
}

/// Pair the finger checks in `range` with interpolated raw values.
///
/// Points are returned most recent first; checks in a data gap are dropped.
pub fn points_in_range<S: DataSource + ?Sized>(
    source: &S,
    range: TimeRange,
    filter: CheckFilter,
) -> Result<Vec<Point>, CalibrationError> {
    let checks = source.fetch_finger_checks(range)?;

    let mut points = Vec::with_capacity(checks.len());
    for check in checks
        .iter()
        .filter(|c| filter == CheckFilter::All || c.is_calibration)
    {
        match point_for_check(check, source) {
            Ok(point) => points.push(point),
            Err(CalibrationError::DataGap { at }) => {
                log::debug!("Dropping finger check at {at}: no bracketing raw readings.");
            }
            Err(e) => return Err(e),
        }
    }
    Ok(points)
}

/// Calibration-event points in `range`.
pub fn calibration_points<S: DataSource + ?Sized>(
    source: &S,
    range: TimeRange,
) -> Result<Vec<Point>, CalibrationError> {
    points_in_range(source, range, CheckFilter::CalibrationOnly)
}

/// The last calibration the device reported strictly inside `window`.
///
/// A record from before the window belongs to an earlier sensor and is not
/// returned.
pub fn device_calibration<S: DataSource + ?Sized>(
    source: &S,
    window: TimeRange,
) -> Result<Option<CalibrationRecord>, CalibrationError> {
    let at = match window.end {
        Some(end) => end - Duration::milliseconds(1),
        None => DateTime::<Utc>::MAX_UTC,
    };
    let record = source.fetch_calibration_record(at)?;
    Ok(record.filter(|r| window.contains(r.timestamp)))
}
