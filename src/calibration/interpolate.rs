//! Raw-value interpolation at an arbitrary timestamp.

use chrono::{DateTime, Utc};

use crate::data::DataSource;
use crate::domain::{FingerCheck, Interpolation, Point};
use crate::error::CalibrationError;

/// Average the nearest raw readings strictly before and after `target`.
///
/// The mean is truncated toward zero to match the sensor's integer raw scale.
/// Fails with `DataGap` when either neighbour is missing.
pub fn interpolate<S: DataSource + ?Sized>(
    target: DateTime<Utc>,
    source: &S,
) -> Result<Interpolation, CalibrationError> {
    let prev = source.fetch_raw_before(target)?.and_then(|e| e.raw);
    let next = source.fetch_raw_after(target)?.and_then(|e| e.raw);

    let (Some(prev_raw), Some(next_raw)) = (prev, next) else {
        return Err(CalibrationError::DataGap { at: target });
    };

    Ok(Interpolation {
        prev_raw,
        next_raw,
        avg_raw: ((prev_raw + next_raw) / 2.0).trunc(),
    })
}

/// Pair a finger check with the interpolated raw value at its timestamp.
pub fn point_for_check<S: DataSource + ?Sized>(
    check: &FingerCheck,
    source: &S,
) -> Result<Point, CalibrationError> {
    let interp = interpolate(check.timestamp, source)?;
    Ok(Point::new(interp.avg_raw, check.glucose))
}
