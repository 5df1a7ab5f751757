//! Conversion between raw sensor units and glucose (mg/dL).

use crate::domain::CalibrationSlope;
use crate::error::CalibrationError;

/// `raw = slope * glucose + intercept`
pub fn to_raw(cal: CalibrationSlope, glucose: f64) -> f64 {
    cal.slope * glucose + cal.intercept
}

/// `glucose = (raw - intercept) / slope`
pub fn to_glucose(cal: CalibrationSlope, raw: f64) -> Result<f64, CalibrationError> {
    if cal.slope == 0.0 {
        return Err(CalibrationError::degenerate("calibration slope is zero"));
    }
    Ok((raw - cal.intercept) / cal.slope)
}

/// The whole-number reading a device would display for `raw`.
pub fn to_glucose_truncated(cal: CalibrationSlope, raw: f64) -> Result<f64, CalibrationError> {
    to_glucose(cal, raw).map(f64::trunc)
}

pub fn to_raw_all(cal: CalibrationSlope, glucose: &[f64]) -> Vec<f64> {
    glucose.iter().map(|&g| to_raw(cal, g)).collect()
}

pub fn to_glucose_all(cal: CalibrationSlope, raw: &[f64]) -> Result<Vec<f64>, CalibrationError> {
    raw.iter().map(|&r| to_glucose(cal, r)).collect()
}
