//! Linear calibration models from paired points.
//!
//! - `fit_linear`: least squares over any number of points
//! - `derive_two_point`: exact line through two points, in device integer units

use crate::domain::{CalibrationSlope, Point};
use crate::error::CalibrationError;
use crate::math::{DomainMap, fit_line};

/// Minimum number of points for a least squares fit.
pub const MIN_FIT_POINTS: usize = 2;

/// Fit `raw = slope * glucose + intercept` by ordinary least squares.
///
/// The glucose domain `[min, max]` is mapped onto `[-1, 1]` before solving and
/// the coefficients are mapped back afterwards.
///
/// Returns `Ok(None)` for fewer than two points (no fit is possible).
/// Fails with `DegenerateInput` when every glucose value is identical or any
/// input is non-finite.
pub fn fit_linear(points: &[Point]) -> Result<Option<CalibrationSlope>, CalibrationError> {
    if points.len() < MIN_FIT_POINTS {
        return Ok(None);
    }
    if points.iter().any(|p| !(p.raw.is_finite() && p.glucose.is_finite())) {
        return Err(CalibrationError::degenerate("non-finite point in fit input"));
    }

    let glucose: Vec<f64> = points.iter().map(|p| p.glucose).collect();
    let raw: Vec<f64> = points.iter().map(|p| p.raw).collect();

    let map = DomainMap::from_values(&glucose)
        .ok_or_else(|| CalibrationError::degenerate("all glucose values are identical"))?;
    let x: Vec<f64> = glucose.iter().map(|&g| map.apply(g)).collect();

    let (c0, c1) = fit_line(&x, &raw)
        .ok_or_else(|| CalibrationError::degenerate("least squares system could not be solved"))?;
    let (slope, intercept) = map.unmap_line(c0, c1);

    Ok(Some(CalibrationSlope::new(slope, intercept)))
}

/// Line through two points with the slope, then the intercept, truncated
/// toward zero.
///
/// Fails with `DegenerateInput` when both points share a glucose value.
pub fn derive_two_point(p1: Point, p2: Point) -> Result<CalibrationSlope, CalibrationError> {
    let dg = p1.glucose - p2.glucose;
    if dg == 0.0 || !dg.is_finite() {
        return Err(CalibrationError::degenerate(format!(
            "two-point derivation needs distinct glucose values (got {} and {})",
            p1.glucose, p2.glucose
        )));
    }

    let slope = ((p1.raw - p2.raw) / dg).trunc();
    let intercept = (p1.raw - p1.glucose * slope).trunc();
    Ok(CalibrationSlope::new(slope, intercept))
}
