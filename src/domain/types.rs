//! Shared domain types.
//!
//! These types are intentionally kept small and serializable so they can be:
//!
//! - passed between the data sources and the calibration core
//! - exported to JSON for downstream plotting
//! - constructed by hand in tests

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One paired observation: the sensor's raw signal and the reference glucose (mg/dL).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub raw: f64,
    pub glucose: f64,
}

impl Point {
    pub fn new(raw: f64, glucose: f64) -> Self {
        Self { raw, glucose }
    }
}

/// Parameters of `raw = slope * glucose + intercept`.
///
/// Inverse conversion requires `slope != 0`. Negative values occur in real
/// device data and are not rejected.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CalibrationSlope {
    pub slope: f64,
    pub intercept: f64,
}

impl CalibrationSlope {
    pub fn new(slope: f64, intercept: f64) -> Self {
        Self { slope, intercept }
    }
}

impl std::fmt::Display for CalibrationSlope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "raw = {} * glucose + {}", self.slope, self.intercept)
    }
}

/// A timestamped raw sensor reading. Entries without a value are not
/// eligible for interpolation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RawEntry {
    pub timestamp: DateTime<Utc>,
    pub raw: Option<f64>,
}

/// A timestamped fingerstick reference measurement.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FingerCheck {
    pub timestamp: DateTime<Utc>,
    pub glucose: f64,
    /// The sensor used this check to (re)compute its internal calibration.
    pub is_calibration: bool,
}

/// Calibration parameters reported by the device itself.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CalibrationRecord {
    pub timestamp: DateTime<Utc>,
    pub slope: f64,
    pub intercept: f64,
}

impl CalibrationRecord {
    pub fn calibration(&self) -> CalibrationSlope {
        CalibrationSlope::new(self.slope, self.intercept)
    }
}

/// Raw values bracketing a target timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Interpolation {
    pub prev_raw: f64,
    pub next_raw: f64,
    /// Mean of the neighbours, truncated toward zero.
    pub avg_raw: f64,
}

/// An open time interval `(start, end)`. `end = None` is unbounded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    pub start: DateTime<Utc>,
    pub end: Option<DateTime<Utc>>,
}

impl TimeRange {
    pub fn new(start: DateTime<Utc>, end: Option<DateTime<Utc>>) -> Self {
        Self { start, end }
    }

    pub fn unbounded(start: DateTime<Utc>) -> Self {
        Self { start, end: None }
    }

    /// Strict containment on both sides.
    pub fn contains(&self, ts: DateTime<Utc>) -> bool {
        ts > self.start && self.end.is_none_or(|end| ts < end)
    }
}

/// One physical sensor's lifetime and the paired points observed during it.
///
/// Built once by the segmenter; there is no mutating API.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Sensor {
    window: TimeRange,
    glucose_points: Vec<Point>,
    calibration_points: Vec<Point>,
}

impl Sensor {
    pub(crate) fn new(
        window: TimeRange,
        glucose_points: Vec<Point>,
        calibration_points: Vec<Point>,
    ) -> Self {
        Self {
            window,
            glucose_points,
            calibration_points,
        }
    }

    pub fn start(&self) -> DateTime<Utc> {
        self.window.start
    }

    /// Lifetime of the sensor; the newest one has no end.
    pub fn window(&self) -> TimeRange {
        self.window
    }

    /// Every finger check inside the window that could be interpolated.
    pub fn glucose_points(&self) -> &[Point] {
        &self.glucose_points
    }

    /// The subset of `glucose_points` whose check was a calibration event.
    pub fn calibration_points(&self) -> &[Point] {
        &self.calibration_points
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    #[test]
    fn time_range_is_open_on_both_ends() {
        let range = TimeRange::new(ts(10), Some(ts(20)));
        assert!(!range.contains(ts(10)));
        assert!(range.contains(ts(15)));
        assert!(!range.contains(ts(20)));
    }

    #[test]
    fn unbounded_range_accepts_far_future() {
        let range = TimeRange::unbounded(ts(10));
        assert!(range.contains(ts(4_102_444_800)));
        assert!(!range.contains(ts(9)));
    }
}
