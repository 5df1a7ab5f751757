//! Reporting utilities: per-sensor summaries and formatted terminal output.

pub mod format;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::calibration::fit_linear;
use crate::domain::{CalibrationRecord, CalibrationSlope, Point, Sensor};
use crate::error::CalibrationError;

pub use format::*;

/// Result of fitting one point set, with failures kept as values so a batch
/// report can show them next to successful fits.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum FitOutcome {
    Fitted { calibration: CalibrationSlope },
    /// Fewer than two points.
    NoFit,
    Degenerate { reason: String },
}

impl FitOutcome {
    pub fn from_points(points: &[Point]) -> Self {
        match fit_linear(points) {
            Ok(Some(calibration)) => Self::Fitted { calibration },
            Ok(None) => Self::NoFit,
            Err(CalibrationError::DegenerateInput(reason)) => Self::Degenerate { reason },
            Err(e) => Self::Degenerate { reason: e.to_string() },
        }
    }

    pub fn calibration(&self) -> Option<CalibrationSlope> {
        match self {
            Self::Fitted { calibration } => Some(*calibration),
            _ => None,
        }
    }
}

/// Everything reported for one sensor.
#[derive(Debug, Clone, Serialize)]
pub struct SensorSummary {
    pub start: DateTime<Utc>,
    pub n_points: usize,
    pub n_calibrations: usize,
    /// Fit over every finger check during the sensor's life.
    pub all_points_fit: FitOutcome,
    /// Fit over the calibration checks only.
    pub calibration_fit: FitOutcome,
    /// Latest calibration the device reported during the sensor's life.
    pub device_calibration: Option<CalibrationRecord>,
    pub sensor: Sensor,
}

pub fn summarise_sensor(
    sensor: Sensor,
    device_calibration: Option<CalibrationRecord>,
) -> SensorSummary {
    let all_points_fit = FitOutcome::from_points(sensor.glucose_points());
    let calibration_fit = FitOutcome::from_points(sensor.calibration_points());

    if let FitOutcome::Degenerate { reason } = &all_points_fit {
        log::warn!("Sensor started {}: {reason}", sensor.start());
    }

    SensorSummary {
        start: sensor.start(),
        n_points: sensor.glucose_points().len(),
        n_calibrations: sensor.calibration_points().len(),
        all_points_fit,
        calibration_fit,
        device_calibration,
        sensor,
    }
}
