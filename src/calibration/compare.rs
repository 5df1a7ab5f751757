//! Reference-to-candidate calibration comparison.
//!
//! For a set of glucose levels, compute what raw value the reference
//! calibration produces and what each candidate calibration would then
//! display for that raw value. The difference shows how far a sensor's
//! calibration has drifted from the reference.

use serde::Serialize;

use crate::calibration::convert::{to_glucose_truncated, to_raw};
use crate::domain::CalibrationSlope;

/// Glucose levels (mg/dL) the comparison is evaluated at by default.
pub const DEFAULT_GLUCOSE_LEVELS: [f64; 8] = [55.0, 70.0, 100.0, 130.0, 150.0, 180.0, 200.0, 240.0];

/// One candidate's displayed readings at each level.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Comparison {
    pub candidate: CalibrationSlope,
    /// `None` when the candidate's slope is zero.
    pub readings: Option<Vec<f64>>,
}

impl Comparison {
    /// Displayed reading minus true level, per level.
    pub fn errors(&self, glucose_levels: &[f64]) -> Option<Vec<f64>> {
        let readings = self.readings.as_ref()?;
        Some(readings.iter().zip(glucose_levels).map(|(r, g)| r - g).collect())
    }
}

/// Evaluate every candidate against `reference`. A degenerate candidate
/// yields `readings = None` and does not affect the others.
pub fn compare(
    reference: CalibrationSlope,
    candidates: &[CalibrationSlope],
    glucose_levels: &[f64],
) -> Vec<Comparison> {
    let raw: Vec<f64> = glucose_levels.iter().map(|&g| to_raw(reference, g)).collect();

    candidates
        .iter()
        .map(|&candidate| {
            let readings = raw
                .iter()
                .map(|&r| to_glucose_truncated(candidate, r))
                .collect::<Result<Vec<_>, _>>();
            if let Err(e) = &readings {
                log::warn!("Skipping candidate {candidate}: {e}");
            }
            Comparison {
                candidate,
                readings: readings.ok(),
            }
        })
        .collect()
}
