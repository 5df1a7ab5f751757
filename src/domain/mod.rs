//! Domain types used throughout the calibration engine.
//!
//! This module defines:
//!
//! - paired observations and model parameters (`Point`, `CalibrationSlope`)
//! - store records (`RawEntry`, `FingerCheck`, `CalibrationRecord`)
//! - segmentation output (`Sensor`) and time windows (`TimeRange`)

pub mod types;

pub use types::*;
