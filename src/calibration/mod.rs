//! The calibration-model engine.
//!
//! Responsibilities:
//!
//! - interpolate raw sensor values at finger check timestamps
//! - fit or derive `raw = slope * glucose + intercept` models
//! - split a measurement history into per-sensor lifetime windows
//! - convert between raw units and glucose, and compare calibrations

pub mod compare;
pub mod convert;
pub mod fit;
pub mod interpolate;
pub mod retrieve;
pub mod segment;

pub use compare::*;
pub use convert::*;
pub use fit::*;
pub use interpolate::*;
pub use retrieve::*;
pub use segment::*;
