//! `cgm-cal` library crate.
//!
//! The binary (`cgm-cal`) is a thin wrapper around this library so that:
//!
//! - the calibration engine is testable without spawning processes
//! - data sources can be swapped (Nightscout, CSV exports, in-memory)

pub mod app;
pub mod calibration;
pub mod cli;
pub mod data;
pub mod domain;
pub mod error;
pub mod io;
pub mod math;
pub mod report;
