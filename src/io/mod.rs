//! Input/output helpers.
//!
//! - CSV ingest into an in-memory store (`ingest`)
//! - JSON export of sensor summaries (`export`)

pub mod export;
pub mod ingest;

pub use export::*;
pub use ingest::*;
