//! Read-only access to the store of raw entries and treatment records.
//!
//! The calibration core only ever talks to this trait. Implementations must be
//! `Sync` because the segmenter fans interpolation lookups out over rayon.

use chrono::{DateTime, Utc};

use crate::domain::{CalibrationRecord, FingerCheck, RawEntry, TimeRange};
use crate::error::AppError;

pub trait DataSource: Sync {
    /// Sensor start timestamps, most recent first, at most `limit` of them.
    fn fetch_sensor_starts(&self, limit: usize) -> Result<Vec<DateTime<Utc>>, AppError>;

    /// Finger checks strictly inside `range`, most recent first.
    fn fetch_finger_checks(&self, range: TimeRange) -> Result<Vec<FingerCheck>, AppError>;

    /// Nearest raw entry with a present value strictly before `ts`.
    fn fetch_raw_before(&self, ts: DateTime<Utc>) -> Result<Option<RawEntry>, AppError>;

    /// Nearest raw entry with a present value strictly after `ts`.
    fn fetch_raw_after(&self, ts: DateTime<Utc>) -> Result<Option<RawEntry>, AppError>;

    /// Device-reported calibration active at `ts` (the latest one at or before it).
    fn fetch_calibration_record(
        &self,
        ts: DateTime<Utc>,
    ) -> Result<Option<CalibrationRecord>, AppError>;
}
