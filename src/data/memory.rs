//! In-memory data source.
//!
//! Records are kept sorted ascending by timestamp so neighbour lookups are a
//! binary search. Used for offline analysis of CSV exports and in tests.

use chrono::{DateTime, Utc};

use crate::data::source::DataSource;
use crate::domain::{CalibrationRecord, FingerCheck, RawEntry, TimeRange};
use crate::error::AppError;

#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    /// Only entries with a raw value; ascending.
    raw: Vec<RawEntry>,
    checks: Vec<FingerCheck>,
    sensor_starts: Vec<DateTime<Utc>>,
    calibrations: Vec<CalibrationRecord>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_raw_entries(mut self, entries: impl IntoIterator<Item = RawEntry>) -> Self {
        self.raw
            .extend(entries.into_iter().filter(|e| e.raw.is_some_and(f64::is_finite)));
        self.raw.sort_by_key(|e| e.timestamp);
        self
    }

    pub fn with_finger_checks(mut self, checks: impl IntoIterator<Item = FingerCheck>) -> Self {
        self.checks.extend(checks);
        self.checks.sort_by_key(|c| c.timestamp);
        self
    }

    pub fn with_sensor_starts(mut self, starts: impl IntoIterator<Item = DateTime<Utc>>) -> Self {
        self.sensor_starts.extend(starts);
        self.sensor_starts.sort();
        self.sensor_starts.dedup();
        self
    }

    pub fn with_calibrations(
        mut self,
        records: impl IntoIterator<Item = CalibrationRecord>,
    ) -> Self {
        self.calibrations.extend(records);
        self.calibrations.sort_by_key(|r| r.timestamp);
        self
    }

    pub fn raw_len(&self) -> usize {
        self.raw.len()
    }
}

impl DataSource for MemoryStore {
    fn fetch_sensor_starts(&self, limit: usize) -> Result<Vec<DateTime<Utc>>, AppError> {
        Ok(self.sensor_starts.iter().rev().take(limit).copied().collect())
    }

    fn fetch_finger_checks(&self, range: TimeRange) -> Result<Vec<FingerCheck>, AppError> {
        Ok(self
            .checks
            .iter()
            .rev()
            .filter(|c| range.contains(c.timestamp))
            .copied()
            .collect())
    }

    fn fetch_raw_before(&self, ts: DateTime<Utc>) -> Result<Option<RawEntry>, AppError> {
        let idx = self.raw.partition_point(|e| e.timestamp < ts);
        Ok(idx.checked_sub(1).map(|i| self.raw[i]))
    }

    fn fetch_raw_after(&self, ts: DateTime<Utc>) -> Result<Option<RawEntry>, AppError> {
        let idx = self.raw.partition_point(|e| e.timestamp <= ts);
        Ok(self.raw.get(idx).copied())
    }

    fn fetch_calibration_record(
        &self,
        ts: DateTime<Utc>,
    ) -> Result<Option<CalibrationRecord>, AppError> {
        let idx = self.calibrations.partition_point(|r| r.timestamp <= ts);
        Ok(idx.checked_sub(1).map(|i| self.calibrations[i]))
    }
}
