//! Export sensor summaries to JSON.
//!
//! The export is a one-shot snapshot for downstream plotting; nothing reads it
//! back.

use std::fs::File;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::AppError;
use crate::report::SensorSummary;

#[derive(Serialize)]
struct SensorExport<'a> {
    tool: &'static str,
    generated_at: DateTime<Utc>,
    sensors: &'a [SensorSummary],
}

/// Write per-sensor summaries (including their points) to a JSON file.
pub fn write_sensors_json(path: &Path, summaries: &[SensorSummary]) -> Result<(), AppError> {
    let file = File::create(path).map_err(|e| {
        AppError::new(2, format!("Failed to create export JSON '{}': {e}", path.display()))
    })?;

    let export = SensorExport {
        tool: "cgm-cal",
        generated_at: Utc::now(),
        sensors: summaries,
    };

    serde_json::to_writer_pretty(file, &export)
        .map_err(|e| AppError::new(2, format!("Failed to write export JSON: {e}")))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Point, Sensor, TimeRange};
    use crate::report::summarise_sensor;
    use tempdir::TempDir;

    #[test]
    fn export_contains_points_and_fit_status() {
        let dir = TempDir::new("export").unwrap();
        let path = dir.path().join("sensors.json");

        let start = DateTime::<Utc>::from_timestamp(1_682_935_200, 0).unwrap();
        let points = vec![Point::new(97_059.0, 90.0)];
        let sensor = Sensor::new(TimeRange::unbounded(start), points.clone(), points);
        let summary = summarise_sensor(sensor, None);

        write_sensors_json(&path, &[summary]).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        let sensor = &value["sensors"][0];
        assert_eq!(sensor["n_points"], 1);
        assert_eq!(sensor["all_points_fit"]["status"], "no_fit");
        assert_eq!(sensor["sensor"]["glucose_points"][0]["raw"], 97_059.0);
        assert!(sensor["sensor"]["window"]["end"].is_null());
    }
}
