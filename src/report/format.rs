//! Formatted terminal output.
//!
//! Formatting stays here so the calibration code never builds strings.

use crate::calibration::Comparison;
use crate::domain::CalibrationSlope;
use crate::report::{FitOutcome, SensorSummary};

pub fn format_calibration(cal: CalibrationSlope) -> String {
    format!("slope={:.2} intercept={:.2}", cal.slope, cal.intercept)
}

pub fn format_outcome(outcome: &FitOutcome) -> String {
    match outcome {
        FitOutcome::Fitted { calibration } => format_calibration(*calibration),
        FitOutcome::NoFit => "n/a (fewer than 2 points)".to_string(),
        FitOutcome::Degenerate { reason } => format!("n/a ({reason})"),
    }
}

/// Per-sensor table, most recent sensor first.
pub fn format_sensor_report(summaries: &[SensorSummary]) -> String {
    let mut out = String::new();
    out.push_str("=== cgm-cal - calibration drift per sensor ===\n");

    if summaries.is_empty() {
        out.push_str("No sensors found.\n");
        return out;
    }

    for (idx, s) in summaries.iter().enumerate() {
        out.push_str(&format!(
            "\n#{} sensor started {}\n",
            idx + 1,
            s.start.format("%Y-%m-%d %H:%M UTC")
        ));
        out.push_str(&format!(
            "  points: {} finger checks, {} calibrations\n",
            s.n_points, s.n_calibrations
        ));
        out.push_str(&format!("  fit (all checks):   {}\n", format_outcome(&s.all_points_fit)));
        out.push_str(&format!("  fit (calibrations): {}\n", format_outcome(&s.calibration_fit)));
        match &s.device_calibration {
            Some(rec) => out.push_str(&format!(
                "  device calibration: {} (reported {})\n",
                format_calibration(rec.calibration()),
                rec.timestamp.format("%Y-%m-%d %H:%M UTC")
            )),
            None => out.push_str("  device calibration: n/a\n"),
        }
    }

    out
}

/// One row per candidate: displayed reading at each glucose level, then the
/// largest absolute deviation from the true level.
pub fn format_comparison(
    reference: CalibrationSlope,
    comparisons: &[Comparison],
    glucose_levels: &[f64],
) -> String {
    let mut out = String::new();
    out.push_str(&format!("Reference: {}\n", format_calibration(reference)));

    out.push_str(&format!("{:<34}", "glucose"));
    for g in glucose_levels {
        out.push_str(&format!("{g:>6.0}"));
    }
    out.push_str(&format!("{:>10}\n", "max err"));

    for c in comparisons {
        out.push_str(&format!("{:<34}", format_calibration(c.candidate)));
        match (&c.readings, c.errors(glucose_levels)) {
            (Some(readings), Some(errors)) => {
                for r in readings {
                    out.push_str(&format!("{r:>6.0}"));
                }
                let worst = errors.iter().fold(0.0_f64, |acc, e| acc.max(e.abs()));
                out.push_str(&format!("{worst:>10.0}"));
            }
            _ => out.push_str("  n/a (zero slope)"),
        }
        out.push('\n');
    }

    out
}
