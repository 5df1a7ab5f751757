//! Command-line parsing for the calibration analyser.
//!
//! This module keeps **argument parsing** separate from the calibration math.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use clap::{Args, Parser, Subcommand};

use crate::calibration::DEFAULT_GLUCOSE_LEVELS;
use crate::domain::CalibrationSlope;

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(name = "cgm-cal", version, about = "CGM sensor calibration analysis")]
pub struct Cli {
    /// Enable debug logging (overridden by RUST_LOG).
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Split the finger check history by sensor and fit each sensor's calibration.
    Sensors(SensorsArgs),
    /// Fit a calibration to the finger checks in a time range.
    Fit(FitArgs),
    /// Derive slope/intercept from exactly two (raw, glucose) points.
    Derive(DeriveArgs),
    /// Convert raw values to glucose or glucose to raw values.
    Convert(ConvertArgs),
    /// Show what candidate calibrations would read for a reference calibration's raw values.
    Compare(CompareArgs),
}

/// Where to read entries and treatments from.
#[derive(Debug, Args, Clone)]
pub struct SourceArgs {
    /// Read CSV exports from this directory instead of Nightscout.
    #[arg(long, value_name = "DIR", conflicts_with_all = ["url", "token"])]
    pub csv_dir: Option<PathBuf>,

    /// Nightscout base URL (defaults to NIGHTSCOUT_URL).
    #[arg(long)]
    pub url: Option<String>,

    /// Nightscout access token (defaults to NIGHTSCOUT_TOKEN).
    #[arg(long)]
    pub token: Option<String>,
}

#[derive(Debug, Args, Clone)]
pub struct SensorsArgs {
    #[command(flatten)]
    pub source: SourceArgs,

    /// Number of most recent sensors to analyse.
    #[arg(short = 'n', long, default_value_t = 5)]
    pub limit: usize,

    /// Export per-sensor summaries to JSON.
    #[arg(long, value_name = "JSON")]
    pub export: Option<PathBuf>,
}

#[derive(Debug, Args, Clone)]
pub struct FitArgs {
    #[command(flatten)]
    pub source: SourceArgs,

    /// Start of the range (exclusive, RFC 3339).
    #[arg(long)]
    pub from: DateTime<Utc>,

    /// End of the range (exclusive, RFC 3339). Unbounded if omitted.
    #[arg(long)]
    pub to: Option<DateTime<Utc>>,

    /// Use every finger check, not only calibration events.
    #[arg(long)]
    pub all: bool,
}

#[derive(Debug, Args, Clone)]
pub struct DeriveArgs {
    pub raw1: f64,
    pub glucose1: f64,
    pub raw2: f64,
    pub glucose2: f64,
}

#[derive(Debug, Args, Clone)]
pub struct ConvertArgs {
    #[arg(long, allow_hyphen_values = true)]
    pub slope: f64,

    #[arg(long, allow_hyphen_values = true)]
    pub intercept: f64,

    /// Raw values to convert to glucose.
    #[arg(long, num_args = 1.., conflicts_with = "glucose", required_unless_present = "glucose")]
    pub raw: Vec<f64>,

    /// Glucose values to convert to raw.
    #[arg(long, num_args = 1..)]
    pub glucose: Vec<f64>,
}

#[derive(Debug, Args, Clone)]
pub struct CompareArgs {
    /// Reference calibration as SLOPE,INTERCEPT.
    #[arg(
        long,
        value_parser = parse_calibration,
        allow_hyphen_values = true,
        default_value = "1004,8331"
    )]
    pub reference: CalibrationSlope,

    /// Candidate calibration as SLOPE,INTERCEPT (repeatable).
    #[arg(
        long = "candidate",
        value_parser = parse_calibration,
        allow_hyphen_values = true,
        required = true
    )]
    pub candidates: Vec<CalibrationSlope>,

    /// Glucose levels (mg/dL) to evaluate at.
    #[arg(long, num_args = 1.., default_values_t = DEFAULT_GLUCOSE_LEVELS)]
    pub glucose: Vec<f64>,
}

/// Parse `SLOPE,INTERCEPT`.
pub fn parse_calibration(s: &str) -> Result<CalibrationSlope, String> {
    let (slope, intercept) = s
        .split_once(',')
        .ok_or_else(|| format!("expected SLOPE,INTERCEPT, got '{s}'"))?;
    let parse = |v: &str| {
        v.trim()
            .parse::<f64>()
            .ok()
            .filter(|x| x.is_finite())
            .ok_or_else(|| format!("invalid number '{v}'"))
    };
    Ok(CalibrationSlope::new(parse(slope)?, parse(intercept)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn calibration_pairs_parse_with_negative_intercepts() {
        let cal = parse_calibration("1658,-25469").unwrap();
        assert_eq!(cal, CalibrationSlope::new(1658.0, -25469.0));
        assert!(parse_calibration("1658").is_err());
        assert!(parse_calibration("a,b").is_err());
    }

    #[test]
    fn compare_defaults_to_the_reference_calibration_and_levels() {
        let cli = Cli::parse_from([
            "cgm-cal",
            "compare",
            "--candidate",
            "970,13481",
            "--candidate",
            "1714,-76700",
        ]);
        let Command::Compare(args) = cli.command else {
            panic!("expected compare");
        };
        assert_eq!(args.reference, CalibrationSlope::new(1004.0, 8331.0));
        assert_eq!(args.candidates.len(), 2);
        assert_eq!(args.glucose, DEFAULT_GLUCOSE_LEVELS.to_vec());
    }

    #[test]
    fn fit_parses_rfc3339_bounds() {
        let cli = Cli::parse_from([
            "cgm-cal",
            "fit",
            "--csv-dir",
            "data",
            "--from",
            "2023-05-01T00:00:00Z",
            "--all",
        ]);
        let Command::Fit(args) = cli.command else {
            panic!("expected fit");
        };
        assert!(args.all);
        assert!(args.to.is_none());
        assert_eq!(args.from.timestamp(), 1_682_899_200);
    }
}
