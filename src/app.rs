//! Top-level application orchestration.
//!
//! `src/main.rs` is intentionally tiny; this module is the "real main" that:
//! - initialises logging
//! - parses CLI arguments
//! - opens the data source
//! - runs the requested analysis and prints it

use clap::Parser;

use crate::calibration::{CheckFilter, compare, derive_two_point, to_glucose, to_raw};
use crate::cli::{Cli, Command, CompareArgs, ConvertArgs, DeriveArgs, FitArgs, SensorsArgs};
use crate::domain::{CalibrationSlope, Point, TimeRange};
use crate::error::AppError;
use crate::report::{format_calibration, format_comparison, format_outcome, format_sensor_report};

pub mod pipeline;

/// Entry point for the `cgm-cal` binary.
pub fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    log::debug!("Parsed arguments: {cli:?}");

    match cli.command {
        Command::Sensors(args) => handle_sensors(args),
        Command::Fit(args) => handle_fit(args),
        Command::Derive(args) => handle_derive(args),
        Command::Convert(args) => handle_convert(args),
        Command::Compare(args) => handle_compare(args),
    }
}

fn init_logging(verbose: bool) {
    let level = if verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Warn
    };
    // RUST_LOG directives are parsed after the default level, so they win.
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .init();
}

fn handle_sensors(args: SensorsArgs) -> Result<(), AppError> {
    let source = pipeline::open_source(&args.source)?;
    let summaries = pipeline::run_sensors(source.as_ref(), args.limit)?;

    println!("{}", format_sensor_report(&summaries));

    if let Some(path) = &args.export {
        crate::io::export::write_sensors_json(path, &summaries)?;
        log::info!("Wrote {} sensor summaries to {}.", summaries.len(), path.display());
    }
    Ok(())
}

fn handle_fit(args: FitArgs) -> Result<(), AppError> {
    let source = pipeline::open_source(&args.source)?;
    let filter = if args.all {
        CheckFilter::All
    } else {
        CheckFilter::CalibrationOnly
    };

    let range = TimeRange::new(args.from, args.to);
    let (points, outcome) = pipeline::run_fit(source.as_ref(), range, filter)?;

    println!("{:>10} {:>10}", "raw", "glucose");
    for p in &points {
        println!("{:>10.0} {:>10.0}", p.raw, p.glucose);
    }
    println!("\nfit: {}", format_outcome(&outcome));
    Ok(())
}

fn handle_derive(args: DeriveArgs) -> Result<(), AppError> {
    let cal = derive_two_point(
        Point::new(args.raw1, args.glucose1),
        Point::new(args.raw2, args.glucose2),
    )?;
    println!("{}", format_calibration(cal));
    Ok(())
}

fn handle_convert(args: ConvertArgs) -> Result<(), AppError> {
    let cal = CalibrationSlope::new(args.slope, args.intercept);

    if args.raw.is_empty() {
        for g in &args.glucose {
            println!("glucose {g} -> raw {:.2}", to_raw(cal, *g));
        }
    } else {
        for r in &args.raw {
            println!("raw {r} -> glucose {:.2}", to_glucose(cal, *r)?);
        }
    }
    Ok(())
}

fn handle_compare(args: CompareArgs) -> Result<(), AppError> {
    let comparisons = compare(args.reference, &args.candidates, &args.glucose);
    println!("{}", format_comparison(args.reference, &comparisons, &args.glucose));
    Ok(())
}
