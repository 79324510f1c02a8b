//! Top-level application orchestration.
//!
//! `src/main.rs` is intentionally tiny; this module is the "real main" that:
//! - parses CLI arguments
//! - installs the stderr log subscriber
//! - loads and validates the dataset
//! - runs one fit per requested sample
//! - prints reports and writes optional exports

use clap::Parser;
use tracing::Level;

use crate::cli::{CheckArgs, Command, FitArgs};
use crate::domain::FitSettings;
use crate::error::AppError;
use crate::fit::CancellationToken;

pub mod pipeline;

/// Entry point for the `grainfit` binary.
pub fn run() -> Result<(), AppError> {
    let cli = crate::cli::Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Command::Fit(args) => handle_fit(args),
        Command::Check(args) => handle_check(args),
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };
    // A subscriber may already be installed when embedded; keep it.
    let _ = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_max_level(level)
        .with_target(false)
        .try_init();
}

fn handle_fit(args: FitArgs) -> Result<(), AppError> {
    let settings = settings_from_args(&args)?;
    let dataset = crate::io::load_dataset(&args.input)?;

    let run = pipeline::run_fits(&dataset, &settings, &args.samples, &CancellationToken::new())?;

    for outcome in &run.outcomes {
        match &outcome.result {
            Ok(report) => println!("{}", crate::report::format_fit_report(report)),
            Err(err) => println!("=== grainfit: {} ===\n{err}\n", outcome.sample),
        }
    }

    let reports = run.reports();
    if let Some(path) = &args.export_json {
        crate::io::write_report_json(path, &settings, &reports)?;
    }
    if let Some(path) = &args.export_csv {
        crate::io::write_statistics_csv(path, &reports)?;
    }

    match run.first_error() {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

fn handle_check(args: CheckArgs) -> Result<(), AppError> {
    let dataset = crate::io::load_dataset(&args.input)?;
    println!("{}", crate::report::format_dataset_summary(&dataset));
    Ok(())
}

/// Defaults, then the config file, then CLI flags.
pub fn settings_from_args(args: &FitArgs) -> Result<FitSettings, AppError> {
    let mut settings = match &args.config {
        Some(path) => FitSettings::from_json_file(path)?,
        None => FitSettings::default(),
    };
    if let Some(family) = args.family {
        settings.distribution_family = family;
    }
    if let Some(n) = args.components {
        settings.component_count = n;
    }
    if let Some(seed) = args.seed {
        settings.seed = seed;
    }
    settings.validate()?;
    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::DistributionFamily;

    #[test]
    fn flags_override_defaults() {
        let cli = crate::cli::Cli::parse_from([
            "grainfit", "fit", "--input", "d.csv", "--family", "normal", "-n", "3", "--seed", "7",
        ]);
        let Command::Fit(args) = cli.command else {
            panic!("expected fit");
        };
        let settings = settings_from_args(&args).unwrap();
        assert_eq!(settings.distribution_family, DistributionFamily::Normal);
        assert_eq!(settings.component_count, 3);
        assert_eq!(settings.seed, 7);
        assert_eq!(settings.global_max_iterations, FitSettings::default().global_max_iterations);
    }

    #[test]
    fn zero_components_is_a_usage_error() {
        let cli = crate::cli::Cli::parse_from(["grainfit", "fit", "--input", "d.csv", "-n", "0"]);
        let Command::Fit(args) = cli.command else {
            panic!("expected fit");
        };
        let err = settings_from_args(&args).unwrap_err();
        assert_eq!(err.exit_code(), crate::error::exit::USAGE);
    }
}
