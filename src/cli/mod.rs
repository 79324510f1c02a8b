//! Command-line parsing for the grain-size mixture fitter.
//!
//! The goal of this module is to keep **argument parsing** and **command dispatch**
//! separate from the fitting code.

use std::path::PathBuf;

use clap::{ArgAction, Parser, Subcommand};

use crate::domain::DistributionFamily;

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(name = "grainfit", version, about = "Grain-size distribution mixture fitter")]
pub struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace).
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Fit mixture models to samples of a dataset and print a report per sample.
    Fit(FitArgs),
    /// Validate a dataset and print the fitting window of every sample.
    Check(CheckArgs),
}

#[derive(Debug, Parser, Clone)]
pub struct FitArgs {
    /// Dataset CSV (class row, then one row per sample).
    #[arg(short, long, value_name = "CSV")]
    pub input: PathBuf,

    /// Sample to fit (repeatable). Fits every sample when omitted.
    #[arg(short, long = "sample", value_name = "NAME")]
    pub samples: Vec<String>,

    /// Component family (overrides the config file).
    #[arg(long, value_enum)]
    pub family: Option<DistributionFamily>,

    /// Number of components (overrides the config file).
    #[arg(short = 'n', long)]
    pub components: Option<usize>,

    /// Settings JSON; unknown keys are rejected.
    #[arg(long, value_name = "JSON")]
    pub config: Option<PathBuf>,

    /// Seed for the global stage (overrides the config file).
    #[arg(long)]
    pub seed: Option<u64>,

    /// Write every report (with settings and series) to JSON.
    #[arg(long = "export-json", value_name = "PATH")]
    pub export_json: Option<PathBuf>,

    /// Write per-component statistics to CSV.
    #[arg(long = "export-csv", value_name = "PATH")]
    pub export_csv: Option<PathBuf>,
}

#[derive(Debug, Parser, Clone)]
pub struct CheckArgs {
    /// Dataset CSV to validate.
    #[arg(short, long, value_name = "CSV")]
    pub input: PathBuf,
}
