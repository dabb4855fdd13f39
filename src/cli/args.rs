//! CLI argument parsing

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::config::{AnalysisSettings, ConfigError, SettingsBuilder};
use crate::core::Solver;

#[derive(Parser, Debug)]
#[command(name = "sdlma")]
#[command(version, about = "Impact testing and experimental modal analysis")]
pub struct Cli {
    /// Debug logging (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Analysis settings file (defaults to the user config directory)
    #[arg(short, long, global = true, env = "SDLMA_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Decode a virtual TEDS file
    Teds(TedsArgs),
    /// Summarize the FRFs of stored measurements
    Frf(FrfArgs),
    /// Run modal analysis over stored measurements
    Ema(EmaArgs),
    /// Export an analysis session to Universal File Format
    Uff(UffArgs),
}

#[derive(Args, Debug)]
pub struct TedsArgs {
    /// Virtual TEDS file (one byte per bit, NI preamble)
    pub file: PathBuf,

    /// Print JSON instead of a table
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct FrfArgs {
    /// Measurement files
    #[arg(required = true)]
    pub files: Vec<PathBuf>,

    /// Check every impact for overflow and double hits
    #[arg(long)]
    pub check_impacts: bool,

    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct EmaArgs {
    /// Measurement files or directories
    #[arg(required = true)]
    pub inputs: Vec<PathBuf>,

    /// Lower band limit in Hz
    #[arg(long)]
    pub lower: Option<f64>,

    /// Upper band limit in Hz
    #[arg(long)]
    pub upper: Option<f64>,

    /// Highest model order (even)
    #[arg(long)]
    pub order: Option<usize>,

    /// Pole solver: lscf or lsce
    #[arg(long, value_parser = parse_solver)]
    pub solver: Option<Solver>,

    /// Natural frequency estimates in Hz; stable poles are used when empty
    #[arg(long = "freq", value_delimiter = ',', num_args = 1..)]
    pub freq_estimates: Vec<f64>,

    /// Save the session for a later `uff` export
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct UffArgs {
    /// Session saved by `ema --output`
    pub session: PathBuf,

    /// Geometry file: nodes, lines, faces and measurement point mapping
    #[arg(short, long)]
    pub geometry: PathBuf,

    /// Target UFF file; datasets already present are kept
    #[arg(short, long)]
    pub output: PathBuf,
}

fn parse_solver(value: &str) -> Result<Solver, String> {
    value.parse().map_err(|_| format!("unknown solver '{}', expected lscf or lsce", value))
}

impl EmaArgs {
    /// Apply command line overrides on top of the loaded settings
    pub fn apply(&self, settings: AnalysisSettings) -> Result<AnalysisSettings, ConfigError> {
        let mut builder = SettingsBuilder::from_settings(settings);
        if let Some(lower) = self.lower {
            builder = builder.lower(lower);
        }
        if let Some(upper) = self.upper {
            builder = builder.upper(upper);
        }
        if let Some(order) = self.order {
            builder = builder.pol_order(order);
        }
        if let Some(solver) = self.solver {
            builder = builder.solver(solver);
        }
        if !self.freq_estimates.is_empty() {
            builder = builder.freq_estimates(self.freq_estimates.clone());
        }
        builder.build()
    }
}
