// src/cli/mod.rs
//
// Command-line interface module

mod args;
mod output;

pub use args::{Cli, Command, EmaArgs, FrfArgs, TedsArgs, UffArgs};
pub use output::{
    format_json, format_measurement, format_modes, format_teds, summarize_measurement,
    summarize_modes, FrfSummary, MeasurementSummary, ModeSummary,
};

use anyhow::{bail, Context, Result};
use colorful::Colorful;
use indicatif::{ParallelProgressIterator, ProgressBar, ProgressStyle};
use log::{debug, info};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::config::AnalysisSettings;
use crate::core::{Ema, Measurement};
use crate::store::{self, StoreError, STORE_EXTENSION};
use crate::teds::Teds;
use crate::uff::UffWriter;

/// Test object geometry for UFF export
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Geometry {
    /// Node coordinates; node `i` gets the UFF label `i + 1`
    pub nodes: Vec<[f64; 3]>,
    /// Node indices per line
    #[serde(default)]
    pub lines: Vec<Vec<usize>>,
    /// Node indices per face
    #[serde(default)]
    pub faces: Vec<Vec<usize>>,
    /// Measurement point (channel name) to UFF node label
    pub mp_to_node: HashMap<String, usize>,
}

impl Geometry {
    pub fn from_file(path: &Path) -> Result<Self, StoreError> {
        store::load(path)
    }

    /// Every referenced node must exist
    pub fn validate(&self) -> Result<()> {
        let n = self.nodes.len();
        let in_range = |ids: &Vec<usize>| ids.iter().all(|&i| i < n);
        if !self.lines.iter().all(in_range) || !self.faces.iter().all(in_range) {
            bail!("mesh references a node beyond the {} defined", n);
        }
        if let Some((mp, node)) = self.mp_to_node.iter().find(|&(_, &node)| node == 0 || node > n) {
            bail!("measurement point '{}' maps to missing node {}", mp, node);
        }
        Ok(())
    }
}

/// Run the CLI
pub fn run(cli: Cli) -> Result<()> {
    let settings = AnalysisSettings::load_or_default(cli.config.as_deref())
        .context("Failed to load analysis settings")?;
    debug!("Settings: {:?}", settings);

    match cli.command {
        Command::Teds(args) => run_teds(&args),
        Command::Frf(args) => run_frf(&args, &settings),
        Command::Ema(args) => run_ema(&args, settings),
        Command::Uff(args) => run_uff(&args),
    }
}

fn run_teds(args: &TedsArgs) -> Result<()> {
    let teds = Teds::read_virtual_file(&args.file)
        .with_context(|| format!("Failed to decode {}", args.file.display()))?;
    if args.json {
        println!("{}", format_json(&teds)?);
    } else {
        print!("{}", format_teds(&teds));
    }
    Ok(())
}

fn run_frf(args: &FrfArgs, settings: &AnalysisSettings) -> Result<()> {
    let measurements = load_measurements(&args.files, settings)?;
    let mut summaries = Vec::with_capacity(measurements.len());
    for meas in &measurements {
        let rejected = if args.check_impacts {
            Some(
                meas.check_double_impact(settings.overflow_samples, settings.double_impact_limit)
                    .with_context(|| format!("Impact check failed for '{}'", meas.name()))?,
            )
        } else {
            None
        };
        summaries.push(summarize_measurement(meas, rejected));
    }

    if args.json {
        println!("{}", format_json(&summaries)?);
    } else {
        for summary in &summaries {
            println!("{}", format_measurement(summary));
        }
    }
    Ok(())
}

fn run_ema(args: &EmaArgs, settings: AnalysisSettings) -> Result<()> {
    let settings = args.apply(settings).context("Invalid analysis settings")?;
    let files = collect_measurement_files(&args.inputs);
    if files.is_empty() {
        println!("{}", "No measurement files found!".red());
        return Ok(());
    }

    let mut ema = Ema::from_settings(&settings);
    for meas in load_measurements(&files, &settings)? {
        ema.add_measurement(meas);
    }
    ema.calc().context("Failed to assemble the FRF matrix")?;
    let n_poles = ema.get_poles().context("Pole estimation failed")?.len();
    info!("{} poles up to order {}", n_poles, settings.pol_order);
    let results = ema.select_poles().context("Pole selection failed")?;
    let modes = summarize_modes(results);

    if args.json {
        println!("{}", format_json(&modes)?);
    } else {
        print!("{}", format_modes(&modes, &ema.response_rows()));
    }

    if let Some(output) = &args.output {
        let path = ema
            .export_to_file(output)
            .with_context(|| format!("Failed to save session to {}", output.display()))?;
        if args.json {
            info!("Session saved to {}", path.display());
        } else {
            println!("Session saved to: {}", path.display().to_string().cyan());
        }
    }
    Ok(())
}

fn run_uff(args: &UffArgs) -> Result<()> {
    let ema = Ema::import_from_file(&args.session)
        .with_context(|| format!("Failed to load session {}", args.session.display()))?;
    let geometry = Geometry::from_file(&args.geometry)
        .with_context(|| format!("Failed to load geometry {}", args.geometry.display()))?;
    geometry.validate()?;

    let name = args
        .session
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "sdlma".to_string());
    let mut writer = UffWriter::open(&args.output, name)?;

    let written = [
        ("units", writer.write_units()?),
        ("coordinate system", writer.write_coord_system()?),
        ("nodes", writer.write_nodes(&geometry.nodes)?),
        ("mesh", writer.write_mesh(&geometry.lines, &geometry.faces)?),
        ("FRFs", writer.write_frfs(&ema, &geometry.mp_to_node)?),
        ("modes", writer.write_modes(&ema, &geometry.mp_to_node)?),
    ];

    println!("Writing: {}", args.output.display().to_string().cyan());
    for (what, done) in written {
        if done {
            println!("  {} {}", "✓".green(), what);
        } else {
            println!("  {} {} (already present)", "-".yellow(), what);
        }
    }
    Ok(())
}

/// Expand directories to the measurement files below them
pub fn collect_measurement_files(inputs: &[PathBuf]) -> Vec<PathBuf> {
    let is_store = |path: &Path| {
        path.extension()
            .and_then(|e| e.to_str())
            .map_or(false, |e| e.eq_ignore_ascii_case(STORE_EXTENSION))
    };

    let mut files = Vec::new();
    for input in inputs {
        if input.is_file() {
            files.push(input.clone());
        } else if input.is_dir() {
            let mut found: Vec<PathBuf> = WalkDir::new(input)
                .follow_links(true)
                .into_iter()
                .filter_map(|e| e.ok())
                .filter(|e| e.file_type().is_file() && is_store(e.path()))
                .map(|e| e.into_path())
                .collect();
            found.sort();
            files.extend(found);
        }
    }
    files
}

fn load_measurements(files: &[PathBuf], settings: &AnalysisSettings) -> Result<Vec<Measurement>> {
    let bar = ProgressBar::new(files.len() as u64);
    if let Ok(style) = ProgressStyle::with_template("{bar:40} {pos}/{len} measurements") {
        bar.set_style(style);
    }

    let measurements = files
        .par_iter()
        .progress_with(bar.clone())
        .map(|path| {
            let meas = Measurement::import_from_file(path)
                .with_context(|| format!("Failed to load measurement {}", path.display()))?;
            settings
                .reanalyse(meas)
                .with_context(|| format!("Failed to re-estimate the FRF of {}", path.display()))
        })
        .collect::<Result<Vec<_>>>()?;
    bar.finish_and_clear();
    Ok(measurements)
}
