// src/main.rs
use anyhow::Result;
use clap::Parser;
use log::LevelFilter;

use sdlma_core::cli::{self, Cli};

fn main() -> Result<()> {
    let args = Cli::parse();

    let level = if args.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Warn
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .format_timestamp(None)
        .init();

    cli::run(args)
}
