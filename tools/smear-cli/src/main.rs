//! Smear CLI — Command-line interface for queueing and running renders.
//!
//! Usage:
//!   smear render <INPUT>... [OPTIONS]   Queue and render one or more videos
//!   smear check                         Check hardware and external tools

use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "smear",
    about = "Motion blur and frame interpolation for videos",
    version,
    author
)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Queue one or more videos and render them in order
    Render {
        /// Input video files
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        /// Output file per input (defaults to a name derived from the input)
        #[arg(short, long)]
        output: Vec<PathBuf>,

        /// Settings file per input (defaults to the resolution cascade)
        #[arg(short, long)]
        config: Vec<PathBuf>,

        /// Prefer the global settings file over per-video ones
        #[arg(long)]
        prefer_global: bool,
    },

    /// Check hardware capabilities and external tools
    Check,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // App settings carry the logging shape (json, optional log file);
    // --verbose only widens the level.
    let mut logging = smear_common::config::AppSettings::load().logging;
    if cli.verbose {
        logging.level = "debug".to_string();
    }
    smear_common::logging::init_logging(&logging);

    match cli.command {
        Commands::Render {
            inputs,
            output,
            config,
            prefer_global,
        } => commands::render::run(inputs, output, config, prefer_global),
        Commands::Check => commands::check::run(),
    }
}
