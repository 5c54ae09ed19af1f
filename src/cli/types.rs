//! CLI type definitions
//!
//! This module contains clap command structures that define the CLI interface.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::cli::commands::{inspect::InspectArgs, run::RunArgs};

#[derive(Parser, Debug)]
#[command(name = "pioneer")]
#[command(about = "Pioneer - detects experts the group converges toward and pools their estimates", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Output in JSON format
    #[arg(short, long, global = true)]
    pub json: bool,

    /// Configuration file (defaults to .pioneer/config.yaml and .pioneer/local.yaml)
    #[arg(short, long, global = true, env = "PIONEER_CONFIG")]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Feed a JSON-lines observation file through the engine
    Run(RunArgs),

    /// Show persisted expert state
    Inspect(InspectArgs),

    /// Print the effective configuration
    Config,
}
