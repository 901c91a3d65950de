//! Command-line interface

pub mod commands;
pub mod output;
pub mod terminal_output;

use clap::{Parser, Subcommand};
use commands::{ConfigCommand, UpCommand};
use std::ffi::OsString;

/// Local database development helper
#[derive(Debug, Parser, Clone)]
#[command(name = "devdb")]
#[command(version)]
#[command(
    about = "Build the database image, force-recreate its service and follow its logs",
    long_about = None
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to configuration file (defaults to ./devdb.yaml when present)
    #[arg(short, long, global = true)]
    pub config: Option<String>,
}

/// Available commands
#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Build, recreate and follow (the default workflow)
    Up(UpCommand),

    /// Print the resolved configuration
    Config(ConfigCommand),
}

impl Cli {
    /// Parse CLI arguments from environment
    pub fn from_args() -> Self {
        Self::parse()
    }

    /// Parse CLI arguments from a slice
    pub fn try_parse_from<I, T>(itr: I) -> Result<Self, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        <Self as Parser>::try_parse_from(itr)
    }
}
