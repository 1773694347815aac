use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "mediashelf")]
#[command(author, version, about = "Media library with background metadata harvesting")]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the metadata harvester until interrupted
    Start,

    /// Index media files so the harvester picks them up
    Add {
        /// Files to add
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// Probe a media file and display its technical metadata
    Probe {
        /// File to probe
        #[arg(required = true)]
        file: PathBuf,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show how many media records are in each metadata status
    Status,

    /// Queue every failed record for another extraction attempt
    ResetFailed,

    /// Check that required external tools are available
    CheckTools,

    /// Validate configuration file
    Validate {
        /// Config file to validate (uses default if not specified)
        config: Option<PathBuf>,
    },

    /// Display version information
    Version,
}
