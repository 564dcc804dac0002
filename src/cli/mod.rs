//! CLI Module
//!
//! Command-line launcher for the L3 capture suite and the offline audio checks.

pub mod commands;

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// RMF Audio Capture L3 suite runner
#[derive(Parser, Debug)]
#[command(name = "rmfaudio-cli")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run test cases against a device
    #[command(name = "run")]
    Run(RunArgs),

    /// Compare a captured wav file with its reference
    #[command(name = "compare")]
    Compare {
        /// Reference audio
        reference: PathBuf,

        /// Captured audio
        captured: PathBuf,

        /// Fetch both files from the device in this rack configuration over SSH
        #[arg(long)]
        rack: Option<PathBuf>,
    },

    /// Print the pitch track summary of a wav file
    #[command(name = "pitch")]
    Pitch {
        /// Audio file to analyse
        file: PathBuf,
    },

    /// List the known test cases
    #[command(name = "list")]
    List,
}

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Rack configuration (device address and credentials)
    #[arg(long)]
    pub rack: PathBuf,

    /// Test setup descriptor (per-test streams and commands)
    #[arg(long)]
    pub setup: PathBuf,

    /// Test configuration (artifacts and menu launch command)
    #[arg(long)]
    pub config: PathBuf,

    /// Test case name, or "all"
    #[arg(short, long, default_value = "all")]
    pub test: String,

    /// Write the JSON report here
    #[arg(long)]
    pub report: Option<PathBuf>,

    /// Run on this machine instead of connecting over SSH
    #[arg(long)]
    pub local: bool,

    /// Data capture length in seconds
    #[arg(long, default_value_t = 10)]
    pub capture_secs: u32,

    /// Seconds between counter readings in the independence check
    #[arg(long, default_value_t = 2.0)]
    pub poll_secs: f64,
}
