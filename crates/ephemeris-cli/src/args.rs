//! Command-line argument definitions for the Ephemeris CLI.
//!
//! This module defines the [`Args`] structure parsed from the command line
//! using [`clap`]. Arguments control input sources, baseline selection,
//! configuration file selection, and logging verbosity.

use clap::Parser;

/// Command-line arguments for the Ephemeris configuration tool
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Paths to the desired-state configuration files
    #[arg(required = true, help = "Paths to the input configuration files")]
    pub inputs: Vec<String>,

    /// Paths to observed-state configuration files to diff against
    #[arg(short, long)]
    pub baseline: Vec<String>,

    /// Namespace the sources belong to
    #[arg(short, long, default_value = "main")]
    pub namespace: String,

    /// Validate the sources without computing a plan
    #[arg(long)]
    pub check: bool,

    /// Path to configuration file (TOML)
    #[arg(short, long)]
    pub config: Option<String>,

    /// Log level (off, error, warn, info, debug, trace)
    #[arg(long, default_value = "info")]
    pub log_level: String,
}
