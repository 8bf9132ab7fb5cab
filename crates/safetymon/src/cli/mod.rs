//! Command-line interface for safetymon.

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::logging::Verbosity;

pub use commands::{
    AlertKindArg, AlertsCommand, ConfigCommand, DomainArg, ScanCommand, ScoreCommand, SpiCommand,
};

/// safetymon - Aviation safety and compliance monitoring
///
/// Scores risks, scans personnel records for expiring documents and duty
/// limit breaches, and grades safety performance indicators.
#[derive(Debug, Parser)]
#[command(name = "safetymon")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to custom configuration file
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Increase verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// The command to execute
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Score a likelihood/severity pair
    Score(ScoreCommand),

    /// Scan a tenant for expiring documents and duty limit breaches
    Scan(ScanCommand),

    /// Evaluate a tenant's safety performance indicators
    Spi(SpiCommand),

    /// List or acknowledge alerts
    #[command(subcommand)]
    Alerts(AlertsCommand),

    /// View or validate configuration
    #[command(subcommand)]
    Config(ConfigCommand),
}

impl Cli {
    /// Get the verbosity level based on flags.
    #[must_use]
    pub fn verbosity(&self) -> Verbosity {
        if self.quiet {
            Verbosity::Quiet
        } else {
            match self.verbose {
                0 => Verbosity::Normal,
                1 => Verbosity::Verbose,
                _ => Verbosity::Trace,
            }
        }
    }
}
