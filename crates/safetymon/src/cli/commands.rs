//! CLI command definitions.

use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Args, Subcommand, ValueEnum};

use crate::alert::AlertKind;
use crate::risk::matrix::RiskDomain;

/// Risk scoring arguments.
#[derive(Debug, Args)]
pub struct ScoreCommand {
    /// Likelihood rank (1-5) or label, e.g. "Likely"
    pub likelihood: String,

    /// Severity rank (1-5) or label, e.g. "Major"
    pub severity: String,

    /// Label tables to resolve names against
    #[arg(short, long, value_enum, default_value = "occurrence")]
    pub domain: DomainArg,

    /// Output as JSON
    #[arg(short, long)]
    pub json: bool,
}

/// Compliance scan arguments.
#[derive(Debug, Args)]
pub struct ScanCommand {
    /// Tenant to scan
    #[arg(short, long)]
    pub tenant: String,

    /// JSON record snapshot to read
    #[arg(short, long, value_name = "FILE")]
    pub records: PathBuf,

    /// Evaluate as of this date instead of today (YYYY-MM-DD)
    #[arg(long, value_name = "DATE")]
    pub as_of: Option<NaiveDate>,

    /// Output as JSON
    #[arg(short, long)]
    pub json: bool,
}

/// Indicator evaluation arguments.
#[derive(Debug, Args)]
pub struct SpiCommand {
    /// Tenant whose indicators to evaluate
    #[arg(short, long)]
    pub tenant: String,

    /// JSON record snapshot to read
    #[arg(short, long, value_name = "FILE")]
    pub records: PathBuf,

    /// Evaluate as of this date instead of today (YYYY-MM-DD)
    #[arg(long, value_name = "DATE")]
    pub as_of: Option<NaiveDate>,

    /// Output as JSON
    #[arg(short, long)]
    pub json: bool,
}

/// Alert commands.
#[derive(Debug, Subcommand)]
pub enum AlertsCommand {
    /// List alerts a person has not acknowledged
    List {
        /// Tenant the person belongs to
        #[arg(short, long)]
        tenant: String,

        /// Person whose alerts to list
        #[arg(short, long)]
        person: String,

        /// Only these kinds (repeatable)
        #[arg(short, long = "kind", value_enum)]
        kinds: Vec<AlertKindArg>,

        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Acknowledge alerts on behalf of a person
    Ack {
        /// Person acknowledging
        #[arg(short, long)]
        person: String,

        /// Alert ids
        #[arg(required = true)]
        ids: Vec<i64>,
    },
}

/// Configuration commands.
#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration
    Show {
        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Show the configuration file path
    Path,

    /// Validate configuration
    Validate {
        /// Path to configuration file to validate
        #[arg(short, long)]
        file: Option<PathBuf>,
    },
}

/// Risk label domain argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum DomainArg {
    /// Safety occurrence tables
    Occurrence,
    /// Change-management hazard tables
    Hazard,
}

impl From<DomainArg> for RiskDomain {
    fn from(arg: DomainArg) -> Self {
        match arg {
            DomainArg::Occurrence => Self::SafetyOccurrence,
            DomainArg::Hazard => Self::ChangeHazard,
        }
    }
}

/// Alert kind argument for filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum AlertKindArg {
    /// Document expiry alerts
    DocumentExpiry,
    /// Duty limit alerts
    DutyLimit,
    /// Manually raised alerts
    Manual,
}

impl From<AlertKindArg> for AlertKind {
    fn from(arg: AlertKindArg) -> Self {
        match arg {
            AlertKindArg::DocumentExpiry => Self::DocumentExpiry,
            AlertKindArg::DutyLimit => Self::DutyLimit,
            AlertKindArg::Manual => Self::Manual,
        }
    }
}
