//! Error types for safetymon.
//!
//! This module defines all error types used throughout the safetymon crate.
//! Validation errors are surfaced to the caller that attempted a save;
//! scan-time errors are logged and isolated to the fact or person they
//! concern.

use std::path::PathBuf;
use thiserror::Error;

/// The main error type for safetymon operations.
#[derive(Error, Debug)]
pub enum Error {
    // === Validation Errors ===
    /// A likelihood or severity rank fell outside 1..=5.
    #[error("invalid {axis} rank {rank}: must be between 1 and 5")]
    InvalidRank {
        /// Which matrix axis the rank belongs to.
        axis: &'static str,
        /// The rejected rank.
        rank: i64,
    },

    /// A matrix label is not part of the domain's vocabulary.
    #[error("unknown {domain} label '{label}'")]
    UnknownLabel {
        /// The risk domain and axis that was consulted.
        domain: String,
        /// The label that failed to map.
        label: String,
    },

    /// SPI thresholds are not ordered consistently with their direction.
    #[error("invalid threshold order: {message}")]
    InvalidThresholdOrder {
        /// Description of the ordering violation.
        message: String,
    },

    /// An SPI event predicate could not be compiled.
    #[error("invalid event predicate: {message}")]
    InvalidPredicate {
        /// Description of what went wrong.
        message: String,
    },

    /// An SPI period is zero or longer than the supported maximum.
    #[error("invalid indicator period of {days} days: must be between 1 and {max}")]
    InvalidPeriod {
        /// The rejected period.
        days: u32,
        /// The longest supported period.
        max: u32,
    },

    /// A record carried a date that could not be parsed.
    #[error("malformed date '{value}'")]
    MalformedDate {
        /// The raw date text.
        value: String,
    },

    // === Store Errors ===
    /// The alert or record store could not be reached.
    #[error("store unavailable: {message}")]
    StoreUnavailable {
        /// Description of what went wrong.
        message: String,
    },

    /// No records exist for the requested tenant.
    #[error("unknown tenant '{0}'")]
    UnknownTenant(String),

    // === Storage Errors ===
    /// Failed to open or create the database.
    #[error("failed to open database at {path}: {source}")]
    DatabaseOpen {
        /// Path to the database file.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: rusqlite::Error,
    },

    /// A database query failed.
    #[error("database query failed: {0}")]
    DatabaseQuery(#[from] rusqlite::Error),

    /// Failed to run database migrations.
    #[error("database migration failed: {message}")]
    DatabaseMigration {
        /// Description of what went wrong.
        message: String,
    },

    // === Configuration Errors ===
    /// Failed to load configuration.
    #[error("failed to load configuration: {0}")]
    ConfigLoad(Box<figment::Error>),

    /// Configuration validation failed.
    #[error("invalid configuration: {message}")]
    ConfigValidation {
        /// Description of the validation failure.
        message: String,
    },

    // === I/O Errors ===
    /// File system operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to create a required directory.
    #[error("failed to create directory {path}: {source}")]
    DirectoryCreate {
        /// Path that couldn't be created.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    // === Serialization Errors ===
    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // === Generic Errors ===
    /// An internal error occurred (bug).
    #[error("internal error: {0}")]
    Internal(String),
}

/// A specialized Result type for safetymon operations.
pub type Result<T> = std::result::Result<T, Error>;

impl From<figment::Error> for Error {
    fn from(err: figment::Error) -> Self {
        Self::ConfigLoad(Box::new(err))
    }
}

impl Error {
    /// Create a new internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Create a store unavailable error.
    #[must_use]
    pub fn store_unavailable(message: impl Into<String>) -> Self {
        Self::StoreUnavailable {
            message: message.into(),
        }
    }

    /// Create a malformed date error.
    #[must_use]
    pub fn malformed_date(value: impl Into<String>) -> Self {
        Self::MalformedDate {
            value: value.into(),
        }
    }

    /// Create a threshold order error.
    #[must_use]
    pub fn threshold_order(message: impl Into<String>) -> Self {
        Self::InvalidThresholdOrder {
            message: message.into(),
        }
    }

    /// Check if this error is a validation failure that should block a save.
    #[must_use]
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::InvalidRank { .. }
                | Self::UnknownLabel { .. }
                | Self::InvalidThresholdOrder { .. }
                | Self::InvalidPredicate { .. }
                | Self::InvalidPeriod { .. }
        )
    }

    /// Check if this error came from the storage side of a scan.
    #[must_use]
    pub fn is_store_failure(&self) -> bool {
        matches!(
            self,
            Self::StoreUnavailable { .. }
                | Self::DatabaseOpen { .. }
                | Self::DatabaseQuery(_)
                | Self::DatabaseMigration { .. }
        )
    }
}
