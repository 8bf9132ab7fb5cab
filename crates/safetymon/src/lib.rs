//! `safetymon` - Safety and compliance core for aviation operators
//!
//! This library scores risks on a likelihood/severity matrix, grades safety
//! performance indicators against multi-level thresholds, and scans
//! personnel records for expiring documents and duty-time breaches, raising
//! deduplicated alerts.

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

pub mod alert;
pub mod cli;
pub mod clock;
pub mod compliance;
pub mod config;
pub mod error;
pub mod logging;
pub mod records;
pub mod risk;
pub mod service;
pub mod spi;
pub mod storage;

pub use alert::{Alert, AlertKind, AlertStore, NewAlert};
pub use clock::{Clock, FixedClock, SystemClock};
pub use compliance::{ComplianceScanner, ScanReport};
pub use config::{Config, TenantConfig};
pub use error::{Error, Result};
pub use logging::init_logging;
pub use records::{InMemoryRecordStore, RecordStore};
pub use risk::{score_risk, RiskScore, RiskTier};
pub use service::SafetyCore;
pub use spi::{SpiEvaluation, SpiMonitor, SpiTier};
pub use storage::{AlertStoreStats, SqliteAlertStore};
