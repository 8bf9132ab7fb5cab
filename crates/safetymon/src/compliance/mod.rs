//! Compliance evaluation: document expiry, duty time, and the scan that
//! turns both into alerts.

pub mod duty;
pub mod expiry;
pub mod scanner;

pub use duty::{aggregate_window, aggregate_windows, DutyTotals, DutyWindow};
pub use expiry::{classify_expiry, ExpiryCutoffs, ExpiryStatus, ExpiryTier};
pub use scanner::{ComplianceScanner, PersonPlan, ScanReport};
