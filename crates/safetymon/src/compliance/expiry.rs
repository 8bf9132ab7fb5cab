//! Document expiry classification.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Day-count cutoffs separating urgent from warning expiries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ExpiryCutoffs {
    urgent_days: u32,
    warning_days: u32,
}

impl ExpiryCutoffs {
    /// Build cutoffs.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConfigValidation`] unless `urgent_days < warning_days`.
    pub fn new(urgent_days: u32, warning_days: u32) -> Result<Self> {
        if urgent_days >= warning_days {
            return Err(Error::ConfigValidation {
                message: format!(
                    "urgent cutoff ({urgent_days}) must be less than warning cutoff ({warning_days})"
                ),
            });
        }
        Ok(Self {
            urgent_days,
            warning_days,
        })
    }

    /// Days at or under which an expiry is urgent.
    #[must_use]
    pub fn urgent_days(&self) -> u32 {
        self.urgent_days
    }

    /// Days at or under which an expiry is a warning.
    #[must_use]
    pub fn warning_days(&self) -> u32 {
        self.warning_days
    }
}

impl Default for ExpiryCutoffs {
    fn default() -> Self {
        Self {
            urgent_days: 30,
            warning_days: 60,
        }
    }
}

/// How close a document is to expiring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExpiryTier {
    /// Further out than the warning cutoff.
    Clear,
    /// Within the warning cutoff.
    Warning,
    /// Within the urgent cutoff, including today.
    Urgent,
    /// Already past its expiry date.
    Expired,
}

impl ExpiryTier {
    /// Whether a scan raises an alert for this tier.
    ///
    /// Expired documents are not alerted here; they are expected to have
    /// been alerted while still urgent.
    #[must_use]
    pub fn is_alertable(self) -> bool {
        matches!(self, Self::Warning | Self::Urgent)
    }
}

impl std::fmt::Display for ExpiryTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Clear => write!(f, "clear"),
            Self::Warning => write!(f, "warning"),
            Self::Urgent => write!(f, "urgent"),
            Self::Expired => write!(f, "expired"),
        }
    }
}

/// Classification of one expiry date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ExpiryStatus {
    /// `expiry - today` in whole days; negative once expired.
    pub days_remaining: i64,
    /// Tier for `days_remaining`.
    pub tier: ExpiryTier,
}

/// Classify an expiry date relative to `today`.
#[must_use]
pub fn classify_expiry(
    expiry: NaiveDate,
    today: NaiveDate,
    cutoffs: &ExpiryCutoffs,
) -> ExpiryStatus {
    let days_remaining = (expiry - today).num_days();
    let tier = if days_remaining < 0 {
        ExpiryTier::Expired
    } else if days_remaining <= i64::from(cutoffs.urgent_days) {
        ExpiryTier::Urgent
    } else if days_remaining <= i64::from(cutoffs.warning_days) {
        ExpiryTier::Warning
    } else {
        ExpiryTier::Clear
    };

    ExpiryStatus {
        days_remaining,
        tier,
    }
}
