//! Per-domain label vocabularies for the risk matrix.
//!
//! Safety occurrence triage and change-management hazard logs rate the same
//! five ranks with different words. Each domain is a small lookup table from
//! label to rank; the scorer itself never sees labels.

use serde::{Deserialize, Serialize};

use super::{score_risk, RiskScore};
use crate::error::{Error, Result};

/// Matrix axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Axis {
    /// How likely the outcome is.
    Likelihood,
    /// How bad the outcome would be.
    Severity,
}

impl std::fmt::Display for Axis {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Likelihood => write!(f, "likelihood"),
            Self::Severity => write!(f, "severity"),
        }
    }
}

/// The safety domain whose vocabulary a label belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskDomain {
    /// Safety occurrence reports.
    #[default]
    SafetyOccurrence,
    /// Change-management hazard logs.
    ChangeHazard,
}

// Ordered by rank, lowest first.
const OCCURRENCE_LIKELIHOOD: [&str; 5] = ["Rare", "Unlikely", "Possible", "Likely", "Certain"];
const OCCURRENCE_SEVERITY: [&str; 5] = [
    "Insignificant",
    "Minor",
    "Moderate",
    "Major",
    "Catastrophic",
];
const HAZARD_LIKELIHOOD: [&str; 5] = [
    "Extremely Improbable",
    "Improbable",
    "Remote",
    "Occasional",
    "Frequent",
];
const HAZARD_SEVERITY: [&str; 5] = [
    "Negligible",
    "Minor",
    "Major",
    "Hazardous",
    "Catastrophic",
];

impl RiskDomain {
    /// Labels for an axis, ordered from rank 1 to rank 5.
    #[must_use]
    pub fn labels(self, axis: Axis) -> &'static [&'static str; 5] {
        match (self, axis) {
            (Self::SafetyOccurrence, Axis::Likelihood) => &OCCURRENCE_LIKELIHOOD,
            (Self::SafetyOccurrence, Axis::Severity) => &OCCURRENCE_SEVERITY,
            (Self::ChangeHazard, Axis::Likelihood) => &HAZARD_LIKELIHOOD,
            (Self::ChangeHazard, Axis::Severity) => &HAZARD_SEVERITY,
        }
    }

    /// Map a label to its rank.
    ///
    /// Matching ignores case, spaces, hyphens and underscores, so
    /// `"extremely_improbable"` and `"Extremely Improbable"` are the same.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownLabel`] if the label is not in the table.
    pub fn rank(self, axis: Axis, label: &str) -> Result<u8> {
        let wanted = normalize(label);
        self.labels(axis)
            .iter()
            .position(|candidate| normalize(candidate) == wanted)
            .and_then(|index| u8::try_from(index + 1).ok())
            .ok_or_else(|| Error::UnknownLabel {
                domain: format!("{self} {axis}"),
                label: label.to_string(),
            })
    }

    /// The label for a rank, if the rank is 1–5.
    #[must_use]
    pub fn label(self, axis: Axis, rank: u8) -> Option<&'static str> {
        let index = usize::from(rank).checked_sub(1)?;
        self.labels(axis).get(index).copied()
    }

    /// Map both labels to ranks and score the cell.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownLabel`] if either label is unknown.
    pub fn score_labels(self, likelihood: &str, severity: &str) -> Result<RiskScore> {
        let likelihood_rank = self.rank(Axis::Likelihood, likelihood)?;
        let severity_rank = self.rank(Axis::Severity, severity)?;
        score_risk(likelihood_rank, severity_rank)
    }
}

impl std::fmt::Display for RiskDomain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SafetyOccurrence => write!(f, "safety occurrence"),
            Self::ChangeHazard => write!(f, "change hazard"),
        }
    }
}

fn normalize(label: &str) -> String {
    label
        .chars()
        .filter(|c| !matches!(c, ' ' | '-' | '_'))
        .flat_map(char::to_lowercase)
        .collect()
}
