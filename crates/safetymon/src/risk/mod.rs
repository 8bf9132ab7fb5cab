//! Risk scoring for likelihood × severity assessments.
//!
//! The scorer works on ranks only. Each safety domain keeps its own label
//! vocabulary in [`matrix`] and maps labels to ranks before calling
//! [`score_risk`].
//!
//! # Example
//!
//! ```
//! use safetymon::risk::{score_risk, RiskTier};
//!
//! let score = score_risk(3, 4).unwrap();
//! assert_eq!(score.score, 12);
//! assert_eq!(score.tier, RiskTier::High);
//! ```

pub mod matrix;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Lowest valid rank on either axis.
pub const MIN_RANK: u8 = 1;

/// Highest valid rank on either axis.
pub const MAX_RANK: u8 = 5;

/// Severity tier derived from a risk score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskTier {
    /// Score 1–4.
    Low,
    /// Score 5–9.
    Medium,
    /// Score 10–16.
    High,
    /// Score 17–25.
    Extreme,
}

impl RiskTier {
    /// Tier for a score, by fixed bands.
    #[must_use]
    pub fn from_score(score: u8) -> Self {
        match score {
            0..=4 => Self::Low,
            5..=9 => Self::Medium,
            10..=16 => Self::High,
            _ => Self::Extreme,
        }
    }

    /// Display color for the tier.
    #[must_use]
    pub fn color(self) -> &'static str {
        match self {
            Self::Low => "#22c55e",
            Self::Medium => "#eab308",
            Self::High => "#f97316",
            Self::Extreme => "#dc2626",
        }
    }
}

impl std::fmt::Display for RiskTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Low => write!(f, "low"),
            Self::Medium => write!(f, "medium"),
            Self::High => write!(f, "high"),
            Self::Extreme => write!(f, "extreme"),
        }
    }
}

/// The result of scoring one matrix cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RiskScore {
    /// `likelihood * severity`, 1–25.
    pub score: u8,
    /// Tier for the score.
    pub tier: RiskTier,
    /// Display color for the tier.
    pub color: &'static str,
}

/// Score a likelihood/severity rank pair.
///
/// # Errors
///
/// Returns [`Error::InvalidRank`] if either rank is outside 1..=5. Ranks
/// are never clamped.
pub fn score_risk(likelihood: u8, severity: u8) -> Result<RiskScore> {
    check_rank("likelihood", likelihood)?;
    check_rank("severity", severity)?;

    let score = likelihood * severity;
    let tier = RiskTier::from_score(score);
    Ok(RiskScore {
        score,
        tier,
        color: tier.color(),
    })
}

fn check_rank(axis: &'static str, rank: u8) -> Result<()> {
    if (MIN_RANK..=MAX_RANK).contains(&rank) {
        Ok(())
    } else {
        Err(Error::InvalidRank {
            axis,
            rank: i64::from(rank),
        })
    }
}

/// Continuous green-to-red color for a score, as `#rrggbb`.
///
/// Scores outside 1..=25 are pinned to the nearest end of the gradient.
#[must_use]
pub fn gradient_color(score: u8) -> String {
    let clamped = f64::from(score.clamp(1, 25));
    let t = (clamped - 1.0) / 24.0;

    // green (34,197,94) -> amber (234,179,8) -> red (220,38,38)
    let (from, to, local) = if t < 0.5 {
        ((34.0, 197.0, 94.0), (234.0, 179.0, 8.0), t * 2.0)
    } else {
        ((234.0, 179.0, 8.0), (220.0, 38.0, 38.0), (t - 0.5) * 2.0)
    };
    let lerp = |a: f64, b: f64| channel(a + (b - a) * local);

    format!(
        "#{:02x}{:02x}{:02x}",
        lerp(from.0, to.0),
        lerp(from.1, to.1),
        lerp(from.2, to.2)
    )
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn channel(value: f64) -> u8 {
    value.round().clamp(0.0, 255.0) as u8
}

/// A persisted likelihood × severity assessment.
///
/// Score and tier are always derived together from the two ranks. There is
/// no way to change one field without recomputing the others.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RiskAssessment {
    likelihood_rank: u8,
    severity_rank: u8,
    score: u8,
    tier: RiskTier,
}

impl RiskAssessment {
    /// Assess a matrix cell.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidRank`] if either rank is outside 1..=5.
    pub fn assess(likelihood_rank: u8, severity_rank: u8) -> Result<Self> {
        let scored = score_risk(likelihood_rank, severity_rank)?;
        Ok(Self {
            likelihood_rank,
            severity_rank,
            score: scored.score,
            tier: scored.tier,
        })
    }

    /// Re-assess with new ranks, recomputing every derived field.
    ///
    /// On error the assessment is left unchanged.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidRank`] if either rank is outside 1..=5.
    pub fn reassess(&mut self, likelihood_rank: u8, severity_rank: u8) -> Result<()> {
        *self = Self::assess(likelihood_rank, severity_rank)?;
        Ok(())
    }

    /// Likelihood rank, 1–5.
    #[must_use]
    pub fn likelihood_rank(&self) -> u8 {
        self.likelihood_rank
    }

    /// Severity rank, 1–5.
    #[must_use]
    pub fn severity_rank(&self) -> u8 {
        self.severity_rank
    }

    /// Derived score, 1–25.
    #[must_use]
    pub fn score(&self) -> u8 {
        self.score
    }

    /// Derived tier.
    #[must_use]
    pub fn tier(&self) -> RiskTier {
        self.tier
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_score_is_product_for_all_ranks() {
        for a in MIN_RANK..=MAX_RANK {
            for b in MIN_RANK..=MAX_RANK {
                let scored = score_risk(a, b).unwrap();
                assert_eq!(scored.score, a * b);
                assert_eq!(scored.tier, RiskTier::from_score(a * b));
                assert_eq!(scored.color, scored.tier.color());
            }
        }
    }

    #[test]
    fn test_tier_boundaries() {
        assert_eq!(RiskTier::from_score(4), RiskTier::Low);
        assert_eq!(RiskTier::from_score(5), RiskTier::Medium);
        assert_eq!(RiskTier::from_score(9), RiskTier::Medium);
        assert_eq!(RiskTier::from_score(10), RiskTier::High);
        assert_eq!(RiskTier::from_score(16), RiskTier::High);
        assert_eq!(RiskTier::from_score(17), RiskTier::Extreme);
    }

    #[test]
    fn test_reference_cells() {
        let cell = score_risk(3, 3).unwrap();
        assert_eq!((cell.score, cell.tier), (9, RiskTier::Medium));

        let cell = score_risk(4, 4).unwrap();
        assert_eq!((cell.score, cell.tier), (16, RiskTier::High));

        let cell = score_risk(5, 5).unwrap();
        assert_eq!((cell.score, cell.tier), (25, RiskTier::Extreme));

        let cell = score_risk(1, 1).unwrap();
        assert_eq!((cell.score, cell.tier), (1, RiskTier::Low));
    }

    #[test]
    fn test_rank_out_of_range_rejected() {
        let err = score_risk(0, 3).unwrap_err();
        assert!(matches!(
            err,
            Error::InvalidRank {
                axis: "likelihood",
                rank: 0
            }
        ));

        let err = score_risk(2, 6).unwrap_err();
        assert!(matches!(
            err,
            Error::InvalidRank {
                axis: "severity",
                rank: 6
            }
        ));
        assert!(err.is_validation());
    }

    #[test]
    fn test_tier_ordering() {
        assert!(RiskTier::Low < RiskTier::Medium);
        assert!(RiskTier::Medium < RiskTier::High);
        assert!(RiskTier::High < RiskTier::Extreme);
    }

    #[test]
    fn test_tier_colors_distinct() {
        let colors = [
            RiskTier::Low.color(),
            RiskTier::Medium.color(),
            RiskTier::High.color(),
            RiskTier::Extreme.color(),
        ];
        for (i, a) in colors.iter().enumerate() {
            for b in &colors[i + 1..] {
                assert_ne!(a, b);
            }
        }
    }

    #[test]
    fn test_gradient_endpoints() {
        assert_eq!(gradient_color(1), "#22c55e");
        assert_eq!(gradient_color(25), "#dc2626");
        assert_eq!(gradient_color(13), "#eab308");
        // Out of range scores pin to the ends
        assert_eq!(gradient_color(0), gradient_color(1));
        assert_eq!(gradient_color(200), gradient_color(25));
    }

    #[test]
    fn test_assessment_derives_fields() {
        let assessment = RiskAssessment::assess(4, 3).unwrap();
        assert_eq!(assessment.likelihood_rank(), 4);
        assert_eq!(assessment.severity_rank(), 3);
        assert_eq!(assessment.score(), 12);
        assert_eq!(assessment.tier(), RiskTier::High);
    }

    #[test]
    fn test_reassess_recomputes_everything() {
        let mut assessment = RiskAssessment::assess(5, 5).unwrap();
        assessment.reassess(1, 2).unwrap();

        assert_eq!(assessment.score(), 2);
        assert_eq!(assessment.tier(), RiskTier::Low);
    }

    #[test]
    fn test_reassess_failure_leaves_assessment_intact() {
        let mut assessment = RiskAssessment::assess(2, 2).unwrap();
        assert!(assessment.reassess(9, 1).is_err());
        assert_eq!(assessment, RiskAssessment::assess(2, 2).unwrap());
    }

    #[test]
    fn test_tier_display() {
        assert_eq!(RiskTier::Extreme.to_string(), "extreme");
        assert_eq!(RiskTier::Low.to_string(), "low");
    }
}
