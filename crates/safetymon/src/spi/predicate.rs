//! Selection of the safety events an indicator aggregates.

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::records::SafetyEvent;
use crate::risk::RiskTier;

/// Serialized shape of [`EventPredicate`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RawPredicate {
    /// Categories to include. Empty includes every category.
    pub categories: Vec<String>,
    /// Minimum triaged risk tier.
    pub min_risk_tier: Option<RiskTier>,
    /// Regex the summary must match.
    pub summary_pattern: Option<String>,
}

/// A compiled event predicate.
///
/// All conditions must hold for an event to match. The default predicate
/// matches every event.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(try_from = "RawPredicate", into = "RawPredicate")]
pub struct EventPredicate {
    categories: Vec<String>,
    min_risk_tier: Option<RiskTier>,
    summary_pattern: Option<Regex>,
}

impl EventPredicate {
    /// Build a predicate, compiling the summary pattern.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidPredicate`] if the pattern is not a valid regex.
    pub fn new(
        categories: Vec<String>,
        min_risk_tier: Option<RiskTier>,
        summary_pattern: Option<&str>,
    ) -> Result<Self> {
        let summary_pattern = summary_pattern
            .map(|pattern| {
                Regex::new(pattern).map_err(|e| Error::InvalidPredicate {
                    message: format!("summary pattern '{pattern}': {e}"),
                })
            })
            .transpose()?;

        Ok(Self {
            categories,
            min_risk_tier,
            summary_pattern,
        })
    }

    /// Predicate selecting a single category.
    #[must_use]
    pub fn category(category: impl Into<String>) -> Self {
        Self {
            categories: vec![category.into()],
            ..Self::default()
        }
    }

    /// Does the event satisfy every condition?
    #[must_use]
    pub fn matches(&self, event: &SafetyEvent) -> bool {
        if !self.categories.is_empty()
            && !self
                .categories
                .iter()
                .any(|c| c.eq_ignore_ascii_case(&event.category))
        {
            return false;
        }

        if let Some(min) = self.min_risk_tier {
            if !event.risk_tier.is_some_and(|tier| tier >= min) {
                return false;
            }
        }

        self.summary_pattern
            .as_ref()
            .map_or(true, |re| re.is_match(&event.summary))
    }
}

impl TryFrom<RawPredicate> for EventPredicate {
    type Error = Error;

    fn try_from(raw: RawPredicate) -> Result<Self> {
        Self::new(
            raw.categories,
            raw.min_risk_tier,
            raw.summary_pattern.as_deref(),
        )
    }
}

impl From<EventPredicate> for RawPredicate {
    fn from(predicate: EventPredicate) -> Self {
        Self {
            categories: predicate.categories,
            min_risk_tier: predicate.min_risk_tier,
            summary_pattern: predicate.summary_pattern.map(|re| re.as_str().to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(category: &str, tier: Option<RiskTier>, summary: &str) -> SafetyEvent {
        SafetyEvent {
            id: "e1".to_string(),
            occurred_on: "2024-08-01".to_string(),
            category: category.to_string(),
            risk_tier: tier,
            summary: summary.to_string(),
        }
    }

    #[test]
    fn test_default_matches_everything() {
        let predicate = EventPredicate::default();
        assert!(predicate.matches(&event("bird_strike", None, "")));
    }

    #[test]
    fn test_category_filter_ignores_case() {
        let predicate = EventPredicate::category("Runway_Incursion");
        assert!(predicate.matches(&event("runway_incursion", None, "")));
        assert!(!predicate.matches(&event("bird_strike", None, "")));
    }

    #[test]
    fn test_min_risk_tier() {
        let predicate = EventPredicate::new(Vec::new(), Some(RiskTier::High), None).unwrap();
        assert!(predicate.matches(&event("x", Some(RiskTier::Extreme), "")));
        assert!(predicate.matches(&event("x", Some(RiskTier::High), "")));
        assert!(!predicate.matches(&event("x", Some(RiskTier::Medium), "")));
        // Untriaged events never meet a tier floor
        assert!(!predicate.matches(&event("x", None, "")));
    }

    #[test]
    fn test_summary_pattern() {
        let predicate =
            EventPredicate::new(Vec::new(), None, Some(r"(?i)unstable approach")).unwrap();
        assert!(predicate.matches(&event("x", None, "Unstable approach, go-around flown")));
        assert!(!predicate.matches(&event("x", None, "Hard landing")));
    }

    #[test]
    fn test_invalid_pattern_rejected() {
        let err = EventPredicate::new(Vec::new(), None, Some("[unclosed")).unwrap_err();
        assert!(matches!(err, Error::InvalidPredicate { .. }));
        assert!(err.is_validation());
    }

    #[test]
    fn test_deserialize_compiles_pattern() {
        let json = r#"{"categories": ["airprox"], "summary_pattern": "TCAS"}"#;
        let predicate: EventPredicate = serde_json::from_str(json).unwrap();
        assert!(predicate.matches(&event("airprox", None, "TCAS RA followed")));

        let bad = r#"{"summary_pattern": "("}"#;
        assert!(serde_json::from_str::<EventPredicate>(bad).is_err());
    }
}
