//! Multi-level alert thresholds for safety performance indicators.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Which way an indicator should move.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// Smaller values are better (e.g. runway incursions per 1000 movements).
    LowerIsBetter,
    /// Larger values are better (e.g. hazard reports filed per month).
    HigherIsBetter,
}

/// Alert tier for an indicator's current value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpiTier {
    /// At or better than target.
    OnTarget,
    /// Past target, within the second level.
    Monitor,
    /// Past the second level, within the third.
    Action,
    /// Past the third level.
    Urgent,
}

impl std::fmt::Display for SpiTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::OnTarget => write!(f, "on_target"),
            Self::Monitor => write!(f, "monitor"),
            Self::Action => write!(f, "action"),
            Self::Urgent => write!(f, "urgent"),
        }
    }
}

/// Serialized shape of [`AlertThresholds`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RawThresholds {
    /// Direction the indicator should move.
    pub direction: Direction,
    /// Target level.
    pub target: f64,
    /// Second alert level.
    pub alert2: f64,
    /// Third alert level.
    pub alert3: f64,
    /// Fourth alert level.
    pub alert4: f64,
}

/// An ordered, validated threshold set.
///
/// For [`Direction::LowerIsBetter`] the levels satisfy
/// `target <= alert2 <= alert3 <= alert4`; for
/// [`Direction::HigherIsBetter`] the order is reversed. Values past `alert4`
/// stay [`SpiTier::Urgent`]; the fourth level bounds the urgent band for
/// display.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawThresholds", into = "RawThresholds")]
pub struct AlertThresholds {
    direction: Direction,
    levels: [f64; 4],
}

impl AlertThresholds {
    /// Validate and build a threshold set.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidThresholdOrder`] if any level is not finite or
    /// the levels are not ordered for the direction.
    pub fn new(
        direction: Direction,
        target: f64,
        alert2: f64,
        alert3: f64,
        alert4: f64,
    ) -> Result<Self> {
        let levels = [target, alert2, alert3, alert4];
        if levels.iter().any(|level| !level.is_finite()) {
            return Err(Error::threshold_order("threshold levels must be finite"));
        }

        let names = ["target", "alert2", "alert3", "alert4"];
        for i in 0..3 {
            let (a, b) = (levels[i], levels[i + 1]);
            let ordered = match direction {
                Direction::LowerIsBetter => a <= b,
                Direction::HigherIsBetter => a >= b,
            };
            if !ordered {
                let relation = match direction {
                    Direction::LowerIsBetter => "<=",
                    Direction::HigherIsBetter => ">=",
                };
                return Err(Error::threshold_order(format!(
                    "{} ({a}) must be {relation} {} ({b}) when {}",
                    names[i],
                    names[i + 1],
                    direction_name(direction)
                )));
            }
        }

        Ok(Self { direction, levels })
    }

    /// Direction of the indicator.
    #[must_use]
    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// Target level.
    #[must_use]
    pub fn target(&self) -> f64 {
        self.levels[0]
    }

    /// Levels as `[target, alert2, alert3, alert4]`.
    #[must_use]
    pub fn levels(&self) -> [f64; 4] {
        self.levels
    }
}

fn direction_name(direction: Direction) -> &'static str {
    match direction {
        Direction::LowerIsBetter => "lower is better",
        Direction::HigherIsBetter => "higher is better",
    }
}

impl TryFrom<RawThresholds> for AlertThresholds {
    type Error = Error;

    fn try_from(raw: RawThresholds) -> Result<Self> {
        Self::new(raw.direction, raw.target, raw.alert2, raw.alert3, raw.alert4)
    }
}

impl From<AlertThresholds> for RawThresholds {
    fn from(thresholds: AlertThresholds) -> Self {
        let [target, alert2, alert3, alert4] = thresholds.levels;
        Self {
            direction: thresholds.direction,
            target,
            alert2,
            alert3,
            alert4,
        }
    }
}

/// Return the highest tier whose level the value has passed.
#[must_use]
pub fn evaluate(value: f64, thresholds: &AlertThresholds) -> SpiTier {
    let [target, alert2, alert3, _] = thresholds.levels;
    // Has the value moved past `level` in the bad direction?
    let past = |level: f64| match thresholds.direction {
        Direction::LowerIsBetter => value > level,
        Direction::HigherIsBetter => value < level,
    };

    if past(alert3) {
        SpiTier::Urgent
    } else if past(alert2) {
        SpiTier::Action
    } else if past(target) {
        SpiTier::Monitor
    } else {
        SpiTier::OnTarget
    }
}
