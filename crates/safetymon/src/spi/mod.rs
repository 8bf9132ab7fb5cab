//! Safety performance indicators.
//!
//! An indicator aggregates the tenant's historical safety events over a
//! trailing period and grades the result against its alert thresholds.
//! Evaluations are presented for management review; this module never
//! writes alerts.

mod predicate;
pub mod threshold;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::MAX_PERIOD_DAYS;
use crate::error::{Error, Result};
use crate::records::{parse_record_date, window_start, ExposureBasis, RecordStore, SafetyEvent};

pub use predicate::{EventPredicate, RawPredicate};
pub use threshold::{evaluate, AlertThresholds, Direction, SpiTier};

/// How an indicator's value is computed from its matching events.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum CalculationMode {
    /// Raw number of events in the period.
    Count,
    /// Events per `per` units of exposure in the period.
    Rate {
        /// What the count is normalized by.
        basis: ExposureBasis,
        /// Scale, e.g. 1000 for "per 1000 flight hours".
        per: f64,
    },
}

fn default_period_days() -> u32 {
    30
}

/// Serialized shape of [`SpiDefinition`].
#[derive(Debug, Clone, Deserialize)]
pub struct RawSpiDefinition {
    id: String,
    name: String,
    calculation_mode: CalculationMode,
    #[serde(default)]
    unit: String,
    #[serde(default = "default_period_days")]
    period_days: u32,
    thresholds: AlertThresholds,
    #[serde(default)]
    predicate: EventPredicate,
}

/// A configured safety performance indicator.
///
/// Thresholds, predicate and rate scale are validated when the definition
/// is built or deserialized, so every value of this type can be evaluated.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "RawSpiDefinition")]
pub struct SpiDefinition {
    /// Unique id within the tenant.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Count or rate.
    pub calculation_mode: CalculationMode,
    /// Unit label, e.g. "per month" or "per 1000 hrs".
    pub unit: String,
    /// Length of the trailing period in days.
    pub period_days: u32,
    /// Validated alert thresholds.
    pub thresholds: AlertThresholds,
    /// Which events the indicator aggregates.
    pub predicate: EventPredicate,
}

impl SpiDefinition {
    /// Build a definition.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidThresholdOrder`] if a rate scale is not a
    /// positive number, and [`Error::InvalidPeriod`] if `period_days` is zero
    /// or longer than [`MAX_PERIOD_DAYS`].
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        calculation_mode: CalculationMode,
        unit: impl Into<String>,
        period_days: u32,
        thresholds: AlertThresholds,
        predicate: EventPredicate,
    ) -> Result<Self> {
        if period_days == 0 || period_days > MAX_PERIOD_DAYS {
            return Err(Error::InvalidPeriod {
                days: period_days,
                max: MAX_PERIOD_DAYS,
            });
        }
        if let CalculationMode::Rate { per, .. } = calculation_mode {
            if !per.is_finite() || per <= 0.0 {
                return Err(Error::threshold_order(format!(
                    "rate scale must be positive, got {per}"
                )));
            }
        }

        Ok(Self {
            id: id.into(),
            name: name.into(),
            calculation_mode,
            unit: unit.into(),
            period_days,
            thresholds,
            predicate,
        })
    }
}

impl TryFrom<RawSpiDefinition> for SpiDefinition {
    type Error = Error;

    fn try_from(raw: RawSpiDefinition) -> Result<Self> {
        Self::new(
            raw.id,
            raw.name,
            raw.calculation_mode,
            raw.unit,
            raw.period_days,
            raw.thresholds,
            raw.predicate,
        )
    }
}

/// One indicator's current standing.
#[derive(Debug, Clone, Serialize)]
pub struct SpiEvaluation {
    /// The evaluated definition.
    pub definition: SpiDefinition,
    /// Matching events inside the period.
    pub event_count: usize,
    /// Count or rate value. `None` for a rate with no exposure in the
    /// period, which cannot be graded.
    pub current_value: Option<f64>,
    /// Tier for the value, if there is one.
    pub tier: Option<SpiTier>,
}

/// Evaluates a tenant's indicators against the current record snapshot.
#[derive(Debug)]
pub struct SpiMonitor<'a, R: RecordStore + ?Sized> {
    records: &'a R,
}

impl<'a, R: RecordStore + ?Sized> SpiMonitor<'a, R> {
    /// Create a monitor over a record store.
    #[must_use]
    pub fn new(records: &'a R) -> Self {
        Self { records }
    }

    /// Evaluate every indicator of a tenant as of `reference`.
    ///
    /// # Errors
    ///
    /// Returns an error if the record store cannot be read.
    pub fn evaluate(&self, tenant_id: &str, reference: NaiveDate) -> Result<Vec<SpiEvaluation>> {
        let definitions = self.records.list_spi_definitions(tenant_id)?;
        debug!(
            tenant = tenant_id,
            count = definitions.len(),
            "Evaluating safety performance indicators"
        );

        definitions
            .into_iter()
            .map(|definition| self.evaluate_definition(tenant_id, definition, reference))
            .collect()
    }

    /// Evaluate a single indicator.
    ///
    /// # Errors
    ///
    /// Returns an error if the record store cannot be read.
    pub fn evaluate_definition(
        &self,
        tenant_id: &str,
        definition: SpiDefinition,
        reference: NaiveDate,
    ) -> Result<SpiEvaluation> {
        let since = window_start(reference, definition.period_days);
        let events = self
            .records
            .list_safety_events_matching(tenant_id, &definition.predicate)?;
        let event_count = count_in_period(&events, since, reference, &definition.id);

        let current_value = match definition.calculation_mode {
            CalculationMode::Count => Some(count_as_f64(event_count)),
            CalculationMode::Rate { basis, per } => {
                let exposure = self.records.exposure(tenant_id, basis, since)?;
                if exposure > 0.0 {
                    Some(count_as_f64(event_count) * per / exposure)
                } else {
                    warn!(
                        tenant = tenant_id,
                        spi = %definition.id,
                        event_count,
                        "No exposure recorded in period, rate cannot be graded"
                    );
                    None
                }
            }
        };

        let tier = current_value.map(|value| evaluate(value, &definition.thresholds));
        debug!(
            tenant = tenant_id,
            spi = %definition.id,
            event_count,
            ?current_value,
            ?tier,
            "Indicator evaluated"
        );

        Ok(SpiEvaluation {
            definition,
            event_count,
            current_value,
            tier,
        })
    }
}

fn count_in_period(events: &[SafetyEvent], since: NaiveDate, until: NaiveDate, spi: &str) -> usize {
    events
        .iter()
        .filter(|event| match parse_record_date(&event.occurred_on) {
            Ok(date) => date >= since && date <= until,
            Err(e) => {
                warn!(spi, event = %event.id, error = %e, "Skipping safety event");
                false
            }
        })
        .count()
}

#[allow(clippy::cast_precision_loss)]
fn count_as_f64(count: usize) -> f64 {
    count as f64
}
