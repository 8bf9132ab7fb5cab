//! The operations exposed to the surrounding application.

use crate::alert::{Alert, AlertKind, AlertStore};
use crate::clock::{Clock, SystemClock};
use crate::compliance::{ComplianceScanner, ScanReport};
use crate::config::{Config, TenantConfig};
use crate::error::Result;
use crate::records::RecordStore;
use crate::risk::{self, matrix::RiskDomain, RiskScore};
use crate::spi::{SpiEvaluation, SpiMonitor};

/// Facade over the record store, the alert store and configuration.
pub struct SafetyCore<R, A> {
    config: Config,
    records: R,
    alerts: A,
    clock: Box<dyn Clock>,
}

impl<R, A> std::fmt::Debug for SafetyCore<R, A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SafetyCore")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl<R: RecordStore, A: AlertStore> SafetyCore<R, A> {
    /// Create a core using the system clock.
    #[must_use]
    pub fn new(config: Config, records: R, alerts: A) -> Self {
        Self {
            config,
            records,
            alerts,
            clock: Box::new(SystemClock),
        }
    }

    /// Replace the time source.
    #[must_use]
    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    /// The loaded configuration.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The record store.
    #[must_use]
    pub fn records(&self) -> &R {
        &self.records
    }

    /// The alert store.
    #[must_use]
    pub fn alerts(&self) -> &A {
        &self.alerts
    }

    /// Score a likelihood/severity rank pair.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::InvalidRank`] if either rank is outside 1..=5.
    pub fn score_risk(&self, likelihood: u8, severity: u8) -> Result<RiskScore> {
        risk::score_risk(likelihood, severity)
    }

    /// Score a likelihood/severity label pair from one domain's tables.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::UnknownLabel`] if a label is not in the domain.
    pub fn score_labels(
        &self,
        domain: RiskDomain,
        likelihood: &str,
        severity: &str,
    ) -> Result<RiskScore> {
        domain.score_labels(likelihood, severity)
    }

    /// Build the explicit configuration for one tenant.
    ///
    /// # Errors
    ///
    /// Returns an error if the tenant's duty limits cannot be read.
    pub fn tenant_config(&self, tenant_id: &str) -> Result<TenantConfig> {
        let limits = self.records.get_duty_limit_config(tenant_id)?;
        self.config.tenant_config(tenant_id, limits)
    }

    /// Scan a tenant and report what happened.
    ///
    /// # Errors
    ///
    /// Returns an error only if the scan could not run at all; per-person
    /// failures are reported in the [`ScanReport`].
    pub fn scan(&self, tenant_id: &str) -> Result<ScanReport> {
        let tenant = self.tenant_config(tenant_id)?;
        ComplianceScanner::new(&self.records, &self.alerts)
            .with_write_mode(self.config.scan.write_mode)
            .with_workers(self.config.scan.workers)
            .scan(&tenant, self.clock.today())
    }

    /// Scan a tenant and return the number of alerts created.
    ///
    /// # Errors
    ///
    /// See [`SafetyCore::scan`].
    pub fn run_compliance_scan(&self, tenant_id: &str) -> Result<usize> {
        self.scan(tenant_id).map(|report| report.alerts_created)
    }

    /// Evaluate every indicator of a tenant as of today.
    ///
    /// # Errors
    ///
    /// Returns an error if the record store cannot be read.
    pub fn evaluate_spis(&self, tenant_id: &str) -> Result<Vec<SpiEvaluation>> {
        SpiMonitor::new(&self.records).evaluate(tenant_id, self.clock.today())
    }

    /// Open alerts concerning a person.
    ///
    /// # Errors
    ///
    /// Returns an error if the alert store cannot be read.
    pub fn find_unacknowledged_alerts(
        &self,
        tenant_id: &str,
        person_id: &str,
        kinds: Option<&[AlertKind]>,
    ) -> Result<Vec<Alert>> {
        self.alerts.find_unacknowledged(tenant_id, person_id, kinds)
    }

    /// Acknowledge alerts on behalf of a person.
    ///
    /// # Errors
    ///
    /// Returns an error if the alert store cannot be written.
    pub fn acknowledge(&self, alert_ids: &[i64], person_id: &str) -> Result<usize> {
        self.alerts.acknowledge(alert_ids, person_id)
    }
}
