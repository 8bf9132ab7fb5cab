//! Per-tenant compliance scan.
//!
//! A scan evaluates every active person independently: document expiries
//! and rolling duty totals are turned into staged alerts, staged alerts that
//! duplicate an open alert are dropped, and the remainder is committed as one
//! batch per person. A failure for one person never stops the others.
//!
//! Each person is handled in two phases, [`ComplianceScanner::plan_person`]
//! (reads only) and [`ComplianceScanner::commit_plan`] (one write). Under
//! [`WriteMode::ReadThenWrite`] nothing stops two scans from planning
//! against the same state and both committing; [`WriteMode::Conditional`]
//! moves the duplicate check into the store's insert.

use std::collections::HashSet;

use chrono::NaiveDate;
use rayon::prelude::*;
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::alert::{document_expiry_title, duty_limit_title, AlertKind, AlertStore, NewAlert};
use crate::compliance::duty::{aggregate_windows, parse_duty_events};
use crate::compliance::expiry::classify_expiry;
use crate::config::{DedupPolicy, TenantConfig, WriteMode};
use crate::error::{Error, Result};
use crate::records::{parse_record_date, window_start, Person, RecordStore};

/// Alert kinds a scan raises and deduplicates against.
const SCANNED_KINDS: [AlertKind; 2] = [AlertKind::DocumentExpiry, AlertKind::DutyLimit];

/// Outcome of one tenant scan.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ScanReport {
    /// Active persons evaluated.
    pub persons_scanned: usize,
    /// Alerts written to the store.
    pub alerts_created: usize,
    /// Persons whose batch was aborted.
    pub persons_failed: usize,
    /// Facts skipped because their date could not be parsed.
    pub facts_skipped: usize,
    /// Staged alerts dropped as duplicates of open alerts.
    pub duplicates_suppressed: usize,
}

/// Alerts staged for one person, ready to commit.
#[derive(Debug, Clone, Default)]
pub struct PersonPlan {
    /// The person the plan belongs to.
    pub person_id: String,
    /// Alerts to write, already deduplicated against open alerts.
    pub staged: Vec<NewAlert>,
    /// Alerts dropped during planning.
    pub duplicates_suppressed: usize,
    /// Facts skipped during planning.
    pub facts_skipped: usize,
}

/// Runs compliance scans against a record store and an alert store.
#[derive(Debug)]
pub struct ComplianceScanner<'a, R: RecordStore + ?Sized, A: AlertStore + ?Sized> {
    records: &'a R,
    alerts: &'a A,
    write_mode: WriteMode,
    workers: usize,
}

impl<'a, R: RecordStore + ?Sized, A: AlertStore + ?Sized> ComplianceScanner<'a, R, A> {
    /// Create a scanner with conditional writes on the global thread pool.
    #[must_use]
    pub fn new(records: &'a R, alerts: &'a A) -> Self {
        Self {
            records,
            alerts,
            write_mode: WriteMode::default(),
            workers: 0,
        }
    }

    /// Set how batches are written.
    #[must_use]
    pub fn with_write_mode(mut self, write_mode: WriteMode) -> Self {
        self.write_mode = write_mode;
        self
    }

    /// Set the number of worker threads. 0 uses the global pool.
    #[must_use]
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    /// Scan every active person of a tenant as of `reference`.
    ///
    /// # Errors
    ///
    /// Returns an error if the tenant's persons cannot be listed or the
    /// worker pool cannot be built. Per-person failures are logged and
    /// counted in [`ScanReport::persons_failed`] instead.
    pub fn scan(&self, tenant: &TenantConfig, reference: NaiveDate) -> Result<ScanReport> {
        let tenant_id = tenant.tenant_id.as_str();
        let persons = self.records.list_active_persons(tenant_id).map_err(|e| {
            error!(tenant = tenant_id, error = %e, "Compliance scan aborted, cannot list persons");
            e
        })?;
        info!(
            tenant = tenant_id,
            persons = persons.len(),
            %reference,
            "Starting compliance scan"
        );

        let scan_all = || -> Vec<(PersonPlan, Result<usize>)> {
            persons
                .par_iter()
                .map(|person| self.scan_person(tenant, person, reference))
                .collect()
        };
        let outcomes = if self.workers == 0 {
            scan_all()
        } else {
            rayon::ThreadPoolBuilder::new()
                .num_threads(self.workers)
                .build()
                .map_err(|e| Error::internal(format!("failed to build scan worker pool: {e}")))?
                .install(scan_all)
        };

        let mut report = ScanReport {
            persons_scanned: persons.len(),
            ..ScanReport::default()
        };
        for (plan, committed) in outcomes {
            report.facts_skipped += plan.facts_skipped;
            report.duplicates_suppressed += plan.duplicates_suppressed;
            match committed {
                Ok(created) => {
                    report.alerts_created += created;
                    // Rows the store declined were written by someone else.
                    report.duplicates_suppressed += plan.staged.len().saturating_sub(created);
                }
                Err(_) => report.persons_failed += 1,
            }
        }

        info!(
            tenant = tenant_id,
            persons_scanned = report.persons_scanned,
            alerts_created = report.alerts_created,
            persons_failed = report.persons_failed,
            facts_skipped = report.facts_skipped,
            duplicates_suppressed = report.duplicates_suppressed,
            "Compliance scan finished"
        );
        Ok(report)
    }

    fn scan_person(
        &self,
        tenant: &TenantConfig,
        person: &Person,
        reference: NaiveDate,
    ) -> (PersonPlan, Result<usize>) {
        let outcome = self
            .plan_person(tenant, person, reference)
            .and_then(|plan| self.commit_plan(&plan).map(|created| (plan, created)));

        match outcome {
            Ok((plan, created)) => (plan, Ok(created)),
            Err(e) => {
                warn!(
                    tenant = %tenant.tenant_id,
                    person = %person.id,
                    error = %e,
                    "Alert batch aborted for person"
                );
                let plan = PersonPlan {
                    person_id: person.id.clone(),
                    ..PersonPlan::default()
                };
                (plan, Err(e))
            }
        }
    }

    /// Evaluate one person and stage the alerts a commit would write.
    ///
    /// Reads the record store and the person's open alerts; writes nothing.
    ///
    /// # Errors
    ///
    /// Returns an error if the person's duty events or open alerts cannot
    /// be read.
    pub fn plan_person(
        &self,
        tenant: &TenantConfig,
        person: &Person,
        reference: NaiveDate,
    ) -> Result<PersonPlan> {
        let mut plan = PersonPlan {
            person_id: person.id.clone(),
            ..PersonPlan::default()
        };
        let mut candidates = Vec::new();

        for document in &person.documents {
            let expiry = match parse_record_date(&document.expiry_date) {
                Ok(date) => date,
                Err(e) => {
                    warn!(
                        person = %person.id,
                        document_type = %document.document_type,
                        error = %e,
                        "Skipping document"
                    );
                    plan.facts_skipped += 1;
                    continue;
                }
            };

            let status = classify_expiry(expiry, reference, &tenant.expiry);
            debug!(
                person = %person.id,
                document_type = %document.document_type,
                days_remaining = status.days_remaining,
                tier = %status.tier,
                "Classified document"
            );
            if !status.tier.is_alertable() {
                continue;
            }

            let tier = status.tier.to_string();
            candidates.push(NewAlert::targeted(
                &tenant.tenant_id,
                &person.id,
                AlertKind::DocumentExpiry,
                document_expiry_title(&document.document_type),
                format!(
                    "{} expires on {expiry} ({} days remaining)",
                    document.document_type, status.days_remaining
                ),
                dedup_tier(tenant.dedup, &tier),
            ));
        }

        let since = window_start(reference, tenant.duty_windows.longest());
        let events = self
            .records
            .list_duty_events(&tenant.tenant_id, &person.id, since)?;
        let (events, skipped) = parse_duty_events(&person.id, &events);
        plan.facts_skipped += skipped;

        let totals = aggregate_windows(&events, &tenant.duty_windows, reference);
        for exceedance in totals.exceedances(&tenant.duty_windows, &tenant.duty_limits) {
            debug!(
                person = %person.id,
                window = %exceedance.window,
                total_hours = exceedance.total_hours,
                limit_hours = exceedance.limit_hours,
                "Duty limit exceeded"
            );
            // Duty alerts have a single tier.
            candidates.push(NewAlert::targeted(
                &tenant.tenant_id,
                &person.id,
                AlertKind::DutyLimit,
                duty_limit_title(exceedance.window),
                format!(
                    "{:.1} h in the last {} days exceeds the {:.1} h limit",
                    exceedance.total_hours, exceedance.window_days, exceedance.limit_hours
                ),
                None,
            ));
        }

        if candidates.is_empty() {
            return Ok(plan);
        }

        let open: HashSet<String> = self
            .alerts
            .find_unacknowledged(&tenant.tenant_id, &person.id, Some(&SCANNED_KINDS[..]))?
            .into_iter()
            .filter(|alert| alert.is_targeted_at(&person.id))
            .map(|alert| alert.dedup_hash)
            .collect();

        let mut seen = HashSet::new();
        for alert in candidates {
            if open.contains(&alert.dedup_hash) || !seen.insert(alert.dedup_hash.clone()) {
                debug!(person = %person.id, title = %alert.title, "Suppressing duplicate alert");
                plan.duplicates_suppressed += 1;
            } else {
                plan.staged.push(alert);
            }
        }

        Ok(plan)
    }

    /// Write a plan's staged alerts as one batch.
    ///
    /// # Errors
    ///
    /// Returns an error if the alert store rejects the batch; nothing from
    /// the plan is written in that case.
    pub fn commit_plan(&self, plan: &PersonPlan) -> Result<usize> {
        if plan.staged.is_empty() {
            return Ok(0);
        }
        match self.write_mode {
            WriteMode::ReadThenWrite => self.alerts.commit_batch(&plan.staged),
            WriteMode::Conditional => self.alerts.commit_batch_if_absent(&plan.staged),
        }
    }
}

fn dedup_tier(policy: DedupPolicy, tier: &str) -> Option<&str> {
    match policy {
        DedupPolicy::Title => None,
        DedupPolicy::TitleAndTier => Some(tier),
    }
}
