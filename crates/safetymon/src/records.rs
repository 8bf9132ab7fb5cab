//! Read-only view of the record layer.
//!
//! The record store is owned by the surrounding application. This module
//! defines the facts the core reads from it, the [`RecordStore`] trait the
//! scanners consume, and [`InMemoryRecordStore`], a snapshot-backed
//! implementation used by the CLI and tests.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::RwLock;

use chrono::{DateTime, Days, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::{DutyCeilings, DutyLimitConfig, DutyLimits};
use crate::error::{Error, Result};
use crate::risk::RiskTier;
use crate::spi::{EventPredicate, SpiDefinition};

/// Parse a date as the record layer stores it.
///
/// Accepts `YYYY-MM-DD`, RFC 3339 timestamps and naive `YYYY-MM-DDTHH:MM:SS`
/// timestamps. Any time of day is discarded.
///
/// # Errors
///
/// Returns [`Error::MalformedDate`] if the text matches none of these.
pub fn parse_record_date(raw: &str) -> Result<NaiveDate> {
    let trimmed = raw.trim();
    if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        return Ok(date);
    }
    if let Ok(timestamp) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(timestamp.date_naive());
    }
    if let Ok(timestamp) = NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%dT%H:%M:%S") {
        return Ok(timestamp.date());
    }
    Err(Error::malformed_date(raw))
}

/// First day of the inclusive window `[reference - days, reference]`.
///
/// Saturates at the earliest representable date instead of overflowing.
#[must_use]
pub fn window_start(reference: NaiveDate, days: u32) -> NaiveDate {
    reference
        .checked_sub_days(Days::new(u64::from(days)))
        .unwrap_or(NaiveDate::MIN)
}

/// A document with an expiry date, such as a medical or license.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentExpiry {
    /// The person holding the document.
    #[serde(default)]
    pub holder_id: String,
    /// Document type, e.g. "Class 1 Medical".
    pub document_type: String,
    /// Expiry date as stored by the record layer.
    pub expiry_date: String,
}

/// A duty or flight period attributed to one person.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DutyEvent {
    /// The person on duty.
    pub holder_id: String,
    /// The person's role in the event, e.g. "instructor".
    pub role: String,
    /// Date of the event as stored by the record layer.
    pub date: String,
    /// Duration in hours.
    pub duration_hours: f64,
}

/// A person in a tenant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Person {
    /// Unique person id.
    pub id: String,
    /// Display name.
    #[serde(default)]
    pub name: String,
    /// Inactive persons are not scanned.
    #[serde(default = "default_active")]
    pub active: bool,
    /// Documents held by the person.
    #[serde(default)]
    pub documents: Vec<DocumentExpiry>,
}

fn default_active() -> bool {
    true
}

/// A historical safety occurrence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SafetyEvent {
    /// Unique event id.
    pub id: String,
    /// Date of the occurrence as stored by the record layer.
    pub occurred_on: String,
    /// Occurrence category, e.g. "runway_incursion".
    pub category: String,
    /// Risk tier from triage, if assessed.
    #[serde(default)]
    pub risk_tier: Option<RiskTier>,
    /// Free-text summary.
    #[serde(default)]
    pub summary: String,
}

/// What a rate indicator is normalized by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExposureBasis {
    /// Hours flown.
    FlightHours,
    /// Number of flights.
    Flights,
}

/// Exposure flown on one date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExposureRecord {
    /// Date as stored by the record layer.
    pub date: String,
    /// Hours flown.
    #[serde(default)]
    pub flight_hours: f64,
    /// Flights flown.
    #[serde(default)]
    pub flights: u32,
}

/// Read access to the record layer.
///
/// Implementations must be safe to share across scan workers.
pub trait RecordStore: Send + Sync {
    /// Active persons of a tenant, with their documents.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    fn list_active_persons(&self, tenant_id: &str) -> Result<Vec<Person>>;

    /// Duty events for a person of a tenant on or after `since`.
    ///
    /// Person ids are only unique within a tenant, so events recorded under
    /// the same id in another tenant are never returned. Events whose date
    /// cannot be parsed are returned as-is so the caller can report them.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    fn list_duty_events(
        &self,
        tenant_id: &str,
        person_id: &str,
        since: NaiveDate,
    ) -> Result<Vec<DutyEvent>>;

    /// SPI definitions owned by a tenant.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    fn list_spi_definitions(&self, tenant_id: &str) -> Result<Vec<SpiDefinition>>;

    /// Safety events of a tenant selected by a predicate.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    fn list_safety_events_matching(
        &self,
        tenant_id: &str,
        predicate: &EventPredicate,
    ) -> Result<Vec<SafetyEvent>>;

    /// The tenant's clamped duty limits.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    fn get_duty_limit_config(&self, tenant_id: &str) -> Result<DutyLimitConfig>;

    /// Total exposure of a tenant on or after `since`.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    fn exposure(&self, tenant_id: &str, basis: ExposureBasis, since: NaiveDate) -> Result<f64>;
}

/// Records of one tenant, as they appear in a snapshot file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TenantSnapshot {
    /// Persons with embedded documents.
    pub persons: Vec<Person>,
    /// Duty and flight events.
    pub duty_events: Vec<DutyEvent>,
    /// Configured indicators.
    pub spi_definitions: Vec<SpiDefinition>,
    /// Historical safety events.
    pub safety_events: Vec<SafetyEvent>,
    /// Exposure flown per date.
    pub exposure: Vec<ExposureRecord>,
    /// Requested duty limits; clamped when loaded.
    pub duty_limits: Option<DutyLimits>,
}

/// A JSON snapshot of the record layer.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RecordSnapshot {
    /// Records keyed by tenant id.
    pub tenants: BTreeMap<String, TenantSnapshot>,
}

#[derive(Debug, Default)]
struct TenantRecords {
    persons: Vec<Person>,
    duty_events: Vec<DutyEvent>,
    spi_definitions: Vec<SpiDefinition>,
    safety_events: Vec<SafetyEvent>,
    exposure: Vec<ExposureRecord>,
    duty_limits: Option<DutyLimitConfig>,
}

/// Record store held in memory.
#[derive(Debug)]
pub struct InMemoryRecordStore {
    ceilings: DutyCeilings,
    tenants: RwLock<HashMap<String, TenantRecords>>,
}

impl InMemoryRecordStore {
    /// Create an empty store.
    ///
    /// `ceilings` clamps any duty limits configured later.
    #[must_use]
    pub fn new(ceilings: DutyCeilings) -> Self {
        Self {
            ceilings,
            tenants: RwLock::new(HashMap::new()),
        }
    }

    /// Build a store from a parsed snapshot.
    #[must_use]
    pub fn from_snapshot(snapshot: RecordSnapshot, ceilings: DutyCeilings) -> Self {
        let store = Self::new(ceilings);
        for (tenant_id, tenant) in snapshot.tenants {
            for person in tenant.persons {
                store.insert_person(&tenant_id, person);
            }
            for event in tenant.duty_events {
                store.insert_duty_event(&tenant_id, event);
            }
            for definition in tenant.spi_definitions {
                store.insert_spi_definition(&tenant_id, definition);
            }
            for event in tenant.safety_events {
                store.insert_safety_event(&tenant_id, event);
            }
            for record in tenant.exposure {
                store.insert_exposure(&tenant_id, record);
            }
            if let Some(requested) = tenant.duty_limits {
                store.configure_duty_limits(&tenant_id, &requested);
            }
        }
        store
    }

    /// Load a store from a JSON snapshot file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed, including when
    /// an SPI definition in it fails validation.
    pub fn load(path: impl AsRef<Path>, ceilings: DutyCeilings) -> Result<Self> {
        let path = path.as_ref();
        debug!("Loading record snapshot from {}", path.display());
        let text = std::fs::read_to_string(path)?;
        let snapshot: RecordSnapshot = serde_json::from_str(&text)?;
        Ok(Self::from_snapshot(snapshot, ceilings))
    }

    fn with_tenant<F: FnOnce(&mut TenantRecords)>(&self, tenant_id: &str, f: F) {
        let mut tenants = match self.tenants.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        f(tenants.entry(tenant_id.to_string()).or_default());
    }

    fn read_tenant<T>(
        &self,
        tenant_id: &str,
        f: impl FnOnce(&TenantRecords) -> Result<T>,
    ) -> Result<T> {
        let tenants = self
            .tenants
            .read()
            .map_err(|_| Error::store_unavailable("record store lock poisoned"))?;
        let records = tenants
            .get(tenant_id)
            .ok_or_else(|| Error::UnknownTenant(tenant_id.to_string()))?;
        f(records)
    }

    /// Add a person. Document holder ids are set to the person's id.
    pub fn insert_person(&self, tenant_id: &str, mut person: Person) {
        for document in &mut person.documents {
            document.holder_id.clone_from(&person.id);
        }
        self.with_tenant(tenant_id, |t| t.persons.push(person));
    }

    /// Add a duty event.
    pub fn insert_duty_event(&self, tenant_id: &str, event: DutyEvent) {
        self.with_tenant(tenant_id, |t| t.duty_events.push(event));
    }

    /// Add an SPI definition.
    pub fn insert_spi_definition(&self, tenant_id: &str, definition: SpiDefinition) {
        self.with_tenant(tenant_id, |t| t.spi_definitions.push(definition));
    }

    /// Add a safety event.
    pub fn insert_safety_event(&self, tenant_id: &str, event: SafetyEvent) {
        self.with_tenant(tenant_id, |t| t.safety_events.push(event));
    }

    /// Add an exposure record.
    pub fn insert_exposure(&self, tenant_id: &str, record: ExposureRecord) {
        self.with_tenant(tenant_id, |t| t.exposure.push(record));
    }

    /// Configure a tenant's duty limits, clamping them to the ceilings.
    pub fn configure_duty_limits(&self, tenant_id: &str, requested: &DutyLimits) {
        let limits = DutyLimitConfig::configure(requested, &self.ceilings);
        self.with_tenant(tenant_id, |t| t.duty_limits = Some(limits));
    }

    /// Replace a person's documents.
    pub fn replace_documents(
        &self,
        tenant_id: &str,
        person_id: &str,
        documents: Vec<DocumentExpiry>,
    ) {
        self.with_tenant(tenant_id, |t| {
            if let Some(person) = t.persons.iter_mut().find(|p| p.id == person_id) {
                person.documents = documents
                    .into_iter()
                    .map(|mut d| {
                        d.holder_id = person_id.to_string();
                        d
                    })
                    .collect();
            }
        });
    }
}

/// True if the raw date is on or after `since`, or cannot be parsed.
fn on_or_after(raw: &str, since: NaiveDate) -> bool {
    parse_record_date(raw).map_or(true, |date| date >= since)
}

impl RecordStore for InMemoryRecordStore {
    fn list_active_persons(&self, tenant_id: &str) -> Result<Vec<Person>> {
        self.read_tenant(tenant_id, |t| {
            Ok(t.persons.iter().filter(|p| p.active).cloned().collect())
        })
    }

    fn list_duty_events(
        &self,
        tenant_id: &str,
        person_id: &str,
        since: NaiveDate,
    ) -> Result<Vec<DutyEvent>> {
        self.read_tenant(tenant_id, |t| {
            Ok(t.duty_events
                .iter()
                .filter(|e| e.holder_id == person_id && on_or_after(&e.date, since))
                .cloned()
                .collect())
        })
    }

    fn list_spi_definitions(&self, tenant_id: &str) -> Result<Vec<SpiDefinition>> {
        self.read_tenant(tenant_id, |t| Ok(t.spi_definitions.clone()))
    }

    fn list_safety_events_matching(
        &self,
        tenant_id: &str,
        predicate: &EventPredicate,
    ) -> Result<Vec<SafetyEvent>> {
        self.read_tenant(tenant_id, |t| {
            Ok(t.safety_events
                .iter()
                .filter(|e| predicate.matches(e))
                .cloned()
                .collect())
        })
    }

    fn get_duty_limit_config(&self, tenant_id: &str) -> Result<DutyLimitConfig> {
        self.read_tenant(tenant_id, |t| {
            Ok(t.duty_limits
                .unwrap_or_else(|| DutyLimitConfig::at_ceilings(&self.ceilings)))
        })
    }

    fn exposure(&self, tenant_id: &str, basis: ExposureBasis, since: NaiveDate) -> Result<f64> {
        self.read_tenant(tenant_id, |t| {
            let mut total = 0.0;
            for record in &t.exposure {
                match parse_record_date(&record.date) {
                    Ok(date) if date >= since => {
                        total += match basis {
                            ExposureBasis::FlightHours => record.flight_hours,
                            ExposureBasis::Flights => f64::from(record.flights),
                        };
                    }
                    Ok(_) => {}
                    Err(e) => warn!(tenant = tenant_id, error = %e, "Skipping exposure record"),
                }
            }
            Ok(total)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn store() -> InMemoryRecordStore {
        let store = InMemoryRecordStore::new(DutyCeilings::default());
        store.insert_person(
            "acme",
            Person {
                id: "p1".to_string(),
                name: "Avery".to_string(),
                active: true,
                documents: vec![DocumentExpiry {
                    holder_id: String::new(),
                    document_type: "Class 1 Medical".to_string(),
                    expiry_date: "2024-09-01".to_string(),
                }],
            },
        );
        store.insert_person(
            "acme",
            Person {
                id: "p2".to_string(),
                name: "Blake".to_string(),
                active: false,
                documents: Vec::new(),
            },
        );
        store
    }

    #[test]
    fn test_parse_plain_date() {
        assert_eq!(parse_record_date("2024-08-15").unwrap(), date("2024-08-15"));
        assert_eq!(parse_record_date(" 2024-08-15 ").unwrap(), date("2024-08-15"));
    }

    #[test]
    fn test_parse_timestamp_discards_time() {
        assert_eq!(
            parse_record_date("2024-08-15T23:59:59Z").unwrap(),
            date("2024-08-15")
        );
        assert_eq!(
            parse_record_date("2024-08-15T23:30:00-05:00").unwrap(),
            date("2024-08-15")
        );
        assert_eq!(
            parse_record_date("2024-08-15T06:00:00").unwrap(),
            date("2024-08-15")
        );
    }

    #[test]
    fn test_parse_malformed_date() {
        let err = parse_record_date("15/08/2024").unwrap_err();
        assert!(matches!(err, Error::MalformedDate { .. }));
        assert!(parse_record_date("2024-02-30").is_err());
        assert!(parse_record_date("").is_err());
    }

    #[test]
    fn test_window_start() {
        assert_eq!(window_start(date("2024-08-15"), 7), date("2024-08-08"));
        assert_eq!(window_start(date("2024-08-15"), 0), date("2024-08-15"));
        assert_eq!(window_start(date("2024-08-15"), u32::MAX), NaiveDate::MIN);
        assert_eq!(window_start(NaiveDate::MIN, 1), NaiveDate::MIN);
    }

    #[test]
    fn test_list_active_persons_skips_inactive() {
        let persons = store().list_active_persons("acme").unwrap();
        assert_eq!(persons.len(), 1);
        assert_eq!(persons[0].id, "p1");
        assert_eq!(persons[0].documents[0].holder_id, "p1");
    }

    #[test]
    fn test_unknown_tenant() {
        let err = store().list_active_persons("nobody").unwrap_err();
        assert!(matches!(err, Error::UnknownTenant(_)));
    }

    #[test]
    fn test_list_duty_events_since() {
        let store = store();
        for (day, hours) in [("2024-08-01", 2.0), ("2024-08-10", 3.0), ("garbage", 1.0)] {
            store.insert_duty_event(
                "acme",
                DutyEvent {
                    holder_id: "p1".to_string(),
                    role: "instructor".to_string(),
                    date: day.to_string(),
                    duration_hours: hours,
                },
            );
        }

        let events = store
            .list_duty_events("acme", "p1", date("2024-08-05"))
            .unwrap();
        // The malformed event is passed through for the caller to report
        assert_eq!(events.len(), 2);
        assert!(events.iter().any(|e| e.date == "garbage"));
        assert!(store
            .list_duty_events("acme", "p2", date("2024-01-01"))
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_duty_events_stay_within_tenant() {
        let store = store();
        for (tenant, hours) in [("acme", 2.0), ("globex", 9.0)] {
            store.insert_duty_event(
                tenant,
                DutyEvent {
                    holder_id: "p1".to_string(),
                    role: "instructor".to_string(),
                    date: "2024-08-10".to_string(),
                    duration_hours: hours,
                },
            );
        }

        let acme = store
            .list_duty_events("acme", "p1", date("2024-08-01"))
            .unwrap();
        assert_eq!(acme.len(), 1);
        assert!((acme[0].duration_hours - 2.0).abs() < f64::EPSILON);

        let globex = store
            .list_duty_events("globex", "p1", date("2024-08-01"))
            .unwrap();
        assert_eq!(globex.len(), 1);
        assert!((globex[0].duration_hours - 9.0).abs() < f64::EPSILON);

        let err = store
            .list_duty_events("nobody", "p1", date("2024-08-01"))
            .unwrap_err();
        assert!(matches!(err, Error::UnknownTenant(_)));
    }

    #[test]
    fn test_duty_limits_default_to_ceilings() {
        let limits = store().get_duty_limit_config("acme").unwrap();
        assert_eq!(limits, DutyLimitConfig::at_ceilings(&DutyCeilings::default()));
    }

    #[test]
    fn test_configured_duty_limits_are_clamped() {
        let store = store();
        store.configure_duty_limits(
            "acme",
            &DutyLimits {
                daily_hours: 12.0,
                weekly_hours: 20.0,
                monthly_hours: 90.0,
            },
        );
        let limits = store.get_duty_limit_config("acme").unwrap();
        assert!((limits.daily_hours() - 8.0).abs() < f64::EPSILON);
        assert!((limits.weekly_hours() - 20.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_exposure_sums_since() {
        let store = store();
        for (day, hours, flights) in [("2024-07-01", 10.0, 5), ("2024-08-01", 20.0, 8)] {
            store.insert_exposure(
                "acme",
                ExposureRecord {
                    date: day.to_string(),
                    flight_hours: hours,
                    flights,
                },
            );
        }

        let hours = store
            .exposure("acme", ExposureBasis::FlightHours, date("2024-07-15"))
            .unwrap();
        assert!((hours - 20.0).abs() < f64::EPSILON);
        let flights = store
            .exposure("acme", ExposureBasis::Flights, date("2024-01-01"))
            .unwrap();
        assert!((flights - 13.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_snapshot_round_trip_through_json() {
        let json = r#"{
            "tenants": {
                "acme": {
                    "persons": [
                        {"id": "p1", "documents": [{"document_type": "License", "expiry_date": "2025-01-01"}]}
                    ],
                    "duty_limits": {"daily_hours": 9.5, "weekly_hours": 30, "monthly_hours": 100}
                }
            }
        }"#;
        let snapshot: RecordSnapshot = serde_json::from_str(json).unwrap();
        let store = InMemoryRecordStore::from_snapshot(snapshot, DutyCeilings::default());

        let persons = store.list_active_persons("acme").unwrap();
        assert_eq!(persons[0].documents[0].holder_id, "p1");
        assert!(persons[0].active);

        let limits = store.get_duty_limit_config("acme").unwrap();
        assert!((limits.daily_hours() - 8.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_load_snapshot_file() {
        let path = std::env::temp_dir().join(format!(
            "safetymon_records_test_{}.json",
            std::process::id()
        ));
        std::fs::write(&path, r#"{"tenants": {"acme": {}}}"#).unwrap();

        let store = InMemoryRecordStore::load(&path, DutyCeilings::default()).unwrap();
        assert!(store.list_active_persons("acme").unwrap().is_empty());

        let _ = std::fs::remove_file(&path);
    }
}
