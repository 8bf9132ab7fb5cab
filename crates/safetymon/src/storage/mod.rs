//! `SQLite`-backed alert store.
//!
//! Every batch is written inside one `IMMEDIATE` transaction, so a failed
//! batch leaves nothing behind. [`SqliteAlertStore::commit_batch_if_absent`]
//! performs the dedup check and the insert in a single statement per alert.

pub mod migrations;
pub mod schema;

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, ErrorCode, OptionalExtension, TransactionBehavior};
use tracing::{debug, info, warn};

use crate::alert::{Alert, AlertKind, AlertStore, NewAlert};
use crate::error::{Error, Result};

const ALERT_COLUMNS: &str =
    "a.id, a.tenant_id, a.kind, a.title, a.description, a.created_at, \
     a.target_holder_id, a.dedup_hash";

const INSERT_ALERT: &str = r"
INSERT INTO alerts (tenant_id, kind, title, description, created_at, target_holder_id, dedup_hash)
VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
";

// Skipped when an alert with the same hash exists that its own target has
// not acknowledged. Broadcast rows never match `k.holder_id = a.target_holder_id`.
const INSERT_ALERT_IF_ABSENT: &str = r"
INSERT INTO alerts (tenant_id, kind, title, description, created_at, target_holder_id, dedup_hash)
SELECT ?1, ?2, ?3, ?4, ?5, ?6, ?7
WHERE NOT EXISTS (
    SELECT 1 FROM alerts a
    WHERE a.dedup_hash = ?7
      AND NOT EXISTS (
          SELECT 1 FROM alert_acknowledgements k
          WHERE k.alert_id = a.id AND k.holder_id = a.target_holder_id
      )
)
";

/// Alert store backed by a single `SQLite` connection.
#[derive(Debug)]
pub struct SqliteAlertStore {
    path: PathBuf,
    conn: Mutex<Connection>,
}

/// Map a `SQLite` error, reporting lock contention as an unavailable store.
fn store_error(e: rusqlite::Error) -> Error {
    match e.sqlite_error_code() {
        Some(ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked) => {
            Error::store_unavailable(e.to_string())
        }
        _ => Error::DatabaseQuery(e),
    }
}

fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

impl SqliteAlertStore {
    /// Open or create an alert database at `path`.
    ///
    /// Creates parent directories as needed, enables WAL and applies
    /// `busy_timeout` to lock waits.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or its schema
    /// initialized.
    pub fn open(path: impl AsRef<Path>, busy_timeout: Duration) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|source| Error::DirectoryCreate {
                    path: parent.to_path_buf(),
                    source,
                })?;
            }
        }

        debug!("Opening alert database at {}", path.display());
        let conn = Connection::open(&path).map_err(|source| Error::DatabaseOpen {
            path: path.clone(),
            source,
        })?;

        conn.busy_timeout(busy_timeout)?;
        conn.execute_batch(
            "PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL; PRAGMA foreign_keys=ON;",
        )?;
        migrations::initialize_schema(&conn)?;

        info!("Alert database opened at {}", path.display());
        Ok(Self {
            path,
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory store.
    ///
    /// # Errors
    ///
    /// Returns an error if the in-memory database cannot be created.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|source| Error::DatabaseOpen {
            path: PathBuf::from(":memory:"),
            source,
        })?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        migrations::initialize_schema(&conn)?;

        Ok(Self {
            path: PathBuf::from(":memory:"),
            conn: Mutex::new(conn),
        })
    }

    /// Path to the database file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| Error::store_unavailable("alert store connection lock poisoned"))
    }

    fn write_batch(&self, alerts: &[NewAlert], sql: &str) -> Result<usize> {
        if alerts.is_empty() {
            return Ok(0);
        }

        let mut conn = self.lock()?;
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(store_error)?;

        let mut inserted = 0;
        {
            let mut stmt = tx.prepare_cached(sql).map_err(store_error)?;
            for alert in alerts {
                inserted += stmt
                    .execute(params![
                        alert.tenant_id,
                        alert.kind.as_str(),
                        alert.title,
                        alert.description,
                        timestamp(alert.created_at),
                        alert.target_holder_id,
                        alert.dedup_hash,
                    ])
                    .map_err(store_error)?;
            }
        }
        tx.commit().map_err(store_error)?;

        debug!(staged = alerts.len(), inserted, "Committed alert batch");
        Ok(inserted)
    }

    /// Get an alert by id.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn get(&self, id: i64) -> Result<Option<Alert>> {
        let conn = self.lock()?;
        let alert = conn
            .query_row(
                &format!("SELECT {ALERT_COLUMNS} FROM alerts a WHERE a.id = ?1"),
                [id],
                Self::row_to_alert,
            )
            .optional()
            .map_err(store_error)?;

        match alert {
            Some(mut alert) => {
                alert.acknowledged_by = Self::load_acknowledgements(&conn, alert.id)?;
                Ok(Some(alert))
            }
            None => Ok(None),
        }
    }

    /// Most recent alerts of a tenant, regardless of acknowledgement.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn list_for_tenant(&self, tenant_id: &str, limit: usize) -> Result<Vec<Alert>> {
        let conn = self.lock()?;
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {ALERT_COLUMNS} FROM alerts a WHERE a.tenant_id = ?1 \
                 ORDER BY a.created_at DESC, a.id DESC LIMIT ?2"
            ))
            .map_err(store_error)?;
        let mut alerts = stmt
            .query_map(params![tenant_id, limit], Self::row_to_alert)
            .map_err(store_error)?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(store_error)?;

        for alert in &mut alerts {
            alert.acknowledged_by = Self::load_acknowledgements(&conn, alert.id)?;
        }
        Ok(alerts)
    }

    /// Count all stored alerts.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn count(&self) -> Result<i64> {
        let conn = self.lock()?;
        conn.query_row("SELECT COUNT(*) FROM alerts", [], |row| row.get(0))
            .map_err(store_error)
    }

    /// Database statistics.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn stats(&self) -> Result<AlertStoreStats> {
        let conn = self.lock()?;
        let total_alerts: i64 = conn
            .query_row("SELECT COUNT(*) FROM alerts", [], |row| row.get(0))
            .map_err(store_error)?;
        let unacknowledged_targeted: i64 = conn
            .query_row(
                r"
                SELECT COUNT(*) FROM alerts a
                WHERE a.target_holder_id IS NOT NULL
                  AND NOT EXISTS (
                      SELECT 1 FROM alert_acknowledgements k
                      WHERE k.alert_id = a.id AND k.holder_id = a.target_holder_id
                  )
                ",
                [],
                |row| row.get(0),
            )
            .map_err(store_error)?;

        let db_size_bytes = if self.path.to_string_lossy() == ":memory:" {
            0
        } else {
            std::fs::metadata(&self.path).map(|m| m.len()).unwrap_or(0)
        };

        Ok(AlertStoreStats {
            total_alerts,
            unacknowledged_targeted,
            db_size_bytes,
        })
    }

    fn load_acknowledgements(conn: &Connection, alert_id: i64) -> Result<BTreeSet<String>> {
        let mut stmt = conn
            .prepare_cached("SELECT holder_id FROM alert_acknowledgements WHERE alert_id = ?1")
            .map_err(store_error)?;
        let holders = stmt
            .query_map([alert_id], |row| row.get(0))
            .map_err(store_error)?
            .collect::<std::result::Result<BTreeSet<String>, _>>()
            .map_err(store_error)?;
        Ok(holders)
    }

    fn row_to_alert(row: &rusqlite::Row) -> rusqlite::Result<Alert> {
        let id: i64 = row.get(0)?;
        let kind_str: String = row.get(2)?;
        let created_at_str: String = row.get(5)?;

        let kind = kind_str.parse().unwrap_or_else(|_| {
            warn!(alert = id, kind = %kind_str, "Unknown alert kind, reading as manual");
            AlertKind::Manual
        });
        let created_at = DateTime::parse_from_rfc3339(&created_at_str)
            .map_or_else(|_| Utc::now(), |dt| dt.with_timezone(&Utc));

        Ok(Alert {
            id,
            tenant_id: row.get(1)?,
            kind,
            title: row.get(3)?,
            description: row.get(4)?,
            created_at,
            target_holder_id: row.get(6)?,
            acknowledged_by: BTreeSet::new(),
            dedup_hash: row.get(7)?,
        })
    }
}

impl AlertStore for SqliteAlertStore {
    fn find_unacknowledged(
        &self,
        tenant_id: &str,
        person_id: &str,
        kinds: Option<&[AlertKind]>,
    ) -> Result<Vec<Alert>> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare_cached(&format!(
                r"
                SELECT {ALERT_COLUMNS} FROM alerts a
                WHERE a.tenant_id = ?1
                  AND (a.target_holder_id = ?2 OR a.target_holder_id IS NULL)
                  AND NOT EXISTS (
                      SELECT 1 FROM alert_acknowledgements k
                      WHERE k.alert_id = a.id AND k.holder_id = ?2
                  )
                ORDER BY a.created_at DESC, a.id DESC
                "
            ))
            .map_err(store_error)?;
        let mut alerts: Vec<Alert> = stmt
            .query_map(params![tenant_id, person_id], Self::row_to_alert)
            .map_err(store_error)?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(store_error)?;

        if let Some(kinds) = kinds {
            alerts.retain(|alert| kinds.contains(&alert.kind));
        }
        for alert in &mut alerts {
            alert.acknowledged_by = Self::load_acknowledgements(&conn, alert.id)?;
        }
        Ok(alerts)
    }

    fn commit_batch(&self, alerts: &[NewAlert]) -> Result<usize> {
        self.write_batch(alerts, INSERT_ALERT)
    }

    fn commit_batch_if_absent(&self, alerts: &[NewAlert]) -> Result<usize> {
        self.write_batch(alerts, INSERT_ALERT_IF_ABSENT)
    }

    fn acknowledge(&self, alert_ids: &[i64], person_id: &str) -> Result<usize> {
        if alert_ids.is_empty() {
            return Ok(0);
        }

        let now = timestamp(Utc::now());
        let mut conn = self.lock()?;
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(store_error)?;

        let mut acknowledged = 0;
        {
            let mut stmt = tx
                .prepare_cached(
                    r"
                    INSERT OR IGNORE INTO alert_acknowledgements (alert_id, holder_id, acknowledged_at)
                    SELECT id, ?2, ?3 FROM alerts WHERE id = ?1
                    ",
                )
                .map_err(store_error)?;
            for id in alert_ids {
                acknowledged += stmt
                    .execute(params![id, person_id, now])
                    .map_err(store_error)?;
            }
        }
        tx.commit().map_err(store_error)?;

        debug!(person = person_id, acknowledged, "Recorded acknowledgements");
        Ok(acknowledged)
    }
}

/// Statistics about the alert store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlertStoreStats {
    /// Total alerts stored.
    pub total_alerts: i64,
    /// Targeted alerts their target has not acknowledged.
    pub unacknowledged_targeted: i64,
    /// Size of the database file in bytes.
    pub db_size_bytes: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alert::{document_expiry_title, duty_limit_title};

    fn create_test_store() -> SqliteAlertStore {
        SqliteAlertStore::open_in_memory().expect("failed to create test store")
    }

    fn expiry_alert(person: &str, document: &str) -> NewAlert {
        NewAlert::targeted(
            "acme",
            person,
            AlertKind::DocumentExpiry,
            document_expiry_title(document),
            format!("{document} expires soon"),
            None,
        )
    }

    #[test]
    fn test_commit_and_find() {
        let store = create_test_store();
        let inserted = store
            .commit_batch(&[expiry_alert("p1", "License"), expiry_alert("p2", "License")])
            .unwrap();
        assert_eq!(inserted, 2);

        let found = store.find_unacknowledged("acme", "p1", None).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].title, "Document Expiry: License");
        assert_eq!(found[0].kind, AlertKind::DocumentExpiry);
        assert!(found[0].is_targeted_at("p1"));
        assert!(found[0].acknowledged_by.is_empty());
    }

    #[test]
    fn test_find_is_tenant_scoped() {
        let store = create_test_store();
        store.commit_batch(&[expiry_alert("p1", "License")]).unwrap();

        assert!(store.find_unacknowledged("other", "p1", None).unwrap().is_empty());
    }

    #[test]
    fn test_unconditional_batch_inserts_duplicates() {
        let store = create_test_store();
        let alert = expiry_alert("p1", "License");

        store.commit_batch(std::slice::from_ref(&alert)).unwrap();
        store.commit_batch(std::slice::from_ref(&alert)).unwrap();

        assert_eq!(store.count().unwrap(), 2);
    }

    #[test]
    fn test_conditional_batch_skips_existing() {
        let store = create_test_store();
        let alert = expiry_alert("p1", "License");

        assert_eq!(store.commit_batch_if_absent(std::slice::from_ref(&alert)).unwrap(), 1);
        assert_eq!(store.commit_batch_if_absent(std::slice::from_ref(&alert)).unwrap(), 0);
        assert_eq!(store.count().unwrap(), 1);
    }

    #[test]
    fn test_conditional_batch_skips_duplicates_within_batch() {
        let store = create_test_store();
        let alert = expiry_alert("p1", "License");

        let inserted = store
            .commit_batch_if_absent(&[alert.clone(), alert, expiry_alert("p1", "Medical")])
            .unwrap();
        assert_eq!(inserted, 2);
    }

    #[test]
    fn test_conditional_insert_allowed_after_acknowledgement() {
        let store = create_test_store();
        let alert = expiry_alert("p1", "License");
        store.commit_batch_if_absent(std::slice::from_ref(&alert)).unwrap();

        let id = store.find_unacknowledged("acme", "p1", None).unwrap()[0].id;
        assert_eq!(store.acknowledge(&[id], "p1").unwrap(), 1);

        assert_eq!(store.commit_batch_if_absent(&[alert]).unwrap(), 1);
        assert_eq!(store.find_unacknowledged("acme", "p1", None).unwrap().len(), 1);
    }

    #[test]
    fn test_acknowledgement_by_someone_else_keeps_alert_open() {
        let store = create_test_store();
        let alert = expiry_alert("p1", "License");
        store.commit_batch_if_absent(std::slice::from_ref(&alert)).unwrap();
        let id = store.find_unacknowledged("acme", "p1", None).unwrap()[0].id;

        store.acknowledge(&[id], "safety-manager").unwrap();

        assert_eq!(store.commit_batch_if_absent(&[alert]).unwrap(), 0);
        let open = store.find_unacknowledged("acme", "p1", None).unwrap();
        assert!(open[0].is_acknowledged_by("safety-manager"));
    }

    #[test]
    fn test_broadcast_acknowledged_per_person() {
        let store = create_test_store();
        store
            .commit_batch(&[NewAlert::broadcast(
                "acme",
                AlertKind::Manual,
                "Runway 09 closed".to_string(),
                "NOTAM issued".to_string(),
            )])
            .unwrap();

        let id = store.find_unacknowledged("acme", "p1", None).unwrap()[0].id;
        assert_eq!(store.find_unacknowledged("acme", "p2", None).unwrap().len(), 1);

        store.acknowledge(&[id], "p1").unwrap();
        assert!(store.find_unacknowledged("acme", "p1", None).unwrap().is_empty());
        assert_eq!(store.find_unacknowledged("acme", "p2", None).unwrap().len(), 1);
    }

    #[test]
    fn test_find_filters_kinds() {
        let store = create_test_store();
        store
            .commit_batch(&[
                expiry_alert("p1", "License"),
                NewAlert::targeted(
                    "acme",
                    "p1",
                    AlertKind::DutyLimit,
                    duty_limit_title("Weekly"),
                    String::new(),
                    None,
                ),
            ])
            .unwrap();

        let duty = store
            .find_unacknowledged("acme", "p1", Some(&[AlertKind::DutyLimit]))
            .unwrap();
        assert_eq!(duty.len(), 1);
        assert_eq!(duty[0].kind, AlertKind::DutyLimit);

        let none = store
            .find_unacknowledged("acme", "p1", Some(&[AlertKind::Manual]))
            .unwrap();
        assert!(none.is_empty());
    }

    #[test]
    fn test_acknowledge_ignores_unknown_and_repeats() {
        let store = create_test_store();
        store.commit_batch(&[expiry_alert("p1", "License")]).unwrap();
        let id = store.find_unacknowledged("acme", "p1", None).unwrap()[0].id;

        assert_eq!(store.acknowledge(&[id, 9999], "p1").unwrap(), 1);
        assert_eq!(store.acknowledge(&[id], "p1").unwrap(), 0);
        assert_eq!(store.acknowledge(&[], "p1").unwrap(), 0);

        let alert = store.get(id).unwrap().unwrap();
        assert!(alert.is_acknowledged_by("p1"));
    }

    #[test]
    fn test_failed_batch_writes_nothing() {
        let store = create_test_store();
        store
            .lock()
            .unwrap()
            .execute_batch(
                "CREATE TRIGGER reject_boom BEFORE INSERT ON alerts WHEN NEW.title = 'boom' \
                 BEGIN SELECT RAISE(ABORT, 'rejected'); END;",
            )
            .unwrap();

        let boom = NewAlert::targeted(
            "acme",
            "p1",
            AlertKind::Manual,
            "boom".to_string(),
            String::new(),
            None,
        );
        let result = store.commit_batch(&[expiry_alert("p1", "License"), boom]);

        assert!(result.is_err());
        assert!(result.unwrap_err().is_store_failure());
        assert_eq!(store.count().unwrap(), 0);
    }

    #[test]
    fn test_get_nonexistent() {
        let store = create_test_store();
        assert!(store.get(12345).unwrap().is_none());
    }

    #[test]
    fn test_list_for_tenant_includes_acknowledged() {
        let store = create_test_store();
        store
            .commit_batch(&[expiry_alert("p1", "License"), expiry_alert("p1", "Medical")])
            .unwrap();
        let ids: Vec<i64> = store
            .find_unacknowledged("acme", "p1", None)
            .unwrap()
            .iter()
            .map(|a| a.id)
            .collect();
        store.acknowledge(&ids, "p1").unwrap();

        assert_eq!(store.list_for_tenant("acme", 10).unwrap().len(), 2);
        assert_eq!(store.list_for_tenant("acme", 1).unwrap().len(), 1);
    }

    #[test]
    fn test_stats() {
        let store = create_test_store();
        store
            .commit_batch(&[expiry_alert("p1", "License"), expiry_alert("p2", "License")])
            .unwrap();
        let id = store.find_unacknowledged("acme", "p1", None).unwrap()[0].id;
        store.acknowledge(&[id], "p1").unwrap();

        let stats = store.stats().unwrap();
        assert_eq!(stats.total_alerts, 2);
        assert_eq!(stats.unacknowledged_targeted, 1);
        assert_eq!(stats.db_size_bytes, 0);
    }

    #[test]
    fn test_open_file_creates_parent_dirs() {
        let dir = std::env::temp_dir().join(format!("safetymon_store_test_{}", std::process::id()));
        let path = dir.join("nested").join("alerts.db");

        {
            let store = SqliteAlertStore::open(&path, Duration::from_millis(500)).unwrap();
            store.commit_batch(&[expiry_alert("p1", "License")]).unwrap();
            assert_eq!(store.path(), path.as_path());
        }

        let reopened = SqliteAlertStore::open(&path, Duration::from_millis(500)).unwrap();
        assert_eq!(reopened.count().unwrap(), 1);
        assert!(reopened.stats().unwrap().db_size_bytes > 0);

        drop(reopened);
        let _ = std::fs::remove_dir_all(&dir);
    }
}
