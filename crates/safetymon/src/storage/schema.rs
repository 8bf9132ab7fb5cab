//! `SQLite` schema for the alert store.

/// Alerts. `target_holder_id` is NULL for tenant broadcasts.
pub const CREATE_ALERTS_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS alerts (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    tenant_id TEXT NOT NULL,
    kind TEXT NOT NULL,
    title TEXT NOT NULL,
    description TEXT NOT NULL,
    created_at TEXT NOT NULL,
    target_holder_id TEXT,
    dedup_hash TEXT NOT NULL
)
";

/// One row per (alert, person) acknowledgement.
pub const CREATE_ACKNOWLEDGEMENTS_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS alert_acknowledgements (
    alert_id INTEGER NOT NULL REFERENCES alerts(id) ON DELETE CASCADE,
    holder_id TEXT NOT NULL,
    acknowledged_at TEXT NOT NULL,
    PRIMARY KEY (alert_id, holder_id)
)
";

/// Dedup lookups.
pub const CREATE_DEDUP_INDEX: &str = r"
CREATE INDEX IF NOT EXISTS idx_alerts_dedup ON alerts(dedup_hash)
";

/// Per-person lookups.
pub const CREATE_TARGET_INDEX: &str = r"
CREATE INDEX IF NOT EXISTS idx_alerts_target ON alerts(tenant_id, target_holder_id)
";

/// Tenant listings, newest first.
pub const CREATE_TENANT_INDEX: &str = r"
CREATE INDEX IF NOT EXISTS idx_alerts_tenant ON alerts(tenant_id, created_at DESC)
";

/// Key-value metadata, including the schema version.
pub const CREATE_METADATA_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS metadata (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
)
";

/// All schema creation statements in order.
pub const SCHEMA_STATEMENTS: &[&str] = &[
    CREATE_ALERTS_TABLE,
    CREATE_ACKNOWLEDGEMENTS_TABLE,
    CREATE_DEDUP_INDEX,
    CREATE_TARGET_INDEX,
    CREATE_TENANT_INDEX,
    CREATE_METADATA_TABLE,
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_statements_not_empty() {
        assert!(!SCHEMA_STATEMENTS.is_empty());
        for stmt in SCHEMA_STATEMENTS {
            assert!(!stmt.trim().is_empty());
        }
    }

    #[test]
    fn test_alerts_table_columns() {
        for column in [
            "tenant_id TEXT NOT NULL",
            "kind TEXT NOT NULL",
            "title TEXT NOT NULL",
            "target_holder_id TEXT",
            "dedup_hash TEXT NOT NULL",
        ] {
            assert!(CREATE_ALERTS_TABLE.contains(column), "missing {column}");
        }
    }

    #[test]
    fn test_acknowledgements_keyed_per_person() {
        assert!(CREATE_ACKNOWLEDGEMENTS_TABLE.contains("PRIMARY KEY (alert_id, holder_id)"));
    }
}
