//! Alert types and the alert store interface.
//!
//! Alerts are either targeted at one holder or broadcast to a tenant.
//! Acknowledgement is per person: a broadcast alert stays unacknowledged for
//! everyone who has not acknowledged it themselves.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// What raised an alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    /// A document entering its warning or urgent window.
    DocumentExpiry,
    /// A rolling duty window over its limit.
    DutyLimit,
    /// Raised by an operator outside of scans.
    Manual,
}

impl AlertKind {
    /// Stable name used in storage and on the command line.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::DocumentExpiry => "document_expiry",
            Self::DutyLimit => "duty_limit",
            Self::Manual => "manual",
        }
    }
}

impl std::fmt::Display for AlertKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for AlertKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "document_expiry" => Ok(Self::DocumentExpiry),
            "duty_limit" => Ok(Self::DutyLimit),
            "manual" => Ok(Self::Manual),
            other => Err(Error::internal(format!("unknown alert kind: {other}"))),
        }
    }
}

/// Title of a document expiry alert.
#[must_use]
pub fn document_expiry_title(document_type: &str) -> String {
    format!("Document Expiry: {document_type}")
}

/// Title of a duty limit alert.
#[must_use]
pub fn duty_limit_title(window: impl std::fmt::Display) -> String {
    format!("Duty Limit Exceeded: {window}")
}

/// Compute the BLAKE3 dedup hash for an alert identity.
///
/// `tier` is only supplied when the dedup policy includes it. Broadcast
/// alerts (no target) hash under `*`.
#[must_use]
pub fn compute_dedup_hash(
    tenant_id: &str,
    target_holder_id: Option<&str>,
    title: &str,
    tier: Option<&str>,
) -> String {
    let mut hasher = blake3::Hasher::new();
    for part in [tenant_id, target_holder_id.unwrap_or("*"), title] {
        hasher.update(part.as_bytes());
        hasher.update(&[0x1f]);
    }
    if let Some(tier) = tier {
        hasher.update(tier.as_bytes());
    }
    hasher.finalize().to_hex().to_string()
}

/// An alert staged for insertion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewAlert {
    /// Owning tenant.
    pub tenant_id: String,
    /// What raised the alert.
    pub kind: AlertKind,
    /// Short title; part of the dedup identity.
    pub title: String,
    /// Human-readable detail.
    pub description: String,
    /// When the alert was raised.
    pub created_at: DateTime<Utc>,
    /// The holder the alert concerns; `None` broadcasts to the tenant.
    pub target_holder_id: Option<String>,
    /// BLAKE3 dedup hash.
    pub dedup_hash: String,
}

impl NewAlert {
    /// Stage an alert for one holder.
    ///
    /// `tier` joins the dedup identity when given.
    #[must_use]
    pub fn targeted(
        tenant_id: &str,
        holder_id: &str,
        kind: AlertKind,
        title: String,
        description: String,
        tier: Option<&str>,
    ) -> Self {
        let dedup_hash = compute_dedup_hash(tenant_id, Some(holder_id), &title, tier);
        Self {
            tenant_id: tenant_id.to_string(),
            kind,
            title,
            description,
            created_at: Utc::now(),
            target_holder_id: Some(holder_id.to_string()),
            dedup_hash,
        }
    }

    /// Stage an alert for every person in a tenant.
    #[must_use]
    pub fn broadcast(tenant_id: &str, kind: AlertKind, title: String, description: String) -> Self {
        let dedup_hash = compute_dedup_hash(tenant_id, None, &title, None);
        Self {
            tenant_id: tenant_id.to_string(),
            kind,
            title,
            description,
            created_at: Utc::now(),
            target_holder_id: None,
            dedup_hash,
        }
    }
}

/// A stored alert.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Alert {
    /// Store-assigned id.
    pub id: i64,
    /// Owning tenant.
    pub tenant_id: String,
    /// What raised the alert.
    pub kind: AlertKind,
    /// Short title.
    pub title: String,
    /// Human-readable detail.
    pub description: String,
    /// When the alert was raised.
    pub created_at: DateTime<Utc>,
    /// The holder the alert concerns; `None` for broadcasts.
    pub target_holder_id: Option<String>,
    /// Persons who have acknowledged the alert.
    pub acknowledged_by: BTreeSet<String>,
    /// BLAKE3 dedup hash.
    pub dedup_hash: String,
}

impl Alert {
    /// Is this alert targeted at `person_id`?
    #[must_use]
    pub fn is_targeted_at(&self, person_id: &str) -> bool {
        self.target_holder_id.as_deref() == Some(person_id)
    }

    /// Has `person_id` acknowledged this alert?
    #[must_use]
    pub fn is_acknowledged_by(&self, person_id: &str) -> bool {
        self.acknowledged_by.contains(person_id)
    }
}

/// Persistent alert storage.
///
/// Batch commits are all-or-nothing. Implementations must be safe to share
/// across scan workers.
pub trait AlertStore: Send + Sync {
    /// Alerts of a tenant that concern `person_id` and that the person has
    /// not acknowledged: those targeted at them plus broadcasts. `kinds`
    /// restricts the result when given.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    fn find_unacknowledged(
        &self,
        tenant_id: &str,
        person_id: &str,
        kinds: Option<&[AlertKind]>,
    ) -> Result<Vec<Alert>>;

    /// Insert every alert in one transaction. Returns the number inserted.
    ///
    /// # Errors
    ///
    /// Returns an error if the batch cannot be written; nothing is written
    /// in that case.
    fn commit_batch(&self, alerts: &[NewAlert]) -> Result<usize>;

    /// Insert each alert unless an alert with the same dedup hash exists that
    /// its target has not acknowledged. The check and insert are one
    /// statement per alert inside one transaction. Returns the number
    /// inserted.
    ///
    /// # Errors
    ///
    /// Returns an error if the batch cannot be written; nothing is written
    /// in that case.
    fn commit_batch_if_absent(&self, alerts: &[NewAlert]) -> Result<usize>;

    /// Record that `person_id` acknowledged the given alerts. Unknown ids and
    /// repeat acknowledgements are ignored. Returns the number of new
    /// acknowledgements.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be written.
    fn acknowledge(&self, alert_ids: &[i64], person_id: &str) -> Result<usize>;
}
