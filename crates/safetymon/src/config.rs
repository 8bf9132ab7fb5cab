//! Configuration management for safetymon.
//!
//! This module provides configuration loading and validation using figment,
//! supporting TOML config files, environment variables, and defaults. It also
//! defines the per-tenant values ([`TenantConfig`], [`DutyLimitConfig`]) that
//! are handed explicitly to every evaluator call.

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::compliance::expiry::ExpiryCutoffs;
use crate::error::{Error, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "config.toml";

/// Default data directory name.
const DATA_DIR_NAME: &str = "safetymon";

/// Default database file name.
const DATABASE_FILE_NAME: &str = "alerts.db";

/// Longest trailing period, in days, a duty window or indicator may span.
pub const MAX_PERIOD_DAYS: u32 = 3660;

/// Application configuration.
///
/// Configuration is loaded from (in order of precedence, highest first):
/// 1. Environment variables (prefixed with `SAFETYMON_`)
/// 2. TOML config file at `~/.config/safetymon/config.toml`
/// 3. Default values
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Alert storage configuration.
    pub storage: StorageConfig,
    /// Document expiry cutoffs.
    pub expiry: ExpiryConfig,
    /// Duty-time ceilings and window lengths.
    pub duty: DutyConfig,
    /// Compliance scan behavior.
    pub scan: ScanConfig,
}

/// Storage-related configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Path to the alert database file.
    /// Defaults to `~/.local/share/safetymon/alerts.db`
    pub database_path: Option<PathBuf>,
    /// How long a writer waits on a locked database before giving up.
    pub busy_timeout_ms: u64,
}

/// Day-count cutoffs for document expiry tiers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExpiryConfig {
    /// Documents expiring within this many days are urgent.
    pub urgent_days: u32,
    /// Documents expiring within this many days are a warning.
    pub warning_days: u32,
}

/// Duty-time configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DutyConfig {
    /// Regulatory ceilings that tenant limits are clamped to.
    pub ceilings: DutyCeilings,
    /// Rolling window lengths.
    pub windows: DutyWindows,
}

/// Scan-related configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// Worker threads for per-person evaluation. 0 uses one per CPU.
    pub workers: usize,
    /// Identity used to suppress duplicate alerts.
    pub dedup: DedupPolicy,
    /// How staged alerts are written to the alert store.
    pub write_mode: WriteMode,
}

/// Which fields make up an alert's dedup key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DedupPolicy {
    /// `(target, title)`: a fact that worsens from warning to urgent is not
    /// re-alerted while the first alert is unacknowledged.
    #[default]
    Title,
    /// `(target, title, tier)`: every tier change produces a fresh alert.
    TitleAndTier,
}

/// How a person's staged alert batch is committed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteMode {
    /// Existence check followed by an unconditional insert. Two concurrent
    /// scans for the same person can both pass the check.
    ReadThenWrite,
    /// Insert-if-absent keyed on the dedup hash, evaluated by the store.
    #[default]
    Conditional,
}

/// Regulatory duty-time ceilings, in hours.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DutyCeilings {
    /// Maximum hours in the daily window.
    pub daily_hours: f64,
    /// Maximum hours in the weekly window.
    pub weekly_hours: f64,
    /// Maximum hours in the monthly window.
    pub monthly_hours: f64,
}

/// Rolling window lengths, in days.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DutyWindows {
    /// Length of the daily window.
    pub daily_days: u32,
    /// Length of the weekly window.
    pub weekly_days: u32,
    /// Length of the monthly window.
    pub monthly_days: u32,
}

impl DutyWindows {
    /// The longest configured window, used to bound event lookups.
    #[must_use]
    pub fn longest(&self) -> u32 {
        self.daily_days.max(self.weekly_days).max(self.monthly_days)
    }
}

/// Duty limits as requested by a tenant, before clamping.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DutyLimits {
    /// Requested daily limit in hours.
    pub daily_hours: f64,
    /// Requested weekly limit in hours.
    pub weekly_hours: f64,
    /// Requested monthly limit in hours.
    pub monthly_hours: f64,
}

/// A tenant's effective duty limits.
///
/// Every value of this type satisfies `limit <= ceiling`; the only way to
/// build one is [`DutyLimitConfig::configure`], which clamps.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DutyLimitConfig {
    daily_hours: f64,
    weekly_hours: f64,
    monthly_hours: f64,
}

impl DutyLimitConfig {
    /// Clamp requested limits to the regulatory ceilings.
    #[must_use]
    pub fn configure(requested: &DutyLimits, ceilings: &DutyCeilings) -> Self {
        Self {
            daily_hours: clamp_limit("daily", requested.daily_hours, ceilings.daily_hours),
            weekly_hours: clamp_limit("weekly", requested.weekly_hours, ceilings.weekly_hours),
            monthly_hours: clamp_limit(
                "monthly",
                requested.monthly_hours,
                ceilings.monthly_hours,
            ),
        }
    }

    /// Limits equal to the ceilings themselves.
    #[must_use]
    pub fn at_ceilings(ceilings: &DutyCeilings) -> Self {
        Self {
            daily_hours: ceilings.daily_hours,
            weekly_hours: ceilings.weekly_hours,
            monthly_hours: ceilings.monthly_hours,
        }
    }

    /// Daily limit in hours.
    #[must_use]
    pub fn daily_hours(&self) -> f64 {
        self.daily_hours
    }

    /// Weekly limit in hours.
    #[must_use]
    pub fn weekly_hours(&self) -> f64 {
        self.weekly_hours
    }

    /// Monthly limit in hours.
    #[must_use]
    pub fn monthly_hours(&self) -> f64 {
        self.monthly_hours
    }
}

fn clamp_limit(window: &str, requested: f64, ceiling: f64) -> f64 {
    if !requested.is_finite() || requested > ceiling {
        warn!(
            window,
            requested, ceiling, "Duty limit exceeds regulatory ceiling, clamping"
        );
        return ceiling;
    }
    if requested < 0.0 {
        warn!(window, requested, "Negative duty limit, clamping to zero");
        return 0.0;
    }
    requested
}

/// Everything an evaluator needs to know about one tenant.
///
/// Built once per scan and passed by reference; evaluators never read
/// configuration from anywhere else.
#[derive(Debug, Clone, PartialEq)]
pub struct TenantConfig {
    /// The tenant this configuration belongs to.
    pub tenant_id: String,
    /// Expiry tier cutoffs.
    pub expiry: ExpiryCutoffs,
    /// Rolling duty window lengths.
    pub duty_windows: DutyWindows,
    /// The tenant's clamped duty limits.
    pub duty_limits: DutyLimitConfig,
    /// Dedup key policy.
    pub dedup: DedupPolicy,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: None, // Will be resolved to default at runtime
            busy_timeout_ms: 5_000,
        }
    }
}

impl Default for ExpiryConfig {
    fn default() -> Self {
        Self {
            urgent_days: 30,
            warning_days: 60,
        }
    }
}

impl Default for DutyCeilings {
    fn default() -> Self {
        Self {
            daily_hours: 8.0,
            weekly_hours: 30.0,
            monthly_hours: 100.0,
        }
    }
}

impl Default for DutyWindows {
    fn default() -> Self {
        Self {
            daily_days: 1,
            weekly_days: 7,
            monthly_days: 30,
        }
    }
}

impl Config {
    /// Load configuration from all sources.
    ///
    /// Configuration is loaded in this order (later sources override earlier):
    /// 1. Default values
    /// 2. TOML config file (if exists)
    /// 3. Environment variables (prefixed with `SAFETYMON_`)
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading or parsing fails.
    pub fn load() -> Result<Self> {
        Self::load_from(None)
    }

    /// Load configuration with an optional custom config path.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading or parsing fails.
    pub fn load_from(config_path: Option<PathBuf>) -> Result<Self> {
        let config_file = config_path.unwrap_or_else(Self::default_config_path);

        let figment = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(&config_file).nested())
            .merge(Env::prefixed("SAFETYMON_").split("_"));

        let config: Config = figment.extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Get the default configuration file path.
    #[must_use]
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from(".config"))
            .join(DATA_DIR_NAME)
            .join(CONFIG_FILE_NAME)
    }

    /// Get the default data directory path.
    #[must_use]
    pub fn default_data_dir() -> PathBuf {
        dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from(".local/share"))
            .join(DATA_DIR_NAME)
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration values are invalid.
    pub fn validate(&self) -> Result<()> {
        self.expiry_cutoffs()?;

        let ceilings = &self.duty.ceilings;
        for (name, value) in [
            ("daily_hours", ceilings.daily_hours),
            ("weekly_hours", ceilings.weekly_hours),
            ("monthly_hours", ceilings.monthly_hours),
        ] {
            if !value.is_finite() || value <= 0.0 {
                return Err(Error::ConfigValidation {
                    message: format!("duty ceiling {name} must be a positive number of hours"),
                });
            }
        }

        let windows = &self.duty.windows;
        for (name, days) in [
            ("daily_days", windows.daily_days),
            ("weekly_days", windows.weekly_days),
            ("monthly_days", windows.monthly_days),
        ] {
            if days == 0 {
                return Err(Error::ConfigValidation {
                    message: format!("duty window {name} must be at least one day"),
                });
            }
            if days > MAX_PERIOD_DAYS {
                return Err(Error::ConfigValidation {
                    message: format!(
                        "duty window {name} ({days}) exceeds the maximum of {MAX_PERIOD_DAYS} days"
                    ),
                });
            }
        }

        Ok(())
    }

    /// Build validated expiry cutoffs from the `expiry` section.
    ///
    /// # Errors
    ///
    /// Returns an error if `urgent_days` is not below `warning_days`.
    pub fn expiry_cutoffs(&self) -> Result<ExpiryCutoffs> {
        ExpiryCutoffs::new(self.expiry.urgent_days, self.expiry.warning_days).map_err(|_| {
            Error::ConfigValidation {
                message: format!(
                    "urgent_days ({}) must be less than warning_days ({})",
                    self.expiry.urgent_days, self.expiry.warning_days
                ),
            }
        })
    }

    /// Assemble the explicit per-tenant configuration for one scan.
    ///
    /// # Errors
    ///
    /// Returns an error if the expiry cutoffs are invalid.
    pub fn tenant_config(
        &self,
        tenant_id: impl Into<String>,
        duty_limits: DutyLimitConfig,
    ) -> Result<TenantConfig> {
        Ok(TenantConfig {
            tenant_id: tenant_id.into(),
            expiry: self.expiry_cutoffs()?,
            duty_windows: self.duty.windows,
            duty_limits,
            dedup: self.scan.dedup,
        })
    }

    /// Get the database path, resolving defaults if not set.
    #[must_use]
    pub fn database_path(&self) -> PathBuf {
        self.storage
            .database_path
            .clone()
            .unwrap_or_else(|| Self::default_data_dir().join(DATABASE_FILE_NAME))
    }

    /// Get the store busy timeout as a Duration.
    #[must_use]
    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.storage.busy_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();

        assert_eq!(config.expiry.urgent_days, 30);
        assert_eq!(config.expiry.warning_days, 60);
        assert_eq!(config.scan.dedup, DedupPolicy::Title);
        assert_eq!(config.scan.write_mode, WriteMode::Conditional);
        assert_eq!(config.scan.workers, 0);
    }

    #[test]
    fn test_default_duty_config() {
        let duty = DutyConfig::default();

        assert!((duty.ceilings.daily_hours - 8.0).abs() < f64::EPSILON);
        assert!((duty.ceilings.weekly_hours - 30.0).abs() < f64::EPSILON);
        assert!((duty.ceilings.monthly_hours - 100.0).abs() < f64::EPSILON);
        assert_eq!(duty.windows.daily_days, 1);
        assert_eq!(duty.windows.weekly_days, 7);
        assert_eq!(duty.windows.monthly_days, 30);
        assert_eq!(duty.windows.longest(), 30);
    }

    #[test]
    fn test_validate_valid_config() {
        let config = Config::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_inverted_cutoffs() {
        let mut config = Config::default();
        config.expiry.urgent_days = 60;
        config.expiry.warning_days = 30;

        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("urgent_days"));
    }

    #[test]
    fn test_validate_zero_ceiling() {
        let mut config = Config::default();
        config.duty.ceilings.weekly_hours = 0.0;

        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("weekly_hours"));
    }

    #[test]
    fn test_validate_zero_window() {
        let mut config = Config::default();
        config.duty.windows.daily_days = 0;

        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("at least one day"));
    }

    #[test]
    fn test_validate_oversized_window() {
        let mut config = Config::default();
        config.duty.windows.monthly_days = u32::MAX;

        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("monthly_days"));
        assert!(err.contains("exceeds the maximum"));

        config.duty.windows.monthly_days = MAX_PERIOD_DAYS;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_duty_limits_clamped_to_ceilings() {
        let ceilings = DutyCeilings::default();
        let requested = DutyLimits {
            daily_hours: 10.0,
            weekly_hours: 25.0,
            monthly_hours: 150.0,
        };

        let limits = DutyLimitConfig::configure(&requested, &ceilings);
        assert!((limits.daily_hours() - 8.0).abs() < f64::EPSILON);
        assert!((limits.weekly_hours() - 25.0).abs() < f64::EPSILON);
        assert!((limits.monthly_hours() - 100.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_duty_limits_reject_negative_and_nan() {
        let ceilings = DutyCeilings::default();
        let requested = DutyLimits {
            daily_hours: -2.0,
            weekly_hours: f64::NAN,
            monthly_hours: 80.0,
        };

        let limits = DutyLimitConfig::configure(&requested, &ceilings);
        assert!(limits.daily_hours().abs() < f64::EPSILON);
        assert!((limits.weekly_hours() - 30.0).abs() < f64::EPSILON);
        assert!((limits.monthly_hours() - 80.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_tenant_config_carries_settings() {
        let mut config = Config::default();
        config.scan.dedup = DedupPolicy::TitleAndTier;
        let limits = DutyLimitConfig::at_ceilings(&config.duty.ceilings);

        let tenant = config.tenant_config("acme-aviation", limits).unwrap();
        assert_eq!(tenant.tenant_id, "acme-aviation");
        assert_eq!(tenant.expiry.urgent_days(), 30);
        assert_eq!(tenant.expiry.warning_days(), 60);
        assert_eq!(tenant.dedup, DedupPolicy::TitleAndTier);
        assert_eq!(tenant.duty_limits, limits);
    }

    #[test]
    fn test_database_path_default() {
        let config = Config::default();
        let path = config.database_path();

        assert!(path.to_string_lossy().contains("alerts.db"));
    }

    #[test]
    fn test_database_path_custom() {
        let mut config = Config::default();
        config.storage.database_path = Some(PathBuf::from("/custom/path/alerts.sqlite"));

        assert_eq!(
            config.database_path(),
            PathBuf::from("/custom/path/alerts.sqlite")
        );
    }

    #[test]
    fn test_busy_timeout() {
        let config = Config::default();
        assert_eq!(config.busy_timeout(), Duration::from_millis(5_000));
    }

    #[test]
    fn test_default_config_path() {
        let path = Config::default_config_path();
        assert!(path.to_string_lossy().contains("safetymon"));
        assert!(path.to_string_lossy().contains("config.toml"));
    }

    #[test]
    fn test_load_nonexistent_config() {
        let result = Config::load_from(Some(PathBuf::from("/nonexistent/config.toml")));
        assert!(result.is_ok());
        assert_eq!(result.unwrap(), Config::default());
    }

    #[test]
    fn test_load_from_toml_file() {
        let path = std::env::temp_dir().join(format!(
            "safetymon_config_test_{}.toml",
            std::process::id()
        ));
        std::fs::write(
            &path,
            r#"
[expiry]
urgent_days = 14
warning_days = 45

[scan]
dedup = "title_and_tier"
write_mode = "read_then_write"
"#,
        )
        .unwrap();

        let config = Config::load_from(Some(path.clone())).unwrap();
        assert_eq!(config.expiry.urgent_days, 14);
        assert_eq!(config.expiry.warning_days, 45);
        assert_eq!(config.scan.dedup, DedupPolicy::TitleAndTier);
        assert_eq!(config.scan.write_mode, WriteMode::ReadThenWrite);

        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_dedup_policy_serialize() {
        let json = serde_json::to_string(&DedupPolicy::TitleAndTier).unwrap();
        assert_eq!(json, "\"title_and_tier\"");
    }

    #[test]
    fn test_expiry_config_deserialize() {
        let json = r#"{"urgent_days": 7}"#;
        let expiry: ExpiryConfig = serde_json::from_str(json).unwrap();
        assert_eq!(expiry.urgent_days, 7);
        assert_eq!(expiry.warning_days, 60);
    }
}
