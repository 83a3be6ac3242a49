//! # Engine Configuration
//!
//! Policy knobs for the transaction and sync engines.
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     HARBOR_VOID_WINDOW_SECS=3600                                       │
//! │     HARBOR_CONFLICT_STRATEGY=manual                                    │
//! │                                                                         │
//! │  2. TOML Config File                                                   │
//! │     ~/.config/harbor-pos/engine.toml (Linux)                           │
//! │     ~/Library/Application Support/com.harbor.pos/engine.toml (macOS)   │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! │     24 h void window, PPN 11%, batches of 100                          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! # engine.toml
//! [transactions]
//! void_window_secs = 86400
//! refund_window_secs = 604800   # omit for no refund window
//!
//! [tax]
//! default_name = "PPN"
//! default_rate_bps = 1100
//!
//! [payment]
//! smallest_cash_unit_cents = 100
//!
//! [sync]
//! max_batch_size = 100
//! failure_ratio_threshold = 0.5
//! full_export_interval_secs = 3600
//! default_conflict_strategy = "server_wins"
//! ```

use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::{debug, info, warn};

use harbor_core::payment::{DEFAULT_IDR_DENOMINATIONS, DEFAULT_SMALLEST_CASH_UNIT_CENTS};
use harbor_core::tax::{DEFAULT_TAX_NAME, DEFAULT_TAX_RATE_BPS};
use harbor_core::{ConflictStrategy, Money, PaymentCalculator, TaxCalculator, TaxRate};

use crate::error::ConfigError;

/// Longest configurable time window (100 years).
pub const MAX_WINDOW_SECS: u64 = 100 * 365 * 24 * 60 * 60;

/// Longest retention for resolved conflicts, also the cap on `cleanup`.
pub const MAX_RETENTION_DAYS: u32 = 3650;

// =============================================================================
// Transaction Settings
// =============================================================================

/// Sale lifecycle policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionSettings {
    /// How long after creation a completed sale may be voided.
    /// Default: 86400 (24 hours)
    #[serde(default = "default_void_window")]
    pub void_window_secs: u64,

    /// Refund window. `None` means refunds are always allowed.
    #[serde(default)]
    pub refund_window_secs: Option<u64>,

    /// Attempts at allocating an order number before giving up.
    /// Default: 5
    #[serde(default = "default_max_order_number_attempts")]
    pub max_order_number_attempts: u32,
}

fn default_void_window() -> u64 {
    24 * 60 * 60
}

fn default_max_order_number_attempts() -> u32 {
    5
}

impl Default for TransactionSettings {
    fn default() -> Self {
        TransactionSettings {
            void_window_secs: default_void_window(),
            refund_window_secs: None,
            max_order_number_attempts: default_max_order_number_attempts(),
        }
    }
}

// =============================================================================
// Tax Settings
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaxSettings {
    /// Name of the system default tax, used when a tenant has no default rule.
    #[serde(default = "default_tax_name")]
    pub default_name: String,

    #[serde(default = "default_tax_rate")]
    pub default_rate_bps: u32,

    /// Accepted difference between stored and recomputed tax.
    /// Default: 1 (0.01)
    #[serde(default = "default_tax_tolerance")]
    pub tolerance_cents: i64,
}

fn default_tax_name() -> String {
    DEFAULT_TAX_NAME.to_string()
}

fn default_tax_rate() -> u32 {
    DEFAULT_TAX_RATE_BPS
}

fn default_tax_tolerance() -> i64 {
    1
}

impl Default for TaxSettings {
    fn default() -> Self {
        TaxSettings {
            default_name: default_tax_name(),
            default_rate_bps: default_tax_rate(),
            tolerance_cents: default_tax_tolerance(),
        }
    }
}

// =============================================================================
// Payment Settings
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentSettings {
    /// Cash in strict mode must be a multiple of this amount.
    #[serde(default = "default_smallest_cash_unit")]
    pub smallest_cash_unit_cents: i64,

    /// Notes and coins for change breakdown, in minor units.
    #[serde(default = "default_denominations")]
    pub denominations_cents: Vec<i64>,
}

fn default_smallest_cash_unit() -> i64 {
    DEFAULT_SMALLEST_CASH_UNIT_CENTS
}

fn default_denominations() -> Vec<i64> {
    DEFAULT_IDR_DENOMINATIONS
        .iter()
        .map(|major| Money::from_major(*major).cents())
        .collect()
}

impl Default for PaymentSettings {
    fn default() -> Self {
        PaymentSettings {
            smallest_cash_unit_cents: default_smallest_cash_unit(),
            denominations_cents: default_denominations(),
        }
    }
}

// =============================================================================
// Sync Settings
// =============================================================================

/// Offline sync policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncSettings {
    /// Maximum entries in one bulk ingestion.
    #[serde(default = "default_max_batch_size")]
    pub max_batch_size: usize,

    /// A batch whose failed fraction exceeds this is rolled back entirely.
    #[serde(default = "default_failure_ratio")]
    pub failure_ratio_threshold: f64,

    /// Minimum time between two full exports of one (tenant, actor).
    #[serde(default = "default_full_export_interval")]
    pub full_export_interval_secs: u64,

    /// Applied when a batch doesn't name a conflict strategy.
    #[serde(default)]
    pub default_conflict_strategy: ConflictStrategy,

    /// Health turns `stale` after this long without a sync.
    #[serde(default = "default_stale_after")]
    pub stale_after_secs: u64,

    /// Health turns `outdated` after this long without a sync.
    #[serde(default = "default_outdated_after")]
    pub outdated_after_secs: u64,

    /// Resolved conflicts older than this are swept.
    #[serde(default = "default_conflict_retention")]
    pub conflict_retention_days: u32,
}

fn default_max_batch_size() -> usize {
    100
}
fn default_failure_ratio() -> f64 {
    0.5
}
fn default_full_export_interval() -> u64 {
    60 * 60
}
fn default_stale_after() -> u64 {
    60 * 60
}
fn default_outdated_after() -> u64 {
    24 * 60 * 60
}
fn default_conflict_retention() -> u32 {
    30
}

impl Default for SyncSettings {
    fn default() -> Self {
        SyncSettings {
            max_batch_size: default_max_batch_size(),
            failure_ratio_threshold: default_failure_ratio(),
            full_export_interval_secs: default_full_export_interval(),
            default_conflict_strategy: ConflictStrategy::default(),
            stale_after_secs: default_stale_after(),
            outdated_after_secs: default_outdated_after(),
            conflict_retention_days: default_conflict_retention(),
        }
    }
}

// =============================================================================
// Main Engine Configuration
// =============================================================================

/// Complete engine configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub transactions: TransactionSettings,

    #[serde(default)]
    pub tax: TaxSettings,

    #[serde(default)]
    pub payment: PaymentSettings,

    #[serde(default)]
    pub sync: SyncSettings,
}

impl EngineConfig {
    /// Loads configuration from file, environment, and defaults.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file (engine.toml)
    /// 3. Environment variables
    pub fn load(config_path: Option<PathBuf>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(path) = config_path.or_else(Self::default_config_path) {
            if path.exists() {
                info!(?path, "Loading engine config from file");
                let contents = std::fs::read_to_string(&path)?;
                config = toml::from_str(&contents)?;
            } else {
                debug!(?path, "Config file not found, using defaults");
            }
        }

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    /// Loads config or returns default if load fails.
    pub fn load_or_default(config_path: Option<PathBuf>) -> Self {
        Self::load(config_path).unwrap_or_else(|e| {
            warn!("Failed to load engine config: {}. Using defaults.", e);
            Self::default()
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.transactions.max_order_number_attempts == 0 {
            return Err(ConfigError::Invalid(
                "max_order_number_attempts must be greater than 0".into(),
            ));
        }

        if self.tax.default_rate_bps >= TaxRate::BPS_SCALE {
            return Err(ConfigError::Invalid(format!(
                "default_rate_bps must be below {}, got {}",
                TaxRate::BPS_SCALE,
                self.tax.default_rate_bps
            )));
        }

        if self.tax.tolerance_cents < 0 {
            return Err(ConfigError::Invalid("tolerance_cents must not be negative".into()));
        }

        if self.payment.smallest_cash_unit_cents <= 0 {
            return Err(ConfigError::Invalid(
                "smallest_cash_unit_cents must be positive".into(),
            ));
        }

        if self.payment.denominations_cents.iter().all(|d| *d <= 0) {
            return Err(ConfigError::Invalid(
                "denominations_cents needs at least one positive value".into(),
            ));
        }

        if self.sync.max_batch_size == 0 {
            return Err(ConfigError::Invalid("max_batch_size must be greater than 0".into()));
        }

        if !(0.0..=1.0).contains(&self.sync.failure_ratio_threshold) {
            return Err(ConfigError::Invalid(format!(
                "failure_ratio_threshold must be within [0, 1], got {}",
                self.sync.failure_ratio_threshold
            )));
        }

        if self.sync.stale_after_secs > self.sync.outdated_after_secs {
            return Err(ConfigError::Invalid(
                "stale_after_secs must not exceed outdated_after_secs".into(),
            ));
        }

        let windows = [
            ("void_window_secs", Some(self.transactions.void_window_secs)),
            ("refund_window_secs", self.transactions.refund_window_secs),
            ("full_export_interval_secs", Some(self.sync.full_export_interval_secs)),
            ("stale_after_secs", Some(self.sync.stale_after_secs)),
            ("outdated_after_secs", Some(self.sync.outdated_after_secs)),
        ];
        for (name, value) in windows {
            if value.is_some_and(|secs| secs > MAX_WINDOW_SECS) {
                return Err(ConfigError::Invalid(format!(
                    "{name} must not exceed {MAX_WINDOW_SECS}"
                )));
            }
        }

        if !(1..=MAX_RETENTION_DAYS).contains(&self.sync.conflict_retention_days) {
            return Err(ConfigError::Invalid(format!(
                "conflict_retention_days must be within 1..={MAX_RETENTION_DAYS}"
            )));
        }

        Ok(())
    }

    /// Applies `HARBOR_*` environment variable overrides.
    fn apply_env_overrides(&mut self) {
        if let Some(secs) = env_parse::<u64>("HARBOR_VOID_WINDOW_SECS") {
            debug!(secs, "Overriding void window from environment");
            self.transactions.void_window_secs = secs;
        }

        if let Some(secs) = env_parse::<u64>("HARBOR_REFUND_WINDOW_SECS") {
            self.transactions.refund_window_secs = Some(secs);
        }

        if let Some(bps) = env_parse::<u32>("HARBOR_DEFAULT_TAX_BPS") {
            self.tax.default_rate_bps = bps;
        }

        if let Ok(name) = std::env::var("HARBOR_DEFAULT_TAX_NAME") {
            self.tax.default_name = name;
        }

        if let Some(size) = env_parse::<usize>("HARBOR_MAX_BATCH_SIZE") {
            self.sync.max_batch_size = size;
        }

        if let Some(secs) = env_parse::<u64>("HARBOR_FULL_EXPORT_INTERVAL_SECS") {
            self.sync.full_export_interval_secs = secs;
        }

        if let Ok(strategy) = std::env::var("HARBOR_CONFLICT_STRATEGY") {
            match strategy.parse() {
                Ok(parsed) => {
                    debug!(strategy = %strategy, "Overriding conflict strategy from environment");
                    self.sync.default_conflict_strategy = parsed;
                }
                Err(_) => warn!(strategy = %strategy, "Unknown conflict strategy in environment"),
            }
        }
    }

    /// Returns the default config file path.
    pub fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "harbor", "pos")
            .map(|dirs| dirs.config_dir().join("engine.toml"))
    }

    // =========================================================================
    // Convenience Methods
    // =========================================================================

    pub fn void_window(&self) -> Duration {
        secs(self.transactions.void_window_secs)
    }

    pub fn refund_window(&self) -> Option<Duration> {
        self.transactions.refund_window_secs.map(secs)
    }

    pub fn full_export_interval(&self) -> Duration {
        secs(self.sync.full_export_interval_secs)
    }

    pub fn stale_after(&self) -> Duration {
        secs(self.sync.stale_after_secs)
    }

    pub fn outdated_after(&self) -> Duration {
        secs(self.sync.outdated_after_secs)
    }

    pub fn tax_tolerance(&self) -> Money {
        Money::from_cents(self.tax.tolerance_cents)
    }

    /// Builds the tax calculator with the configured system default.
    pub fn tax_calculator(&self) -> Result<TaxCalculator, ConfigError> {
        TaxCalculator::new(
            self.tax.default_name.clone(),
            TaxRate::from_bps(self.tax.default_rate_bps),
        )
        .map_err(|e| ConfigError::Invalid(e.to_string()))
    }

    pub fn payment_calculator(&self) -> PaymentCalculator {
        PaymentCalculator::new(
            Money::from_cents(self.payment.smallest_cash_unit_cents),
            self.payment
                .denominations_cents
                .iter()
                .map(|cents| Money::from_cents(*cents))
                .collect(),
        )
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    let raw = std::env::var(key).ok()?;
    match raw.parse() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!(key, value = %raw, "Ignoring unparsable environment override");
            None
        }
    }
}

fn secs(value: u64) -> Duration {
    Duration::seconds(value.min(MAX_WINDOW_SECS) as i64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = EngineConfig::default();
        assert_eq!(config.transactions.void_window_secs, 86_400);
        assert_eq!(config.transactions.refund_window_secs, None);
        assert_eq!(config.tax.default_rate_bps, 1100);
        assert_eq!(config.sync.max_batch_size, 100);
        assert_eq!(config.sync.default_conflict_strategy, ConflictStrategy::ServerWins);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let mut config = EngineConfig::default();
        config.tax.default_rate_bps = 10_000;
        assert!(config.validate().is_err());

        let mut config = EngineConfig::default();
        config.sync.failure_ratio_threshold = 1.5;
        assert!(config.validate().is_err());

        let mut config = EngineConfig::default();
        config.sync.stale_after_secs = config.sync.outdated_after_secs + 1;
        assert!(config.validate().is_err());

        let mut config = EngineConfig::default();
        config.payment.denominations_cents = vec![0, -100];
        assert!(config.validate().is_err());

        let mut config = EngineConfig::default();
        config.transactions.refund_window_secs = Some(u64::MAX);
        assert!(config.validate().is_err());

        let mut config = EngineConfig::default();
        config.sync.conflict_retention_days = 0;
        assert!(config.validate().is_err());
        config.sync.conflict_retention_days = MAX_RETENTION_DAYS + 1;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config: EngineConfig = toml::from_str(
            r#"
            [transactions]
            refund_window_secs = 604800

            [sync]
            default_conflict_strategy = "manual"
            "#,
        )
        .unwrap();
        assert_eq!(config.refund_window(), Some(Duration::days(7)));
        assert_eq!(config.void_window(), Duration::hours(24));
        assert_eq!(config.sync.default_conflict_strategy, ConflictStrategy::Manual);
        assert_eq!(config.sync.max_batch_size, 100);
    }

    #[test]
    fn test_calculators_from_config() {
        let config = EngineConfig::default();
        let tax = config.tax_calculator().unwrap();
        assert_eq!(tax.system_default().rate, TaxRate::from_bps(1100));
        assert_eq!(config.payment_calculator().denominations().len(), 10);
    }

    #[test]
    fn test_toml_serialization() {
        let toml_str = toml::to_string_pretty(&EngineConfig::default()).unwrap();
        assert!(toml_str.contains("[transactions]"));
        assert!(toml_str.contains("[sync]"));
    }
}
