//! Configuration management for the ledger engine
//!
//! Every tunable value is read from an environment variable with a default
//! that matches the production rate card.

use crate::constants::{
    DEFAULT_BUSY_TIMEOUT_MS, MAX_COMMISSION_LEVELS, PARTNER_MONTHLY_CAP_MINOR, POINTS_MAX_DEPTH,
    PROMOTION_MIN_RECRUITS,
};
use crate::errors::{LedgerError, Result};
use std::env;
use std::str::FromStr;

/// Centralized configuration for the referral ledger engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// SQLite database path; `None` keeps the store in memory
    pub database_path: Option<String>,

    /// How long a writer waits on the database lock before giving up
    pub busy_timeout_ms: u64,

    /// Partner commission ceiling per calendar month, in minor units
    pub partner_monthly_cap_minor: u64,

    /// Deepest sponsor level the commission walk visits
    pub max_commission_levels: u8,

    /// Deepest network depth credited with points
    pub points_max_depth: u8,

    /// Qualifying BRONZE recruits that promote a FREE sponsor at level 1
    pub promotion_min_recruits: u32,
}

impl EngineConfig {
    /// Create a new configuration instance with values from environment variables
    /// or the defaults if not set
    #[must_use]
    pub fn new() -> Self {
        Self {
            database_path: env::var("REFERRAL_DB_PATH").ok().filter(|p| !p.is_empty()),
            busy_timeout_ms: env_or("REFERRAL_BUSY_TIMEOUT_MS", DEFAULT_BUSY_TIMEOUT_MS),
            partner_monthly_cap_minor: env_or(
                "REFERRAL_PARTNER_MONTHLY_CAP_MINOR",
                PARTNER_MONTHLY_CAP_MINOR,
            ),
            max_commission_levels: env_or("REFERRAL_MAX_COMMISSION_LEVELS", MAX_COMMISSION_LEVELS),
            points_max_depth: env_or("REFERRAL_POINTS_MAX_DEPTH", POINTS_MAX_DEPTH),
            promotion_min_recruits: env_or(
                "REFERRAL_PROMOTION_MIN_RECRUITS",
                PROMOTION_MIN_RECRUITS,
            ),
        }
    }

    /// Point the configuration at a database file
    #[must_use]
    pub fn with_database_path(mut self, path: impl Into<String>) -> Self {
        self.database_path = Some(path.into());
        self
    }

    /// Reject ceilings the rate tables cannot serve
    pub fn validate(&self) -> Result<()> {
        if !(1..=MAX_COMMISSION_LEVELS).contains(&self.max_commission_levels) {
            return Err(LedgerError::Config(format!(
                "max_commission_levels must be between 1 and {MAX_COMMISSION_LEVELS}, got: {}",
                self.max_commission_levels
            )));
        }
        if !(1..=MAX_COMMISSION_LEVELS).contains(&self.points_max_depth) {
            return Err(LedgerError::Config(format!(
                "points_max_depth must be between 1 and {MAX_COMMISSION_LEVELS}, got: {}",
                self.points_max_depth
            )));
        }
        if self.promotion_min_recruits == 0 {
            return Err(LedgerError::Config(
                "promotion_min_recruits must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            database_path: None,
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS,
            partner_monthly_cap_minor: PARTNER_MONTHLY_CAP_MINOR,
            max_commission_levels: MAX_COMMISSION_LEVELS,
            points_max_depth: POINTS_MAX_DEPTH,
            promotion_min_recruits: PROMOTION_MIN_RECRUITS,
        }
    }
}

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = EngineConfig::default();

        assert_eq!(config.database_path, None);
        assert_eq!(config.busy_timeout_ms, 5_000);
        assert_eq!(config.partner_monthly_cap_minor, 2_800_000);
        assert_eq!(config.max_commission_levels, 7);
        assert_eq!(config.points_max_depth, 3);
        assert_eq!(config.promotion_min_recruits, 2);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_rejects_out_of_range_depths() {
        let config = EngineConfig {
            max_commission_levels: 8,
            ..EngineConfig::default()
        };
        assert!(matches!(config.validate(), Err(LedgerError::Config(_))));

        let config = EngineConfig {
            points_max_depth: 0,
            ..EngineConfig::default()
        };
        assert!(matches!(config.validate(), Err(LedgerError::Config(_))));
    }

    #[test]
    fn test_with_database_path() {
        let config = EngineConfig::default().with_database_path("/tmp/ledger.db");
        assert_eq!(config.database_path.as_deref(), Some("/tmp/ledger.db"));
    }
}
