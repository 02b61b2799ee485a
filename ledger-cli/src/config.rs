//! Configuration management for the referral ledger CLI
//!
//! Centralizes the CLI's defaults, making them configurable via environment
//! variables. Engine tunables (cap, ceilings, busy timeout) are read by
//! [`EngineConfig::new`] from their own variables.

use referral_ledger::EngineConfig;
use std::env;

/// Centralized configuration for the referral ledger CLI
#[derive(Debug, Clone)]
pub struct LedgerCliConfig {
    /// Ledger database used when `--db` is not given
    pub default_db_path: String,

    /// Default output format for CLI commands
    pub default_output_format: String,

    /// Minor units per major currency unit, for display
    pub minor_units_divisor: u64,

    /// Basis points divisor for rate display
    pub basis_points_divisor: f64,
}

impl LedgerCliConfig {
    /// Create a new configuration instance with values from environment variables
    /// or sensible defaults if not set
    #[must_use]
    pub fn new() -> Self {
        Self {
            default_db_path: env::var("REFERRAL_DB_PATH")
                .ok()
                .filter(|p| !p.is_empty())
                .unwrap_or_else(|| "referral-ledger.db".to_string()),

            default_output_format: env::var("REFERRAL_DEFAULT_OUTPUT_FORMAT")
                .unwrap_or_else(|_| "human".to_string()),

            minor_units_divisor: env::var("REFERRAL_MINOR_UNITS_DIVISOR")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|d| *d > 0)
                .unwrap_or(100),

            basis_points_divisor: env::var("BASIS_POINTS_DIVISOR")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(100.0),
        }
    }

    /// Engine configuration pointed at `db_path`, or at the default database
    #[must_use]
    pub fn engine_config(&self, db_path: Option<&str>) -> EngineConfig {
        EngineConfig::new().with_database_path(db_path.unwrap_or(&self.default_db_path))
    }

    /// Convert minor units to display units
    #[allow(clippy::cast_precision_loss)] // Acceptable for display formatting
    #[must_use]
    pub fn format_money(&self, minor_units: u64) -> f64 {
        minor_units as f64 / self.minor_units_divisor as f64
    }

    /// Convert basis points to percentage
    #[must_use]
    pub fn format_rate_percentage(&self, rate_bps: u16) -> f64 {
        f64::from(rate_bps) / self.basis_points_divisor
    }
}

impl Default for LedgerCliConfig {
    fn default() -> Self {
        Self::new()
    }
}
