//! Command implementations for the referral ledger CLI

pub mod audit;
pub mod balance;
pub mod bonuses;
pub mod ingest;
pub mod ledger;
pub mod payouts;
pub mod points;
pub mod process_event;
pub mod register_member;
pub mod simulate;

pub use audit::execute as execute_audit;
pub use balance::execute as execute_balance;
pub use bonuses::execute as execute_bonuses;
pub use ingest::execute as execute_ingest;
pub use ledger::execute as execute_ledger;
pub use payouts::{execute_mark_paid, execute_settle_bonuses};
pub use points::execute as execute_points;
pub use process_event::{execute_payment, execute_signup, execute_upgrade};
pub use register_member::execute as execute_register_member;
pub use simulate::execute as execute_simulate;

use anyhow::{anyhow, Result};
use clap::ValueEnum;
use referral_ledger::Tier;
use serde::Serialize;

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Human,
    Json,
}

/// Parse a tier code, case-insensitively
pub fn parse_tier(code: &str) -> Result<Tier> {
    code.trim()
        .to_uppercase()
        .parse()
        .map_err(|_| anyhow!("Invalid tier '{code}', expected one of FREE, BRONZE, SILVER, GOLD, DIAMOND, PARTNER"))
}

/// Render a command result as pretty JSON
pub fn to_json<T: Serialize>(value: &T) -> Result<String> {
    serde_json::to_string_pretty(value).map_err(|e| anyhow!("Failed to serialize output: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_tier_any_case() {
        assert_eq!(parse_tier("gold").unwrap(), Tier::Gold);
        assert_eq!(parse_tier(" Partner ").unwrap(), Tier::Partner);
        assert!(parse_tier("platinum").is_err());
    }
}
