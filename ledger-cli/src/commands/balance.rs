//! Balance command implementation

use crate::commands::{to_json, OutputFormat};
use crate::config::LedgerCliConfig;
use anyhow::{Context, Result};
use referral_ledger::ReferralEngine;
use tracing::info;

/// Execute the balance command
///
/// A member that never earned commission reports a zero balance.
pub fn execute(
    engine: &ReferralEngine,
    member_id: &str,
    output_format: OutputFormat,
    config: &LedgerCliConfig,
) -> Result<String> {
    let balance = engine
        .balance(member_id)
        .with_context(|| format!("Failed to read balance of '{member_id}'"))?;
    info!(member_id, total = balance.total_minor, "Loaded balance");

    match output_format {
        OutputFormat::Human => Ok(format!(
            "Balance for {}\n{}\nTotal earned:        {:>14.2}\nThis week ({}): {:>14.2}",
            balance.member_id,
            "=".repeat(40),
            config.format_money(balance.total_minor),
            balance.period,
            config.format_money(balance.period_minor)
        )),
        OutputFormat::Json => to_json(&balance),
    }
}
