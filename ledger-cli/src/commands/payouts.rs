//! Payout transition commands
//!
//! `mark-paid` moves a payout week's pending ledger entries to paid;
//! `settle-bonuses` pays a member's pending bonuses and starts a new
//! referral-count cycle when a referral bonus was among them.

use crate::commands::{to_json, OutputFormat};
use crate::config::LedgerCliConfig;
use anyhow::{anyhow, Context, Result};
use referral_ledger::ReferralEngine;
use serde_json::json;
use tracing::info;

/// Check the `YYYY-Www` payout week marker
fn validate_week(payout_week: &str) -> Result<()> {
    let valid = payout_week.split_once("-W").is_some_and(|(year, week)| {
        year.len() == 4
            && year.chars().all(|c| c.is_ascii_digit())
            && week.len() == 2
            && week.parse::<u8>().is_ok_and(|w| (1..=53).contains(&w))
    });
    if valid {
        Ok(())
    } else {
        Err(anyhow!(
            "Invalid payout week '{payout_week}', expected ISO format like 2026-W43"
        ))
    }
}

/// Execute the mark-paid command
pub fn execute_mark_paid(
    engine: &mut ReferralEngine,
    payout_week: &str,
    output_format: OutputFormat,
) -> Result<String> {
    validate_week(payout_week)?;

    let updated = engine
        .mark_week_paid(payout_week)
        .with_context(|| format!("Failed to mark week {payout_week} paid"))?;
    info!(payout_week, updated, "Marked payout week paid");

    match output_format {
        OutputFormat::Human => Ok(format!(
            "Marked {updated} ledger entries of week {payout_week} as paid"
        )),
        OutputFormat::Json => to_json(&json!({
            "payout_week": payout_week,
            "entries_paid": updated,
        })),
    }
}

/// Execute the settle-bonuses command
pub fn execute_settle_bonuses(
    engine: &mut ReferralEngine,
    member_id: &str,
    output_format: OutputFormat,
    config: &LedgerCliConfig,
) -> Result<String> {
    let settlement = engine
        .settle_bonuses(member_id)
        .with_context(|| format!("Failed to settle bonuses of '{member_id}'"))?;

    match output_format {
        OutputFormat::Human => Ok(format!(
            "Bonuses settled for {}\nBonuses paid:      {}\nAmount:            {:.2}\nSignups consumed:  {}",
            settlement.beneficiary_id,
            settlement.bonuses_paid,
            config.format_money(settlement.amount_minor),
            settlement.signups_consumed
        )),
        OutputFormat::Json => to_json(&settlement),
    }
}
