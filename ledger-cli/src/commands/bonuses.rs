//! Bonuses command implementation

use crate::commands::{to_json, OutputFormat};
use crate::config::LedgerCliConfig;
use anyhow::{Context, Result};
use referral_ledger::{BonusRecord, ReferralEngine};
use std::fmt::Write as _;

/// Execute the bonuses command
///
/// With a member, lists that member's bonus records; without one, lists every
/// pending bonus across the ledger, which is what the notification job polls.
pub fn execute(
    engine: &ReferralEngine,
    member_id: Option<&str>,
    output_format: OutputFormat,
    config: &LedgerCliConfig,
) -> Result<String> {
    let (records, title) = match member_id {
        Some(member_id) => (
            engine
                .bonus_records(member_id)
                .with_context(|| format!("Failed to list bonuses of '{member_id}'"))?,
            format!("Bonuses for member {member_id}"),
        ),
        None => (
            engine
                .pending_bonuses()
                .context("Failed to list pending bonuses")?,
            "Pending bonuses".to_string(),
        ),
    };

    match output_format {
        OutputFormat::Human => Ok(format_bonuses_human(&title, &records, config)),
        OutputFormat::Json => to_json(&records),
    }
}

fn format_bonuses_human(title: &str, records: &[BonusRecord], config: &LedgerCliConfig) -> String {
    if records.is_empty() {
        return format!("{title}\nNo bonuses found.");
    }

    let mut output = format!("{title}\n");
    let _ = writeln!(
        output,
        "{:<16} {:<32} {:>12} {:<8}",
        "Beneficiary", "Bonus", "Amount", "Status"
    );
    output.push_str(&"-".repeat(72));
    for record in records {
        let _ = write!(
            output,
            "\n{:<16} {:<32} {:>12.2} {:<8}",
            record.beneficiary_id,
            record.bonus_type,
            config.format_money(record.amount_minor),
            record.status.as_str()
        );
    }
    output
}
