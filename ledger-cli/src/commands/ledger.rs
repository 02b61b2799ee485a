//! Ledger command implementation
//!
//! Lists ledger entries either for one beneficiary or for one payment event.

use crate::commands::{to_json, OutputFormat};
use crate::config::LedgerCliConfig;
use anyhow::{anyhow, Result};
use referral_ledger::{LedgerEntry, ReferralEngine};
use std::fmt::Write as _;
use tracing::info;

/// Which entries to list
#[derive(Clone, Copy, Debug)]
pub enum LedgerFilter<'a> {
    Beneficiary(&'a str),
    Event(&'a str),
}

/// Execute the ledger command
pub fn execute(
    engine: &ReferralEngine,
    filter: LedgerFilter<'_>,
    output_format: OutputFormat,
    config: &LedgerCliConfig,
) -> Result<String> {
    let (entries, title) = match filter {
        LedgerFilter::Beneficiary(member_id) => (
            engine
                .ledger_entries(member_id)
                .map_err(|e| anyhow!("Failed to list entries of '{member_id}': {e}"))?,
            format!("Ledger entries for member {member_id}"),
        ),
        LedgerFilter::Event(event_id) => (
            engine
                .entries_for_event(event_id)
                .map_err(|e| anyhow!("Failed to list entries of event '{event_id}': {e}"))?,
            format!("Ledger entries for event {event_id}"),
        ),
    };
    info!("Found {} ledger entries", entries.len());

    match output_format {
        OutputFormat::Human => Ok(format_entries_human(&title, &entries, config)),
        OutputFormat::Json => to_json(&entries),
    }
}

fn format_entries_human(title: &str, entries: &[LedgerEntry], config: &LedgerCliConfig) -> String {
    if entries.is_empty() {
        return format!("{title}\nNo entries found.");
    }

    let mut output = format!("{title}\n");
    let _ = writeln!(
        output,
        "{:<20} {:<16} {:<16} {:>5} {:>12} {:<9} {:<8} {:<8}",
        "Event", "Beneficiary", "Payer", "Level", "Amount", "Week", "Month", "Status"
    );
    output.push_str(&"-".repeat(100));
    output.push('\n');

    let mut total: u64 = 0;
    for entry in entries {
        let _ = writeln!(
            output,
            "{:<20} {:<16} {:<16} {:>5} {:>12.2} {:<9} {:<8} {:<8}",
            entry.event_id,
            entry.beneficiary_id,
            entry.payer_id,
            entry.level,
            config.format_money(entry.amount_minor),
            entry.payout_week,
            entry.period_month,
            entry.status.as_str()
        );
        total = total.saturating_add(entry.amount_minor);
    }
    let _ = write!(
        output,
        "\n{} entries, total {:.2}",
        entries.len(),
        config.format_money(total)
    );
    output
}
