//! Audit command implementation
//!
//! Compares every balance against the sum of its ledger entries. A mismatch
//! makes the command fail so scripts notice.

use crate::commands::{to_json, OutputFormat};
use anyhow::{anyhow, Context, Result};
use referral_ledger::ReferralEngine;
use std::fmt::Write as _;

/// Execute the audit command
pub fn execute(engine: &ReferralEngine, output_format: OutputFormat) -> Result<String> {
    let mismatches = engine
        .audit_balances()
        .context("Failed to audit balances")?;

    if mismatches.is_empty() {
        return match output_format {
            OutputFormat::Human => Ok("Audit passed: every balance matches its ledger entries".to_string()),
            OutputFormat::Json => to_json(&mismatches),
        };
    }

    let mut report = format!("Audit failed: {} balances disagree with the ledger", mismatches.len());
    for mismatch in &mismatches {
        let _ = write!(
            report,
            "\n  {:<20} balance {:>14} ledger {:>14}",
            mismatch.member_id, mismatch.balance_total_minor, mismatch.ledger_total_minor
        );
    }
    Err(anyhow!(report))
}
