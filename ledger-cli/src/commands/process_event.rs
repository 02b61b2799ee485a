//! Single-event commands: payment, signup and upgrade
//!
//! Each command builds the typed event, runs it through the ingress
//! validation and hands it to the engine, so a hand-entered event follows the
//! same path as one delivered by the webhook.

use crate::commands::{to_json, OutputFormat};
use crate::config::LedgerCliConfig;
use anyhow::{Context, Result};
use referral_ledger::{
    CommissionReport, InboundEvent, MemberSignedUp, MemberUpgraded, NetworkCredit,
    PaymentCompleted, ReferralEngine, SignupOutcome, UpgradeOutcome,
};
use std::fmt::Write as _;

/// Execute the payment command
pub fn execute_payment(
    engine: &mut ReferralEngine,
    event: &PaymentCompleted,
    output_format: OutputFormat,
    config: &LedgerCliConfig,
) -> Result<String> {
    InboundEvent::PaymentCompleted(event.clone()).validate()?;

    let report = engine
        .process_payment(event)
        .with_context(|| format!("Failed to process payment '{}'", event.event_id))?;

    match output_format {
        OutputFormat::Human => Ok(format_report_human(&report, config)),
        OutputFormat::Json => to_json(&report),
    }
}

/// Execute the signup command
pub fn execute_signup(
    engine: &mut ReferralEngine,
    event: &MemberSignedUp,
    output_format: OutputFormat,
    config: &LedgerCliConfig,
) -> Result<String> {
    InboundEvent::MemberSignedUp(event.clone()).validate()?;

    let outcome = engine
        .process_signup(event)
        .with_context(|| format!("Failed to process signup of '{}'", event.new_member_id))?;

    match output_format {
        OutputFormat::Human => Ok(match &outcome {
            SignupOutcome::Credited(credit) => format!(
                "Signup of {} credited\n{}",
                event.new_member_id,
                format_credit_human(credit, config)
            ),
            SignupOutcome::Pending => format!(
                "Signup of {} recorded as pending ({} plan, payment confirmed: {}, refund window elapsed: {})",
                event.new_member_id, event.tier, event.payment_confirmed, event.refund_window_elapsed
            ),
            SignupOutcome::Duplicate => {
                format!("Signup of {} was already credited", event.new_member_id)
            }
        }),
        OutputFormat::Json => to_json(&outcome),
    }
}

/// Execute the upgrade command
pub fn execute_upgrade(
    engine: &mut ReferralEngine,
    event: &MemberUpgraded,
    output_format: OutputFormat,
    config: &LedgerCliConfig,
) -> Result<String> {
    InboundEvent::MemberUpgraded(event.clone()).validate()?;

    let outcome = engine
        .process_upgrade(event)
        .with_context(|| format!("Failed to process upgrade of '{}'", event.member_id))?;

    match output_format {
        OutputFormat::Human => Ok(match &outcome {
            UpgradeOutcome::Credited(credit) => format!(
                "Upgrade of {} from {} to {} credited\n{}",
                event.member_id,
                event.old_tier,
                event.new_tier,
                format_credit_human(credit, config)
            ),
            UpgradeOutcome::Ignored => format!(
                "Upgrade of {} recorded without credit",
                event.member_id
            ),
            UpgradeOutcome::AlreadyCredited => {
                format!("Signup of {} was already credited", event.member_id)
            }
            UpgradeOutcome::NoSignup => format!(
                "Upgrade of {} recorded, no signup on file",
                event.member_id
            ),
        }),
        OutputFormat::Json => to_json(&outcome),
    }
}

fn format_report_human(report: &CommissionReport, config: &LedgerCliConfig) -> String {
    if report.is_replay() {
        return format!(
            "Payment {} was already applied ({} entries skipped)",
            report.event_id, report.duplicates
        );
    }

    let mut output = format!(
        "Payment {} processed: {} sponsors walked, {} entries written\n",
        report.event_id,
        report.levels_walked,
        report.entries.len()
    );
    if report.entries.is_empty() {
        output.push_str("No commission payable for this payment.\n");
        return output;
    }

    let _ = writeln!(
        output,
        "{:<6} {:<24} {:>8} {:>14} {:>14}",
        "Level", "Beneficiary", "Rate %", "Amount", "Clamped"
    );
    output.push_str(&"-".repeat(70));
    output.push('\n');
    for line in &report.entries {
        let _ = writeln!(
            output,
            "{:<6} {:<24} {:>8.2} {:>14.2} {:>14.2}",
            line.level,
            line.beneficiary_id,
            config.format_rate_percentage(line.rate_bps),
            config.format_money(line.amount_minor),
            config.format_money(line.clamped_minor)
        );
    }
    if let Some(total) = report.total_minor() {
        let _ = writeln!(output, "Total: {:.2}", config.format_money(total));
    }
    output
}

fn format_credit_human(credit: &NetworkCredit, config: &LedgerCliConfig) -> String {
    let mut output = format!(
        "{:<6} {:<24} {:>8} {:>14} {:>10}\n",
        "Depth", "Beneficiary", "Points", "Commission", "Total pts"
    );
    output.push_str(&"-".repeat(66));
    output.push('\n');
    for line in &credit.credits {
        let _ = writeln!(
            output,
            "{:<6} {:<24} {:>8} {:>14.2} {:>10}",
            line.depth,
            line.beneficiary_id,
            line.points,
            config.format_money(line.commission_minor),
            line.new_total
        );
    }
    if !credit.bonuses.is_empty() {
        output.push_str("\nBonuses issued:\n");
        for (beneficiary, bonus_type) in &credit.bonuses {
            let _ = writeln!(output, "  {beneficiary:<24} {bonus_type}");
        }
    }
    output
}
