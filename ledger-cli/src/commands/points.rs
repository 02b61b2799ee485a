//! Points command implementation
//!
//! Shows a member's points total together with the per-depth rollup and the
//! individual grants behind it.

use crate::commands::{to_json, OutputFormat};
use crate::config::LedgerCliConfig;
use anyhow::{Context, Result};
use referral_ledger::{LevelSummary, PointsGrant, ReferralEngine, TierSummary};
use serde::Serialize;
use std::fmt::Write as _;

#[derive(Clone, Debug, Serialize)]
pub struct PointsView {
    pub member_id: String,
    pub total_points: u64,
    pub tiers: Vec<TierSummary>,
    pub levels: Vec<LevelSummary>,
    pub grants: Vec<PointsGrant>,
}

/// Execute the points command
pub fn execute(
    engine: &ReferralEngine,
    member_id: &str,
    output_format: OutputFormat,
    config: &LedgerCliConfig,
) -> Result<String> {
    let view = PointsView {
        member_id: member_id.to_string(),
        total_points: engine
            .points_total(member_id)
            .with_context(|| format!("Failed to read points of '{member_id}'"))?,
        tiers: engine.tier_summaries(member_id)?,
        levels: engine.level_summaries(member_id)?,
        grants: engine.points_grants(member_id)?,
    };

    match output_format {
        OutputFormat::Human => Ok(format_points_human(&view, config)),
        OutputFormat::Json => to_json(&view),
    }
}

fn format_points_human(view: &PointsView, config: &LedgerCliConfig) -> String {
    let mut output = format!(
        "Points for {}: {}\n{}\n",
        view.member_id,
        view.total_points,
        "=".repeat(50)
    );
    if view.levels.is_empty() {
        output.push_str("No points credited yet.");
        return output;
    }

    let _ = writeln!(
        output,
        "{:<10} {:>8} {:>14} {:>8}",
        "Tier", "Points", "Commission", "Grants"
    );
    for tier in &view.tiers {
        let _ = writeln!(
            output,
            "{:<10} {:>8} {:>14.2} {:>8}",
            tier.tier.as_str(),
            tier.points,
            config.format_money(tier.commission_minor),
            tier.grants
        );
    }

    output.push_str("\nBy depth:\n");
    let _ = writeln!(
        output,
        "{:<10} {:>6} {:>8} {:>14} {:>8}",
        "Tier", "Depth", "Points", "Commission", "Grants"
    );
    for level in &view.levels {
        let _ = writeln!(
            output,
            "{:<10} {:>6} {:>8} {:>14.2} {:>8}",
            level.tier.as_str(),
            level.depth,
            level.points,
            config.format_money(level.commission_minor),
            level.grants
        );
    }

    output.push_str("\nGrants:\n");
    for grant in &view.grants {
        let _ = writeln!(
            output,
            "  depth {} from {:<20} {:>6} pts {:>12.2}",
            grant.depth,
            grant.source_member_id,
            grant.points,
            config.format_money(grant.commission_minor)
        );
    }
    output
}
