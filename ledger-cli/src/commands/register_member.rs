//! Register member command implementation

use crate::commands::{to_json, OutputFormat};
use anyhow::{anyhow, Context, Result};
use referral_ledger::{Member, ReferralEngine, Tier};
use tracing::info;

/// Execute the register member command
///
/// The sponsor does not have to exist yet; a dangling sponsor simply ends
/// every walk that reaches it.
pub fn execute(
    engine: &mut ReferralEngine,
    member_id: &str,
    tier: Tier,
    sponsor_id: Option<&str>,
    output_format: OutputFormat,
) -> Result<String> {
    if member_id.trim().is_empty() {
        return Err(anyhow!("Member id must not be empty"));
    }
    if sponsor_id == Some(member_id) {
        return Err(anyhow!("A member cannot sponsor themselves"));
    }

    let member = Member {
        id: member_id.to_string(),
        tier,
        sponsor_id: sponsor_id.map(str::to_string),
    };
    engine
        .register_member(&member)
        .with_context(|| format!("Failed to register member '{member_id}'"))?;

    info!(member_id, tier = %tier, sponsor = ?sponsor_id, "Registered member");

    match output_format {
        OutputFormat::Human => Ok(format!(
            "Member registered successfully!\nMember:  {}\nTier:    {}\nSponsor: {}",
            member.id,
            member.tier,
            member.sponsor_id.as_deref().unwrap_or("-")
        )),
        OutputFormat::Json => to_json(&member),
    }
}
