//! Points and multi-level bonus processor
//!
//! An eligible signup credits the direct referrer (depth 1) with the new
//! member's tier points and a derived commission, then walks the referrer's
//! upline one depth at a time up to the configured ceiling. Points do not
//! decay with depth; the derived commission follows the per-depth rate table.
//! Every credited member is checked against the repeating points thresholds,
//! and the referrer against the referral-count thresholds.

use crate::bonus::{self, points_bonus_candidates};
use crate::config::EngineConfig;
use crate::constants::BASIS_POINTS_DIVISOR;
use crate::errors::{LedgerError, Result};
use crate::events::{
    MemberSignedUp, MemberUpgraded, NetworkCredit, PointsCredit, SignupOutcome, UpgradeOutcome,
};
use crate::graph::ReferralGraph;
use crate::state::{LevelSummary, PointsGrant, SignupRecord, SignupStatus, Tier, TierSummary};
use crate::store::{from_sql_amount, to_sql_amount};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::HashSet;
use tracing::{debug, error, info, warn};

/// Derived commission for a signup on `tier` credited at `depth`
pub fn derived_commission(tier: Tier, depth: u8) -> Result<u64> {
    let amount = u128::from(tier.base_commission_minor())
        .checked_mul(u128::from(tier.depth_rate_bps(depth)))
        .ok_or(LedgerError::Arithmetic("derived commission"))?
        .checked_div(BASIS_POINTS_DIVISOR)
        .ok_or(LedgerError::Arithmetic("derived commission"))?;
    u64::try_from(amount).map_err(|_| LedgerError::Arithmetic("derived commission"))
}

/// Record a signup and credit the referrer network once it is eligible
pub fn on_signup(
    conn: &Connection,
    event: &MemberSignedUp,
    config: &EngineConfig,
    now: DateTime<Utc>,
) -> Result<SignupOutcome> {
    let at = now.timestamp();
    let existing = signup(conn, &event.new_member_id)?;

    match existing {
        Some(record) if record.status == SignupStatus::Eligible => {
            debug!(new_member = %event.new_member_id, "Signup already credited");
            Ok(SignupOutcome::Duplicate)
        }
        Some(record) => {
            if !event.is_eligible() {
                debug!(new_member = %event.new_member_id, "Signup still pending");
                return Ok(SignupOutcome::Pending);
            }
            mark_eligible(conn, &event.new_member_id, event.tier, at)?;
            let credit = credit_signup(conn, &record.referrer_id, &event.new_member_id, event.tier, config, at)?;
            Ok(SignupOutcome::Credited(credit))
        }
        None => {
            let eligible = event.is_eligible();
            let (status, commission) = if eligible {
                (SignupStatus::Eligible, event.tier.base_commission_minor())
            } else {
                (SignupStatus::Pending, 0)
            };
            conn.execute(
                "INSERT INTO signups
                 (new_member_id, referrer_id, tier, status, commission_minor, bonus_paid, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, 0, ?6, ?6)",
                params![
                    event.new_member_id,
                    event.referrer_id,
                    event.tier.as_str(),
                    status.as_str(),
                    to_sql_amount(commission)?,
                    at
                ],
            )?;
            if !eligible {
                info!(
                    referrer = %event.referrer_id,
                    new_member = %event.new_member_id,
                    tier = %event.tier,
                    payment_confirmed = event.payment_confirmed,
                    refund_window_elapsed = event.refund_window_elapsed,
                    "Signup recorded as pending"
                );
                return Ok(SignupOutcome::Pending);
            }
            let credit = credit_signup(conn, &event.referrer_id, &event.new_member_id, event.tier, config, at)?;
            Ok(SignupOutcome::Credited(credit))
        }
    }
}

/// Record an upgrade and credit the network when it turns a pending signup eligible
pub fn on_upgrade(
    conn: &Connection,
    event: &MemberUpgraded,
    config: &EngineConfig,
    now: DateTime<Utc>,
) -> Result<UpgradeOutcome> {
    let at = now.timestamp();
    conn.execute(
        "INSERT INTO upgrades
         (member_id, old_tier, new_tier, payment_confirmed, refund_window_elapsed, applied, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, 0, ?6)",
        params![
            event.member_id,
            event.old_tier.as_str(),
            event.new_tier.as_str(),
            event.payment_confirmed,
            event.refund_window_elapsed,
            at
        ],
    )?;
    let upgrade_id = conn.last_insert_rowid();

    if !event.qualifies() {
        debug!(
            member = %event.member_id,
            old_tier = %event.old_tier,
            new_tier = %event.new_tier,
            "Upgrade recorded without credit"
        );
        return Ok(UpgradeOutcome::Ignored);
    }

    let Some(record) = signup(conn, &event.member_id)? else {
        warn!(member = %event.member_id, "Qualifying upgrade with no recorded signup");
        return Ok(UpgradeOutcome::NoSignup);
    };
    if record.status == SignupStatus::Eligible {
        debug!(member = %event.member_id, "Signup already credited");
        return Ok(UpgradeOutcome::AlreadyCredited);
    }

    mark_eligible(conn, &event.member_id, event.new_tier, at)?;
    conn.execute(
        "UPDATE upgrades SET applied = 1 WHERE id = ?1",
        params![upgrade_id],
    )?;
    let credit = credit_signup(conn, &record.referrer_id, &event.member_id, event.new_tier, config, at)?;
    Ok(UpgradeOutcome::Credited(credit))
}

fn mark_eligible(conn: &Connection, new_member_id: &str, tier: Tier, at: i64) -> Result<()> {
    conn.execute(
        "UPDATE signups SET status = 'eligible', tier = ?2, commission_minor = ?3, updated_at = ?4
         WHERE new_member_id = ?1",
        params![
            new_member_id,
            tier.as_str(),
            to_sql_amount(tier.base_commission_minor())?,
            at
        ],
    )?;
    Ok(())
}

/// Network credit plus the referrer's referral-count milestones
fn credit_signup(
    conn: &Connection,
    referrer_id: &str,
    new_member_id: &str,
    tier: Tier,
    config: &EngineConfig,
    at: i64,
) -> Result<NetworkCredit> {
    let mut credit = credit_network(conn, referrer_id, new_member_id, tier, config.points_max_depth, at)?;
    for bonus_type in bonus::evaluate_referral_counts(conn, referrer_id, at)? {
        credit.bonuses.push((referrer_id.to_string(), bonus_type));
    }
    info!(
        referrer = %referrer_id,
        new_member = %new_member_id,
        tier = %tier,
        credited = credit.credits.len(),
        bonuses = credit.bonuses.len(),
        "Signup credited"
    );
    Ok(credit)
}

/// Credit `referrer_id` at depth 1 and its upline up to `max_depth`
///
/// Iterative; a revisited member aborts with `CycleDetected`, a missing
/// sponsor ends the walk.
pub fn credit_network(
    conn: &Connection,
    referrer_id: &str,
    new_member_id: &str,
    tier: Tier,
    max_depth: u8,
    at: i64,
) -> Result<NetworkCredit> {
    let graph = ReferralGraph::new(conn);
    let points = tier.signup_points();
    let mut credit = NetworkCredit::default();

    let mut visited: HashSet<String> = HashSet::from([new_member_id.to_string()]);
    let mut path = vec![new_member_id.to_string()];
    let mut beneficiary = referrer_id.to_string();

    for depth in 1..=max_depth {
        path.push(beneficiary.clone());
        if !visited.insert(beneficiary.clone()) {
            let path = path.join(" -> ");
            error!(member = %beneficiary, path = %path, "Sponsor cycle detected");
            return Err(LedgerError::CycleDetected {
                member: beneficiary,
                path,
            });
        }

        let commission = derived_commission(tier, depth)?;
        let (old_total, new_total) =
            grant(conn, &beneficiary, new_member_id, tier, depth, points, commission, at)?;
        debug!(
            beneficiary = %beneficiary,
            depth,
            points,
            commission,
            new_total,
            "Points granted"
        );

        let label = if depth == 1 { None } else { Some(depth) };
        let candidates = points_bonus_candidates(old_total, new_total, label);
        for bonus_type in bonus::issue_all(conn, &beneficiary, &candidates, at)? {
            credit.bonuses.push((beneficiary.clone(), bonus_type));
        }
        credit.credits.push(PointsCredit {
            beneficiary_id: beneficiary.clone(),
            depth,
            points,
            commission_minor: commission,
            new_total,
        });

        if depth == max_depth {
            break;
        }
        beneficiary = match graph.direct_sponsor(&beneficiary) {
            Ok(Some(sponsor_id)) => sponsor_id,
            Ok(None) => break,
            Err(LedgerError::NotFound(missing)) => {
                warn!(member = %missing, depth, "Member not found, points walk ends");
                break;
            }
            Err(e) => return Err(e),
        };
    }

    Ok(credit)
}

/// Accumulate one grant into every rollup and return the points total before and after
#[allow(clippy::too_many_arguments)]
fn grant(
    conn: &Connection,
    beneficiary_id: &str,
    source_member_id: &str,
    tier: Tier,
    depth: u8,
    points: u64,
    commission: u64,
    at: i64,
) -> Result<(u64, u64)> {
    let points_sql = to_sql_amount(points)?;
    let commission_sql = to_sql_amount(commission)?;

    conn.execute(
        "INSERT INTO points_grants (beneficiary_id, source_member_id, depth, points, commission_minor, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)
         ON CONFLICT(beneficiary_id, source_member_id, depth) DO UPDATE SET
             points = points + excluded.points,
             commission_minor = commission_minor + excluded.commission_minor,
             updated_at = excluded.updated_at",
        params![beneficiary_id, source_member_id, depth, points_sql, commission_sql, at],
    )?;
    conn.execute(
        "INSERT INTO level_summaries (beneficiary_id, tier, depth, points, commission_minor, grants)
         VALUES (?1, ?2, ?3, ?4, ?5, 1)
         ON CONFLICT(beneficiary_id, tier, depth) DO UPDATE SET
             points = points + excluded.points,
             commission_minor = commission_minor + excluded.commission_minor,
             grants = grants + 1",
        params![beneficiary_id, tier.as_str(), depth, points_sql, commission_sql],
    )?;
    conn.execute(
        "INSERT INTO tier_summaries (beneficiary_id, tier, points, commission_minor, grants)
         VALUES (?1, ?2, ?3, ?4, 1)
         ON CONFLICT(beneficiary_id, tier) DO UPDATE SET
             points = points + excluded.points,
             commission_minor = commission_minor + excluded.commission_minor,
             grants = grants + 1",
        params![beneficiary_id, tier.as_str(), points_sql, commission_sql],
    )?;

    let old_total = points_total(conn, beneficiary_id)?;
    conn.execute(
        "INSERT INTO points_totals (member_id, points) VALUES (?1, ?2)
         ON CONFLICT(member_id) DO UPDATE SET points = points + excluded.points",
        params![beneficiary_id, points_sql],
    )?;
    let new_total = old_total
        .checked_add(points)
        .ok_or(LedgerError::Arithmetic("points total"))?;
    Ok((old_total, new_total))
}

/// Accumulated points of `member_id`; zero when never credited
pub fn points_total(conn: &Connection, member_id: &str) -> Result<u64> {
    let points: Option<i64> = conn
        .query_row(
            "SELECT points FROM points_totals WHERE member_id = ?1",
            params![member_id],
            |row| row.get(0),
        )
        .optional()?;
    points.map_or(Ok(0), from_sql_amount)
}

/// Recorded signup of `new_member_id`, if any
pub fn signup(conn: &Connection, new_member_id: &str) -> Result<Option<SignupRecord>> {
    let row: Option<(String, String, String, i64, bool)> = conn
        .query_row(
            "SELECT referrer_id, tier, status, commission_minor, bonus_paid
             FROM signups WHERE new_member_id = ?1",
            params![new_member_id],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?)),
        )
        .optional()?;
    row.map(|(referrer_id, tier, status, commission, bonus_paid)| {
        Ok(SignupRecord {
            new_member_id: new_member_id.to_string(),
            referrer_id,
            tier: tier.parse()?,
            status: SignupStatus::parse(&status)?,
            commission_minor: from_sql_amount(commission)?,
            bonus_paid,
        })
    })
    .transpose()
}

/// Grants received by `beneficiary_id`, by depth then source
pub fn grants_for(conn: &Connection, beneficiary_id: &str) -> Result<Vec<PointsGrant>> {
    let mut stmt = conn.prepare(
        "SELECT source_member_id, depth, points, commission_minor FROM points_grants
         WHERE beneficiary_id = ?1 ORDER BY depth, source_member_id",
    )?;
    let rows = stmt
        .query_map(params![beneficiary_id], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, u8>(1)?,
                row.get::<_, i64>(2)?,
                row.get::<_, i64>(3)?,
            ))
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    rows.into_iter()
        .map(|(source_member_id, depth, points, commission)| {
            Ok(PointsGrant {
                beneficiary_id: beneficiary_id.to_string(),
                source_member_id,
                depth,
                points: from_sql_amount(points)?,
                commission_minor: from_sql_amount(commission)?,
            })
        })
        .collect()
}

/// Per-(tier, depth) rollups of `beneficiary_id`
pub fn level_summaries(conn: &Connection, beneficiary_id: &str) -> Result<Vec<LevelSummary>> {
    let mut stmt = conn.prepare(
        "SELECT tier, depth, points, commission_minor, grants FROM level_summaries
         WHERE beneficiary_id = ?1 ORDER BY depth, tier",
    )?;
    let rows = stmt
        .query_map(params![beneficiary_id], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, u8>(1)?,
                row.get::<_, i64>(2)?,
                row.get::<_, i64>(3)?,
                row.get::<_, i64>(4)?,
            ))
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    rows.into_iter()
        .map(|(tier, depth, points, commission, grants)| {
            Ok(LevelSummary {
                beneficiary_id: beneficiary_id.to_string(),
                tier: tier.parse()?,
                depth,
                points: from_sql_amount(points)?,
                commission_minor: from_sql_amount(commission)?,
                grants: from_sql_amount(grants)?,
            })
        })
        .collect()
}

/// Per-tier rollups of `beneficiary_id`, summed over depths
pub fn tier_summaries(conn: &Connection, beneficiary_id: &str) -> Result<Vec<TierSummary>> {
    let mut stmt = conn.prepare(
        "SELECT tier, points, commission_minor, grants FROM tier_summaries
         WHERE beneficiary_id = ?1 ORDER BY tier",
    )?;
    let rows = stmt
        .query_map(params![beneficiary_id], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, i64>(1)?,
                row.get::<_, i64>(2)?,
                row.get::<_, i64>(3)?,
            ))
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    rows.into_iter()
        .map(|(tier, points, commission, grants)| {
            Ok(TierSummary {
                beneficiary_id: beneficiary_id.to_string(),
                tier: tier.parse()?,
                points: from_sql_amount(points)?,
                commission_minor: from_sql_amount(commission)?,
                grants: from_sql_amount(grants)?,
            })
        })
        .collect()
}
