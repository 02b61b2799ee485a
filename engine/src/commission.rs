//! Commission calculator
//!
//! Walks the sponsor chain of a payer level by level and pays each sponsor
//! their effective tier's rate on the payment amount. The whole walk runs on
//! the caller's transaction: either every level of the event commits or none
//! of it does.

use crate::config::EngineConfig;
use crate::constants::BASIS_POINTS_DIVISOR;
use crate::dedup::{CommissionKey, DedupKey, PaymentKey};
use crate::errors::{LedgerError, Result};
use crate::events::{CommissionLine, CommissionReport, PaymentCompleted};
use crate::graph::ReferralGraph;
use crate::ledger::{self, NewLedgerEntry, WriteOutcome};
use crate::period::{calendar_month, payout_week};
use crate::tier::{ResolvedTier, TierResolver};
use chrono::{DateTime, Utc};
use rusqlite::Connection;
use std::collections::HashSet;
use tracing::{debug, error, info, warn};

/// One sponsor reached by the walk
#[derive(Clone, Debug, PartialEq, Eq)]
struct PlannedLevel {
    level: u8,
    sponsor_id: String,
    resolved: ResolvedTier,
}

/// `floor(amount * rate / 10_000)`
pub fn commission_amount(amount_minor: u64, rate_bps: u16) -> Result<u64> {
    let amount = u128::from(amount_minor)
        .checked_mul(u128::from(rate_bps))
        .ok_or(LedgerError::Arithmetic("commission amount"))?
        .checked_div(BASIS_POINTS_DIVISOR)
        .ok_or(LedgerError::Arithmetic("commission amount"))?;
    u64::try_from(amount).map_err(|_| LedgerError::Arithmetic("commission amount"))
}

/// Split `amount` into what fits under `cap` given `already_paid` this period, and what is cut
///
/// At or above the cap nothing is paid.
#[must_use]
pub fn clamp_to_cap(amount: u64, already_paid: u64, cap: u64) -> (u64, u64) {
    let headroom = cap.saturating_sub(already_paid);
    let paid = amount.min(headroom);
    (paid, amount.saturating_sub(paid))
}

/// Apply one payment event
///
/// Sponsors are resolved before anything is written, so every level sees the
/// graph and the recruit counts as they were when the event started. An
/// event id that already committed is not walked again.
pub fn apply(
    conn: &Connection,
    event: &PaymentCompleted,
    config: &EngineConfig,
    now: DateTime<Utc>,
) -> Result<CommissionReport> {
    let payment_key = PaymentKey {
        event_id: &event.event_id,
    };
    if payment_key.exists(conn)? {
        debug!(key = %payment_key, "Payment already applied");
        return Ok(CommissionReport {
            event_id: event.event_id.clone(),
            duplicates: ledger::entry_count_for_event(conn, &event.event_id)?,
            replayed: true,
            ..CommissionReport::default()
        });
    }

    let plan = plan_walk(conn, &event.payer_id, config)?;

    let week = payout_week(now);
    let month = calendar_month(now);
    let mut report = CommissionReport {
        event_id: event.event_id.clone(),
        levels_walked: u8::try_from(plan.len()).unwrap_or(u8::MAX),
        ..CommissionReport::default()
    };

    for step in &plan {
        let rate_bps = step.resolved.rate_bps(step.level);
        if rate_bps == 0 {
            debug!(
                event_id = %event.event_id,
                sponsor = %step.sponsor_id,
                level = step.level,
                effective_tier = %step.resolved.effective_tier,
                max_payout_level = step.resolved.max_payout_level,
                "No commission at this level"
            );
            continue;
        }

        let key = CommissionKey {
            event_id: &event.event_id,
            beneficiary_id: &step.sponsor_id,
            level: step.level,
        };
        if key.exists(conn)? {
            debug!(key = %key, "Commission already recorded");
            report.duplicates = report
                .duplicates
                .checked_add(1)
                .ok_or(LedgerError::Arithmetic("duplicate count"))?;
            continue;
        }

        let gross = commission_amount(event.amount_paid_minor, rate_bps)?;
        // PARTNER CAP
        //
        // The month total is re-summed from the entries inside this
        // transaction; the write lock is held until commit.
        let (amount, clamped) = if step.resolved.is_partner {
            let already_paid = ledger::month_total(conn, &step.sponsor_id, &month)?;
            let (paid, clamped) =
                clamp_to_cap(gross, already_paid, config.partner_monthly_cap_minor);
            if clamped > 0 {
                info!(
                    sponsor = %step.sponsor_id,
                    month = %month,
                    already_paid,
                    gross,
                    paid,
                    "Partner commission clamped to monthly cap"
                );
            }
            (paid, clamped)
        } else {
            (gross, 0)
        };

        if amount == 0 {
            continue;
        }

        let entry = NewLedgerEntry {
            event_id: &event.event_id,
            beneficiary_id: &step.sponsor_id,
            payer_id: &event.payer_id,
            amount_minor: amount,
            level: step.level,
            payout_week: &week,
            period_month: &month,
            created_at: now.timestamp(),
        };
        match ledger::record_commission(conn, &entry)? {
            WriteOutcome::Inserted => {
                debug!(
                    sponsor = %step.sponsor_id,
                    level = step.level,
                    rate_bps,
                    amount,
                    "Commission recorded"
                );
                report.entries.push(CommissionLine {
                    beneficiary_id: step.sponsor_id.clone(),
                    level: step.level,
                    rate_bps,
                    amount_minor: amount,
                    clamped_minor: clamped,
                });
            }
            WriteOutcome::Duplicate => {
                report.duplicates = report
                    .duplicates
                    .checked_add(1)
                    .ok_or(LedgerError::Arithmetic("duplicate count"))?;
            }
        }
    }

    ledger::record_processed_payment(
        conn,
        &event.event_id,
        &event.payer_id,
        event.amount_paid_minor,
        report.entries.len(),
        now.timestamp(),
    )?;
    Ok(report)
}

/// Walk up from `payer_id` and resolve every sponsor reached
///
/// A missing payer or sponsor ends the chain. A revisited member aborts.
fn plan_walk(conn: &Connection, payer_id: &str, config: &EngineConfig) -> Result<Vec<PlannedLevel>> {
    let graph = ReferralGraph::new(conn);
    let resolver = TierResolver::new(&graph, config.promotion_min_recruits);

    let mut visited: HashSet<String> = HashSet::from([payer_id.to_string()]);
    let mut path = vec![payer_id.to_string()];
    let mut current = payer_id.to_string();
    let mut plan = Vec::new();

    for level in 1..=config.max_commission_levels {
        let sponsor_id = match graph.direct_sponsor(&current) {
            Ok(Some(sponsor_id)) => sponsor_id,
            Ok(None) => break,
            Err(LedgerError::NotFound(missing)) => {
                warn!(member = %missing, level, "Member not found, chain ends");
                break;
            }
            Err(e) => return Err(e),
        };

        path.push(sponsor_id.clone());
        if !visited.insert(sponsor_id.clone()) {
            let path = path.join(" -> ");
            error!(member = %sponsor_id, path = %path, "Sponsor cycle detected");
            return Err(LedgerError::CycleDetected {
                member: sponsor_id,
                path,
            });
        }

        let resolved = match resolver.resolve(&sponsor_id) {
            Ok(resolved) => resolved,
            Err(LedgerError::NotFound(missing)) => {
                warn!(sponsor = %missing, level, "Sponsor not found, chain ends");
                break;
            }
            Err(e @ LedgerError::InvalidTier(_)) => {
                error!(sponsor = %sponsor_id, error = %e, "Invalid tier on sponsor");
                return Err(e);
            }
            Err(e) => return Err(e),
        };

        plan.push(PlannedLevel {
            level,
            sponsor_id: sponsor_id.clone(),
            resolved,
        });
        current = sponsor_id;
    }

    Ok(plan)
}
