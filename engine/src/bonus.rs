//! Threshold bonuses
//!
//! Bonus records are unique per `(beneficiary, bonus_type)`. Thresholds that
//! repeat are made distinct by encoding the crossing in the type string:
//! `points_25_x3` is the third time a member's total passed a multiple of 25,
//! `points_25_x3_ml_2` is the same milestone reached through a depth-2 credit,
//! and `referrals_5_after_10` is the five-signup milestone counted after ten
//! signups were already consumed by a settlement.

use crate::constants::{POINTS_BONUS_THRESHOLDS, REFERRAL_BONUS_THRESHOLDS};
use crate::dedup::{BonusKey, DedupKey};
use crate::errors::{LedgerError, Result};
use crate::state::{BonusRecord, PayoutStatus};
use crate::store::{from_sql_amount, to_sql_amount};
use rusqlite::{params, Connection, Row};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// A bonus the caller should try to issue
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BonusCandidate {
    pub bonus_type: String,
    pub amount_minor: u64,
}

/// Points milestones crossed by moving a total from `old_total` to `new_total`
///
/// Every multiple `k` of every threshold in `(old_total, new_total]` yields one
/// candidate. `depth` is `None` for the direct referrer and the credit depth
/// for upline grants.
#[must_use]
pub fn points_bonus_candidates(old_total: u64, new_total: u64, depth: Option<u8>) -> Vec<BonusCandidate> {
    let mut candidates = Vec::new();
    for (threshold, amount_minor) in POINTS_BONUS_THRESHOLDS {
        let before = old_total.checked_div(threshold).unwrap_or(0);
        let after = new_total.checked_div(threshold).unwrap_or(0);
        for crossing in before.saturating_add(1)..=after {
            let bonus_type = match depth {
                None => format!("points_{threshold}_x{crossing}"),
                Some(depth) => format!("points_{threshold}_x{crossing}_ml_{depth}"),
            };
            candidates.push(BonusCandidate {
                bonus_type,
                amount_minor,
            });
        }
    }
    candidates
}

/// Referral-count milestones reached by `unconsumed` eligible signups
#[must_use]
pub fn referral_bonus_candidates(unconsumed: u64, consumed: u64) -> Vec<BonusCandidate> {
    REFERRAL_BONUS_THRESHOLDS
        .into_iter()
        .filter(|(threshold, _)| unconsumed >= *threshold)
        .map(|(threshold, amount_minor)| BonusCandidate {
            bonus_type: format!("referrals_{threshold}_after_{consumed}"),
            amount_minor,
        })
        .collect()
}

/// Insert a pending bonus unless one of the same type already exists
///
/// Returns whether a record was written.
pub fn issue(
    conn: &Connection,
    beneficiary_id: &str,
    candidate: &BonusCandidate,
    created_at: i64,
) -> Result<bool> {
    let key = BonusKey {
        beneficiary_id,
        bonus_type: &candidate.bonus_type,
    };
    if key.exists(conn)? {
        debug!(key = %key, "Bonus already issued");
        return Ok(false);
    }
    conn.execute(
        "INSERT INTO bonus_records (beneficiary_id, bonus_type, amount_minor, status, created_at)
         VALUES (?1, ?2, ?3, 'pending', ?4)",
        params![
            beneficiary_id,
            candidate.bonus_type,
            to_sql_amount(candidate.amount_minor)?,
            created_at
        ],
    )?;
    info!(
        beneficiary = %beneficiary_id,
        bonus_type = %candidate.bonus_type,
        amount = candidate.amount_minor,
        "Bonus issued"
    );
    Ok(true)
}

/// Issue every candidate that does not exist yet and return the types written
pub fn issue_all(
    conn: &Connection,
    beneficiary_id: &str,
    candidates: &[BonusCandidate],
    created_at: i64,
) -> Result<Vec<String>> {
    let mut issued = Vec::new();
    for candidate in candidates {
        if issue(conn, beneficiary_id, candidate, created_at)? {
            issued.push(candidate.bonus_type.clone());
        }
    }
    Ok(issued)
}

fn count(conn: &Connection, sql: &str, referrer_id: &str) -> Result<u64> {
    let n: i64 = conn.query_row(sql, params![referrer_id], |row| row.get(0))?;
    u64::try_from(n).map_err(|_| LedgerError::Arithmetic("signup count"))
}

/// Check the referral-count milestones of `referrer_id` and issue any reached
pub fn evaluate_referral_counts(
    conn: &Connection,
    referrer_id: &str,
    created_at: i64,
) -> Result<Vec<String>> {
    let unconsumed = count(
        conn,
        "SELECT COUNT(*) FROM signups WHERE referrer_id = ?1 AND status = 'eligible' AND bonus_paid = 0",
        referrer_id,
    )?;
    let consumed = count(
        conn,
        "SELECT COUNT(*) FROM signups WHERE referrer_id = ?1 AND bonus_paid = 1",
        referrer_id,
    )?;
    let candidates = referral_bonus_candidates(unconsumed, consumed);
    issue_all(conn, referrer_id, &candidates, created_at)
}

/// What one settlement moved
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settlement {
    pub beneficiary_id: String,
    pub bonuses_paid: u64,
    pub amount_minor: u64,
    /// Eligible signups consumed for the next referral-count cycle
    pub signups_consumed: u64,
}

/// Pay out every pending bonus of `beneficiary_id`
///
/// When a referral-count bonus is among them, the beneficiary's eligible
/// signups are consumed and the count starts again from zero.
pub fn settle(conn: &Connection, beneficiary_id: &str) -> Result<Settlement> {
    let pending: Vec<BonusRecord> = bonuses_for(conn, beneficiary_id)?
        .into_iter()
        .filter(|record| record.status == PayoutStatus::Pending)
        .collect();

    let mut settlement = Settlement {
        beneficiary_id: beneficiary_id.to_string(),
        ..Settlement::default()
    };
    if pending.is_empty() {
        return Ok(settlement);
    }

    for record in &pending {
        settlement.amount_minor = settlement
            .amount_minor
            .checked_add(record.amount_minor)
            .ok_or(LedgerError::Arithmetic("settlement amount"))?;
    }
    let paid = conn.execute(
        "UPDATE bonus_records SET status = 'paid' WHERE beneficiary_id = ?1 AND status = 'pending'",
        params![beneficiary_id],
    )?;
    settlement.bonuses_paid = u64::try_from(paid).map_err(|_| LedgerError::Arithmetic("bonus count"))?;

    if pending.iter().any(|record| record.bonus_type.starts_with("referrals_")) {
        let consumed = conn.execute(
            "UPDATE signups SET bonus_paid = 1
             WHERE referrer_id = ?1 AND status = 'eligible' AND bonus_paid = 0",
            params![beneficiary_id],
        )?;
        settlement.signups_consumed =
            u64::try_from(consumed).map_err(|_| LedgerError::Arithmetic("signup count"))?;
    }

    info!(
        beneficiary = %beneficiary_id,
        bonuses = settlement.bonuses_paid,
        amount = settlement.amount_minor,
        signups_consumed = settlement.signups_consumed,
        "Bonuses settled"
    );
    Ok(settlement)
}

const BONUS_COLUMNS: &str = "id, beneficiary_id, bonus_type, amount_minor, status, created_at";

struct StoredBonus {
    record: BonusRecord,
    amount: i64,
    status: String,
}

fn bonus_from_row(row: &Row<'_>) -> rusqlite::Result<StoredBonus> {
    Ok(StoredBonus {
        record: BonusRecord {
            id: row.get(0)?,
            beneficiary_id: row.get(1)?,
            bonus_type: row.get(2)?,
            amount_minor: 0,
            status: PayoutStatus::Pending,
            created_at: row.get(5)?,
        },
        amount: row.get(3)?,
        status: row.get(4)?,
    })
}

fn collect_bonuses(rows: Vec<StoredBonus>) -> Result<Vec<BonusRecord>> {
    rows.into_iter()
        .map(|stored| {
            let mut record = stored.record;
            record.amount_minor = from_sql_amount(stored.amount)?;
            record.status = PayoutStatus::parse(&stored.status)?;
            Ok(record)
        })
        .collect()
}

/// Every bonus of `beneficiary_id`, oldest first
pub fn bonuses_for(conn: &Connection, beneficiary_id: &str) -> Result<Vec<BonusRecord>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {BONUS_COLUMNS} FROM bonus_records WHERE beneficiary_id = ?1 ORDER BY id"
    ))?;
    let rows = stmt
        .query_map(params![beneficiary_id], bonus_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    collect_bonuses(rows)
}

/// Every pending bonus across all members, oldest first
pub fn pending_bonuses(conn: &Connection) -> Result<Vec<BonusRecord>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {BONUS_COLUMNS} FROM bonus_records WHERE status = 'pending' ORDER BY id"
    ))?;
    let rows = stmt
        .query_map([], bonus_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    collect_bonuses(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Store;

    fn types(candidates: &[BonusCandidate]) -> Vec<&str> {
        candidates.iter().map(|c| c.bonus_type.as_str()).collect()
    }

    fn store() -> Store {
        let store = Store::in_memory().unwrap();
        store.migrate().unwrap();
        store
    }

    #[test]
    fn test_first_crossing_of_25() {
        let candidates = points_bonus_candidates(20, 30, None);
        assert_eq!(types(&candidates), vec!["points_25_x1"]);
        assert_eq!(candidates[0].amount_minor, 500);
    }

    #[test]
    fn test_large_jump_crosses_every_multiple() {
        let candidates = points_bonus_candidates(0, 100, None);
        assert_eq!(
            types(&candidates),
            vec![
                "points_25_x1",
                "points_25_x2",
                "points_25_x3",
                "points_25_x4",
                "points_50_x1",
                "points_50_x2",
                "points_100_x1",
            ]
        );
    }

    #[test]
    fn test_upline_types_carry_depth() {
        let candidates = points_bonus_candidates(40, 50, Some(2));
        assert_eq!(types(&candidates), vec!["points_25_x2_ml_2", "points_50_x1_ml_2"]);
    }

    #[test]
    fn test_no_crossing_no_candidates() {
        assert!(points_bonus_candidates(26, 49, None).is_empty());
        assert!(points_bonus_candidates(50, 50, None).is_empty());
    }

    #[test]
    fn test_referral_candidates_after_consumed() {
        let candidates = referral_bonus_candidates(25, 5);
        assert_eq!(
            types(&candidates),
            vec!["referrals_5_after_5", "referrals_25_after_5"]
        );
        assert!(referral_bonus_candidates(4, 0).is_empty());
    }

    #[test]
    fn test_issue_is_idempotent() {
        let store = store();
        let conn = store.connection();
        let candidate = BonusCandidate {
            bonus_type: "points_25_x1".to_string(),
            amount_minor: 500,
        };

        assert!(issue(conn, "s1", &candidate, 0).unwrap());
        assert!(!issue(conn, "s1", &candidate, 0).unwrap());
        assert!(issue(conn, "s2", &candidate, 0).unwrap());

        assert_eq!(bonuses_for(conn, "s1").unwrap().len(), 1);
        assert_eq!(pending_bonuses(conn).unwrap().len(), 2);
    }

    #[test]
    fn test_settle_consumes_signups_for_referral_bonus() {
        let store = store();
        let conn = store.connection();
        for i in 0..5 {
            conn.execute(
                "INSERT INTO signups (new_member_id, referrer_id, tier, status, commission_minor, created_at, updated_at)
                 VALUES (?1, 'r', 'GOLD', 'eligible', 5000, 0, 0)",
                params![format!("n{i}")],
            )
            .unwrap();
        }

        let issued = evaluate_referral_counts(conn, "r", 0).unwrap();
        assert_eq!(issued, vec!["referrals_5_after_0"]);
        assert!(evaluate_referral_counts(conn, "r", 0).unwrap().is_empty());

        let settlement = settle(conn, "r").unwrap();
        assert_eq!(settlement.bonuses_paid, 1);
        assert_eq!(settlement.amount_minor, 2_500);
        assert_eq!(settlement.signups_consumed, 5);

        // consumed signups no longer count toward the next cycle
        assert!(evaluate_referral_counts(conn, "r", 0).unwrap().is_empty());
        assert!(pending_bonuses(conn).unwrap().is_empty());
    }

    #[test]
    fn test_settle_without_pending_is_noop() {
        let store = store();
        let settlement = settle(store.connection(), "nobody").unwrap();
        assert_eq!(settlement.bonuses_paid, 0);
        assert_eq!(settlement.amount_minor, 0);
    }
}
