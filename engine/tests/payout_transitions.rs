//! Payout status transitions and the balance audit
//!
//! Test coverage:
//! - Marking a payout week paid only touches that week's pending entries
//! - Settling bonuses pays them and starts a new referral-count cycle
//! - The audit finds no mismatch after mixed traffic and flags tampering

mod common;

use chrono::{TimeZone, Utc};
use common::{chain, engine, engine_at, payment, signup};
use referral_ledger::{FixedClock, PayoutStatus, Tier};
use std::sync::Arc;

/// Test that one week is settled and the next stays pending
#[test]
fn test_mark_week_paid() {
    let mut engine = engine();
    chain(&mut engine, &[("s1", Tier::Gold), ("payer", Tier::Bronze)]);
    engine.process_payment(&payment("w43", "payer", 10_000)).unwrap();

    let next_week = Utc.with_ymd_and_hms(2026, 10, 27, 12, 0, 0).unwrap();
    let mut engine = engine.with_clock(Arc::new(FixedClock(next_week)));
    engine.process_payment(&payment("w44", "payer", 10_000)).unwrap();

    assert_eq!(engine.mark_week_paid("2026-W43").unwrap(), 1);

    let statuses: Vec<(String, PayoutStatus)> = engine
        .ledger_entries("s1")
        .unwrap()
        .into_iter()
        .map(|e| (e.payout_week, e.status))
        .collect();
    assert_eq!(
        statuses,
        vec![
            ("2026-W43".to_string(), PayoutStatus::Paid),
            ("2026-W44".to_string(), PayoutStatus::Pending),
        ]
    );

    let balance = engine.balance("s1").unwrap();
    assert_eq!(balance.total_minor, 6_000);
    assert_eq!(balance.period_minor, 3_000);
}

/// Test that settlement consumes signups so the next five start a new milestone
#[test]
fn test_settle_bonuses_starts_new_referral_cycle() {
    let mut engine = engine();
    chain(&mut engine, &[("ref", Tier::Gold)]);
    for i in 0..5 {
        engine
            .process_signup(&signup("ref", &format!("a{i}"), Tier::Bronze))
            .unwrap();
    }
    assert_eq!(engine.pending_bonuses().unwrap().len(), 2); // points_25_x1 + referrals_5_after_0

    let settlement = engine.settle_bonuses("ref").unwrap();
    assert_eq!(settlement.bonuses_paid, 2);
    assert_eq!(settlement.amount_minor, 3_000);
    assert_eq!(settlement.signups_consumed, 5);
    assert!(engine.pending_bonuses().unwrap().is_empty());

    for i in 0..5 {
        engine
            .process_signup(&signup("ref", &format!("b{i}"), Tier::Bronze))
            .unwrap();
    }
    let types: Vec<String> = engine
        .pending_bonuses()
        .unwrap()
        .into_iter()
        .map(|b| b.bonus_type)
        .collect();
    assert_eq!(
        types,
        vec!["points_25_x2", "points_50_x1", "referrals_5_after_5"]
    );
}

/// Test the balance audit over mixed traffic, then after tampering
#[test]
fn test_audit_balances() {
    let october = Utc.with_ymd_and_hms(2026, 10, 5, 9, 0, 0).unwrap();
    let mut engine = engine_at(october);
    chain(
        &mut engine,
        &[("p", Tier::Partner), ("g", Tier::Gold), ("s", Tier::Silver), ("payer", Tier::Bronze)],
    );
    for i in 0..20 {
        engine
            .process_payment(&payment(&format!("evt-{}", i % 7), "payer", 2_500_000))
            .unwrap();
    }
    assert!(engine.audit_balances().unwrap().is_empty());

    engine
        .store()
        .connection()
        .execute("UPDATE balances SET total_minor = total_minor + 1 WHERE member_id = 'g'", [])
        .unwrap();
    let mismatches = engine.audit_balances().unwrap();
    assert_eq!(mismatches.len(), 1);
    assert_eq!(mismatches[0].member_id, "g");
}
