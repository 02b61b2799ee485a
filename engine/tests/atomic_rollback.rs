//! All-or-nothing event processing
//!
//! Test coverage:
//! - A sponsor cycle aborts the payment with no entries written
//! - An invalid tier code aborts the payment, including levels below it
//! - A cycle found mid points walk rolls back the signup and every grant
//! - Once the data is repaired, redelivery applies the event in full

mod common;

use common::{add, chain, count_rows, engine, payment, signup};
use referral_ledger::{LedgerError, SignupOutcome, Tier};

/// Test that a cycle is surfaced and nothing is written
#[test]
fn test_cycle_aborts_payment() {
    let mut engine = engine();
    add(&mut engine, "a", Tier::Gold, Some("b"));
    add(&mut engine, "b", Tier::Gold, Some("a"));
    add(&mut engine, "payer", Tier::Bronze, Some("a"));

    let result = engine.process_payment(&payment("evt-1", "payer", 10_000));

    let Err(error) = result else {
        panic!("Cycle must abort the event");
    };
    assert!(matches!(error, LedgerError::CycleDetected { .. }));
    assert!(error.is_data_corruption());
    assert!(!error.is_retryable());
    assert_eq!(count_rows(&engine, "ledger_entries"), 0);
    assert_eq!(count_rows(&engine, "balances"), 0);
}

/// Test that an unknown tier deep in the chain aborts the whole event
#[test]
fn test_invalid_tier_aborts_payment() {
    let mut engine = engine();
    chain(&mut engine, &[("s2", Tier::Gold), ("s1", Tier::Silver), ("payer", Tier::Bronze)]);
    engine
        .store()
        .connection()
        .execute("UPDATE members SET tier = 'PLATINUM' WHERE id = 's2'", [])
        .unwrap();

    let result = engine.process_payment(&payment("evt-1", "payer", 10_000));

    assert!(matches!(result, Err(LedgerError::InvalidTier(code)) if code == "PLATINUM"));
    assert!(
        engine.ledger_entries("s1").unwrap().is_empty(),
        "Level 1 must not persist when level 2 fails"
    );
}

/// Test that a cycle found mid walk rolls back the signup record and all grants
#[test]
fn test_cycle_rolls_back_points_walk() {
    let mut engine = engine();
    chain(&mut engine, &[("u3", Tier::Gold), ("u2", Tier::Gold), ("ref", Tier::Gold)]);
    // ref -> u2 -> ref
    add(&mut engine, "u2", Tier::Gold, Some("ref"));

    let result = engine.process_signup(&signup("ref", "new", Tier::Gold));

    assert!(matches!(result, Err(LedgerError::CycleDetected { .. })));
    assert!(engine.signup("new").unwrap().is_none());
    assert_eq!(count_rows(&engine, "points_grants"), 0);
    assert_eq!(count_rows(&engine, "points_totals"), 0);
    assert_eq!(count_rows(&engine, "bonus_records"), 0);

    // repair the graph; the redelivered event now applies in full
    add(&mut engine, "u2", Tier::Gold, Some("u3"));
    let outcome = engine.process_signup(&signup("ref", "new", Tier::Gold)).unwrap();
    assert!(matches!(outcome, SignupOutcome::Credited(_)));
    assert_eq!(engine.points_total("ref").unwrap(), 20);
    assert_eq!(engine.points_total("u3").unwrap(), 20);
}
