//! FREE sponsor promotion
//!
//! Test coverage:
//! - Two BRONZE direct recruits promote a FREE sponsor to the BRONZE level-1 rate
//! - One BRONZE recruit (or recruits on other plans) does not
//! - The promotion never extends past level 1
//! - The sponsor's stored tier is untouched

mod common;

use common::{add, engine, payment};
use referral_ledger::Tier;

/// Test that exactly two qualifying recruits promote the sponsor
#[test]
fn test_two_bronze_recruits_promote() {
    let mut engine = engine();
    add(&mut engine, "free", Tier::Free, None);
    add(&mut engine, "r1", Tier::Bronze, Some("free"));
    add(&mut engine, "r2", Tier::Bronze, Some("free"));
    add(&mut engine, "payer", Tier::Gold, Some("free"));

    let report = engine.process_payment(&payment("evt-1", "payer", 10_000)).unwrap();

    assert_eq!(report.entries.len(), 1);
    assert_eq!(report.entries[0].beneficiary_id, "free");
    assert_eq!(report.entries[0].rate_bps, 3_000);
    assert_eq!(report.entries[0].amount_minor, 3_000);
    assert_eq!(engine.member("free").unwrap().tier, Tier::Free, "Promotion is not persisted");
}

/// Test that one qualifying recruit is not enough
#[test]
fn test_one_bronze_recruit_pays_nothing() {
    let mut engine = engine();
    add(&mut engine, "free", Tier::Free, None);
    add(&mut engine, "r1", Tier::Bronze, Some("free"));
    add(&mut engine, "r2", Tier::Silver, Some("free"));
    add(&mut engine, "payer", Tier::Gold, Some("free"));

    let report = engine.process_payment(&payment("evt-1", "payer", 10_000)).unwrap();

    assert!(report.entries.is_empty());
    assert_eq!(engine.balance("free").unwrap().total_minor, 0);
}

/// Test that a promoted sponsor reached at level 2 receives nothing
#[test]
fn test_promotion_only_applies_at_level_one() {
    let mut engine = engine();
    add(&mut engine, "free", Tier::Free, None);
    add(&mut engine, "r1", Tier::Bronze, Some("free"));
    add(&mut engine, "r2", Tier::Bronze, Some("free"));
    add(&mut engine, "payer", Tier::Gold, Some("r1"));

    let report = engine.process_payment(&payment("evt-1", "payer", 10_000)).unwrap();

    let paid: Vec<(&str, u8)> = report
        .entries
        .iter()
        .map(|e| (e.beneficiary_id.as_str(), e.level))
        .collect();
    assert_eq!(paid, vec![("r1", 1)]);
}

/// Test that a recruit upgrading to BRONZE promotes the sponsor for the next payment
#[test]
fn test_promotion_follows_current_recruit_tiers() {
    let mut engine = engine();
    add(&mut engine, "free", Tier::Free, None);
    add(&mut engine, "r1", Tier::Bronze, Some("free"));
    add(&mut engine, "r2", Tier::Free, Some("free"));
    add(&mut engine, "payer", Tier::Gold, Some("free"));

    let before = engine.process_payment(&payment("evt-1", "payer", 10_000)).unwrap();
    assert!(before.entries.is_empty());

    add(&mut engine, "r2", Tier::Bronze, Some("free"));
    let after = engine.process_payment(&payment("evt-2", "payer", 10_000)).unwrap();
    assert_eq!(after.entries.len(), 1);
    assert_eq!(after.entries[0].amount_minor, 3_000);
}
