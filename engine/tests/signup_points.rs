//! Points network credit and threshold bonuses on signup
//!
//! Test coverage:
//! - DIAMOND signup: referrer gets the DIAMOND points and 35% derived commission,
//!   depth 2 gets 10% of base, depth 4 gets nothing
//! - Pending signups credit nothing until confirmed
//! - Points thresholds issue one bonus per crossing, per depth for upline credits
//! - Rapid signups crossing the same threshold yield a single bonus
//! - Referral-count milestones
//! - Tier rollups sum grants that reach one member at different depths

mod common;

use common::{chain, count_rows, engine, signup};
use referral_ledger::{MemberSignedUp, SignupOutcome, SignupStatus, Tier};

fn network(engine: &mut referral_ledger::ReferralEngine) {
    chain(
        engine,
        &[
            ("u4", Tier::Gold),
            ("u3", Tier::Gold),
            ("u2", Tier::Gold),
            ("ref", Tier::Silver),
        ],
    );
}

fn bonus_types(engine: &referral_ledger::ReferralEngine, member: &str) -> Vec<String> {
    engine
        .bonus_records(member)
        .unwrap()
        .into_iter()
        .map(|b| b.bonus_type)
        .collect()
}

/// Test the DIAMOND signup scenario down to the depth ceiling
#[test]
fn test_diamond_signup_credits_three_depths() {
    let mut engine = engine();
    network(&mut engine);

    let outcome = engine.process_signup(&signup("ref", "new", Tier::Diamond)).unwrap();
    let SignupOutcome::Credited(credit) = outcome else {
        panic!("Eligible signup must credit, got {outcome:?}");
    };

    let reached: Vec<(&str, u8, u64, u64)> = credit
        .credits
        .iter()
        .map(|c| (c.beneficiary_id.as_str(), c.depth, c.points, c.commission_minor))
        .collect();
    assert_eq!(
        reached,
        vec![("ref", 1, 40, 3_500), ("u2", 2, 40, 1_000), ("u3", 3, 40, 500)]
    );

    assert_eq!(engine.points_total("ref").unwrap(), 40);
    assert_eq!(engine.points_total("u2").unwrap(), 40);
    assert_eq!(engine.points_total("u4").unwrap(), 0, "Depth 4 is past the ceiling");
    assert!(engine.points_grants("u4").unwrap().is_empty());

    let grants = engine.points_grants("u2").unwrap();
    assert_eq!(grants.len(), 1);
    assert_eq!(grants[0].source_member_id, "new");
    assert_eq!(grants[0].commission_minor, 1_000);

    let summaries = engine.level_summaries("u3").unwrap();
    assert_eq!(summaries.len(), 1);
    assert_eq!(summaries[0].tier, Tier::Diamond);
    assert_eq!(summaries[0].depth, 3);

    assert_eq!(bonus_types(&engine, "ref"), vec!["points_25_x1"]);
    assert_eq!(bonus_types(&engine, "u2"), vec!["points_25_x1_ml_2"]);
    assert_eq!(bonus_types(&engine, "u3"), vec!["points_25_x1_ml_3"]);
    assert!(bonus_types(&engine, "u4").is_empty());
}

/// Test that unconfirmed signups are recorded but credit nothing
#[test]
fn test_unconfirmed_signup_stays_pending() {
    let mut engine = engine();
    network(&mut engine);

    let unconfirmed = MemberSignedUp {
        refund_window_elapsed: false,
        ..signup("ref", "new", Tier::Gold)
    };
    let outcome = engine.process_signup(&unconfirmed).unwrap();

    assert_eq!(outcome, SignupOutcome::Pending);
    let record = engine.signup("new").unwrap().unwrap();
    assert_eq!(record.status, SignupStatus::Pending);
    assert_eq!(engine.points_total("ref").unwrap(), 0);
    assert_eq!(count_rows(&engine, "points_grants"), 0);
}

/// Test that a FREE signup is never eligible on its own
#[test]
fn test_free_signup_waits_for_upgrade() {
    let mut engine = engine();
    network(&mut engine);

    let outcome = engine.process_signup(&signup("ref", "new", Tier::Free)).unwrap();
    assert_eq!(outcome, SignupOutcome::Pending);
}

/// Test that redelivered signups do not credit twice
#[test]
fn test_redelivered_signup_is_duplicate() {
    let mut engine = engine();
    network(&mut engine);

    engine.process_signup(&signup("ref", "new", Tier::Gold)).unwrap();
    let again = engine.process_signup(&signup("ref", "new", Tier::Gold)).unwrap();

    assert_eq!(again, SignupOutcome::Duplicate);
    assert_eq!(engine.points_total("ref").unwrap(), 20);
    assert_eq!(engine.points_total("u2").unwrap(), 20);
}

/// Test that two signups both pushing past 25 points issue one bonus
#[test]
fn test_threshold_bonus_issued_once() {
    let mut engine = engine();
    network(&mut engine);

    engine.process_signup(&signup("ref", "a", Tier::Gold)).unwrap(); // 20
    engine.process_signup(&signup("ref", "b", Tier::Silver)).unwrap(); // 30, crosses 25
    engine.process_signup(&signup("ref", "c", Tier::Bronze)).unwrap(); // 35

    let records = engine.bonus_records("ref").unwrap();
    let crossings = records
        .iter()
        .filter(|b| b.bonus_type == "points_25_x1")
        .count();
    assert_eq!(crossings, 1, "Exactly one pending bonus per type");
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].amount_minor, 500);
}

/// Test that the same milestone fires again on the next multiple
#[test]
fn test_repeating_threshold_keys_by_crossing() {
    let mut engine = engine();
    network(&mut engine);

    engine.process_signup(&signup("ref", "a", Tier::Diamond)).unwrap(); // 40
    engine.process_signup(&signup("ref", "b", Tier::Diamond)).unwrap(); // 80

    assert_eq!(
        bonus_types(&engine, "ref"),
        vec!["points_25_x1", "points_25_x2", "points_25_x3", "points_50_x1"]
    );
}

/// Test the five-signup referral milestone
#[test]
fn test_referral_count_bonus_after_five_signups() {
    let mut engine = engine();
    network(&mut engine);

    for i in 0..6 {
        engine
            .process_signup(&signup("ref", &format!("n{i}"), Tier::Bronze))
            .unwrap();
    }

    let referral_bonuses: Vec<String> = bonus_types(&engine, "ref")
        .into_iter()
        .filter(|t| t.starts_with("referrals_"))
        .collect();
    assert_eq!(referral_bonuses, vec!["referrals_5_after_0"]);
}

/// Test that two same-tier signups reaching one member at depths 1 and 2 share a tier rollup
#[test]
fn test_tier_summary_accumulates_across_depths() {
    let mut engine = engine();
    network(&mut engine);

    // n1 reaches u2 at depth 2, n2 reaches u2 directly
    engine.process_signup(&signup("ref", "n1", Tier::Diamond)).unwrap();
    engine.process_signup(&signup("u2", "n2", Tier::Diamond)).unwrap();

    let levels = engine.level_summaries("u2").unwrap();
    let depths: Vec<u8> = levels.iter().map(|l| l.depth).collect();
    assert_eq!(depths, vec![1, 2]);

    let tiers = engine.tier_summaries("u2").unwrap();
    assert_eq!(tiers.len(), 1);
    assert_eq!(tiers[0].beneficiary_id, "u2");
    assert_eq!(tiers[0].tier, Tier::Diamond);
    assert_eq!(tiers[0].points, 80);
    assert_eq!(tiers[0].commission_minor, 4_500);
    assert_eq!(tiers[0].grants, 2);
    assert_eq!(
        tiers[0].points,
        levels.iter().map(|l| l.points).sum::<u64>(),
        "Tier rollup agrees with the per-depth rollup"
    );

    assert!(engine.tier_summaries("u4").unwrap().is_empty());
}
