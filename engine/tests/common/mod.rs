//! Shared fixtures for the engine integration tests

#![allow(dead_code)]

use chrono::{DateTime, TimeZone, Utc};
use referral_ledger::{
    EngineConfig, FixedClock, Member, MemberSignedUp, MemberUpgraded, PaymentCompleted,
    ReferralEngine, Tier,
};
use std::sync::Arc;

/// Monday of ISO week 2026-W43
pub fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 10, 19, 12, 0, 0).unwrap()
}

pub fn engine() -> ReferralEngine {
    engine_at(now())
}

pub fn engine_at(at: DateTime<Utc>) -> ReferralEngine {
    ReferralEngine::in_memory(EngineConfig::default())
        .unwrap()
        .with_clock(Arc::new(FixedClock(at)))
}

pub fn add(engine: &mut ReferralEngine, id: &str, tier: Tier, sponsor: Option<&str>) {
    engine
        .register_member(&Member {
            id: id.to_string(),
            tier,
            sponsor_id: sponsor.map(str::to_string),
        })
        .unwrap();
}

/// Register `ids` so that each one sponsors the next; the first has no sponsor
pub fn chain(engine: &mut ReferralEngine, ids: &[(&str, Tier)]) {
    let mut sponsor: Option<&str> = None;
    for (id, tier) in ids {
        add(engine, id, *tier, sponsor);
        sponsor = Some(id);
    }
}

pub fn payment(event_id: &str, payer: &str, amount_minor: u64) -> PaymentCompleted {
    PaymentCompleted {
        event_id: event_id.to_string(),
        payer_id: payer.to_string(),
        amount_paid_minor: amount_minor,
    }
}

pub fn signup(referrer: &str, new_member: &str, tier: Tier) -> MemberSignedUp {
    MemberSignedUp {
        referrer_id: referrer.to_string(),
        new_member_id: new_member.to_string(),
        tier,
        payment_confirmed: true,
        refund_window_elapsed: true,
    }
}

pub fn upgrade(member: &str, old_tier: Tier, new_tier: Tier) -> MemberUpgraded {
    MemberUpgraded {
        member_id: member.to_string(),
        old_tier,
        new_tier,
        payment_confirmed: true,
        refund_window_elapsed: true,
    }
}

pub fn count_rows(engine: &ReferralEngine, table: &str) -> i64 {
    engine
        .store()
        .connection()
        .query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| row.get(0))
        .unwrap()
}
