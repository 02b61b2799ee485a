//! Time source and period markers
//!
//! Ledger entries carry two period markers: the ISO payout week used for
//! running balances and payout batches, and the calendar month used for the
//! partner cap. Both are derived in UTC from the engine clock.

use chrono::{DateTime, Datelike, Utc};

/// Source of "now" for the engine
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock pinned to one instant, for fixtures and replays
#[derive(Clone, Copy, Debug)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

/// ISO payout week marker, e.g. `2026-W43`
#[must_use]
pub fn payout_week(at: DateTime<Utc>) -> String {
    let week = at.iso_week();
    format!("{}-W{:02}", week.year(), week.week())
}

/// Calendar month marker, e.g. `2026-10`
#[must_use]
pub fn calendar_month(at: DateTime<Utc>) -> String {
    format!("{}-{:02}", at.year(), at.month())
}
