//! Engine facade
//!
//! `ReferralEngine` owns one store connection and runs every event in its own
//! `BEGIN IMMEDIATE` transaction. Workers that process events in parallel each
//! open their own engine on the same database file; SQLite serializes the
//! writers.

use crate::bonus::{self, Settlement};
use crate::commission;
use crate::config::EngineConfig;
use crate::errors::Result;
use crate::events::{
    CommissionReport, MemberSignedUp, MemberUpgraded, PaymentCompleted, SignupOutcome,
    UpgradeOutcome,
};
use crate::graph::{upsert_member, ReferralGraph};
use crate::ledger::{self, BalanceMismatch};
use crate::period::{payout_week, Clock, SystemClock};
use crate::points;
use crate::state::{
    Balance, BonusRecord, LedgerEntry, LevelSummary, Member, PointsGrant, SignupRecord, TierSummary,
};
use crate::store::Store;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

pub struct ReferralEngine {
    store: Store,
    config: EngineConfig,
    clock: Arc<dyn Clock>,
}

impl ReferralEngine {
    /// Open the database named by `config` (in memory when it names none) and apply the schema
    pub fn open(config: EngineConfig) -> Result<Self> {
        config.validate()?;
        let store = match &config.database_path {
            Some(path) => Store::open(path, Duration::from_millis(config.busy_timeout_ms))?,
            None => Store::in_memory()?,
        };
        store.migrate()?;
        info!(
            database = config.database_path.as_deref().unwrap_or(":memory:"),
            partner_cap = config.partner_monthly_cap_minor,
            max_levels = config.max_commission_levels,
            points_depth = config.points_max_depth,
            "Referral engine ready"
        );
        Ok(Self {
            store,
            config,
            clock: Arc::new(SystemClock),
        })
    }

    /// In-memory engine; `database_path` is ignored
    pub fn in_memory(config: EngineConfig) -> Result<Self> {
        Self::open(EngineConfig {
            database_path: None,
            ..config
        })
    }

    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    #[must_use]
    pub const fn config(&self) -> &EngineConfig {
        &self.config
    }

    #[must_use]
    pub const fn store(&self) -> &Store {
        &self.store
    }

    /// Insert or update a member and its sponsor link
    pub fn register_member(&mut self, member: &Member) -> Result<()> {
        let created_at = self.clock.now().timestamp();
        let tx = self.store.begin()?;
        upsert_member(&tx, member, created_at)?;
        tx.commit()?;
        Ok(())
    }

    /// Pay commission up the payer's sponsor chain
    ///
    /// Redelivering the same `event_id` writes nothing new.
    pub fn process_payment(&mut self, event: &PaymentCompleted) -> Result<CommissionReport> {
        let now = self.clock.now();
        let tx = self.store.begin()?;
        let report = commission::apply(&tx, event, &self.config, now).inspect_err(|e| {
            warn!(event_id = %event.event_id, error = %e, "Payment rolled back");
        })?;
        tx.commit()?;

        info!(
            event_id = %event.event_id,
            payer = %event.payer_id,
            amount = event.amount_paid_minor,
            levels = report.levels_walked,
            entries = report.entries.len(),
            duplicates = report.duplicates,
            "Payment processed"
        );
        Ok(report)
    }

    pub fn process_signup(&mut self, event: &MemberSignedUp) -> Result<SignupOutcome> {
        let now = self.clock.now();
        let tx = self.store.begin()?;
        let outcome = points::on_signup(&tx, event, &self.config, now).inspect_err(|e| {
            warn!(new_member = %event.new_member_id, error = %e, "Signup rolled back");
        })?;
        tx.commit()?;
        Ok(outcome)
    }

    pub fn process_upgrade(&mut self, event: &MemberUpgraded) -> Result<UpgradeOutcome> {
        let now = self.clock.now();
        let tx = self.store.begin()?;
        let outcome = points::on_upgrade(&tx, event, &self.config, now).inspect_err(|e| {
            warn!(member = %event.member_id, error = %e, "Upgrade rolled back");
        })?;
        tx.commit()?;
        Ok(outcome)
    }

    /// Move every pending ledger entry of `payout_week` to paid
    pub fn mark_week_paid(&mut self, payout_week: &str) -> Result<usize> {
        let tx = self.store.begin()?;
        let updated = ledger::mark_week_paid(&tx, payout_week)?;
        tx.commit()?;
        info!(payout_week, entries = updated, "Payout week marked paid");
        Ok(updated)
    }

    pub fn settle_bonuses(&mut self, beneficiary_id: &str) -> Result<Settlement> {
        let tx = self.store.begin()?;
        let settlement = bonus::settle(&tx, beneficiary_id)?;
        tx.commit()?;
        Ok(settlement)
    }

    /// Balance with the period total as of the current payout week
    pub fn balance(&self, member_id: &str) -> Result<Balance> {
        let week = payout_week(self.clock.now());
        ledger::balance(self.store.connection(), member_id, &week)
    }

    pub fn member(&self, member_id: &str) -> Result<Member> {
        ReferralGraph::new(self.store.connection()).member(member_id)
    }

    pub fn ledger_entries(&self, beneficiary_id: &str) -> Result<Vec<LedgerEntry>> {
        ledger::entries_for_beneficiary(self.store.connection(), beneficiary_id)
    }

    pub fn entries_for_event(&self, event_id: &str) -> Result<Vec<LedgerEntry>> {
        ledger::entries_for_event(self.store.connection(), event_id)
    }

    pub fn bonus_records(&self, beneficiary_id: &str) -> Result<Vec<BonusRecord>> {
        bonus::bonuses_for(self.store.connection(), beneficiary_id)
    }

    /// Pending bonuses across all members, for the notification flow
    pub fn pending_bonuses(&self) -> Result<Vec<BonusRecord>> {
        bonus::pending_bonuses(self.store.connection())
    }

    pub fn points_total(&self, member_id: &str) -> Result<u64> {
        points::points_total(self.store.connection(), member_id)
    }

    pub fn points_grants(&self, beneficiary_id: &str) -> Result<Vec<PointsGrant>> {
        points::grants_for(self.store.connection(), beneficiary_id)
    }

    pub fn level_summaries(&self, beneficiary_id: &str) -> Result<Vec<LevelSummary>> {
        points::level_summaries(self.store.connection(), beneficiary_id)
    }

    pub fn tier_summaries(&self, beneficiary_id: &str) -> Result<Vec<TierSummary>> {
        points::tier_summaries(self.store.connection(), beneficiary_id)
    }

    pub fn signup(&self, new_member_id: &str) -> Result<Option<SignupRecord>> {
        points::signup(self.store.connection(), new_member_id)
    }

    /// Beneficiaries whose running total disagrees with their ledger entries
    pub fn audit_balances(&self) -> Result<Vec<BalanceMismatch>> {
        let mismatches = ledger::audit_balances(self.store.connection())?;
        if !mismatches.is_empty() {
            warn!(count = mismatches.len(), "Balance audit found mismatches");
        }
        Ok(mismatches)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::period::FixedClock;
    use crate::state::Tier;
    use chrono::{TimeZone, Utc};

    #[test]
    fn test_open_rejects_invalid_config() {
        let config = EngineConfig {
            max_commission_levels: 0,
            ..EngineConfig::default()
        };
        assert!(ReferralEngine::in_memory(config).is_err());
    }

    #[test]
    fn test_balance_period_follows_clock() {
        let at = Utc.with_ymd_and_hms(2026, 10, 19, 12, 0, 0).unwrap();
        let mut engine = ReferralEngine::in_memory(EngineConfig::default())
            .unwrap()
            .with_clock(Arc::new(FixedClock(at)));

        engine
            .register_member(&Member {
                id: "s1".to_string(),
                tier: Tier::Bronze,
                sponsor_id: None,
            })
            .unwrap();
        engine
            .register_member(&Member {
                id: "payer".to_string(),
                tier: Tier::Free,
                sponsor_id: Some("s1".to_string()),
            })
            .unwrap();
        engine
            .process_payment(&PaymentCompleted {
                event_id: "evt-1".to_string(),
                payer_id: "payer".to_string(),
                amount_paid_minor: 10_000,
            })
            .unwrap();

        let balance = engine.balance("s1").unwrap();
        assert_eq!(balance.period, "2026-W43");
        assert_eq!(balance.total_minor, 3_000);
        assert_eq!(balance.period_minor, 3_000);

        let next_week = Utc.with_ymd_and_hms(2026, 10, 26, 12, 0, 0).unwrap();
        let engine = engine.with_clock(Arc::new(FixedClock(next_week)));
        let balance = engine.balance("s1").unwrap();
        assert_eq!(balance.period, "2026-W44");
        assert_eq!(balance.total_minor, 3_000);
        assert_eq!(balance.period_minor, 0);
    }
}
