//! Tier resolver
//!
//! A sponsor's effective commission tier can differ from the plan they pay
//! for: a FREE sponsor with enough BRONZE recruits is paid level-1 commission
//! at the BRONZE rate. The promotion is computed on demand and never written
//! back to the member.

use crate::errors::Result;
use crate::graph::ReferralGraph;
use crate::state::Tier;

/// Plan that FREE sponsors must recruit onto to be promoted
pub const QUALIFYING_TIER: Tier = Tier::Bronze;

/// Outcome of resolving one sponsor
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ResolvedTier {
    pub nominal_tier: Tier,
    pub effective_tier: Tier,
    pub max_payout_level: u8,
    /// Only ever true when the nominal tier is PARTNER
    pub is_partner: bool,
    /// FREE sponsor promoted to the qualifying tier
    pub promoted: bool,
}

impl ResolvedTier {
    /// Commission rate for this sponsor at `level`
    ///
    /// A promoted sponsor is always paid the qualifying tier's level-1 rate at
    /// level 1, whatever the generic table would say; deeper levels get nothing.
    #[must_use]
    pub fn rate_bps(&self, level: u8) -> u16 {
        if level > self.max_payout_level {
            return 0;
        }
        if self.promoted {
            return if level == 1 {
                QUALIFYING_TIER.commission_rate_bps(1)
            } else {
                0
            };
        }
        self.effective_tier.commission_rate_bps(level)
    }
}

pub struct TierResolver<'g, 'c> {
    graph: &'g ReferralGraph<'c>,
    promotion_min_recruits: u32,
}

impl<'g, 'c> TierResolver<'g, 'c> {
    #[must_use]
    pub const fn new(graph: &'g ReferralGraph<'c>, promotion_min_recruits: u32) -> Self {
        Self {
            graph,
            promotion_min_recruits,
        }
    }

    /// Resolve the effective tier of `sponsor_id` from current state
    ///
    /// Not cached: every level of every walk calls this afresh.
    pub fn resolve(&self, sponsor_id: &str) -> Result<ResolvedTier> {
        let nominal_tier = self.graph.nominal_tier(sponsor_id)?;

        let (effective_tier, promoted) = if nominal_tier == Tier::Free {
            let qualifying = self
                .graph
                .count_qualifying_direct_recruits(sponsor_id, QUALIFYING_TIER)?;
            if qualifying >= self.promotion_min_recruits {
                (QUALIFYING_TIER, true)
            } else {
                (Tier::Free, false)
            }
        } else {
            (nominal_tier, false)
        };

        let max_payout_level = if promoted {
            1
        } else {
            effective_tier.max_payout_level()
        };

        Ok(ResolvedTier {
            nominal_tier,
            effective_tier,
            max_payout_level,
            is_partner: nominal_tier == Tier::Partner,
            promoted,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::upsert_member;
    use crate::state::Member;
    use crate::store::Store;

    fn add(store: &Store, id: &str, tier: Tier, sponsor: Option<&str>) {
        let member = Member {
            id: id.to_string(),
            tier,
            sponsor_id: sponsor.map(str::to_string),
        };
        upsert_member(store.connection(), &member, 0).unwrap();
    }

    fn store() -> Store {
        let store = Store::in_memory().unwrap();
        store.migrate().unwrap();
        store
    }

    #[test]
    fn test_free_sponsor_with_two_bronze_recruits_is_promoted() {
        let store = store();
        add(&store, "s", Tier::Free, None);
        add(&store, "r1", Tier::Bronze, Some("s"));
        add(&store, "r2", Tier::Bronze, Some("s"));

        let graph = ReferralGraph::new(store.connection());
        let resolved = TierResolver::new(&graph, 2).resolve("s").unwrap();

        assert!(resolved.promoted);
        assert_eq!(resolved.effective_tier, Tier::Bronze);
        assert_eq!(resolved.nominal_tier, Tier::Free);
        assert_eq!(resolved.max_payout_level, 1);
        assert_eq!(resolved.rate_bps(1), 3_000);
        assert_eq!(resolved.rate_bps(2), 0);
    }

    #[test]
    fn test_free_sponsor_with_one_bronze_recruit_stays_free() {
        let store = store();
        add(&store, "s", Tier::Free, None);
        add(&store, "r1", Tier::Bronze, Some("s"));
        add(&store, "r2", Tier::Gold, Some("s"));

        let graph = ReferralGraph::new(store.connection());
        let resolved = TierResolver::new(&graph, 2).resolve("s").unwrap();

        assert!(!resolved.promoted);
        assert_eq!(resolved.effective_tier, Tier::Free);
        assert_eq!(resolved.max_payout_level, 1);
        assert_eq!(resolved.rate_bps(1), 0);
    }

    #[test]
    fn test_partner_is_nominal_only() {
        let store = store();
        add(&store, "p", Tier::Partner, None);
        add(&store, "g", Tier::Gold, None);

        let graph = ReferralGraph::new(store.connection());
        let resolver = TierResolver::new(&graph, 2);

        let partner = resolver.resolve("p").unwrap();
        assert!(partner.is_partner);
        assert_eq!(partner.max_payout_level, 3);
        assert_eq!(partner.rate_bps(2), 1_000);

        let gold = resolver.resolve("g").unwrap();
        assert!(!gold.is_partner);
        assert_eq!(gold.max_payout_level, 5);
    }

    #[test]
    fn test_promotion_reflects_current_state() {
        let store = store();
        add(&store, "s", Tier::Free, None);
        add(&store, "r1", Tier::Bronze, Some("s"));

        let graph = ReferralGraph::new(store.connection());
        let resolver = TierResolver::new(&graph, 2);
        assert!(!resolver.resolve("s").unwrap().promoted);

        add(&store, "r2", Tier::Bronze, Some("s"));
        assert!(resolver.resolve("s").unwrap().promoted);
    }
}
