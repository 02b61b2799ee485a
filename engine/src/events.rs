use crate::state::Tier;
use serde::{Deserialize, Serialize};

/// A subscription payment confirmed by the checkout flow
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentCompleted {
    /// Delivery-stable identifier; redeliveries carry the same value
    pub event_id: String,
    /// The member who paid
    pub payer_id: String,
    /// Amount paid (in minor units)
    pub amount_paid_minor: u64,
}

/// A new member joined through a referrer
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberSignedUp {
    pub referrer_id: String,
    pub new_member_id: String,
    /// Plan the new member signed up on
    pub tier: Tier,
    pub payment_confirmed: bool,
    pub refund_window_elapsed: bool,
}

impl MemberSignedUp {
    /// Paid plan with payment settled and the refund window closed
    #[must_use]
    pub const fn is_eligible(&self) -> bool {
        self.tier.is_paid() && self.payment_confirmed && self.refund_window_elapsed
    }
}

/// A member changed plans
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberUpgraded {
    pub member_id: String,
    pub old_tier: Tier,
    pub new_tier: Tier,
    pub payment_confirmed: bool,
    pub refund_window_elapsed: bool,
}

impl MemberUpgraded {
    /// Free to paid, payment settled, refund window closed
    #[must_use]
    pub const fn qualifies(&self) -> bool {
        matches!(self.old_tier, Tier::Free)
            && self.new_tier.is_paid()
            && self.payment_confirmed
            && self.refund_window_elapsed
    }
}

/// One beneficiary paid by a payment event
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommissionLine {
    pub beneficiary_id: String,
    pub level: u8,
    /// Rate applied (in basis points)
    pub rate_bps: u16,
    /// Amount written (in minor units), after any partner clamp
    pub amount_minor: u64,
    /// Amount the cap removed (in minor units)
    pub clamped_minor: u64,
}

/// Result of processing one payment event
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommissionReport {
    pub event_id: String,
    /// Entries inserted by this delivery
    pub entries: Vec<CommissionLine>,
    /// Entries skipped because an earlier delivery already wrote them
    pub duplicates: u32,
    /// Sponsors visited by the walk
    pub levels_walked: u8,
    /// The event id had already committed; the walk was skipped
    #[serde(default)]
    pub replayed: bool,
}

impl CommissionReport {
    /// The event had already been applied, or nothing new was written and at least one entry already existed
    #[must_use]
    pub fn is_replay(&self) -> bool {
        self.replayed || (self.entries.is_empty() && self.duplicates > 0)
    }

    /// Total written by this delivery (in minor units)
    pub fn total_minor(&self) -> Option<u64> {
        self.entries
            .iter()
            .try_fold(0_u64, |acc, line| acc.checked_add(line.amount_minor))
    }
}

/// Points credited to one beneficiary by a signup or upgrade
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PointsCredit {
    pub beneficiary_id: String,
    pub depth: u8,
    pub points: u64,
    pub commission_minor: u64,
    /// Points total after the credit
    pub new_total: u64,
}

/// Points credits and bonuses written for one eligible signup
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkCredit {
    pub credits: Vec<PointsCredit>,
    /// Bonus types issued, as `(beneficiary, bonus_type)`
    pub bonuses: Vec<(String, String)>,
}

/// Result of processing a signup event
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum SignupOutcome {
    /// Eligible: the referrer network was credited
    Credited(NetworkCredit),
    /// Recorded; waits for payment confirmation, the refund window, or a paid upgrade
    Pending,
    /// Already credited by an earlier delivery
    Duplicate,
}

/// Result of processing an upgrade event
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum UpgradeOutcome {
    /// Free to paid upgrade flipped the pending signup and credited the network
    Credited(NetworkCredit),
    /// Recorded only: not free to paid, or payment/refund not settled
    Ignored,
    /// Qualifying upgrade, but the signup was already eligible
    AlreadyCredited,
    /// Qualifying upgrade for a member with no recorded signup
    NoSignup,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signup(tier: Tier, confirmed: bool, elapsed: bool) -> MemberSignedUp {
        MemberSignedUp {
            referrer_id: "r".to_string(),
            new_member_id: "n".to_string(),
            tier,
            payment_confirmed: confirmed,
            refund_window_elapsed: elapsed,
        }
    }

    #[test]
    fn test_signup_eligibility_needs_both_flags_and_paid_tier() {
        assert!(signup(Tier::Gold, true, true).is_eligible());
        assert!(!signup(Tier::Gold, true, false).is_eligible());
        assert!(!signup(Tier::Gold, false, true).is_eligible());
        assert!(!signup(Tier::Free, true, true).is_eligible());
    }

    #[test]
    fn test_upgrade_qualifies_only_from_free() {
        let mut upgrade = MemberUpgraded {
            member_id: "m".to_string(),
            old_tier: Tier::Free,
            new_tier: Tier::Silver,
            payment_confirmed: true,
            refund_window_elapsed: true,
        };
        assert!(upgrade.qualifies());

        upgrade.old_tier = Tier::Bronze;
        assert!(!upgrade.qualifies());

        upgrade.old_tier = Tier::Free;
        upgrade.new_tier = Tier::Free;
        assert!(!upgrade.qualifies());
    }

    #[test]
    fn test_report_totals() {
        let report = CommissionReport {
            event_id: "evt".to_string(),
            entries: vec![
                CommissionLine {
                    beneficiary_id: "a".to_string(),
                    level: 1,
                    rate_bps: 3_000,
                    amount_minor: 3_000,
                    clamped_minor: 0,
                },
                CommissionLine {
                    beneficiary_id: "b".to_string(),
                    level: 2,
                    rate_bps: 1_000,
                    amount_minor: 1_000,
                    clamped_minor: 0,
                },
            ],
            duplicates: 0,
            levels_walked: 2,
            replayed: false,
        };
        assert_eq!(report.total_minor(), Some(4_000));
        assert!(!report.is_replay());
    }

    #[test]
    fn test_payment_event_json_shape() {
        let json = r#"{"event_id":"evt-1","payer_id":"p","amount_paid_minor":10000}"#;
        let event: PaymentCompleted = serde_json::from_str(json).unwrap();
        assert_eq!(event.amount_paid_minor, 10_000);
    }
}
