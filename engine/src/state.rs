use crate::constants::{
    DEPTH_RATES_BPS, DIAMOND_DEPTH_ONE_RATE_BPS, MAX_COMMISSION_LEVELS, PARTNER_LEVEL_RATES_BPS,
    STANDARD_LEVEL_RATE_BPS,
};
use crate::errors::LedgerError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Subscription tier of a member
///
/// The tier drives both the monetary commission schedule and the points
/// processor's flat tables. Stored in the `members` table as its uppercase code.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Tier {
    /// Free tier: no commission unless promoted, max payout level 1
    Free,
    /// Bronze: 30% at level 1
    Bronze,
    /// Silver: 30% at levels 1-2
    Silver,
    /// Gold: 30% at levels 1-5
    Gold,
    /// Diamond: 30% at levels 1-7
    Diamond,
    /// Partner: 20/10/5% at levels 1-3, subject to the monthly cap
    Partner,
}

impl Tier {
    pub const ALL: [Self; 6] = [
        Self::Free,
        Self::Bronze,
        Self::Silver,
        Self::Gold,
        Self::Diamond,
        Self::Partner,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Free => "FREE",
            Self::Bronze => "BRONZE",
            Self::Silver => "SILVER",
            Self::Gold => "GOLD",
            Self::Diamond => "DIAMOND",
            Self::Partner => "PARTNER",
        }
    }

    /// Deepest sponsor level at which this tier still receives commission
    #[must_use]
    pub const fn max_payout_level(self) -> u8 {
        match self {
            Self::Free | Self::Bronze => 1,
            Self::Silver => 2,
            Self::Partner => 3,
            Self::Gold => 5,
            Self::Diamond => 7,
        }
    }

    /// Whether the tier is a paying subscription
    #[must_use]
    pub const fn is_paid(self) -> bool {
        !matches!(self, Self::Free)
    }

    /// Commission rate in basis points for a sponsor of this tier at `level`
    ///
    /// Returns 0 outside `1..=max_payout_level()` and for FREE.
    #[must_use]
    pub fn commission_rate_bps(self, level: u8) -> u16 {
        if level == 0 || level > MAX_COMMISSION_LEVELS || level > self.max_payout_level() {
            return 0;
        }
        match self {
            Self::Free => 0,
            Self::Partner => PARTNER_LEVEL_RATES_BPS[usize::from(level.saturating_sub(1))],
            Self::Bronze | Self::Silver | Self::Gold | Self::Diamond => STANDARD_LEVEL_RATE_BPS,
        }
    }

    /// Points credited to the direct referrer when a member signs up on this tier
    #[must_use]
    pub const fn signup_points(self) -> u64 {
        match self {
            Self::Free => 0,
            Self::Bronze => 5,
            Self::Silver => 10,
            Self::Gold => 20,
            Self::Partner => 30,
            Self::Diamond => 40,
        }
    }

    /// Flat base commission (minor units) that depth rates are applied to
    #[must_use]
    pub const fn base_commission_minor(self) -> u64 {
        match self {
            Self::Free => 0,
            Self::Bronze => 1_000,
            Self::Silver => 2_500,
            Self::Gold => 5_000,
            Self::Partner => 7_500,
            Self::Diamond => 10_000,
        }
    }

    /// Share of the base commission paid at network `depth` for a signup on this tier
    #[must_use]
    pub fn depth_rate_bps(self, depth: u8) -> u16 {
        if depth == 0 || depth > MAX_COMMISSION_LEVELS {
            return 0;
        }
        if depth == 1 && self == Self::Diamond {
            return DIAMOND_DEPTH_ONE_RATE_BPS;
        }
        DEPTH_RATES_BPS[usize::from(depth.saturating_sub(1))]
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Tier {
    type Err = LedgerError;

    fn from_str(code: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|tier| tier.as_str() == code)
            .ok_or_else(|| LedgerError::InvalidTier(code.to_string()))
    }
}

/// Payout status shared by ledger entries and bonus records
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PayoutStatus {
    Pending,
    Paid,
}

impl PayoutStatus {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Paid => "paid",
        }
    }

    pub(crate) fn parse(code: &str) -> Result<Self, LedgerError> {
        match code {
            "pending" => Ok(Self::Pending),
            "paid" => Ok(Self::Paid),
            other => Err(LedgerError::CorruptRecord(format!(
                "unknown payout status '{other}'"
            ))),
        }
    }
}

/// A member as seen by the sponsor graph
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    pub id: String,
    pub tier: Tier,
    /// Weak back-reference to the direct sponsor; may point at a missing member
    pub sponsor_id: Option<String>,
}

/// One commission payment to one beneficiary at one level of one payment event
///
/// Immutable once written apart from the `pending -> paid` transition.
/// `(event_id, beneficiary_id, level)` is unique.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub id: i64,
    pub event_id: String,
    pub beneficiary_id: String,
    pub payer_id: String,
    pub amount_minor: u64,
    pub level: u8,
    /// ISO payout week, e.g. `2026-W43`
    pub payout_week: String,
    /// Calendar month used for the partner cap, e.g. `2026-10`
    pub period_month: String,
    pub status: PayoutStatus,
    pub created_at: i64,
}

/// Running commission totals for one beneficiary
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Balance {
    pub member_id: String,
    /// All-time sum of the beneficiary's ledger entries
    pub total_minor: u64,
    /// Sum of entries in the current payout week
    pub period_minor: u64,
    /// Payout week `period_minor` refers to
    pub period: String,
}

/// Eligibility state of a recorded signup
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignupStatus {
    /// Recorded, waiting for payment confirmation and the refund window
    Pending,
    /// Credited to the referrer network
    Eligible,
}

impl SignupStatus {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Eligible => "eligible",
        }
    }

    pub(crate) fn parse(code: &str) -> Result<Self, LedgerError> {
        match code {
            "pending" => Ok(Self::Pending),
            "eligible" => Ok(Self::Eligible),
            other => Err(LedgerError::CorruptRecord(format!(
                "unknown signup status '{other}'"
            ))),
        }
    }
}

/// A signup attempt, keyed by the new member
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignupRecord {
    pub new_member_id: String,
    pub referrer_id: String,
    pub tier: Tier,
    pub status: SignupStatus,
    /// Tier-specific commission attributed for later payout once eligible
    pub commission_minor: u64,
    /// Consumed by a referral-count bonus settlement
    pub bonus_paid: bool,
}

/// Points and derived commission credited to a beneficiary from one downstream member at one depth
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PointsGrant {
    pub beneficiary_id: String,
    pub source_member_id: String,
    pub depth: u8,
    pub points: u64,
    pub commission_minor: u64,
}

/// Per-(beneficiary, tier, depth) rollup of points grants
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LevelSummary {
    pub beneficiary_id: String,
    pub tier: Tier,
    pub depth: u8,
    pub points: u64,
    pub commission_minor: u64,
    pub grants: u64,
}

/// Per-(beneficiary, tier) rollup of points grants across all depths
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierSummary {
    pub beneficiary_id: String,
    pub tier: Tier,
    pub points: u64,
    pub commission_minor: u64,
    pub grants: u64,
}

/// One-time reward, unique per `(beneficiary_id, bonus_type)`
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BonusRecord {
    pub id: i64,
    pub beneficiary_id: String,
    pub bonus_type: String,
    pub amount_minor: u64,
    pub status: PayoutStatus,
    pub created_at: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_max_payout_levels() {
        assert_eq!(Tier::Free.max_payout_level(), 1);
        assert_eq!(Tier::Bronze.max_payout_level(), 1);
        assert_eq!(Tier::Silver.max_payout_level(), 2);
        assert_eq!(Tier::Gold.max_payout_level(), 5);
        assert_eq!(Tier::Diamond.max_payout_level(), 7);
        assert_eq!(Tier::Partner.max_payout_level(), 3);
    }

    #[test]
    fn test_standard_rates_stop_at_max_level() {
        assert_eq!(Tier::Silver.commission_rate_bps(1), 3_000);
        assert_eq!(Tier::Silver.commission_rate_bps(2), 3_000);
        assert_eq!(Tier::Silver.commission_rate_bps(3), 0);
        assert_eq!(Tier::Diamond.commission_rate_bps(7), 3_000);
        assert_eq!(Tier::Diamond.commission_rate_bps(8), 0);
        assert_eq!(Tier::Gold.commission_rate_bps(0), 0);
    }

    #[test]
    fn test_partner_schedule_decreases() {
        let rates: Vec<u16> = (1..=7).map(|l| Tier::Partner.commission_rate_bps(l)).collect();
        assert_eq!(rates, vec![2_000, 1_000, 500, 0, 0, 0, 0]);
    }

    #[test]
    fn test_free_never_pays() {
        assert!((1..=7).all(|l| Tier::Free.commission_rate_bps(l) == 0));
        assert!(!Tier::Free.is_paid());
    }

    #[test]
    fn test_diamond_depth_one_override() {
        assert_eq!(Tier::Diamond.depth_rate_bps(1), 3_500);
        assert_eq!(Tier::Gold.depth_rate_bps(1), 2_000);
        assert_eq!(Tier::Diamond.depth_rate_bps(2), 1_000);
        assert_eq!(Tier::Bronze.depth_rate_bps(7), 100);
        assert_eq!(Tier::Bronze.depth_rate_bps(8), 0);
    }

    #[test]
    fn test_tier_codes_round_trip_through_from_str() {
        for tier in Tier::ALL {
            assert_eq!(tier.as_str().parse::<Tier>().unwrap(), tier);
        }
    }

    #[test]
    fn test_unknown_tier_code_is_invalid() {
        let err = "PLATINUM".parse::<Tier>().unwrap_err();
        assert!(matches!(err, LedgerError::InvalidTier(code) if code == "PLATINUM"));
    }

    #[test]
    fn test_unknown_stored_status_is_corrupt_record() {
        let payout = PayoutStatus::parse("settled").unwrap_err();
        assert!(matches!(&payout, LedgerError::CorruptRecord(msg) if msg.contains("settled")));
        assert!(payout.is_data_corruption());

        let signup = SignupStatus::parse("").unwrap_err();
        assert!(matches!(signup, LedgerError::CorruptRecord(_)));
        assert_eq!(SignupStatus::parse("eligible").unwrap(), SignupStatus::Eligible);
    }

    #[test]
    fn test_tier_serde_uses_uppercase_codes() {
        let json = serde_json::to_string(&Tier::Diamond).unwrap();
        assert_eq!(json, "\"DIAMOND\"");
        let parsed: Tier = serde_json::from_str("\"PARTNER\"").unwrap();
        assert_eq!(parsed, Tier::Partner);
    }
}
