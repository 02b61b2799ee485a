//! Engine constants
//!
//! Rate schedules, ceilings and bonus thresholds used by the commission
//! calculator and the points processor. Tier-specific values live on
//! [`Tier`](crate::state::Tier); this module holds the tables that are
//! indexed by level or depth.

/// Basis points divisor for percentage calculations
///
/// 10,000 basis points = 100%. Every rate in the engine is expressed in basis
/// points and applied with floor division against this divisor.
///
/// # Examples
/// ```
/// use referral_ledger::constants::BASIS_POINTS_DIVISOR;
/// // 30% of 100.00 (10_000 minor units)
/// let commission = 10_000_u128 * 3_000 / BASIS_POINTS_DIVISOR;
/// assert_eq!(commission, 3_000);
/// ```
pub const BASIS_POINTS_DIVISOR: u128 = 10_000;

/// Deepest level any commission walk may reach
pub const MAX_COMMISSION_LEVELS: u8 = 7;

/// Flat rate paid by every standard paying tier up to its max payout level (30%)
pub const STANDARD_LEVEL_RATE_BPS: u16 = 3_000;

/// Decreasing PARTNER schedule, one entry per level (20/10/5/0/0/0/0)
pub const PARTNER_LEVEL_RATES_BPS: [u16; MAX_COMMISSION_LEVELS as usize] =
    [2_000, 1_000, 500, 0, 0, 0, 0];

/// Partner commission ceiling per calendar month: 28,000.00 in minor units
pub const PARTNER_MONTHLY_CAP_MINOR: u64 = 2_800_000;

/// Direct recruits a FREE sponsor needs on the qualifying plan before level-1
/// commissions are paid at the BRONZE rate
pub const PROMOTION_MIN_RECRUITS: u32 = 2;

/// Deepest network depth credited by the points processor
pub const POINTS_MAX_DEPTH: u8 = 3;

/// Per-depth share of a tier's base commission (20/10/5/3/2/1/1%)
pub const DEPTH_RATES_BPS: [u16; MAX_COMMISSION_LEVELS as usize] =
    [2_000, 1_000, 500, 300, 200, 100, 100];

/// DIAMOND signups pay the direct referrer 35% instead of 20%
pub const DIAMOND_DEPTH_ONE_RATE_BPS: u16 = 3_500;

/// Repeating points milestones and the bonus (minor units) each crossing pays
pub const POINTS_BONUS_THRESHOLDS: [(u64, u64); 4] =
    [(25, 500), (50, 1_000), (100, 2_500), (200, 5_000)];

/// Eligible-signup milestones and the bonus (minor units) each pays
pub const REFERRAL_BONUS_THRESHOLDS: [(u64, u64); 4] =
    [(5, 2_500), (25, 15_000), (50, 35_000), (250, 200_000)];

/// Default lock wait before a contended write is reported as transient
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;
