//! Referral Commission & Bonus Ledger Engine
//!
//! Computes and records the financial effects of a referral-based subscription
//! business. A confirmed payment pays commission up to seven levels of
//! sponsors; a signup or a free-to-paid upgrade credits reward points through
//! the referrer's upline and issues one-time threshold bonuses.
//!
//! ## Core Features
//! - Multi-level commission walk with per-tier rate tables and max payout levels
//! - FREE sponsor promotion to the BRONZE level-1 rate from recruit counts
//! - Monthly partner cap, checked and written under one write lock
//! - Exactly-once effects under at-least-once delivery via explicit dedup keys
//! - Points network credit with depth ceiling and repeating threshold bonuses
//! - SQLite store; every event commits or rolls back as one transaction
//!
//! # Example
//!
//! ```rust
//! use referral_ledger::{EngineConfig, Member, PaymentCompleted, ReferralEngine, Tier};
//!
//! # fn main() -> referral_ledger::Result<()> {
//! let mut engine = ReferralEngine::in_memory(EngineConfig::default())?;
//! engine.register_member(&Member {
//!     id: "sponsor".to_string(),
//!     tier: Tier::Silver,
//!     sponsor_id: None,
//! })?;
//! engine.register_member(&Member {
//!     id: "payer".to_string(),
//!     tier: Tier::Bronze,
//!     sponsor_id: Some("sponsor".to_string()),
//! })?;
//!
//! let report = engine.process_payment(&PaymentCompleted {
//!     event_id: "evt-1".to_string(),
//!     payer_id: "payer".to_string(),
//!     amount_paid_minor: 10_000,
//! })?;
//! assert_eq!(report.entries[0].amount_minor, 3_000);
//! assert_eq!(engine.balance("sponsor")?.total_minor, 3_000);
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

pub mod bonus;
pub mod commission;
pub mod config;
pub mod constants;
pub mod dedup;
pub mod engine;
pub mod errors;
pub mod events;
pub mod graph;
pub mod ingress;
pub mod ledger;
pub mod period;
pub mod points;
pub mod state;
pub mod store;
pub mod tier;

pub use bonus::Settlement;
pub use config::EngineConfig;
pub use engine::ReferralEngine;
pub use errors::{LedgerError, Result};
pub use events::{
    CommissionLine, CommissionReport, MemberSignedUp, MemberUpgraded, NetworkCredit,
    PaymentCompleted, PointsCredit, SignupOutcome, UpgradeOutcome,
};
pub use ingress::{dispatch, handle_json, parse_event, InboundEvent, IngressResponse, IngressStatus};
pub use ledger::BalanceMismatch;
pub use period::{Clock, FixedClock, SystemClock};
pub use state::{
    Balance, BonusRecord, LedgerEntry, LevelSummary, Member, PayoutStatus, PointsGrant,
    SignupRecord, SignupStatus, Tier, TierSummary,
};
