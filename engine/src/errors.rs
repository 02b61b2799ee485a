//! Error types for the referral ledger engine
//!
//! Every failure that reaches a caller aborts the unit of work it happened in;
//! the transaction is rolled back and no commission, points or bonus write from
//! that event persists.
//!
//! # Error categories
//!
//! - **`NotFound`**: a member or sponsor does not exist. Traversals treat this as
//!   the end of the chain; it only escapes when a caller asks for a specific member.
//! - **`InvalidTier`**: an unknown tier code reached the rate table. Fatal for the event.
//! - **`CycleDetected`**: the sponsor graph revisited a member. Fatal, indicates
//!   upstream data corruption.
//! - **`CorruptRecord`**: a stored row holds a value the engine never writes.
//!   Fatal, never a bad request.
//! - **`Storage`**: the store rejected a read or write. Contention and lock
//!   timeouts are retryable, see [`LedgerError::is_retryable`].
//!
//! Cap clamping is not an error: it is a silent reduction of the amount written.
//!
//! # Example
//!
//! ```rust
//! use referral_ledger::{EngineConfig, LedgerError, ReferralEngine};
//!
//! let engine = ReferralEngine::in_memory(EngineConfig::default()).unwrap();
//! match engine.balance("nobody") {
//!     Ok(balance) => assert_eq!(balance.total_minor, 0),
//!     Err(LedgerError::Storage(e)) => println!("store unavailable: {e}"),
//!     Err(other) => println!("unexpected: {other}"),
//! }
//! ```

use rusqlite::ErrorCode;
use thiserror::Error;

/// Result type for ledger engine operations
pub type Result<T> = std::result::Result<T, LedgerError>;

/// Error types that can occur while processing referral events
#[derive(Error, Debug)]
pub enum LedgerError {
    /// A referenced member does not exist
    #[error("Member not found: {0}")]
    NotFound(String),

    /// A tier code outside FREE/BRONZE/SILVER/GOLD/DIAMOND/PARTNER
    #[error("Invalid tier code: {0}")]
    InvalidTier(String),

    /// Sponsor traversal revisited a member
    #[error("Sponsor cycle detected at member {member} (path: {path})")]
    CycleDetected { member: String, path: String },

    /// A stored row could not be decoded
    #[error("Corrupt stored record: {0}")]
    CorruptRecord(String),

    /// Error from the transactional store
    #[error("Storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    /// Money or counter arithmetic left its representable range
    #[error("Arithmetic overflow while computing {0}")]
    Arithmetic(&'static str),

    /// An inbound event failed validation
    #[error("Invalid event: {0}")]
    InvalidEvent(String),

    /// Error from serde JSON
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Engine configuration is out of range
    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl LedgerError {
    /// Whether the failure was transient contention and the event can simply be redelivered
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Storage(error) => matches!(
                error.sqlite_error_code(),
                Some(ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked)
            ),
            _ => false,
        }
    }

    /// Whether the failure points at corrupt upstream data rather than a bad request
    #[must_use]
    pub const fn is_data_corruption(&self) -> bool {
        matches!(
            self,
            Self::CycleDetected { .. } | Self::InvalidTier(_) | Self::CorruptRecord(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_busy_storage_is_retryable() {
        let busy = rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_BUSY),
            None,
        );
        assert!(LedgerError::Storage(busy).is_retryable());
    }

    #[test]
    fn test_constraint_violation_is_not_retryable() {
        let constraint = rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_CONSTRAINT),
            None,
        );
        assert!(!LedgerError::Storage(constraint).is_retryable());
    }

    #[test]
    fn test_cycle_is_data_corruption() {
        let error = LedgerError::CycleDetected {
            member: "a".to_string(),
            path: "a -> b -> a".to_string(),
        };
        assert!(error.is_data_corruption());
        assert!(!error.is_retryable());
        assert!(error.to_string().contains("a -> b -> a"));
    }
}
