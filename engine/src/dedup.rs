//! Deduplication keys
//!
//! Events arrive at least once. Every insert with a financial effect is
//! preceded by a key lookup in the same transaction, and the matching UNIQUE
//! constraint in the schema backs the check.

use crate::errors::Result;
use rusqlite::{params, Connection, OptionalExtension};
use std::fmt;

/// Natural key of a row that must be written at most once
pub trait DedupKey: fmt::Display {
    /// Whether a row with this key is already committed or written earlier in the transaction
    fn exists(&self, conn: &Connection) -> Result<bool>;
}

/// `(event, beneficiary, level)` for commission ledger entries
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CommissionKey<'a> {
    pub event_id: &'a str,
    pub beneficiary_id: &'a str,
    pub level: u8,
}

impl DedupKey for CommissionKey<'_> {
    fn exists(&self, conn: &Connection) -> Result<bool> {
        Ok(conn
            .query_row(
                "SELECT 1 FROM ledger_entries
                 WHERE event_id = ?1 AND beneficiary_id = ?2 AND level = ?3",
                params![self.event_id, self.beneficiary_id, self.level],
                |_| Ok(()),
            )
            .optional()?
            .is_some())
    }
}

impl fmt::Display for CommissionKey<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "commission({}, {}, L{})",
            self.event_id, self.beneficiary_id, self.level
        )
    }
}

/// Payment event id for events whose walk has committed
///
/// Checked before the walk, so a redelivery never re-reads the current
/// graph, recruit counts or cap headroom.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PaymentKey<'a> {
    pub event_id: &'a str,
}

impl DedupKey for PaymentKey<'_> {
    fn exists(&self, conn: &Connection) -> Result<bool> {
        Ok(conn
            .query_row(
                "SELECT 1 FROM processed_payments WHERE event_id = ?1",
                params![self.event_id],
                |_| Ok(()),
            )
            .optional()?
            .is_some())
    }
}

impl fmt::Display for PaymentKey<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "payment({})", self.event_id)
    }
}

/// `(beneficiary, bonus type)` for bonus records
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BonusKey<'a> {
    pub beneficiary_id: &'a str,
    pub bonus_type: &'a str,
}

impl DedupKey for BonusKey<'_> {
    fn exists(&self, conn: &Connection) -> Result<bool> {
        Ok(conn
            .query_row(
                "SELECT 1 FROM bonus_records WHERE beneficiary_id = ?1 AND bonus_type = ?2",
                params![self.beneficiary_id, self.bonus_type],
                |_| Ok(()),
            )
            .optional()?
            .is_some())
    }
}

impl fmt::Display for BonusKey<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "bonus({}, {})", self.beneficiary_id, self.bonus_type)
    }
}
