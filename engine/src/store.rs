//! SQLite persistence layer
//!
//! Only the store opens connections and starts transactions. Component modules
//! receive a `&Connection` (usually a transaction) and issue their own
//! statements against it, so every read and write of one event shares a single
//! unit of work.

use crate::errors::{LedgerError, Result};
use rusqlite::{Connection, Transaction, TransactionBehavior};
use std::time::Duration;

const SCHEMA: &str = include_str!("../migrations/001_ledger.sql");

pub struct Store {
    conn: Connection,
}

impl Store {
    /// Open (or create) the ledger database at `path`
    pub fn open(path: &str, busy_timeout: Duration) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.busy_timeout(busy_timeout)?;
        // WAL lets dashboard readers run while a writer holds the lock
        let _mode: String =
            conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
        Ok(Self { conn })
    }

    /// Open an in-memory database (fixtures and single-process tools)
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Ok(Self { conn })
    }

    /// Apply the schema; safe to run on every start
    pub fn migrate(&self) -> Result<()> {
        self.conn.execute_batch(SCHEMA)?;
        Ok(())
    }

    /// Start a unit of work holding the database write lock from its first statement
    ///
    /// `BEGIN IMMEDIATE` serializes writers, so a cap or balance read inside the
    /// transaction cannot be invalidated by a concurrent event before the write
    /// that depends on it. Dropping the transaction without committing rolls back.
    pub fn begin(&mut self) -> Result<Transaction<'_>> {
        Ok(self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?)
    }

    #[must_use]
    pub const fn connection(&self) -> &Connection {
        &self.conn
    }
}

/// Convert an amount to the store's signed integer representation
pub(crate) fn to_sql_amount(amount: u64) -> Result<i64> {
    i64::try_from(amount).map_err(|_| LedgerError::Arithmetic("stored amount"))
}

/// Convert a stored integer back to an unsigned amount
pub(crate) fn from_sql_amount(amount: i64) -> Result<u64> {
    u64::try_from(amount).map_err(|_| LedgerError::Arithmetic("stored amount"))
}
