//! Ledger-write primitives shared by the calculators
//!
//! A ledger entry and the balance increment it causes are always written
//! together: the balance moves only when the entry insert actually happened,
//! which keeps `balance.total == SUM(entries)` under redelivery.

use crate::errors::{LedgerError, Result};
use crate::state::{Balance, LedgerEntry, PayoutStatus};
use crate::store::{from_sql_amount, to_sql_amount};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::Serialize;

/// Commission about to be written
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewLedgerEntry<'a> {
    pub event_id: &'a str,
    pub beneficiary_id: &'a str,
    pub payer_id: &'a str,
    pub amount_minor: u64,
    pub level: u8,
    pub payout_week: &'a str,
    pub period_month: &'a str,
    pub created_at: i64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WriteOutcome {
    Inserted,
    Duplicate,
}

/// Insert a commission entry, then credit the balance
///
/// The calculator looks the key up before reading cap headroom. Here the
/// UNIQUE constraint decides, so a direct caller replaying a key gets
/// `Duplicate` and the balance stays put.
pub fn record_commission(conn: &Connection, entry: &NewLedgerEntry<'_>) -> Result<WriteOutcome> {
    let amount = to_sql_amount(entry.amount_minor)?;
    let inserted = conn.execute(
        "INSERT INTO ledger_entries
         (event_id, beneficiary_id, payer_id, amount_minor, level, payout_week, period_month, status, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 'pending', ?8)
         ON CONFLICT(event_id, beneficiary_id, level) DO NOTHING",
        params![
            entry.event_id,
            entry.beneficiary_id,
            entry.payer_id,
            amount,
            entry.level,
            entry.payout_week,
            entry.period_month,
            entry.created_at,
        ],
    )?;
    if inserted == 0 {
        return Ok(WriteOutcome::Duplicate);
    }
    credit_balance(conn, entry.beneficiary_id, entry.amount_minor, entry.payout_week)?;
    Ok(WriteOutcome::Inserted)
}

/// Mark `event_id` as applied; written last in the event's transaction
pub fn record_processed_payment(
    conn: &Connection,
    event_id: &str,
    payer_id: &str,
    amount_minor: u64,
    entries_written: usize,
    processed_at: i64,
) -> Result<()> {
    let amount = to_sql_amount(amount_minor)?;
    let entries = i64::try_from(entries_written).map_err(|_| LedgerError::Arithmetic("entries written"))?;
    conn.execute(
        "INSERT INTO processed_payments (event_id, payer_id, amount_minor, entries_written, processed_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![event_id, payer_id, amount, entries, processed_at],
    )?;
    Ok(())
}

/// Entries committed for `event_id` across all deliveries
pub fn entry_count_for_event(conn: &Connection, event_id: &str) -> Result<u32> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM ledger_entries WHERE event_id = ?1",
        params![event_id],
        |row| row.get(0),
    )?;
    u32::try_from(count).map_err(|_| LedgerError::Arithmetic("entry count"))
}

/// Add `amount` to the running total and to the total of `period`
///
/// The period total restarts when the stored period differs from `period`.
pub fn credit_balance(conn: &Connection, member_id: &str, amount: u64, period: &str) -> Result<()> {
    let amount = to_sql_amount(amount)?;
    conn.execute(
        "INSERT INTO balances (member_id, total_minor, period_minor, period)
         VALUES (?1, ?2, ?2, ?3)
         ON CONFLICT(member_id) DO UPDATE SET
             total_minor = total_minor + excluded.total_minor,
             period_minor = CASE WHEN period = excluded.period
                                 THEN period_minor + excluded.period_minor
                                 ELSE excluded.period_minor END,
             period = excluded.period",
        params![member_id, amount, period],
    )?;
    Ok(())
}

/// Commission already written to `beneficiary_id` in `period_month`
///
/// Recomputed from the entries on every call; the partner cap depends on it.
pub fn month_total(conn: &Connection, beneficiary_id: &str, period_month: &str) -> Result<u64> {
    let total: i64 = conn.query_row(
        "SELECT COALESCE(SUM(amount_minor), 0) FROM ledger_entries
         WHERE beneficiary_id = ?1 AND period_month = ?2",
        params![beneficiary_id, period_month],
        |row| row.get(0),
    )?;
    from_sql_amount(total)
}

/// Balance of `member_id` as of payout week `current_period`
///
/// Members with no commission yet get a zero balance.
pub fn balance(conn: &Connection, member_id: &str, current_period: &str) -> Result<Balance> {
    let stored: Option<(i64, i64, String)> = conn
        .query_row(
            "SELECT total_minor, period_minor, period FROM balances WHERE member_id = ?1",
            params![member_id],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
        )
        .optional()?;

    let Some((total, period_total, period)) = stored else {
        return Ok(Balance {
            member_id: member_id.to_string(),
            period: current_period.to_string(),
            ..Balance::default()
        });
    };

    let period_minor = if period == current_period {
        from_sql_amount(period_total)?
    } else {
        0
    };
    Ok(Balance {
        member_id: member_id.to_string(),
        total_minor: from_sql_amount(total)?,
        period_minor,
        period: current_period.to_string(),
    })
}

const ENTRY_COLUMNS: &str = "id, event_id, beneficiary_id, payer_id, amount_minor, level, \
     payout_week, period_month, status, created_at";

/// Row as stored, before amount and status are checked
struct StoredEntry {
    entry: LedgerEntry,
    amount: i64,
    status: String,
}

fn entry_from_row(row: &Row<'_>) -> rusqlite::Result<StoredEntry> {
    Ok(StoredEntry {
        entry: LedgerEntry {
            id: row.get(0)?,
            event_id: row.get(1)?,
            beneficiary_id: row.get(2)?,
            payer_id: row.get(3)?,
            amount_minor: 0,
            level: row.get(5)?,
            payout_week: row.get(6)?,
            period_month: row.get(7)?,
            status: PayoutStatus::Pending,
            created_at: row.get(9)?,
        },
        amount: row.get(4)?,
        status: row.get(8)?,
    })
}

fn query_entries(conn: &Connection, filter: &str, value: &str) -> Result<Vec<LedgerEntry>> {
    let sql = format!("SELECT {ENTRY_COLUMNS} FROM ledger_entries WHERE {filter} = ?1 ORDER BY id");
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params![value], entry_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    rows.into_iter()
        .map(|stored| {
            let mut entry = stored.entry;
            entry.amount_minor = from_sql_amount(stored.amount)?;
            entry.status = PayoutStatus::parse(&stored.status)?;
            Ok(entry)
        })
        .collect()
}

/// Every entry paid to `beneficiary_id`, oldest first
pub fn entries_for_beneficiary(conn: &Connection, beneficiary_id: &str) -> Result<Vec<LedgerEntry>> {
    query_entries(conn, "beneficiary_id", beneficiary_id)
}

/// Every entry written by one payment event, in level order
pub fn entries_for_event(conn: &Connection, event_id: &str) -> Result<Vec<LedgerEntry>> {
    query_entries(conn, "event_id", event_id)
}

/// Move every pending entry of `payout_week` to `paid`
pub fn mark_week_paid(conn: &Connection, payout_week: &str) -> Result<usize> {
    Ok(conn.execute(
        "UPDATE ledger_entries SET status = 'paid' WHERE payout_week = ?1 AND status = 'pending'",
        params![payout_week],
    )?)
}

/// A beneficiary whose running balance disagrees with their ledger entries
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct BalanceMismatch {
    pub member_id: String,
    pub balance_total_minor: i64,
    pub ledger_total_minor: i64,
}

/// Check `balance.total == SUM(entries)` for every beneficiary on either side
pub fn audit_balances(conn: &Connection) -> Result<Vec<BalanceMismatch>> {
    let mut stmt = conn.prepare(
        "SELECT member_id, SUM(balance_total), SUM(ledger_total) FROM (
             SELECT member_id, total_minor AS balance_total, 0 AS ledger_total FROM balances
             UNION ALL
             SELECT beneficiary_id, 0, amount_minor FROM ledger_entries
         )
         GROUP BY member_id
         HAVING SUM(balance_total) != SUM(ledger_total)
         ORDER BY member_id",
    )?;
    let mismatches = stmt
        .query_map([], |row| {
            Ok(BalanceMismatch {
                member_id: row.get(0)?,
                balance_total_minor: row.get(1)?,
                ledger_total_minor: row.get(2)?,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(mismatches)
}
