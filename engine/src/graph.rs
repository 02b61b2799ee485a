//! Referral graph accessor
//!
//! Read-only lookups over the sponsor forest. Callers pass the transaction of
//! the event they are processing so every lookup sees the same snapshot as
//! the writes that follow it.

use crate::errors::{LedgerError, Result};
use crate::state::{Member, Tier};
use rusqlite::{params, Connection, OptionalExtension};

pub struct ReferralGraph<'c> {
    conn: &'c Connection,
}

impl<'c> ReferralGraph<'c> {
    #[must_use]
    pub const fn new(conn: &'c Connection) -> Self {
        Self { conn }
    }

    /// Direct sponsor of `member_id`, or `None` at the root of a tree
    ///
    /// # Errors
    /// `NotFound` if the member does not exist.
    pub fn direct_sponsor(&self, member_id: &str) -> Result<Option<String>> {
        self.conn
            .query_row(
                "SELECT sponsor_id FROM members WHERE id = ?1",
                params![member_id],
                |row| row.get::<_, Option<String>>(0),
            )
            .optional()?
            .ok_or_else(|| LedgerError::NotFound(member_id.to_string()))
    }

    /// Subscription tier the member actually holds
    ///
    /// # Errors
    /// `NotFound` if the member does not exist, `InvalidTier` if the stored code is unknown.
    pub fn nominal_tier(&self, member_id: &str) -> Result<Tier> {
        let code: String = self
            .conn
            .query_row(
                "SELECT tier FROM members WHERE id = ?1",
                params![member_id],
                |row| row.get(0),
            )
            .optional()?
            .ok_or_else(|| LedgerError::NotFound(member_id.to_string()))?;
        code.parse()
    }

    /// Number of `sponsor_id`'s direct recruits currently on `qualifying_tier`
    pub fn count_qualifying_direct_recruits(
        &self,
        sponsor_id: &str,
        qualifying_tier: Tier,
    ) -> Result<u32> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM members WHERE sponsor_id = ?1 AND tier = ?2",
            params![sponsor_id, qualifying_tier.as_str()],
            |row| row.get(0),
        )?;
        u32::try_from(count).map_err(|_| LedgerError::Arithmetic("recruit count"))
    }

    pub fn member(&self, member_id: &str) -> Result<Member> {
        let (tier, sponsor_id): (String, Option<String>) = self
            .conn
            .query_row(
                "SELECT tier, sponsor_id FROM members WHERE id = ?1",
                params![member_id],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?
            .ok_or_else(|| LedgerError::NotFound(member_id.to_string()))?;
        Ok(Member {
            id: member_id.to_string(),
            tier: tier.parse()?,
            sponsor_id,
        })
    }
}

/// Insert or replace a member row
///
/// Members are owned by the account-creation flow; the engine only reads them.
/// This entry point exists for that flow and for fixtures. A sponsor that does
/// not exist yet is accepted and simply ends traversals.
pub fn upsert_member(conn: &Connection, member: &Member, created_at: i64) -> Result<()> {
    if member.sponsor_id.as_deref() == Some(member.id.as_str()) {
        return Err(LedgerError::CycleDetected {
            member: member.id.clone(),
            path: format!("{0} -> {0}", member.id),
        });
    }
    conn.execute(
        "INSERT INTO members (id, tier, sponsor_id, created_at) VALUES (?1, ?2, ?3, ?4)
         ON CONFLICT(id) DO UPDATE SET tier = excluded.tier, sponsor_id = excluded.sponsor_id",
        params![member.id, member.tier.as_str(), member.sponsor_id, created_at],
    )?;
    Ok(())
}
