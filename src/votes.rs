//! Upvote ledger: which accounts currently endorse which articles.
//!
//! # Invariants
//! - At most one row per `(account_id, article_id)`; the composite primary key
//!   backs this up.
//! - A toggle is one `BEGIN IMMEDIATE` transaction that deletes-or-inserts, so
//!   two toggles on the same pair always serialize into an add followed by a
//!   remove (or the reverse), never two inserts.
//! - Toggling a vote on an article that does not exist changes nothing.

use crate::db::Database;
use crate::error::Result;
use crate::models::{AccountId, ArticleId, VoteOutcome, VoteTally};
use rusqlite::{params, TransactionBehavior};
use std::collections::HashMap;
use tracing::{debug, info, instrument};

#[derive(Debug, Clone)]
pub struct VoteLedger {
    db: Database,
}

impl VoteLedger {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Flip `account`'s vote on `article`.
    ///
    /// # Arguments
    ///
    /// * `article` - Article being endorsed
    /// * `account` - Reader casting or withdrawing the vote
    ///
    /// # Returns
    ///
    /// `Some(VoteOutcome::Added)` or `Some(VoteOutcome::Removed)`, or `None`
    /// when the article does not exist (nothing is written then).
    #[instrument(level = "info", skip_all, fields(article = %article, account = %account))]
    pub fn toggle(&self, article: ArticleId, account: AccountId) -> Result<Option<VoteOutcome>> {
        let mut conn = self.db.lock();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let article_exists: bool = tx.query_row(
            "SELECT EXISTS (SELECT 1 FROM articles WHERE id = ?1)",
            params![article.0],
            |row| row.get(0),
        )?;
        if !article_exists {
            debug!("Vote toggle on unknown article ignored");
            return Ok(None);
        }

        let removed = tx.execute(
            "DELETE FROM votes WHERE account_id = ?1 AND article_id = ?2",
            params![account.0, article.0],
        )?;
        let outcome = if removed > 0 {
            VoteOutcome::Removed
        } else {
            tx.execute(
                "INSERT INTO votes (account_id, article_id) VALUES (?1, ?2)",
                params![account.0, article.0],
            )?;
            VoteOutcome::Added
        };
        tx.commit()?;

        info!(outcome = ?outcome, "Toggled vote");
        Ok(Some(outcome))
    }

    /// Vote count for `article`, plus whether `account` is among the voters.
    ///
    /// Anonymous readers (`account = None`) always get `is_member = false`
    /// and membership is not queried.
    pub fn count_and_membership(&self, article: ArticleId, account: Option<AccountId>) -> Result<VoteTally> {
        let conn = self.db.lock();
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM votes WHERE article_id = ?1",
            params![article.0],
            |row| row.get(0),
        )?;
        let is_member = match account {
            Some(account) => conn.query_row(
                "SELECT EXISTS (SELECT 1 FROM votes WHERE article_id = ?1 AND account_id = ?2)",
                params![article.0, account.0],
                |row| row.get(0),
            )?,
            None => false,
        };
        Ok(VoteTally {
            count: count as u64,
            is_member,
        })
    }

    /// Tallies for every article that has at least one vote.
    ///
    /// Articles missing from the map have no votes. Used to decorate whole
    /// listings in one query instead of one per article.
    pub fn tallies(&self, account: Option<AccountId>) -> Result<HashMap<ArticleId, VoteTally>> {
        let conn = self.db.lock();
        let mut stmt = conn.prepare(
            "SELECT
                article_id,
                COUNT(*),
                COALESCE(MAX(account_id = ?1), 0)
             FROM votes
             GROUP BY article_id",
        )?;
        // NULL never equals an account id, so anonymous reads yield 0 everywhere.
        let rows = stmt.query_map(params![account.map(|a| a.0)], |row| {
            Ok((
                ArticleId(row.get(0)?),
                VoteTally {
                    count: row.get::<_, i64>(1)? as u64,
                    is_member: row.get::<_, i64>(2)? != 0,
                },
            ))
        })?;
        let tallies = rows.collect::<rusqlite::Result<HashMap<_, _>>>()?;
        Ok(tallies)
    }
}
