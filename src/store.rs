//! Article persistence, deduplicated by URL.
//!
//! # Invariants
//! - `url` is unique. A second `add` with a known URL is a no-op that returns
//!   the stored row; the unique constraint, not a prior lookup, is what
//!   enforces this, so concurrent adds cannot duplicate a row.
//! - Articles are never updated after insert.
//! - `list_all` orders by the stored `published_at` text, descending, using
//!   byte order. Ties keep insertion order.

use crate::db::Database;
use crate::error::Result;
use crate::models::{AddOutcome, Article, ArticleId, NewArticle};
use rusqlite::{params, Connection, OptionalExtension, Row};
use tracing::{debug, info, instrument};

const ARTICLE_SELECT_SQL: &str = "SELECT
    id,
    url,
    title,
    published_at,
    content,
    impact_summary,
    cause_reason
FROM articles";

#[derive(Debug, Clone)]
pub struct ArticleStore {
    db: Database,
}

impl ArticleStore {
    /// Article access over a migrated [`Database`]; clones share the connection.
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    /// Persist `article` unless its URL is already stored.
    ///
    /// # Arguments
    ///
    /// * `article` - The parsed and summarized article to insert
    ///
    /// # Returns
    ///
    /// [`AddOutcome::Inserted`] with the new row, or [`AddOutcome::Duplicate`]
    /// with the row already stored under the same URL (left untouched).
    /// Fails only on a database error.
    #[instrument(level = "debug", skip_all, fields(url = %article.url))]
    pub fn add(&self, article: &NewArticle) -> Result<AddOutcome> {
        let mut conn = self.db.lock();
        let tx = conn.transaction()?;

        let inserted = tx.execute(
            "INSERT INTO articles (
                url,
                title,
                published_at,
                content,
                impact_summary,
                cause_reason
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ON CONFLICT(url) DO NOTHING;",
            params![
                article.url,
                article.title,
                article.published_at,
                article.content,
                article.impact_summary,
                article.cause_reason,
            ],
        )?;

        let outcome = if inserted == 1 {
            let id = ArticleId(tx.last_insert_rowid());
            let stored = select_one(&tx, "WHERE id = ?1", params![id.0])?;
            info!(%id, title = %stored.title, "Stored article");
            AddOutcome::Inserted(stored)
        } else {
            let existing = select_one(&tx, "WHERE url = ?1", params![article.url])?;
            debug!(id = %existing.id, "Article URL already stored; skipping");
            AddOutcome::Duplicate(existing)
        };
        tx.commit()?;
        Ok(outcome)
    }

    pub fn get(&self, id: ArticleId) -> Result<Option<Article>> {
        let conn = self.db.lock();
        let article = conn
            .query_row(&format!("{ARTICLE_SELECT_SQL} WHERE id = ?1"), params![id.0], parse_article_row)
            .optional()?;
        Ok(article)
    }

    pub fn find_by_url(&self, url: &str) -> Result<Option<Article>> {
        let conn = self.db.lock();
        let article = conn
            .query_row(&format!("{ARTICLE_SELECT_SQL} WHERE url = ?1"), params![url], parse_article_row)
            .optional()?;
        Ok(article)
    }

    pub fn contains_url(&self, url: &str) -> Result<bool> {
        let conn = self.db.lock();
        let exists: bool = conn.query_row(
            "SELECT EXISTS (SELECT 1 FROM articles WHERE url = ?1)",
            params![url],
            |row| row.get(0),
        )?;
        Ok(exists)
    }

    pub fn count(&self) -> Result<u64> {
        let conn = self.db.lock();
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM articles", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.count()? == 0)
    }

    /// All articles, newest `published_at` first.
    pub fn list_all(&self) -> Result<Vec<Article>> {
        let conn = self.db.lock();
        let mut stmt = conn.prepare(&format!(
            "{ARTICLE_SELECT_SQL} ORDER BY published_at DESC, id ASC"
        ))?;
        let articles = stmt
            .query_map([], parse_article_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(articles)
    }
}

fn select_one(conn: &Connection, filter: &str, params: impl rusqlite::Params) -> Result<Article> {
    let article = conn.query_row(&format!("{ARTICLE_SELECT_SQL} {filter}"), params, parse_article_row)?;
    Ok(article)
}

fn parse_article_row(row: &Row<'_>) -> rusqlite::Result<Article> {
    Ok(Article {
        id: ArticleId(row.get(0)?),
        url: row.get(1)?,
        title: row.get(2)?,
        published_at: row.get(3)?,
        content: row.get(4)?,
        impact_summary: row.get(5)?,
        cause_reason: row.get(6)?,
    })
}
