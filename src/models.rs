//! Data models for headlines, parsed and stored articles, and votes.
//!
//! This module defines the records that flow through the pipeline:
//! - [`Headline`]: a search hit, not yet validated or parsed
//! - [`ParsedArticle`]: what the markup parser extracts from an article page
//! - [`NewArticle`]: a parsed article plus its summary, ready to persist
//! - [`Article`]: a stored article with its store-assigned id
//! - [`ArticleView`]: a stored article decorated with its vote tally
//!
//! Field names on the serialized views follow the JSON the web layer already
//! consumes (`time`, `summary`, `reason`, `upvotes`, `is_upvoted`).

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Store-assigned surrogate key of an article.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ArticleId(pub i64);

/// Identifier of an account owned by the authentication collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountId(pub i64);

impl fmt::Display for ArticleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A title and URL pair returned by a search query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Headline {
    pub title: String,
    pub url: String,
}

/// Fields extracted from an article page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedArticle {
    pub url: String,
    pub title: String,
    /// Publication time exactly as the source prints it; empty when absent.
    pub time: String,
    /// Surviving body paragraphs joined by single spaces.
    pub content: String,
}

/// The two-field result of the summarization service.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Summary {
    pub impact: String,
    pub cause: String,
}

impl Summary {
    pub fn is_empty(&self) -> bool {
        self.impact.is_empty() && self.cause.is_empty()
    }
}

/// An article that went through the full pipeline and is ready to be stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewArticle {
    pub url: String,
    pub title: String,
    pub published_at: String,
    pub content: String,
    pub impact_summary: String,
    pub cause_reason: String,
}

impl NewArticle {
    pub fn from_parts(parsed: ParsedArticle, summary: Summary) -> Self {
        Self {
            url: parsed.url,
            title: parsed.title,
            published_at: parsed.time,
            content: parsed.content,
            impact_summary: summary.impact,
            cause_reason: summary.cause,
        }
    }
}

/// A persisted article. Immutable once stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Article {
    pub id: ArticleId,
    pub url: String,
    pub title: String,
    #[serde(rename = "time")]
    pub published_at: String,
    pub content: String,
    #[serde(rename = "summary")]
    pub impact_summary: String,
    #[serde(rename = "reason")]
    pub cause_reason: String,
}

/// What `ArticleStore::add` did with a candidate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AddOutcome {
    Inserted(Article),
    /// An article with the same URL already existed; it is returned unchanged.
    Duplicate(Article),
}

impl AddOutcome {
    pub fn article(&self) -> &Article {
        match self {
            Self::Inserted(article) | Self::Duplicate(article) => article,
        }
    }

    pub fn into_article(self) -> Article {
        match self {
            Self::Inserted(article) | Self::Duplicate(article) => article,
        }
    }

    pub fn is_duplicate(&self) -> bool {
        matches!(self, Self::Duplicate(_))
    }
}

/// Vote count for one article plus the reader's own membership.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteTally {
    pub count: u64,
    pub is_member: bool,
}

/// Result of toggling a vote.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VoteOutcome {
    Added,
    Removed,
}

impl VoteOutcome {
    /// User-facing message, as the web layer reports it.
    pub fn message(self) -> &'static str {
        match self {
            Self::Added => "Article upvoted",
            Self::Removed => "Upvote removed",
        }
    }
}

/// A stored article together with its vote tally, as listed to readers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArticleView {
    #[serde(flatten)]
    pub article: Article,
    pub upvotes: u64,
    pub is_upvoted: bool,
}

impl ArticleView {
    pub fn new(article: Article, tally: VoteTally) -> Self {
        Self {
            article,
            upvotes: tally.count,
            is_upvoted: tally.is_member,
        }
    }
}

/// A transient search result. `id` is a per-request sequence number, not a store id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchHit {
    pub id: u32,
    pub url: String,
    pub title: String,
    pub time: String,
    pub content: String,
}

/// Discrete relevance levels returned by the classifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Relevance {
    High,
    Medium,
    Low,
}

impl Relevance {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
        }
    }
}

impl fmt::Display for Relevance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Relevance {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "high" => Ok(Self::High),
            "medium" => Ok(Self::Medium),
            "low" => Ok(Self::Low),
            other => Err(format!("unknown relevance level: {other}")),
        }
    }
}

/// Which slice of the search results an ingestion run covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunMode {
    /// Wide page range, performed once against an empty store.
    Bootstrap,
    /// Latest page only, performed on every scheduled tick.
    Incremental,
}

impl fmt::Display for RunMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bootstrap => f.write_str("bootstrap"),
            Self::Incremental => f.write_str("incremental"),
        }
    }
}
