//! Reader-facing operations: listings decorated with votes, search, summary,
//! article preview and vote toggling.

use crate::api::AskAsync;
use crate::error::Result;
use crate::models::{AccountId, ArticleId, ArticleView, ParsedArticle, SearchHit, Summary, VoteOutcome, VoteTally};
use crate::pipeline::Orchestrator;
use crate::sources::NewsSource;
use crate::store::ArticleStore;
use crate::votes::VoteLedger;
use std::sync::Arc;
use tracing::{instrument, warn};

#[derive(Debug)]
pub struct NewsService<S, A> {
    orchestrator: Arc<Orchestrator<S, A>>,
    store: ArticleStore,
    votes: VoteLedger,
}

impl<S, A> Clone for NewsService<S, A> {
    fn clone(&self) -> Self {
        Self {
            orchestrator: Arc::clone(&self.orchestrator),
            store: self.store.clone(),
            votes: self.votes.clone(),
        }
    }
}

impl<S, A> NewsService<S, A>
where
    S: NewsSource,
    A: AskAsync + Clone,
{
    pub fn new(orchestrator: Arc<Orchestrator<S, A>>, votes: VoteLedger) -> Self {
        let store = orchestrator.store().clone();
        Self {
            orchestrator,
            store,
            votes,
        }
    }

    /// Every stored article, newest first, with anonymous vote counts.
    pub fn list_articles(&self) -> Result<Vec<ArticleView>> {
        self.decorated(None)
    }

    /// Same as [`NewsService::list_articles`], also marking `account`'s upvotes.
    pub fn list_articles_for_user(&self, account: AccountId) -> Result<Vec<ArticleView>> {
        self.decorated(Some(account))
    }

    fn decorated(&self, account: Option<AccountId>) -> Result<Vec<ArticleView>> {
        article_views(&self.store, &self.votes, account)
    }

    pub async fn search_news(&self, prompt: &str) -> Vec<SearchHit> {
        self.orchestrator.search_news(prompt).await
    }

    pub async fn summarize(&self, content: &str) -> Summary {
        self.orchestrator.summarize(content).await
    }

    pub async fn preview_article(&self, url: &str) -> Result<ParsedArticle> {
        self.orchestrator.preview_article(url).await
    }

    #[instrument(level = "debug", skip(self))]
    pub fn toggle_vote(&self, article: ArticleId, account: AccountId) -> Result<Option<VoteOutcome>> {
        self.votes.toggle(article, account)
    }

    pub fn count_and_membership(&self, article: ArticleId, account: Option<AccountId>) -> Result<VoteTally> {
        self.votes.count_and_membership(article, account)
    }
}

/// Stored articles, newest first, each with its vote tally for `account`.
///
/// Needs no LLM or network access, so listings work without credentials.
pub fn article_views(store: &ArticleStore, votes: &VoteLedger, account: Option<AccountId>) -> Result<Vec<ArticleView>> {
    let articles = store.list_all()?;
    let tallies = votes.tallies(account)?;
    Ok(articles
        .into_iter()
        .map(|article| {
            let tally = tallies.get(&article.id).copied().unwrap_or_default();
            ArticleView::new(article, tally)
        })
        .collect())
}

/// Toggle `account`'s vote on `article` and describe the outcome for a person.
///
/// An unknown article changes nothing and is reported in the message; it is
/// not an error.
pub fn toggle_vote_message(votes: &VoteLedger, article: ArticleId, account: AccountId) -> Result<String> {
    Ok(match votes.toggle(article, account)? {
        Some(outcome) => outcome.message().to_string(),
        None => {
            warn!(%article, "No such article; vote ignored");
            format!("No article with id {article}; nothing changed")
        }
    })
}
