//! News sources: headline search and article parsing.
//!
//! Each outlet implements [`NewsSource`] with two phases:
//!
//! 1. **Headlines**: page through the outlet's search endpoint and return
//!    [`Headline`]s, skipping pages that fail
//! 2. **Articles**: validate a headline's URL against the outlet's
//!    [`DomainPolicy`], fetch the page and extract a [`ParsedArticle`]
//!
//! # Supported Sources
//!
//! | Source | Module | Method |
//! |--------|--------|--------|
//! | UDN (聯合新聞網) | [`udn`] | JSON search API + HTML scraping |
//!
//! Network access goes through [`HttpFetch`] so sources can be exercised
//! against canned responses.

use crate::error::{Error, Result};
use crate::models::{Headline, ParsedArticle};
use std::future::Future;
use std::ops::RangeInclusive;
use std::time::Duration;
use tracing::debug;
use url::Url;

pub mod udn;

/// Which result pages a headline fetch covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageRange {
    Single(u32),
    /// Inclusive on both ends.
    Span { start: u32, end: u32 },
}

impl PageRange {
    /// Pages 1 through 9, used when the store is empty.
    pub const BOOTSTRAP: PageRange = PageRange::Span { start: 1, end: 9 };
    /// The most recent page, used on every scheduled run.
    pub const LATEST: PageRange = PageRange::Single(1);

    pub fn pages(self) -> RangeInclusive<u32> {
        match self {
            Self::Single(page) => page..=page,
            Self::Span { start, end } => start..=end,
        }
    }

    pub fn len(self) -> usize {
        self.pages().count()
    }

    pub fn is_empty(self) -> bool {
        self.len() == 0
    }
}

/// Origins a source trusts: its base site plus approved child sites.
///
/// Only the origin (scheme, host, port) is compared. Paths and queries are
/// irrelevant, and there is no suffix or substring matching, so
/// `https://udn.com.evil.example` and `http://udn.com` are both rejected for
/// a base of `https://udn.com`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DomainPolicy {
    base_url: String,
    child_urls: Vec<String>,
}

impl DomainPolicy {
    pub fn new(base_url: impl Into<String>, child_urls: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            base_url: base_url.into(),
            child_urls: child_urls.into_iter().map(Into::into).collect(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn is_valid(&self, candidate: &str) -> bool {
        is_valid(candidate, &self.base_url, &self.child_urls)
    }

    /// `Ok(())` for a trusted URL, [`Error::DomainMismatch`] otherwise.
    pub fn ensure(&self, candidate: &str) -> Result<()> {
        if self.is_valid(candidate) {
            Ok(())
        } else {
            debug!(url = %candidate, base = %self.base_url, "Rejected URL outside trusted origins");
            Err(Error::DomainMismatch {
                url: candidate.to_string(),
            })
        }
    }
}

/// True when `candidate` has the same origin as `base_url` or any of `child_urls`.
pub fn is_valid(candidate: &str, base_url: &str, child_urls: &[String]) -> bool {
    let Some(origin) = origin_of(candidate) else {
        return false;
    };
    std::iter::once(base_url)
        .chain(child_urls.iter().map(String::as_str))
        .filter_map(origin_of)
        .any(|trusted| trusted == origin)
}

fn origin_of(url: &str) -> Option<url::Origin> {
    let origin = Url::parse(url).ok()?.origin();
    origin.is_tuple().then_some(origin)
}

/// Minimal GET capability used by sources.
pub trait HttpFetch: Send + Sync {
    /// GET `url` with `query` appended and return the body of a 2xx response.
    fn get_text(&self, url: &str, query: &[(&str, String)]) -> impl Future<Output = Result<String>> + Send;
}

/// reqwest-backed [`HttpFetch`] with a bounded per-request timeout.
#[derive(Debug, Clone)]
pub struct ReqwestFetcher {
    client: reqwest::Client,
}

impl ReqwestFetcher {
    /// # Arguments
    ///
    /// * `timeout` - Upper bound on each request, connect through body read
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client })
    }
}

impl HttpFetch for ReqwestFetcher {
    async fn get_text(&self, url: &str, query: &[(&str, String)]) -> Result<String> {
        let response = self.client.get(url).query(query).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(Error::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        Ok(response.text().await?)
    }
}

/// A news outlet the pipeline can ingest from.
pub trait NewsSource: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &str;

    /// Origins this source trusts.
    fn domain(&self) -> &DomainPolicy;

    /// Headlines for `search_term` across `pages`, in page order.
    ///
    /// A page that fails is logged and skipped; it never aborts the fetch.
    fn fetch_headlines(&self, search_term: &str, pages: PageRange) -> impl Future<Output = Vec<Headline>> + Send;

    /// Validate `url` against [`NewsSource::domain`], then fetch and parse it.
    ///
    /// Fails with [`Error::DomainMismatch`] before any request is made when the
    /// URL is not trusted.
    fn parse_article(&self, url: &str) -> impl Future<Output = Result<ParsedArticle>> + Send;
}
