//! UDN (聯合新聞網) headline search and article scraper.
//!
//! Headlines come from the site's JSON search endpoint:
//!
//! ```text
//! GET https://udn.com/api/more?page=1&id=search:%E5%83%B9%E6%A0%BC&channelId=2&type=searchword
//! → {"lists": [{"title": "...", "titleLink": "https://udn.com/news/story/..."}, ...]}
//! ```
//!
//! Article pages carry the title in `h1.article-content__title`, the publish
//! time in `time.article-content__time` and the body as `<p>` elements under
//! `section.article-content__editor`.

use super::{DomainPolicy, HttpFetch, NewsSource, PageRange};
use crate::error::{Error, Result};
use crate::models::{Headline, ParsedArticle};
use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};
use serde::Deserialize;
use tracing::{debug, error, info, instrument, warn};

pub const BASE_URL: &str = "https://udn.com";
pub const CHILD_URLS: [&str; 1] = ["https://news.udn.com"];
pub const SEARCH_ENDPOINT: &str = "https://udn.com/api/more";
const CHANNEL_ID: u32 = 2;

/// Title used when the page has no title element.
pub const UNKNOWN_TITLE: &str = "Unknown Title";
/// Glyph the site puts in boilerplate and legal-notice paragraphs.
pub const BULLET_GLYPH: char = '▪';

static TITLE_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("h1.article-content__title").unwrap());
static TIME_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("time.article-content__time").unwrap());
static EDITOR_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("section.article-content__editor").unwrap());
static PARAGRAPH_SELECTOR: Lazy<Selector> = Lazy::new(|| Selector::parse("p").unwrap());

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    lists: Vec<SearchItem>,
}

#[derive(Debug, Deserialize)]
struct SearchItem {
    #[serde(default)]
    title: String,
    #[serde(default, rename = "titleLink")]
    title_link: String,
}

#[derive(Debug, Clone)]
pub struct UdnSource<F> {
    fetcher: F,
    domain: DomainPolicy,
    search_endpoint: String,
}

impl<F: HttpFetch> UdnSource<F> {
    /// Create a UDN source trusting `https://udn.com` and `https://news.udn.com`.
    ///
    /// # Arguments
    ///
    /// * `fetcher` - Performs every search and article request; its timeout
    ///   bounds each call
    ///
    /// # Example
    ///
    /// ```ignore
    /// let source = UdnSource::new(ReqwestFetcher::new(Duration::from_secs(10))?);
    /// let headlines = source.fetch_headlines("價格", PageRange::LATEST).await;
    /// ```
    pub fn new(fetcher: F) -> Self {
        Self {
            fetcher,
            domain: DomainPolicy::new(BASE_URL, CHILD_URLS),
            search_endpoint: SEARCH_ENDPOINT.to_string(),
        }
    }

    /// Fetch and map a single result page.
    #[instrument(level = "debug", skip(self, search_term))]
    async fn fetch_page(&self, page: u32, search_term: &str) -> Result<Vec<Headline>> {
        let params = search_params(page, search_term);
        let body = self.fetcher.get_text(&self.search_endpoint, &params).await?;
        let headlines = parse_search_response(&self.search_endpoint, &body)?;
        debug!(page, count = headlines.len(), "Fetched UDN result page");
        Ok(headlines)
    }
}

/// Query parameters for one page of UDN search results.
pub fn search_params(page: u32, search_term: &str) -> Vec<(&'static str, String)> {
    vec![
        ("page", page.to_string()),
        ("id", format!("search:{}", urlencoding::encode(search_term))),
        ("channelId", CHANNEL_ID.to_string()),
        ("type", "searchword".to_string()),
    ]
}

/// Map the search endpoint's JSON body to headlines. Items without a link are dropped.
pub fn parse_search_response(endpoint: &str, body: &str) -> Result<Vec<Headline>> {
    let response: SearchResponse =
        serde_json::from_str(body).map_err(|e| Error::parse(endpoint, format!("search response: {e}")))?;
    Ok(response
        .lists
        .into_iter()
        .filter_map(|item| {
            let url = item.title_link.trim();
            if url.is_empty() {
                debug!(title = %item.title, "Search item without titleLink; dropping");
                return None;
            }
            Some(Headline {
                title: item.title,
                url: url.to_string(),
            })
        })
        .collect())
}

/// Extract an article from page markup.
///
/// A missing title or time degrades to [`UNKNOWN_TITLE`] / an empty string.
/// A missing body container means the page is not an article and is a
/// [`Error::Parse`].
pub fn parse_document(url: &str, html: &str) -> Result<ParsedArticle> {
    let document = Html::parse_document(html);

    let title = document
        .select(&TITLE_SELECTOR)
        .next()
        .map(element_text)
        .unwrap_or_else(|| UNKNOWN_TITLE.to_string());

    let time = document
        .select(&TIME_SELECTOR)
        .next()
        .map(element_text)
        .unwrap_or_default();

    let editor = document
        .select(&EDITOR_SELECTOR)
        .next()
        .ok_or_else(|| Error::parse(url, "no article-content__editor section"))?;

    let content = join_paragraphs(
        editor
            .select(&PARAGRAPH_SELECTOR)
            .map(|p| p.text().collect::<String>()),
    );

    Ok(ParsedArticle {
        url: url.to_string(),
        title,
        time,
        content,
    })
}

/// Drop empty paragraphs and bullet-marked boilerplate; join the rest with single spaces.
pub fn join_paragraphs<I, S>(paragraphs: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    paragraphs
        .into_iter()
        .filter_map(|p| {
            let text = p.as_ref().trim();
            (!text.is_empty() && !text.contains(BULLET_GLYPH)).then(|| text.to_string())
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn element_text(element: ElementRef<'_>) -> String {
    element.text().collect::<String>().trim().to_string()
}

impl<F: HttpFetch> NewsSource for UdnSource<F> {
    fn name(&self) -> &str {
        "udn"
    }

    fn domain(&self) -> &DomainPolicy {
        &self.domain
    }

    #[instrument(level = "info", skip(self), fields(source = "udn"))]
    async fn fetch_headlines(&self, search_term: &str, pages: PageRange) -> Vec<Headline> {
        let mut headlines = Vec::new();
        let mut failed_pages = 0usize;

        for page in pages.pages() {
            match self.fetch_page(page, search_term).await {
                Ok(page_headlines) => headlines.extend(page_headlines),
                Err(e) => {
                    failed_pages += 1;
                    warn!(page, error = %e, "Failed to fetch headline page; skipping");
                }
            }
        }

        info!(
            count = headlines.len(),
            pages = pages.len(),
            failed_pages,
            "Fetched UDN headlines"
        );
        headlines
    }

    #[instrument(level = "info", skip(self), fields(source = "udn"))]
    async fn parse_article(&self, url: &str) -> Result<ParsedArticle> {
        self.domain.ensure(url)?;

        let html = match self.fetcher.get_text(url, &[]).await {
            Ok(html) => html,
            Err(e) => {
                error!(error = %e, "UDN article fetch failed");
                return Err(e);
            }
        };

        match parse_document(url, &html) {
            Ok(article) => {
                info!(bytes = article.content.len(), "Parsed UDN article");
                Ok(article)
            }
            Err(e) => {
                error!(error = %e, "UDN article markup not recognized");
                Err(e)
            }
        }
    }
}
