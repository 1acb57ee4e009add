//! Ingestion pipeline: search → classify → parse → summarize → store.
//!
//! ## Run
//!
//! 1. **Headlines**: fetch the fixed search term, pages 1-9 in bootstrap mode
//!    or the latest page in incremental mode; duplicate URLs are dropped
//! 2. **Known URLs**: headlines already in the store are skipped before any
//!    LLM or page fetch
//! 3. **Classification**: only `high` headlines continue
//! 4. **Parsing**: the article is fetched and parsed (domain checked first)
//! 5. **Summary**: impact / cause, empty on failure
//! 6. **Store**: URL-deduplicated insert
//!
//! Every per-headline failure is logged and counted in the [`RunReport`];
//! nothing inside the loop aborts the run. Skipped headlines are not retried
//! and are picked up again if the source lists them on a later run.

use crate::api::AskAsync;
use crate::classifier::RelevanceClassifier;
use crate::error::Result;
use crate::keywords::KeywordExtractor;
use crate::models::{AddOutcome, Headline, NewArticle, ParsedArticle, Relevance, RunMode, SearchHit, Summary};
use crate::sources::{NewsSource, PageRange};
use crate::store::ArticleStore;
use crate::summarizer::Summarizer;
use crate::utils::truncate_for_log;
use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use itertools::Itertools;
use std::fmt;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, instrument, warn};

/// Search term used by scheduled ingestion ("price").
pub const DEFAULT_SEARCH_TERM: &str = "價格";

/// How many article pages `search_news` fetches at once.
const SEARCH_PARSE_CONCURRENCY: usize = 4;

#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub search_term: String,
    pub bootstrap_pages: PageRange,
    pub incremental_pages: PageRange,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            search_term: DEFAULT_SEARCH_TERM.to_string(),
            bootstrap_pages: PageRange::BOOTSTRAP,
            incremental_pages: PageRange::LATEST,
        }
    }
}

impl PipelineSettings {
    pub fn pages_for(&self, mode: RunMode) -> PageRange {
        match mode {
            RunMode::Bootstrap => self.bootstrap_pages,
            RunMode::Incremental => self.incremental_pages,
        }
    }
}

/// Counters describing one ingestion run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    pub mode: RunMode,
    pub started_at: DateTime<Utc>,
    pub elapsed: Duration,
    /// Headlines returned by the source, before de-duplication.
    pub headlines: usize,
    pub unique_headlines: usize,
    pub already_stored: usize,
    pub not_relevant: usize,
    pub domain_rejections: usize,
    pub parse_failures: usize,
    pub persisted: usize,
    pub duplicates: usize,
    pub store_failures: usize,
}

impl RunReport {
    fn new(mode: RunMode) -> Self {
        Self {
            mode,
            started_at: Utc::now(),
            elapsed: Duration::ZERO,
            headlines: 0,
            unique_headlines: 0,
            already_stored: 0,
            not_relevant: 0,
            domain_rejections: 0,
            parse_failures: 0,
            persisted: 0,
            duplicates: 0,
            store_failures: 0,
        }
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} run started {} took {:.1}s: {} headlines ({} unique), {} already stored, \
             {} not relevant, {} rejected domains, {} parse failures, {} persisted, \
             {} duplicates, {} store failures",
            self.mode,
            self.started_at.to_rfc3339(),
            self.elapsed.as_secs_f64(),
            self.headlines,
            self.unique_headlines,
            self.already_stored,
            self.not_relevant,
            self.domain_rejections,
            self.parse_failures,
            self.persisted,
            self.duplicates,
            self.store_failures,
        )
    }
}

/// Composes a news source, the LLM-backed stages and the article store.
#[derive(Debug)]
pub struct Orchestrator<S, A> {
    source: S,
    classifier: RelevanceClassifier<A>,
    summarizer: Summarizer<A>,
    keywords: KeywordExtractor<A>,
    store: ArticleStore,
    settings: PipelineSettings,
}

impl<S, A> Orchestrator<S, A>
where
    S: NewsSource,
    A: AskAsync + Clone,
{
    /// Build the pipeline.
    ///
    /// # Arguments
    ///
    /// * `source` - News outlet supplying headlines and article pages
    /// * `llm` - Chat client shared by classification, summarization and
    ///   keyword extraction (cloned once per stage)
    /// * `store` - Destination for relevant articles
    /// * `settings` - Search term and the page range for each [`RunMode`]
    pub fn new(source: S, llm: A, store: ArticleStore, settings: PipelineSettings) -> Self {
        Self {
            source,
            classifier: RelevanceClassifier::new(llm.clone()),
            summarizer: Summarizer::new(llm.clone()),
            keywords: KeywordExtractor::new(llm),
            store,
            settings,
        }
    }

    pub fn store(&self) -> &ArticleStore {
        &self.store
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// One full ingestion pass.
    ///
    /// # Arguments
    ///
    /// * `mode` - [`RunMode::Bootstrap`] covers the bootstrap page range,
    ///   [`RunMode::Incremental`] only the latest page
    ///
    /// # Returns
    ///
    /// A [`RunReport`] counting what happened to every headline. Never fails:
    /// per-headline problems are logged and counted.
    #[instrument(level = "info", skip(self), fields(source = %self.source.name()))]
    pub async fn run(&self, mode: RunMode) -> RunReport {
        let t0 = Instant::now();
        let mut report = RunReport::new(mode);
        let pages = self.settings.pages_for(mode);

        info!(search_term = %self.settings.search_term, ?pages, "Ingestion run starting");
        let headlines = self
            .source
            .fetch_headlines(&self.settings.search_term, pages)
            .await;
        report.headlines = headlines.len();

        let headlines: Vec<Headline> = headlines.into_iter().unique_by(|h| h.url.clone()).collect();
        report.unique_headlines = headlines.len();

        for (i, headline) in headlines.iter().enumerate() {
            self.ingest_one(i, headline, &mut report).await;
        }

        report.elapsed = t0.elapsed();
        info!(
            %mode,
            headlines = report.headlines,
            persisted = report.persisted,
            not_relevant = report.not_relevant,
            parse_failures = report.parse_failures,
            elapsed_ms = report.elapsed.as_millis() as u64,
            "Ingestion run complete"
        );
        report
    }

    async fn ingest_one(&self, index: usize, headline: &Headline, report: &mut RunReport) {
        match self.store.contains_url(&headline.url) {
            Ok(true) => {
                debug!(index, url = %headline.url, "Headline already stored; skipping");
                report.already_stored += 1;
                return;
            }
            Ok(false) => {}
            // The unique constraint still protects the insert below.
            Err(e) => warn!(index, url = %headline.url, error = %e, "URL pre-check failed; continuing"),
        }

        let relevance = self.classifier.classify(&headline.title).await;
        if relevance != Relevance::High {
            debug!(index, %relevance, title = %truncate_for_log(&headline.title, 80), "Headline not relevant");
            report.not_relevant += 1;
            return;
        }

        let parsed = match self.source.parse_article(&headline.url).await {
            Ok(parsed) => parsed,
            Err(e) if e.is_domain_mismatch() => {
                warn!(index, url = %headline.url, "Headline points outside the source's domains; skipping");
                report.domain_rejections += 1;
                return;
            }
            Err(e) => {
                warn!(index, url = %headline.url, error = %e, "Failed to parse article; skipping");
                report.parse_failures += 1;
                return;
            }
        };

        let summary = self.summarizer.summarize(&parsed.content).await;
        let article = NewArticle::from_parts(parsed, summary);

        match self.store.add(&article) {
            Ok(AddOutcome::Inserted(stored)) => {
                info!(index, id = %stored.id, title = %truncate_for_log(&stored.title, 80), "Persisted article");
                report.persisted += 1;
            }
            Ok(AddOutcome::Duplicate(_)) => report.duplicates += 1,
            Err(e) => {
                error!(index, url = %article.url, error = %e, "Failed to store article");
                report.store_failures += 1;
            }
        }
    }

    /// Reader-driven search. Nothing is persisted.
    ///
    /// Keywords are extracted from `prompt`, the latest result page for them
    /// is fetched, and every headline is parsed; failures are skipped. Hits
    /// are sorted by time, newest first, and numbered from 1 in that order.
    #[instrument(level = "info", skip_all)]
    pub async fn search_news(&self, prompt: &str) -> Vec<SearchHit> {
        let keywords = self.keywords.extract(prompt).await;
        if keywords.is_empty() {
            warn!("No keywords extracted; returning no results");
            return Vec::new();
        }

        let headlines: Vec<Headline> = self
            .source
            .fetch_headlines(&keywords, self.settings.incremental_pages)
            .await
            .into_iter()
            .unique_by(|h| h.url.clone())
            .collect();

        let mut parsed: Vec<ParsedArticle> = stream::iter(headlines)
            .map(|headline| async move {
                match self.source.parse_article(&headline.url).await {
                    Ok(article) => Some(article),
                    Err(e) => {
                        warn!(url = %headline.url, error = %e, "Skipping search result");
                        None
                    }
                }
            })
            .buffer_unordered(SEARCH_PARSE_CONCURRENCY)
            .filter_map(std::future::ready)
            .collect()
            .await;

        parsed.sort_by(|a, b| b.time.cmp(&a.time).then_with(|| a.url.cmp(&b.url)));
        info!(%keywords, count = parsed.len(), "Search complete");

        parsed
            .into_iter()
            .zip(1u32..)
            .map(|(article, id)| SearchHit {
                id,
                url: article.url,
                title: article.title,
                time: article.time,
                content: article.content,
            })
            .collect()
    }

    /// Summarize arbitrary text. Empty fields on failure.
    pub async fn summarize(&self, content: &str) -> Summary {
        self.summarizer.summarize(content).await
    }

    /// Parse a URL supplied directly by a user. A foreign domain is an error.
    pub async fn preview_article(&self, url: &str) -> Result<ParsedArticle> {
        self.source.parse_article(url).await
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::db::Database;
    use crate::error::Error;
    use crate::prompts;
    use crate::sources::DomainPolicy;
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    /// In-memory news source recording every call it receives.
    pub(crate) struct FakeSource {
        pub domain: DomainPolicy,
        pub headlines: Vec<Headline>,
        pub articles: HashMap<String, ParsedArticle>,
        pub fetch_delay: Duration,
        pub fetch_calls: Mutex<Vec<(String, PageRange)>>,
        pub parse_calls: Mutex<Vec<String>>,
    }

    impl FakeSource {
        pub(crate) fn new() -> Self {
            Self {
                domain: DomainPolicy::new("https://udn.com", ["https://news.udn.com"]),
                headlines: Vec::new(),
                articles: HashMap::new(),
                fetch_delay: Duration::ZERO,
                fetch_calls: Mutex::new(Vec::new()),
                parse_calls: Mutex::new(Vec::new()),
            }
        }

        /// Add a headline and, when `time` is given, a parseable article behind it.
        pub(crate) fn with_article(mut self, title: &str, url: &str, time: Option<&str>) -> Self {
            self.headlines.push(Headline {
                title: title.to_string(),
                url: url.to_string(),
            });
            if let Some(time) = time {
                self.articles.insert(
                    url.to_string(),
                    ParsedArticle {
                        url: url.to_string(),
                        title: format!("{title} (full)"),
                        time: time.to_string(),
                        content: format!("body of {title}"),
                    },
                );
            }
            self
        }

        pub(crate) fn fetch_modes(&self) -> Vec<PageRange> {
            self.fetch_calls.lock().unwrap().iter().map(|(_, p)| *p).collect()
        }
    }

    impl NewsSource for FakeSource {
        fn name(&self) -> &str {
            "fake"
        }

        fn domain(&self) -> &DomainPolicy {
            &self.domain
        }

        async fn fetch_headlines(&self, search_term: &str, pages: PageRange) -> Vec<Headline> {
            self.fetch_calls
                .lock()
                .unwrap()
                .push((search_term.to_string(), pages));
            if !self.fetch_delay.is_zero() {
                tokio::time::sleep(self.fetch_delay).await;
            }
            self.headlines.clone()
        }

        async fn parse_article(&self, url: &str) -> Result<ParsedArticle> {
            self.domain.ensure(url)?;
            self.parse_calls.lock().unwrap().push(url.to_string());
            self.articles
                .get(url)
                .cloned()
                .ok_or_else(|| Error::parse(url, "no such page"))
        }
    }

    /// Scripted LLM: relevance by title, a fixed summary, fixed keywords.
    #[derive(Default)]
    pub(crate) struct FakeLlm {
        pub relevance: HashMap<String, &'static str>,
        pub summary_reply: Option<String>,
        pub keywords_reply: Option<String>,
        pub calls: Mutex<Vec<(&'static str, String)>>,
    }

    impl FakeLlm {
        pub(crate) fn calls_of(&self, kind: &str) -> Vec<String> {
            self.calls
                .lock()
                .unwrap()
                .iter()
                .filter(|(k, _)| *k == kind)
                .map(|(_, text)| text.clone())
                .collect()
        }
    }

    impl AskAsync for FakeLlm {
        async fn ask(&self, instruction: &str, text: &str) -> Result<String> {
            let kind = match instruction {
                prompts::RELEVANCE => "classify",
                prompts::SUMMARY => "summarize",
                prompts::KEYWORDS => "keywords",
                _ => "unknown",
            };
            self.calls.lock().unwrap().push((kind, text.to_string()));
            let reply = match kind {
                "classify" => self.relevance.get(text).map(|r| r.to_string()),
                "summarize" => self.summary_reply.clone(),
                "keywords" => self.keywords_reply.clone(),
                _ => None,
            };
            reply.ok_or_else(|| Error::Llm(format!("no scripted reply for {kind}")))
        }
    }

    pub(crate) fn orchestrator(
        source: FakeSource,
        llm: FakeLlm,
    ) -> (Orchestrator<FakeSource, Arc<FakeLlm>>, Arc<FakeLlm>) {
        let llm = Arc::new(llm);
        let store = ArticleStore::new(Database::open_in_memory().unwrap());
        (
            Orchestrator::new(source, Arc::clone(&llm), store, PipelineSettings::default()),
            llm,
        )
    }

    fn llm_with(relevance: &[(&str, &'static str)]) -> FakeLlm {
        FakeLlm {
            relevance: relevance.iter().map(|(t, r)| (t.to_string(), *r)).collect(),
            summary_reply: Some(r#"{"影響": "物價上升", "原因": "成本增加"}"#.to_string()),
            keywords_reply: Some("蛋價".to_string()),
            ..FakeLlm::default()
        }
    }

    #[tokio::test]
    async fn test_bootstrap_persists_only_high_relevance_headlines() {
        let source = FakeSource::new()
            .with_article("h-one", "https://udn.com/news/1", Some("2024-01-02 08:00"))
            .with_article("l-two", "https://udn.com/news/2", Some("2024-01-03 08:00"))
            .with_article("h-three", "https://news.udn.com/news/3", Some("2024-01-01 08:00"));
        let llm = llm_with(&[("h-one", "high"), ("l-two", "low"), ("h-three", "high")]);
        let (pipeline, llm) = orchestrator(source, llm);

        let report = pipeline.run(RunMode::Bootstrap).await;

        assert_eq!(pipeline.source().fetch_modes(), vec![PageRange::BOOTSTRAP]);
        assert_eq!(
            pipeline.source().fetch_calls.lock().unwrap()[0].0,
            DEFAULT_SEARCH_TERM
        );
        assert_eq!(
            *pipeline.source().parse_calls.lock().unwrap(),
            vec!["https://udn.com/news/1", "https://news.udn.com/news/3"]
        );
        assert_eq!(llm.calls_of("classify"), vec!["h-one", "l-two", "h-three"]);
        assert_eq!(llm.calls_of("summarize"), vec!["body of h-one", "body of h-three"]);

        assert_eq!(report.persisted, 2);
        assert_eq!(report.not_relevant, 1);
        let stored = pipeline.store().list_all().unwrap();
        assert_eq!(stored.len(), 2);
        assert_eq!(stored[0].url, "https://udn.com/news/1");
        assert_eq!(stored[0].title, "h-one (full)");
        assert_eq!(stored[0].impact_summary, "物價上升");
        assert_eq!(stored[0].cause_reason, "成本增加");
        assert!(pipeline.store().find_by_url("https://udn.com/news/2").unwrap().is_none());
    }

    #[tokio::test]
    async fn test_incremental_uses_latest_page_and_skips_known_urls() {
        let source = FakeSource::new()
            .with_article("a", "https://udn.com/news/a", Some("2024-02-01"))
            .with_article("b", "https://udn.com/news/b", Some("2024-02-02"));
        let (pipeline, llm) = orchestrator(source, llm_with(&[("a", "high"), ("b", "high")]));

        let first = pipeline.run(RunMode::Incremental).await;
        let second = pipeline.run(RunMode::Incremental).await;

        assert_eq!(pipeline.source().fetch_modes(), vec![PageRange::LATEST, PageRange::LATEST]);
        assert_eq!(first.persisted, 2);
        assert_eq!(second.persisted, 0);
        assert_eq!(second.already_stored, 2);
        assert_eq!(llm.calls_of("classify").len(), 2);
        assert_eq!(pipeline.store().count().unwrap(), 2);
    }

    #[tokio::test]
    async fn test_one_bad_article_does_not_block_the_rest() {
        let source = FakeSource::new()
            .with_article("broken", "https://udn.com/news/broken", None)
            .with_article("foreign", "https://evil.example/news/x", Some("2024-01-01"))
            .with_article("ok", "https://udn.com/news/ok", Some("2024-01-01"));
        let llm = llm_with(&[("broken", "high"), ("foreign", "high"), ("ok", "high")]);
        let (pipeline, _llm) = orchestrator(source, llm);

        let report = pipeline.run(RunMode::Incremental).await;

        assert_eq!(report.parse_failures, 1);
        assert_eq!(report.domain_rejections, 1);
        assert_eq!(report.persisted, 1);
        assert_eq!(pipeline.store().list_all().unwrap()[0].url, "https://udn.com/news/ok");
    }

    #[tokio::test]
    async fn test_classifier_outage_ingests_with_empty_summary() {
        let source = FakeSource::new().with_article("x", "https://udn.com/news/x", Some("2024-01-01"));
        // No scripted replies at all: every LLM call fails.
        let (pipeline, _llm) = orchestrator(source, FakeLlm::default());

        let report = pipeline.run(RunMode::Incremental).await;

        assert_eq!(report.persisted, 1);
        let stored = &pipeline.store().list_all().unwrap()[0];
        assert_eq!(stored.impact_summary, "");
        assert_eq!(stored.cause_reason, "");
    }

    #[tokio::test]
    async fn test_duplicate_headlines_in_one_run_are_processed_once() {
        let source = FakeSource::new()
            .with_article("a", "https://udn.com/news/a", Some("2024-01-01"))
            .with_article("a again", "https://udn.com/news/a", Some("2024-01-01"));
        let (pipeline, llm) = orchestrator(source, llm_with(&[("a", "high")]));

        let report = pipeline.run(RunMode::Bootstrap).await;

        assert_eq!(report.headlines, 2);
        assert_eq!(report.unique_headlines, 1);
        assert_eq!(llm.calls_of("classify"), vec!["a"]);
        assert_eq!(pipeline.store().count().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_search_news_sorts_by_time_and_numbers_hits() {
        let source = FakeSource::new()
            .with_article("old", "https://udn.com/news/old", Some("2024-01-01 09:00"))
            .with_article("gone", "https://udn.com/news/gone", None)
            .with_article("new", "https://udn.com/news/new", Some("2024-06-01 09:00"));
        let (pipeline, llm) = orchestrator(source, llm_with(&[]));

        let hits = pipeline.search_news("我想看蛋價").await;

        assert_eq!(llm.calls_of("keywords"), vec!["我想看蛋價"]);
        assert_eq!(pipeline.source().fetch_calls.lock().unwrap()[0].0, "蛋價");
        assert_eq!(pipeline.source().fetch_modes(), vec![PageRange::LATEST]);
        let urls: Vec<_> = hits.iter().map(|h| (h.id, h.url.as_str())).collect();
        assert_eq!(
            urls,
            vec![(1, "https://udn.com/news/new"), (2, "https://udn.com/news/old")]
        );
        assert!(pipeline.store().is_empty().unwrap());
    }

    #[tokio::test]
    async fn test_search_news_without_keywords_returns_nothing() {
        let source = FakeSource::new().with_article("a", "https://udn.com/news/a", Some("2024-01-01"));
        let (pipeline, _llm) = orchestrator(source, FakeLlm::default());

        assert!(pipeline.search_news("anything").await.is_empty());
        assert!(pipeline.source().fetch_calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_preview_article_propagates_domain_mismatch() {
        let (pipeline, _llm) = orchestrator(FakeSource::new(), FakeLlm::default());
        let err = pipeline
            .preview_article("https://evil.example/news/1")
            .await
            .unwrap_err();
        assert!(err.is_domain_mismatch());
    }

    #[test]
    fn test_run_report_display_mentions_mode_and_counts() {
        let mut report = RunReport::new(RunMode::Bootstrap);
        report.persisted = 4;
        let text = report.to_string();
        assert!(text.starts_with("bootstrap run"));
        assert!(text.contains("4 persisted"));
    }
}
