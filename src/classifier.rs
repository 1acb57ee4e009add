//! Headline relevance classification.
//!
//! A single chat completion per title decides whether a headline is worth a
//! full fetch. When the service is unreachable or answers with something other
//! than one of the three levels, the classifier answers [`Relevance::High`].
//! Over-inclusion is the chosen failure mode: an outage must not silently stop
//! ingestion. Whether that bias is intended is still open with the product
//! owner, so it is kept explicit in [`FALLBACK_RELEVANCE`].

use crate::api::AskAsync;
use crate::models::Relevance;
use crate::prompts;
use crate::utils::truncate_for_log;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, instrument, warn};

/// Level reported when the service fails or its reply cannot be read.
pub const FALLBACK_RELEVANCE: Relevance = Relevance::High;

static LEVEL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(high|medium|low)\b").expect("static relevance regex"));

#[derive(Debug, Clone)]
pub struct RelevanceClassifier<A> {
    llm: A,
}

impl<A: AskAsync> RelevanceClassifier<A> {
    pub fn new(llm: A) -> Self {
        Self { llm }
    }

    #[instrument(level = "info", skip_all, fields(title = %truncate_for_log(title, 80)))]
    pub async fn classify(&self, title: &str) -> Relevance {
        match self.llm.ask(prompts::RELEVANCE, title).await {
            Ok(reply) => match parse_relevance(&reply) {
                Some(level) => {
                    debug!(%level, "Classified headline");
                    level
                }
                None => {
                    warn!(
                        reply = %truncate_for_log(&reply, 120),
                        fallback = %FALLBACK_RELEVANCE,
                        "Classifier reply was not a relevance level; using fallback"
                    );
                    FALLBACK_RELEVANCE
                }
            },
            Err(e) => {
                warn!(error = %e, fallback = %FALLBACK_RELEVANCE, "Classifier call failed; using fallback");
                FALLBACK_RELEVANCE
            }
        }
    }
}

/// Read a relevance level out of a model reply.
///
/// The exact token is preferred; otherwise the first whole-word level in the
/// reply is taken (models sometimes answer `'high'` or `Relevance: low`).
pub fn parse_relevance(reply: &str) -> Option<Relevance> {
    let trimmed = reply.trim().trim_matches(|c| c == '\'' || c == '"' || c == '.');
    if let Ok(level) = trimmed.parse() {
        return Some(level);
    }
    LEVEL_RE
        .captures(reply)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
}
