//! Search keyword extraction for reader-driven searches.

use crate::api::AskAsync;
use crate::prompts;
use tracing::{instrument, warn};

#[derive(Debug, Clone)]
pub struct KeywordExtractor<A> {
    llm: A,
}

impl<A: AskAsync> KeywordExtractor<A> {
    pub fn new(llm: A) -> Self {
        Self { llm }
    }

    /// Space-separated keywords for `prompt`, or an empty string when the service fails.
    #[instrument(level = "info", skip_all)]
    pub async fn extract(&self, prompt: &str) -> String {
        match self.llm.ask(prompts::KEYWORDS, prompt).await {
            Ok(reply) => normalize_keywords(&reply),
            Err(e) => {
                warn!(error = %e, "Keyword extraction failed");
                String::new()
            }
        }
    }
}

/// Collapse whitespace (including full-width spaces and newlines) to single spaces.
pub fn normalize_keywords(reply: &str) -> String {
    reply
        .split(|c: char| c.is_whitespace() || c == '、' || c == '，' || c == ',')
        .filter(|word| !word.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}
