//! Impact / cause summarization.
//!
//! The service is asked for a JSON object with the keys `影響` (impact) and
//! `原因` (cause). Anything that goes wrong (transport, status, fence-wrapped
//! or truncated JSON, wrong shape) yields an empty [`Summary`] so the article
//! is still stored.

use crate::api::AskAsync;
use crate::models::Summary;
use crate::prompts;
use crate::utils::{looks_truncated, strip_code_fences, truncate_for_log};
use serde_json::Value;
use tracing::{debug, instrument, warn};

#[derive(Debug, Clone)]
pub struct Summarizer<A> {
    llm: A,
}

impl<A: AskAsync> Summarizer<A> {
    pub fn new(llm: A) -> Self {
        Self { llm }
    }

    #[instrument(level = "info", skip_all, fields(bytes = full_text.len()))]
    pub async fn summarize(&self, full_text: &str) -> Summary {
        let reply = match self.llm.ask(prompts::SUMMARY, full_text).await {
            Ok(reply) => reply,
            Err(e) => {
                warn!(error = %e, "Summarization call failed; storing empty summary");
                return Summary::default();
            }
        };

        match parse_summary(&reply) {
            Ok(summary) => {
                debug!(
                    impact_chars = summary.impact.chars().count(),
                    cause_chars = summary.cause.chars().count(),
                    "Summarized article"
                );
                summary
            }
            Err(e) => {
                warn!(
                    error = %e,
                    truncated = looks_truncated(&e),
                    reply = %truncate_for_log(&reply, 300),
                    "Summary reply was not valid JSON; storing empty summary"
                );
                Summary::default()
            }
        }
    }
}

/// Parse a summary reply. Missing keys become empty strings; a non-object is an error.
pub fn parse_summary(reply: &str) -> Result<Summary, serde_json::Error> {
    let value: Value = serde_json::from_str(strip_code_fences(reply))?;
    let field = |key: &str| -> String {
        value
            .get(key)
            .and_then(Value::as_str)
            .map(str::trim)
            .unwrap_or_default()
            .to_string()
    };
    if !value.is_object() {
        return Err(serde::de::Error::custom("summary reply is not a JSON object"));
    }
    Ok(Summary {
        impact: field(prompts::IMPACT_KEY),
        cause: field(prompts::CAUSE_KEY),
    })
}
