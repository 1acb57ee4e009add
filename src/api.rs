//! Chat-completion access with optional exponential backoff.
//!
//! Every LLM call in the crate (relevance classification, summarization,
//! keyword extraction) goes through the [`AskAsync`] trait:
//! - [`ChatClient`]: OpenAI-compatible `/chat/completions` over reqwest
//! - [`RetryAsk`]: decorator that retries any `AskAsync` with backoff and jitter
//!
//! # Retry Strategy
//!
//! Retries are off unless configured (`max_retries = 0` means a single call).
//! When enabled:
//! - Exponential backoff starting at `base_delay`
//! - Maximum delay capped at 30 seconds
//! - Random jitter (0-250ms) added to each delay

use crate::config::LlmConfig;
use crate::error::{Error, Result};
use rand::{rng, Rng};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;
use std::time::{Duration as StdDuration, Instant};
use tokio::time::sleep;
use tracing::{debug, error, instrument, warn};

/// Trait for async LLM interaction.
///
/// `instruction` is the system message, `text` the user message. Implementors
/// return the assistant's raw reply.
pub trait AskAsync: Send + Sync {
    fn ask(&self, instruction: &str, text: &str) -> impl Future<Output = Result<String>> + Send;
}

impl<T: AskAsync> AskAsync for std::sync::Arc<T> {
    fn ask(&self, instruction: &str, text: &str) -> impl Future<Output = Result<String>> + Send {
        (**self).ask(instruction, text)
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Debug, Deserialize)]
struct ChatReply {
    content: Option<String>,
}

/// OpenAI-compatible chat completion client.
///
/// The underlying `reqwest::Client` carries the configured timeout, so a hung
/// completion fails after `timeout_secs` instead of stalling a run.
#[derive(Clone)]
pub struct ChatClient {
    http: reqwest::Client,
    api_base: String,
    api_key: String,
    model: String,
}

impl fmt::Debug for ChatClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChatClient")
            .field("api_base", &self.api_base)
            .field("model", &self.model)
            .finish_non_exhaustive()
    }
}

impl ChatClient {
    /// Create a client for `{api_base}/chat/completions`.
    ///
    /// # Arguments
    ///
    /// * `config` - Endpoint, key, model and per-call timeout
    ///
    /// # Returns
    ///
    /// The client, or [`Error::Config`] when the API key is blank.
    pub fn new(config: &LlmConfig) -> Result<Self> {
        if config.api_key.trim().is_empty() {
            return Err(Error::Config("OpenAI API key is empty".to_string()));
        }
        let http = reqwest::Client::builder()
            .timeout(StdDuration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            http,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

impl AskAsync for ChatClient {
    #[instrument(level = "debug", skip_all, fields(model = %self.model))]
    async fn ask(&self, instruction: &str, text: &str) -> Result<String> {
        let t0 = Instant::now();
        let url = format!("{}/chat/completions", self.api_base);
        let request = ChatRequest {
            model: &self.model,
            messages: [
                ChatMessage {
                    role: "system",
                    content: instruction,
                },
                ChatMessage {
                    role: "user",
                    content: text,
                },
            ],
            temperature: None,
        };

        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(
                elapsed_ms = t0.elapsed().as_millis() as u64,
                status = status.as_u16(),
                body = %crate::utils::truncate_for_log(&body, 300),
                "Chat completion returned an error status"
            );
            return Err(Error::Llm(format!("chat completion failed with status {status}")));
        }

        let parsed: ChatResponse = response.json().await?;
        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| Error::Llm("chat completion returned no content".to_string()))?;

        debug!(
            elapsed_ms = t0.elapsed().as_millis() as u64,
            bytes = content.len(),
            "Chat completion succeeded"
        );
        Ok(content)
    }
}

/// Wrapper that adds exponential backoff retry logic to any [`AskAsync`] implementation.
///
/// ```text
/// delay = min(base_delay * 2^(attempt-1), max_delay) + random_jitter(0..250ms)
/// ```
#[derive(Clone)]
pub struct RetryAsk<T> {
    inner: T,
    max_retries: usize,
    base_delay: StdDuration,
    max_delay: StdDuration,
}

impl<T> RetryAsk<T>
where
    T: AskAsync,
{
    /// Create a retry wrapper around an existing [`AskAsync`] implementation.
    ///
    /// # Arguments
    ///
    /// * `inner` - The client to wrap
    /// * `max_retries` - Extra attempts after the first failure; `0` makes
    ///   exactly one attempt
    /// * `base_delay` - Delay before the first retry, doubled each time
    pub fn new(inner: T, max_retries: usize, base_delay: StdDuration) -> Self {
        Self {
            inner,
            max_retries,
            base_delay,
            max_delay: StdDuration::from_secs(30),
        }
    }
}

impl<T> fmt::Debug for RetryAsk<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryAsk")
            .field("max_retries", &self.max_retries)
            .field("base_delay", &self.base_delay)
            .field("max_delay", &self.max_delay)
            .finish()
    }
}

impl<T> AskAsync for RetryAsk<T>
where
    T: AskAsync,
{
    #[instrument(level = "debug", skip_all)]
    async fn ask(&self, instruction: &str, text: &str) -> Result<String> {
        let total_t0 = Instant::now();
        let mut attempt = 0usize;

        loop {
            let attempt_t0 = Instant::now();
            match self.inner.ask(instruction, text).await {
                Ok(resp) => return Ok(resp),
                Err(e) => {
                    attempt += 1;
                    let attempt_dt = attempt_t0.elapsed();
                    let total_dt = total_t0.elapsed();

                    if attempt > self.max_retries {
                        error!(
                            attempt,
                            max = self.max_retries,
                            elapsed_ms_attempt = attempt_dt.as_millis() as u64,
                            elapsed_ms_total = total_dt.as_millis() as u64,
                            error = %e,
                            "ask() exhausted retries"
                        );
                        return Err(e);
                    }

                    let mut delay = self.base_delay.saturating_mul(1 << (attempt - 1).min(16));
                    if delay > self.max_delay {
                        delay = self.max_delay;
                    }
                    let jitter_ms: u64 = rng().random_range(0..=250);
                    let delay = delay + StdDuration::from_millis(jitter_ms);

                    warn!(
                        attempt,
                        max = self.max_retries,
                        elapsed_ms_attempt = attempt_dt.as_millis() as u64,
                        elapsed_ms_total = total_dt.as_millis() as u64,
                        ?delay,
                        error = %e,
                        "ask() attempt failed; backing off"
                    );
                    sleep(delay).await;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Flaky {
        failures_before_success: usize,
        calls: AtomicUsize,
    }

    impl AskAsync for Flaky {
        async fn ask(&self, _instruction: &str, text: &str) -> Result<String> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n < self.failures_before_success {
                Err(Error::Llm(format!("transient failure {n}")))
            } else {
                Ok(format!("echo: {text}"))
            }
        }
    }

    #[tokio::test]
    async fn test_retry_recovers_after_transient_failures() {
        let flaky = Flaky {
            failures_before_success: 2,
            calls: AtomicUsize::new(0),
        };
        let api = RetryAsk::new(flaky, 3, StdDuration::from_millis(1));
        let reply = api.ask("sys", "hi").await.unwrap();
        assert_eq!(reply, "echo: hi");
        assert_eq!(api.inner.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_zero_retries_makes_a_single_attempt() {
        let flaky = Flaky {
            failures_before_success: 1,
            calls: AtomicUsize::new(0),
        };
        let api = RetryAsk::new(flaky, 0, StdDuration::from_millis(1));
        assert!(api.ask("sys", "hi").await.is_err());
        assert_eq!(api.inner.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_chat_client_times_out_on_silent_server() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((stream, _)) = listener.accept().await {
                held.push(stream);
            }
        });

        let config = LlmConfig {
            api_base: format!("http://{addr}/v1"),
            api_key: "sk-test".to_string(),
            timeout_secs: 1,
            ..LlmConfig::default()
        };
        let client = ChatClient::new(&config).unwrap();

        let started = Instant::now();
        let result = client.ask("sys", "hi").await;

        assert!(matches!(result, Err(Error::Http(ref e)) if e.is_timeout()), "{result:?}");
        assert!(started.elapsed() < StdDuration::from_secs(3));
        server.abort();
    }

    #[test]
    fn test_chat_client_rejects_empty_key() {
        let config = LlmConfig {
            api_key: "  ".to_string(),
            ..LlmConfig::default()
        };
        assert!(matches!(ChatClient::new(&config), Err(Error::Config(_))));
    }

    #[test]
    fn test_chat_request_shape() {
        let request = ChatRequest {
            model: "gpt-3.5-turbo",
            messages: [
                ChatMessage {
                    role: "system",
                    content: "be brief",
                },
                ChatMessage {
                    role: "user",
                    content: "蛋價",
                },
            ],
            temperature: None,
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["model"], "gpt-3.5-turbo");
        assert_eq!(json["messages"][0]["role"], "system");
        assert_eq!(json["messages"][1]["content"], "蛋價");
        assert!(json.get("temperature").is_none());
    }
}
