//! Command-line interface for the price-news service.
//!
//! Every option can also come from the environment. LLM options left unset
//! fall back to the `--config` YAML file, then to built-in defaults.

use crate::config::LlmOverrides;
use crate::sources::PageRange;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;

/// Command-line arguments.
///
/// # Examples
///
/// ```sh
/// # Run the scheduler until Ctrl-C
/// price_news --database-path ./news.db serve
///
/// # One incremental run, then print the report
/// OPENAI_API_KEY=sk-... price_news ingest
///
/// # Listing with one account's upvotes marked
/// price_news list --account 3
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// SQLite database file
    #[arg(long, env = "DATABASE_PATH", default_value = "news.db")]
    pub database_path: PathBuf,

    /// Optional path to an LLM config YAML file
    #[arg(short, long, env = "PRICE_NEWS_CONFIG")]
    pub config: Option<PathBuf>,

    /// OpenAI API key
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    pub openai_api_key: Option<String>,

    /// Chat model (default gpt-3.5-turbo)
    #[arg(long, env = "OPENAI_MODEL")]
    pub openai_model: Option<String>,

    /// Base URL of an OpenAI-compatible API
    #[arg(long, env = "OPENAI_BASE_URL")]
    pub openai_base_url: Option<String>,

    /// Seconds before an LLM call is abandoned (default 60)
    #[arg(long, env = "LLM_TIMEOUT_SECS")]
    pub llm_timeout_secs: Option<u64>,

    /// Extra attempts for a failed LLM call (default 0)
    #[arg(long, env = "LLM_MAX_RETRIES")]
    pub llm_max_retries: Option<usize>,

    /// Seconds before a news-site request is abandoned
    #[arg(long, env = "HTTP_TIMEOUT_SECS", default_value_t = 10)]
    pub http_timeout_secs: u64,

    /// Term searched on every ingestion run
    #[arg(long, env = "SEARCH_TERM", default_value = crate::pipeline::DEFAULT_SEARCH_TERM)]
    pub search_term: String,

    /// First page fetched by a bootstrap run
    #[arg(long, env = "BOOTSTRAP_START_PAGE", default_value_t = 1)]
    pub bootstrap_start_page: u32,

    /// Last page fetched by a bootstrap run
    #[arg(long, env = "BOOTSTRAP_END_PAGE", default_value_t = 9)]
    pub bootstrap_end_page: u32,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Bootstrap if the store is empty, then ingest on a fixed interval until Ctrl-C
    Serve {
        /// Minutes between incremental runs
        #[arg(
            long,
            env = "INGEST_INTERVAL_MINUTES",
            default_value_t = 100,
            value_parser = clap::value_parser!(u64).range(1..)
        )]
        interval_minutes: u64,
    },
    /// Run one ingestion pass and print its report
    Ingest {
        /// Cover the bootstrap page range instead of the latest page
        #[arg(long)]
        bootstrap: bool,
    },
    /// Print every stored article with vote counts as JSON
    List {
        /// Mark the upvotes of this account
        #[arg(long)]
        account: Option<i64>,
    },
    /// Search live headlines for a free-text prompt and print the hits as JSON
    Search { prompt: String },
    /// Toggle an account's upvote on an article
    Vote { article: i64, account: i64 },
}

impl Cli {
    pub fn llm_overrides(&self) -> LlmOverrides {
        LlmOverrides {
            api_base: self.openai_base_url.clone(),
            api_key: self.openai_api_key.clone(),
            model: self.openai_model.clone(),
            timeout_secs: self.llm_timeout_secs,
            max_retries: self.llm_max_retries,
        }
    }

    pub fn bootstrap_pages(&self) -> PageRange {
        PageRange::Span {
            start: self.bootstrap_start_page,
            end: self.bootstrap_end_page,
        }
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }
}
