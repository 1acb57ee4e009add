//! # Price News
//!
//! Ingests price-related news from UDN, keeps only headlines an LLM rates as
//! highly relevant, stores each with an impact / cause summary, and lets
//! readers list, search and upvote articles.
//!
//! ## Usage
//!
//! ```sh
//! OPENAI_API_KEY=sk-... price_news serve
//! price_news list --account 3
//! ```

use clap::Parser;
use price_news::api::{ChatClient, RetryAsk};
use price_news::cli::{Cli, Command};
use price_news::config::LlmConfig;
use price_news::db::Database;
use price_news::models::{AccountId, ArticleId, RunMode};
use price_news::pipeline::{Orchestrator, PipelineSettings};
use price_news::scheduler::Scheduler;
use price_news::service::{article_views, toggle_vote_message, NewsService};
use price_news::sources::udn::UdnSource;
use price_news::sources::{PageRange, ReqwestFetcher};
use price_news::store::ArticleStore;
use price_news::utils::ensure_parent_dir;
use price_news::votes::VoteLedger;
use std::error::Error;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};
use tracing_subscriber::{fmt as tfmt, EnvFilter};

type Pipeline = Orchestrator<UdnSource<ReqwestFetcher>, RetryAsk<ChatClient>>;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let args = Cli::parse();
    debug!(database = %args.database_path.display(), command = ?args.command, "Parsed CLI arguments");

    if let Err(e) = ensure_parent_dir(&args.database_path).await {
        error!(path = %args.database_path.display(), error = %e, "Database directory is not usable");
        return Err(e);
    }
    let db = Database::open(&args.database_path)?;
    let store = ArticleStore::new(db.clone());
    let votes = VoteLedger::new(db);

    match args.command.clone() {
        Command::List { account } => {
            let views = article_views(&store, &votes, account.map(AccountId))?;
            println!("{}", serde_json::to_string_pretty(&views)?);
        }
        Command::Vote { article, account } => {
            println!("{}", toggle_vote_message(&votes, ArticleId(article), AccountId(account))?);
        }
        Command::Ingest { bootstrap } => {
            let pipeline = build_pipeline(&args, store)?;
            let mode = if bootstrap {
                RunMode::Bootstrap
            } else {
                RunMode::Incremental
            };
            let report = pipeline.run(mode).await;
            println!("{report}");
        }
        Command::Search { prompt } => {
            let pipeline = Arc::new(build_pipeline(&args, store)?);
            let service = NewsService::new(pipeline, votes);
            let hits = service.search_news(&prompt).await;
            println!("{}", serde_json::to_string_pretty(&hits)?);
        }
        Command::Serve { interval_minutes } => {
            let pipeline = Arc::new(build_pipeline(&args, store)?);
            let scheduler = Scheduler::new(pipeline, Duration::from_secs(interval_minutes.saturating_mul(60)));
            let shutdown = CancellationToken::new();
            let handle = scheduler.start(shutdown.clone());

            info!(interval_minutes, "Serving; press Ctrl-C to stop");
            tokio::signal::ctrl_c().await?;
            info!("Shutdown requested; waiting for the current run to finish");
            shutdown.cancel();
            if let Err(e) = handle.await {
                error!(error = %e, "Scheduler task ended abnormally");
            }
        }
    }

    Ok(())
}

fn build_pipeline(args: &Cli, store: ArticleStore) -> Result<Pipeline, Box<dyn Error>> {
    let llm_config = LlmConfig::resolve(args.config.as_deref(), args.llm_overrides())?;
    let chat = ChatClient::new(&llm_config)?;
    info!(model = %chat.model(), retries = llm_config.max_retries, "LLM client ready");
    let llm = RetryAsk::new(chat, llm_config.max_retries, Duration::from_millis(500));

    let source = UdnSource::new(ReqwestFetcher::new(args.http_timeout())?);
    let settings = PipelineSettings {
        search_term: args.search_term.clone(),
        bootstrap_pages: args.bootstrap_pages(),
        incremental_pages: PageRange::LATEST,
    };
    Ok(Orchestrator::new(source, llm, store, settings))
}
