//! # Price News
//!
//! Price-related news ingestion with LLM filtering and summaries.
//!
//! ## Architecture
//!
//! 1. **Headlines**: a [`sources::NewsSource`] searches a fixed term and
//!    returns headlines
//! 2. **Relevance**: [`classifier::RelevanceClassifier`] keeps only `high`
//!    headlines
//! 3. **Parsing**: the source fetches and parses the article after checking
//!    its domain
//! 4. **Summary**: [`summarizer::Summarizer`] extracts impact and cause
//! 5. **Storage**: [`store::ArticleStore`] persists it, once per URL
//!
//! [`pipeline::Orchestrator`] wires these together, [`scheduler::Scheduler`]
//! runs it periodically, and [`service::NewsService`] serves readers
//! (listings with [`votes::VoteLedger`] tallies, live search, upvotes).

pub mod api;
pub mod classifier;
pub mod cli;
pub mod config;
pub mod db;
pub mod error;
pub mod keywords;
pub mod models;
pub mod pipeline;
pub mod prompts;
pub mod scheduler;
pub mod service;
pub mod sources;
pub mod store;
pub mod summarizer;
pub mod utils;
pub mod votes;

pub use error::{Error, Result};
