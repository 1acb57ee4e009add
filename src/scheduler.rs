//! Periodic ingestion.
//!
//! On start the store is checked once: if it is empty a bootstrap run covers
//! the wide page range, otherwise nothing happens until the first tick. Every
//! tick after that runs an incremental pass over the latest page.
//!
//! # Invariants
//! - At most one run is in flight per [`Scheduler`]. A tick or manual trigger
//!   that finds a run in progress is skipped, not queued.
//! - Cancelling the shutdown token stops future ticks; a run already in
//!   progress finishes normally.

use crate::api::AskAsync;
use crate::models::RunMode;
use crate::pipeline::{Orchestrator, RunReport};
use crate::sources::NewsSource;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// 100 minutes between incremental runs.
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(100 * 60);

pub struct Scheduler<S, A> {
    orchestrator: Arc<Orchestrator<S, A>>,
    interval: Duration,
    run_lock: Arc<Mutex<()>>,
}

impl<S, A> Clone for Scheduler<S, A> {
    fn clone(&self) -> Self {
        Self {
            orchestrator: Arc::clone(&self.orchestrator),
            interval: self.interval,
            run_lock: Arc::clone(&self.run_lock),
        }
    }
}

impl<S, A> Scheduler<S, A>
where
    S: NewsSource + 'static,
    A: AskAsync + Clone + 'static,
{
    /// A zero `interval` is raised to one millisecond.
    pub fn new(orchestrator: Arc<Orchestrator<S, A>>, interval: Duration) -> Self {
        Self {
            orchestrator,
            interval: interval.max(Duration::from_millis(1)),
            run_lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Run once now unless a run is already in progress.
    pub async fn run_now(&self, mode: RunMode) -> Option<RunReport> {
        let Ok(_guard) = self.run_lock.try_lock() else {
            warn!(%mode, "Ingestion run already in progress; skipping");
            return None;
        };
        Some(self.orchestrator.run(mode).await)
    }

    /// Bootstrap when the store is empty. Returns `None` if nothing ran.
    pub async fn bootstrap_if_empty(&self) -> Option<RunReport> {
        match self.orchestrator.store().is_empty() {
            Ok(true) => {
                info!("Store is empty; bootstrapping");
                self.run_now(RunMode::Bootstrap).await
            }
            Ok(false) => None,
            Err(e) => {
                error!(error = %e, "Could not check whether the store is empty; skipping bootstrap");
                None
            }
        }
    }

    /// Spawn the startup check and the tick loop.
    ///
    /// # Arguments
    ///
    /// * `shutdown` - Cancelling it stops future ticks; a bootstrap or tick
    ///   run already in progress completes first
    ///
    /// # Returns
    ///
    /// The task handle. It resolves once the loop has observed cancellation
    /// and any in-flight run has finished.
    pub fn start(&self, shutdown: CancellationToken) -> JoinHandle<()> {
        let scheduler = self.clone();
        tokio::spawn(async move { scheduler.run_loop(shutdown).await })
    }

    async fn run_loop(self, shutdown: CancellationToken) {
        info!(interval_secs = self.interval.as_secs(), "Scheduler started");

        if shutdown.is_cancelled() {
            info!("Scheduler cancelled before startup check");
            return;
        }
        // Runs to completion even if shutdown arrives meanwhile.
        if let Some(report) = self.bootstrap_if_empty().await {
            info!(%report, "Bootstrap finished");
        }
        if shutdown.is_cancelled() {
            info!("Scheduler stopped after bootstrap");
            return;
        }

        // First tick one full interval after startup.
        let mut ticker = interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {
                    if let Some(report) = self.run_now(RunMode::Incremental).await {
                        info!(%report, "Scheduled run finished");
                    }
                }
            }
        }

        info!("Scheduler stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::tests::{orchestrator, FakeLlm, FakeSource};
    use crate::sources::PageRange;
    use crate::store::tests::new_article;

    async fn wait_for(mut condition: impl FnMut() -> bool) {
        let deadline = std::time::Instant::now() + Duration::from_secs(5);
        while !condition() {
            assert!(std::time::Instant::now() < deadline, "condition not reached in time");
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }

    fn scheduler(source: FakeSource, interval: Duration, seeded: bool) -> Scheduler<FakeSource, Arc<FakeLlm>> {
        let (pipeline, _llm) = orchestrator(source, FakeLlm::default());
        if seeded {
            pipeline
                .store()
                .add(&new_article("https://udn.com/news/seed", "2024-01-01"))
                .unwrap();
        }
        Scheduler::new(Arc::new(pipeline), interval)
    }

    #[tokio::test]
    async fn test_empty_store_bootstraps_on_start() {
        let scheduler = scheduler(FakeSource::new(), Duration::from_secs(3600), false);
        let shutdown = CancellationToken::new();
        let handle = scheduler.start(shutdown.clone());

        let source = scheduler.orchestrator.source();
        wait_for(|| !source.fetch_calls.lock().unwrap().is_empty()).await;
        shutdown.cancel();
        handle.await.unwrap();

        assert_eq!(source.fetch_modes(), vec![PageRange::BOOTSTRAP]);
    }

    #[tokio::test]
    async fn test_seeded_store_only_runs_incremental_ticks() {
        let scheduler = scheduler(FakeSource::new(), Duration::from_millis(20), true);
        let shutdown = CancellationToken::new();
        let handle = scheduler.start(shutdown.clone());

        let source = scheduler.orchestrator.source();
        wait_for(|| source.fetch_calls.lock().unwrap().len() >= 2).await;
        shutdown.cancel();
        handle.await.unwrap();

        assert!(source.fetch_modes().iter().all(|p| *p == PageRange::LATEST));
    }

    #[tokio::test]
    async fn test_cancellation_stops_future_ticks() {
        let scheduler = scheduler(FakeSource::new(), Duration::from_millis(10), true);
        let shutdown = CancellationToken::new();
        let handle = scheduler.start(shutdown.clone());

        let source = scheduler.orchestrator.source();
        wait_for(|| !source.fetch_calls.lock().unwrap().is_empty()).await;
        shutdown.cancel();
        handle.await.unwrap();

        let calls = source.fetch_calls.lock().unwrap().len();
        tokio::time::sleep(Duration::from_millis(60)).await;
        assert_eq!(source.fetch_calls.lock().unwrap().len(), calls);
    }

    #[tokio::test]
    async fn test_overlapping_run_is_skipped() {
        let mut source = FakeSource::new();
        source.fetch_delay = Duration::from_millis(200);
        let scheduler = scheduler(source, Duration::from_secs(3600), true);

        let background = scheduler.clone();
        let first = tokio::spawn(async move { background.run_now(RunMode::Incremental).await });
        let source = scheduler.orchestrator.source();
        wait_for(|| !source.fetch_calls.lock().unwrap().is_empty()).await;

        assert!(scheduler.run_now(RunMode::Incremental).await.is_none());
        assert!(first.await.unwrap().is_some());
        assert_eq!(source.fetch_calls.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_shutdown_during_bootstrap_lets_the_run_finish() {
        let mut source =
            FakeSource::new().with_article("蛋價上漲", "https://udn.com/news/egg", Some("2024-01-01 08:00"));
        source.fetch_delay = Duration::from_millis(200);
        let (pipeline, _llm) = orchestrator(source, FakeLlm::default());
        let scheduler = Scheduler::new(Arc::new(pipeline), Duration::from_secs(3600));
        let shutdown = CancellationToken::new();
        let handle = scheduler.start(shutdown.clone());

        let source = scheduler.orchestrator.source();
        wait_for(|| !source.fetch_calls.lock().unwrap().is_empty()).await;
        shutdown.cancel();
        handle.await.unwrap();

        assert_eq!(source.fetch_modes(), vec![PageRange::BOOTSTRAP]);
        assert_eq!(scheduler.orchestrator.store().count().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_cancelled_before_start_does_nothing() {
        let scheduler = scheduler(FakeSource::new(), Duration::from_millis(10), false);
        let shutdown = CancellationToken::new();
        shutdown.cancel();
        scheduler.start(shutdown).await.unwrap();
        assert!(scheduler.orchestrator.source().fetch_calls.lock().unwrap().is_empty());
    }

    #[test]
    fn test_zero_interval_is_raised() {
        let scheduler = scheduler(FakeSource::new(), Duration::ZERO, true);
        assert_eq!(scheduler.interval(), Duration::from_millis(1));
    }

    #[tokio::test]
    async fn test_bootstrap_if_empty_is_noop_on_seeded_store() {
        let scheduler = scheduler(FakeSource::new(), DEFAULT_INTERVAL, true);
        assert!(scheduler.bootstrap_if_empty().await.is_none());
        assert!(scheduler.orchestrator.source().fetch_calls.lock().unwrap().is_empty());
    }
}
