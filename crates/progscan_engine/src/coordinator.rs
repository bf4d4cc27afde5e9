use std::sync::Arc;
use std::time::{Duration, Instant};

use engine_logging::{engine_error, engine_info};
use futures_util::future::join_all;
use progscan_core::Deduplicator;
use tokio_util::sync::CancellationToken;

use crate::error::RunError;
use crate::extract::SiteExtractor;
use crate::pool::{ReleaseOutcome, SessionPool};
use crate::queue::TaskQueue;
use crate::report::{RunCollector, RunReport};
use crate::session::{SessionFactory, Visibility};
use crate::worker::{run_harvester, HarvesterContext};

/// Knobs for one run. Concurrency above pool capacity is allowed; the extra
/// harvesters simply wait longer on acquire.
#[derive(Debug, Clone)]
pub struct RunSettings {
    /// Number of harvester workers to launch.
    pub concurrency: usize,
    /// Fixed session pool capacity.
    pub pool_capacity: usize,
    pub visibility: Visibility,
    /// Deadline for a single `acquire` call.
    pub acquire_timeout: Duration,
    /// Attempts per task when the pool is exhausted.
    pub acquire_retries: u32,
    /// Base backoff between acquire attempts (scaled by attempt number).
    pub acquire_backoff: Duration,
    /// Pre-create sessions up to capacity before dispatching tasks.
    pub warm_start: bool,
}

impl Default for RunSettings {
    fn default() -> Self {
        Self {
            concurrency: 8,
            pool_capacity: 8,
            visibility: Visibility::Headless,
            acquire_timeout: Duration::from_secs(30),
            acquire_retries: 3,
            acquire_backoff: Duration::from_millis(250),
            warm_start: false,
        }
    }
}

/// Owns the end-to-end run for one university target: list scan, task
/// distribution across harvesters, aggregation, pool teardown.
pub struct Coordinator {
    pool: Arc<SessionPool>,
    settings: RunSettings,
    cancel: CancellationToken,
}

impl Coordinator {
    pub fn new(factory: Arc<dyn SessionFactory>, settings: RunSettings) -> Self {
        let pool = Arc::new(SessionPool::new(
            factory,
            settings.pool_capacity,
            settings.visibility,
        ));
        Self {
            pool,
            settings,
            cancel: CancellationToken::new(),
        }
    }

    /// Token for aborting the run from outside (e.g. Ctrl-C). Cancellation
    /// reaches every harvester before its next loop iteration.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Execute the full pipeline. The pool is drained on every exit path:
    /// success, list-scan failure, systemic pool failure, cancellation, and
    /// harvester panics. No browser process survives this call.
    pub async fn run(
        &self,
        extractor: Arc<dyn SiteExtractor>,
        list_url: &str,
    ) -> Result<RunReport, RunError> {
        let started = Instant::now();
        let result = self.run_inner(extractor, list_url, started).await;
        self.pool.drain().await;
        match &result {
            Ok(report) => engine_info!(
                "run complete: {} succeeded, {} failed, {} duplicates in {:?}",
                report.succeeded.len(),
                report.failed.len(),
                report.duplicates,
                report.elapsed
            ),
            Err(err) => engine_error!("run aborted: {err}"),
        }
        result
    }

    async fn run_inner(
        &self,
        extractor: Arc<dyn SiteExtractor>,
        list_url: &str,
        started: Instant,
    ) -> Result<RunReport, RunError> {
        if self.settings.warm_start {
            self.pool.warm_start().await?;
        }

        let queue = Arc::new(TaskQueue::new());
        let discovered = self.scan_list(&extractor, list_url).await?;
        engine_info!("list scan discovered {} tasks", discovered.len());
        for task in discovered {
            queue.push(task);
        }
        queue.close();

        let collector = Arc::new(RunCollector::default());
        let ctx = Arc::new(HarvesterContext {
            pool: Arc::clone(&self.pool),
            queue,
            dedup: Arc::new(Deduplicator::new()),
            collector: Arc::clone(&collector),
            extractor,
            settings: self.settings.clone(),
            cancel: self.cancel.clone(),
        });

        let workers: Vec<_> = (0..self.settings.concurrency.max(1))
            .map(|worker_id| tokio::spawn(run_harvester(Arc::clone(&ctx), worker_id)))
            .collect();
        for (worker_id, joined) in join_all(workers).await.into_iter().enumerate() {
            if let Err(err) = joined {
                // A panicked harvester parked its slot via the lease drop
                // guard; the drain below quits that browser. The run
                // carries on without the worker.
                engine_error!("harvester {worker_id} panicked: {err}");
            }
        }

        if let Some(fatal) = collector.take_fatal() {
            return Err(RunError::Pool(fatal));
        }

        drop(ctx);
        let collector = Arc::try_unwrap(collector)
            .expect("harvesters still hold the collector after join");
        Ok(collector.into_report(started.elapsed()))
    }

    /// Borrow one session for the list scan, releasing it with a classified
    /// outcome so a scan crash does not poison the pool.
    async fn scan_list(
        &self,
        extractor: &Arc<dyn SiteExtractor>,
        list_url: &str,
    ) -> Result<Vec<progscan_core::DiscoveryTask>, RunError> {
        let lease = self.pool.acquire(self.settings.acquire_timeout).await?;
        match extractor.scan_list(lease.session(), list_url).await {
            Ok(tasks) => {
                self.pool.release(lease, ReleaseOutcome::Ok).await;
                Ok(tasks)
            }
            Err(err) => {
                let outcome = crate::extract::release_outcome(&err);
                self.pool.release(lease, outcome).await;
                Err(RunError::ListScan(err))
            }
        }
    }
}
