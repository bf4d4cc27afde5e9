use std::sync::Arc;
use std::time::Duration;

use engine_logging::{engine_debug, engine_info, engine_warn};
use progscan_core::{Deduplicator, DiscoveryTask, Offer};
use tokio_util::sync::CancellationToken;

use crate::coordinator::RunSettings;
use crate::error::PoolError;
use crate::extract::{release_outcome, SiteExtractor};
use crate::pool::{ReleaseOutcome, SessionLease, SessionPool};
use crate::queue::TaskQueue;
use crate::report::RunCollector;

/// Everything one harvester shares with its siblings.
pub(crate) struct HarvesterContext {
    pub(crate) pool: Arc<SessionPool>,
    pub(crate) queue: Arc<TaskQueue>,
    pub(crate) dedup: Arc<Deduplicator>,
    pub(crate) collector: Arc<RunCollector>,
    pub(crate) extractor: Arc<dyn SiteExtractor>,
    pub(crate) settings: RunSettings,
    pub(crate) cancel: CancellationToken,
}

/// One harvester: repeatedly pair a pooled session with a queued task until
/// the queue is drained or the run is cancelled. Per-task failures are
/// recorded and never stop the loop.
pub(crate) async fn run_harvester(ctx: Arc<HarvesterContext>, worker_id: usize) {
    engine_debug!("harvester {worker_id} started");
    loop {
        if ctx.cancel.is_cancelled() {
            engine_info!("harvester {worker_id} stopping on cancellation");
            break;
        }
        let task = tokio::select! {
            task = ctx.queue.pop() => task,
            _ = ctx.cancel.cancelled() => None,
        };
        let Some(task) = task else { break };

        let lease = match acquire_with_retry(&ctx, worker_id).await {
            Ok(lease) => lease,
            Err(err @ PoolError::Unavailable { .. }) => {
                // Systemic: surface to the coordinator and stop every worker.
                ctx.collector.record_failure(task, err.to_string());
                ctx.collector.record_fatal(err);
                ctx.cancel.cancel();
                break;
            }
            Err(err @ PoolError::Exhausted { .. }) => {
                ctx.collector.record_failure(task, err.to_string());
                continue;
            }
        };

        process_task(&ctx, worker_id, task, lease).await;
    }
    engine_debug!("harvester {worker_id} finished");
}

async fn process_task(
    ctx: &HarvesterContext,
    worker_id: usize,
    task: DiscoveryTask,
    lease: SessionLease,
) {
    match ctx.extractor.extract(lease.session(), &task).await {
        Ok(record) => {
            match ctx.dedup.offer(&record) {
                Offer::Accepted => ctx.collector.record_success(record),
                Offer::Duplicate => {
                    engine_debug!(
                        "harvester {worker_id} dropped duplicate of {}",
                        record.detail_url
                    );
                    ctx.collector.record_duplicate();
                }
            }
            ctx.pool.release(lease, ReleaseOutcome::Ok).await;
        }
        Err(err) => {
            let outcome = release_outcome(&err);
            engine_warn!(
                "harvester {worker_id} failed on {:?}: {err}",
                task.locator
            );
            ctx.collector.record_failure(task, err.to_string());
            ctx.pool.release(lease, outcome).await;
        }
    }
}

/// Acquire with bounded backoff. Exhaustion is transient: retry up to the
/// configured attempt count, then give the task up rather than stalling the
/// whole batch behind one slow slot.
async fn acquire_with_retry(
    ctx: &HarvesterContext,
    worker_id: usize,
) -> Result<SessionLease, PoolError> {
    let attempts = ctx.settings.acquire_retries.max(1);
    let mut last = PoolError::Exhausted {
        waited: Duration::ZERO,
    };
    for attempt in 1..=attempts {
        if ctx.cancel.is_cancelled() {
            break;
        }
        match ctx.pool.acquire(ctx.settings.acquire_timeout).await {
            Ok(lease) => return Ok(lease),
            Err(err @ PoolError::Unavailable { .. }) => return Err(err),
            Err(err @ PoolError::Exhausted { .. }) => {
                engine_debug!(
                    "harvester {worker_id} acquire attempt {attempt}/{attempts} exhausted"
                );
                last = err;
                if attempt < attempts {
                    tokio::time::sleep(ctx.settings.acquire_backoff * attempt).await;
                }
            }
        }
    }
    Err(last)
}
