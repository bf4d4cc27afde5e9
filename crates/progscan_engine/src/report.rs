use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use progscan_core::{DiscoveryTask, RawRecord};
use serde::Serialize;

use crate::error::PoolError;

/// One task that did not produce a record, with the classified reason.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailedTask {
    pub task: DiscoveryTask,
    pub reason: String,
}

/// Outcome of one coordinator run: a partial-success report rather than an
/// all-or-nothing result.
#[derive(Debug, Default)]
pub struct RunReport {
    pub succeeded: Vec<RawRecord>,
    pub failed: Vec<FailedTask>,
    /// Records rejected by the deduplication gate.
    pub duplicates: usize,
    pub elapsed: Duration,
}

impl RunReport {
    pub fn total_tasks(&self) -> usize {
        self.succeeded.len() + self.failed.len() + self.duplicates
    }
}

/// Shared aggregation point for concurrent harvesters.
#[derive(Debug, Default)]
pub(crate) struct RunCollector {
    succeeded: Mutex<Vec<RawRecord>>,
    failed: Mutex<Vec<FailedTask>>,
    duplicates: AtomicUsize,
    fatal: Mutex<Option<PoolError>>,
}

impl RunCollector {
    pub(crate) fn record_success(&self, record: RawRecord) {
        self.succeeded
            .lock()
            .expect("collector mutex poisoned")
            .push(record);
    }

    pub(crate) fn record_failure(&self, task: DiscoveryTask, reason: String) {
        self.failed
            .lock()
            .expect("collector mutex poisoned")
            .push(FailedTask { task, reason });
    }

    pub(crate) fn record_duplicate(&self) {
        self.duplicates.fetch_add(1, Ordering::Relaxed);
    }

    /// First systemic pool failure wins; later ones are dropped.
    pub(crate) fn record_fatal(&self, err: PoolError) {
        let mut fatal = self.fatal.lock().expect("collector mutex poisoned");
        if fatal.is_none() {
            *fatal = Some(err);
        }
    }

    pub(crate) fn take_fatal(&self) -> Option<PoolError> {
        self.fatal.lock().expect("collector mutex poisoned").take()
    }

    pub(crate) fn into_report(self, elapsed: Duration) -> RunReport {
        RunReport {
            succeeded: self.succeeded.into_inner().expect("collector mutex poisoned"),
            failed: self.failed.into_inner().expect("collector mutex poisoned"),
            duplicates: self.duplicates.into_inner(),
            elapsed,
        }
    }
}
