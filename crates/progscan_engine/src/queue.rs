use std::collections::VecDeque;
use std::sync::Mutex;

use engine_logging::engine_warn;
use progscan_core::DiscoveryTask;
use tokio::sync::Notify;

struct QueueState {
    items: VecDeque<DiscoveryTask>,
    closed: bool,
}

/// FIFO backlog of discovery items under concurrent consumption.
///
/// Each task is handed out to exactly one consumer. `pop` suspends while the
/// queue is empty but still open; once closed and drained it yields `None`.
/// FIFO order is kept for reproducible run traces, not for correctness.
#[derive(Debug)]
pub struct TaskQueue {
    state: Mutex<QueueState>,
    wakeup: Notify,
}

impl Default for TaskQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl TaskQueue {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(QueueState {
                items: VecDeque::new(),
                closed: false,
            }),
            wakeup: Notify::new(),
        }
    }

    /// Append one task. Pushes after `close` are dropped with a warning;
    /// the coordinator is the only producer and closes the queue itself.
    pub fn push(&self, task: DiscoveryTask) {
        {
            let mut state = self.state.lock().expect("queue mutex poisoned");
            if state.closed {
                engine_warn!("task pushed after queue close, dropping it");
                return;
            }
            state.items.push_back(task);
        }
        self.wakeup.notify_waiters();
    }

    /// Mark that no more tasks will be pushed.
    pub fn close(&self) {
        {
            let mut state = self.state.lock().expect("queue mutex poisoned");
            state.closed = true;
        }
        self.wakeup.notify_waiters();
    }

    /// Take the next task, suspending while the queue is open but empty.
    /// Returns `None` once the queue is closed and drained.
    pub async fn pop(&self) -> Option<DiscoveryTask> {
        loop {
            // Register before checking, so a push racing with this check
            // still wakes us.
            let wakeup = self.wakeup.notified();
            tokio::pin!(wakeup);
            wakeup.as_mut().enable();
            {
                let mut state = self.state.lock().expect("queue mutex poisoned");
                if let Some(task) = state.items.pop_front() {
                    return Some(task);
                }
                if state.closed {
                    return None;
                }
            }
            wakeup.await;
        }
    }

    pub fn len(&self) -> usize {
        self.state.lock().expect("queue mutex poisoned").items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl std::fmt::Debug for QueueState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueueState")
            .field("pending", &self.items.len())
            .field("closed", &self.closed)
            .finish()
    }
}
