use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use engine_logging::{engine_debug, engine_info, engine_warn};
use tokio::sync::Notify;

use crate::error::PoolError;
use crate::session::{BrowserSession, Health, SessionFactory, Visibility};

/// Consecutive creation failures tolerated before the pool reports itself
/// unavailable.
const MAX_CREATE_FAILURES: u32 = 3;

/// How the caller hands a session back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReleaseOutcome {
    /// The session behaved; it rejoins the idle set.
    Ok,
    /// The operation timed out or otherwise looked suspect. The session
    /// rejoins the idle set, but a second consecutive flaky release marks
    /// it degraded.
    Flaky,
    /// Crashed navigation, unrecoverable error, or bot-block. The session
    /// is torn down and its slot backfilled on the next acquire.
    Dead,
}

struct Slot {
    id: u64,
    session: Box<dyn BrowserSession>,
    health: Health,
    flaky_strikes: u32,
    created_at: Instant,
}

struct PoolState {
    idle: VecDeque<Slot>,
    /// Slots abandoned by a dropped lease, waiting to have their browser
    /// quit. They still count towards `live` until reaped.
    orphaned: Vec<Slot>,
    /// Sessions alive or being created, idle, leased or orphaned.
    live: usize,
    draining: bool,
    create_failures: u32,
    next_id: u64,
}

struct PoolShared {
    state: Mutex<PoolState>,
    availability: Notify,
}

/// Exclusive lease on one pooled session, valid until handed back through
/// [`SessionPool::release`]. Dropping an unreleased lease (a panicked
/// harvester) parks the slot for teardown; the next `acquire` or the final
/// `drain` quits its browser and frees the capacity.
pub struct SessionLease {
    slot: Option<Slot>,
    shared: Arc<PoolShared>,
}

impl std::fmt::Debug for SessionLease {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut s = f.debug_struct("SessionLease");
        match &self.slot {
            Some(slot) => s.field("session_id", &slot.id).field("health", &slot.health),
            None => s.field("released", &true),
        };
        s.finish_non_exhaustive()
    }
}

impl SessionLease {
    pub fn session(&self) -> &dyn BrowserSession {
        self.slot
            .as_ref()
            .expect("lease already released")
            .session
            .as_ref()
    }

    pub fn session_id(&self) -> u64 {
        self.slot.as_ref().expect("lease already released").id
    }

    pub fn health(&self) -> Health {
        self.slot.as_ref().expect("lease already released").health
    }

    pub fn age(&self) -> Duration {
        self.slot
            .as_ref()
            .expect("lease already released")
            .created_at
            .elapsed()
    }
}

impl Drop for SessionLease {
    fn drop(&mut self) {
        if let Some(slot) = self.slot.take() {
            // Drop cannot await the quit call, so park the slot; acquire
            // and drain reap orphans and tear the browser down there.
            engine_warn!(
                "session {} lease dropped without release; parked for teardown",
                slot.id
            );
            let mut state = self.shared.state.lock().expect("pool mutex poisoned");
            state.orphaned.push(slot);
            drop(state);
            self.shared.availability.notify_waiters();
        }
    }
}

/// Fixed-capacity pool of browser sessions.
///
/// Sessions are created lazily on first demand (or eagerly via
/// [`warm_start`](Self::warm_start)), lent out exclusively, reset on return,
/// and replaced transparently when they die. At every instant the number of
/// leased sessions never exceeds `capacity`.
pub struct SessionPool {
    shared: Arc<PoolShared>,
    factory: Arc<dyn SessionFactory>,
    capacity: usize,
    visibility: Visibility,
}

enum AcquireStep {
    Reap(Vec<Slot>),
    Take(Slot),
    Create,
    Wait,
}

enum CreateFailure {
    Retry,
    Fatal(PoolError),
}

impl SessionPool {
    pub fn new(factory: Arc<dyn SessionFactory>, capacity: usize, visibility: Visibility) -> Self {
        assert!(capacity >= 1, "pool capacity must be at least 1");
        Self {
            shared: Arc::new(PoolShared {
                state: Mutex::new(PoolState {
                    idle: VecDeque::new(),
                    orphaned: Vec::new(),
                    live: 0,
                    draining: false,
                    create_failures: 0,
                    next_id: 1,
                }),
                availability: Notify::new(),
            }),
            factory,
            capacity,
            visibility,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Sessions currently alive (idle or leased).
    pub fn live_sessions(&self) -> usize {
        self.shared.state.lock().expect("pool mutex poisoned").live
    }

    /// Sessions currently leased out.
    pub fn in_use(&self) -> usize {
        let state = self.shared.state.lock().expect("pool mutex poisoned");
        state.live - state.idle.len() - state.orphaned.len()
    }

    /// Pre-create sessions up to capacity before the first task is
    /// dispatched, trading startup latency for steady-state throughput.
    pub async fn warm_start(&self) -> Result<(), PoolError> {
        loop {
            {
                let mut state = self.shared.state.lock().expect("pool mutex poisoned");
                if state.draining || state.live >= self.capacity {
                    return Ok(());
                }
                state.live += 1;
            }
            match self.create_slot().await {
                Ok(slot) => {
                    engine_debug!("warm start created session {}", slot.id);
                    let mut state = self.shared.state.lock().expect("pool mutex poisoned");
                    state.idle.push_back(slot);
                    drop(state);
                    self.shared.availability.notify_waiters();
                }
                Err(CreateFailure::Retry) => continue,
                Err(CreateFailure::Fatal(err)) => return Err(err),
            }
        }
    }

    /// Borrow a session, waiting up to `timeout` for one to become
    /// available. Below capacity an idle miss creates a fresh session; at
    /// capacity the caller waits on the availability signal.
    pub async fn acquire(&self, timeout: Duration) -> Result<SessionLease, PoolError> {
        let started = Instant::now();
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            // Register for wakeups before inspecting state, so a release
            // landing between the check and the await is not missed.
            let notified = self.shared.availability.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            let step = {
                let mut state = self.shared.state.lock().expect("pool mutex poisoned");
                if state.draining {
                    return Err(PoolError::Exhausted {
                        waited: started.elapsed(),
                    });
                }
                if !state.orphaned.is_empty() {
                    AcquireStep::Reap(state.orphaned.drain(..).collect())
                } else if let Some(slot) = state.idle.pop_front() {
                    AcquireStep::Take(slot)
                } else if state.live < self.capacity {
                    state.live += 1;
                    AcquireStep::Create
                } else {
                    AcquireStep::Wait
                }
            };

            match step {
                AcquireStep::Reap(orphans) => {
                    for slot in orphans {
                        self.quit_slot(slot).await;
                    }
                }
                AcquireStep::Take(slot) => {
                    return Ok(SessionLease {
                        slot: Some(slot),
                        shared: Arc::clone(&self.shared),
                    });
                }
                AcquireStep::Create => match self.create_slot().await {
                    Ok(slot) => {
                        engine_debug!("cold start created session {}", slot.id);
                        return Ok(SessionLease {
                            slot: Some(slot),
                            shared: Arc::clone(&self.shared),
                        });
                    }
                    Err(CreateFailure::Retry) => continue,
                    Err(CreateFailure::Fatal(err)) => return Err(err),
                },
                AcquireStep::Wait => {
                    if tokio::time::timeout_at(deadline, notified).await.is_err() {
                        return Err(PoolError::Exhausted {
                            waited: started.elapsed(),
                        });
                    }
                }
            }
        }
    }

    /// Hand a leased session back. Dead sessions are quit and their slot
    /// freed; live ones are reset and rejoin the idle set. Capacity is
    /// never permanently reduced.
    pub async fn release(&self, mut lease: SessionLease, outcome: ReleaseOutcome) {
        let mut slot = lease.slot.take().expect("lease released twice");

        if outcome == ReleaseOutcome::Dead {
            engine_info!("session {} marked dead, tearing it down", slot.id);
            slot.health = Health::Dead;
            self.quit_slot(slot).await;
            return;
        }

        match outcome {
            ReleaseOutcome::Ok => slot.flaky_strikes = 0,
            ReleaseOutcome::Flaky => {
                slot.flaky_strikes += 1;
                if slot.flaky_strikes >= 2 && slot.health == Health::Healthy {
                    engine_info!(
                        "session {} degraded after {} consecutive flaky releases",
                        slot.id,
                        slot.flaky_strikes
                    );
                    slot.health = Health::Degraded;
                }
            }
            ReleaseOutcome::Dead => unreachable!(),
        }

        // A session that cannot be reset is not safe to lend out again.
        if let Err(err) = slot.session.reset().await {
            engine_warn!("session {} failed to reset ({err}), discarding", slot.id);
            slot.health = Health::Dead;
            self.quit_slot(slot).await;
            return;
        }

        {
            let mut state = self.shared.state.lock().expect("pool mutex poisoned");
            if !state.draining {
                state.idle.push_back(slot);
                drop(state);
                self.shared.availability.notify_waiters();
                return;
            }
        }
        // Raced with drain; quit the session instead of re-idling it.
        self.quit_slot(slot).await;
    }

    /// Scoped teardown: wait for all leased sessions to come back, then quit
    /// every session. After draining, `acquire` fails with `Exhausted`.
    pub async fn drain(&self) {
        {
            let mut state = self.shared.state.lock().expect("pool mutex poisoned");
            state.draining = true;
        }
        self.shared.availability.notify_waiters();

        loop {
            let notified = self.shared.availability.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            let idle: Option<Vec<Slot>> = {
                let mut state = self.shared.state.lock().expect("pool mutex poisoned");
                if state.live == state.idle.len() + state.orphaned.len() {
                    let mut slots: Vec<Slot> = state.idle.drain(..).collect();
                    slots.append(&mut state.orphaned);
                    state.live = 0;
                    Some(slots)
                } else {
                    None
                }
            };
            match idle {
                Some(slots) => {
                    let count = slots.len();
                    for slot in slots {
                        if let Err(err) = slot.session.quit().await {
                            engine_warn!("session {} failed to quit cleanly: {err}", slot.id);
                        }
                    }
                    engine_info!("session pool drained ({count} sessions quit)");
                    return;
                }
                None => notified.await,
            }
        }
    }

    async fn create_slot(&self) -> Result<Slot, CreateFailure> {
        // `live` was already incremented by the caller to reserve the slot.
        match self.factory.create(self.visibility).await {
            Ok(session) => {
                let id = {
                    let mut state = self.shared.state.lock().expect("pool mutex poisoned");
                    state.create_failures = 0;
                    let id = state.next_id;
                    state.next_id += 1;
                    id
                };
                Ok(Slot {
                    id,
                    session,
                    health: Health::Healthy,
                    flaky_strikes: 0,
                    created_at: Instant::now(),
                })
            }
            Err(err) => {
                let failures = {
                    let mut state = self.shared.state.lock().expect("pool mutex poisoned");
                    state.live -= 1;
                    state.create_failures += 1;
                    state.create_failures
                };
                self.shared.availability.notify_waiters();
                engine_warn!("session creation failed ({failures} in a row): {err}");
                if failures >= MAX_CREATE_FAILURES {
                    Err(CreateFailure::Fatal(PoolError::Unavailable {
                        attempts: failures,
                        last: err.to_string(),
                    }))
                } else {
                    Err(CreateFailure::Retry)
                }
            }
        }
    }

    async fn quit_slot(&self, slot: Slot) {
        if let Err(err) = slot.session.quit().await {
            engine_warn!("session {} failed to quit cleanly: {err}", slot.id);
        }
        let mut state = self.shared.state.lock().expect("pool mutex poisoned");
        state.live -= 1;
        drop(state);
        self.shared.availability.notify_waiters();
    }
}
