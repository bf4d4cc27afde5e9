mod common;

use std::sync::Arc;
use std::time::Duration;

use common::FakeFactory;
use pretty_assertions::assert_eq;
use progscan_engine::{Health, PoolError, ReleaseOutcome, SessionPool, Visibility};

const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(5);

fn pool_with(factory: FakeFactory, capacity: usize) -> (Arc<SessionPool>, Arc<FakeFactory>) {
    engine_logging::initialize_for_tests();
    let factory = Arc::new(factory);
    let as_factory: Arc<dyn progscan_engine::SessionFactory> = factory.clone();
    let pool = Arc::new(SessionPool::new(as_factory, capacity, Visibility::Headless));
    (pool, factory)
}

#[tokio::test]
async fn in_use_never_exceeds_capacity_under_contention() {
    let (pool, _factory) = pool_with(FakeFactory::new(), 3);

    let mut handles = Vec::new();
    for worker in 0..16u64 {
        let pool = Arc::clone(&pool);
        handles.push(tokio::spawn(async move {
            for round in 0..5u64 {
                let lease = pool.acquire(ACQUIRE_TIMEOUT).await.expect("acquire");
                assert!(pool.in_use() <= 3, "in_use exceeded capacity");
                tokio::time::sleep(Duration::from_millis((worker + round) % 4)).await;
                pool.release(lease, ReleaseOutcome::Ok).await;
            }
        }));
    }
    for handle in handles {
        handle.await.expect("worker panicked");
    }

    assert!(pool.live_sessions() <= 3);
    assert_eq!(pool.in_use(), 0);
}

#[tokio::test]
async fn blocked_acquire_is_woken_by_release() {
    let (pool, _factory) = pool_with(FakeFactory::new(), 1);

    let held = pool.acquire(ACQUIRE_TIMEOUT).await.expect("first acquire");
    let waiter = {
        let pool = Arc::clone(&pool);
        tokio::spawn(async move { pool.acquire(Duration::from_secs(2)).await })
    };

    tokio::time::sleep(Duration::from_millis(50)).await;
    pool.release(held, ReleaseOutcome::Ok).await;

    let lease = waiter
        .await
        .expect("waiter panicked")
        .expect("waiter should get the released session");
    pool.release(lease, ReleaseOutcome::Ok).await;
}

#[tokio::test]
async fn acquire_times_out_when_pool_is_saturated() {
    let (pool, _factory) = pool_with(FakeFactory::new(), 1);

    let held = pool.acquire(ACQUIRE_TIMEOUT).await.expect("acquire");
    let err = pool
        .acquire(Duration::from_millis(80))
        .await
        .expect_err("saturated pool must time out");
    assert!(matches!(err, PoolError::Exhausted { .. }));

    pool.release(held, ReleaseOutcome::Ok).await;
}

#[tokio::test]
async fn three_consecutive_creation_failures_are_fatal() {
    let (pool, factory) = pool_with(FakeFactory::failing_first(usize::MAX), 2);

    let err = pool
        .acquire(ACQUIRE_TIMEOUT)
        .await
        .expect_err("creation never succeeds");
    assert_eq!(
        err,
        PoolError::Unavailable {
            attempts: 3,
            last: "webdriver failure: chromedriver refused the session".to_string(),
        }
    );
    assert_eq!(factory.alive(), 0);
}

#[tokio::test]
async fn creation_retries_through_transient_failures() {
    let (pool, factory) = pool_with(FakeFactory::failing_first(2), 1);

    let lease = pool
        .acquire(ACQUIRE_TIMEOUT)
        .await
        .expect("third attempt succeeds");
    assert_eq!(factory.created(), 1);
    pool.release(lease, ReleaseOutcome::Ok).await;
}

#[tokio::test]
async fn warm_start_fills_the_pool_up_front() {
    let (pool, factory) = pool_with(FakeFactory::new(), 3);

    pool.warm_start().await.expect("warm start");

    assert_eq!(pool.live_sessions(), 3);
    assert_eq!(pool.in_use(), 0);
    assert_eq!(factory.created(), 3);
}

#[tokio::test]
async fn drain_quits_every_session_and_blocks_new_acquires() {
    let (pool, factory) = pool_with(FakeFactory::new(), 2);

    let a = pool.acquire(ACQUIRE_TIMEOUT).await.expect("acquire a");
    let b = pool.acquire(ACQUIRE_TIMEOUT).await.expect("acquire b");
    pool.release(a, ReleaseOutcome::Ok).await;
    pool.release(b, ReleaseOutcome::Ok).await;

    pool.drain().await;

    assert_eq!(factory.alive(), 0);
    assert_eq!(pool.live_sessions(), 0);
    let err = pool
        .acquire(Duration::from_millis(50))
        .await
        .expect_err("drained pool rejects acquires");
    assert!(matches!(err, PoolError::Exhausted { .. }));
}

#[tokio::test]
async fn drain_waits_for_in_flight_leases() {
    let (pool, factory) = pool_with(FakeFactory::new(), 1);

    let lease = pool.acquire(ACQUIRE_TIMEOUT).await.expect("acquire");
    let holder = {
        let pool = Arc::clone(&pool);
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(80)).await;
            pool.release(lease, ReleaseOutcome::Ok).await;
        })
    };

    pool.drain().await;
    holder.await.expect("holder panicked");

    assert_eq!(factory.alive(), 0);
}

#[tokio::test]
async fn dead_release_replaces_the_session_on_next_acquire() {
    let (pool, factory) = pool_with(FakeFactory::new(), 1);

    let first = pool.acquire(ACQUIRE_TIMEOUT).await.expect("acquire");
    let first_id = first.session_id();
    pool.release(first, ReleaseOutcome::Dead).await;
    assert_eq!(factory.alive(), 0);

    let second = pool.acquire(ACQUIRE_TIMEOUT).await.expect("backfill");
    assert_ne!(second.session_id(), first_id);
    assert_eq!(factory.created(), 2);
    pool.release(second, ReleaseOutcome::Ok).await;
}

#[tokio::test]
async fn two_consecutive_flaky_releases_degrade_the_session() {
    let (pool, _factory) = pool_with(FakeFactory::new(), 1);

    let lease = pool.acquire(ACQUIRE_TIMEOUT).await.expect("acquire");
    pool.release(lease, ReleaseOutcome::Flaky).await;
    let lease = pool.acquire(ACQUIRE_TIMEOUT).await.expect("reacquire");
    assert_eq!(lease.health(), Health::Healthy);
    pool.release(lease, ReleaseOutcome::Flaky).await;

    let lease = pool.acquire(ACQUIRE_TIMEOUT).await.expect("reacquire");
    assert_eq!(lease.health(), Health::Degraded);
    pool.release(lease, ReleaseOutcome::Ok).await;
}

#[tokio::test]
async fn an_ok_release_clears_the_flaky_streak() {
    let (pool, _factory) = pool_with(FakeFactory::new(), 1);

    for outcome in [
        ReleaseOutcome::Flaky,
        ReleaseOutcome::Ok,
        ReleaseOutcome::Flaky,
    ] {
        let lease = pool.acquire(ACQUIRE_TIMEOUT).await.expect("acquire");
        pool.release(lease, outcome).await;
    }

    let lease = pool.acquire(ACQUIRE_TIMEOUT).await.expect("acquire");
    assert_eq!(lease.health(), Health::Healthy);
    pool.release(lease, ReleaseOutcome::Ok).await;
}

#[tokio::test]
async fn leaked_lease_returns_slot_capacity() {
    let (pool, factory) = pool_with(FakeFactory::new(), 1);

    let lease = pool.acquire(ACQUIRE_TIMEOUT).await.expect("acquire");
    drop(lease);

    assert_eq!(pool.in_use(), 0);
    let lease = pool
        .acquire(ACQUIRE_TIMEOUT)
        .await
        .expect("slot usable again after leak");
    // The abandoned browser was quit on the way; only the replacement lives.
    assert_eq!(factory.created(), 2);
    assert_eq!(factory.alive(), 1);
    pool.release(lease, ReleaseOutcome::Ok).await;
}

#[tokio::test]
async fn drain_quits_sessions_abandoned_by_a_panicked_holder() {
    let (pool, factory) = pool_with(FakeFactory::new(), 1);

    let lease = pool.acquire(ACQUIRE_TIMEOUT).await.expect("acquire");
    let holder = tokio::spawn(async move {
        let _lease = lease;
        panic!("harvester blew up mid-task");
    });
    assert!(holder.await.is_err());

    pool.drain().await;
    assert_eq!(factory.alive(), 0, "a browser outlived the drain");
    assert_eq!(pool.live_sessions(), 0);
}

#[tokio::test]
async fn a_session_that_cannot_reset_is_discarded() {
    let (pool, factory) = pool_with(FakeFactory::with_failing_reset(), 1);

    let lease = pool.acquire(ACQUIRE_TIMEOUT).await.expect("acquire");
    pool.release(lease, ReleaseOutcome::Ok).await;

    assert_eq!(factory.alive(), 0);
    assert_eq!(pool.live_sessions(), 0);
}
