//! Worker pool contract tests: backpressure, drain completeness, and the
//! terminal drained state.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Notify;
use tokio::time::timeout;

use bloom_audit::{Error, WorkerPool};

#[tokio::test]
async fn submitting_past_capacity_blocks_until_a_slot_frees() {
    const CAPACITY: usize = 3;
    let pool = Arc::new(WorkerPool::new(CAPACITY));
    let release = Arc::new(Notify::new());
    let started = Arc::new(AtomicU64::new(0));

    // Fill every slot with tasks that park until released.
    for _ in 0..CAPACITY {
        let release = Arc::clone(&release);
        let started = Arc::clone(&started);
        pool.submit(async move {
            started.fetch_add(1, Ordering::SeqCst);
            release.notified().await;
        })
        .await
        .unwrap();
    }

    // The (W+1)th submission must not be admitted while all W occupants
    // are still running.
    let extra = {
        let pool = Arc::clone(&pool);
        tokio::spawn(async move { pool.submit(async {}).await.unwrap() })
    };
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(started.load(Ordering::SeqCst), CAPACITY as u64);
    assert!(!extra.is_finished(), "submit admitted past capacity");

    release.notify_waiters();
    timeout(Duration::from_secs(2), extra)
        .await
        .expect("submit should unblock after a completion")
        .unwrap();
    pool.drain().await;
}

#[tokio::test]
async fn drain_makes_every_side_effect_observable() {
    let pool = WorkerPool::new(4);
    let counter = Arc::new(AtomicU64::new(0));

    for i in 0..100u64 {
        let counter = Arc::clone(&counter);
        pool.submit(async move {
            // Stagger completions so drain really waits.
            tokio::time::sleep(Duration::from_micros(i * 10)).await;
            counter.fetch_add(1, Ordering::SeqCst);
        })
        .await
        .unwrap();
    }

    pool.drain().await;
    assert_eq!(counter.load(Ordering::SeqCst), 100);
}

#[tokio::test]
async fn drained_pool_rejects_submissions() {
    let pool = WorkerPool::new(2);
    pool.submit(async {}).await.unwrap();
    pool.drain().await;

    let err = pool.submit(async {}).await.unwrap_err();
    assert!(matches!(err, Error::PoolDrained));
}

#[tokio::test]
async fn tasks_complete_in_any_order() {
    let pool = WorkerPool::new(8);
    let order = Arc::new(std::sync::Mutex::new(Vec::new()));

    for i in 0..8u64 {
        let order = Arc::clone(&order);
        pool.submit(async move {
            // Reverse the sleep schedule so later submissions finish first.
            tokio::time::sleep(Duration::from_millis(80 - i * 10)).await;
            order.lock().unwrap().push(i);
        })
        .await
        .unwrap();
    }
    pool.drain().await;

    let mut order = order.lock().unwrap().clone();
    assert_eq!(order.len(), 8);
    order.sort_unstable();
    assert_eq!(order, (0..8).collect::<Vec<_>>());
}
