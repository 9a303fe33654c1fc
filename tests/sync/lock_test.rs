/*!
 * Lock Tests
 *
 * Mutual exclusion and hand-off order under real task interleaving
 */

use coop_sync::{Cx, Lock, SyncError};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

#[tokio::test]
async fn test_mutual_exclusion() {
    let lock = Arc::new(Lock::new());
    let inside = Arc::new(AtomicUsize::new(0));
    let max_inside = Arc::new(AtomicUsize::new(0));

    let tasks: Vec<_> = (0..8)
        .map(|_| {
            let lock = Arc::clone(&lock);
            let inside = Arc::clone(&inside);
            let max_inside = Arc::clone(&max_inside);
            tokio::spawn(async move {
                let cx = Cx::new();
                for _ in 0..10 {
                    lock.acquire(&cx).await.unwrap();
                    let now = inside.fetch_add(1, Ordering::SeqCst) + 1;
                    max_inside.fetch_max(now, Ordering::SeqCst);
                    tokio::task::yield_now().await;
                    inside.fetch_sub(1, Ordering::SeqCst);
                    lock.release().unwrap();
                    tokio::task::yield_now().await;
                }
            })
        })
        .collect();

    for task in tasks {
        task.await.unwrap();
    }
    assert_eq!(max_inside.load(Ordering::SeqCst), 1);
    assert!(!lock.locked());
}

#[tokio::test]
async fn test_waiters_acquire_in_arrival_order() {
    let lock = Arc::new(Lock::new());
    let order = Arc::new(Mutex::new(Vec::new()));
    let cx = Cx::new();
    lock.acquire(&cx).await.unwrap();

    let tasks: Vec<_> = (0..4)
        .map(|id| {
            let lock = Arc::clone(&lock);
            let order = Arc::clone(&order);
            tokio::spawn(async move {
                let cx = Cx::new();
                lock.acquire(&cx).await.unwrap();
                order.lock().push(id);
                lock.release().unwrap();
            })
        })
        .collect();

    // Let every task queue up in spawn order.
    for _ in 0..4 {
        tokio::task::yield_now().await;
    }
    assert_eq!(lock.waiter_count(), 4);
    lock.release().unwrap();

    for task in tasks {
        task.await.unwrap();
    }
    assert_eq!(*order.lock(), vec![0, 1, 2, 3]);
}

#[tokio::test]
async fn test_cancelled_waiter_does_not_stall_queue() {
    let lock = Arc::new(Lock::new());
    let holder = Cx::new();
    lock.acquire(&holder).await.unwrap();

    let victim_cx = Cx::new();
    let victim = {
        let lock = Arc::clone(&lock);
        let cx = victim_cx.clone();
        tokio::spawn(async move { lock.acquire(&cx).await })
    };
    let survivor = {
        let lock = Arc::clone(&lock);
        tokio::spawn(async move {
            let cx = Cx::new();
            lock.acquire(&cx).await.unwrap();
            lock.release().unwrap();
        })
    };
    tokio::task::yield_now().await;
    tokio::task::yield_now().await;

    lock.release().unwrap();
    victim_cx.cancel();

    assert!(matches!(victim.await.unwrap(), Err(SyncError::Cancelled)));
    survivor.await.unwrap();
    assert!(!lock.locked());
}

#[test]
fn test_release_error_names_primitive() {
    let err = Lock::new().release().unwrap_err();
    assert_eq!(err.to_string(), "Lock is not acquired");
}
