/*!
 * Semaphore Tests
 */

use coop_sync::{BoundedSemaphore, Cx, Semaphore, SyncError};
use proptest::prelude::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

#[tokio::test]
async fn test_at_most_k_holders() {
    const PERMITS: usize = 3;
    let semaphore = Arc::new(Semaphore::new(PERMITS));
    let inside = Arc::new(AtomicUsize::new(0));
    let max_inside = Arc::new(AtomicUsize::new(0));

    let tasks: Vec<_> = (0..10)
        .map(|_| {
            let semaphore = Arc::clone(&semaphore);
            let inside = Arc::clone(&inside);
            let max_inside = Arc::clone(&max_inside);
            tokio::spawn(async move {
                let cx = Cx::new();
                for _ in 0..5 {
                    semaphore.acquire(&cx).await.unwrap();
                    let now = inside.fetch_add(1, Ordering::SeqCst) + 1;
                    max_inside.fetch_max(now, Ordering::SeqCst);
                    tokio::task::yield_now().await;
                    inside.fetch_sub(1, Ordering::SeqCst);
                    semaphore.release();
                }
            })
        })
        .collect();

    for task in tasks {
        task.await.unwrap();
    }
    assert!(max_inside.load(Ordering::SeqCst) <= PERMITS);
    assert_eq!(semaphore.value(), PERMITS);
}

#[tokio::test]
async fn test_waiters_resume_after_release() {
    let semaphore = Arc::new(Semaphore::new(0));
    let woken = Arc::new(AtomicUsize::new(0));

    let tasks: Vec<_> = (0..3)
        .map(|_| {
            let semaphore = Arc::clone(&semaphore);
            let woken = Arc::clone(&woken);
            tokio::spawn(async move {
                semaphore.acquire(&Cx::new()).await.unwrap();
                woken.fetch_add(1, Ordering::SeqCst);
            })
        })
        .collect();

    tokio::task::yield_now().await;
    assert!(semaphore.locked());
    semaphore.release();
    semaphore.release();
    tokio::task::yield_now().await;
    assert_eq!(woken.load(Ordering::SeqCst), 2);

    semaphore.release();
    for task in tasks {
        task.await.unwrap();
    }
    assert_eq!(woken.load(Ordering::SeqCst), 3);
    assert_eq!(semaphore.value(), 0);
}

#[tokio::test]
async fn test_bounded_semaphore_rejects_extra_release() {
    let semaphore = BoundedSemaphore::new(2);
    let cx = Cx::new();
    semaphore.acquire(&cx).await.unwrap();
    semaphore.release().unwrap();

    let err = semaphore.release().unwrap_err();
    assert_eq!(err, SyncError::BoundCapacity { bound: 2 });
    assert_eq!(semaphore.value(), 2);
}

proptest! {
    #[test]
    fn prop_try_acquire_respects_value(seed in 0usize..16, attempts in 0usize..32) {
        let semaphore = Semaphore::new(seed);
        let granted = (0..attempts).filter(|_| semaphore.try_acquire()).count();
        prop_assert_eq!(granted, attempts.min(seed));
        prop_assert_eq!(semaphore.value(), seed - granted);
        prop_assert_eq!(semaphore.locked(), granted == seed);
    }

    #[test]
    fn prop_bounded_value_never_exceeds_bound(
        bound in 1usize..8,
        ops in proptest::collection::vec(any::<bool>(), 0..64),
    ) {
        let semaphore = BoundedSemaphore::new(bound);
        for acquire in ops {
            if acquire {
                semaphore.try_acquire();
            } else {
                let _ = semaphore.release();
            }
            prop_assert!(semaphore.value() <= bound);
        }
    }
}
