/*!
 * Event and Condition Tests
 */

use coop_sync::{Condition, Cx, Event, Lock, SyncError};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;

#[tokio::test]
async fn test_event_releases_every_waiter() {
    let event = Arc::new(Event::new());
    let tasks: Vec<_> = (0..5)
        .map(|_| {
            let event = Arc::clone(&event);
            tokio::spawn(async move { event.wait(&Cx::new()).await })
        })
        .collect();

    tokio::task::yield_now().await;
    event.set();
    event.clear();

    for task in tasks {
        assert!(task.await.unwrap().unwrap());
    }
    assert!(!event.is_set());
}

#[tokio::test]
async fn test_event_wait_after_set_returns_immediately() {
    let event = Event::new();
    event.set();
    assert!(event.wait(&Cx::new()).await.unwrap());
}

#[tokio::test]
async fn test_condition_producer_consumer() {
    let condition = Arc::new(Condition::new());
    let queue = Arc::new(Mutex::new(VecDeque::new()));

    let consumer = {
        let condition = Arc::clone(&condition);
        let queue = Arc::clone(&queue);
        tokio::spawn(async move {
            let cx = Cx::new();
            let mut received = Vec::new();
            while received.len() < 3 {
                condition.acquire(&cx).await.unwrap();
                condition
                    .wait_for(&cx, || !queue.lock().is_empty())
                    .await
                    .unwrap();
                received.extend(queue.lock().drain(..));
                condition.release().unwrap();
            }
            received
        })
    };

    let cx = Cx::new();
    for item in 1..=3 {
        tokio::task::yield_now().await;
        condition.acquire(&cx).await.unwrap();
        queue.lock().push_back(item);
        condition.notify(1).unwrap();
        condition.release().unwrap();
    }

    assert_eq!(consumer.await.unwrap(), vec![1, 2, 3]);
}

#[tokio::test]
async fn test_notify_all_wakes_in_order() {
    let condition = Arc::new(Condition::new());
    let order = Arc::new(Mutex::new(Vec::new()));

    let tasks: Vec<_> = (0..3)
        .map(|id| {
            let condition = Arc::clone(&condition);
            let order = Arc::clone(&order);
            tokio::spawn(async move {
                let cx = Cx::new();
                condition.acquire(&cx).await.unwrap();
                condition.wait(&cx).await.unwrap();
                order.lock().push(id);
                condition.release().unwrap();
            })
        })
        .collect();

    tokio::task::yield_now().await;
    let cx = Cx::new();
    condition.acquire(&cx).await.unwrap();
    assert_eq!(condition.waiter_count(), 3);
    assert_eq!(condition.notify_all().unwrap(), 3);
    condition.release().unwrap();

    for task in tasks {
        task.await.unwrap();
    }
    assert_eq!(*order.lock(), vec![0, 1, 2]);
}

#[tokio::test]
async fn test_shared_lock_between_conditions() {
    let lock = Arc::new(Lock::new());
    let first = Condition::with_lock(Arc::clone(&lock));
    let second = Condition::with_lock(Arc::clone(&lock));
    let cx = Cx::new();

    first.acquire(&cx).await.unwrap();
    assert!(second.locked());
    assert_eq!(second.notify(1).unwrap(), 0);
    second.release().unwrap();
    assert!(!lock.locked());
}

#[test]
fn test_notify_without_lock_fails() {
    let condition = Condition::new();
    assert!(matches!(condition.notify(1), Err(SyncError::LockState(_))));
    assert!(matches!(condition.notify_all(), Err(SyncError::LockState(_))));
}
