use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use weft::sync::Pool;
use weft::{task, time};

#[weft::test]
async fn test_two_slots_five_workers() {
    let pool = Pool::new("workers", 2);
    let order = Arc::new(Mutex::new(Vec::new()));
    let start = Instant::now();

    let workers: Vec<_> = (0..5)
        .map(|id| {
            let pool = pool.clone();
            let order = order.clone();
            task::spawn(async move {
                let _permit = pool.acquire().await.unwrap();
                order.lock().push(id);
                time::sleep(Duration::from_millis(200)).await.unwrap();
                Ok::<_, anyhow::Error>(id)
            })
        })
        .collect();

    let done = task::await_all(workers).await.unwrap();
    let elapsed = start.elapsed();

    assert_eq!(done, vec![0, 1, 2, 3, 4]);
    assert_eq!(*order.lock(), vec![0, 1, 2, 3, 4]);
    assert!(elapsed >= Duration::from_millis(590), "took {elapsed:?}");
    assert!(elapsed < Duration::from_millis(1000), "took {elapsed:?}");
    assert_eq!(pool.available(), 2);
}

#[weft::test]
async fn test_try_acquire() {
    let pool = Pool::new("single", 1);

    let permit = pool.try_acquire().unwrap();
    assert_eq!(pool.available(), 0);
    assert!(pool.try_acquire().is_none());

    drop(permit);
    assert_eq!(pool.available(), 1);
    assert!(pool.try_acquire().is_some());
}

#[weft::test]
async fn test_released_permit_skips_the_pool_when_someone_waits() {
    let pool = Pool::new("handoff", 1);
    let held = pool.acquire().await.unwrap();

    let waiter = {
        let pool = pool.clone();
        task::spawn(async move {
            let _permit = pool.acquire().await.unwrap();
            Ok::<_, anyhow::Error>(())
        })
    };

    drop(held);

    // Handed to the waiter rather than returned to the pool.
    assert_eq!(pool.available(), 0);
    assert!(pool.try_acquire().is_none());

    waiter.await.unwrap();
    assert_eq!(pool.available(), 1);
}

#[weft::test]
async fn test_slot_returns_after_handoff() {
    let pool = Pool::new("abandon", 1);
    let held = pool.acquire().await.unwrap();

    let waiter = {
        let pool = pool.clone();
        task::spawn(async move {
            let _permit = pool.acquire().await.unwrap();
            Ok::<_, anyhow::Error>(())
        })
    };

    drop(held);
    waiter.await.unwrap();

    let again = pool.acquire().await.unwrap();
    assert_eq!(pool.available(), 0);
    drop(again);
    assert_eq!(pool.available(), 1);
}
