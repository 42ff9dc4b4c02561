use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use weft::{task, time};

#[weft::test]
async fn test_sleep_waits_at_least_the_duration() {
    let start = Instant::now();
    time::sleep(Duration::from_millis(50)).await.unwrap();
    assert!(start.elapsed() >= Duration::from_millis(50));
}

#[weft::test]
async fn test_sleeps_run_concurrently() {
    let start = Instant::now();

    let sleepers: Vec<_> = (0..3u64)
        .map(|i| {
            task::spawn(async move {
                time::sleep(Duration::from_millis(100)).await.unwrap();
                Ok::<_, anyhow::Error>(i)
            })
        })
        .collect();

    let done = task::await_all(sleepers).await.unwrap();
    let elapsed = start.elapsed();

    assert_eq!(done, vec![0, 1, 2]);
    assert!(elapsed >= Duration::from_millis(100));
    assert!(elapsed < Duration::from_millis(250), "took {elapsed:?}");
}

#[weft::test]
async fn test_shorter_sleep_finishes_first() {
    let order = Arc::new(Mutex::new(Vec::new()));

    let slow = {
        let order = order.clone();
        task::spawn(async move {
            time::sleep(Duration::from_millis(60)).await.unwrap();
            order.lock().push("slow");
            Ok::<_, anyhow::Error>(())
        })
    };
    let fast = {
        let order = order.clone();
        task::spawn(async move {
            time::sleep(Duration::from_millis(10)).await.unwrap();
            order.lock().push("fast");
            Ok::<_, anyhow::Error>(())
        })
    };

    task::await_all([slow, fast]).await.unwrap();
    assert_eq!(*order.lock(), vec!["fast", "slow"]);
}

#[weft::test]
async fn test_yield_now_interleaves_tasks() {
    let log = Arc::new(Mutex::new(Vec::new()));

    let child = {
        let log = log.clone();
        task::spawn(async move {
            for _ in 0..3 {
                log.lock().push("child");
                time::yield_now().await.unwrap();
            }
            Ok::<_, anyhow::Error>(())
        })
    };

    for _ in 0..3 {
        log.lock().push("root");
        time::yield_now().await.unwrap();
    }

    child.await.unwrap();
    assert_eq!(
        *log.lock(),
        vec!["child", "root", "child", "root", "child", "root"]
    );
}

#[weft::test]
async fn test_dropped_sleep_is_cancelled() {
    let abandoned = time::sleep(Duration::from_millis(10));
    drop(abandoned);

    let start = Instant::now();
    time::sleep(Duration::from_millis(40)).await.unwrap();
    assert!(start.elapsed() >= Duration::from_millis(40));
}

#[weft::test]
async fn test_late_timer_of_dropped_sleep_is_discarded() {
    let abandoned = time::sleep(Duration::from_millis(1));

    // The timer fires while the scheduler thread is busy, so its event is
    // already queued when the sleep is dropped.
    thread::sleep(Duration::from_millis(30));
    drop(abandoned);

    time::sleep(Duration::from_millis(20)).await.unwrap();
    time::sleep(Duration::from_millis(1)).await.unwrap();
}
