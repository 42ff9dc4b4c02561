use std::thread;
use std::time::Duration;

use weft::sync::Queue;
use weft::{task, time};

#[weft::test]
async fn test_pop_waits_for_push_from_another_thread() {
    let queue = Queue::new("inbox");

    let producer = {
        let queue = queue.clone();
        thread::spawn(move || {
            for i in 0..3 {
                thread::sleep(Duration::from_millis(5));
                queue.push(i).unwrap();
            }
        })
    };

    let mut received = Vec::new();
    for _ in 0..3 {
        received.push(queue.pop().await.unwrap().unwrap());
    }

    assert_eq!(received, vec![0, 1, 2]);
    producer.join().unwrap();
}

#[weft::test]
async fn test_close_wakes_waiting_consumer() {
    let queue: Queue<u32> = Queue::new("closing");

    let consumer = {
        let queue = queue.clone();
        task::spawn(async move { Ok::<_, anyhow::Error>(queue.pop().await?) })
    };

    time::sleep(Duration::from_millis(10)).await.unwrap();
    queue.close();

    assert_eq!(consumer.await.unwrap(), None);
    assert!(queue.is_closed());
}

#[weft::test]
async fn test_items_survive_close() {
    let queue = Queue::new("drain");
    queue.push("a").unwrap();
    queue.push("b").unwrap();
    queue.close();

    assert_eq!(queue.push("c"), Err("c"));
    assert_eq!(queue.len(), 2);
    assert_eq!(queue.pop().await.unwrap(), Some("a"));
    assert_eq!(queue.try_pop(), Some("b"));
    assert_eq!(queue.pop().await.unwrap(), None);
    assert!(queue.is_empty());
}

#[weft::test]
async fn test_several_consumers_share_the_work() {
    let queue = Queue::new("work");

    let consumers: Vec<_> = (0..3)
        .map(|_| {
            let queue = queue.clone();
            task::spawn(async move {
                let mut sum = 0u64;
                while let Some(item) = queue.pop().await? {
                    sum += item;
                }
                Ok::<_, anyhow::Error>(sum)
            })
        })
        .collect();

    let producer = {
        let queue = queue.clone();
        thread::spawn(move || {
            for i in 1..=100u64 {
                queue.push(i).unwrap();
                if i % 10 == 0 {
                    thread::sleep(Duration::from_millis(1));
                }
            }
            queue.close();
        })
    };

    let sums = task::await_all(consumers).await.unwrap();
    producer.join().unwrap();

    assert_eq!(sums.iter().sum::<u64>(), 5050);
}
