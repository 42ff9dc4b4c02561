//! Example: five workers sharing a two-slot pool.
//!
//! Each worker holds a slot for 200 ms, so the whole run takes about
//! 600 ms. Run with `RUST_LOG=weft=trace` to watch the hand-offs.

use std::time::{Duration, Instant};

use tracing_subscriber::EnvFilter;
use weft::sync::Pool;
use weft::{task, time};

#[weft::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let pool = Pool::new("workers", 2);
    let start = Instant::now();

    let workers: Vec<_> = (0..5)
        .map(|id| {
            let pool = pool.clone();
            task::spawn(async move {
                let _permit = pool.acquire().await?;
                println!("worker {id} got a slot at {:?}", start.elapsed());
                time::sleep(Duration::from_millis(200)).await?;
                Ok::<_, anyhow::Error>(id)
            })
        })
        .collect();

    let done = task::await_all(workers).await.unwrap();
    println!("workers {done:?} finished in {:?}", start.elapsed());
}
