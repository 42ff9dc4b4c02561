//! # weft
//!
//! **weft** is a cooperative task scheduler. Task code is written in a
//! plain blocking style (`read`, `write`, `sleep`, wait-for-a-signal) and
//! every such call is *trapped*: instead of blocking the thread, the task
//! registers what it waits for with a [`Reactor`](reactor::Reactor) and
//! suspends until the reactor reports back.
//!
//! The scheduler runs on the thread that calls
//! [`Scheduler::block_on`]. Reactor callbacks may fire on any thread; they
//! only enqueue events, and the scheduler resumes exactly one task per
//! event, exactly once per suspension.
//!
//! - **Trap operations** live on the [`Hooks`] trait: `io_wait`,
//!   `io_read`, `io_write`, `kernel_sleep`, `block` and `unblock`
//! - **Tasks** can spawn children and await them; children report back to
//!   their parent over a publish/subscribe channel
//! - **Reactors** are pluggable; the `event-loop` feature (on by default)
//!   bundles an epoll / poll(2) implementation
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::time::Duration;
//! use weft::{task, time};
//!
//! #[weft::main]
//! async fn main() {
//!     let child = task::spawn(async {
//!         time::sleep(Duration::from_millis(100)).await?;
//!         Ok::<_, anyhow::Error>("done")
//!     });
//!
//!     println!("{}", child.await.unwrap());
//! }
//! ```
//!
//! ## Modules
//!
//! - [`task`]: spawning and awaiting tasks
//! - [`io`]: readiness, read and write on raw descriptors
//! - [`net`]: name resolution
//! - [`time`]: sleep and yield
//! - [`sync`]: task-aware pool and queue
//! - [`reactor`]: the reactor contract and the bundled event loop

mod context;
mod error;

pub mod hooks;
pub mod io;
pub mod net;
pub mod reactor;
pub mod scheduler;
pub mod sync;
pub mod task;
pub mod time;

pub use error::Error;
pub use hooks::{Blocker, Hooks, Trap};
pub use scheduler::{Handle, Scheduler, SchedulerBuilder};

pub use weft_macros::{main, test};
