//! Task-aware synchronization.
//!
//! Both primitives suspend waiting tasks through the scheduler's
//! [`block`](crate::Hooks::block) trap and wake them with
//! [`unblock`](crate::Hooks::unblock), so they can be released from any
//! thread.
//!
//! - [`Pool`] is a fair counting semaphore,
//! - [`Queue`] hands items from any thread to waiting tasks.

mod pool;
mod queue;

pub use pool::{Permit, Pool};
pub use queue::Queue;
