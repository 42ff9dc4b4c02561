//! Tasks: spawning, awaiting and identity.
//!
//! A task is a boxed future polled by the scheduler loop. Tasks spawned
//! from another (non-root) task remember it as their parent and announce
//! their completion on its await channel; tasks spawned from the root or
//! from outside the scheduler have no parent.

mod core;
mod handle;
mod id;
mod join;
mod state;
mod waker;

pub(crate) use self::core::{BoxFuture, Runnable, Task};

pub use handle::TaskHandle;
pub use id::TaskId;
pub use join::AwaitAll;
pub use state::TaskState;

use crate::context;
use crate::scheduler::Handle;

use std::future::Future;

/// Spawns `body` on the current scheduler.
///
/// When called from a task, the new task is polled once before `spawn`
/// returns.
///
/// # Panics
///
/// Panics if called outside of a scheduler.
///
/// # Examples
///
/// ```rust,ignore
/// let handle = weft::task::spawn(async { Ok::<_, anyhow::Error>(21 * 2) });
/// assert_eq!(handle.await?, 42);
/// ```
pub fn spawn<F, T, E>(body: F) -> TaskHandle<T>
where
    F: Future<Output = Result<T, E>> + Send + 'static,
    T: Send + 'static,
    E: Into<anyhow::Error> + 'static,
{
    Handle::current().spawn(body)
}

/// Waits for every task in `handles` and returns their results in handle
/// order, or the first error in handle order.
///
/// When `handles` contains children of the calling task, the returned
/// future starts waiting on their completion signals as soon as
/// `await_all` is called, like the trap operations of
/// [`Hooks`](crate::Hooks). Await it before starting any other suspending
/// operation, or drop it first.
///
/// # Panics
///
/// Panics if called outside of a scheduler. The calling task panics if it
/// suspends on another operation, such as a [`sleep`](crate::time::sleep),
/// while the returned future is alive and still waiting on children.
pub fn await_all<T, I>(handles: I) -> AwaitAll<T>
where
    T: Send + 'static,
    I: IntoIterator<Item = TaskHandle<T>>,
{
    Handle::current().await_all(handles)
}

/// Returns the id of the task being polled on this thread, if any.
pub fn current() -> Option<TaskId> {
    context::current_task()
}
