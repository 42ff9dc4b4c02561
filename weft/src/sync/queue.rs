use crate::hooks::{Blocker, Hooks};
use crate::scheduler::Handle;
use crate::task::{self, TaskId};

use parking_lot::Mutex;
use std::collections::VecDeque;
use std::fmt;
use std::io;
use std::sync::Arc;

/// A multi-producer queue whose consumers are tasks.
///
/// [`push`](Self::push) may be called from any thread, including threads
/// that are not running a scheduler; [`pop`](Self::pop) suspends the
/// calling task until an item arrives or the queue is closed.
pub struct Queue<T> {
    inner: Arc<Inner<T>>,
}

struct Inner<T> {
    blocker: Blocker,
    state: Mutex<State<T>>,
}

struct State<T> {
    items: VecDeque<T>,
    waiters: VecDeque<(TaskId, Handle)>,
    closed: bool,
}

impl<T> Queue<T> {
    pub fn new(name: &str) -> Self {
        Self {
            inner: Arc::new(Inner {
                blocker: Blocker::new(name),
                state: Mutex::new(State {
                    items: VecDeque::new(),
                    waiters: VecDeque::new(),
                    closed: false,
                }),
            }),
        }
    }

    /// Appends `item` and wakes the oldest waiting task.
    ///
    /// Returns the item back if the queue is closed.
    pub fn push(&self, item: T) -> Result<(), T> {
        let waiter = {
            let mut state = self.inner.state.lock();
            if state.closed {
                return Err(item);
            }

            state.items.push_back(item);
            state.waiters.pop_front()
        };

        if let Some((task, handle)) = waiter {
            handle.unblock(&self.inner.blocker, task);
        }

        Ok(())
    }

    /// Removes the oldest item, suspending the current task while the queue
    /// is empty. Returns `None` once the queue is closed and drained.
    ///
    /// Fails if the scheduler cannot suspend the task.
    ///
    /// # Panics
    ///
    /// Panics if called outside of a task.
    pub async fn pop(&self) -> io::Result<Option<T>> {
        let Some(task) = task::current() else {
            panic!("Queue::pop on {} called outside of a task", self.inner.blocker);
        };
        let handle = Handle::current();
        let waiting = Waiting {
            inner: &self.inner,
            task,
        };

        loop {
            let wait = handle.block(&self.inner.blocker, None);
            {
                let mut state = self.inner.state.lock();
                if let Some(item) = state.items.pop_front() {
                    state.waiters.retain(|(waiter, _)| *waiter != task);
                    drop(state);
                    waiting.complete();
                    return Ok(Some(item));
                }

                if state.closed {
                    drop(state);
                    waiting.complete();
                    return Ok(None);
                }

                if !state.waiters.iter().any(|(waiter, _)| *waiter == task) {
                    state.waiters.push_back((task, handle.clone()));
                }
            }
            wait.await?;
        }
    }

    /// Removes the oldest item without waiting.
    pub fn try_pop(&self) -> Option<T> {
        self.inner.state.lock().items.pop_front()
    }

    /// Closes the queue and wakes every waiting task.
    ///
    /// Items already queued can still be popped.
    pub fn close(&self) {
        let waiters: Vec<_> = {
            let mut state = self.inner.state.lock();
            state.closed = true;
            state.waiters.drain(..).collect()
        };

        for (task, handle) in waiters {
            handle.unblock(&self.inner.blocker, task);
        }
    }

    pub fn is_closed(&self) -> bool {
        self.inner.state.lock().closed
    }

    pub fn len(&self) -> usize {
        self.inner.state.lock().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T> Clone for Queue<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T> fmt::Debug for Queue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.state.lock();
        f.debug_struct("Queue")
            .field("name", &self.inner.blocker.name())
            .field("len", &state.items.len())
            .field("waiting", &state.waiters.len())
            .field("closed", &state.closed)
            .finish()
    }
}

/// Leaves the wait list if `pop` is dropped while suspended, passing a
/// wake-up it may have swallowed on to the next waiter.
struct Waiting<'a, T> {
    inner: &'a Arc<Inner<T>>,
    task: TaskId,
}

impl<T> Waiting<'_, T> {
    fn complete(self) {
        std::mem::forget(self);
    }
}

impl<T> Drop for Waiting<'_, T> {
    fn drop(&mut self) {
        let next = {
            let mut state = self.inner.state.lock();
            state.waiters.retain(|(waiter, _)| *waiter != self.task);

            if state.items.is_empty() {
                None
            } else {
                state.waiters.pop_front()
            }
        };

        if let Some((task, handle)) = next {
            handle.unblock(&self.inner.blocker, task);
        }
    }
}
