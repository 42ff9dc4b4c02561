use crate::hooks::{Blocker, Hooks};
use crate::scheduler::Handle;
use crate::task::{self, TaskId};

use parking_lot::Mutex;
use std::collections::VecDeque;
use std::fmt;
use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// A fair counting semaphore.
///
/// Permits are handed to waiting tasks in the order they asked for them: a
/// released permit goes straight to the oldest waiter and never back to
/// the pool while someone is queued, so a task calling
/// [`acquire`](Self::acquire) cannot overtake one that is already waiting.
///
/// ```rust,ignore
/// let pool = weft::sync::Pool::new("db", 2);
///
/// let permit = pool.acquire().await?;
/// // at most two tasks get here at the same time
/// drop(permit);
/// ```
#[derive(Clone)]
pub struct Pool {
    inner: Arc<Inner>,
}

struct Inner {
    blocker: Blocker,
    state: Mutex<State>,
}

struct State {
    available: usize,
    waiters: VecDeque<Ticket>,
}

struct Ticket {
    task: TaskId,
    handle: Handle,
    granted: Arc<AtomicBool>,
}

/// A slot taken from a [`Pool`]. Dropping it gives the slot back.
#[must_use = "the slot is released as soon as the permit is dropped"]
pub struct Permit {
    inner: Arc<Inner>,
}

impl Pool {
    /// Creates a pool of `slots` permits. `name` shows up in traces.
    pub fn new(name: &str, slots: usize) -> Self {
        Self {
            inner: Arc::new(Inner {
                blocker: Blocker::new(name),
                state: Mutex::new(State {
                    available: slots,
                    waiters: VecDeque::new(),
                }),
            }),
        }
    }

    /// Takes a permit, suspending the current task until one is handed to it.
    ///
    /// Fails if the scheduler cannot suspend the task; the place in the
    /// queue is given up in that case.
    ///
    /// # Panics
    ///
    /// Panics if called outside of a task.
    pub async fn acquire(&self) -> io::Result<Permit> {
        let Some(task) = task::current() else {
            panic!("Pool::acquire on {} called outside of a task", self.inner.blocker);
        };
        let handle = Handle::current();

        let granted = {
            let mut state = self.inner.state.lock();
            if state.available > 0 && state.waiters.is_empty() {
                state.available -= 1;
                return Ok(self.permit());
            }

            let granted = Arc::new(AtomicBool::new(false));
            state.waiters.push_back(Ticket {
                task,
                handle: handle.clone(),
                granted: granted.clone(),
            });
            granted
        };

        let queued = Queued {
            inner: &self.inner,
            granted: &granted,
            done: false,
        };

        loop {
            // Subscribed before the check: a hand-off landing in between
            // still wakes this task.
            let wait = handle.block(&self.inner.blocker, None);
            if granted.load(Ordering::Acquire) {
                break;
            }
            wait.await?;
        }

        queued.complete();
        Ok(self.permit())
    }

    /// Takes a permit if one is free and nobody is waiting.
    pub fn try_acquire(&self) -> Option<Permit> {
        let mut state = self.inner.state.lock();
        if state.available == 0 || !state.waiters.is_empty() {
            return None;
        }

        state.available -= 1;
        Some(self.permit())
    }

    /// Returns the number of permits not held by anyone.
    pub fn available(&self) -> usize {
        self.inner.state.lock().available
    }

    fn permit(&self) -> Permit {
        Permit {
            inner: self.inner.clone(),
        }
    }
}

impl Inner {
    fn release(&self) {
        let next = {
            let mut state = self.state.lock();
            match state.waiters.pop_front() {
                Some(ticket) => {
                    ticket.granted.store(true, Ordering::Release);
                    Some(ticket)
                }
                None => {
                    state.available += 1;
                    None
                }
            }
        };

        if let Some(ticket) = next {
            tracing::trace!(task = %ticket.task, pool = %self.blocker, "permit handed off");
            ticket.handle.unblock(&self.blocker, ticket.task);
        }
    }
}

/// Leaves the wait queue if `acquire` is dropped before it returns.
struct Queued<'a> {
    inner: &'a Arc<Inner>,
    granted: &'a Arc<AtomicBool>,
    done: bool,
}

impl Queued<'_> {
    fn complete(mut self) {
        self.done = true;
    }
}

impl Drop for Queued<'_> {
    fn drop(&mut self) {
        if self.done {
            return;
        }

        let handed_off = {
            let mut state = self.inner.state.lock();
            let granted = self.granted.load(Ordering::Acquire);
            if !granted {
                state
                    .waiters
                    .retain(|ticket| !Arc::ptr_eq(&ticket.granted, self.granted));
            }
            granted
        };

        // The permit arrived but nobody will use it.
        if handed_off {
            self.inner.release();
        }
    }
}

impl Drop for Permit {
    fn drop(&mut self) {
        self.inner.release();
    }
}

impl fmt::Debug for Pool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.state.lock();
        f.debug_struct("Pool")
            .field("name", &self.inner.blocker.name())
            .field("available", &state.available)
            .field("waiting", &state.waiters.len())
            .finish()
    }
}

impl fmt::Debug for Permit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Permit").field(&self.inner.blocker.name()).finish()
    }
}
