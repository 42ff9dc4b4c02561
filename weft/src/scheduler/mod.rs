//! The scheduler loop.
//!
//! [`Scheduler::block_on`] turns the calling thread into the scheduler
//! thread: it polls the root task, then waits on the event queue and
//! handles one event at a time until the root task completes. Reactor
//! callbacks and wakers running on other threads never touch task state;
//! they only enqueue events.

mod builder;
mod handle;
mod resolver;

pub(crate) mod channel;
pub(crate) mod pending;
pub(crate) mod shared;
pub(crate) mod suspend;

pub use builder::{DEFAULT_MAX_READ, SchedulerBuilder};
pub use handle::Handle;

use self::pending::Delivery;
use self::resolver::Resolver;
use self::shared::{Event, Shared};
use crate::context;
use crate::reactor::Reactor;
use crate::task::{BoxFuture, Runnable, Task, TaskId};

use crossbeam_channel::{Receiver, unbounded};
use std::future::Future;
use std::sync::Arc;

/// A single-threaded cooperative scheduler driven by a [`Reactor`].
///
/// Dropping the scheduler closes it.
pub struct Scheduler {
    handle: Handle,
    receiver: Receiver<Event>,
}

impl Scheduler {
    pub(crate) fn new(reactor: Arc<dyn Reactor>, max_read: usize, resolver_thread_name: String) -> Self {
        let (sender, receiver) = unbounded();
        let resolver = Resolver::new(resolver_thread_name);
        let shared = Arc::new(Shared::new(reactor, sender, resolver, max_read));

        Self {
            handle: Handle { shared },
            receiver,
        }
    }

    /// Returns a handle to this scheduler.
    pub fn handle(&self) -> &Handle {
        &self.handle
    }

    /// Runs `future` as the root task and drives every task until it
    /// completes.
    ///
    /// # Panics
    ///
    /// Panics if a root task is already running on this scheduler, if the
    /// scheduler was closed, or if the root task panicked or was dropped
    /// by [`Handle::close`].
    pub fn block_on<F>(&self, future: F) -> F::Output
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        let shared = &self.handle.shared;
        assert!(!shared.is_closed(), "block_on called on a closed scheduler");

        let id = TaskId::next();
        {
            let mut root = shared.root.lock();
            assert!(
                root.is_none(),
                "block_on called while the scheduler is already running a root task"
            );
            *root = Some(id);
        }

        let body: BoxFuture<F::Output> = Box::pin(async move { Ok(future.await) });
        let root = Arc::new(Task::new(id, None, body, shared));
        shared.tasks.lock().insert(id, root.clone());

        tracing::debug!(task = %id, "block_on");

        let result = context::enter_scheduler(self.handle.clone(), || {
            root.clone().run();

            while !root.is_finished() {
                match self.receiver.recv() {
                    Ok(event) => self.dispatch(event),
                    Err(_) => break,
                }
            }

            root.take_result()
        });

        *shared.root.lock() = None;

        match result {
            Ok(output) => output,
            Err(error) => panic!("root task failed: {error:#}"),
        }
    }

    fn dispatch(&self, event: Event) {
        let shared = &self.handle.shared;

        if shared.is_closed() {
            return;
        }

        match event {
            Event::Wake(task) => shared.run_task(task),
            Event::Resume {
                task,
                op,
                leg,
                outcome,
            } => {
                let delivery = shared.pending.lock().deliver(task, op, leg, outcome);

                match delivery {
                    Delivery::Resume => {
                        tracing::trace!(task = %task, op = %op, ?leg, "resume");
                        shared.run_task(task);
                    }
                    Delivery::Ignored => {
                        tracing::trace!(task = %task, op = %op, ?leg, "stale event ignored");
                    }
                }
            }
            Event::Closed => {}
        }
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        self.handle.close();
    }
}
