use super::TaskId;
use super::state::{COMPLETED, RUNNING, SUSPENDED, TaskState};
use super::waker::make_waker;
use crate::context;
use crate::error::Error;
use crate::scheduler::channel::{AwaitSignal, await_channel};
use crate::scheduler::shared::{Event, Shared};

use crossbeam_channel::Sender;
use parking_lot::Mutex;
use std::any::Any;
use std::future::Future;
use std::mem;
use std::panic::{self, AssertUnwindSafe};
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::{Arc, Weak};
use std::task::{Context, Poll, Waker};

pub(crate) type BoxFuture<T> = Pin<Box<dyn Future<Output = anyhow::Result<T>> + Send>>;

/// A task as seen by the scheduler loop, independent of its output type.
pub(crate) trait Runnable: Send + Sync {
    /// Polls the task once on the scheduler thread.
    fn run(self: Arc<Self>);

    /// Drops the task's future and completes it with [`Error::Closed`].
    fn abandon(&self);
}

enum Slot<T> {
    Empty,
    Ready(anyhow::Result<T>),
    Taken,
}

/// A spawned task: its future, its result slot and the handles waiting on
/// it.
pub(crate) struct Task<T> {
    pub(crate) id: TaskId,
    pub(crate) parent: Option<TaskId>,
    state: AtomicU8,

    /// Set while a `Wake` event for this task is queued.
    notified: AtomicBool,

    future: Mutex<Option<BoxFuture<T>>>,
    result: Mutex<Slot<T>>,
    waiters: Mutex<Vec<Waker>>,
    events: Sender<Event>,
    shared: Weak<Shared>,
}

impl<T: Send + 'static> Task<T> {
    pub(crate) fn new(
        id: TaskId,
        parent: Option<TaskId>,
        future: BoxFuture<T>,
        shared: &Arc<Shared>,
    ) -> Self {
        Self {
            id,
            parent,
            state: AtomicU8::new(SUSPENDED),
            notified: AtomicBool::new(false),
            future: Mutex::new(Some(future)),
            result: Mutex::new(Slot::Empty),
            waiters: Mutex::new(Vec::new()),
            events: shared.events.clone(),
            shared: Arc::downgrade(shared),
        }
    }

    /// Creates a task that is already completed with `result`.
    pub(crate) fn completed(id: TaskId, result: anyhow::Result<T>, shared: &Arc<Shared>) -> Self {
        Self {
            id,
            parent: None,
            state: AtomicU8::new(COMPLETED),
            notified: AtomicBool::new(false),
            future: Mutex::new(None),
            result: Mutex::new(Slot::Ready(result)),
            waiters: Mutex::new(Vec::new()),
            events: shared.events.clone(),
            shared: Arc::downgrade(shared),
        }
    }

    pub(crate) fn state(&self) -> TaskState {
        TaskState::from_raw(self.state.load(Ordering::Acquire))
    }

    pub(crate) fn is_finished(&self) -> bool {
        self.state.load(Ordering::Acquire) == COMPLETED
    }

    /// Asks the scheduler loop to poll the task again.
    pub(crate) fn schedule(&self) {
        if self.is_finished() || self.notified.swap(true, Ordering::AcqRel) {
            return;
        }

        if self.events.send(Event::Wake(self.id)).is_err() {
            tracing::warn!(task = %self.id, "scheduler is gone, wake dropped");
        }
    }

    /// Registers `waker` to be woken when the task completes.
    pub(crate) fn add_waiter(&self, waker: &Waker) {
        let mut waiters = self.waiters.lock();
        if !waiters.iter().any(|w| w.will_wake(waker)) {
            waiters.push(waker.clone());
        }
    }

    /// Takes the result out of a completed task.
    pub(crate) fn take_result(&self) -> anyhow::Result<T> {
        let mut slot = self.result.lock();

        match mem::replace(&mut *slot, Slot::Taken) {
            Slot::Ready(result) => result,
            Slot::Taken => Err(Error::ResultTaken.into()),
            Slot::Empty => {
                *slot = Slot::Empty;
                Err(anyhow::anyhow!("task {} has not completed", self.id))
            }
        }
    }

    fn poll_once(self: &Arc<Self>) {
        if self.is_finished() {
            return;
        }

        // Already being polled further up this thread's stack.
        let Some(mut slot) = self.future.try_lock() else {
            return;
        };
        let Some(future) = slot.as_mut() else {
            return;
        };

        self.notified.store(false, Ordering::Release);
        self.state.store(RUNNING, Ordering::Release);

        let waker = make_waker(self.clone());
        let mut cx = Context::from_waker(&waker);

        let poll = context::enter_task(self.id, || {
            panic::catch_unwind(AssertUnwindSafe(|| future.as_mut().poll(&mut cx)))
        });

        let result = match poll {
            Ok(Poll::Pending) => {
                let closed = self.shared.upgrade().is_none_or(|shared| shared.is_closed());
                if !closed {
                    self.state.store(SUSPENDED, Ordering::Release);
                    return;
                }
                Err(Error::Closed.into())
            }
            Ok(Poll::Ready(result)) => result,
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                tracing::debug!(task = %self.id, %message, "task panicked");
                Err(Error::Panicked(message).into())
            }
        };

        // Dropping the future releases its suspensions before completion is
        // announced.
        slot.take();
        drop(slot);

        self.complete(result);
    }

    fn complete(&self, result: anyhow::Result<T>) {
        let failed = result.is_err();

        *self.result.lock() = Slot::Ready(result);
        self.state.store(COMPLETED, Ordering::Release);

        if let Some(shared) = self.shared.upgrade() {
            shared.tasks.lock().remove(&self.id);

            if let Some(parent) = self.parent.filter(|p| !shared.is_closed() && shared.is_live(*p)) {
                let signal = if failed {
                    AwaitSignal::Failed(self.id)
                } else {
                    AwaitSignal::Done(self.id)
                };
                shared.reactor.publish(&await_channel(parent), signal.encode());
            }
        }

        tracing::debug!(task = %self.id, failed, "task completed");

        let waiters = mem::take(&mut *self.waiters.lock());
        for waiter in waiters {
            waiter.wake();
        }
    }
}

impl<T: Send + 'static> Runnable for Task<T> {
    fn run(self: Arc<Self>) {
        self.poll_once();
    }

    fn abandon(&self) {
        if self.is_finished() {
            return;
        }

        let Some(mut slot) = self.future.try_lock() else {
            // Being polled right now; the poll completes it once it yields.
            return;
        };

        slot.take();
        drop(slot);

        self.complete(Err(Error::Closed.into()));
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_owned()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_owned()
    }
}
