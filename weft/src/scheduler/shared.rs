use super::pending::Pending;
use super::resolver::Resolver;
use crate::reactor::{IoEvent, Payload, Reactor};
use crate::task::{Runnable, TaskId};

use crossbeam_channel::Sender;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::io;
use std::net::IpAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

/// Identity of one suspension of one task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct OpId(u64);

#[cfg(test)]
impl OpId {
    pub(crate) const fn for_tests(raw: u64) -> Self {
        OpId(raw)
    }
}

impl fmt::Display for OpId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// The reactor registration a resume event comes from.
///
/// `Io`, `Timer` and `Resolve` are one-shot; `Signal` may be delivered any
/// number of times.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum Leg {
    Io,
    Timer,
    Signal,
    Resolve,
}

/// What a reactor callback reported.
#[derive(Debug)]
pub(crate) enum Outcome {
    Io(IoEvent),
    Timer,
    Signal(Payload),
    Resolved(io::Result<Vec<IpAddr>>),
}

/// Messages consumed by the scheduler loop.
///
/// Reactor callbacks and wakers only ever produce events; every change to
/// task state happens when the loop dequeues them.
#[derive(Debug)]
pub(crate) enum Event {
    /// Poll the task again.
    Wake(TaskId),

    /// A registration made by suspension `op` of `task` fired.
    Resume {
        task: TaskId,
        op: OpId,
        leg: Leg,
        outcome: Outcome,
    },

    /// The scheduler was closed; lets a blocked loop re-check its root.
    Closed,
}

/// State shared between the scheduler loop, its handles and its tasks.
pub(crate) struct Shared {
    pub(crate) reactor: Arc<dyn Reactor>,
    pub(crate) events: Sender<Event>,
    pub(crate) tasks: Mutex<HashMap<TaskId, Arc<dyn Runnable>>>,
    pub(crate) pending: Mutex<Pending>,
    pub(crate) root: Mutex<Option<TaskId>>,
    pub(crate) resolver: Resolver,
    pub(crate) max_read: usize,
    closed: AtomicBool,
    next_op: AtomicU64,
}

impl Shared {
    pub(crate) fn new(
        reactor: Arc<dyn Reactor>,
        events: Sender<Event>,
        resolver: Resolver,
        max_read: usize,
    ) -> Self {
        Self {
            reactor,
            events,
            tasks: Mutex::new(HashMap::new()),
            pending: Mutex::new(Pending::default()),
            root: Mutex::new(None),
            resolver,
            max_read,
            closed: AtomicBool::new(false),
            next_op: AtomicU64::new(1),
        }
    }

    pub(crate) fn next_op(&self) -> OpId {
        OpId(self.next_op.fetch_add(1, Ordering::Relaxed))
    }

    /// Returns `true` while `task` is registered and not yet completed.
    pub(crate) fn is_live(&self, task: TaskId) -> bool {
        self.tasks.lock().contains_key(&task)
    }

    pub(crate) fn is_root(&self, task: TaskId) -> bool {
        *self.root.lock() == Some(task)
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Marks the scheduler closed. Returns `false` if it already was.
    pub(crate) fn mark_closed(&self) -> bool {
        !self.closed.swap(true, Ordering::AcqRel)
    }

    /// Polls `task` if it is still registered.
    pub(crate) fn run_task(&self, task: TaskId) {
        let runnable = self.tasks.lock().get(&task).cloned();

        if let Some(runnable) = runnable {
            runnable.run();
        }
    }

    /// Queues an event for the loop. Fails only once the scheduler is gone.
    pub(crate) fn send(&self, event: Event) {
        if self.events.send(event).is_err() {
            tracing::warn!("scheduler loop is gone, event dropped");
        }
    }
}
