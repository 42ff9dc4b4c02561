use super::pending::{Mode, Target};
use super::shared::{Event, Leg, OpId, Outcome, Shared};
use crate::context;
use crate::reactor::{Interest, IoEvent, Payload, Registration};
use crate::task::TaskId;

use crossbeam_channel::Sender;
use std::future::Future;
use std::io;
use std::os::fd::RawFd;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

/// Sends the outcome of one leg back to the scheduler loop.
///
/// Owned by reactor callbacks; may run on any thread.
#[derive(Clone)]
pub(crate) struct Resumer {
    events: Sender<Event>,
    task: TaskId,
    op: OpId,
    leg: Leg,
}

impl Resumer {
    pub(crate) fn resume(&self, outcome: Outcome) {
        let event = Event::Resume {
            task: self.task,
            op: self.op,
            leg: self.leg,
            outcome,
        };

        if self.events.send(event).is_err() {
            tracing::warn!(task = %self.task, leg = ?self.leg, "scheduler is gone, resume dropped");
        }
    }
}

/// One suspension of the current task.
///
/// Created when a trap operation is called; it records the pending
/// operation and owns every reactor registration made for it. Finishing
/// (or dropping) it tears those registrations down: subscriptions are
/// removed, one-shot legs that did not fire are cancelled, and legs whose
/// callback already ran are retired.
///
/// A suspension started on a closed scheduler is inert: it registers
/// nothing and never produces an outcome.
pub(crate) struct Suspension {
    shared: Arc<Shared>,
    task: TaskId,
    op: OpId,
    legs: Vec<(Leg, Registration)>,
    channel: Option<String>,
    live: bool,
}

impl Suspension {
    /// Records a pending operation for the current task.
    ///
    /// # Panics
    ///
    /// Panics when called outside of a task, or when the task already has a
    /// pending operation.
    pub(crate) fn begin(shared: &Arc<Shared>, target: Target, mode: Mode) -> Self {
        let Some(task) = context::current_task() else {
            panic!("trap operation {target} called outside of a task");
        };

        let op = shared.next_op();
        let live = !shared.is_closed();

        if live {
            tracing::trace!(task = %task, op = %op, %target, "suspend");
            shared.pending.lock().begin(task, op, target, mode);
        }

        Self {
            shared: shared.clone(),
            task,
            op,
            legs: Vec::new(),
            channel: None,
            live,
        }
    }

    fn resumer(&self, leg: Leg) -> Resumer {
        Resumer {
            events: self.shared.events.clone(),
            task: self.task,
            op: self.op,
            leg,
        }
    }

    fn one_shot(&mut self, leg: Leg) -> (Registration, Resumer) {
        let registration = Registration::new();
        self.legs.push((leg, registration.clone()));
        (registration, self.resumer(leg))
    }

    /// Registers readiness interest on `fd` as the `Io` leg.
    pub(crate) fn watch_io(
        &mut self,
        fd: RawFd,
        interest: Interest,
        timeout_ms: Option<u64>,
    ) -> io::Result<()> {
        if !self.live {
            return Ok(());
        }

        let (registration, resumer) = self.one_shot(Leg::Io);
        self.shared.reactor.register_io(
            fd,
            interest,
            timeout_ms,
            registration,
            Box::new(move |event: IoEvent| resumer.resume(Outcome::Io(event))),
        )
    }

    /// Schedules a one-shot timer as the `Timer` leg.
    pub(crate) fn timer(&mut self, delay_ms: u64) -> io::Result<()> {
        if !self.live {
            return Ok(());
        }

        let (registration, resumer) = self.one_shot(Leg::Timer);
        self.shared.reactor.schedule_timer(
            delay_ms,
            registration,
            Box::new(move || resumer.resume(Outcome::Timer)),
        )
    }

    /// Hands `host` to the resolver worker as the `Resolve` leg.
    pub(crate) fn resolve(&mut self, host: String) {
        if !self.live {
            return;
        }

        let (registration, resumer) = self.one_shot(Leg::Resolve);
        self.shared.resolver.submit(host, registration, resumer);
    }

    /// Subscribes to `channel` as the `Signal` leg.
    pub(crate) fn subscribe(&mut self, channel: String) {
        if !self.live {
            return;
        }

        let resumer = self.resumer(Leg::Signal);
        self.shared.reactor.subscribe(
            &channel,
            Box::new(move |payload: Payload| resumer.resume(Outcome::Signal(payload))),
        );
        self.channel = Some(channel);
    }

    /// Takes the outcome that resumed the task, finishing the suspension.
    pub(crate) fn take_outcome(&mut self) -> Option<Outcome> {
        if !self.live {
            return None;
        }

        let outcome = self.shared.pending.lock().take_outcome(self.task, self.op)?;
        self.finish();
        Some(outcome)
    }

    /// Returns a future that resolves with the winning outcome.
    ///
    /// The scheduler polls the task itself when the outcome arrives, so the
    /// future does not keep the waker.
    pub(crate) fn resumed(&mut self) -> Resumed<'_> {
        Resumed { suspension: self }
    }

    /// Drains the signals queued for a streaming suspension.
    pub(crate) fn take_signals(&mut self) -> Vec<Payload> {
        if !self.live {
            return Vec::new();
        }

        self.shared.pending.lock().take_signals(self.task, self.op)
    }

    /// Removes the pending operation and tears down its registrations.
    pub(crate) fn finish(&mut self) {
        if !self.live {
            return;
        }
        self.live = false;

        if let Some(channel) = self.channel.take() {
            self.shared.reactor.unsubscribe(&channel);
        }

        if self.shared.is_closed() {
            return;
        }

        let mut pending = self.shared.pending.lock();
        let fired = pending.finish(self.task, self.op);

        for (leg, registration) in self.legs.drain(..) {
            if fired.contains(&leg) || registration.cancel() {
                continue;
            }
            // The callback already claimed the registration; its event is
            // still on the way.
            pending.retire(self.op, leg);
        }

        tracing::trace!(task = %self.task, op = %self.op, "suspension finished");
    }
}

impl Drop for Suspension {
    fn drop(&mut self) {
        self.finish();
    }
}

pub(crate) struct Resumed<'a> {
    suspension: &'a mut Suspension,
}

impl Future for Resumed<'_> {
    type Output = Outcome;

    fn poll(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Outcome> {
        match self.get_mut().suspension.take_outcome() {
            Some(outcome) => Poll::Ready(outcome),
            None => Poll::Pending,
        }
    }
}
