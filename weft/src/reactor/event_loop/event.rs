use crate::reactor::Interest;

use std::os::fd::RawFd;

/// Readiness reported by the poller for one file descriptor.
///
/// Several kernel events for the same descriptor are merged into a single
/// `Event` before they reach the loop.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Event {
    /// The descriptor the readiness applies to.
    pub(crate) fd: RawFd,

    /// The subset of the registered interest that is ready.
    pub(crate) ready: Interest,

    /// The descriptor reported an error or a hang-up. Every waiter on it is
    /// released regardless of its interest.
    pub(crate) error: bool,
}

impl Event {
    /// Folds another kernel event for the same descriptor into this one.
    pub(crate) fn merge(&mut self, other: Event) {
        self.ready |= other.ready;
        self.error |= other.error;
    }
}

/// Appends `event` to `events`, merging it with an earlier entry for the
/// same descriptor.
pub(crate) fn push_merged(events: &mut Vec<Event>, event: Event) {
    match events.iter_mut().find(|e| e.fd == event.fd) {
        Some(existing) => existing.merge(event),
        None => events.push(event),
    }
}
