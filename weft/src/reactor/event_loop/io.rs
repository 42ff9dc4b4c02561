use crate::reactor::{Interest, IoCallback, IoEvent, Registration};

use std::collections::HashMap;
use std::os::fd::RawFd;

/// A task-side wait for readiness on one descriptor.
pub(crate) struct Waiter {
    pub(crate) fd: RawFd,
    pub(crate) interest: Interest,
    pub(crate) registration: Registration,
    pub(crate) callback: IoCallback,
}

impl Waiter {
    /// Runs the callback unless the registration was cancelled.
    pub(crate) fn complete(self, event: IoEvent) {
        if self.registration.fire() {
            (self.callback)(event);
        }
    }
}

/// All outstanding waiters, indexed by token and by descriptor.
///
/// Several waiters may share a descriptor with different interests; the
/// poller watches the union of them. Tokens are never reused, so a stale
/// deadline can never hit a newer waiter.
#[derive(Default)]
pub(crate) struct Waiters {
    entries: HashMap<usize, Waiter>,
    by_fd: HashMap<RawFd, Vec<usize>>,
    next_token: usize,
}

impl Waiters {
    pub(crate) fn insert(&mut self, waiter: Waiter) -> usize {
        let token = self.next_token;
        self.next_token += 1;

        self.by_fd.entry(waiter.fd).or_default().push(token);
        self.entries.insert(token, waiter);

        token
    }

    pub(crate) fn remove(&mut self, token: usize) -> Option<Waiter> {
        let waiter = self.entries.remove(&token)?;

        if let Some(tokens) = self.by_fd.get_mut(&waiter.fd) {
            tokens.retain(|t| *t != token);
            if tokens.is_empty() {
                self.by_fd.remove(&waiter.fd);
            }
        }

        Some(waiter)
    }

    /// Drops waiters on `fd` whose registration was cancelled.
    pub(crate) fn prune(&mut self, fd: RawFd) {
        let Some(tokens) = self.by_fd.get(&fd) else {
            return;
        };

        let stale: Vec<usize> = tokens
            .iter()
            .copied()
            .filter(|t| self.entries.get(t).is_some_and(|w| w.registration.is_cancelled()))
            .collect();

        for token in stale {
            self.remove(token);
        }
    }

    /// Drops every cancelled waiter and returns the descriptors that lost
    /// one, deduplicated.
    pub(crate) fn prune_cancelled(&mut self) -> Vec<RawFd> {
        let stale: Vec<usize> = self
            .entries
            .iter()
            .filter(|(_, w)| w.registration.is_cancelled())
            .map(|(token, _)| *token)
            .collect();

        let mut fds: Vec<RawFd> = stale
            .into_iter()
            .filter_map(|token| self.remove(token).map(|w| w.fd))
            .collect();
        fds.sort_unstable();
        fds.dedup();
        fds
    }

    pub(crate) fn contains(&self, token: usize) -> bool {
        self.entries.contains_key(&token)
    }

    /// Returns the union of the interests waited on for `fd`.
    pub(crate) fn interest(&self, fd: RawFd) -> Interest {
        self.by_fd
            .get(&fd)
            .into_iter()
            .flatten()
            .filter_map(|t| self.entries.get(t))
            .fold(Interest::EMPTY, |acc, w| acc | w.interest)
    }

    /// Removes and returns the waiters released by readiness `ready` on
    /// `fd`. An `error` releases all of them.
    pub(crate) fn take_ready(&mut self, fd: RawFd, ready: Interest, error: bool) -> Vec<Waiter> {
        self.prune(fd);

        let released: Vec<usize> = self
            .by_fd
            .get(&fd)
            .into_iter()
            .flatten()
            .copied()
            .filter(|t| {
                self.entries
                    .get(t)
                    .is_some_and(|w| error || w.interest.intersects(ready))
            })
            .collect();

        released.into_iter().filter_map(|t| self.remove(t)).collect()
    }

    /// Returns every descriptor that still has waiters and forgets all of
    /// them without running any callback.
    pub(crate) fn clear(&mut self) -> Vec<RawFd> {
        self.entries.clear();
        self.by_fd.drain().map(|(fd, _)| fd).collect()
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::{Waiter, Waiters};
    use crate::reactor::{Interest, IoEvent, Registration};

    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn waiter(fd: i32, interest: Interest, hits: &Arc<AtomicUsize>) -> (Waiter, Registration) {
        let registration = Registration::new();
        let hits = hits.clone();

        let waiter = Waiter {
            fd,
            interest,
            registration: registration.clone(),
            callback: Box::new(move |event| {
                assert!(matches!(event, IoEvent::Ready));
                hits.fetch_add(1, Ordering::SeqCst);
            }),
        };

        (waiter, registration)
    }

    #[test]
    fn interest_is_the_union_per_fd() {
        let hits = Arc::new(AtomicUsize::new(0));
        let mut waiters = Waiters::default();

        waiters.insert(waiter(3, Interest::READABLE, &hits).0);
        waiters.insert(waiter(3, Interest::WRITABLE, &hits).0);
        waiters.insert(waiter(4, Interest::PRIORITY, &hits).0);

        assert_eq!(waiters.interest(3), Interest::READABLE | Interest::WRITABLE);
        assert_eq!(waiters.interest(4), Interest::PRIORITY);
        assert_eq!(waiters.interest(5), Interest::EMPTY);
    }

    #[test]
    fn readiness_releases_matching_waiters_only() {
        let hits = Arc::new(AtomicUsize::new(0));
        let mut waiters = Waiters::default();

        waiters.insert(waiter(3, Interest::READABLE, &hits).0);
        waiters.insert(waiter(3, Interest::WRITABLE, &hits).0);

        let released = waiters.take_ready(3, Interest::READABLE, false);
        assert_eq!(released.len(), 1);
        released.into_iter().for_each(|w| w.complete(IoEvent::Ready));

        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert_eq!(waiters.interest(3), Interest::WRITABLE);
    }

    #[test]
    fn error_releases_everything_and_cancelled_are_pruned() {
        let hits = Arc::new(AtomicUsize::new(0));
        let mut waiters = Waiters::default();

        waiters.insert(waiter(3, Interest::READABLE, &hits).0);
        let (cancelled, registration) = waiter(3, Interest::WRITABLE, &hits);
        waiters.insert(cancelled);
        assert!(registration.cancel());

        let released = waiters.take_ready(3, Interest::EMPTY, true);
        assert_eq!(released.len(), 1);
        assert_eq!(waiters.len(), 0);
    }

    #[test]
    fn pruning_reports_each_descriptor_once() {
        let hits = Arc::new(AtomicUsize::new(0));
        let mut waiters = Waiters::default();

        let mut registrations = Vec::new();
        for fd in [3, 3, 4] {
            let (entry, registration) = waiter(fd, Interest::READABLE, &hits);
            waiters.insert(entry);
            registrations.push(registration);
        }
        let live = waiters.insert(waiter(5, Interest::READABLE, &hits).0);

        registrations.iter().for_each(|r| assert!(r.cancel()));

        assert_eq!(waiters.prune_cancelled(), vec![3, 4]);
        assert_eq!(waiters.len(), 1);
        assert!(waiters.contains(live));
        assert_eq!(waiters.interest(3), Interest::EMPTY);
    }
}
