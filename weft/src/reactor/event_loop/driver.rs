use super::command::Command;
use super::event::Event;
use super::io::{Waiter, Waiters};
use super::poller::Poller;
use super::timer::{TimerEntry, TimerKind};
use crate::reactor::{IoEvent, Subscriber};

use crossbeam_channel::{Receiver, TryRecvError};
use std::collections::{BinaryHeap, HashMap};
use std::io;
use std::os::fd::RawFd;
use std::time::Instant;

/// Size below which the timer heap and the waiter table are never compacted.
const COMPACT_FLOOR: usize = 64;

/// The state owned by the event-loop thread.
///
/// Each turn of [`run`](Self::run):
/// 1. applies every queued command,
/// 2. polls the OS, bounded by the nearest timer,
/// 3. releases the waiters of ready descriptors,
/// 4. fires expired timers.
///
/// Cancelled timers and waiters are dropped lazily. Once the heap and the
/// waiter table together reach `compact_at` entries, both are swept and the
/// threshold is reset to twice what survived, so dead entries never
/// outnumber live ones by more than [`COMPACT_FLOOR`].
pub(crate) struct Driver {
    receiver: Receiver<Command>,
    poller: Poller,
    events: Vec<Event>,
    timers: BinaryHeap<TimerEntry>,
    next_seq: u64,
    waiters: Waiters,
    subscribers: HashMap<String, Subscriber>,
    compact_at: usize,
}

impl Driver {
    pub(crate) fn new(receiver: Receiver<Command>, poller: Poller, capacity: usize) -> Self {
        Self {
            receiver,
            poller,
            events: Vec::with_capacity(capacity),
            timers: BinaryHeap::new(),
            next_seq: 0,
            waiters: Waiters::default(),
            subscribers: HashMap::new(),
            compact_at: COMPACT_FLOOR,
        }
    }

    pub(crate) fn run(&mut self) -> io::Result<()> {
        loop {
            loop {
                match self.receiver.try_recv() {
                    Ok(Command::Shutdown) | Err(TryRecvError::Disconnected) => return Ok(()),
                    Ok(command) => self.apply(command),
                    Err(TryRecvError::Empty) => break,
                }
            }

            let timeout = self
                .timers
                .peek()
                .map(|t| t.deadline.saturating_duration_since(Instant::now()));

            self.poller.poll(&mut self.events, timeout)?;

            let events: Vec<Event> = self.events.drain(..).collect();
            for event in events {
                self.dispatch(event);
            }

            self.fire_timers();
        }
    }

    fn apply(&mut self, command: Command) {
        match command {
            Command::Register {
                fd,
                interest,
                deadline,
                registration,
                callback,
            } => {
                if !registration.is_armed() {
                    return;
                }

                self.maybe_compact();

                let token = self.waiters.insert(Waiter {
                    fd,
                    interest,
                    registration,
                    callback,
                });

                self.waiters.prune(fd);

                if let Err(error) = self.poller.register(fd, self.waiters.interest(fd)) {
                    let Some(waiter) = self.waiters.remove(token) else {
                        return;
                    };

                    // Regular files cannot be watched and never block.
                    if error.raw_os_error() == Some(libc::EPERM) {
                        waiter.complete(IoEvent::Ready);
                    } else {
                        tracing::trace!(fd, %error, "failed to watch descriptor");
                        waiter.complete(IoEvent::Failed(error));
                    }
                    return;
                }

                if let Some(deadline) = deadline {
                    self.push_timer(deadline, TimerKind::IoDeadline { token });
                }
            }

            Command::SetTimer {
                deadline,
                registration,
                callback,
            } => {
                if !registration.is_armed() {
                    return;
                }

                self.maybe_compact();
                self.push_timer(
                    deadline,
                    TimerKind::Callback {
                        registration,
                        callback,
                    },
                );
            }

            Command::Subscribe {
                channel,
                subscriber,
            } => {
                self.subscribers.insert(channel, subscriber);
            }

            Command::Unsubscribe { channel } => {
                self.subscribers.remove(&channel);
            }

            Command::Publish { channel, payload } => match self.subscribers.get_mut(&channel) {
                Some(subscriber) => subscriber(payload),
                None => tracing::trace!(%channel, "publish without subscriber"),
            },

            Command::CloseAll => {
                for fd in self.waiters.clear() {
                    self.poller.deregister(fd);
                }
                self.timers.clear();
                self.subscribers.clear();
                self.compact_at = COMPACT_FLOOR;
            }

            Command::Shutdown => {}
        }
    }

    fn dispatch(&mut self, event: Event) {
        for waiter in self.waiters.take_ready(event.fd, event.ready, event.error) {
            waiter.complete(IoEvent::Ready);
        }

        self.refresh(event.fd);
    }

    fn fire_timers(&mut self) {
        let now = Instant::now();

        while self.timers.peek().is_some_and(|t| t.deadline <= now) {
            let Some(timer) = self.timers.pop() else {
                break;
            };

            match timer.kind {
                TimerKind::Callback {
                    registration,
                    callback,
                } => {
                    if registration.fire() {
                        callback();
                    }
                }
                TimerKind::IoDeadline { token } => {
                    if let Some(waiter) = self.waiters.remove(token) {
                        let fd = waiter.fd;
                        waiter.complete(IoEvent::TimedOut);
                        self.refresh(fd);
                    }
                }
            }
        }
    }

    /// Re-installs the watched interest of `fd` after its waiters changed.
    fn refresh(&mut self, fd: RawFd) {
        let interest = self.waiters.interest(fd);

        if let Err(error) = self.poller.register(fd, interest) {
            for waiter in self.waiters.take_ready(fd, interest, true) {
                waiter.complete(IoEvent::Failed(io::Error::from(error.kind())));
            }
            self.poller.deregister(fd);
        }
    }

    fn maybe_compact(&mut self) {
        if self.timers.len() + self.waiters.len() >= self.compact_at {
            self.compact();
        }
    }

    /// Drops cancelled waiters, then every timer that can no longer fire:
    /// cancelled callbacks and deadlines of waiters that are gone.
    fn compact(&mut self) {
        let before = self.timers.len() + self.waiters.len();

        for fd in self.waiters.prune_cancelled() {
            self.refresh(fd);
        }

        let waiters = &self.waiters;
        self.timers.retain(|timer| match &timer.kind {
            TimerKind::Callback { registration, .. } => registration.is_armed(),
            TimerKind::IoDeadline { token } => waiters.contains(*token),
        });

        let live = self.timers.len() + self.waiters.len();
        self.compact_at = COMPACT_FLOOR.max(live * 2);

        tracing::trace!(dropped = before - live, live, "compacted timers and waiters");
    }

    fn push_timer(&mut self, deadline: Instant, kind: TimerKind) {
        let seq = self.next_seq;
        self.next_seq += 1;

        self.timers.push(TimerEntry {
            deadline,
            seq,
            kind,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::{COMPACT_FLOOR, Driver};
    use crate::reactor::event_loop::command::Command;
    use crate::reactor::event_loop::poller::Poller;
    use crate::reactor::{Interest, Registration};

    use std::os::fd::AsRawFd;
    use std::os::unix::net::UnixStream;
    use std::time::{Duration, Instant};

    fn driver() -> Driver {
        let (_sender, receiver) = crossbeam_channel::unbounded();
        Driver::new(receiver, Poller::new(8).unwrap(), 8)
    }

    fn set_timer(driver: &mut Driver, delay: Duration) -> Registration {
        let registration = Registration::new();
        driver.apply(Command::SetTimer {
            deadline: Instant::now() + delay,
            registration: registration.clone(),
            callback: Box::new(|| panic!("cancelled timer fired")),
        });
        registration
    }

    #[test]
    fn cancelled_timers_do_not_pile_up() {
        let mut driver = driver();

        for _ in 0..10_000 {
            let registration = set_timer(&mut driver, Duration::from_secs(60));
            assert!(registration.cancel());
            driver.fire_timers();
        }

        assert!(driver.timers.len() <= COMPACT_FLOOR, "{} timers", driver.timers.len());
    }

    #[test]
    fn compaction_keeps_armed_timers() {
        let mut driver = driver();

        let live: Vec<Registration> = (0..COMPACT_FLOOR)
            .map(|_| set_timer(&mut driver, Duration::from_secs(60)))
            .collect();

        for _ in 0..1_000 {
            assert!(set_timer(&mut driver, Duration::from_secs(60)).cancel());
        }

        assert!(driver.timers.len() >= live.len());
        assert!(driver.timers.len() <= 2 * live.len() + COMPACT_FLOOR);
        assert!(live.iter().all(Registration::is_armed));
    }

    #[test]
    fn cancelled_waiters_and_their_deadlines_are_dropped() {
        let mut driver = driver();
        let (left, _right) = UnixStream::pair().unwrap();
        left.set_nonblocking(true).unwrap();

        for _ in 0..10_000 {
            let registration = Registration::new();
            driver.apply(Command::Register {
                fd: left.as_raw_fd(),
                interest: Interest::READABLE,
                deadline: Some(Instant::now() + Duration::from_secs(60)),
                registration: registration.clone(),
                callback: Box::new(|_| panic!("cancelled waiter completed")),
            });
            assert!(registration.cancel());
        }

        assert!(driver.waiters.len() <= COMPACT_FLOOR);
        assert!(driver.timers.len() <= COMPACT_FLOOR);
    }

    #[test]
    fn refused_timers_are_not_queued() {
        let mut driver = driver();

        let registration = Registration::new();
        assert!(registration.cancel());
        driver.apply(Command::SetTimer {
            deadline: Instant::now(),
            registration,
            callback: Box::new(|| panic!("cancelled timer fired")),
        });

        assert!(driver.timers.is_empty());
    }
}
