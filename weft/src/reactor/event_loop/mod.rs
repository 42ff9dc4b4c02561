//! A ready-made [`Reactor`] backed by a dedicated thread.
//!
//! The loop thread owns the OS poller, a timer heap, the per-descriptor
//! waiter lists and the subscriber map. [`EventLoop`] handles talk to it
//! through a command channel and interrupt its poll through a waker, so
//! every method is callable from any thread. Reads and writes do not go
//! through the thread at all: they are plain non-blocking system calls on
//! the caller's thread.
//!
//! Callbacks run on the loop thread and must not block.

mod command;
mod driver;
mod event;
mod io;
mod poller;
mod timer;

use self::command::Command;
use self::driver::Driver;
use self::poller::unix::{sys_read, sys_write};
use self::poller::{Poller, Waker};
use crate::reactor::{
    Interest, IoCallback, Payload, ReadOutcome, Reactor, Registration, Subscriber, TimerCallback,
};

use crossbeam_channel::{Sender, unbounded};
use parking_lot::Mutex;
use std::os::fd::RawFd;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Handle to a running event-loop thread.
///
/// Dropping the last handle stops the thread and waits for it.
pub struct EventLoop {
    sender: Sender<Command>,
    waker: Arc<Waker>,
    thread: Mutex<Option<JoinHandle<()>>>,
}

impl EventLoop {
    /// Starts an event loop with the default configuration.
    pub fn start() -> std::io::Result<Arc<Self>> {
        EventLoopBuilder::new().start()
    }

    fn send(&self, command: Command) -> std::io::Result<()> {
        let result = self.sender.send(command);
        self.waker.wake();

        result.map_err(|_| {
            std::io::Error::new(std::io::ErrorKind::NotConnected, "event loop is not running")
        })
    }

    fn send_or_trace(&self, command: Command) {
        if self.send(command).is_err() {
            tracing::trace!("event loop stopped, command dropped");
        }
    }
}

impl Reactor for EventLoop {
    fn register_io(
        &self,
        fd: RawFd,
        interest: Interest,
        timeout_ms: Option<u64>,
        registration: Registration,
        callback: IoCallback,
    ) -> std::io::Result<()> {
        let deadline = timeout_ms.map(|ms| Instant::now() + Duration::from_millis(ms));

        self.send(Command::Register {
            fd,
            interest,
            deadline,
            registration,
            callback,
        })
    }

    fn read(&self, fd: RawFd, buffer: &mut [u8]) -> std::io::Result<ReadOutcome> {
        loop {
            let n = sys_read(fd, buffer);

            if n > 0 {
                return Ok(ReadOutcome::Read(n as usize));
            }

            if n == 0 {
                return Ok(if buffer.is_empty() {
                    ReadOutcome::Read(0)
                } else {
                    ReadOutcome::Eof
                });
            }

            let error = std::io::Error::last_os_error();
            match error.kind() {
                std::io::ErrorKind::Interrupted => continue,
                std::io::ErrorKind::WouldBlock => return Ok(ReadOutcome::WouldBlock),
                _ => return Err(error),
            }
        }
    }

    fn write(&self, fd: RawFd, bytes: &[u8]) -> std::io::Result<usize> {
        loop {
            let n = sys_write(fd, bytes);

            if n >= 0 {
                return Ok(n as usize);
            }

            let error = std::io::Error::last_os_error();
            if error.kind() != std::io::ErrorKind::Interrupted {
                return Err(error);
            }
        }
    }

    fn schedule_timer(
        &self,
        delay_ms: u64,
        registration: Registration,
        callback: TimerCallback,
    ) -> std::io::Result<()> {
        self.send(Command::SetTimer {
            deadline: Instant::now() + Duration::from_millis(delay_ms),
            registration,
            callback,
        })
    }

    fn publish(&self, channel: &str, payload: Payload) {
        self.send_or_trace(Command::Publish {
            channel: channel.to_owned(),
            payload,
        });
    }

    fn subscribe(&self, channel: &str, subscriber: Subscriber) {
        self.send_or_trace(Command::Subscribe {
            channel: channel.to_owned(),
            subscriber,
        });
    }

    fn unsubscribe(&self, channel: &str) {
        self.send_or_trace(Command::Unsubscribe {
            channel: channel.to_owned(),
        });
    }

    fn close_all_registrations(&self) {
        self.send_or_trace(Command::CloseAll);
    }
}

impl Drop for EventLoop {
    fn drop(&mut self) {
        let _ = self.sender.send(Command::Shutdown);
        self.waker.wake();

        if let Some(handle) = self.thread.lock().take() {
            // Joining from inside a callback would wait on ourselves.
            if handle.thread().id() != thread::current().id() {
                let _ = handle.join();
            }
        }
    }
}

/// Builder for configuring and starting an [`EventLoop`].
///
/// ```rust,ignore
/// let event_loop = EventLoopBuilder::new()
///     .thread_name("io")
///     .event_capacity(256)
///     .start()?;
/// ```
pub struct EventLoopBuilder {
    event_capacity: usize,
    thread_name: String,
}

impl EventLoopBuilder {
    pub fn new() -> Self {
        Self {
            event_capacity: 64,
            thread_name: "weft-event-loop".to_owned(),
        }
    }

    /// Sets how many kernel events a single poll may return.
    ///
    /// # Panics
    ///
    /// Panics if `capacity == 0`.
    pub fn event_capacity(mut self, capacity: usize) -> Self {
        assert!(capacity > 0, "event_capacity must be > 0");

        self.event_capacity = capacity;
        self
    }

    /// Sets the name of the loop thread.
    pub fn thread_name(mut self, name: impl Into<String>) -> Self {
        self.thread_name = name.into();
        self
    }

    /// Creates the poller and spawns the loop thread.
    pub fn start(self) -> std::io::Result<Arc<EventLoop>> {
        let poller = Poller::new(self.event_capacity)?;
        let waker = poller.waker();
        let (sender, receiver) = unbounded();
        let capacity = self.event_capacity;

        let thread = thread::Builder::new()
            .name(self.thread_name)
            .spawn(move || {
                let mut driver = Driver::new(receiver, poller, capacity);
                if let Err(error) = driver.run() {
                    tracing::error!(%error, "event loop stopped");
                }
            })?;

        tracing::debug!("event loop started");

        Ok(Arc::new(EventLoop {
            sender,
            waker,
            thread: Mutex::new(Some(thread)),
        }))
    }
}

impl Default for EventLoopBuilder {
    fn default() -> Self {
        Self::new()
    }
}
