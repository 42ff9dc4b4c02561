use super::Scheduler;
use crate::reactor::Reactor;

use std::io;
use std::sync::Arc;

/// Default upper bound for a single `io_read` when no length is given.
pub const DEFAULT_MAX_READ: usize = 64 * 1024;

/// Builder for configuring and creating a [`Scheduler`].
///
/// # Examples
///
/// ```rust,ignore
/// let scheduler = SchedulerBuilder::new()
///     .max_read(16 * 1024)
///     .build();
/// ```
pub struct SchedulerBuilder {
    reactor: Option<Arc<dyn Reactor>>,
    max_read: usize,
    resolver_thread_name: String,
}

impl SchedulerBuilder {
    /// Creates a builder with the default configuration: the bundled event
    /// loop as reactor and a 64 KiB read limit.
    pub fn new() -> Self {
        Self {
            reactor: None,
            max_read: DEFAULT_MAX_READ,
            resolver_thread_name: "weft-resolver".to_owned(),
        }
    }

    /// Uses `reactor` instead of starting the bundled event loop.
    pub fn reactor<R: Reactor>(mut self, reactor: Arc<R>) -> Self {
        self.reactor = Some(reactor);
        self
    }

    /// Sets the most bytes a single `io_read` reads when the caller gives
    /// no length.
    ///
    /// # Panics
    ///
    /// Panics if `bytes == 0`.
    pub fn max_read(mut self, bytes: usize) -> Self {
        assert!(bytes > 0, "max_read must be > 0");

        self.max_read = bytes;
        self
    }

    /// Sets the name of the thread that runs name resolution.
    pub fn resolver_thread_name(mut self, name: impl Into<String>) -> Self {
        self.resolver_thread_name = name.into();
        self
    }

    /// Builds the scheduler, starting the bundled event loop if no reactor
    /// was given.
    pub fn try_build(self) -> io::Result<Scheduler> {
        let reactor = match self.reactor {
            Some(reactor) => reactor,
            None => default_reactor()?,
        };

        Ok(Scheduler::new(
            reactor,
            self.max_read,
            self.resolver_thread_name,
        ))
    }

    /// Builds the scheduler.
    ///
    /// # Panics
    ///
    /// Panics if the bundled event loop cannot be started. Use
    /// [`try_build`](Self::try_build) to handle that case.
    pub fn build(self) -> Scheduler {
        match self.try_build() {
            Ok(scheduler) => scheduler,
            Err(error) => panic!("failed to build scheduler: {error}"),
        }
    }
}

impl Default for SchedulerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(feature = "event-loop")]
fn default_reactor() -> io::Result<Arc<dyn Reactor>> {
    let event_loop: Arc<dyn Reactor> = crate::reactor::EventLoop::start()?;
    Ok(event_loop)
}

#[cfg(not(feature = "event-loop"))]
fn default_reactor() -> io::Result<Arc<dyn Reactor>> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        "no reactor configured and the `event-loop` feature is disabled",
    ))
}
