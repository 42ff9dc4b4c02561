//! The trap interface between task code and the scheduler.
//!
//! Every operation that would block a thread is expressed as one of the six
//! methods of [`Hooks`]. The scheduler's [`Handle`](crate::Handle)
//! implements it; the free functions in [`io`](crate::io),
//! [`time`](crate::time) and [`sync`](crate::sync) dispatch through it.
//!
//! Operations that suspend register with the reactor when they are
//! called, not when the returned future is first polled. Dropping the
//! future before it resolves withdraws the registration.

use crate::reactor::Interest;
use crate::task::TaskId;

use std::fmt;
use std::future::Future;
use std::io;
use std::os::fd::RawFd;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

/// A suspended trap operation.
pub type Trap<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// The scheduler's trap operations.
pub trait Hooks {
    /// Waits until `fd` is ready for one of `interest`.
    ///
    /// Returns `interest` once ready, or [`Interest::EMPTY`] if `timeout`
    /// elapsed first. The timeout is rounded up to whole milliseconds.
    fn io_wait(
        &self,
        fd: RawFd,
        interest: Interest,
        timeout: Option<Duration>,
    ) -> Trap<'static, io::Result<Interest>>;

    /// Reads from `fd` into `buffer[offset..]` without blocking the
    /// scheduler and returns the new offset.
    ///
    /// Each attempt reads at most `length` bytes, or up to the scheduler's
    /// read limit when `length` is `None` or zero, and never past the end
    /// of `buffer`. Full attempts are followed by a yield and another
    /// attempt; a short read, end of stream or a full buffer ends the call.
    /// If nothing can be read, fails with `io::ErrorKind::WouldBlock` and
    /// leaves `buffer` untouched.
    fn io_read<'a>(
        &self,
        fd: RawFd,
        buffer: &'a mut [u8],
        length: Option<usize>,
        offset: usize,
    ) -> Trap<'a, io::Result<usize>>;

    /// Writes up to `length` bytes of `buffer[offset..]` to `fd` without
    /// blocking and returns how many bytes of `buffer` are still pending.
    fn io_write(
        &self,
        fd: RawFd,
        buffer: &[u8],
        length: Option<usize>,
        offset: usize,
    ) -> io::Result<usize>;

    /// Suspends for `duration`, or yields once when `duration` is `None`.
    ///
    /// Fails with the reactor's error if it refuses the timer.
    fn kernel_sleep(&self, duration: Option<Duration>) -> Trap<'static, io::Result<()>>;

    /// Suspends the current task until [`unblock`](Self::unblock) is called
    /// for it or `timeout` elapses. Returns `true` when unblocked.
    ///
    /// Fails with the reactor's error if it refuses the timeout timer.
    fn block(
        &self,
        blocker: &Blocker,
        timeout: Option<Duration>,
    ) -> Trap<'static, io::Result<bool>>;

    /// Wakes `task` from [`block`](Self::block). Callable from any thread;
    /// unblocking a task that is not blocked has no effect.
    fn unblock(&self, blocker: &Blocker, task: TaskId);
}

/// Identifies the resource a task blocks on. Used for diagnostics only.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Blocker(Arc<str>);

impl Blocker {
    pub fn new(name: impl Into<Arc<str>>) -> Self {
        Blocker(name.into())
    }

    pub fn name(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Blocker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Blocker").field(&&*self.0).finish()
    }
}

impl fmt::Display for Blocker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Converts a duration to whole milliseconds, rounding up.
pub(crate) fn millis_ceil(duration: Duration) -> u64 {
    duration
        .as_nanos()
        .div_ceil(1_000_000)
        .min(u64::MAX as u128) as u64
}

#[cfg(test)]
mod tests {
    use super::{Blocker, millis_ceil};

    use std::time::Duration;

    #[test]
    fn rounds_up() {
        assert_eq!(millis_ceil(Duration::ZERO), 0);
        assert_eq!(millis_ceil(Duration::from_nanos(1)), 1);
        assert_eq!(millis_ceil(Duration::from_millis(5)), 5);
        assert_eq!(millis_ceil(Duration::from_micros(5_001)), 6);
    }

    #[test]
    fn blocker_names() {
        let blocker = Blocker::new("pool");

        assert_eq!(blocker.name(), "pool");
        assert_eq!(blocker.to_string(), "pool");
        assert_eq!(format!("{blocker:?}"), "Blocker(\"pool\")");
    }
}
