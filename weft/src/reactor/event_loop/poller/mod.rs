//! Platform-specific readiness pollers.
//!
//! Linux uses `epoll(7)` with an `eventfd` waker. Other Unix targets fall
//! back to `poll(2)` with a self-pipe. Both expose the same surface:
//! `register` (add or update the watched interest of a descriptor),
//! `deregister`, `poll` and `waker`.

#[cfg(target_os = "linux")]
mod epoll;

#[cfg(all(unix, not(target_os = "linux")))]
mod poll;

pub(crate) mod unix;

#[cfg(target_os = "linux")]
pub(crate) type Poller = epoll::EpollPoller;

#[cfg(all(unix, not(target_os = "linux")))]
pub(crate) type Poller = poll::PollPoller;

use std::os::fd::RawFd;
use std::time::Duration;

/// Interrupts a blocking [`Poller::poll`] from another thread.
///
/// Owns the write side of the wake descriptor (an `eventfd` or the write
/// end of a pipe).
pub(crate) struct Waker(RawFd);

impl Waker {
    pub(crate) fn wake(&self) {
        let value: u64 = 1;
        // A full pipe or a saturated eventfd already guarantees a wakeup.
        unix::sys_write(self.0, &value.to_ne_bytes());
    }
}

impl Drop for Waker {
    fn drop(&mut self) {
        unix::sys_close(self.0);
    }
}

/// Converts an optional poll timeout into kernel milliseconds, rounding up
/// so that a timer is never polled for just before its deadline.
pub(crate) fn timeout_ms(timeout: Option<Duration>) -> i32 {
    match timeout {
        None => -1,
        Some(timeout) => timeout
            .as_nanos()
            .div_ceil(1_000_000)
            .min(i32::MAX as u128) as i32,
    }
}

#[cfg(test)]
mod tests {
    use super::timeout_ms;

    use std::time::Duration;

    #[test]
    fn rounds_up_to_whole_milliseconds() {
        assert_eq!(timeout_ms(None), -1);
        assert_eq!(timeout_ms(Some(Duration::ZERO)), 0);
        assert_eq!(timeout_ms(Some(Duration::from_micros(1))), 1);
        assert_eq!(timeout_ms(Some(Duration::from_micros(1500))), 2);
        assert_eq!(timeout_ms(Some(Duration::from_secs(u64::MAX))), i32::MAX);
    }
}
