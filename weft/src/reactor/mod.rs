//! The reactor contract.
//!
//! The scheduler never polls file descriptors, keeps timers or routes
//! messages itself. Everything that has to wait on the outside world is
//! turned into a registration with a [`Reactor`], and the reactor fires a
//! callback once the awaited condition holds.
//!
//! A reactor is expected to provide:
//! - fd readiness registration with an optional timeout,
//! - non-blocking read and write primitives,
//! - one-shot timers,
//! - a publish/subscribe bus keyed by opaque channel names,
//! - bulk teardown of every outstanding registration.
//!
//! Callbacks may be invoked from any thread. The scheduler marshals them
//! back onto its own thread before touching task state.
//!
//! With the default `event-loop` feature, [`EventLoop`] is available as a
//! ready-made implementation.

mod interest;
mod registration;

#[cfg(feature = "event-loop")]
pub mod event_loop;

pub use interest::Interest;
pub use registration::Registration;

#[cfg(feature = "event-loop")]
#[doc(inline)]
pub use event_loop::{EventLoop, EventLoopBuilder};

use std::io;
use std::os::fd::RawFd;

/// Opaque message carried on a publish/subscribe channel.
pub type Payload = Vec<u8>;

/// Callback fired once when an I/O registration completes.
pub type IoCallback = Box<dyn FnOnce(IoEvent) + Send>;

/// Callback fired once when a timer expires.
pub type TimerCallback = Box<dyn FnOnce() + Send>;

/// Callback invoked for every payload published on a subscribed channel.
pub type Subscriber = Box<dyn FnMut(Payload) + Send>;

/// How an I/O registration completed.
#[derive(Debug)]
pub enum IoEvent {
    /// At least one of the requested events is ready.
    Ready,

    /// The registration's timeout elapsed before any event was ready.
    TimedOut,

    /// The reactor could not watch the descriptor.
    Failed(io::Error),
}

/// Result of a single non-blocking read attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadOutcome {
    /// `n` bytes were copied into the buffer.
    Read(usize),

    /// No data is available right now.
    WouldBlock,

    /// The peer closed the stream.
    Eof,
}

/// The capabilities the scheduler needs from an event-loop engine.
///
/// # One-shot registrations
///
/// [`register_io`](Self::register_io) and
/// [`schedule_timer`](Self::schedule_timer) receive a [`Registration`].
/// Implementations must call [`Registration::fire`] immediately before
/// invoking the callback and skip the callback when it returns `false`: the
/// scheduler has cancelled the registration and will never look at its
/// outcome.
///
/// # Subscriptions
///
/// A subscription must be effective for every publish issued after
/// [`subscribe`](Self::subscribe) returns, including publishes issued from
/// other threads. Channels are private to one subscriber; subscribing again
/// replaces the previous subscriber.
pub trait Reactor: Send + Sync + 'static {
    /// Watches `fd` until one of `interest` is ready or `timeout_ms` elapses.
    ///
    /// Returns an error only if the registration could not be submitted at
    /// all. Failures detected later are reported through
    /// [`IoEvent::Failed`].
    fn register_io(
        &self,
        fd: RawFd,
        interest: Interest,
        timeout_ms: Option<u64>,
        registration: Registration,
        callback: IoCallback,
    ) -> io::Result<()>;

    /// Attempts one non-blocking read of up to `buffer.len()` bytes.
    fn read(&self, fd: RawFd, buffer: &mut [u8]) -> io::Result<ReadOutcome>;

    /// Attempts one non-blocking write and returns the number of bytes
    /// accepted. A full descriptor reports `io::ErrorKind::WouldBlock`.
    fn write(&self, fd: RawFd, bytes: &[u8]) -> io::Result<usize>;

    /// Fires `callback` once, `delay_ms` milliseconds from now.
    fn schedule_timer(
        &self,
        delay_ms: u64,
        registration: Registration,
        callback: TimerCallback,
    ) -> io::Result<()>;

    /// Delivers `payload` to the subscriber of `channel`, if any.
    fn publish(&self, channel: &str, payload: Payload);

    /// Installs `subscriber` as the receiver of `channel`.
    fn subscribe(&self, channel: &str, subscriber: Subscriber);

    /// Removes the subscriber of `channel`, if any.
    fn unsubscribe(&self, channel: &str);

    /// Drops every outstanding registration, timer and subscription without
    /// firing them.
    fn close_all_registrations(&self);
}
