use crate::reactor::{Interest, IoCallback, Payload, Registration, Subscriber, TimerCallback};

use std::os::fd::RawFd;
use std::time::Instant;

/// Requests sent from [`EventLoop`](super::EventLoop) handles to the loop
/// thread.
///
/// Every request travels through the same FIFO channel, so a subscription
/// always takes effect before any publish sent after it.
pub(crate) enum Command {
    Register {
        fd: RawFd,
        interest: Interest,
        deadline: Option<Instant>,
        registration: Registration,
        callback: IoCallback,
    },
    SetTimer {
        deadline: Instant,
        registration: Registration,
        callback: TimerCallback,
    },
    Subscribe {
        channel: String,
        subscriber: Subscriber,
    },
    Unsubscribe {
        channel: String,
    },
    Publish {
        channel: String,
        payload: Payload,
    },
    CloseAll,
    Shutdown,
}
