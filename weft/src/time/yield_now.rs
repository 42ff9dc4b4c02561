use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

/// A future that gives the scheduler back control exactly once.
///
/// The first poll wakes the task and returns `Pending`, which queues the
/// task behind every event already waiting; the second poll completes.
#[derive(Debug, Default)]
pub(crate) struct YieldOnce {
    yielded: bool,
}

impl YieldOnce {
    pub(crate) fn new() -> Self {
        Self { yielded: false }
    }
}

impl Future for YieldOnce {
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        if !self.yielded {
            self.yielded = true;
            cx.waker().wake_by_ref();
            return Poll::Pending;
        }

        Poll::Ready(())
    }
}
