use super::{TaskHandle, TaskId};
use crate::context;
use crate::scheduler::channel::{AwaitSignal, await_channel};
use crate::scheduler::pending::{Mode, Target};
use crate::scheduler::shared::Shared;
use crate::scheduler::suspend::Suspension;

use std::collections::HashSet;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

/// Future returned by [`await_all`](super::await_all).
///
/// Children of the awaiting task report completion on its await channel,
/// which is subscribed before any completion state is inspected; a child
/// counts as done once it has signalled or had already finished at that
/// point. Other tasks are observed through their waiter lists.
pub struct AwaitAll<T> {
    handles: Vec<TaskHandle<T>>,
    caller: Option<TaskId>,

    /// Children that have not yet signalled completion.
    outstanding: HashSet<TaskId>,

    suspension: Option<Suspension>,
}

impl<T: Send + 'static> AwaitAll<T> {
    pub(crate) fn new(shared: &Arc<Shared>, handles: Vec<TaskHandle<T>>) -> Self {
        let caller = context::current_task();

        let mut outstanding: HashSet<TaskId> = handles
            .iter()
            .filter(|h| caller.is_some() && h.parent() == caller)
            .map(|h| h.id())
            .collect();

        let mut suspension = match caller {
            Some(caller) if !outstanding.is_empty() => {
                let channel = await_channel(caller);
                let mut suspension = Suspension::begin(
                    shared,
                    Target::Await {
                        channel: channel.clone(),
                    },
                    Mode::Stream,
                );
                suspension.subscribe(channel);
                Some(suspension)
            }
            _ => None,
        };

        // Children finishing from here on signal the subscription above.
        for handle in &handles {
            if handle.is_finished() {
                outstanding.remove(&handle.id());
            }
        }

        if outstanding.is_empty() {
            suspension = None;
        }

        Self {
            handles,
            caller,
            outstanding,
            suspension,
        }
    }

    fn is_child(&self, handle: &TaskHandle<T>) -> bool {
        self.caller.is_some() && handle.parent() == self.caller
    }

    fn is_settled(&self, handle: &TaskHandle<T>) -> bool {
        if self.is_child(handle) {
            !self.outstanding.contains(&handle.id())
        } else {
            handle.is_finished()
        }
    }
}

impl<T: Send + 'static> Future for AwaitAll<T> {
    type Output = anyhow::Result<Vec<T>>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();

        if let Some(suspension) = this.suspension.as_mut() {
            for payload in suspension.take_signals() {
                match AwaitSignal::decode(&payload) {
                    Some(signal) => {
                        tracing::trace!(?signal, "child signalled");
                        this.outstanding.remove(&signal.task());
                    }
                    None => tracing::trace!(len = payload.len(), "unrecognised await signal"),
                }
            }
        }

        let mut ready = true;
        for handle in &this.handles {
            if this.is_settled(handle) {
                continue;
            }

            ready = false;
            if !this.is_child(handle) {
                handle.task.add_waiter(cx.waker());
            }
        }

        if !ready {
            return Poll::Pending;
        }

        if let Some(mut suspension) = this.suspension.take() {
            suspension.finish();
        }

        let mut values = Vec::with_capacity(this.handles.len());
        for handle in this.handles.drain(..) {
            values.push(handle.task.take_result()?);
        }

        Poll::Ready(Ok(values))
    }
}
