use super::core::Task;
use super::{TaskId, TaskState};

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

/// A handle to a spawned task.
///
/// Awaiting the handle yields the task's result: the value it returned, the
/// error its body failed with (the same `anyhow::Error`, so `downcast_ref`
/// recovers the original type), or a [`weft::Error`](crate::Error) for a
/// panic or a closed scheduler. The result can be taken once.
///
/// Dropping the handle does not cancel the task.
pub struct TaskHandle<T> {
    pub(crate) task: Arc<Task<T>>,
}

impl<T: Send + 'static> TaskHandle<T> {
    pub fn id(&self) -> TaskId {
        self.task.id
    }

    pub fn state(&self) -> TaskState {
        self.task.state()
    }

    /// Returns `true` once the task's result slot is sealed.
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    pub(crate) fn parent(&self) -> Option<TaskId> {
        self.task.parent
    }
}

impl<T: Send + 'static> Future for TaskHandle<T> {
    type Output = anyhow::Result<T>;

    /// The waker is registered before the state is checked again, so a
    /// completion between the two checks is not missed.
    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        if self.task.is_finished() {
            return Poll::Ready(self.task.take_result());
        }

        self.task.add_waiter(cx.waker());

        if self.task.is_finished() {
            return Poll::Ready(self.task.take_result());
        }

        Poll::Pending
    }
}

impl<T> Clone for TaskHandle<T> {
    fn clone(&self) -> Self {
        Self {
            task: self.task.clone(),
        }
    }
}

impl<T> fmt::Debug for TaskHandle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskHandle").field("id", &self.task.id).finish()
    }
}
