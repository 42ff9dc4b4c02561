use crate::scheduler::Handle;
use crate::task::TaskId;

use std::cell::{Cell, RefCell};

thread_local! {
    /// The scheduler driving the current thread, set by `block_on`.
    static CURRENT_SCHEDULER: RefCell<Option<Handle>> = const { RefCell::new(None) };

    /// The task being polled on the current thread.
    static CURRENT_TASK: Cell<Option<TaskId>> = const { Cell::new(None) };
}

/// Restores a thread-local slot when dropped, so that a panic escaping `f`
/// cannot leave a stale context behind.
struct Restore<F: FnMut()>(F);

impl<F: FnMut()> Drop for Restore<F> {
    fn drop(&mut self) {
        (self.0)();
    }
}

/// Runs `f` with `handle` installed as the current scheduler.
pub(crate) fn enter_scheduler<R>(handle: Handle, f: impl FnOnce() -> R) -> R {
    let previous = CURRENT_SCHEDULER.with(|cell| cell.replace(Some(handle)));
    let mut previous = Some(previous);

    let _restore = Restore(|| {
        if let Some(previous) = previous.take() {
            CURRENT_SCHEDULER.with(|cell| cell.replace(previous));
        }
    });

    f()
}

/// Runs `f` with `task` marked as the task being polled.
pub(crate) fn enter_task<R>(task: TaskId, f: impl FnOnce() -> R) -> R {
    let previous = CURRENT_TASK.with(|cell| cell.replace(Some(task)));
    let _restore = Restore(|| CURRENT_TASK.with(|cell| cell.set(previous)));

    f()
}

pub(crate) fn current_scheduler() -> Option<Handle> {
    CURRENT_SCHEDULER.with(|cell| cell.borrow().clone())
}

pub(crate) fn current_task() -> Option<TaskId> {
    CURRENT_TASK.with(|cell| cell.get())
}
