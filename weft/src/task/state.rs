/// The task is waiting for a trap operation or another task.
pub(crate) const SUSPENDED: u8 = 0;

/// The task is being polled.
pub(crate) const RUNNING: u8 = 1;

/// The task finished and its result slot is sealed.
pub(crate) const COMPLETED: u8 = 2;

/// Observable lifecycle state of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    Running,
    Suspended,
    Completed,
}

impl TaskState {
    pub(crate) fn from_raw(raw: u8) -> Self {
        match raw {
            RUNNING => TaskState::Running,
            COMPLETED => TaskState::Completed,
            _ => TaskState::Suspended,
        }
    }
}
