//! Names and payloads of the scheduler's publish/subscribe channels.
//!
//! - `weft:wake:<task>` carries `unblock` signals for a blocked task. The
//!   payload is empty.
//! - `weft:await:<task>` carries completion notices from a task's children:
//!   `done:<child>` or `await-error:<child>`.

use crate::reactor::Payload;
use crate::task::TaskId;

pub(crate) fn wake_channel(task: TaskId) -> String {
    format!("weft:wake:{task}")
}

pub(crate) fn await_channel(task: TaskId) -> String {
    format!("weft:await:{task}")
}

/// A child's completion notice on its parent's await channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum AwaitSignal {
    Done(TaskId),
    Failed(TaskId),
}

impl AwaitSignal {
    const DONE: &'static str = "done:";
    const FAILED: &'static str = "await-error:";

    pub(crate) fn task(self) -> TaskId {
        match self {
            AwaitSignal::Done(task) | AwaitSignal::Failed(task) => task,
        }
    }

    pub(crate) fn encode(self) -> Payload {
        match self {
            AwaitSignal::Done(task) => format!("{}{task}", Self::DONE),
            AwaitSignal::Failed(task) => format!("{}{task}", Self::FAILED),
        }
        .into_bytes()
    }

    pub(crate) fn decode(payload: &[u8]) -> Option<Self> {
        let text = std::str::from_utf8(payload).ok()?;

        if let Some(id) = text.strip_prefix(Self::DONE) {
            return id.parse().ok().map(|id| AwaitSignal::Done(TaskId::from_raw(id)));
        }

        text.strip_prefix(Self::FAILED)?
            .parse()
            .ok()
            .map(|id| AwaitSignal::Failed(TaskId::from_raw(id)))
    }
}
