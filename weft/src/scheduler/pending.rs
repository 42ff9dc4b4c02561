//! Registry of suspended tasks and the registrations that will resume them.

use super::shared::{Leg, OpId, Outcome};
use crate::reactor::{Interest, Payload};
use crate::task::TaskId;

use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt;
use std::os::fd::RawFd;

/// What a pending operation waits for. Only used for diagnostics, through
/// its `Display` form.
#[derive(Debug, Clone)]
pub(crate) enum Target {
    Io {
        fd: RawFd,
        interest: Interest,
        timeout_ms: Option<u64>,
    },
    Timer {
        delay_ms: u64,
    },
    Signal {
        channel: String,
        timeout_ms: Option<u64>,
    },
    Resolve {
        host: String,
    },
    Await {
        channel: String,
    },
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let timeout_ms = match self {
            Target::Io {
                fd,
                interest,
                timeout_ms,
            } => {
                write!(f, "io on fd {fd} for {interest:?}")?;
                timeout_ms
            }
            Target::Signal {
                channel,
                timeout_ms,
            } => {
                write!(f, "signal on {channel}")?;
                timeout_ms
            }
            Target::Timer { delay_ms } => return write!(f, "timer of {delay_ms} ms"),
            Target::Resolve { host } => return write!(f, "lookup of {host}"),
            Target::Await { channel } => return write!(f, "completions on {channel}"),
        };

        match timeout_ms {
            Some(ms) => write!(f, " within {ms} ms"),
            None => Ok(()),
        }
    }
}

/// How resume events are folded into the operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Mode {
    /// The first leg to fire decides the outcome; the rest are losers.
    Once,

    /// Every signal is queued and wakes the task; the operation ends when
    /// the task finishes it.
    Stream,
}

#[derive(Debug)]
struct PendingOp {
    op: OpId,
    target: Target,
    mode: Mode,
    fired: Vec<Leg>,
    outcome: Option<Outcome>,
    signals: VecDeque<Payload>,
}

/// Result of handing a resume event to the registry.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum Delivery {
    /// The task has something new to look at and must be polled.
    Resume,

    /// The event was a loser or a stale signal and is discarded.
    Ignored,
}

/// The scheduler's pending registry.
///
/// Holds at most one operation per task. Legs whose cancellation lost the
/// race against their callback are kept in `retired` until their late event
/// shows up, so that it is discarded rather than mistaken for a double
/// resume.
#[derive(Debug, Default)]
pub(crate) struct Pending {
    ops: HashMap<TaskId, PendingOp>,
    retired: HashSet<(OpId, Leg)>,
}

impl Pending {
    /// Records a new operation for `task`.
    ///
    /// # Panics
    ///
    /// Panics if `task` already has an outstanding operation.
    pub(crate) fn begin(&mut self, task: TaskId, op: OpId, target: Target, mode: Mode) {
        if let Some(existing) = self.ops.get(&task) {
            let existing = existing.target.clone();
            panic!(
                "task {task} suspended on {target} while already suspended on {existing}"
            );
        }

        self.ops.insert(
            task,
            PendingOp {
                op,
                target,
                mode,
                fired: Vec::new(),
                outcome: None,
                signals: VecDeque::new(),
            },
        );
    }

    /// Folds a resume event into the operation it belongs to.
    ///
    /// # Panics
    ///
    /// Panics if a one-shot leg fires twice, or if a one-shot event arrives
    /// for an operation that is neither current nor retired.
    pub(crate) fn deliver(&mut self, task: TaskId, op: OpId, leg: Leg, outcome: Outcome) -> Delivery {
        let Some(pending) = self.ops.get_mut(&task).filter(|p| p.op == op) else {
            if self.retired.remove(&(op, leg)) || leg == Leg::Signal {
                return Delivery::Ignored;
            }
            panic!("double resume of task {task}: {leg:?} event for finished operation {op}");
        };

        if pending.mode == Mode::Stream {
            if let Outcome::Signal(payload) = outcome {
                pending.signals.push_back(payload);
                return Delivery::Resume;
            }
        }

        if pending.fired.contains(&leg) {
            if leg == Leg::Signal {
                return Delivery::Ignored;
            }
            panic!("double resume of task {task}: {leg:?} fired twice for operation {op}");
        }

        pending.fired.push(leg);

        if pending.outcome.is_some() || pending.fired.len() > 1 {
            return Delivery::Ignored;
        }

        pending.outcome = Some(outcome);
        Delivery::Resume
    }

    /// Takes the winning outcome of `op`, if it arrived.
    pub(crate) fn take_outcome(&mut self, task: TaskId, op: OpId) -> Option<Outcome> {
        self.ops
            .get_mut(&task)
            .filter(|p| p.op == op)
            .and_then(|p| p.outcome.take())
    }

    /// Drains the queued signals of a streaming operation.
    pub(crate) fn take_signals(&mut self, task: TaskId, op: OpId) -> Vec<Payload> {
        self.ops
            .get_mut(&task)
            .filter(|p| p.op == op)
            .map(|p| p.signals.drain(..).collect())
            .unwrap_or_default()
    }

    /// Removes `op` and returns the legs that fired while it was pending.
    pub(crate) fn finish(&mut self, task: TaskId, op: OpId) -> Vec<Leg> {
        match self.ops.get(&task) {
            Some(pending) if pending.op == op => self
                .ops
                .remove(&task)
                .map(|p| p.fired)
                .unwrap_or_default(),
            _ => Vec::new(),
        }
    }

    /// Expects one late event from `leg` of the finished operation `op`.
    pub(crate) fn retire(&mut self, op: OpId, leg: Leg) {
        self.retired.insert((op, leg));
    }

    #[cfg(test)]
    pub(crate) fn is_pending(&self, task: TaskId) -> bool {
        self.ops.contains_key(&task)
    }

    pub(crate) fn clear(&mut self) {
        self.ops.clear();
        self.retired.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::{Delivery, Mode, Pending, Target};
    use crate::reactor::{Interest, IoEvent};
    use crate::scheduler::shared::{Leg, OpId, Outcome};
    use crate::task::TaskId;

    fn ids() -> (TaskId, OpId) {
        (TaskId::from_raw(7), OpId::for_tests(1))
    }

    fn timer() -> Target {
        Target::Timer { delay_ms: 10 }
    }

    #[test]
    fn first_leg_wins_and_loser_is_ignored() {
        let (task, op) = ids();
        let mut pending = Pending::default();
        pending.begin(
            task,
            op,
            Target::Signal {
                channel: "weft:wake:7".into(),
                timeout_ms: Some(10),
            },
            Mode::Once,
        );

        assert_eq!(
            pending.deliver(task, op, Leg::Signal, Outcome::Signal(Vec::new())),
            Delivery::Resume
        );
        assert_eq!(pending.deliver(task, op, Leg::Timer, Outcome::Timer), Delivery::Ignored);
        assert!(matches!(pending.take_outcome(task, op), Some(Outcome::Signal(_))));

        let fired = pending.finish(task, op);
        assert_eq!(fired, vec![Leg::Signal, Leg::Timer]);
        assert!(!pending.is_pending(task));
    }

    #[test]
    fn extra_signals_are_harmless() {
        let (task, op) = ids();
        let mut pending = Pending::default();
        pending.begin(
            task,
            op,
            Target::Signal {
                channel: "weft:wake:7".into(),
                timeout_ms: None,
            },
            Mode::Once,
        );

        pending.deliver(task, op, Leg::Signal, Outcome::Signal(Vec::new()));
        assert_eq!(
            pending.deliver(task, op, Leg::Signal, Outcome::Signal(Vec::new())),
            Delivery::Ignored
        );

        pending.finish(task, op);
        assert_eq!(
            pending.deliver(task, op, Leg::Signal, Outcome::Signal(Vec::new())),
            Delivery::Ignored
        );
    }

    #[test]
    fn retired_leg_is_discarded_once() {
        let (task, op) = ids();
        let mut pending = Pending::default();
        pending.begin(task, op, timer(), Mode::Once);
        pending.finish(task, op);
        pending.retire(op, Leg::Timer);

        assert_eq!(pending.deliver(task, op, Leg::Timer, Outcome::Timer), Delivery::Ignored);
    }

    #[test]
    fn streams_queue_every_signal() {
        let (task, op) = ids();
        let mut pending = Pending::default();
        pending.begin(
            task,
            op,
            Target::Await {
                channel: "weft:await:7".into(),
            },
            Mode::Stream,
        );

        for byte in [1u8, 2, 3] {
            assert_eq!(
                pending.deliver(task, op, Leg::Signal, Outcome::Signal(vec![byte])),
                Delivery::Resume
            );
        }

        assert_eq!(pending.take_signals(task, op), vec![vec![1], vec![2], vec![3]]);
        assert!(pending.take_signals(task, op).is_empty());
    }

    #[test]
    fn targets_describe_themselves() {
        let io = Target::Io {
            fd: 5,
            interest: Interest::READABLE,
            timeout_ms: Some(30),
        };
        let signal = Target::Signal {
            channel: "weft:wake:3".into(),
            timeout_ms: None,
        };

        assert_eq!(io.to_string(), "io on fd 5 for READABLE within 30 ms");
        assert_eq!(signal.to_string(), "signal on weft:wake:3");
        assert_eq!(timer().to_string(), "timer of 10 ms");
        assert_eq!(
            Target::Resolve {
                host: "example.org".into()
            }
            .to_string(),
            "lookup of example.org"
        );
    }

    #[test]
    #[should_panic(expected = "already suspended")]
    fn second_suspension_panics() {
        let (task, op) = ids();
        let mut pending = Pending::default();
        pending.begin(task, op, timer(), Mode::Once);
        pending.begin(task, OpId::for_tests(2), timer(), Mode::Once);
    }

    #[test]
    #[should_panic(expected = "double resume")]
    fn one_shot_leg_firing_twice_panics() {
        let (task, op) = ids();
        let mut pending = Pending::default();
        pending.begin(
            task,
            op,
            Target::Io {
                fd: 3,
                interest: crate::reactor::Interest::READABLE,
                timeout_ms: None,
            },
            Mode::Once,
        );

        pending.deliver(task, op, Leg::Io, Outcome::Io(IoEvent::Ready));
        pending.deliver(task, op, Leg::Io, Outcome::Io(IoEvent::Ready));
    }

    #[test]
    #[should_panic(expected = "double resume")]
    fn unexpected_resume_panics() {
        let (task, op) = ids();
        let mut pending = Pending::default();
        pending.deliver(task, op, Leg::Timer, Outcome::Timer);
    }
}
