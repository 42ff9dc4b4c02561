use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};

const ARMED: u8 = 0;
const FIRED: u8 = 1;
const CANCELLED: u8 = 2;

/// Arbitration token for a one-shot reactor registration.
///
/// Both the reactor and the scheduler hold a clone. The reactor calls
/// [`fire`](Self::fire) right before running the callback; the scheduler
/// calls [`cancel`](Self::cancel) when it no longer wants the outcome.
/// Exactly one of the two transitions succeeds, so a callback either runs
/// once or never, and the scheduler learns which of the two happened.
#[derive(Clone)]
pub struct Registration {
    state: Arc<AtomicU8>,
}

impl Registration {
    /// Creates an armed registration.
    pub fn new() -> Self {
        Self {
            state: Arc::new(AtomicU8::new(ARMED)),
        }
    }

    /// Claims the registration for its callback.
    ///
    /// Returns `false` if it was already fired or cancelled, in which case
    /// the callback must not run.
    pub fn fire(&self) -> bool {
        self.transition(FIRED)
    }

    /// Withdraws the registration.
    ///
    /// Returns `false` if the callback already claimed it; its outcome is
    /// then on its way and the caller has to expect it.
    pub fn cancel(&self) -> bool {
        self.transition(CANCELLED)
    }

    /// Returns `true` while neither side has claimed the registration.
    pub fn is_armed(&self) -> bool {
        self.state.load(Ordering::Acquire) == ARMED
    }

    /// Returns `true` if the scheduler withdrew the registration.
    pub fn is_cancelled(&self) -> bool {
        self.state.load(Ordering::Acquire) == CANCELLED
    }

    fn transition(&self, to: u8) -> bool {
        self.state
            .compare_exchange(ARMED, to, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }
}

impl Default for Registration {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Registration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match self.state.load(Ordering::Acquire) {
            ARMED => "armed",
            FIRED => "fired",
            _ => "cancelled",
        };

        f.debug_tuple("Registration").field(&state).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::Registration;

    #[test]
    fn fire_then_cancel() {
        let registration = Registration::new();
        let reactor_side = registration.clone();

        assert!(reactor_side.fire());
        assert!(!registration.cancel());
        assert!(!reactor_side.fire());
        assert!(!registration.is_armed());
    }

    #[test]
    fn cancel_then_fire() {
        let registration = Registration::new();
        let reactor_side = registration.clone();

        assert!(registration.cancel());
        assert!(registration.is_cancelled());
        assert!(!reactor_side.fire());
    }
}
