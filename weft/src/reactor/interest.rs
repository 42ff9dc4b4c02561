use std::fmt;
use std::ops::{BitAnd, BitOr, BitOrAssign};

/// A set of I/O readiness events.
///
/// The bit values match `poll(2)` and `epoll(7)` (`POLLIN`, `POLLPRI`,
/// `POLLOUT`), so a mask can be handed to the kernel unchanged.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Interest(u8);

impl Interest {
    /// No events. Returned by `io_wait` when the wait timed out.
    pub const EMPTY: Interest = Interest(0);

    /// The descriptor has data to read.
    pub const READABLE: Interest = Interest(0b001);

    /// The descriptor has urgent (out-of-band) data to read.
    pub const PRIORITY: Interest = Interest(0b010);

    /// The descriptor can accept a write.
    pub const WRITABLE: Interest = Interest(0b100);

    const ALL: u8 = 0b111;

    /// Builds a mask from raw bits, discarding unknown ones.
    pub const fn from_bits_truncate(bits: u8) -> Self {
        Interest(bits & Self::ALL)
    }

    /// Returns the raw bits of the mask.
    pub const fn bits(self) -> u8 {
        self.0
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub const fn is_readable(self) -> bool {
        self.0 & Self::READABLE.0 != 0
    }

    pub const fn is_writable(self) -> bool {
        self.0 & Self::WRITABLE.0 != 0
    }

    pub const fn is_priority(self) -> bool {
        self.0 & Self::PRIORITY.0 != 0
    }

    /// Returns `true` if every event in `other` is also in `self`.
    pub const fn contains(self, other: Interest) -> bool {
        self.0 & other.0 == other.0
    }

    /// Returns `true` if `self` and `other` share at least one event.
    pub const fn intersects(self, other: Interest) -> bool {
        self.0 & other.0 != 0
    }
}

impl BitOr for Interest {
    type Output = Interest;

    fn bitor(self, rhs: Interest) -> Interest {
        Interest(self.0 | rhs.0)
    }
}

impl BitOrAssign for Interest {
    fn bitor_assign(&mut self, rhs: Interest) {
        self.0 |= rhs.0;
    }
}

impl BitAnd for Interest {
    type Output = Interest;

    fn bitand(self, rhs: Interest) -> Interest {
        Interest(self.0 & rhs.0)
    }
}

impl fmt::Debug for Interest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return f.write_str("EMPTY");
        }

        let names = [
            (Interest::READABLE, "READABLE"),
            (Interest::PRIORITY, "PRIORITY"),
            (Interest::WRITABLE, "WRITABLE"),
        ];

        let mut first = true;
        for (flag, name) in names {
            if self.contains(flag) {
                if !first {
                    f.write_str(" | ")?;
                }
                f.write_str(name)?;
                first = false;
            }
        }

        Ok(())
    }
}
