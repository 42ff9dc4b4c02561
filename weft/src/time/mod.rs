//! Timers.
//!
//! - [`sleep`] suspends the current task on a reactor timer,
//! - [`yield_now`] is a pure scheduling pause.

mod sleep;

pub(crate) mod yield_now;

#[doc(inline)]
pub use sleep::{sleep, yield_now};
