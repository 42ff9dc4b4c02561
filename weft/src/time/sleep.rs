use crate::hooks::{Hooks, Trap};
use crate::scheduler::Handle;

use std::io;
use std::time::Duration;

/// Suspends the current task for `duration`.
///
/// The timer is registered with the reactor as soon as `sleep` is called;
/// dropping the returned future cancels it. The duration is rounded up to
/// whole milliseconds.
///
/// Fails with the reactor's error if it refuses the timer.
///
/// # Panics
///
/// Panics if called outside of a task.
///
/// # Examples
///
/// ```rust,ignore
/// use std::time::Duration;
///
/// weft::time::sleep(Duration::from_millis(10)).await?;
/// ```
pub fn sleep(duration: Duration) -> Trap<'static, io::Result<()>> {
    Handle::current().kernel_sleep(Some(duration))
}

/// Lets every other ready task run before the current one continues.
///
/// Never registers anything with the reactor, so it does not fail in
/// practice; the result mirrors [`sleep`].
///
/// # Examples
///
/// ```rust,ignore
/// async fn busy() -> std::io::Result<()> {
///     for _ in 0..1000 {
///         weft::time::yield_now().await?;
///     }
///     Ok(())
/// }
/// ```
pub fn yield_now() -> Trap<'static, io::Result<()>> {
    Handle::current().kernel_sleep(None)
}
