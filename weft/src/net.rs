//! Name resolution.

use crate::hooks::Trap;
use crate::scheduler::Handle;

use std::io;
use std::net::IpAddr;

/// Resolves `host` to its IP addresses without blocking the scheduler.
///
/// IP literals (including `[::1]`-style IPv6) resolve immediately; other
/// names are resolved on a worker thread while the task is suspended.
///
/// # Panics
///
/// Panics if called outside of a task.
pub fn resolve(host: &str) -> Trap<'static, io::Result<Vec<IpAddr>>> {
    Handle::current().address_resolve(host)
}
