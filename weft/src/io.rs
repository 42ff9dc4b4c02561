//! Blocking-style I/O on raw file descriptors.
//!
//! These helpers read like their thread-blocking counterparts but suspend
//! only the calling task. Descriptors must be in non-blocking mode.
//!
//! ```rust,ignore
//! use std::os::fd::AsRawFd;
//! use std::os::unix::net::UnixStream;
//!
//! let (left, right) = UnixStream::pair()?;
//! left.set_nonblocking(true)?;
//! right.set_nonblocking(true)?;
//!
//! weft::io::write_all(left.as_raw_fd(), b"ping").await?;
//! let mut buffer = [0u8; 4];
//! let n = weft::io::read(right.as_raw_fd(), &mut buffer).await?;
//! ```

use crate::hooks::Hooks;
use crate::scheduler::Handle;

pub use crate::reactor::Interest;

use std::io;
use std::os::fd::RawFd;
use std::time::Duration;

/// Waits until `fd` is ready for one of `interest`.
///
/// Fails with `io::ErrorKind::TimedOut` if `timeout` elapses first.
pub async fn wait(fd: RawFd, interest: Interest, timeout: Option<Duration>) -> io::Result<Interest> {
    let ready = Handle::current().io_wait(fd, interest, timeout).await?;

    if ready.is_empty() {
        return Err(io::Error::new(
            io::ErrorKind::TimedOut,
            format!("fd {fd} not ready for {interest:?} in time"),
        ));
    }

    Ok(ready)
}

/// Reads from `fd` into `buffer`, waiting for data if none is available.
///
/// Returns the number of bytes read; `0` means end of stream (or an empty
/// buffer).
pub async fn read(fd: RawFd, buffer: &mut [u8]) -> io::Result<usize> {
    let handle = Handle::current();

    loop {
        match handle.io_read(fd, buffer, None, 0).await {
            Ok(n) => return Ok(n),
            Err(error) if error.kind() == io::ErrorKind::WouldBlock => {
                handle.io_wait(fd, Interest::READABLE, None).await?;
            }
            Err(error) => return Err(error),
        }
    }
}

/// Writes all of `buffer` to `fd`, waiting for writability whenever the
/// descriptor is full.
pub async fn write_all(fd: RawFd, buffer: &[u8]) -> io::Result<()> {
    let handle = Handle::current();
    let mut offset = 0;

    loop {
        let pending = handle.io_write(fd, buffer, None, offset)?;
        if pending == 0 {
            return Ok(());
        }

        offset = buffer.len() - pending;
        handle.io_wait(fd, Interest::WRITABLE, None).await?;
    }
}
