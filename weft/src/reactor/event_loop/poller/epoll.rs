//! Linux `epoll`-based poller.
//!
//! Level-triggered: a descriptor keeps being reported while it is ready and
//! watched. The loop narrows or removes the watched interest as waiters
//! are released.

use super::unix::{sys_close, sys_drain};
use super::{Waker, timeout_ms};
use crate::reactor::Interest;
use crate::reactor::event_loop::event::{Event, push_merged};

use libc::{
    EPOLL_CLOEXEC, EPOLL_CTL_ADD, EPOLL_CTL_DEL, EPOLL_CTL_MOD, EPOLLERR, EPOLLHUP, EPOLLIN,
    EPOLLOUT, EPOLLPRI, epoll_create1, epoll_ctl, epoll_event, epoll_wait,
};
use std::collections::HashMap;
use std::io;
use std::os::fd::RawFd;
use std::sync::Arc;
use std::time::Duration;

/// Reserved token for the wake `eventfd`. Descriptor tokens are
/// non-negative `RawFd`s and can never reach it.
const WAKE_TOKEN: u64 = u64::MAX;

pub(crate) struct EpollPoller {
    epoll: RawFd,

    /// Read side of the wake `eventfd`. The write side is the same
    /// descriptor, duplicated into the [`Waker`].
    wake_fd: RawFd,

    /// Reusable buffer for `epoll_wait`.
    buffer: Vec<epoll_event>,

    /// Interest currently installed in the kernel, per descriptor.
    registered: HashMap<RawFd, Interest>,

    waker: Arc<Waker>,
}

impl EpollPoller {
    pub(crate) fn new(capacity: usize) -> io::Result<Self> {
        let epoll = unsafe { epoll_create1(EPOLL_CLOEXEC) };
        if epoll < 0 {
            return Err(io::Error::last_os_error());
        }

        let wake_fd = unsafe { libc::eventfd(0, libc::EFD_NONBLOCK | libc::EFD_CLOEXEC) };
        if wake_fd < 0 {
            let error = io::Error::last_os_error();
            sys_close(epoll);
            return Err(error);
        }

        let writer = unsafe { libc::fcntl(wake_fd, libc::F_DUPFD_CLOEXEC, 0) };
        if writer < 0 {
            let error = io::Error::last_os_error();
            sys_close(wake_fd);
            sys_close(epoll);
            return Err(error);
        }

        let mut event = epoll_event {
            events: EPOLLIN as u32,
            u64: WAKE_TOKEN,
        };

        if unsafe { epoll_ctl(epoll, EPOLL_CTL_ADD, wake_fd, &mut event) } < 0 {
            let error = io::Error::last_os_error();
            sys_close(writer);
            sys_close(wake_fd);
            sys_close(epoll);
            return Err(error);
        }

        Ok(Self {
            epoll,
            wake_fd,
            buffer: vec![epoll_event { events: 0, u64: 0 }; capacity.max(1)],
            registered: HashMap::new(),
            waker: Arc::new(Waker(writer)),
        })
    }

    pub(crate) fn waker(&self) -> Arc<Waker> {
        self.waker.clone()
    }

    /// Installs `interest` as the watched set of `fd`, adding the
    /// descriptor if needed.
    ///
    /// Fails with `EPERM` for descriptors epoll cannot watch, such as
    /// regular files.
    pub(crate) fn register(&mut self, fd: RawFd, interest: Interest) -> io::Result<()> {
        if interest.is_empty() {
            self.deregister(fd);
            return Ok(());
        }

        if self.registered.get(&fd) == Some(&interest) {
            return Ok(());
        }

        let op = if self.registered.contains_key(&fd) {
            EPOLL_CTL_MOD
        } else {
            EPOLL_CTL_ADD
        };

        match self.ctl(op, fd, interest) {
            Ok(()) => {}
            // The descriptor was closed and its number reused behind our back.
            Err(e) if op == EPOLL_CTL_MOD && e.raw_os_error() == Some(libc::ENOENT) => {
                self.ctl(EPOLL_CTL_ADD, fd, interest)?;
            }
            Err(e) if op == EPOLL_CTL_ADD && e.raw_os_error() == Some(libc::EEXIST) => {
                self.ctl(EPOLL_CTL_MOD, fd, interest)?;
            }
            Err(e) => return Err(e),
        }

        self.registered.insert(fd, interest);
        Ok(())
    }

    pub(crate) fn deregister(&mut self, fd: RawFd) {
        if self.registered.remove(&fd).is_some() {
            unsafe {
                epoll_ctl(self.epoll, EPOLL_CTL_DEL, fd, std::ptr::null_mut());
            }
        }
    }

    /// Blocks until a watched descriptor is ready, the waker fires, or
    /// `timeout` elapses. Ready descriptors are appended to `events`.
    pub(crate) fn poll(&mut self, events: &mut Vec<Event>, timeout: Option<Duration>) -> io::Result<()> {
        let n = unsafe {
            epoll_wait(
                self.epoll,
                self.buffer.as_mut_ptr(),
                self.buffer.len() as i32,
                timeout_ms(timeout),
            )
        };

        if n < 0 {
            let err = io::Error::last_os_error();
            if err.kind() == io::ErrorKind::Interrupted {
                return Ok(());
            }
            return Err(err);
        }

        for ev in &self.buffer[..n as usize] {
            let token = ev.u64;
            let flags = ev.events;

            if token == WAKE_TOKEN {
                sys_drain(self.wake_fd);
                continue;
            }

            let mut ready = Interest::EMPTY;
            if flags & EPOLLIN as u32 != 0 {
                ready |= Interest::READABLE;
            }
            if flags & EPOLLPRI as u32 != 0 {
                ready |= Interest::PRIORITY;
            }
            if flags & EPOLLOUT as u32 != 0 {
                ready |= Interest::WRITABLE;
            }

            push_merged(
                events,
                Event {
                    fd: token as RawFd,
                    ready,
                    error: flags & (EPOLLERR | EPOLLHUP) as u32 != 0,
                },
            );
        }

        Ok(())
    }

    fn ctl(&self, op: i32, fd: RawFd, interest: Interest) -> io::Result<()> {
        let mut flags = 0;

        if interest.is_readable() {
            flags |= EPOLLIN;
        }
        if interest.is_priority() {
            flags |= EPOLLPRI;
        }
        if interest.is_writable() {
            flags |= EPOLLOUT;
        }

        let mut event = epoll_event {
            events: flags as u32,
            u64: fd as u64,
        };

        if unsafe { epoll_ctl(self.epoll, op, fd, &mut event) } < 0 {
            Err(io::Error::last_os_error())
        } else {
            Ok(())
        }
    }
}

impl Drop for EpollPoller {
    fn drop(&mut self) {
        sys_close(self.wake_fd);
        sys_close(self.epoll);
    }
}
