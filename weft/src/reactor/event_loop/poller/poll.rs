//! Portable `poll(2)` poller for Unix targets without epoll.
//!
//! The watched set is rebuilt into a `pollfd` array on every call; index 0
//! is always the read end of the wake pipe.

use super::unix::{sys_close, sys_drain, sys_set_nonblocking};
use super::{Waker, timeout_ms};
use crate::reactor::Interest;
use crate::reactor::event_loop::event::{Event, push_merged};

use libc::{POLLERR, POLLHUP, POLLIN, POLLNVAL, POLLOUT, POLLPRI, pollfd};
use std::collections::HashMap;
use std::io;
use std::os::fd::RawFd;
use std::sync::Arc;
use std::time::Duration;

pub(crate) struct PollPoller {
    wake_fd: RawFd,
    pollfds: Vec<pollfd>,
    registered: HashMap<RawFd, Interest>,
    waker: Arc<Waker>,
}

impl PollPoller {
    pub(crate) fn new(capacity: usize) -> io::Result<Self> {
        let mut fds = [0 as RawFd; 2];
        if unsafe { libc::pipe(fds.as_mut_ptr()) } < 0 {
            return Err(io::Error::last_os_error());
        }

        let [reader, writer] = fds;
        for fd in fds {
            let cloexec = unsafe { libc::fcntl(fd, libc::F_SETFD, libc::FD_CLOEXEC) };
            let configured = if cloexec < 0 {
                Err(io::Error::last_os_error())
            } else {
                sys_set_nonblocking(fd)
            };

            if let Err(error) = configured {
                sys_close(reader);
                sys_close(writer);
                return Err(error);
            }
        }

        Ok(Self {
            wake_fd: reader,
            pollfds: Vec::with_capacity(capacity.max(1)),
            registered: HashMap::new(),
            waker: Arc::new(Waker(writer)),
        })
    }

    pub(crate) fn waker(&self) -> Arc<Waker> {
        self.waker.clone()
    }

    pub(crate) fn register(&mut self, fd: RawFd, interest: Interest) -> io::Result<()> {
        if interest.is_empty() {
            self.deregister(fd);
            return Ok(());
        }

        // poll(2) only reports POLLNVAL later; fail up front like epoll does.
        if unsafe { libc::fcntl(fd, libc::F_GETFD) } < 0 {
            return Err(io::Error::last_os_error());
        }

        self.registered.insert(fd, interest);
        Ok(())
    }

    pub(crate) fn deregister(&mut self, fd: RawFd) {
        self.registered.remove(&fd);
    }

    pub(crate) fn poll(&mut self, events: &mut Vec<Event>, timeout: Option<Duration>) -> io::Result<()> {
        self.pollfds.clear();
        self.pollfds.push(pollfd {
            fd: self.wake_fd,
            events: POLLIN,
            revents: 0,
        });

        for (&fd, &interest) in &self.registered {
            self.pollfds.push(pollfd {
                fd,
                events: interest.bits() as i16,
                revents: 0,
            });
        }

        let n = unsafe {
            libc::poll(
                self.pollfds.as_mut_ptr(),
                self.pollfds.len() as libc::nfds_t,
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

        for entry in &self.pollfds {
            if entry.revents == 0 {
                continue;
            }

            if entry.fd == self.wake_fd {
                sys_drain(self.wake_fd);
                continue;
            }

            let ready = Interest::from_bits_truncate(
                (entry.revents & (POLLIN | POLLPRI | POLLOUT)) as u8,
            );

            push_merged(
                events,
                Event {
                    fd: entry.fd,
                    ready,
                    error: entry.revents & (POLLERR | POLLHUP | POLLNVAL) != 0,
                },
            );
        }

        Ok(())
    }
}

impl Drop for PollPoller {
    fn drop(&mut self) {
        sys_close(self.wake_fd);
    }
}
