use super::channel::wake_channel;
use super::pending::{Mode, Target};
use super::resolver::parse_literal;
use super::shared::{Event, Outcome, Shared};
use super::suspend::Suspension;
use crate::context;
use crate::error::Error;
use crate::hooks::{Blocker, Hooks, Trap, millis_ceil};
use crate::reactor::{Interest, IoEvent, ReadOutcome};
use crate::task::{AwaitAll, BoxFuture, Runnable, Task, TaskHandle, TaskId};
use crate::time::yield_now::YieldOnce;

use std::future::{self, Future};
use std::io;
use std::net::IpAddr;
use std::os::fd::RawFd;
use std::sync::Arc;
use std::time::Duration;

/// A cloneable, thread-safe reference to a scheduler.
///
/// `Handle` implements the trap operations of [`Hooks`] and the task
/// operations built on them. Trap operations must be called from a task
/// running on this scheduler; [`unblock`](Hooks::unblock),
/// [`spawn`](Self::spawn) and [`close`](Self::close) may be called from
/// any thread.
#[derive(Clone)]
pub struct Handle {
    pub(crate) shared: Arc<Shared>,
}

impl Handle {
    /// Returns the handle of the scheduler driving the current thread.
    ///
    /// # Panics
    ///
    /// Panics if called outside of [`Scheduler::block_on`](crate::Scheduler::block_on).
    pub fn current() -> Self {
        match Self::try_current() {
            Some(handle) => handle,
            None => panic!("must be called from within a weft scheduler"),
        }
    }

    pub fn try_current() -> Option<Self> {
        context::current_scheduler()
    }

    fn is_current(&self) -> bool {
        context::current_scheduler().is_some_and(|h| Arc::ptr_eq(&h.shared, &self.shared))
    }

    /// Spawns `body` as a new task.
    ///
    /// From a task of this scheduler, the new task is polled once before
    /// `spawn` returns and, unless the caller is the root task, records
    /// the caller as its parent. From anywhere else it is queued.
    pub fn spawn<F, T, E>(&self, body: F) -> TaskHandle<T>
    where
        F: Future<Output = Result<T, E>> + Send + 'static,
        T: Send + 'static,
        E: Into<anyhow::Error> + 'static,
    {
        let shared = &self.shared;
        let id = TaskId::next();

        if shared.is_closed() {
            let task = Task::completed(id, Err(Error::Closed.into()), shared);
            return TaskHandle {
                task: Arc::new(task),
            };
        }

        let current = self.is_current().then(context::current_task).flatten();
        let parent = current.filter(|task| !shared.is_root(*task));

        let future: BoxFuture<T> = Box::pin(async move { body.await.map_err(Into::into) });
        let task = Arc::new(Task::new(id, parent, future, shared));
        shared.tasks.lock().insert(id, task.clone());

        tracing::debug!(task = %id, ?parent, "spawn");

        if current.is_some() {
            task.clone().run();
        } else {
            task.schedule();
        }

        TaskHandle { task }
    }

    /// Waits for every task in `handles`; see [`task::await_all`](crate::task::await_all).
    ///
    /// # Panics
    ///
    /// The calling task panics if it suspends on another operation while
    /// the returned future is alive and still waiting on children.
    pub fn await_all<T, I>(&self, handles: I) -> AwaitAll<T>
    where
        T: Send + 'static,
        I: IntoIterator<Item = TaskHandle<T>>,
    {
        AwaitAll::new(&self.shared, handles.into_iter().collect())
    }

    /// Resolves `host` to its addresses without blocking the scheduler.
    ///
    /// IP literals, including bracketed IPv6, resolve immediately. Other
    /// names are looked up on the resolver thread while the calling task is
    /// suspended.
    pub fn address_resolve(&self, host: &str) -> Trap<'static, io::Result<Vec<IpAddr>>> {
        if let Some(ip) = parse_literal(host) {
            return Box::pin(future::ready(Ok(vec![ip])));
        }

        let mut suspension = Suspension::begin(
            &self.shared,
            Target::Resolve {
                host: host.to_owned(),
            },
            Mode::Once,
        );
        suspension.resolve(host.to_owned());

        Box::pin(async move {
            match suspension.resumed().await {
                Outcome::Resolved(result) => result,
                other => unreachable!("address_resolve resumed by {other:?}"),
            }
        })
    }

    /// Shuts the scheduler down.
    ///
    /// Drops every reactor registration, every live task and every pending
    /// operation, and stops the resolver. Tasks that are dropped complete
    /// with [`Error::Closed`]; later reactor events are ignored. Calling
    /// `close` again has no effect.
    pub fn close(&self) {
        let shared = &self.shared;
        if !shared.mark_closed() {
            return;
        }

        shared.reactor.close_all_registrations();

        let tasks: Vec<Arc<dyn Runnable>> = shared.tasks.lock().drain().map(|(_, t)| t).collect();
        shared.pending.lock().clear();

        let count = tasks.len();
        for task in tasks {
            task.abandon();
        }

        shared.resolver.stop();
        shared.send(Event::Closed);

        tracing::debug!(tasks = count, "scheduler closed");
    }

    /// Returns `true` once [`close`](Self::close) was called.
    pub fn is_closed(&self) -> bool {
        self.shared.is_closed()
    }
}

impl Hooks for Handle {
    fn io_wait(
        &self,
        fd: RawFd,
        interest: Interest,
        timeout: Option<Duration>,
    ) -> Trap<'static, io::Result<Interest>> {
        let timeout_ms = timeout.map(millis_ceil);

        let mut suspension = Suspension::begin(
            &self.shared,
            Target::Io {
                fd,
                interest,
                timeout_ms,
            },
            Mode::Once,
        );
        let submitted = suspension.watch_io(fd, interest, timeout_ms);

        Box::pin(async move {
            submitted?;

            match suspension.resumed().await {
                Outcome::Io(IoEvent::Ready) => Ok(interest),
                Outcome::Io(IoEvent::TimedOut) => Ok(Interest::EMPTY),
                Outcome::Io(IoEvent::Failed(error)) => Err(error),
                other => unreachable!("io_wait resumed by {other:?}"),
            }
        })
    }

    fn io_read<'a>(
        &self,
        fd: RawFd,
        buffer: &'a mut [u8],
        length: Option<usize>,
        offset: usize,
    ) -> Trap<'a, io::Result<usize>> {
        let shared = self.shared.clone();

        Box::pin(async move {
            if offset > buffer.len() {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidInput,
                    "read offset is past the end of the buffer",
                ));
            }

            let start = offset;
            let mut offset = offset;

            loop {
                let capacity = buffer.len() - offset;
                if capacity == 0 {
                    return Ok(offset);
                }

                let size = match length {
                    Some(length) if length > 0 => length,
                    _ => shared.max_read,
                }
                .min(capacity);

                match shared.reactor.read(fd, &mut buffer[offset..offset + size])? {
                    ReadOutcome::WouldBlock if offset == start => {
                        return Err(io::ErrorKind::WouldBlock.into());
                    }
                    ReadOutcome::WouldBlock | ReadOutcome::Eof => return Ok(offset),
                    ReadOutcome::Read(n) => {
                        offset += n;

                        if n < size || offset == buffer.len() {
                            return Ok(offset);
                        }

                        YieldOnce::new().await;
                    }
                }
            }
        })
    }

    fn io_write(
        &self,
        fd: RawFd,
        buffer: &[u8],
        length: Option<usize>,
        offset: usize,
    ) -> io::Result<usize> {
        let Some(rest) = buffer.get(offset..) else {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "write offset is past the end of the buffer",
            ));
        };

        let length = length.unwrap_or(rest.len()).min(rest.len());

        let written = match self.shared.reactor.write(fd, &rest[..length]) {
            Ok(n) => n,
            Err(error) if error.kind() == io::ErrorKind::WouldBlock => 0,
            Err(error) => return Err(error),
        };

        Ok(rest.len() - written)
    }

    fn kernel_sleep(&self, duration: Option<Duration>) -> Trap<'static, io::Result<()>> {
        let Some(duration) = duration else {
            return Box::pin(async {
                YieldOnce::new().await;
                Ok::<_, io::Error>(())
            });
        };

        let delay_ms = millis_ceil(duration);
        let mut suspension =
            Suspension::begin(&self.shared, Target::Timer { delay_ms }, Mode::Once);
        let submitted = suspension.timer(delay_ms);

        Box::pin(async move {
            submitted?;

            suspension.resumed().await;
            Ok::<_, io::Error>(())
        })
    }

    fn block(
        &self,
        blocker: &Blocker,
        timeout: Option<Duration>,
    ) -> Trap<'static, io::Result<bool>> {
        let Some(task) = context::current_task() else {
            panic!("block on {blocker} called outside of a task");
        };

        let channel = wake_channel(task);
        let timeout_ms = timeout.map(millis_ceil);

        let mut suspension = Suspension::begin(
            &self.shared,
            Target::Signal {
                channel: channel.clone(),
                timeout_ms,
            },
            Mode::Once,
        );
        suspension.subscribe(channel);

        let submitted = match timeout_ms {
            Some(delay_ms) => suspension.timer(delay_ms),
            None => Ok(()),
        };

        tracing::trace!(task = %task, %blocker, ?timeout_ms, "block");

        Box::pin(async move {
            submitted?;

            let unblocked = match suspension.resumed().await {
                Outcome::Signal(_) => true,
                Outcome::Timer => false,
                other => unreachable!("block resumed by {other:?}"),
            };
            Ok::<_, io::Error>(unblocked)
        })
    }

    fn unblock(&self, blocker: &Blocker, task: TaskId) {
        tracing::trace!(task = %task, %blocker, "unblock");
        self.shared.reactor.publish(&wake_channel(task), Vec::new());
    }
}
