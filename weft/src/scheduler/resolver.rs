use super::shared::Outcome;
use super::suspend::Resumer;
use crate::reactor::Registration;

use crossbeam_channel::{Sender, unbounded};
use parking_lot::Mutex;
use std::io;
use std::net::{IpAddr, ToSocketAddrs};
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

struct Job {
    host: String,
    registration: Registration,
    resumer: Resumer,
}

/// Runs system name resolution off the scheduler thread.
///
/// The worker thread is spawned on first use and exits once the resolver
/// is stopped and its queue has drained.
pub(crate) struct Resolver {
    thread_name: String,
    sender: Mutex<Option<Sender<Job>>>,
    stopped: AtomicBool,
}

impl Resolver {
    pub(crate) fn new(thread_name: String) -> Self {
        Self {
            thread_name,
            sender: Mutex::new(None),
            stopped: AtomicBool::new(false),
        }
    }

    pub(crate) fn submit(&self, host: String, registration: Registration, resumer: Resumer) {
        let job = Job {
            host,
            registration,
            resumer,
        };

        let job = match self.sender() {
            Ok(sender) => match sender.send(job) {
                Ok(()) => return,
                Err(error) => error.into_inner(),
            },
            Err(error) => {
                tracing::warn!(%error, "resolver unavailable");
                job
            }
        };

        if job.registration.fire() {
            let error = io::Error::new(io::ErrorKind::NotConnected, "resolver is not running");
            job.resumer.resume(Outcome::Resolved(Err(error)));
        }
    }

    pub(crate) fn stop(&self) {
        self.stopped.store(true, Ordering::Release);
        self.sender.lock().take();
    }

    fn sender(&self) -> io::Result<Sender<Job>> {
        if self.stopped.load(Ordering::Acquire) {
            return Err(io::Error::new(io::ErrorKind::NotConnected, "resolver stopped"));
        }

        let mut slot = self.sender.lock();
        if let Some(sender) = slot.as_ref() {
            return Ok(sender.clone());
        }

        let (sender, receiver) = unbounded::<Job>();

        thread::Builder::new()
            .name(self.thread_name.clone())
            .spawn(move || {
                for job in receiver {
                    if !job.registration.is_armed() {
                        continue;
                    }

                    let result = lookup(&job.host);
                    tracing::trace!(host = %job.host, ok = result.is_ok(), "resolved");

                    if job.registration.fire() {
                        job.resumer.resume(Outcome::Resolved(result));
                    }
                }
            })?;

        *slot = Some(sender.clone());
        Ok(sender)
    }
}

/// Parses `host` as an IP literal, accepting bracketed IPv6.
pub(crate) fn parse_literal(host: &str) -> Option<IpAddr> {
    let host = host
        .strip_prefix('[')
        .and_then(|h| h.strip_suffix(']'))
        .unwrap_or(host);

    host.parse().ok()
}

/// Resolves `host` through the system resolver, without duplicates and in
/// the order the resolver returned them.
fn lookup(host: &str) -> io::Result<Vec<IpAddr>> {
    let mut addresses = Vec::new();

    for address in (host, 0).to_socket_addrs()? {
        let ip = address.ip();
        if !addresses.contains(&ip) {
            addresses.push(ip);
        }
    }

    if addresses.is_empty() {
        return Err(io::Error::new(
            io::ErrorKind::NotFound,
            format!("no addresses found for {host}"),
        ));
    }

    Ok(addresses)
}
