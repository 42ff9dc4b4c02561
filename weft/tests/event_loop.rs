use std::fs::File;
use std::io::{ErrorKind, Write};
use std::os::fd::{AsRawFd, RawFd};
use std::os::unix::net::UnixStream;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, RecvTimeoutError, unbounded};
use weft::reactor::{
    EventLoop, EventLoopBuilder, Interest, IoEvent, ReadOutcome, Reactor, Registration,
};

const PATIENCE: Duration = Duration::from_secs(2);
const QUIET: Duration = Duration::from_millis(100);

fn pair() -> (UnixStream, UnixStream) {
    let (left, right) = UnixStream::pair().unwrap();
    left.set_nonblocking(true).unwrap();
    right.set_nonblocking(true).unwrap();
    (left, right)
}

fn timer(event_loop: &EventLoop, delay_ms: u64, label: &'static str) -> (Registration, Receiver<&'static str>) {
    let (tx, rx) = unbounded();
    let registration = Registration::new();

    event_loop
        .schedule_timer(
            delay_ms,
            registration.clone(),
            Box::new(move || {
                let _ = tx.send(label);
            }),
        )
        .unwrap();

    (registration, rx)
}

fn watch(
    event_loop: &EventLoop,
    fd: RawFd,
    interest: Interest,
    timeout_ms: Option<u64>,
) -> (Registration, Receiver<IoEvent>) {
    let (tx, rx) = unbounded();
    let registration = Registration::new();

    event_loop
        .register_io(
            fd,
            interest,
            timeout_ms,
            registration.clone(),
            Box::new(move |event| {
                let _ = tx.send(event);
            }),
        )
        .unwrap();

    (registration, rx)
}

#[test]
fn test_timer_fires_after_delay() {
    let event_loop = EventLoop::start().unwrap();
    let start = Instant::now();

    let (registration, rx) = timer(&event_loop, 20, "tick");

    assert_eq!(rx.recv_timeout(PATIENCE), Ok("tick"));
    assert!(start.elapsed() >= Duration::from_millis(20));
    assert!(!registration.is_armed());
}

#[test]
fn test_timers_fire_in_deadline_order() {
    let event_loop = EventLoop::start().unwrap();
    let (tx, rx) = unbounded();

    for (delay, label) in [(40u64, "late"), (10, "early"), (25, "middle")] {
        let tx = tx.clone();
        event_loop
            .schedule_timer(
                delay,
                Registration::new(),
                Box::new(move || {
                    let _ = tx.send(label);
                }),
            )
            .unwrap();
    }

    let order: Vec<_> = (0..3).map(|_| rx.recv_timeout(PATIENCE).unwrap()).collect();
    assert_eq!(order, vec!["early", "middle", "late"]);
}

#[test]
fn test_cancelled_timer_never_fires() {
    let event_loop = EventLoop::start().unwrap();

    let (registration, rx) = timer(&event_loop, 10, "tick");
    assert!(registration.cancel());

    assert!(rx.recv_timeout(QUIET).is_err());
}

#[test]
fn test_cancelled_timers_are_released_before_their_deadline() {
    let event_loop = EventLoop::start().unwrap();

    let receivers: Vec<_> = (0..1_000)
        .map(|_| {
            let (registration, rx) = timer(&event_loop, 60_000, "late");
            assert!(registration.cancel());
            rx
        })
        .collect();

    // Dropping an entry drops its callback and the sender it owns.
    assert_eq!(
        receivers[0].recv_timeout(PATIENCE),
        Err(RecvTimeoutError::Disconnected)
    );

    let (_live, rx) = timer(&event_loop, 10, "live");
    assert_eq!(rx.recv_timeout(PATIENCE).unwrap(), "live");
}

#[test]
fn test_publish_reaches_subscriber() {
    let event_loop = EventLoop::start().unwrap();
    let (tx, rx) = unbounded();

    event_loop.subscribe(
        "news",
        Box::new(move |payload| {
            let _ = tx.send(payload);
        }),
    );

    event_loop.publish("other", b"ignored".to_vec());
    event_loop.publish("news", b"first".to_vec());
    event_loop.publish("news", b"second".to_vec());

    assert_eq!(rx.recv_timeout(PATIENCE).unwrap(), b"first");
    assert_eq!(rx.recv_timeout(PATIENCE).unwrap(), b"second");

    event_loop.unsubscribe("news");
    event_loop.publish("news", b"late".to_vec());

    assert!(rx.recv_timeout(QUIET).is_err());
}

#[test]
fn test_readiness_after_peer_writes() {
    let event_loop = EventLoop::start().unwrap();
    let (mut left, right) = pair();

    let (_registration, rx) = watch(&event_loop, right.as_raw_fd(), Interest::READABLE, None);
    assert!(rx.recv_timeout(QUIET).is_err());

    left.write_all(b"x").unwrap();
    assert!(matches!(rx.recv_timeout(PATIENCE), Ok(IoEvent::Ready)));
}

#[test]
fn test_readiness_timeout() {
    let event_loop = EventLoop::start().unwrap();
    let (_left, right) = pair();
    let start = Instant::now();

    let (_registration, rx) = watch(&event_loop, right.as_raw_fd(), Interest::READABLE, Some(30));

    assert!(matches!(rx.recv_timeout(PATIENCE), Ok(IoEvent::TimedOut)));
    assert!(start.elapsed() >= Duration::from_millis(30));
}

#[test]
fn test_waiters_on_one_fd_with_different_interests() {
    let event_loop = EventLoop::start().unwrap();
    let (mut left, right) = pair();

    let (_reader, readable) = watch(&event_loop, right.as_raw_fd(), Interest::READABLE, None);
    let (_writer, writable) = watch(&event_loop, right.as_raw_fd(), Interest::WRITABLE, None);

    assert!(matches!(writable.recv_timeout(PATIENCE), Ok(IoEvent::Ready)));
    assert!(readable.recv_timeout(QUIET).is_err());

    left.write_all(b"x").unwrap();
    assert!(matches!(readable.recv_timeout(PATIENCE), Ok(IoEvent::Ready)));
}

#[test]
fn test_cancelled_io_registration_is_skipped() {
    let event_loop = EventLoop::start().unwrap();
    let (mut left, right) = pair();

    let (registration, rx) = watch(&event_loop, right.as_raw_fd(), Interest::READABLE, None);
    assert!(registration.cancel());

    left.write_all(b"x").unwrap();
    assert!(rx.recv_timeout(QUIET).is_err());
}

#[test]
fn test_regular_file_is_always_ready() {
    let event_loop = EventLoop::start().unwrap();
    let file = File::open("Cargo.toml").unwrap();

    let (_registration, rx) = watch(&event_loop, file.as_raw_fd(), Interest::READABLE, None);

    assert!(matches!(rx.recv_timeout(PATIENCE), Ok(IoEvent::Ready)));
}

#[test]
fn test_close_all_registrations() {
    let event_loop = EventLoop::start().unwrap();
    let (mut left, right) = pair();
    let (published, inbox) = unbounded();

    let (_timer, ticks) = timer(&event_loop, 30, "tick");
    let (_io, events) = watch(&event_loop, right.as_raw_fd(), Interest::READABLE, None);
    event_loop.subscribe(
        "news",
        Box::new(move |payload| {
            let _ = published.send(payload);
        }),
    );

    event_loop.close_all_registrations();

    left.write_all(b"x").unwrap();
    event_loop.publish("news", b"dropped".to_vec());

    assert!(ticks.recv_timeout(QUIET).is_err());
    assert!(events.try_recv().is_err());
    assert!(inbox.try_recv().is_err());
}

#[test]
fn test_read_and_write_primitives() {
    let event_loop = EventLoop::start().unwrap();
    let (left, right) = pair();
    let mut buffer = [0u8; 8];

    assert_eq!(
        event_loop.read(right.as_raw_fd(), &mut buffer).unwrap(),
        ReadOutcome::WouldBlock
    );

    assert_eq!(event_loop.write(left.as_raw_fd(), b"abc").unwrap(), 3);
    assert_eq!(
        event_loop.read(right.as_raw_fd(), &mut buffer).unwrap(),
        ReadOutcome::Read(3)
    );
    assert_eq!(&buffer[..3], b"abc");

    drop(left);
    assert_eq!(
        event_loop.read(right.as_raw_fd(), &mut buffer).unwrap(),
        ReadOutcome::Eof
    );
}

#[test]
fn test_write_to_full_socket_would_block() {
    let event_loop = EventLoop::start().unwrap();
    let (left, _right) = pair();
    let chunk = vec![0u8; 64 * 1024];

    let error = loop {
        match event_loop.write(left.as_raw_fd(), &chunk) {
            Ok(_) => continue,
            Err(error) => break error,
        }
    };

    assert_eq!(error.kind(), ErrorKind::WouldBlock);
}

#[test]
fn test_builder_and_shutdown() {
    let event_loop: Arc<EventLoop> = EventLoopBuilder::new()
        .thread_name("weft-test-loop")
        .event_capacity(4)
        .start()
        .unwrap();

    let (_registration, rx) = timer(&event_loop, 1, "tick");
    assert_eq!(rx.recv_timeout(PATIENCE), Ok("tick"));

    drop(event_loop);
}
