//! Example: TCP echo over raw descriptors.
//!
//! The server and the client run as tasks of the same scheduler; every
//! read, write and accept suspends only the task that issued it.

use std::io::{self, ErrorKind};
use std::net::{TcpListener, TcpStream};
use std::os::fd::AsRawFd;

use tracing_subscriber::EnvFilter;
use weft::io::Interest;
use weft::{net, task};

async fn accept(listener: &TcpListener) -> io::Result<TcpStream> {
    loop {
        match listener.accept() {
            Ok((stream, addr)) => {
                println!("accepted connection from {addr}");
                stream.set_nonblocking(true)?;
                return Ok(stream);
            }
            Err(e) if e.kind() == ErrorKind::WouldBlock => {
                weft::io::wait(listener.as_raw_fd(), Interest::READABLE, None).await?;
            }
            Err(e) => return Err(e),
        }
    }
}

async fn serve(listener: TcpListener) -> io::Result<usize> {
    let stream = accept(&listener).await?;
    let mut buffer = [0u8; 1024];
    let mut echoed = 0;

    loop {
        let n = weft::io::read(stream.as_raw_fd(), &mut buffer).await?;
        if n == 0 {
            return Ok(echoed);
        }

        weft::io::write_all(stream.as_raw_fd(), &buffer[..n]).await?;
        echoed += n;
    }
}

#[weft::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let addresses = net::resolve("localhost").await.unwrap();
    println!("localhost resolves to {addresses:?}");

    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    listener.set_nonblocking(true).unwrap();
    let addr = listener.local_addr().unwrap();
    println!("echo server listening on {addr}");

    let server = task::spawn(serve(listener));

    let client = TcpStream::connect(addr).unwrap();
    client.set_nonblocking(true).unwrap();

    let message = b"hello through the trap";
    weft::io::write_all(client.as_raw_fd(), message).await.unwrap();

    let mut reply = vec![0u8; message.len()];
    let mut received = 0;
    while received < reply.len() {
        let n = weft::io::read(client.as_raw_fd(), &mut reply[received..])
            .await
            .unwrap();
        if n == 0 {
            break;
        }
        received += n;
    }
    println!("client got back {:?}", String::from_utf8_lossy(&reply[..received]));

    client.shutdown(std::net::Shutdown::Write).unwrap();
    println!("server echoed {} bytes", server.await.unwrap());
}
