use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use weft::{Handle, net};

#[weft::test]
async fn test_ipv4_literal() {
    let addresses = net::resolve("192.0.2.7").await.unwrap();
    assert_eq!(addresses, vec![IpAddr::V4(Ipv4Addr::new(192, 0, 2, 7))]);
}

#[weft::test]
async fn test_bracketed_ipv6_literal() {
    let addresses = Handle::current().address_resolve("[::1]").await.unwrap();
    assert_eq!(addresses, vec![IpAddr::V6(Ipv6Addr::LOCALHOST)]);
}

#[weft::test]
async fn test_localhost_resolves_to_loopback() {
    let addresses = net::resolve("localhost").await.unwrap();

    assert!(!addresses.is_empty());
    assert!(addresses.iter().all(IpAddr::is_loopback), "{addresses:?}");
}

#[weft::test]
async fn test_unknown_host_fails() {
    // `.invalid` is reserved and never resolves.
    let result = net::resolve("no-such-host.invalid").await;

    assert!(result.is_err(), "{result:?}");
}
