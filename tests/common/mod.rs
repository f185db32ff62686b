//! Shared utilities for integration tests.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use conn_limit::{AllowedConnections, ConnLimitRegistry};
use tokio::net::{TcpSocket, TcpStream};

/// Registry with a single identifier.
pub fn registry(id: &str, max: u32) -> Arc<ConnLimitRegistry> {
    Arc::new(ConnLimitRegistry::new(vec![AllowedConnections::new(id, max)], true))
}

#[allow(dead_code)]
pub fn ip(last: u8) -> IpAddr {
    IpAddr::V4(Ipv4Addr::new(192, 168, 1, last))
}

/// Connect to `target` from a specific loopback source address.
#[allow(dead_code)]
pub async fn connect_from(source: Ipv4Addr, target: SocketAddr) -> TcpStream {
    let socket = TcpSocket::new_v4().unwrap();
    socket.bind(SocketAddr::new(IpAddr::V4(source), 0)).unwrap();
    socket.connect(target).await.unwrap()
}

/// Poll `check` until it holds or two seconds pass.
#[allow(dead_code)]
pub async fn eventually<F: Fn() -> bool>(check: F) -> bool {
    for _ in 0..200 {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    check()
}
