//! TCP reachability probe

use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

/// Whether `host:port` accepts a TCP connection within `timeout`
///
/// The connection is closed immediately; nothing is sent.
pub fn probe(host: &str, port: u16, timeout: Duration) -> bool {
    let addrs = match (host, port).to_socket_addrs() {
        Ok(addrs) => addrs,
        Err(e) => {
            tracing::warn!("Cannot resolve {}:{}: {}", host, port, e);
            return false;
        }
    };

    for addr in addrs {
        match TcpStream::connect_timeout(&addr, timeout) {
            Ok(_) => return true,
            Err(e) => tracing::trace!("Probe of {} failed: {}", addr, e),
        }
    }
    false
}
