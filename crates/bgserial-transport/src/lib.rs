//! Character-stream transport abstraction for background serial links.
//!
//! Provides one interface over the byte pipes an embedded controller can be
//! reached through:
//! - Native serial ports (behind the `serial` feature)
//! - TCP serial bridges addressed as `socket://host:port`
//! - An in-memory transport with fault injection for tests and demos
//!
//! This is the lowest layer of bgserial. Everything else builds on top of
//! the [`Transport`] trait provided here.

pub mod error;
pub mod memory;
#[cfg(feature = "serial")]
pub mod serial;
pub mod tcp;
pub mod traits;

pub use error::{Result, TransportError};
pub use memory::MemoryTransport;
#[cfg(feature = "serial")]
pub use serial::{list_ports, PortSummary, SerialTransport};
pub use tcp::TcpTransport;
pub use traits::{Timeouts, Transport};

/// URL-style prefix that selects [`TcpTransport`] in [`open_transport`].
pub const SOCKET_PREFIX: &str = "socket://";

/// Open a transport from a port string.
///
/// `socket://host:port` connects to a TCP serial bridge; any other string is
/// treated as a serial device path opened at `baud`.
pub fn open_transport(port: &str, baud: u32) -> Result<Box<dyn Transport>> {
    if let Some(addr) = port.strip_prefix(SOCKET_PREFIX) {
        if addr.is_empty() {
            return Err(TransportError::InvalidPort(port.to_string()));
        }
        return Ok(Box::new(TcpTransport::connect(addr)?));
    }

    open_serial(port, baud)
}

#[cfg(feature = "serial")]
fn open_serial(port: &str, baud: u32) -> Result<Box<dyn Transport>> {
    Ok(Box::new(SerialTransport::open(port, baud)?))
}

#[cfg(not(feature = "serial"))]
fn open_serial(port: &str, _baud: u32) -> Result<Box<dyn Transport>> {
    Err(TransportError::InvalidPort(format!(
        "{port} (serial support not compiled in, use {SOCKET_PREFIX}host:port)"
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_socket_address_is_rejected() {
        let result = open_transport("socket://", 57600);
        assert!(matches!(result, Err(TransportError::InvalidPort(_))));
    }

    #[test]
    fn socket_prefix_opens_tcp_transport() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();

        let transport = open_transport(&format!("socket://{addr}"), 57600).unwrap();
        assert!(transport.is_open());
        assert_eq!(transport.name(), addr.to_string());
    }
}
