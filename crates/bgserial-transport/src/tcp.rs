use std::io::{ErrorKind, Read, Write};
use std::net::{Shutdown, TcpStream};
use std::time::Duration;

use bytes::{Bytes, BytesMut};
use tracing::debug;

use crate::error::{Result, TransportError};
use crate::traits::{Timeouts, Transport};

const READ_CHUNK_SIZE: usize = 4 * 1024;

/// Read timeout used when no inter-byte timeout is configured.
const MIN_READ_TIMEOUT: Duration = Duration::from_millis(1);

/// TCP transport for serial-over-network bridges (`socket://host:port`).
///
/// Reads wait at most one inter-byte timeout for the stream to go quiet.
/// An orderly close by the remote end is reported as an I/O error because a
/// bridge that hangs up means the controller is gone.
pub struct TcpTransport {
    addr: String,
    timeouts: Timeouts,
    stream: Option<TcpStream>,
}

impl TcpTransport {
    /// Connect to `addr` (`host:port`).
    pub fn connect(addr: &str) -> Result<Self> {
        let mut transport = Self {
            addr: addr.to_string(),
            timeouts: Timeouts::default(),
            stream: None,
        };
        Transport::open(&mut transport)?;
        Ok(transport)
    }

    fn stream_mut(&mut self) -> Result<&mut TcpStream> {
        self.stream.as_mut().ok_or(TransportError::NotOpen)
    }

    fn apply_timeouts(stream: &TcpStream, timeouts: Timeouts) -> Result<()> {
        let read_timeout = timeouts
            .inter_byte
            .filter(|d| !d.is_zero())
            .unwrap_or(MIN_READ_TIMEOUT);
        stream.set_read_timeout(Some(read_timeout))?;
        stream.set_write_timeout(Some(timeouts.write).filter(|d| !d.is_zero()))?;
        Ok(())
    }
}

impl Transport for TcpTransport {
    fn read_available(&mut self) -> Result<Bytes> {
        let stream = self.stream_mut()?;
        let mut buf = BytesMut::new();
        let mut chunk = [0u8; READ_CHUNK_SIZE];

        loop {
            match stream.read(&mut chunk) {
                Ok(0) if buf.is_empty() => {
                    return Err(std::io::Error::new(
                        ErrorKind::UnexpectedEof,
                        "remote end closed the connection",
                    )
                    .into());
                }
                Ok(0) => break,
                Ok(n) => buf.extend_from_slice(&chunk[..n]),
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err)
                    if matches!(err.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) =>
                {
                    break
                }
                Err(err) => return Err(err.into()),
            }
        }

        Ok(buf.freeze())
    }

    fn write(&mut self, data: &[u8]) -> Result<usize> {
        let stream = self.stream_mut()?;
        match stream.write(data) {
            Ok(n) => Ok(n),
            Err(err) if matches!(err.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => Ok(0),
            Err(err) => Err(err.into()),
        }
    }

    fn open(&mut self) -> Result<()> {
        self.stream = None;
        let stream =
            TcpStream::connect(&self.addr).map_err(|e| TransportError::open(&self.addr, e))?;
        stream.set_nodelay(true)?;
        Self::apply_timeouts(&stream, self.timeouts)?;
        debug!(addr = %self.addr, "connected to serial bridge");
        self.stream = Some(stream);
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        if let Some(stream) = self.stream.take() {
            if let Err(err) = stream.shutdown(Shutdown::Both) {
                debug!(addr = %self.addr, error = %err, "shutdown failed");
            }
            debug!(addr = %self.addr, "closed serial bridge connection");
        }
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.stream.is_some()
    }

    fn flush_input(&mut self) -> Result<()> {
        let _discarded = self.read_available()?;
        Ok(())
    }

    fn flush_output(&mut self) -> Result<()> {
        self.stream_mut()?.flush()?;
        Ok(())
    }

    fn set_timeouts(&mut self, timeouts: Timeouts) -> Result<()> {
        self.timeouts = timeouts;
        if let Some(stream) = &self.stream {
            Self::apply_timeouts(stream, timeouts)?;
        }
        Ok(())
    }

    fn name(&self) -> &str {
        &self.addr
    }
}

impl std::fmt::Debug for TcpTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TcpTransport")
            .field("addr", &self.addr)
            .field("open", &self.stream.is_some())
            .finish()
    }
}
