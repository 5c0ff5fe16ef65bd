use std::time::Duration;

use bytes::Bytes;

use crate::error::Result;

/// Default write timeout. Without one, losing the port goes undetected
/// because writes block forever.
pub const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_secs(2);

/// Default inter-byte timeout for transports that support one.
pub const DEFAULT_INTER_BYTE_TIMEOUT: Duration = Duration::from_millis(10);

/// Timeouts applied to a transport before background polling starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    /// Upper bound on a single write call.
    pub write: Duration,
    /// Maximum gap between bytes before a read returns what it has.
    /// Transports without a native inter-byte setting ignore it.
    pub inter_byte: Option<Duration>,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            write: DEFAULT_WRITE_TIMEOUT,
            inter_byte: Some(DEFAULT_INTER_BYTE_TIMEOUT),
        }
    }
}

/// A character-stream connection to an embedded controller.
///
/// Implementations must never block indefinitely: `read_available` returns
/// only bytes that are already buffered (possibly none), and `write` is
/// bounded by the configured write timeout.
pub trait Transport: Send {
    /// Read every byte currently available without waiting for more.
    fn read_available(&mut self) -> Result<Bytes>;

    /// Write `data`, returning how many bytes the port accepted.
    fn write(&mut self, data: &[u8]) -> Result<usize>;

    /// Reopen a closed transport with its original settings.
    fn open(&mut self) -> Result<()>;

    /// Close the transport. Closing an already closed transport is a no-op.
    fn close(&mut self) -> Result<()>;

    /// Whether the transport currently holds an open handle.
    fn is_open(&self) -> bool;

    /// Discard bytes received but not yet read.
    fn flush_input(&mut self) -> Result<()>;

    /// Discard or drain bytes queued for transmission.
    fn flush_output(&mut self) -> Result<()>;

    /// Apply read/write timeouts.
    fn set_timeouts(&mut self, timeouts: Timeouts) -> Result<()>;

    /// Port name for diagnostics.
    fn name(&self) -> &str;
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn read_available(&mut self) -> Result<Bytes> {
        (**self).read_available()
    }

    fn write(&mut self, data: &[u8]) -> Result<usize> {
        (**self).write(data)
    }

    fn open(&mut self) -> Result<()> {
        (**self).open()
    }

    fn close(&mut self) -> Result<()> {
        (**self).close()
    }

    fn is_open(&self) -> bool {
        (**self).is_open()
    }

    fn flush_input(&mut self) -> Result<()> {
        (**self).flush_input()
    }

    fn flush_output(&mut self) -> Result<()> {
        (**self).flush_output()
    }

    fn set_timeouts(&mut self, timeouts: Timeouts) -> Result<()> {
        (**self).set_timeouts(timeouts)
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}
