use std::collections::VecDeque;
use std::io::ErrorKind;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use bytes::Bytes;
use tracing::trace;

use crate::error::{Result, TransportError};
use crate::traits::{Timeouts, Transport};

/// In-memory transport with scripted inbound data and fault injection.
///
/// Clones share state, so a test keeps one handle to feed bytes and inject
/// failures while the link owns the other.
#[derive(Clone)]
pub struct MemoryTransport {
    name: String,
    state: Arc<Mutex<MemoryState>>,
}

#[derive(Default)]
struct MemoryState {
    open: bool,
    inbound: VecDeque<Bytes>,
    written: Vec<u8>,
    timeouts: Option<Timeouts>,
    fail_reads: usize,
    fail_writes: usize,
    short_writes: usize,
    fail_opens: usize,
    fail_set_timeouts: usize,
    opens: usize,
    closes: usize,
    input_flushes: usize,
    output_flushes: usize,
}

impl MemoryTransport {
    /// Create an open in-memory transport.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: Arc::new(Mutex::new(MemoryState {
                open: true,
                ..MemoryState::default()
            })),
        }
    }

    fn state(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Queue bytes to be returned by one future `read_available` call.
    pub fn push_inbound(&self, data: impl AsRef<[u8]>) {
        self.state()
            .inbound
            .push_back(Bytes::copy_from_slice(data.as_ref()));
    }

    /// Number of inbound chunks not yet read.
    pub fn pending_inbound(&self) -> usize {
        self.state().inbound.len()
    }

    /// All bytes written so far.
    pub fn written(&self) -> Vec<u8> {
        self.state().written.clone()
    }

    /// Take and clear the bytes written so far.
    pub fn take_written(&self) -> Vec<u8> {
        std::mem::take(&mut self.state().written)
    }

    /// Fail the next `n` reads with an I/O error.
    pub fn fail_next_reads(&self, n: usize) {
        self.state().fail_reads = n;
    }

    /// Fail the next `n` writes with an I/O error.
    pub fn fail_next_writes(&self, n: usize) {
        self.state().fail_writes = n;
    }

    /// Accept only half of the payload on the next `n` writes.
    pub fn short_next_writes(&self, n: usize) {
        self.state().short_writes = n;
    }

    /// Fail the next `n` open attempts. `usize::MAX` fails forever.
    pub fn fail_next_opens(&self, n: usize) {
        self.state().fail_opens = n;
    }

    /// Fail the next `n` `set_timeouts` calls.
    pub fn fail_next_set_timeouts(&self, n: usize) {
        self.state().fail_set_timeouts = n;
    }

    /// Number of successful `open` calls.
    pub fn open_count(&self) -> usize {
        self.state().opens
    }

    /// Number of `close` calls that closed an open handle.
    pub fn close_count(&self) -> usize {
        self.state().closes
    }

    /// Number of `(flush_input, flush_output)` calls.
    pub fn flush_counts(&self) -> (usize, usize) {
        let state = self.state();
        (state.input_flushes, state.output_flushes)
    }

    /// Timeouts most recently applied, if any.
    pub fn timeouts(&self) -> Option<Timeouts> {
        self.state().timeouts
    }
}

fn take_fault(counter: &mut usize) -> bool {
    match *counter {
        0 => false,
        usize::MAX => true,
        _ => {
            *counter -= 1;
            true
        }
    }
}

fn injected(kind: ErrorKind, what: &str) -> TransportError {
    TransportError::Io(std::io::Error::new(kind, format!("injected {what} failure")))
}

impl Transport for MemoryTransport {
    fn read_available(&mut self) -> Result<Bytes> {
        let mut state = self.state();
        if !state.open {
            return Err(TransportError::NotOpen);
        }
        if take_fault(&mut state.fail_reads) {
            return Err(injected(ErrorKind::BrokenPipe, "read"));
        }
        Ok(state.inbound.pop_front().unwrap_or_default())
    }

    fn write(&mut self, data: &[u8]) -> Result<usize> {
        let mut state = self.state();
        if !state.open {
            return Err(TransportError::NotOpen);
        }
        if take_fault(&mut state.fail_writes) {
            return Err(injected(ErrorKind::TimedOut, "write"));
        }
        let accepted = if take_fault(&mut state.short_writes) {
            data.len() / 2
        } else {
            data.len()
        };
        state.written.extend_from_slice(&data[..accepted]);
        trace!(requested = data.len(), accepted, "memory transport write");
        Ok(accepted)
    }

    fn open(&mut self) -> Result<()> {
        let mut state = self.state();
        if take_fault(&mut state.fail_opens) {
            return Err(TransportError::open(
                self.name.clone(),
                std::io::Error::new(ErrorKind::NotFound, "injected open failure"),
            ));
        }
        state.open = true;
        state.opens += 1;
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        let mut state = self.state();
        if state.open {
            state.open = false;
            state.closes += 1;
        }
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.state().open
    }

    fn flush_input(&mut self) -> Result<()> {
        let mut state = self.state();
        state.inbound.clear();
        state.input_flushes += 1;
        Ok(())
    }

    fn flush_output(&mut self) -> Result<()> {
        self.state().output_flushes += 1;
        Ok(())
    }

    fn set_timeouts(&mut self, timeouts: Timeouts) -> Result<()> {
        let mut state = self.state();
        if take_fault(&mut state.fail_set_timeouts) {
            return Err(injected(ErrorKind::InvalidInput, "set_timeouts"));
        }
        state.timeouts = Some(timeouts);
        Ok(())
    }

    fn name(&self) -> &str {
        &self.name
    }
}

impl std::fmt::Debug for MemoryTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryTransport")
            .field("name", &self.name)
            .field("open", &self.is_open())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_scripted_chunks_in_order() {
        let script = MemoryTransport::new("mem");
        let mut transport = script.clone();

        script.push_inbound(b"hel");
        script.push_inbound(b"lo\n");

        assert_eq!(transport.read_available().unwrap().as_ref(), b"hel");
        assert_eq!(transport.read_available().unwrap().as_ref(), b"lo\n");
        assert!(transport.read_available().unwrap().is_empty());
    }

    #[test]
    fn injected_faults_are_consumed() {
        let script = MemoryTransport::new("mem");
        let mut transport = script.clone();

        script.fail_next_reads(1);
        assert!(transport.read_available().is_err());
        assert!(transport.read_available().is_ok());

        script.short_next_writes(1);
        assert_eq!(transport.write(b"abcd").unwrap(), 2);
        assert_eq!(transport.write(b"ef").unwrap(), 2);
        assert_eq!(script.take_written(), b"abef");
    }

    #[test]
    fn closed_transport_rejects_io() {
        let script = MemoryTransport::new("mem");
        let mut transport = script.clone();

        transport.close().unwrap();
        assert!(matches!(
            transport.read_available(),
            Err(TransportError::NotOpen)
        ));
        assert!(matches!(transport.write(b"x"), Err(TransportError::NotOpen)));

        script.fail_next_opens(1);
        assert!(matches!(transport.open(), Err(TransportError::Open { .. })));
        transport.open().unwrap();
        assert!(transport.is_open());
        assert_eq!(script.open_count(), 1);
        assert_eq!(script.close_count(), 1);
    }

    #[test]
    fn injected_timeout_failure_leaves_timeouts_unset() {
        let script = MemoryTransport::new("mem");
        let mut transport = script.clone();

        script.fail_next_set_timeouts(1);
        assert!(transport.set_timeouts(Timeouts::default()).is_err());
        assert_eq!(script.timeouts(), None);

        transport.set_timeouts(Timeouts::default()).unwrap();
        assert_eq!(script.timeouts(), Some(Timeouts::default()));
    }

    #[test]
    fn permanent_open_failure() {
        let script = MemoryTransport::new("mem");
        let mut transport = script.clone();
        script.fail_next_opens(usize::MAX);

        for _ in 0..3 {
            assert!(transport.open().is_err());
        }
    }
}
