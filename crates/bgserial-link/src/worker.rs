use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use bgserial_frame::LineFramer;
use bgserial_transport::{Transport, TransportError};
use tracing::{debug, error, info, warn};

use crate::config::LinkConfig;
use crate::queue::{lock, OutputQueue};
use crate::state::{AtomicLinkState, LinkState};

/// Fatal reason when the recovery probe is not accepted.
pub(crate) const LOST_CANNOT_WRITE: &str = "lost serial connection, cannot write";

/// State shared between the reader thread and the public handle.
pub(crate) struct Shared {
    pub(crate) transport: Mutex<Option<Box<dyn Transport>>>,
    pub(crate) state: AtomicLinkState,
    pub(crate) fatal: Mutex<Option<String>>,
    pub(crate) framer: Mutex<LineFramer>,
    pub(crate) lines: OutputQueue,
    pub(crate) messages: OutputQueue,
    pub(crate) config: LinkConfig,
}

impl Shared {
    pub(crate) fn new(transport: Box<dyn Transport>, config: LinkConfig) -> Self {
        Self {
            transport: Mutex::new(Some(transport)),
            state: AtomicLinkState::default(),
            fatal: Mutex::new(None),
            framer: Mutex::new(LineFramer::new()),
            lines: OutputQueue::new(),
            messages: OutputQueue::new(),
            config,
        }
    }

    /// One reader iteration. Returns false once the link is fatal.
    pub(crate) fn poll_once(&self) -> bool {
        if self.state.load() == LinkState::Normal {
            self.read_available();
        }
        if self.state.load() == LinkState::Error {
            self.recover();
        }
        self.state.load() != LinkState::Fatal
    }

    fn read_available(&self) {
        // The framer guard spans read and push so a reader left over from a
        // previous `start()` cannot interleave its chunk with ours.
        let mut framer = lock(&self.framer);
        let result = match lock(&self.transport).as_mut() {
            Some(transport) => transport.read_available(),
            None => Err(TransportError::NotOpen),
        };

        match result {
            Ok(data) if !data.is_empty() => {
                let out = framer.push(&data);
                if !out.messages.is_empty() {
                    self.messages.extend(out.messages);
                }
                if !out.lines.is_empty() {
                    self.lines.extend(out.lines);
                }
            }
            Ok(_) => {}
            Err(err) => {
                warn!(error = %err, "serial read failed");
                self.state.mark_error();
            }
        }
    }

    /// Close, reopen and probe the transport. Any failure is fatal.
    fn recover(&self) {
        let mut guard = lock(&self.transport);
        let Some(transport) = guard.as_mut() else {
            self.enter_fatal(LOST_CANNOT_WRITE.to_string());
            return;
        };

        let reason = match reopen_and_probe(&mut **transport, &self.config.probe) {
            Ok(written) if written > 0 => {
                if self.state.recover() {
                    info!(port = transport.name(), "serial connection restored");
                }
                return;
            }
            Ok(_) => LOST_CANNOT_WRITE.to_string(),
            Err(err) => format!("lost serial connection: {err}"),
        };

        release(&mut **transport);
        drop(guard);
        self.enter_fatal(reason);
    }

    pub(crate) fn enter_fatal(&self, reason: String) {
        {
            let mut fatal = lock(&self.fatal);
            if fatal.is_none() {
                error!(%reason, "serial link failed");
                *fatal = Some(reason);
            }
        }
        self.state.mark_fatal();
    }
}

fn reopen_and_probe(transport: &mut dyn Transport, probe: &[u8]) -> Result<usize, TransportError> {
    debug!(port = transport.name(), "attempting serial recovery");
    transport.close()?;
    transport.open()?;
    transport.write(probe)
}

/// Flush and close a transport that is being given up on.
fn release(transport: &mut dyn Transport) {
    if transport.is_open() {
        if let Err(err) = transport.flush_input() {
            debug!(error = %err, "flush input failed");
        }
        if let Err(err) = transport.flush_output() {
            debug!(error = %err, "flush output failed");
        }
    }
    if let Err(err) = transport.close() {
        debug!(error = %err, "close failed");
    }
}

/// Reader loop body. Runs until `running` is cleared or the link turns fatal.
pub(crate) fn run(shared: Arc<Shared>, running: Arc<AtomicBool>) {
    debug!("background reader started");
    while running.load(Ordering::Acquire) {
        if !shared.poll_once() {
            debug!("background reader exiting on fatal link state");
            break;
        }
        std::thread::sleep(shared.config.poll_interval);
    }
    debug!("background reader stopped");
}
