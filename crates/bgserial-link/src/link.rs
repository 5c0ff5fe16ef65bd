use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

use bgserial_frame::{LineFramer, MessageExtractor, LINE_TERMINATOR};
use bgserial_transport::{open_transport, Transport};
use tracing::{debug, error, warn};

use crate::config::LinkConfig;
use crate::error::{LinkError, Result};
use crate::queue::lock;
use crate::state::LinkState;
use crate::worker::{self, Shared};

/// Non-blocking line reader and gated writer over one transport.
///
/// The handle is `Sync`: share it behind an `Arc` and call any method from
/// any thread. Reads never block; writes block only as long as the
/// transport's write timeout.
pub struct BackgroundSerial {
    shared: Arc<Shared>,
    worker: Mutex<Option<Worker>>,
}

struct Worker {
    running: Arc<AtomicBool>,
    handle: JoinHandle<()>,
}

impl BackgroundSerial {
    /// Wrap an already open transport with default configuration.
    pub fn new(transport: impl Transport + 'static) -> Self {
        Self::with_config(transport, LinkConfig::default())
    }

    /// Wrap an already open transport with explicit configuration.
    pub fn with_config(transport: impl Transport + 'static, config: LinkConfig) -> Self {
        Self::from_boxed(Box::new(transport), config)
    }

    /// Wrap a boxed transport.
    pub fn from_boxed(transport: Box<dyn Transport>, config: LinkConfig) -> Self {
        Self {
            shared: Arc::new(Shared::new(transport, config)),
            worker: Mutex::new(None),
        }
    }

    /// Open `port` (a serial device or `socket://host:port`) and wrap it.
    pub fn open(port: &str, baud: u32, config: LinkConfig) -> Result<Self> {
        let transport = open_transport(port, baud)?;
        Ok(Self::from_boxed(transport, config))
    }

    /// Replace the diagnostic-message extractor.
    ///
    /// Call before `start()`; any buffered partial line is discarded.
    pub fn with_extractor(self, extractor: impl MessageExtractor + 'static) -> Self {
        *lock(&self.shared.framer) = LineFramer::with_extractor(extractor);
        self
    }

    /// Apply transport timeouts and launch the background reader.
    ///
    /// A no-op while a reader is already attached. A failure to apply the
    /// timeouts is treated as a transient transport error: the reader starts
    /// in recovery.
    pub fn start(&self) -> Result<()> {
        self.check_fatal()?;

        let mut worker = lock(&self.worker);
        if worker.is_some() {
            return Ok(());
        }

        if let Some(transport) = lock(&self.shared.transport).as_mut() {
            if let Err(err) = transport.set_timeouts(self.shared.config.timeouts) {
                warn!(error = %err, "failed to apply serial timeouts");
                self.shared.state.mark_error();
            }
        }

        let running = Arc::new(AtomicBool::new(true));
        let handle = {
            let shared = Arc::clone(&self.shared);
            let running = Arc::clone(&running);
            std::thread::Builder::new()
                .name(self.shared.config.thread_name.clone())
                .spawn(move || worker::run(shared, running))
                .map_err(LinkError::Spawn)?
        };

        debug!("background reader launched");
        *worker = Some(Worker { running, handle });
        Ok(())
    }

    /// Ask the background reader to exit.
    ///
    /// Returns immediately. An iteration already in progress completes; no
    /// further reads happen after it. A later `start()` launches a fresh
    /// reader that continues from the same buffered partial line.
    pub fn stop(&self) {
        if let Some(worker) = lock(&self.worker).take() {
            worker.running.store(false, Ordering::Release);
            debug!("background reader stop requested");
        }
    }

    /// Whether a background reader is attached and still looping.
    pub fn is_running(&self) -> bool {
        lock(&self.worker)
            .as_ref()
            .is_some_and(|worker| !worker.handle.is_finished())
    }

    /// Next complete line, or `None` if none is queued.
    pub fn try_read_line(&self) -> Result<Option<String>> {
        self.check_fatal()?;
        Ok(self.shared.lines.try_pop())
    }

    /// Next diagnostic message, or `None` if none is queued.
    pub fn try_read_message(&self) -> Result<Option<String>> {
        self.check_fatal()?;
        Ok(self.shared.messages.try_pop())
    }

    /// Write `data` straight to the transport.
    ///
    /// Returns the number of bytes the transport accepted. While the link is
    /// recovering nothing is written and `Ok(0)` is returned; writes are not
    /// queued or retried. A failed or short write puts the link into
    /// recovery.
    pub fn write(&self, data: impl AsRef<[u8]>) -> Result<usize> {
        self.check_fatal()?;
        let data = data.as_ref();

        if self.shared.state.load() != LinkState::Normal {
            return Ok(0);
        }

        let result = match lock(&self.shared.transport).as_mut() {
            Some(transport) => transport.write(data),
            None => return Ok(0),
        };

        match result {
            Ok(written) if written < data.len() => {
                warn!(written, requested = data.len(), "short serial write");
                self.shared.state.mark_error();
                Ok(written)
            }
            Ok(written) => Ok(written),
            Err(err) => {
                warn!(error = %err, "serial write failed");
                self.shared.state.mark_error();
                Ok(0)
            }
        }
    }

    /// Write `line` followed by the line terminator.
    pub fn writeln(&self, line: &str) -> Result<usize> {
        let mut data = Vec::with_capacity(line.len() + 1);
        data.extend_from_slice(line.as_bytes());
        data.push(LINE_TERMINATOR);
        self.write(data)
    }

    /// Current link health.
    pub fn state(&self) -> LinkState {
        self.shared.state.load()
    }

    /// Reason the link was lost, if it was.
    pub fn fatal_error(&self) -> Option<String> {
        lock(&self.shared.fatal).clone()
    }

    /// Lines waiting to be read.
    pub fn pending_lines(&self) -> usize {
        self.shared.lines.len()
    }

    /// Messages waiting to be read.
    pub fn pending_messages(&self) -> usize {
        self.shared.messages.len()
    }

    /// Active configuration.
    pub fn config(&self) -> &LinkConfig {
        &self.shared.config
    }

    /// If the link is lost, tear it down and return the fatal error.
    ///
    /// The first call after the loss stops the reader, closes the transport
    /// and drops the handle so the OS releases the port.
    fn check_fatal(&self) -> Result<()> {
        let Some(reason) = self.fatal_error() else {
            return Ok(());
        };

        self.stop();
        if let Some(mut transport) = lock(&self.shared.transport).take() {
            error!(%reason, port = transport.name(), "terminating serial link");
            if let Err(err) = transport.close() {
                debug!(error = %err, "close failed during teardown");
            }
        }

        Err(LinkError::Fatal { reason })
    }

    #[cfg(test)]
    pub(crate) fn poll_once(&self) -> bool {
        self.shared.poll_once()
    }
}

impl Drop for BackgroundSerial {
    fn drop(&mut self) {
        self.stop();
    }
}

impl std::fmt::Debug for BackgroundSerial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackgroundSerial")
            .field("state", &self.state())
            .field("running", &self.is_running())
            .field("pending_lines", &self.pending_lines())
            .field("pending_messages", &self.pending_messages())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use bgserial_frame::Extraction;
    use bgserial_transport::MemoryTransport;

    use super::*;

    fn link() -> (MemoryTransport, BackgroundSerial) {
        let script = MemoryTransport::new("mem");
        let link = BackgroundSerial::new(script.clone());
        (script, link)
    }

    #[test]
    fn lines_split_across_reads() {
        let (script, link) = link();

        script.push_inbound(b"hel");
        link.poll_once();
        script.push_inbound(b"lo\nworld");
        link.poll_once();

        assert_eq!(link.try_read_line().unwrap().as_deref(), Some("hello"));
        assert_eq!(link.try_read_line().unwrap(), None);
        assert_eq!(lock(&link.shared.framer).pending(), b"world");
    }

    #[test]
    fn empty_queues_never_block() {
        let (_script, link) = link();
        for _ in 0..5 {
            assert_eq!(link.try_read_line().unwrap(), None);
            assert_eq!(link.try_read_message().unwrap(), None);
        }
    }

    #[test]
    fn writeln_appends_terminator() {
        let (script, link) = link();
        assert_eq!(link.writeln("v").unwrap(), 2);
        assert_eq!(script.take_written(), b"v\n");
    }

    #[test]
    fn short_write_gates_later_writes_until_recovery() {
        let (script, link) = link();

        script.short_next_writes(1);
        assert_eq!(link.write(b"abcd").unwrap(), 2);
        assert_eq!(link.state(), LinkState::Error);

        assert_eq!(link.write(b"x").unwrap(), 0);
        assert_eq!(link.writeln("y").unwrap(), 0);
        assert_eq!(script.take_written(), b"ab");

        assert!(link.poll_once());
        assert_eq!(link.state(), LinkState::Normal);
        assert_eq!(script.take_written(), b"\n");

        assert_eq!(link.write(b"z").unwrap(), 1);
    }

    #[test]
    fn write_error_reports_zero_and_enters_recovery() {
        let (script, link) = link();

        script.fail_next_writes(1);
        assert_eq!(link.write(b"v\n").unwrap(), 0);
        assert_eq!(link.state(), LinkState::Error);
    }

    #[test]
    fn fatal_error_tears_down_on_next_call() {
        let (script, link) = link();

        script.fail_next_reads(1);
        script.fail_next_opens(usize::MAX);
        assert!(!link.poll_once());
        assert_eq!(link.state(), LinkState::Fatal);

        let err = link.write(b"v").unwrap_err();
        assert!(err.is_fatal());
        assert!(err.to_string().contains("lost serial connection"));
        assert!(lock(&link.shared.transport).is_none());

        assert!(matches!(
            link.try_read_line(),
            Err(LinkError::Fatal { .. })
        ));
        assert!(matches!(
            link.try_read_message(),
            Err(LinkError::Fatal { .. })
        ));
        assert!(matches!(link.start(), Err(LinkError::Fatal { .. })));
    }

    #[test]
    fn start_applies_timeouts_and_is_idempotent() {
        let (script, link) = link();

        link.start().unwrap();
        link.start().unwrap();
        assert!(link.is_running());
        assert_eq!(script.timeouts(), Some(link.config().timeouts));

        link.stop();
        assert!(!link.is_running());
    }

    #[test]
    fn custom_extractor_is_used() {
        let script = MemoryTransport::new("mem");
        let link = BackgroundSerial::new(script.clone()).with_extractor(|buffer: &[u8]| {
            Extraction::unchanged(buffer)
        });

        script.push_inbound(b"D:kept as line\n");
        link.poll_once();

        assert_eq!(
            link.try_read_line().unwrap().as_deref(),
            Some("D:kept as line")
        );
        assert_eq!(link.try_read_message().unwrap(), None);
    }
}
