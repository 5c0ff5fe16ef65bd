use bytes::{Buf, BytesMut};
use tracing::trace;

use crate::extract::{MarkerExtractor, MessageExtractor};
use crate::sanitize::sanitize_line;

/// Line terminator.
pub const LINE_TERMINATOR: u8 = b'\n';

/// Length of the marker prefix stripped from each extracted message.
pub const MARKER_LEN: usize = 2;

const INITIAL_BUFFER_CAPACITY: usize = 1024;

/// Lines and messages produced by one [`LineFramer::push`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FramedOutput {
    /// Complete lines in arrival order, terminator removed.
    pub lines: Vec<String>,
    /// Diagnostic messages in arrival order, marker removed.
    pub messages: Vec<String>,
}

impl FramedOutput {
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty() && self.messages.is_empty()
    }
}

/// Turns an append-only byte stream into complete lines.
///
/// Handles partial reads internally: at most one incomplete line is held
/// between pushes. Embedded diagnostic records are removed before line
/// boundaries are computed, so a record printed in the middle of a line does
/// not split it.
pub struct LineFramer {
    buf: BytesMut,
    extractor: Box<dyn MessageExtractor>,
}

impl LineFramer {
    /// Create a framer that extracts `D:` records.
    pub fn new() -> Self {
        Self::with_extractor(MarkerExtractor::default())
    }

    /// Create a framer with a custom diagnostic extractor.
    pub fn with_extractor(extractor: impl MessageExtractor + 'static) -> Self {
        Self::with_boxed_extractor(Box::new(extractor))
    }

    /// Create a framer from an already boxed extractor.
    pub fn with_boxed_extractor(extractor: Box<dyn MessageExtractor>) -> Self {
        Self {
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            extractor,
        }
    }

    /// Append `chunk` and return everything that became complete.
    pub fn push(&mut self, chunk: &[u8]) -> FramedOutput {
        let mut out = FramedOutput::default();
        self.buf.extend_from_slice(chunk);

        while let Some(terminator) = self.find_terminator() {
            let extraction = self.extractor.extract(&self.buf);
            if !extraction.messages.is_empty() {
                for message in &extraction.messages {
                    let body = message.get(MARKER_LEN..).unwrap_or_default();
                    out.messages.push(sanitize_line(body));
                }
                trace!(
                    count = extraction.messages.len(),
                    "extracted diagnostic messages"
                );
                self.buf = extraction.remaining;
                continue;
            }

            let line = self.buf.split_to(terminator);
            self.buf.advance(1);
            out.lines.push(sanitize_line(&line));
        }

        out
    }

    /// Bytes of the incomplete line waiting for its terminator.
    pub fn pending(&self) -> &[u8] {
        &self.buf
    }

    /// Discard any buffered partial line.
    pub fn reset(&mut self) {
        self.buf.clear();
    }

    fn find_terminator(&self) -> Option<usize> {
        self.buf.iter().position(|&b| b == LINE_TERMINATOR)
    }
}

impl Default for LineFramer {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for LineFramer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LineFramer")
            .field("pending", &self.buf.len())
            .finish()
    }
}
