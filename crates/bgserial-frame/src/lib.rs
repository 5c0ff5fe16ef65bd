//! Newline framing with embedded diagnostic-message extraction.
//!
//! Controllers interleave two kinds of text on one serial stream:
//! - Protocol lines terminated by `\n`
//! - Diagnostic records starting with a two-byte marker (`D:` by default),
//!   which may be printed in the middle of a protocol line
//!
//! [`LineFramer`] accumulates raw bytes, strips diagnostic records with a
//! pluggable [`MessageExtractor`], and emits complete, ASCII-clean lines.

pub mod extract;
pub mod line;
pub mod sanitize;

pub use extract::{Extraction, MarkerExtractor, MessageExtractor, DEFAULT_MARKER};
pub use line::{FramedOutput, LineFramer, LINE_TERMINATOR, MARKER_LEN};
pub use sanitize::{sanitize_line, DEGREE, DEGREE_ENTITY};
