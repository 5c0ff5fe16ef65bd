//! Non-blocking line-oriented link over an unreliable serial transport.
//!
//! A dedicated background thread polls the transport, frames complete lines,
//! and separates embedded diagnostic messages into their own queue. Callers
//! read both queues without blocking and write straight to the transport
//! through a gate that refuses writes while the link is recovering.
//!
//! Transient I/O failures trigger close/reopen/probe recovery. When recovery
//! fails the link turns fatal and every later call returns
//! [`LinkError::Fatal`]; the caller decides whether that ends the process.

pub mod config;
pub mod error;
pub mod link;
pub mod queue;
pub mod state;
mod worker;

pub use config::{LinkConfig, DEFAULT_POLL_INTERVAL, DEFAULT_PROBE};
pub use error::{LinkError, Result};
pub use link::BackgroundSerial;
pub use queue::OutputQueue;
pub use state::{AtomicLinkState, LinkState};

pub use bgserial_frame::{Extraction, MarkerExtractor, MessageExtractor};
pub use bgserial_transport::{Timeouts, Transport};
