//! Background line-oriented serial link for embedded controllers.
//!
//! bgserial keeps a serial (or serial-over-TCP) connection drained on a
//! background thread, hands out complete lines and embedded diagnostic
//! messages through non-blocking queues, and recovers from transient port
//! loss by reopening the port.
//!
//! # Crate Structure
//!
//! - [`transport`] - Transport trait and implementations (serial, TCP, memory)
//! - [`frame`] - Newline framing and diagnostic-message extraction
//! - [`link`] - The background reader, write gate and fatal-error contract

/// Re-export transport types.
pub mod transport {
    pub use bgserial_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use bgserial_frame::*;
}

/// Re-export link types.
pub mod link {
    pub use bgserial_link::*;
}

pub use bgserial_link::{BackgroundSerial, LinkConfig, LinkError, LinkState};
