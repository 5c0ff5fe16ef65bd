//! Link health shared between the reader thread and writers.
//!
//! ```text
//!   Normal ──read/write failure──► Error ──probe ok──► Normal
//!                                    │
//!                       reopen/probe failure
//!                                    ▼
//!                                  Fatal (terminal)
//! ```

use std::sync::atomic::{AtomicU8, Ordering};

/// Health of the transport as seen by the link.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    /// Reads and writes go to the transport.
    Normal,
    /// A transient failure was seen; writes are refused and the reader
    /// attempts recovery on every iteration.
    Error,
    /// Recovery failed. Nothing leaves this state.
    Fatal,
}

impl LinkState {
    /// Convert state to u8 value for atomic storage.
    pub fn to_u8(self) -> u8 {
        match self {
            LinkState::Normal => 0,
            LinkState::Error => 1,
            LinkState::Fatal => 2,
        }
    }

    /// Convert a stored value back to a state.
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(LinkState::Normal),
            1 => Some(LinkState::Error),
            2 => Some(LinkState::Fatal),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            LinkState::Normal => "normal",
            LinkState::Error => "error",
            LinkState::Fatal => "fatal",
        }
    }
}

impl std::fmt::Display for LinkState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lock-free [`LinkState`] cell.
///
/// The reader thread and any number of writers transition it concurrently.
/// Every transition out of `Normal` or `Error` is a compare-exchange, so a
/// stale writer can never pull the link back out of `Fatal`.
#[derive(Debug)]
pub struct AtomicLinkState(AtomicU8);

impl AtomicLinkState {
    pub fn new(state: LinkState) -> Self {
        Self(AtomicU8::new(state.to_u8()))
    }

    pub fn load(&self) -> LinkState {
        LinkState::from_u8(self.0.load(Ordering::Acquire)).unwrap_or(LinkState::Fatal)
    }

    /// `Normal → Error`. Returns true if this call made the transition.
    pub fn mark_error(&self) -> bool {
        self.transition(LinkState::Normal, LinkState::Error)
    }

    /// `Error → Normal`. Returns true if this call made the transition.
    pub fn recover(&self) -> bool {
        self.transition(LinkState::Error, LinkState::Normal)
    }

    /// Enter `Fatal` from any state.
    pub fn mark_fatal(&self) {
        self.0.store(LinkState::Fatal.to_u8(), Ordering::Release);
    }

    fn transition(&self, from: LinkState, to: LinkState) -> bool {
        self.0
            .compare_exchange(from.to_u8(), to.to_u8(), Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }
}

impl Default for AtomicLinkState {
    fn default() -> Self {
        Self::new(LinkState::Normal)
    }
}
