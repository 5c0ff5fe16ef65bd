use bgserial_transport::TransportError;

/// Errors surfaced by [`BackgroundSerial`](crate::BackgroundSerial).
///
/// Transient transport failures never appear here; they are absorbed by the
/// background reader and the write gate. Only a lost link, setup failures,
/// and thread spawn failures reach callers.
#[derive(Debug, thiserror::Error)]
pub enum LinkError {
    /// The link was lost and could not be recovered. Terminal.
    #[error("fatal serial error: {reason}")]
    Fatal { reason: String },

    /// Opening the transport failed.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// The background reader thread could not be started.
    #[error("failed to spawn background reader: {0}")]
    Spawn(std::io::Error),
}

impl LinkError {
    /// Whether this error ends the link for good.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Fatal { .. })
    }
}

pub type Result<T> = std::result::Result<T, LinkError>;
