/// Errors that can occur in transport operations.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Failed to open the port.
    #[error("failed to open {port}: {source}")]
    Open {
        port: String,
        source: std::io::Error,
    },

    /// An I/O error occurred on the open port.
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The serial driver reported an error.
    #[cfg(feature = "serial")]
    #[error("serial port error: {0}")]
    Serial(#[from] serialport::Error),

    /// The operation needs an open port but the transport is closed.
    #[error("transport is not open")]
    NotOpen,

    /// The port string could not be interpreted.
    #[error("invalid port specification: {0}")]
    InvalidPort(String),
}

impl TransportError {
    /// Wrap an I/O failure that happened while opening `port`.
    pub fn open(port: impl Into<String>, source: std::io::Error) -> Self {
        Self::Open {
            port: port.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, TransportError>;
