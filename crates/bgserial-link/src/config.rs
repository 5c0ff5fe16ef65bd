use std::time::Duration;

use bgserial_transport::Timeouts;

/// Default sleep between polls. At 57600 baud at most ~576 bytes arrive
/// while the reader sleeps.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Default recovery probe: an empty line, which the controller ignores.
pub const DEFAULT_PROBE: &[u8] = b"\n";

/// Default name of the background reader thread.
pub const DEFAULT_THREAD_NAME: &str = "bgserial-reader";

/// Background link configuration.
#[derive(Debug, Clone)]
pub struct LinkConfig {
    /// Timeouts applied to the transport by `start()`.
    pub timeouts: Timeouts,
    /// Sleep after every reader iteration.
    pub poll_interval: Duration,
    /// Bytes written to test a reopened transport.
    pub probe: Vec<u8>,
    /// Name of the reader thread.
    pub thread_name: String,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            timeouts: Timeouts::default(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            probe: DEFAULT_PROBE.to_vec(),
            thread_name: DEFAULT_THREAD_NAME.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_controller_expectations() {
        let config = LinkConfig::default();
        assert_eq!(config.timeouts.write, Duration::from_secs(2));
        assert_eq!(config.timeouts.inter_byte, Some(Duration::from_millis(10)));
        assert_eq!(config.poll_interval, Duration::from_millis(10));
        assert_eq!(config.probe, b"\n");
    }
}
