use bytes::{Bytes, BytesMut};

/// Default diagnostic record marker.
pub const DEFAULT_MARKER: &[u8] = b"D:";

/// Result of one extraction pass over the raw buffer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Extraction {
    /// The buffer with every extracted record removed.
    pub remaining: BytesMut,
    /// Extracted records in buffer order, marker included.
    pub messages: Vec<Bytes>,
}

impl Extraction {
    /// An extraction that found nothing and leaves `buffer` untouched.
    pub fn unchanged(buffer: &[u8]) -> Self {
        Self {
            remaining: BytesMut::from(buffer),
            messages: Vec::new(),
        }
    }
}

/// Finds and strips embedded diagnostic records from raw buffered text.
///
/// Implementations are pure: the same input always yields the same output.
/// Returned messages keep their two-byte marker; the framer strips it.
pub trait MessageExtractor: Send {
    fn extract(&self, buffer: &[u8]) -> Extraction;
}

impl<F> MessageExtractor for F
where
    F: Fn(&[u8]) -> Extraction + Send,
{
    fn extract(&self, buffer: &[u8]) -> Extraction {
        self(buffer)
    }
}

/// Extracts records that start with a marker and run to the next `\n`.
///
/// A record may start anywhere, including the middle of a protocol line.
/// Records whose terminator has not arrived yet stay in the buffer. A `\r`
/// right before the terminator is removed with it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkerExtractor {
    marker: Vec<u8>,
}

impl MarkerExtractor {
    /// Create an extractor for `marker`. An empty marker matches nothing.
    pub fn new(marker: impl Into<Vec<u8>>) -> Self {
        Self {
            marker: marker.into(),
        }
    }

    /// The marker this extractor looks for.
    pub fn marker(&self) -> &[u8] {
        &self.marker
    }

    fn find_marker(&self, haystack: &[u8]) -> Option<usize> {
        if self.marker.is_empty() {
            return None;
        }
        haystack
            .windows(self.marker.len())
            .position(|window| window == self.marker.as_slice())
    }
}

impl Default for MarkerExtractor {
    fn default() -> Self {
        Self::new(DEFAULT_MARKER)
    }
}

impl MessageExtractor for MarkerExtractor {
    fn extract(&self, buffer: &[u8]) -> Extraction {
        let mut remaining = BytesMut::with_capacity(buffer.len());
        let mut messages = Vec::new();
        let mut pos = 0;

        while let Some(start) = self.find_marker(&buffer[pos..]).map(|i| pos + i) {
            let Some(end) = buffer[start..]
                .iter()
                .position(|&b| b == b'\n')
                .map(|i| start + i)
            else {
                break;
            };

            remaining.extend_from_slice(&buffer[pos..start]);
            let record = &buffer[start..end];
            let record = record.strip_suffix(b"\r").unwrap_or(record);
            messages.push(Bytes::copy_from_slice(record));
            pos = end + 1;
        }

        remaining.extend_from_slice(&buffer[pos..]);
        Extraction {
            remaining,
            messages,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extract(buffer: &[u8]) -> Extraction {
        MarkerExtractor::default().extract(buffer)
    }

    #[test]
    fn record_at_line_start() {
        let out = extract(b"D:low battery\nV:{}\n");
        assert_eq!(out.messages, vec![Bytes::from_static(b"D:low battery")]);
        assert_eq!(out.remaining.as_ref(), b"V:{}\n");
    }

    #[test]
    fn record_inside_protocol_line() {
        let out = extract(b"V:{\"a\":1,D:{\"logId\":3}\r\n\"b\":2}\n");
        assert_eq!(out.messages, vec![Bytes::from_static(b"D:{\"logId\":3}")]);
        assert_eq!(out.remaining.as_ref(), b"V:{\"a\":1,\"b\":2}\n");
    }

    #[test]
    fn unterminated_record_stays_buffered() {
        let out = extract(b"V:1\nD:partial");
        assert!(out.messages.is_empty());
        assert_eq!(out.remaining.as_ref(), b"V:1\nD:partial");
    }

    #[test]
    fn multiple_records_in_order() {
        let out = extract(b"D:one\nx\nD:two\nD:three");
        assert_eq!(
            out.messages,
            vec![Bytes::from_static(b"D:one"), Bytes::from_static(b"D:two")]
        );
        assert_eq!(out.remaining.as_ref(), b"x\nD:three");
    }

    #[test]
    fn removal_can_reveal_a_new_record() {
        let first = extract(b"DD:x\n:y\n");
        assert_eq!(first.messages, vec![Bytes::from_static(b"D:x")]);
        assert_eq!(first.remaining.as_ref(), b"D:y\n");

        let second = extract(&first.remaining);
        assert_eq!(second.messages, vec![Bytes::from_static(b"D:y")]);
        assert!(second.remaining.is_empty());
    }

    #[test]
    fn custom_and_empty_markers() {
        let out = MarkerExtractor::new("L:").extract(b"D:kept\nL:log\n");
        assert_eq!(out.messages, vec![Bytes::from_static(b"L:log")]);
        assert_eq!(out.remaining.as_ref(), b"D:kept\n");

        let out = MarkerExtractor::new(Vec::new()).extract(b"anything\n");
        assert!(out.messages.is_empty());
        assert_eq!(out.remaining.as_ref(), b"anything\n");
    }

    #[test]
    fn closures_are_extractors() {
        let never = |buffer: &[u8]| Extraction::unchanged(buffer);
        let out = never.extract(b"D:x\n");
        assert!(out.messages.is_empty());
        assert_eq!(out.remaining.as_ref(), b"D:x\n");
    }
}
