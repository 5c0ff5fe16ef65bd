//! ASCII clean-up for received text.

/// Extended-ASCII degree sign as sent by the controller firmware.
pub const DEGREE: u8 = 0xB0;

/// Replacement text for [`DEGREE`].
pub const DEGREE_ENTITY: &str = "&deg";

/// Convert raw line bytes to a pure ASCII string.
///
/// The degree byte becomes `&deg`; any other byte outside 7-bit ASCII is
/// dropped. Never fails.
pub fn sanitize_line(raw: &[u8]) -> String {
    let mut out = String::with_capacity(raw.len());
    for &byte in raw {
        if byte == DEGREE {
            out.push_str(DEGREE_ENTITY);
        } else if byte.is_ascii() {
            out.push(char::from(byte));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn degree_byte_is_replaced() {
        assert_eq!(sanitize_line(b"T:21.5\xB0C"), "T:21.5&degC");
    }

    #[test]
    fn other_high_bytes_are_dropped() {
        assert_eq!(sanitize_line(b"a\x80b\xFFc"), "abc");
    }

    #[test]
    fn utf8_degree_sign_keeps_entity() {
        // U+00B0 in UTF-8 is C2 B0: the lead byte is dropped, the tail matches.
        assert_eq!(sanitize_line("20°C".as_bytes()), "20&degC");
    }

    #[test]
    fn plain_ascii_is_unchanged() {
        assert_eq!(sanitize_line(b"V:{\"beerTemp\":20}\r"), "V:{\"beerTemp\":20}\r");
    }
}
