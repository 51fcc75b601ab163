//! Response markers emitted by the radio.
//!
//! Markers are matched as substrings anywhere in the accumulated response,
//! never anchored to line boundaries.

/// Banner printed once the firmware has (re)booted.
pub const READY: &[u8] = b"ready";
pub const OK: &[u8] = b"OK";
/// `OK` followed by the data prompt, sent after `AT+CIPSEND`.
pub const OK_PROMPT: &[u8] = b"OK\r\n>";
pub const SEND_OK: &[u8] = b"SEND OK";
pub const ERROR: &[u8] = b"ERROR";
pub const FAIL: &[u8] = b"FAIL";
/// Prefix of the status line, followed by one ASCII digit.
pub const STATUS: &[u8] = b"STATUS:";
pub const ALREADY_CONNECTED: &[u8] = b"ALREADY CONNECTED";
/// Opening frame of the HTTP payload.
pub const HTML_START: &[u8] = b"<html>";
/// Closing frame of the HTTP payload.
pub const HTML_END: &[u8] = b"</html>";

/// Length of a colon separated hardware address, e.g. `1a:fe:34:a0:5b:11`.
pub const ADDRESS_LEN: usize = 17;

/// Offset of the first occurrence of `needle` in `haystack`.
///
/// An empty needle matches at offset 0.
pub fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() {
        return Some(0);
    }
    if needle.len() > haystack.len() {
        return None;
    }
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

/// Parse the digit following the first `STATUS:` in `buf`.
///
/// Returns `None` when the prefix is missing or not followed by a digit.
pub fn parse_status(buf: &[u8]) -> Option<u8> {
    let at = find(buf, STATUS)? + STATUS.len();
    match buf.get(at) {
        Some(c) if c.is_ascii_digit() => Some(c - b'0'),
        _ => None,
    }
}

/// Whether a `STATUS:` digit means the radio holds an IP on the network.
///
/// 2 = got IP, 3 = connected, 4 = disconnected from the last TCP peer but
/// still associated.
pub const fn is_joined_status(status: u8) -> bool {
    matches!(status, 2..=4)
}
