//! Hex and text rendering of captured buffers.

use log::{Level, log_enabled, trace};

/// Printable ASCII is shown verbatim, everything else as `.`.
pub fn printable(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|&b| if (0x20..=0x7E).contains(&b) { b as char } else { '.' })
        .collect()
}

/// Space separated upper-case hex.
pub fn hex(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| format!("{:02X}", b))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Two-line dump: one line of hex, one of text.
pub fn dump(label: &str, bytes: &[u8]) -> String {
    format!("{} HEX: {}\n{} TEXT: {}", label, hex(bytes), label, printable(bytes))
}

/// Offset/hex/text lines, `width` bytes per line.
pub fn dump_lines(bytes: &[u8], width: usize) -> Vec<String> {
    let width = width.max(1);
    bytes
        .chunks(width)
        .enumerate()
        .map(|(i, chunk)| {
            format!(
                "{:04x}  {:<hex_width$}  {}",
                i * width,
                hex(chunk),
                printable(chunk),
                hex_width = width * 3 - 1
            )
        })
        .collect()
}

/// Emit a dump at trace level. Nothing is formatted when trace is off.
pub fn log_buffer(label: &str, bytes: &[u8]) {
    if log_enabled!(Level::Trace) {
        trace!("{}", dump(label, bytes));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_printable() {
        assert_eq!(printable(b"USB\x00\x7f~ "), "USB..~ ");
    }

    #[test]
    fn test_dump() {
        assert_eq!(
            dump("Setup Packet", &[0x80, 0x06, 0x41]),
            "Setup Packet HEX: 80 06 41\nSetup Packet TEXT: ..A"
        );
    }

    #[test]
    fn test_dump_lines() {
        let lines = dump_lines(b"ABCDE", 4);
        assert_eq!(lines, vec!["0000  41 42 43 44  ABCD", "0004  45           E"]);
    }
}
