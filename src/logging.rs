// ABOUTME: Diagnostic PDU logging for the inbound queue
// ABOUTME: Hex dumps at trace level and decoded views at debug level; never affects delivery

use crate::datatypes::MoPdu;
use std::fmt::Write;
use tracing::{Level, debug, enabled, trace};

const BYTES_PER_LINE: usize = 16;

/// Emit `bytes` as a hex dump under `label` when trace logging is enabled
pub fn hex_dump(label: &str, bytes: &[u8]) {
    if !enabled!(Level::TRACE) {
        return;
    }
    trace!("{label}\n{}", format_hex(bytes));
}

/// Emit the decoded fields of `pdu`
pub fn log_decoded(pdu: &MoPdu) {
    debug!(label = pdu.label(), "{pdu:#?}");
}

fn format_hex(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 3 + bytes.len() / BYTES_PER_LINE * 8);
    for (line, chunk) in bytes.chunks(BYTES_PER_LINE).enumerate() {
        if line > 0 {
            out.push('\n');
        }
        let _ = write!(out, "{:04x}:", line * BYTES_PER_LINE);
        for byte in chunk {
            let _ = write!(out, " {byte:02x}");
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_is_grouped_by_sixteen_bytes() {
        let bytes: Vec<u8> = (0u8..18).collect();
        let dump = format_hex(&bytes);
        let lines: Vec<&str> = dump.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("0000: 00 01 02"));
        assert_eq!(lines[1], "0010: 10 11");
    }

    #[test]
    fn empty_input_produces_empty_dump() {
        assert_eq!(format_hex(&[]), "");
    }
}
