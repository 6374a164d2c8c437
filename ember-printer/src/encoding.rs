//! Windows-1252 encoding utilities for Western-European thermal printers
//!
//! Receipt printers shipped for the European market default to single-byte
//! code pages; WPC1252 covers accented Latin text plus the euro sign.
//! This module provides utilities for:
//! - Measuring printable column widths
//! - Truncating/padding strings to a column width
//! - Converting UTF-8 to Windows-1252 while preserving ESC/POS commands

use tracing::instrument;

/// ESC t 16 - select the WPC1252 character code table
const SELECT_CP1252: [u8; 3] = [0x1B, 0x74, 16];

/// Printable column width of a string
///
/// Windows-1252 is a single-byte encoding, so every mappable character
/// occupies exactly one column on the tape.
pub fn text_width(s: &str) -> usize {
    s.chars().count()
}

/// Truncate a string to fit within a column width
pub fn truncate_text(s: &str, max_width: usize) -> String {
    s.chars().take(max_width).collect()
}

/// Pad a string to a specific column width
///
/// If the string is longer than the width, it will be truncated.
pub fn pad_text(s: &str, width: usize, align_right: bool) -> String {
    let current_width = text_width(s);
    if current_width >= width {
        return truncate_text(s, width);
    }
    let spaces = width - current_width;
    if align_right {
        format!("{}{}", " ".repeat(spaces), s)
    } else {
        format!("{}{}", s, " ".repeat(spaces))
    }
}

/// Encode a string as Windows-1252 bytes
///
/// Characters outside the code page are replaced with `?` rather than
/// encoding_rs's numeric-reference fallback, which would print as
/// literal `&#...;` garbage on the tape.
pub fn encode_cp1252(s: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(s.len());
    for c in s.chars() {
        let mut buf = [0u8; 4];
        let encoded = c.encode_utf8(&mut buf);
        let (bytes, _, had_errors) = encoding_rs::WINDOWS_1252.encode(encoded);
        if had_errors {
            out.push(b'?');
        } else {
            out.extend_from_slice(&bytes);
        }
    }
    out
}

/// Convert mixed UTF-8 content (with ESC/POS commands) to Windows-1252
///
/// ASCII bytes (0x00-0x7F) pass through exactly as is, which protects
/// ESC/POS commands from being corrupted. Only bytes >= 0x80 are treated
/// as UTF-8 sequences and re-encoded.
///
/// Also handles re-selecting the code page after an INIT command (ESC @),
/// which resets the printer to its power-on code table.
#[instrument(skip(bytes))]
pub fn encode_payload(bytes: &[u8]) -> Vec<u8> {
    let mut result = Vec::with_capacity(bytes.len() + 8);

    // Select WPC1252 at the start
    result.extend_from_slice(&SELECT_CP1252);

    let mut buffer = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        let b = bytes[i];

        // INIT command (ESC @ = 0x1B 0x40) resets the code table
        if b == 0x1B && i + 1 < bytes.len() && bytes[i + 1] == 0x40 {
            flush_buffer(&mut buffer, &mut result);

            result.push(0x1B);
            result.push(0x40);
            result.extend_from_slice(&SELECT_CP1252);

            i += 2;
            continue;
        }

        if b < 128 {
            // ASCII byte (command or ASCII text)
            flush_buffer(&mut buffer, &mut result);
            result.push(b);
        } else {
            // Non-ASCII byte (part of a UTF-8 sequence)
            buffer.push(b);
        }
        i += 1;
    }

    flush_buffer(&mut buffer, &mut result);

    result
}

/// Flush the non-ASCII buffer, converting UTF-8 to Windows-1252
fn flush_buffer(buffer: &mut Vec<u8>, result: &mut Vec<u8>) {
    if buffer.is_empty() {
        return;
    }

    let s = String::from_utf8_lossy(buffer);
    result.extend_from_slice(&encode_cp1252(&s));
    buffer.clear();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_width() {
        assert_eq!(text_width("hello"), 5);
        assert_eq!(text_width("café"), 4);
    }

    #[test]
    fn test_truncate_text() {
        assert_eq!(truncate_text("hello world", 5), "hello");
        assert_eq!(truncate_text("café con leche", 4), "café");
    }

    #[test]
    fn test_pad_text() {
        assert_eq!(pad_text("hi", 5, false), "hi   ");
        assert_eq!(pad_text("hi", 5, true), "   hi");
        assert_eq!(pad_text("hello world", 5, false), "hello");
    }

    #[test]
    fn test_encode_cp1252_euro() {
        // Euro maps to 0x80 in Windows-1252
        assert_eq!(encode_cp1252("€"), vec![0x80]);
        assert_eq!(encode_cp1252("é"), vec![0xE9]);
    }

    #[test]
    fn test_encode_cp1252_unmappable() {
        assert_eq!(encode_cp1252("中"), vec![b'?']);
    }

    #[test]
    fn test_encode_payload_preserves_commands() {
        // ESC E 1 (bold on) followed by accented text
        let mut raw = vec![0x1B, 0x45, 0x01];
        raw.extend_from_slice("café".as_bytes());

        let encoded = encode_payload(&raw);

        // Code page select, then the untouched command bytes
        assert_eq!(&encoded[..3], &SELECT_CP1252);
        assert_eq!(&encoded[3..6], &[0x1B, 0x45, 0x01]);
        // 'é' became a single CP1252 byte
        assert_eq!(encoded[6..], [b'c', b'a', b'f', 0xE9]);
    }

    #[test]
    fn test_encode_payload_reselects_after_init() {
        let raw = vec![0x1B, 0x40, b'A'];
        let encoded = encode_payload(&raw);
        // select, INIT, re-select, then text
        let mut expected = SELECT_CP1252.to_vec();
        expected.extend_from_slice(&[0x1B, 0x40]);
        expected.extend_from_slice(&SELECT_CP1252);
        expected.push(b'A');
        assert_eq!(encoded, expected);
    }
}
