// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Percent-encoding for wire fields.
//!
//! Fields may not contain the separator (space), the terminator bytes, or
//! control characters; those are escaped as `%XX`. `encode_bytes` also
//! escapes non-ASCII so arbitrary binary (process output) survives the
//! text protocol losslessly.

use crate::message::WireError;

fn must_escape_text(b: u8) -> bool {
    b == b'%' || b == b' ' || b == b';' || b < 0x20 || b == 0x7F
}

fn must_escape_binary(b: u8) -> bool {
    must_escape_text(b) || b >= 0x80
}

fn push_escaped(out: &mut String, b: u8) {
    const HEX: &[u8; 16] = b"0123456789ABCDEF";
    out.push('%');
    out.push(HEX[(b >> 4) as usize] as char);
    out.push(HEX[(b & 0x0F) as usize] as char);
}

/// Encode a UTF-8 field. Non-ASCII passes through unescaped (multi-byte
/// sequences contain no bytes from the escape set).
pub fn encode_field(field: &str) -> String {
    let mut out = String::with_capacity(field.len());
    for c in field.chars() {
        if c.is_ascii() && must_escape_text(c as u8) {
            push_escaped(&mut out, c as u8);
        } else {
            out.push(c);
        }
    }
    out
}

/// Encode arbitrary bytes into a pure-ASCII field.
pub fn encode_bytes(data: &[u8]) -> String {
    let mut out = String::with_capacity(data.len());
    for &b in data {
        if must_escape_binary(b) {
            push_escaped(&mut out, b);
        } else {
            out.push(b as char);
        }
    }
    out
}

fn hex_val(c: u8) -> Option<u8> {
    match c {
        b'0'..=b'9' => Some(c - b'0'),
        b'A'..=b'F' => Some(c - b'A' + 10),
        b'a'..=b'f' => Some(c - b'a' + 10),
        _ => None,
    }
}

/// Decode a field to raw bytes.
pub fn decode_bytes(field: &str) -> Result<Vec<u8>, WireError> {
    let bytes = field.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let (hi, lo) = match (bytes.get(i + 1), bytes.get(i + 2)) {
                (Some(&hi), Some(&lo)) => (hi, lo),
                _ => return Err(WireError::BadEscape(field.to_string())),
            };
            let byte = match (hex_val(hi), hex_val(lo)) {
                (Some(hi), Some(lo)) => (hi << 4) | lo,
                _ => return Err(WireError::BadEscape(field.to_string())),
            };
            out.push(byte);
            i += 3;
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    Ok(out)
}

/// Decode a field to a UTF-8 string.
pub fn decode_field(field: &str) -> Result<String, WireError> {
    let bytes = decode_bytes(field)?;
    String::from_utf8(bytes).map_err(|_| WireError::BadEscape(field.to_string()))
}

#[cfg(test)]
#[path = "escape_tests.rs"]
mod tests;
