//! Payload encoders for query strings and JSON bodies
//!
//! Both write into caller-owned fixed-capacity strings and fail with
//! `NotifyError::TooLong` instead of truncating.

use core::fmt::Write;

use heapless::String;

use crate::error::NotifyError;

const HEX_UPPER: &[u8; 16] = b"0123456789ABCDEF";

/// Append `input` in `application/x-www-form-urlencoded` style
///
/// ASCII letters and digits pass through, space becomes `+`, every other
/// byte (including each byte of a multi-byte UTF-8 sequence) becomes `%XX`
/// with uppercase hex.
pub fn percent_encode_into<const N: usize>(
    input: &str,
    out: &mut String<N>,
) -> Result<(), NotifyError> {
    for &byte in input.as_bytes() {
        if byte.is_ascii_alphanumeric() {
            out.push(byte as char).map_err(|_| NotifyError::TooLong)?;
        } else if byte == b' ' {
            out.push('+').map_err(|_| NotifyError::TooLong)?;
        } else {
            let hi = HEX_UPPER[usize::from(byte >> 4)] as char;
            let lo = HEX_UPPER[usize::from(byte & 0x0F)] as char;
            for c in ['%', hi, lo] {
                out.push(c).map_err(|_| NotifyError::TooLong)?;
            }
        }
    }
    Ok(())
}

/// Append `input` as the contents of a JSON string literal (no quotes)
pub fn json_escape_into<const N: usize>(
    input: &str,
    out: &mut String<N>,
) -> Result<(), NotifyError> {
    for c in input.chars() {
        let pushed = match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if (c as u32) < 0x20 => write!(out, "\\u{:04x}", c as u32).map_err(|_| ()),
            c => out.push(c),
        };
        pushed.map_err(|_| NotifyError::TooLong)?;
    }
    Ok(())
}
