//! Field extraction for `getUpdates` responses
//!
//! This is not a JSON parser. It walks the body once, tracking string and
//! nesting state, and pulls out exactly three fields of the first update:
//!
//! - `update_id` (anywhere, first occurrence)
//! - `chat.id`, the `id` directly inside the first `chat` object of that update
//! - `text`, a sibling of `chat` in the same message object
//!
//! Anything else in the body is skipped without being validated.

use heapless::String;

/// Longest command text kept; longer text is truncated on a char boundary
pub const TEXT_MAX: usize = 256;

/// Extraction failures
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ScanError {
    /// Body holds no update (empty result list or an error reply)
    NoUpdate,
    /// An update was present but its fields could not be read
    Malformed,
    /// The body ended inside the update with this id
    Truncated(u64),
}

impl core::fmt::Display for ScanError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::NoUpdate => write!(f, "No update in response"),
            Self::Malformed => write!(f, "Malformed update"),
            Self::Truncated(id) => write!(f, "Update {} cut off", id),
        }
    }
}

impl core::error::Error for ScanError {}

/// The three fields of one update
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Update<'a> {
    pub update_id: u64,
    /// Chat id exactly as it appears in the body (may be negative)
    pub chat_id: &'a str,
    /// Decoded message text; `None` for non-text messages
    pub text: Option<String<TEXT_MAX>>,
}

/// Extract the first update from a `getUpdates` body
pub fn scan_update(body: &str) -> Result<Update<'_>, ScanError> {
    let mut scanner = Scanner::new(body);

    let update_depth = loop {
        match scanner.next_key(0)? {
            Some((b"update_id", depth)) => break depth,
            Some(_) => {}
            None => return Err(ScanError::NoUpdate),
        }
    };
    let update_id = scanner
        .read_integer()?
        .parse::<u64>()
        .map_err(|_| ScanError::Malformed)?;
    if scanner.exhausted() {
        // The digits themselves may be cut short
        return Err(ScanError::Malformed);
    }

    match scan_message(&mut scanner, update_depth) {
        Ok((chat_id, text)) => Ok(Update {
            update_id,
            chat_id,
            text,
        }),
        Err(_) if scanner.exhausted() => Err(ScanError::Truncated(update_id)),
        Err(e) => Err(e),
    }
}

/// `chat.id` and `text` of the update whose fields sit at `update_depth`
fn scan_message<'a>(
    scanner: &mut Scanner<'a>,
    update_depth: usize,
) -> Result<(&'a str, Option<String<TEXT_MAX>>), ScanError> {
    let chat_depth = loop {
        match scanner.next_key(update_depth)? {
            Some((b"chat", depth)) if depth > update_depth => break depth,
            Some(_) => {}
            None => return Err(ScanError::Malformed),
        }
    };

    let chat_id = loop {
        match scanner.next_key(chat_depth + 1)? {
            Some((b"id", depth)) if depth == chat_depth + 1 => break scanner.read_integer()?,
            Some(_) => {}
            None => return Err(ScanError::Malformed),
        }
    };

    let text = loop {
        match scanner.next_key(chat_depth)? {
            Some((b"text", depth)) if depth == chat_depth => break scanner.read_string()?,
            Some(_) => {}
            None if scanner.exhausted() => return Err(ScanError::Malformed),
            None => break None,
        }
    };

    Ok((chat_id, text))
}

struct Scanner<'a> {
    text: &'a str,
    bytes: &'a [u8],
    pos: usize,
    depth: usize,
}

impl<'a> Scanner<'a> {
    fn new(text: &'a str) -> Self {
        Self {
            text,
            bytes: text.as_bytes(),
            pos: 0,
            depth: 0,
        }
    }

    /// Whole input consumed without the update closing
    fn exhausted(&self) -> bool {
        self.pos >= self.bytes.len()
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn skip_whitespace(&mut self) {
        while matches!(self.peek(), Some(b' ' | b'\t' | b'\n' | b'\r')) {
            self.pos += 1;
        }
    }

    /// Advance to the next object key and return it with its nesting depth
    ///
    /// Leaves the cursor just past the `:`. Returns `None` at end of input or
    /// when a closing bracket takes the depth below `floor`.
    fn next_key(&mut self, floor: usize) -> Result<Option<(&'a [u8], usize)>, ScanError> {
        while let Some(byte) = self.peek() {
            match byte {
                b'{' | b'[' => {
                    self.depth += 1;
                    self.pos += 1;
                }
                b'}' | b']' => {
                    self.depth = self.depth.checked_sub(1).ok_or(ScanError::Malformed)?;
                    self.pos += 1;
                    if self.depth < floor {
                        return Ok(None);
                    }
                }
                b'"' => {
                    let raw = self.skip_string()?;
                    self.skip_whitespace();
                    if self.peek() == Some(b':') {
                        self.pos += 1;
                        return Ok(Some((raw, self.depth)));
                    }
                }
                _ => self.pos += 1,
            }
        }
        Ok(None)
    }

    /// Step over a string literal, returning its raw (still escaped) contents
    fn skip_string(&mut self) -> Result<&'a [u8], ScanError> {
        self.pos += 1;
        let start = self.pos;
        loop {
            match self.peek() {
                Some(b'"') => {
                    let raw = &self.bytes[start..self.pos];
                    self.pos += 1;
                    return Ok(raw);
                }
                Some(b'\\') => self.pos += 2,
                Some(_) => self.pos += 1,
                None => return Err(ScanError::Malformed),
            }
        }
    }

    /// Read an optionally negative integer literal
    fn read_integer(&mut self) -> Result<&'a str, ScanError> {
        self.skip_whitespace();
        let start = self.pos;
        if self.peek() == Some(b'-') {
            self.pos += 1;
        }
        let digits = self.pos;
        while matches!(self.peek(), Some(b'0'..=b'9')) {
            self.pos += 1;
        }
        if self.pos == digits {
            return Err(ScanError::Malformed);
        }
        Ok(&self.text[start..self.pos])
    }

    /// Decode a string value; `None` when the value is not a string
    fn read_string(&mut self) -> Result<Option<String<TEXT_MAX>>, ScanError> {
        self.skip_whitespace();
        if self.peek() != Some(b'"') {
            return Ok(None);
        }
        let raw = self.skip_string()?;
        // Raw slice lies between two ASCII quotes of a valid &str
        let raw = core::str::from_utf8(raw).map_err(|_| ScanError::Malformed)?;
        decode_string(raw).map(Some)
    }
}

fn decode_string(raw: &str) -> Result<String<TEXT_MAX>, ScanError> {
    let mut out = String::new();
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        let decoded = if c == '\\' {
            match chars.next().ok_or(ScanError::Malformed)? {
                '"' => '"',
                '\\' => '\\',
                '/' => '/',
                'b' => '\u{8}',
                'f' => '\u{c}',
                'n' => '\n',
                'r' => '\r',
                't' => '\t',
                'u' => decode_unicode_escape(&mut chars)?,
                _ => return Err(ScanError::Malformed),
            }
        } else {
            c
        };
        if out.push(decoded).is_err() {
            break;
        }
    }
    Ok(out)
}

fn read_hex4(chars: &mut core::str::Chars<'_>) -> Result<u32, ScanError> {
    let mut value = 0u32;
    for _ in 0..4 {
        let digit = chars
            .next()
            .and_then(|c| c.to_digit(16))
            .ok_or(ScanError::Malformed)?;
        value = (value << 4) | digit;
    }
    Ok(value)
}

/// Decode the `XXXX` after `\u`, joining UTF-16 surrogate pairs
fn decode_unicode_escape(chars: &mut core::str::Chars<'_>) -> Result<char, ScanError> {
    let first = read_hex4(chars)?;
    if !(0xD800..0xDC00).contains(&first) {
        return Ok(char::from_u32(first).unwrap_or(char::REPLACEMENT_CHARACTER));
    }

    let mut lookahead = chars.clone();
    if lookahead.next() == Some('\\') && lookahead.next() == Some('u') {
        let second = read_hex4(&mut lookahead)?;
        if (0xDC00..0xE000).contains(&second) {
            *chars = lookahead;
            let combined = 0x10000 + ((first - 0xD800) << 10) + (second - 0xDC00);
            return Ok(char::from_u32(combined).unwrap_or(char::REPLACEMENT_CHARACTER));
        }
    }
    Ok(char::REPLACEMENT_CHARACTER)
}

#[cfg(test)]
mod tests {
    use super::*;

    const STATUS_UPDATE: &str = r#"{"ok":true,"result":[{"update_id":5,
        "message":{"message_id":77,"from":{"id":99,"is_bot":false,"first_name":"Sam"},
        "chat":{"id":42,"first_name":"Sam","type":"private"},"date":1718452800,
        "text":"/status"}}]}"#;

    #[test]
    fn test_scan_basic_update() {
        let update = scan_update(STATUS_UPDATE).unwrap();
        assert_eq!(update.update_id, 5);
        // `from.id` comes first but is not the chat id
        assert_eq!(update.chat_id, "42");
        assert_eq!(update.text.as_deref(), Some("/status"));
    }

    #[test]
    fn test_scan_empty_result() {
        assert_eq!(
            scan_update(r#"{"ok":true,"result":[]}"#),
            Err(ScanError::NoUpdate)
        );
        assert_eq!(
            scan_update(r#"{"ok":false,"error_code":401,"description":"Unauthorized"}"#),
            Err(ScanError::NoUpdate)
        );
        assert_eq!(scan_update(""), Err(ScanError::NoUpdate));
    }

    #[test]
    fn test_scan_group_chat_negative_id() {
        let body = r#"{"ok":true,"result":[{"update_id":900000001,"message":{"chat":{"type":"group","id":-100123},"text":"/pee@PottyBot"}}]}"#;
        let update = scan_update(body).unwrap();
        assert_eq!(update.update_id, 900_000_001);
        assert_eq!(update.chat_id, "-100123");
        assert_eq!(update.text.as_deref(), Some("/pee@PottyBot"));
    }

    #[test]
    fn test_scan_without_text() {
        let body = r#"{"ok":true,"result":[{"update_id":8,"message":{"chat":{"id":42},"sticker":{"file_id":"x"}}},{"update_id":9,"message":{"chat":{"id":42},"text":"/poop"}}]}"#;
        let update = scan_update(body).unwrap();
        assert_eq!(update.update_id, 8);
        // The next update's text must not leak into this one
        assert_eq!(update.text, None);
    }

    #[test]
    fn test_scan_ignores_nested_reply_text() {
        let body = r#"{"result":[{"update_id":3,"message":{"chat":{"id":42},"reply_to_message":{"chat":{"id":42},"text":"old"},"text":"/help"}}]}"#;
        let update = scan_update(body).unwrap();
        assert_eq!(update.text.as_deref(), Some("/help"));
    }

    #[test]
    fn test_scan_keys_inside_strings_are_ignored() {
        let body = r#"{"result":[{"update_id":4,"message":{"from":{"first_name":"\"chat\":{\"id\":1}"},"chat":{"id":42},"text":"hi"}}]}"#;
        let update = scan_update(body).unwrap();
        assert_eq!(update.chat_id, "42");
    }

    #[test]
    fn test_scan_decodes_escapes() {
        let body = r#"{"result":[{"update_id":1,"message":{"chat":{"id":2},"text":"a\"b\\c\/d\né🐕"}}]}"#;
        let update = scan_update(body).unwrap();
        assert_eq!(update.text.as_deref(), Some("a\"b\\c/d\né🐕"));
    }

    #[test]
    fn test_scan_lone_surrogate_is_replaced() {
        let body = r#"{"result":[{"update_id":1,"message":{"chat":{"id":2},"text":"x\ud83dy"}}]}"#;
        let update = scan_update(body).unwrap();
        assert_eq!(update.text.as_deref(), Some("x\u{FFFD}y"));
    }

    #[test]
    fn test_scan_malformed() {
        // update_id not a number
        assert_eq!(
            scan_update(r#"{"result":[{"update_id":"x"}]}"#),
            Err(ScanError::Malformed)
        );
        // update without chat
        assert_eq!(
            scan_update(r#"{"result":[{"update_id":7,"poll":{"id":"p"}}]}"#),
            Err(ScanError::Malformed)
        );
        // chat without id
        assert_eq!(
            scan_update(r#"{"result":[{"update_id":7,"message":{"chat":{"type":"private"}}}]}"#),
            Err(ScanError::Malformed)
        );
    }

    #[test]
    fn test_scan_cut_off_update_reports_its_id() {
        // Inside the text
        assert_eq!(
            scan_update(r#"{"result":[{"update_id":7,"message":{"chat":{"id":42},"text":"/sta"#),
            Err(ScanError::Truncated(7))
        );
        // Before the chat object
        assert_eq!(
            scan_update(r#"{"result":[{"update_id":8,"message":{"from":{"first_name":"Sa"#),
            Err(ScanError::Truncated(8))
        );
        // After the chat id, before any text key
        assert_eq!(
            scan_update(r#"{"result":[{"update_id":9,"message":{"chat":{"id":42},"date":17"#),
            Err(ScanError::Truncated(9))
        );
        // The id digits themselves may be incomplete
        assert_eq!(
            scan_update(r#"{"result":[{"update_id":12"#),
            Err(ScanError::Malformed)
        );
    }

    #[test]
    fn test_scan_first_update_complete_second_cut() {
        let body = r#"{"result":[{"update_id":5,"message":{"chat":{"id":42},"text":"/status"}},{"update_id":6,"message":{"chat":{"id":42},"text":"caf"#;
        let update = scan_update(body).unwrap();
        assert_eq!(update.update_id, 5);
        assert_eq!(update.text.as_deref(), Some("/status"));
    }

    #[test]
    fn test_scan_truncates_long_text() {
        let long = "a".repeat(TEXT_MAX + 10);
        let body = format!(
            r#"{{"result":[{{"update_id":1,"message":{{"chat":{{"id":2}},"text":"{}"}}}}]}}"#,
            long
        );
        let update = scan_update(&body).unwrap();
        assert_eq!(update.text.map(|t| t.len()), Some(TEXT_MAX));
    }
}
