//! Minimal HTTP/1.1 framing for single-shot requests
//!
//! The board's TLS client uses these to turn a [`Request`] into bytes on the
//! wire and to find the status and body in whatever it reads back. Every
//! request is sent with `Connection: close`, so a body without
//! `Content-Length` simply runs to end of stream.

use core::fmt::Write;

use heapless::String;
use potty_hal::Request;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum HttpParseError {
    /// URL is not `http://` or `https://`
    UnsupportedScheme,
    /// Empty host or unparsable port
    InvalidUrl,
    /// Request head exceeded its buffer
    TooLong,
    /// Status line is not `HTTP/1.x NNN ...`
    MalformedStatus,
    /// Header line without a colon or with a bad `Content-Length`
    MalformedHeader,
    /// Chunk size line is not hex
    MalformedChunk,
}

impl core::fmt::Display for HttpParseError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::UnsupportedScheme => write!(f, "Unsupported URL scheme"),
            Self::InvalidUrl => write!(f, "Invalid URL"),
            Self::TooLong => write!(f, "Request head too long"),
            Self::MalformedStatus => write!(f, "Malformed status line"),
            Self::MalformedHeader => write!(f, "Malformed header"),
            Self::MalformedChunk => write!(f, "Malformed chunk"),
        }
    }
}

impl core::error::Error for HttpParseError {}

/// Components of an absolute URL
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UrlParts<'a> {
    pub tls: bool,
    pub host: &'a str,
    pub port: u16,
    /// Path and query as written in the URL
    pub path: &'a str,
}

pub fn split_url(url: &str) -> Result<UrlParts<'_>, HttpParseError> {
    let (tls, rest) = if let Some(rest) = url.strip_prefix("https://") {
        (true, rest)
    } else if let Some(rest) = url.strip_prefix("http://") {
        (false, rest)
    } else {
        return Err(HttpParseError::UnsupportedScheme);
    };

    // A query may follow the host directly; `write_request_head` adds the slash
    let (authority, path) = match rest.find(|c: char| c == '/' || c == '?') {
        Some(i) => (&rest[..i], &rest[i..]),
        None => (rest, "/"),
    };

    let (host, port) = match authority.rsplit_once(':') {
        Some((host, port)) => (
            host,
            port.parse::<u16>().map_err(|_| HttpParseError::InvalidUrl)?,
        ),
        None => (authority, if tls { 443 } else { 80 }),
    };
    if host.is_empty() {
        return Err(HttpParseError::InvalidUrl);
    }

    Ok(UrlParts {
        tls,
        host,
        port,
        path,
    })
}

/// Write request line and headers, ending with the blank line
///
/// The body is not included; send `request.body` right after the head.
pub fn write_request_head<const N: usize>(
    request: &Request<'_>,
    parts: &UrlParts<'_>,
    out: &mut String<N>,
) -> Result<(), HttpParseError> {
    let too_long = |_: core::fmt::Error| HttpParseError::TooLong;
    let slash = if parts.path.starts_with('/') { "" } else { "/" };
    write!(
        out,
        "{} {}{} HTTP/1.1\r\nHost: {}\r\nUser-Agent: potty-tracker\r\nAccept: */*\r\nConnection: close\r\n",
        request.method.as_str(),
        slash,
        parts.path,
        parts.host
    )
    .map_err(too_long)?;
    if let Some(content_type) = request.content_type {
        write!(out, "Content-Type: {}\r\n", content_type).map_err(too_long)?;
    }
    if !request.body.is_empty() || request.content_type.is_some() {
        write!(out, "Content-Length: {}\r\n", request.body.len()).map_err(too_long)?;
    }
    out.push_str("\r\n").map_err(|_| HttpParseError::TooLong)
}

/// Status line and framing headers of a response
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ResponseHead {
    pub status: u16,
    /// Bytes up to and including the blank line
    pub header_len: usize,
    pub content_length: Option<usize>,
    pub chunked: bool,
}

/// Parse a response head from the bytes received so far
///
/// `Ok(None)` means the blank line has not arrived yet.
pub fn parse_response(received: &[u8]) -> Result<Option<ResponseHead>, HttpParseError> {
    let Some(end) = received.windows(4).position(|w| w == b"\r\n\r\n") else {
        return Ok(None);
    };
    let head = core::str::from_utf8(&received[..end]).map_err(|_| HttpParseError::MalformedHeader)?;
    let mut lines = head.split("\r\n");

    let status_line = lines.next().ok_or(HttpParseError::MalformedStatus)?;
    let mut fields = status_line.splitn(3, ' ');
    let version = fields.next().unwrap_or("");
    if !version.starts_with("HTTP/1.") {
        return Err(HttpParseError::MalformedStatus);
    }
    let status = fields
        .next()
        .filter(|code| code.len() == 3)
        .and_then(|code| code.parse::<u16>().ok())
        .ok_or(HttpParseError::MalformedStatus)?;

    let mut content_length = None;
    let mut chunked = false;
    for line in lines {
        let (name, value) = line
            .split_once(':')
            .ok_or(HttpParseError::MalformedHeader)?;
        let value = value.trim();
        if name.trim().eq_ignore_ascii_case("content-length") {
            content_length = Some(
                value
                    .parse::<usize>()
                    .map_err(|_| HttpParseError::MalformedHeader)?,
            );
        } else if name.trim().eq_ignore_ascii_case("transfer-encoding") {
            chunked = value
                .rsplit(',')
                .next()
                .is_some_and(|last| last.trim().eq_ignore_ascii_case("chunked"));
        }
    }

    Ok(Some(ResponseHead {
        status,
        header_len: end + 4,
        content_length,
        chunked,
    }))
}

/// Decode a chunked body in place, returning the decoded length
///
/// A body cut short by the buffer yields whatever chunk data was complete
/// enough to copy.
pub fn dechunk(body: &mut [u8]) -> Result<usize, HttpParseError> {
    let mut read = 0;
    let mut written = 0;
    loop {
        let Some(line_len) = body[read..].windows(2).position(|w| w == b"\r\n") else {
            return Ok(written);
        };
        let size_field = &body[read..read + line_len];
        // Chunk extensions follow a ';'
        let size_hex = size_field
            .split(|&b| b == b';')
            .next()
            .unwrap_or(size_field);
        let size_str = core::str::from_utf8(size_hex).map_err(|_| HttpParseError::MalformedChunk)?;
        let size = usize::from_str_radix(size_str.trim(), 16)
            .map_err(|_| HttpParseError::MalformedChunk)?;
        if size == 0 {
            return Ok(written);
        }

        read += line_len + 2;
        let available = size.min(body.len() - read);
        body.copy_within(read..read + available, written);
        written += available;
        if available < size {
            return Ok(written);
        }
        read += size;
        // CRLF after the chunk data
        if body.len() - read < 2 {
            return Ok(written);
        }
        read += 2;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_url() {
        let parts =
            split_url("https://api.telegram.org/bot1:A/getUpdates?offset=0&timeout=0").unwrap();
        assert!(parts.tls);
        assert_eq!(parts.host, "api.telegram.org");
        assert_eq!(parts.port, 443);
        assert_eq!(parts.path, "/bot1:A/getUpdates?offset=0&timeout=0");
    }

    #[test]
    fn test_split_url_variants() {
        let parts = split_url("http://192.168.1.10:8080").unwrap();
        assert!(!parts.tls);
        assert_eq!((parts.host, parts.port, parts.path), ("192.168.1.10", 8080, "/"));

        let parts = split_url("https://example.com?x=1").unwrap();
        assert_eq!(parts.path, "?x=1");

        assert_eq!(split_url("ftp://x/"), Err(HttpParseError::UnsupportedScheme));
        assert_eq!(split_url("https:///path"), Err(HttpParseError::InvalidUrl));
        assert_eq!(split_url("https://h:99999/"), Err(HttpParseError::InvalidUrl));
    }

    #[test]
    fn test_write_get_head() {
        let url = "https://api-v2.voicemonkey.io/trigger?token=t&device=d";
        let request = Request::get(url);
        let mut head: String<256> = String::new();
        write_request_head(&request, &split_url(url).unwrap(), &mut head).unwrap();
        assert_eq!(
            head.as_str(),
            "GET /trigger?token=t&device=d HTTP/1.1\r\nHost: api-v2.voicemonkey.io\r\n\
             User-Agent: potty-tracker\r\nAccept: */*\r\nConnection: close\r\n\r\n"
        );
    }

    #[test]
    fn test_write_post_head() {
        let url = "https://maker.ifttt.com/trigger/dog/with/key/k";
        let request = Request::post_json(url, b"{\"value1\":\"x\"}");
        let mut head: String<256> = String::new();
        write_request_head(&request, &split_url(url).unwrap(), &mut head).unwrap();
        assert!(head.starts_with("POST /trigger/dog/with/key/k HTTP/1.1\r\n"));
        assert!(head.contains("Content-Type: application/json\r\n"));
        assert!(head.contains("Content-Length: 14\r\n"));
        assert!(head.ends_with("\r\n\r\n"));
    }

    #[test]
    fn test_write_head_too_long() {
        let url = "https://example.com/";
        let mut head: String<16> = String::new();
        assert_eq!(
            write_request_head(&Request::get(url), &split_url(url).unwrap(), &mut head),
            Err(HttpParseError::TooLong)
        );
    }

    #[test]
    fn test_parse_response() {
        let raw = b"HTTP/1.1 200 OK\r\nContent-Type: application/json\r\ncontent-length: 11\r\n\r\n{\"ok\":true}";
        let head = parse_response(raw).unwrap().unwrap();
        assert_eq!(head.status, 200);
        assert_eq!(head.content_length, Some(11));
        assert!(!head.chunked);
        assert_eq!(&raw[head.header_len..], b"{\"ok\":true}");
    }

    #[test]
    fn test_parse_response_incomplete_and_errors() {
        assert_eq!(parse_response(b"HTTP/1.1 200 OK\r\nHost: x\r\n"), Ok(None));
        assert_eq!(
            parse_response(b"SMTP 220 hi\r\n\r\n"),
            Err(HttpParseError::MalformedStatus)
        );
        assert_eq!(
            parse_response(b"HTTP/1.1 2000 OK\r\n\r\n"),
            Err(HttpParseError::MalformedStatus)
        );
        assert_eq!(
            parse_response(b"HTTP/1.1 200 OK\r\nbogus\r\n\r\n"),
            Err(HttpParseError::MalformedHeader)
        );
        let head = parse_response(b"HTTP/1.0 404\r\n\r\n").unwrap().unwrap();
        assert_eq!(head.status, 404);
        assert_eq!(head.content_length, None);
    }

    #[test]
    fn test_parse_chunked_flag() {
        let head = parse_response(b"HTTP/1.1 200 OK\r\nTransfer-Encoding: gzip, chunked\r\n\r\n")
            .unwrap()
            .unwrap();
        assert!(head.chunked);
    }

    #[test]
    fn test_dechunk() {
        let mut body = *b"4\r\nWiki\r\n6;ext=1\r\npedia \r\n0\r\n\r\n";
        let len = dechunk(&mut body).unwrap();
        assert_eq!(&body[..len], b"Wikipedia ");
    }

    #[test]
    fn test_dechunk_truncated() {
        let mut body = *b"4\r\nWiki\r\n6\r\nped";
        let len = dechunk(&mut body).unwrap();
        assert_eq!(&body[..len], b"Wikiped");

        let mut bad = *b"zz\r\nxx\r\n";
        assert_eq!(dechunk(&mut bad), Err(HttpParseError::MalformedChunk));
    }
}
