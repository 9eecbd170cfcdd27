//! HTTP client abstraction
//!
//! One request per call, no connection reuse. The response body is copied
//! into a caller-provided buffer so implementations stay allocation-free.

use core::future::Future;

/// HTTP request method
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Method {
    Get,
    Post,
}

impl Method {
    /// Request-line token
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
        }
    }
}

/// Outbound request
#[derive(Debug, Clone, Copy)]
pub struct Request<'a> {
    pub method: Method,
    /// Absolute `https://` URL including the query string
    pub url: &'a str,
    /// `Content-Type` header, only sent when present
    pub content_type: Option<&'a str>,
    pub body: &'a [u8],
}

impl<'a> Request<'a> {
    /// `GET` with no body
    pub const fn get(url: &'a str) -> Self {
        Self {
            method: Method::Get,
            url,
            content_type: None,
            body: &[],
        }
    }

    /// `POST` with an `application/json` body
    pub const fn post_json(url: &'a str, body: &'a [u8]) -> Self {
        Self {
            method: Method::Post,
            url,
            content_type: Some("application/json"),
            body,
        }
    }
}

/// Status and body length of a completed exchange
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Response {
    pub status: u16,
    /// Bytes written into the caller's body buffer (truncated to its size)
    pub body_len: usize,
}

impl Response {
    pub const fn is_success(&self) -> bool {
        self.status >= 200 && self.status < 300
    }
}

/// Single-shot HTTPS client
///
/// `Err` means the exchange never produced a status line (DNS, socket or TLS
/// failure). Any status, including 4xx/5xx, is reported as `Ok`.
pub trait HttpClient {
    type Error: core::fmt::Debug;

    fn request(
        &mut self,
        request: &Request<'_>,
        body: &mut [u8],
    ) -> impl Future<Output = Result<Response, Self::Error>>;
}
