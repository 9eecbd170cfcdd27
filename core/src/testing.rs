//! Host-side doubles for the HAL traits

use core::cell::Cell;
use std::collections::VecDeque;
use std::string::String;
use std::vec::Vec;

use embedded_hal_async::delay::DelayNs;
use potty_hal::{HttpClient, Method, NetworkLink, Request, Response, WallClock};

#[derive(Debug)]
pub struct MockError;

/// Link that connects only when a test says so
#[derive(Debug, Default)]
pub struct MockLink {
    pub connected: bool,
    pub begins: usize,
    pub disconnects: usize,
    pub ssid: heapless::String<32>,
}

impl NetworkLink for MockLink {
    fn begin(&mut self, ssid: &str, _password: &str) {
        self.begins += 1;
        self.ssid.clear();
        let _ = self.ssid.push_str(ssid);
    }

    fn disconnect(&mut self) {
        self.disconnects += 1;
        self.connected = false;
    }

    fn is_connected(&self) -> bool {
        self.connected
    }
}

/// Wall clock that reads 0 until a given number of reads have happened
#[derive(Debug)]
pub struct MockClock {
    epoch: u64,
    plausible_after: Option<usize>,
    reads: Cell<usize>,
    pub configured: Vec<(i32, i32)>,
    pub fail_configure: bool,
}

impl MockClock {
    /// Never plausible
    pub fn unsynced() -> Self {
        Self {
            epoch: 0,
            plausible_after: None,
            reads: Cell::new(0),
            configured: Vec::new(),
            fail_configure: false,
        }
    }

    /// Plausible from the first read
    pub fn synced(epoch: u64) -> Self {
        Self::plausible_after(0).with_epoch(epoch)
    }

    /// The first `reads` reads return 0
    pub fn plausible_after(reads: usize) -> Self {
        Self {
            epoch: 1_718_452_800,
            plausible_after: Some(reads),
            ..Self::unsynced()
        }
    }

    pub fn with_epoch(mut self, epoch: u64) -> Self {
        self.epoch = epoch;
        self
    }

    pub fn set_epoch(&mut self, epoch: u64) {
        self.epoch = epoch;
    }

    pub fn reads(&self) -> usize {
        self.reads.get()
    }
}

impl WallClock for MockClock {
    type Error = MockError;

    fn now_epoch(&self) -> u64 {
        let read = self.reads.get();
        self.reads.set(read + 1);
        match self.plausible_after {
            Some(n) if read >= n => self.epoch,
            _ => 0,
        }
    }

    async fn configure(&mut self, utc_offset_secs: i32, dst_offset_secs: i32) -> Result<(), MockError> {
        if self.fail_configure {
            return Err(MockError);
        }
        self.configured.push((utc_offset_secs, dst_offset_secs));
        Ok(())
    }
}

/// A request as the mock saw it
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: Method,
    pub url: String,
    pub content_type: Option<String>,
    pub body: String,
}

/// Records requests and answers from a queue, then with an empty 200
#[derive(Debug, Default)]
pub struct MockHttp {
    pub requests: Vec<RecordedRequest>,
    replies: VecDeque<Result<(u16, String), MockError>>,
}

impl MockHttp {
    pub fn push_response(&mut self, status: u16, body: &str) {
        self.replies.push_back(Ok((status, body.into())));
    }

    pub fn push_transport_error(&mut self) {
        self.replies.push_back(Err(MockError));
    }
}

impl HttpClient for MockHttp {
    type Error = MockError;

    async fn request(&mut self, request: &Request<'_>, body: &mut [u8]) -> Result<Response, MockError> {
        self.requests.push(RecordedRequest {
            method: request.method,
            url: request.url.into(),
            content_type: request.content_type.map(Into::into),
            body: String::from_utf8_lossy(request.body).into_owned(),
        });

        let (status, text) = match self.replies.pop_front() {
            Some(reply) => reply?,
            None => (200, String::new()),
        };
        let len = text.len().min(body.len());
        body[..len].copy_from_slice(&text.as_bytes()[..len]);
        Ok(Response {
            status,
            body_len: len,
        })
    }
}

/// Delay that returns immediately and keeps a tally
#[derive(Debug, Default)]
pub struct MockDelay {
    pub calls: usize,
    pub total_ms: u64,
}

impl DelayNs for MockDelay {
    async fn delay_ns(&mut self, ns: u32) {
        self.calls += 1;
        self.total_ms += u64::from(ns) / 1_000_000;
    }

    async fn delay_ms(&mut self, ms: u32) {
        self.calls += 1;
        self.total_ms += u64::from(ms);
    }
}
