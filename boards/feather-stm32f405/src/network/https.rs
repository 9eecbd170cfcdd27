#![deny(unsafe_code)]
#![deny(warnings)]
//! Single-shot HTTP(S) client implementing `potty_hal::HttpClient`
//!
//! Each request opens a fresh TCP connection to the URL's host, wraps it
//! in TLS 1.3 for `https://` URLs, sends one request with
//! `Connection: close` and reads until the server closes (or the announced
//! `Content-Length` has arrived).
//!
//! # Memory Usage
//!
//! - TLS record buffers: 18 KB + 16 KB in main SRAM (see `src/tls_buffers.rs`)
//! - TCP socket buffers: 8 KB on the task stack (4 KB RX + 4 KB TX)
//! - Response buffer: 4 KB, owned by the client

use defmt::{debug, error, info, Debug2Format};
use embassy_net::Stack;
use embassy_time::{with_timeout, Duration};
use embedded_io_async::{Read, Write};
use embedded_tls::{Aes128GcmSha256, TlsConfig, TlsConnection, TlsContext};
use heapless::String;
use potty_core::http::{dechunk, parse_response, split_url, write_request_head, ResponseHead};
use potty_hal::{HttpClient, Request, Response};

use crate::tls_buffers::TlsBuffers;

use super::config::HttpConfig;
use super::error::NetworkError;
use super::tcp::TcpStream;
use super::tls::SimpleCryptoProvider;

/// Raw response capacity: head plus the largest body the core asks for
const RESPONSE_MAX: usize = 4096;
/// Request line and headers; bot URLs carry the message text
const HEAD_MAX: usize = 1280;

pub struct HttpsClient<RNG> {
    stack: Stack<'static>,
    rng: RNG,
    tls: TlsBuffers,
    config: HttpConfig,
    response: [u8; RESPONSE_MAX],
}

impl<RNG> HttpsClient<RNG>
where
    RNG: rand_core::CryptoRngCore,
{
    pub fn new(stack: Stack<'static>, rng: RNG, tls: TlsBuffers, config: HttpConfig) -> Self {
        Self {
            stack,
            rng,
            tls,
            config,
            response: [0; RESPONSE_MAX],
        }
    }

    async fn perform(&mut self, request: &Request<'_>, body: &mut [u8]) -> Result<Response, NetworkError> {
        let parts = split_url(request.url)?;
        let mut head: String<HEAD_MAX> = String::new();
        write_request_head(request, &parts, &mut head)?;

        debug!("{} {}:{}", request.method, parts.host, parts.port);
        let mut rx_buffer = [0u8; 4096];
        let mut tx_buffer = [0u8; 4096];
        let mut socket =
            TcpStream::connect(self.stack, parts.host, parts.port, &mut rx_buffer, &mut tx_buffer).await?;

        let (response_head, filled) = if parts.tls {
            let config = TlsConfig::new().with_server_name(parts.host);
            let mut tls = TlsConnection::<TcpStream, Aes128GcmSha256>::new(
                socket,
                &mut *self.tls.read,
                &mut *self.tls.write,
            );
            let provider = SimpleCryptoProvider::new(&mut self.rng);
            tls.open(TlsContext::new(&config, provider))
                .await
                .map_err(|e| {
                    error!("TLS handshake failed: {:?}", Debug2Format(&e));
                    NetworkError::TlsHandshakeFailed
                })?;

            let result = exchange(&mut tls, head.as_bytes(), request.body, &mut self.response).await;
            if let Err((_socket, e)) = tls.close().await {
                debug!("TLS close returned error: {:?}", Debug2Format(&e));
            }
            result?
        } else {
            let result = exchange(&mut socket, head.as_bytes(), request.body, &mut self.response).await;
            socket.shutdown();
            result?
        };

        let body_len = copy_body(&mut self.response[..filled], &response_head, body)?;
        info!("{} {} -> {}", request.method, parts.host, response_head.status);
        Ok(Response {
            status: response_head.status,
            body_len,
        })
    }
}

impl<RNG> HttpClient for HttpsClient<RNG>
where
    RNG: rand_core::CryptoRngCore,
{
    type Error = NetworkError;

    async fn request(&mut self, request: &Request<'_>, body: &mut [u8]) -> Result<Response, NetworkError> {
        let budget = Duration::from_millis(self.config.timeout_ms);
        match with_timeout(budget, self.perform(request, body)).await {
            Ok(result) => result,
            Err(_) => {
                error!("HTTP exchange timed out");
                Err(NetworkError::Timeout)
            }
        }
    }
}

/// Send head and payload, then read until the response is complete
///
/// Returns the parsed head and the number of bytes in `rx`.
async fn exchange<S: Read + Write>(
    stream: &mut S,
    head: &[u8],
    payload: &[u8],
    rx: &mut [u8],
) -> Result<(ResponseHead, usize), NetworkError> {
    stream
        .write_all(head)
        .await
        .map_err(|_| NetworkError::SocketError)?;
    stream
        .write_all(payload)
        .await
        .map_err(|_| NetworkError::SocketError)?;
    stream.flush().await.map_err(|_| NetworkError::SocketError)?;

    let mut filled = 0;
    let mut parsed: Option<ResponseHead> = None;
    while filled < rx.len() {
        let n = match stream.read(&mut rx[filled..]).await {
            Ok(0) => break,
            Ok(n) => n,
            // Servers often drop the connection without close_notify
            Err(_) if parsed.is_some() => break,
            Err(_) => return Err(NetworkError::SocketError),
        };
        filled += n;

        if parsed.is_none() {
            parsed = parse_response(&rx[..filled])?;
        }
        if let Some(ResponseHead {
            header_len,
            content_length: Some(len),
            ..
        }) = parsed
        {
            if filled >= header_len + len {
                break;
            }
        }
    }

    parsed
        .map(|h| (h, filled))
        .ok_or(NetworkError::InvalidResponse)
}

/// Decode the body in `raw` and copy as much as fits into `out`
fn copy_body(raw: &mut [u8], head: &ResponseHead, out: &mut [u8]) -> Result<usize, NetworkError> {
    let end = match head.content_length {
        Some(len) => raw.len().min(head.header_len + len),
        None => raw.len(),
    };
    let body = &mut raw[head.header_len..end];
    let len = if head.chunked { dechunk(body)? } else { body.len() };
    let copied = len.min(out.len());
    out[..copied].copy_from_slice(&body[..copied]);
    Ok(copied)
}
