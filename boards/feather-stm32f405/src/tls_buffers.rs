//! TLS record buffers in main SRAM
//!
//! TLS 1.3 needs a 17 KB+ read buffer and a 16 KB write buffer. Both are
//! statically allocated once and handed to the HTTPS client, which reuses
//! them for every connection it opens (one at a time).
//!
//! # Buffer Sizing
//!
//! **Read Buffer (18 KB)**:
//! - TLS 1.3 maximum plaintext: 16384 bytes (16 KB)
//! - TLS record header: 5 bytes
//! - AEAD authentication tag: 16 bytes (AES-128-GCM-SHA256)
//! - Padding allowance: ~512 bytes
//!
//! **Write Buffer (16 KB)**:
//! - We control outgoing record sizes, so 16 KB is sufficient
#![deny(unsafe_code)]
#![deny(warnings)]

use static_cell::ConstStaticCell;

/// TLS read buffer size: 18 KB
const TLS_READ_BUF_SIZE: usize = 18 * 1024;

/// TLS write buffer size: 16 KB
const TLS_WRITE_BUF_SIZE: usize = 16 * 1024;

static TLS_READ_BUF: ConstStaticCell<[u8; TLS_READ_BUF_SIZE]> =
    ConstStaticCell::new([0; TLS_READ_BUF_SIZE]);

static TLS_WRITE_BUF: ConstStaticCell<[u8; TLS_WRITE_BUF_SIZE]> =
    ConstStaticCell::new([0; TLS_WRITE_BUF_SIZE]);

/// Exclusive handle on both record buffers
pub struct TlsBuffers {
    pub read: &'static mut [u8],
    pub write: &'static mut [u8],
}

/// Claim the buffers; returns `None` after the first call
pub fn take() -> Option<TlsBuffers> {
    let read = TLS_READ_BUF.try_take()?;
    let write = TLS_WRITE_BUF.try_take()?;
    Some(TlsBuffers { read, write })
}
