#![deny(unsafe_code)]
#![deny(warnings)]
//! Network client error types

use defmt::Format;
use potty_core::http::HttpParseError;

/// Network client operation errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Format)]
pub enum NetworkError {
    /// DNS resolution failed
    DnsError,
    /// Socket bind/connect error
    SocketError,
    /// Request timeout
    Timeout,
    /// Invalid response from server
    InvalidResponse,
    /// Server refused service (NTP stratum, leap alarm)
    ServerError,
    /// All configured servers failed
    AllServersFailed,
    /// RTC not installed yet
    RtcNotInitialized,
    /// RTC rejected the date or failed to read back
    RtcHardwareError,
    /// TLS handshake failed
    TlsHandshakeFailed,
    /// Request could not be framed or the response head was malformed
    Http(HttpParseError),
}

impl core::fmt::Display for NetworkError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::DnsError => write!(f, "DNS resolution failed"),
            Self::SocketError => write!(f, "Socket error"),
            Self::Timeout => write!(f, "Request timeout"),
            Self::InvalidResponse => write!(f, "Invalid response"),
            Self::ServerError => write!(f, "Server error"),
            Self::AllServersFailed => write!(f, "All servers failed"),
            Self::RtcNotInitialized => write!(f, "RTC not initialized"),
            Self::RtcHardwareError => write!(f, "RTC hardware error"),
            Self::TlsHandshakeFailed => write!(f, "TLS handshake failed"),
            Self::Http(e) => write!(f, "HTTP error: {}", e),
        }
    }
}

// Implement core::error::Error for no_std compatibility
impl core::error::Error for NetworkError {}

impl From<HttpParseError> for NetworkError {
    fn from(e: HttpParseError) -> Self {
        Self::Http(e)
    }
}

impl embedded_io_async::Error for NetworkError {
    fn kind(&self) -> embedded_io_async::ErrorKind {
        match self {
            Self::SocketError => embedded_io_async::ErrorKind::BrokenPipe,
            Self::Timeout => embedded_io_async::ErrorKind::TimedOut,
            Self::InvalidResponse | Self::Http(_) => embedded_io_async::ErrorKind::InvalidData,
            _ => embedded_io_async::ErrorKind::Other,
        }
    }
}
