#![deny(unsafe_code)]
#![deny(warnings)]
//! Outbound TCP stream for the HTTP client
//!
//! `TcpStream` owns an embassy-net socket and presents it through the
//! `embedded-io-async` traits that `embedded-tls` and the plain-HTTP path
//! are both generic over.

use defmt::{debug, warn, Debug2Format};
use embassy_net::tcp::TcpSocket;
use embassy_net::{IpEndpoint, Stack};
use embedded_io_async::{ErrorType, Read, Write};

use super::dns::resolve;
use super::error::NetworkError;

pub struct TcpStream<'a> {
    socket: TcpSocket<'a>,
}

impl<'a> TcpStream<'a> {
    /// Resolve `host` and connect to it over the caller's socket buffers
    pub async fn connect(
        stack: Stack<'a>,
        host: &str,
        port: u16,
        rx_buffer: &'a mut [u8],
        tx_buffer: &'a mut [u8],
    ) -> Result<Self, NetworkError> {
        let endpoint = IpEndpoint::new(resolve(stack, host).await?, port);
        let mut socket = TcpSocket::new(stack, rx_buffer, tx_buffer);
        socket.connect(endpoint).await.map_err(|e| {
            warn!("Connect to {}:{} failed: {:?}", host, port, Debug2Format(&e));
            NetworkError::SocketError
        })?;
        debug!("Connected to {}", Debug2Format(&endpoint));
        Ok(Self { socket })
    }

    /// Send FIN; the server sees end of request
    pub fn shutdown(&mut self) {
        self.socket.close();
    }
}

impl ErrorType for TcpStream<'_> {
    type Error = NetworkError;
}

impl Read for TcpStream<'_> {
    async fn read(&mut self, buf: &mut [u8]) -> Result<usize, NetworkError> {
        self.socket
            .read(buf)
            .await
            .map_err(|_| NetworkError::SocketError)
    }
}

impl Write for TcpStream<'_> {
    async fn write(&mut self, buf: &[u8]) -> Result<usize, NetworkError> {
        self.socket
            .write(buf)
            .await
            .map_err(|_| NetworkError::SocketError)
    }

    async fn flush(&mut self) -> Result<(), NetworkError> {
        self.socket
            .flush()
            .await
            .map_err(|_| NetworkError::SocketError)
    }
}
