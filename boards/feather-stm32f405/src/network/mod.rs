#![deny(warnings)]
//! Network module: implementations of the `potty-hal` traits
//!
//! - **`config`**: Configuration structs with `Default` implementations
//! - **`dns`**: Host name lookup
//! - **`error`**: Simple error enum for network operations
//! - **`https`**: Single-shot HTTP(S) client (`HttpClient`)
//! - **`link`**: DHCP-driven wired link (`NetworkLink`)
//! - **`sntp`**: SNTP query returning UTC seconds
//! - **`tcp`**: Outbound TCP stream for embedded-io-async
//! - **`tls`**: Crypto provider for embedded-tls
//!
//! The W5500 driver (`embassy-net-wiznet`) provides the device and runner;
//! the `embassy-net` stack handles TCP/IP and applications use its socket
//! APIs directly.

pub mod config;
mod dns;
pub mod error;
pub mod https;
pub mod link;
pub mod sntp;
pub mod tcp;
pub mod tls;

pub use config::{HttpConfig, NetworkConfig, SntpConfig};
pub use error::NetworkError;
pub use https::HttpsClient;
pub use link::EthLink;
pub use sntp::SntpClient;
