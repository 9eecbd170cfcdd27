#![deny(unsafe_code)]
#![deny(warnings)]
//! Host name lookup shared by the TCP and SNTP clients

use defmt::{debug, error, Debug2Format};
use embassy_net::dns::DnsQueryType;
use embassy_net::{IpAddress, Stack};

use super::error::NetworkError;

/// First IPv4 address for `host`
pub async fn resolve(stack: Stack<'_>, host: &str) -> Result<IpAddress, NetworkError> {
    let addrs = stack
        .dns_query(host, DnsQueryType::A)
        .await
        .map_err(|e| {
            error!("DNS lookup of {} failed: {:?}", host, Debug2Format(&e));
            NetworkError::DnsError
        })?;
    let addr = addrs.first().copied().ok_or_else(|| {
        error!("DNS returned no A record for {}", host);
        NetworkError::DnsError
    })?;
    debug!("{} is {}", host, Debug2Format(&addr));
    Ok(addr)
}
