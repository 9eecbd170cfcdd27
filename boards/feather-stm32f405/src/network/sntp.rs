#![deny(unsafe_code)]
#![deny(warnings)]
//! SNTP (RFC 4330) query
//!
//! One request per server, servers tried in order, first acceptable answer
//! wins. There is no retry loop here: the connectivity core syncs again on
//! every reconnect and bounds its own wait for a plausible clock.

use defmt::{debug, warn, Format};
use embassy_net::udp::{PacketMetadata, UdpSocket};
use embassy_net::{IpEndpoint, Stack};
use embassy_time::{with_timeout, Duration, Instant};

use super::config::SntpConfig;
use super::dns::resolve;
use super::error::NetworkError;

const NTP_PORT: u16 = 123;
const PACKET_LEN: usize = 48;
/// LI 0, version 3, mode 3 (client)
const CLIENT_REQUEST: u8 = 0x1B;
const MODE_SERVER: u8 = 4;
/// Leap indicator 3: server clock not synchronized
const LEAP_ALARM: u8 = 3;
/// Seconds from 1900-01-01 to 1970-01-01
const NTP_UNIX_OFFSET: u64 = 2_208_988_800;

/// Fields of a server packet the client acts on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Format)]
struct ServerTime {
    leap: u8,
    mode: u8,
    stratum: u8,
    transmit_secs: u32,
    transmit_frac: u32,
}

impl ServerTime {
    fn decode(packet: &[u8]) -> Result<Self, NetworkError> {
        if packet.len() < PACKET_LEN {
            return Err(NetworkError::InvalidResponse);
        }
        let word = |at: usize| u32::from_be_bytes([packet[at], packet[at + 1], packet[at + 2], packet[at + 3]]);
        Ok(Self {
            leap: packet[0] >> 6,
            mode: packet[0] & 0x07,
            stratum: packet[1],
            transmit_secs: word(40),
            transmit_frac: word(44),
        })
    }

    fn check(&self, max_stratum: u8) -> Result<(), NetworkError> {
        if self.mode != MODE_SERVER {
            return Err(NetworkError::InvalidResponse);
        }
        if self.leap == LEAP_ALARM || self.stratum == 0 || self.stratum > max_stratum {
            return Err(NetworkError::ServerError);
        }
        Ok(())
    }

    /// Unix seconds at arrival, half the round trip after the server stamped
    /// the packet, rounded to the RTC's one-second resolution
    fn unix_secs(&self, round_trip_micros: u64) -> u64 {
        let frac_micros = (u64::from(self.transmit_frac) * 1_000_000) >> 32;
        let micros = frac_micros + round_trip_micros / 2;
        u64::from(self.transmit_secs).saturating_sub(NTP_UNIX_OFFSET) + (micros + 500_000) / 1_000_000
    }
}

pub struct SntpClient {
    servers: &'static [&'static str],
    config: SntpConfig,
}

impl SntpClient {
    pub fn new(servers: &'static [&'static str], config: SntpConfig) -> Self {
        Self { servers, config }
    }

    pub fn config(&self) -> &SntpConfig {
        &self.config
    }

    /// Current UTC time in Unix seconds from the first server that answers
    pub async fn fetch(&self, stack: Stack<'static>) -> Result<u64, NetworkError> {
        for server in self.servers {
            match self.query(stack, server).await {
                Ok(unix) => return Ok(unix),
                Err(e) => warn!("SNTP {} failed: {}", server, e),
            }
        }
        Err(NetworkError::AllServersFailed)
    }

    async fn query(&self, stack: Stack<'static>, server: &str) -> Result<u64, NetworkError> {
        let endpoint = IpEndpoint::new(resolve(stack, server).await?, NTP_PORT);

        let mut rx_meta = [PacketMetadata::EMPTY; 1];
        let mut rx_buffer = [0u8; PACKET_LEN];
        let mut tx_meta = [PacketMetadata::EMPTY; 1];
        let mut tx_buffer = [0u8; PACKET_LEN];
        let mut socket = UdpSocket::new(stack, &mut rx_meta, &mut rx_buffer, &mut tx_meta, &mut tx_buffer);
        socket.bind(0).map_err(|_| NetworkError::SocketError)?;

        let mut packet = [0u8; PACKET_LEN];
        packet[0] = CLIENT_REQUEST;
        let sent_at = Instant::now();
        socket
            .send_to(&packet, endpoint)
            .await
            .map_err(|_| NetworkError::SocketError)?;

        let wait = Duration::from_millis(self.config.timeout_ms);
        let (len, meta) = with_timeout(wait, socket.recv_from(&mut packet))
            .await
            .map_err(|_| NetworkError::Timeout)?
            .map_err(|_| NetworkError::SocketError)?;
        let round_trip = sent_at.elapsed();
        if meta.endpoint != endpoint {
            return Err(NetworkError::InvalidResponse);
        }

        let time = ServerTime::decode(&packet[..len])?;
        if let Err(e) = time.check(self.config.max_stratum) {
            warn!("Rejecting reply from {}: {}", server, time);
            return Err(e);
        }
        let unix = time.unix_secs(round_trip.as_micros());
        debug!(
            "{}: stratum {}, {} UTC, round trip {} ms",
            server,
            time.stratum,
            unix,
            round_trip.as_millis()
        );
        Ok(unix)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reply(first: u8, stratum: u8, secs: u32, frac: u32) -> [u8; PACKET_LEN] {
        let mut packet = [0u8; PACKET_LEN];
        packet[0] = first;
        packet[1] = stratum;
        packet[40..44].copy_from_slice(&secs.to_be_bytes());
        packet[44..48].copy_from_slice(&frac.to_be_bytes());
        packet
    }

    // 2024-06-15 12:00:00 UTC in NTP seconds
    const JUNE_NTP: u32 = (1_718_452_800 + NTP_UNIX_OFFSET) as u32;

    #[test]
    fn test_decode_and_round() {
        // LI 0, VN 3, mode 4
        let time = ServerTime::decode(&reply(0x1C, 2, JUNE_NTP, 1 << 31)).unwrap();
        assert_eq!(time.check(3), Ok(()));
        // .5 s rounds up
        assert_eq!(time.unix_secs(0), 1_718_452_801);

        let time = ServerTime::decode(&reply(0x1C, 2, JUNE_NTP, 0)).unwrap();
        assert_eq!(time.unix_secs(0), 1_718_452_800);
        // 1.2 s round trip adds 0.6 s
        assert_eq!(time.unix_secs(1_200_000), 1_718_452_801);
    }

    #[test]
    fn test_rejected_replies() {
        assert_eq!(ServerTime::decode(&[0x1C; 20]), Err(NetworkError::InvalidResponse));
        // Client mode echoed back
        let time = ServerTime::decode(&reply(0x1B, 2, JUNE_NTP, 0)).unwrap();
        assert_eq!(time.check(3), Err(NetworkError::InvalidResponse));
        // Kiss-o'-death and too-distant servers
        let time = ServerTime::decode(&reply(0x1C, 0, 0, 0)).unwrap();
        assert_eq!(time.check(3), Err(NetworkError::ServerError));
        let time = ServerTime::decode(&reply(0x1C, 4, JUNE_NTP, 0)).unwrap();
        assert_eq!(time.check(3), Err(NetworkError::ServerError));
        // Unsynchronized server
        let time = ServerTime::decode(&reply(0xDC, 1, JUNE_NTP, 0)).unwrap();
        assert_eq!(time.check(3), Err(NetworkError::ServerError));
    }
}
