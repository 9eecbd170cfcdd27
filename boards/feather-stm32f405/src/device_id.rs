#![deny(unsafe_code)]
#![deny(warnings)]
//! Device identifier utilities for STM32F405
//!
//! The factory-programmed 96-bit unique device ID is stable across reboots
//! and unique to each chip. The W5500 has no burned-in address, so the
//! Ethernet MAC is derived from it.

/// Get the STM32F405 unique device ID as a 24-character hex string
pub fn uid_hex() -> &'static str {
    embassy_stm32::uid::uid_hex()
}

/// Get the raw 12-byte (96-bit) unique device ID
pub fn uid() -> &'static [u8; 12] {
    embassy_stm32::uid::uid()
}

/// Locally administered unicast MAC built from the UID
///
/// The first octet is fixed at `0x02`; the remaining five fold the 12 UID
/// bytes together so that boards from the same wafer still differ.
pub fn mac_address() -> [u8; 6] {
    mac_from_uid(uid())
}

fn mac_from_uid(uid: &[u8; 12]) -> [u8; 6] {
    let mut mac = [0x02, 0, 0, 0, 0, 0];
    for (i, byte) in uid.iter().enumerate() {
        mac[1 + i % 5] ^= byte.rotate_left((i / 5) as u32);
    }
    mac
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mac_is_local_unicast() {
        let mac = mac_from_uid(&[0xFF; 12]);
        assert_eq!(mac[0], 0x02);
    }

    #[test]
    fn test_mac_differs_per_uid() {
        let a = mac_from_uid(&[1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12]);
        let b = mac_from_uid(&[1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 13]);
        assert_ne!(a, b);
    }
}
