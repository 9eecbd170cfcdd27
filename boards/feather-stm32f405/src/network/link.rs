#![deny(unsafe_code)]
#![deny(warnings)]
//! Wired `NetworkLink` over the embassy-net stack
//!
//! The W5500 has no association step, so "associating" means (re)starting
//! DHCP. The link counts as connected once the PHY reports carrier and DHCP
//! has handed out an address.

use defmt::{info, warn};
use embassy_net::{ConfigV4, DhcpConfig, Stack};
use potty_hal::NetworkLink;

pub struct EthLink {
    stack: Stack<'static>,
}

impl EthLink {
    pub fn new(stack: Stack<'static>) -> Self {
        Self { stack }
    }

    /// Log the current address and gateway
    pub fn log_config(&self) {
        if let Some(config) = self.stack.config_v4() {
            let octets = config.address.address().octets();
            info!(
                "IP: {}.{}.{}.{}",
                octets[0], octets[1], octets[2], octets[3]
            );

            if let Some(gateway) = config.gateway {
                let gw_octets = gateway.octets();
                info!(
                    "Gateway: {}.{}.{}.{}",
                    gw_octets[0], gw_octets[1], gw_octets[2], gw_octets[3]
                );
            }
        }
    }
}

impl NetworkLink for EthLink {
    fn begin(&mut self, name: &str, password: &str) {
        if !password.is_empty() {
            warn!("Wired link ignores credentials for {}", name);
        }
        info!("Starting DHCP...");
        self.stack
            .set_config_v4(ConfigV4::Dhcp(DhcpConfig::default()));
    }

    fn disconnect(&mut self) {
        info!("Releasing DHCP lease");
        self.stack.set_config_v4(ConfigV4::None);
    }

    fn is_connected(&self) -> bool {
        self.stack.is_link_up() && self.stack.is_config_up()
    }
}
