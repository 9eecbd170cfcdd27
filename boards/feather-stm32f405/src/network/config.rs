#![deny(unsafe_code)]
#![deny(warnings)]
//! Network configuration structures
//!
//! Credentials are baked in at build time from the environment, e.g.
//! `POTTY_BOT_TOKEN=... POTTY_CHAT_ID=... cargo build --release`. Unset
//! channels stay unconfigured.

use potty_core::config::{BotConfig, ConfigError, LinkConfig, NotifyMeConfig, VoiceConfig, WebhookConfig};
use potty_core::Config;

/// SNTP exchange settings; the server list comes from the core's
/// `TimeSyncConfig`
#[derive(Debug, Clone, Copy)]
pub struct SntpConfig {
    /// Reply wait per server in milliseconds
    pub timeout_ms: u64,
    /// Maximum accepted stratum level (1-15)
    pub max_stratum: u8,
    /// A configure request within this window of the last sync is a no-op
    pub min_resync_secs: u64,
}

impl Default for SntpConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 5000,
            max_stratum: 3,
            min_resync_secs: 60,
        }
    }
}

/// HTTPS client configuration
#[derive(Debug, Clone, Copy)]
pub struct HttpConfig {
    /// Whole-exchange budget: DNS, connect, handshake, request and response
    pub timeout_ms: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self { timeout_ms: 15_000 }
    }
}

/// Network stack configuration
#[derive(Debug, Clone)]
pub struct NetworkConfig {
    /// Random seed for network stack
    pub seed: u64,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            seed: 0x1234_5678_u64,
        }
    }
}

fn env_pair(a: Option<&'static str>, b: Option<&'static str>) -> Option<(&'static str, &'static str)> {
    a.zip(b).filter(|(a, b)| !a.is_empty() && !b.is_empty())
}

/// Assemble the connectivity configuration from build-time settings
pub fn connectivity_config() -> Result<Config, ConfigError> {
    let mut config = Config {
        link: LinkConfig::new(
            option_env!("POTTY_LINK_NAME").unwrap_or("wired"),
            option_env!("POTTY_LINK_PASSWORD").unwrap_or(""),
        )?,
        ..Config::default()
    };

    let bots = [
        (option_env!("POTTY_BOT_TOKEN"), option_env!("POTTY_CHAT_ID")),
        (option_env!("POTTY_BOT2_TOKEN"), option_env!("POTTY_CHAT2_ID")),
        (option_env!("POTTY_BOT3_TOKEN"), option_env!("POTTY_CHAT3_ID")),
    ];
    for (token, chat_id) in bots.into_iter().filter_map(|(t, c)| env_pair(t, c)) {
        config.add_bot(BotConfig::new(token, chat_id)?)?;
    }

    if let Some((token, device)) = env_pair(
        option_env!("POTTY_VOICE_TOKEN"),
        option_env!("POTTY_VOICE_DEVICE"),
    ) {
        config.voice = Some(VoiceConfig::new(token, device)?);
    }
    if let Some((key, event)) = env_pair(
        option_env!("POTTY_WEBHOOK_KEY"),
        option_env!("POTTY_WEBHOOK_EVENT"),
    ) {
        config.webhook = Some(WebhookConfig::new(key, event)?);
    }
    if let Some(code) = option_env!("POTTY_NOTIFYME_CODE").filter(|c| !c.is_empty()) {
        config.notify_me = Some(NotifyMeConfig::new(code)?);
    }

    Ok(config)
}
