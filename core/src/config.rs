//! Connectivity configuration structures
//!
//! Everything here is supplied once at startup and never mutated. String
//! fields are fixed-capacity; values that do not fit are rejected by the
//! constructors rather than truncated.

use heapless::{String, Vec};

/// Maximum number of chat bots that can be registered
pub const MAX_BOTS: usize = 3;

pub const SSID_MAX: usize = 32;
pub const PASSWORD_MAX: usize = 64;
pub const TOKEN_MAX: usize = 64;
pub const CHAT_ID_MAX: usize = 24;
pub const DEVICE_MAX: usize = 32;
pub const EVENT_MAX: usize = 48;

/// A configuration string did not fit its fixed capacity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CapacityError;

impl core::fmt::Display for CapacityError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "Configuration value too long")
    }
}

impl core::error::Error for CapacityError {}

/// The assembled configuration was rejected
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConfigError {
    /// A string did not fit its fixed capacity
    TooLong,
    /// More than `MAX_BOTS` bots
    TooManyBots,
    /// Two bots share an authorized chat, so replies could not tell them apart
    DuplicateChat,
}

impl core::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::TooLong => write!(f, "Configuration value too long"),
            Self::TooManyBots => write!(f, "Too many bots"),
            Self::DuplicateChat => write!(f, "Chat already has a bot"),
        }
    }
}

impl core::error::Error for ConfigError {}

impl From<CapacityError> for ConfigError {
    fn from(_: CapacityError) -> Self {
        Self::TooLong
    }
}

fn bounded<const N: usize>(value: &str) -> Result<String<N>, CapacityError> {
    String::try_from(value).map_err(|_| CapacityError)
}

/// Link credentials and association timing
#[derive(Debug, Clone, Default)]
pub struct LinkConfig {
    pub ssid: String<SSID_MAX>,
    pub password: String<PASSWORD_MAX>,
    /// Time allowed for the initial association before the first retry
    pub connect_timeout_ms: u32,
}

impl LinkConfig {
    pub fn new(ssid: &str, password: &str) -> Result<Self, CapacityError> {
        Ok(Self {
            ssid: bounded(ssid)?,
            password: bounded(password)?,
            connect_timeout_ms: 10_000,
        })
    }
}

/// Reconnection backoff: `min(base_ms * 2^attempts, cap_ms)`
#[derive(Debug, Clone, Copy)]
pub struct BackoffConfig {
    pub base_ms: u32,
    pub cap_ms: u32,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            base_ms: 1_000,
            cap_ms: 60_000,
        }
    }
}

/// Network time synchronization settings
#[derive(Debug, Clone)]
pub struct TimeSyncConfig {
    /// NTP servers the board's clock queries, in order
    pub servers: &'static [&'static str],
    /// Standard-time offset from UTC in whole hours (EST = -5)
    pub timezone_hours: i8,
    /// Hours added while the US daylight-saving rule is in effect
    pub dst_hours: i8,
    /// Interval between wall-clock plausibility checks during a sync
    pub poll_interval_ms: u32,
    /// Maximum plausibility checks before giving up on a sync
    pub max_poll_attempts: u8,
}

impl Default for TimeSyncConfig {
    fn default() -> Self {
        Self {
            servers: &["pool.ntp.org", "time.nist.gov"],
            timezone_hours: -5,
            dst_hours: 1,
            poll_interval_ms: 500,
            max_poll_attempts: 20,
        }
    }
}

/// Command polling cadence
#[derive(Debug, Clone, Copy)]
pub struct PollerConfig {
    pub interval_ms: u32,
    /// Reply-pending gate releases itself after this long
    pub reply_timeout_ms: u32,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            interval_ms: 5_000,
            reply_timeout_ms: 30_000,
        }
    }
}

/// Remote service endpoints and send pacing
#[derive(Debug, Clone)]
pub struct NotifyConfig {
    /// Chat-bot API host (`api.<bot-host>`)
    pub bot_api_host: &'static str,
    /// Voice-trigger service host
    pub voice_host: &'static str,
    /// Key/value webhook host
    pub webhook_host: &'static str,
    /// NotifyMe endpoint URL
    pub notify_me_url: &'static str,
    /// Pause before each bot send so the TLS socket pool can drain
    pub settle_delay_ms: u32,
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            bot_api_host: "api.telegram.org",
            voice_host: "api-v2.voicemonkey.io",
            webhook_host: "maker.ifttt.com",
            notify_me_url: "https://api.notifymyecho.com/v1/NotifyMe",
            settle_delay_ms: 500,
        }
    }
}

/// Broadcast alert rate limiting
#[derive(Debug, Clone, Copy)]
pub struct AlertPolicyConfig {
    /// Minimum spacing between two broadcast alerts
    pub cooldown_ms: u32,
    /// Local hour (0-23) at which quiet hours begin
    pub quiet_start_hour: u8,
    /// Local hour (0-23) at which quiet hours end
    pub quiet_end_hour: u8,
}

impl Default for AlertPolicyConfig {
    fn default() -> Self {
        Self {
            cooldown_ms: 3_600_000,
            quiet_start_hour: 23,
            quiet_end_hour: 7,
        }
    }
}

/// One chat bot and the single chat it accepts commands from
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BotConfig {
    pub token: String<TOKEN_MAX>,
    pub chat_id: String<CHAT_ID_MAX>,
}

impl BotConfig {
    pub fn new(token: &str, chat_id: &str) -> Result<Self, CapacityError> {
        Ok(Self {
            token: bounded(token)?,
            chat_id: bounded(chat_id)?,
        })
    }

    /// Both token and chat id are present
    pub fn is_configured(&self) -> bool {
        !self.token.is_empty() && !self.chat_id.is_empty()
    }
}

/// Voice-trigger credentials
#[derive(Debug, Clone, Default)]
pub struct VoiceConfig {
    pub token: String<TOKEN_MAX>,
    pub device: String<DEVICE_MAX>,
}

impl VoiceConfig {
    pub fn new(token: &str, device: &str) -> Result<Self, CapacityError> {
        Ok(Self {
            token: bounded(token)?,
            device: bounded(device)?,
        })
    }
}

/// Key/value webhook credentials
#[derive(Debug, Clone, Default)]
pub struct WebhookConfig {
    pub key: String<TOKEN_MAX>,
    pub event: String<EVENT_MAX>,
}

impl WebhookConfig {
    pub fn new(key: &str, event: &str) -> Result<Self, CapacityError> {
        Ok(Self {
            key: bounded(key)?,
            event: bounded(event)?,
        })
    }
}

/// NotifyMe credentials
#[derive(Debug, Clone, Default)]
pub struct NotifyMeConfig {
    pub access_code: String<TOKEN_MAX>,
}

impl NotifyMeConfig {
    pub fn new(access_code: &str) -> Result<Self, CapacityError> {
        Ok(Self {
            access_code: bounded(access_code)?,
        })
    }
}

/// Complete connectivity configuration
#[derive(Debug, Clone, Default)]
pub struct Config {
    pub link: LinkConfig,
    pub backoff: BackoffConfig,
    pub time: TimeSyncConfig,
    pub poller: PollerConfig,
    pub notify: NotifyConfig,
    pub alerts: AlertPolicyConfig,
    pub bots: Vec<BotConfig, MAX_BOTS>,
    pub voice: Option<VoiceConfig>,
    pub webhook: Option<WebhookConfig>,
    pub notify_me: Option<NotifyMeConfig>,
}

impl Config {
    /// Register a bot
    ///
    /// Each chat may have only one bot: replies are routed by chat id.
    pub fn add_bot(&mut self, bot: BotConfig) -> Result<(), ConfigError> {
        if self.bots.iter().any(|b| b.chat_id == bot.chat_id) {
            return Err(ConfigError::DuplicateChat);
        }
        self.bots.push(bot).map_err(|_| ConfigError::TooManyBots)
    }
}
