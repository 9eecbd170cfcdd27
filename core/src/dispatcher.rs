//! Outbound notification channels
//!
//! Every sender here is independent and holds no state between calls:
//! - chat-bot message (`sendMessage`)
//! - voice-device trigger
//! - key/value webhook
//! - NotifyMe announcement
//!
//! Each one checks link and configuration first and returns without touching
//! the network when either is missing. Exactly one request is made per call;
//! retrying is the caller's decision.

use core::fmt::Write;

use embedded_hal_async::delay::DelayNs;
use heapless::String;
use potty_hal::{HttpClient, Request, Response};

use crate::config::{NotifyConfig, DEVICE_MAX};
use crate::encode::{json_escape_into, percent_encode_into};
use crate::error::NotifyError;
use crate::fmt::Debug2Format;

/// Capacity of a fully assembled request URL
pub const URL_MAX: usize = 1024;

/// Capacity of a JSON request body
pub const BODY_MAX: usize = 512;

/// Request URL buffer
pub type Url = String<URL_MAX>;

fn too_long(_: core::fmt::Error) -> NotifyError {
    NotifyError::TooLong
}

/// Stateless sender for all outbound channels
#[derive(Debug, Clone)]
pub struct NotificationDispatcher {
    config: NotifyConfig,
}

impl NotificationDispatcher {
    pub fn new(config: NotifyConfig) -> Self {
        Self { config }
    }

    /// `https://<bot-host>/bot<token>/sendMessage?chat_id=<id>&text=<encoded>`
    pub fn bot_message_url(&self, token: &str, chat_id: &str, text: &str) -> Result<Url, NotifyError> {
        let mut url = Url::new();
        write!(
            url,
            "https://{}/bot{}/sendMessage?chat_id={}&text=",
            self.config.bot_api_host, token, chat_id
        )
        .map_err(too_long)?;
        percent_encode_into(text, &mut url)?;
        Ok(url)
    }

    /// `https://<voice-host>/trigger?token=<token>&device=<lowercased>`
    pub fn voice_trigger_url(&self, token: &str, device: &str) -> Result<Url, NotifyError> {
        // The voice service matches device names case-sensitively against lowercase
        let mut lowered: String<DEVICE_MAX> = String::new();
        for c in device.chars().flat_map(char::to_lowercase) {
            lowered.push(c).map_err(|_| NotifyError::TooLong)?;
        }

        let mut url = Url::new();
        write!(url, "https://{}/trigger?token=", self.config.voice_host).map_err(too_long)?;
        percent_encode_into(token, &mut url)?;
        url.push_str("&device=").map_err(|_| NotifyError::TooLong)?;
        percent_encode_into(&lowered, &mut url)?;
        Ok(url)
    }

    /// `https://<webhook-host>/trigger/<event>/with/key/<key>`
    pub fn webhook_url(&self, key: &str, event: &str) -> Result<Url, NotifyError> {
        let mut url = Url::new();
        write!(url, "https://{}/trigger/", self.config.webhook_host).map_err(too_long)?;
        percent_encode_into(event, &mut url)?;
        url.push_str("/with/key/").map_err(|_| NotifyError::TooLong)?;
        percent_encode_into(key, &mut url)?;
        Ok(url)
    }

    /// Send `text` to one chat through one bot
    ///
    /// Waits `settle_delay_ms` before the request so back-to-back TLS
    /// sessions do not exhaust the socket pool.
    pub async fn send_bot_message<H: HttpClient, D: DelayNs>(
        &self,
        http: &mut H,
        delay: &mut D,
        link_up: bool,
        token: &str,
        chat_id: &str,
        text: &str,
    ) -> Result<(), NotifyError> {
        if !link_up {
            warn!("Cannot send bot message: link down");
            return Err(NotifyError::LinkDown);
        }
        if token.is_empty() || chat_id.is_empty() {
            warn!("Bot token or chat id not configured");
            return Err(NotifyError::NotConfigured);
        }

        let url = self.bot_message_url(token, chat_id, text)?;
        delay.delay_ms(self.config.settle_delay_ms).await;

        info!("Sending bot message to chat {}", chat_id);
        let response = Self::exchange(http, &Request::get(&url), "bot message").await?;
        Self::expect_success(response, "bot message")
    }

    /// Fire a voice-device trigger
    pub async fn trigger_voice_device<H: HttpClient>(
        &self,
        http: &mut H,
        link_up: bool,
        token: &str,
        device: &str,
    ) -> Result<(), NotifyError> {
        if !link_up {
            warn!("Cannot trigger voice device: link down");
            return Err(NotifyError::LinkDown);
        }
        if token.is_empty() || device.is_empty() {
            warn!("Voice token or device not configured");
            return Err(NotifyError::NotConfigured);
        }

        let url = self.voice_trigger_url(token, device)?;
        let response = Self::exchange(http, &Request::get(&url), "voice trigger").await?;
        Self::expect_success(response, "voice trigger")
    }

    /// Post `{"value1":"<value>"}` to a key/value webhook
    pub async fn send_webhook<H: HttpClient>(
        &self,
        http: &mut H,
        link_up: bool,
        key: &str,
        event: &str,
        value: &str,
    ) -> Result<(), NotifyError> {
        if !link_up {
            warn!("Cannot send webhook: link down");
            return Err(NotifyError::LinkDown);
        }
        if key.is_empty() || event.is_empty() {
            warn!("Webhook key or event not configured");
            return Err(NotifyError::NotConfigured);
        }

        let url = self.webhook_url(key, event)?;
        let mut body: String<BODY_MAX> = String::new();
        body.push_str("{\"value1\":\"").map_err(|_| NotifyError::TooLong)?;
        json_escape_into(value, &mut body)?;
        body.push_str("\"}").map_err(|_| NotifyError::TooLong)?;

        let request = Request::post_json(&url, body.as_bytes());
        let response = Self::exchange(http, &request, "webhook").await?;
        Self::expect_success(response, "webhook")
    }

    /// Post an announcement to the NotifyMe service
    pub async fn send_notify_me<H: HttpClient>(
        &self,
        http: &mut H,
        link_up: bool,
        access_code: &str,
        message: &str,
    ) -> Result<(), NotifyError> {
        if !link_up {
            warn!("Cannot send NotifyMe announcement: link down");
            return Err(NotifyError::LinkDown);
        }
        if access_code.is_empty() {
            warn!("NotifyMe access code not configured");
            return Err(NotifyError::NotConfigured);
        }

        let mut body: String<BODY_MAX> = String::new();
        body.push_str("{\"notification\":\"")
            .map_err(|_| NotifyError::TooLong)?;
        json_escape_into(message, &mut body)?;
        body.push_str("\",\"accessCode\":\"")
            .map_err(|_| NotifyError::TooLong)?;
        json_escape_into(access_code, &mut body)?;
        body.push_str("\"}").map_err(|_| NotifyError::TooLong)?;

        let request = Request::post_json(self.config.notify_me_url, body.as_bytes());
        let response = Self::exchange(http, &request, "NotifyMe").await?;
        Self::expect_success(response, "NotifyMe")
    }

    async fn exchange<H: HttpClient>(
        http: &mut H,
        request: &Request<'_>,
        channel: &'static str,
    ) -> Result<Response, NotifyError> {
        // Senders only care about the status; the body is discarded
        let mut scratch = [0u8; 0];
        http.request(request, &mut scratch).await.map_err(|e| {
            error!("{} failed: {:?}", channel, Debug2Format(&e));
            NotifyError::Transport
        })
    }

    fn expect_success(response: Response, channel: &'static str) -> Result<(), NotifyError> {
        if response.is_success() {
            info!("{} delivered (HTTP {})", channel, response.status);
            Ok(())
        } else {
            warn!("{} rejected (HTTP {})", channel, response.status);
            Err(NotifyError::Status(response.status))
        }
    }
}
