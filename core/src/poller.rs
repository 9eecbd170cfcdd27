//! Inbound bot commands
//!
//! Each registered bot is asked for at most one update per poll with
//! `getUpdates?offset=<n>&timeout=0`. The offset only ever moves forward, so
//! an update is handed to the command handler at most once per process
//! lifetime. Updates from any chat other than the bot's authorized chat are
//! acknowledged (the offset still advances) but never dispatched.
//!
//! Responses longer than `UPDATE_BODY_MAX` arrive cut off. The first update
//! is still scanned from whatever fits; if it is the one cut off, it is
//! skipped so the bot does not fetch it forever.

use core::fmt::Write;

use heapless::{String, Vec};
use potty_hal::{HttpClient, Request};

use crate::config::{BotConfig, PollerConfig, MAX_BOTS};
use crate::dispatcher::Url;
use crate::fmt::Debug2Format;
use crate::mono;
use crate::scanner::{scan_update, ScanError, TEXT_MAX};

/// Response body buffer for one `getUpdates` exchange
pub const UPDATE_BODY_MAX: usize = 2048;

/// Receives authorized commands, synchronously from inside `poll`
pub trait CommandHandler {
    fn on_command(&mut self, chat_id: &str, text: &str);
}

impl<F: FnMut(&str, &str)> CommandHandler for F {
    fn on_command(&mut self, chat_id: &str, text: &str) {
        self(chat_id, text)
    }
}

/// An accepted command waiting to be handed to the handler
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingCommand<'a> {
    pub chat_id: &'a str,
    pub text: String<TEXT_MAX>,
}

/// A bot and the next update id it expects
#[derive(Debug, Clone)]
pub struct BotRegistration {
    pub bot: BotConfig,
    update_offset: u64,
}

impl BotRegistration {
    pub fn update_offset(&self) -> u64 {
        self.update_offset
    }

    /// Move the offset past `update_id`; false if it is already there
    fn advance_past(&mut self, update_id: u64) -> bool {
        let next = update_id.saturating_add(1);
        if next <= self.update_offset {
            return false;
        }
        self.update_offset = next;
        true
    }
}

/// Suspends polling while a reply is in flight, with an auto-clear timeout
#[derive(Debug, Clone, Copy, Default)]
struct ReplyGate {
    active: bool,
    since: u32,
}

#[derive(Debug)]
pub struct CommandPoller {
    config: PollerConfig,
    bot_api_host: &'static str,
    bots: Vec<BotRegistration, MAX_BOTS>,
    last_poll: Option<u32>,
    gate: ReplyGate,
}

impl CommandPoller {
    /// Register every configured bot
    ///
    /// Unconfigured entries are skipped, as is any bot whose chat already
    /// has one: replies are routed by chat id.
    pub fn new(config: PollerConfig, bot_api_host: &'static str, bots: &[BotConfig]) -> Self {
        let mut registered: Vec<BotRegistration, MAX_BOTS> = Vec::new();
        for bot in bots.iter().filter(|b| b.is_configured()) {
            if registered.iter().any(|r| r.bot.chat_id == bot.chat_id) {
                warn!("Chat {} already has a bot; ignoring the second", bot.chat_id.as_str());
                continue;
            }
            if registered
                .push(BotRegistration {
                    bot: bot.clone(),
                    update_offset: 0,
                })
                .is_err()
            {
                warn!("Ignoring bots beyond the first {}", MAX_BOTS);
                break;
            }
        }
        Self {
            config,
            bot_api_host,
            bots: registered,
            last_poll: None,
            gate: ReplyGate::default(),
        }
    }

    pub fn bots(&self) -> &[BotRegistration] {
        &self.bots
    }

    /// Bot whose authorized chat is `chat_id`
    pub fn bot_for_chat(&self, chat_id: &str) -> Option<&BotConfig> {
        self.bots
            .iter()
            .map(|r| &r.bot)
            .find(|b| b.chat_id.as_str() == chat_id)
    }

    /// Raise or lower the reply gate
    pub fn set_reply_pending(&mut self, pending: bool, now: u32) {
        self.gate = ReplyGate {
            active: pending,
            since: now,
        };
    }

    /// Whether the gate currently blocks polling; clears it once timed out
    pub fn is_reply_pending(&mut self, now: u32) -> bool {
        if self.gate.active && mono::elapsed(now, self.gate.since) >= self.config.reply_timeout_ms {
            warn!("Reply gate timed out; resuming polling");
            self.gate.active = false;
        }
        self.gate.active
    }

    fn interval_elapsed(&self, now: u32) -> bool {
        match self.last_poll {
            None => true,
            Some(last) => mono::elapsed(now, last) >= self.config.interval_ms,
        }
    }

    /// `https://<bot-host>/bot<token>/getUpdates?offset=<n>&timeout=0`
    pub fn updates_url(&self, token: &str, offset: u64) -> Result<Url, core::fmt::Error> {
        let mut url = Url::new();
        write!(
            url,
            "https://{}/bot{}/getUpdates?offset={}&timeout=0",
            self.bot_api_host, token, offset
        )?;
        Ok(url)
    }

    /// Poll every bot once if the link is up, the gate is open and the
    /// interval has elapsed; returns the number of commands dispatched
    pub async fn poll<H: HttpClient, F: CommandHandler>(
        &mut self,
        http: &mut H,
        link_up: bool,
        now: u32,
        handler: &mut F,
    ) -> usize {
        if !link_up || self.is_reply_pending(now) || !self.interval_elapsed(now) {
            return 0;
        }
        self.last_poll = Some(now);

        let mut dispatched = 0;
        let mut body = [0u8; UPDATE_BODY_MAX];
        for index in 0..self.bots.len() {
            let Some(len) = self.fetch(http, index, &mut body).await else {
                continue;
            };
            if let Some(command) = self.accept(index, &body[..len.min(UPDATE_BODY_MAX)]) {
                handler.on_command(command.chat_id, &command.text);
                dispatched += 1;
            }
        }
        dispatched
    }

    /// One `getUpdates` exchange; body length on HTTP 200
    async fn fetch<H: HttpClient>(
        &self,
        http: &mut H,
        index: usize,
        body: &mut [u8],
    ) -> Option<usize> {
        let registration = self.bots.get(index)?;
        let url = match self.updates_url(&registration.bot.token, registration.update_offset) {
            Ok(url) => url,
            Err(_) => {
                warn!("Updates URL too long for bot {}", index);
                return None;
            }
        };

        match http.request(&Request::get(&url), body).await {
            Ok(response) if response.status == 200 => Some(response.body_len),
            Ok(response) => {
                warn!("getUpdates for bot {} returned HTTP {}", index, response.status);
                None
            }
            Err(e) => {
                warn!("getUpdates for bot {} failed: {:?}", index, Debug2Format(&e));
                None
            }
        }
    }

    /// Scan a response body, advance the offset and authorize the sender
    fn accept<'a>(&mut self, index: usize, body: &'a [u8]) -> Option<PendingCommand<'a>> {
        let registration = self.bots.get_mut(index)?;
        let text = match core::str::from_utf8(body) {
            Ok(text) => text,
            // A body cut mid-character still holds every update before the cut
            Err(e) => core::str::from_utf8(&body[..e.valid_up_to()]).unwrap_or_default(),
        };

        let update = match scan_update(text) {
            Ok(update) => update,
            Err(ScanError::NoUpdate) => return None,
            Err(ScanError::Truncated(update_id)) => {
                warn!(
                    "Update {} for bot {} exceeds {} bytes; skipping it",
                    update_id, index, UPDATE_BODY_MAX
                );
                registration.advance_past(update_id);
                return None;
            }
            Err(ScanError::Malformed) => {
                warn!("Discarding malformed update for bot {}", index);
                return None;
            }
        };

        if !registration.advance_past(update.update_id) {
            debug!("Update {} already handled", update.update_id);
            return None;
        }

        if update.chat_id != registration.bot.chat_id.as_str() {
            warn!("Ignoring update {} from unauthorized chat", update.update_id);
            return None;
        }

        let text = update.text?;
        info!("Command from bot {}: {}", index, text.as_str());
        Some(PendingCommand {
            chat_id: update.chat_id,
            text,
        })
    }
}
