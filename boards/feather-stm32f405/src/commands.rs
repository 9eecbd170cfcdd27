#![deny(unsafe_code)]
#![deny(warnings)]
//! Bot command handling
//!
//! The poller hands commands to `CommandInbox` while it still holds the
//! HTTP client, so replies cannot be sent from inside the callback. The
//! inbox queues them and `answer_pending` replies once the tick is done.

use defmt::{info, warn};
use embedded_hal_async::delay::DelayNs;
use heapless::{String, Vec};
use potty_core::config::CHAT_ID_MAX;
use potty_core::{Command, CommandHandler, Connectivity, TimerBank};
use potty_hal::{HttpClient, NetworkLink, WallClock};

/// Commands accepted per tick; extras are dropped with a warning
const INBOX_DEPTH: usize = 4;

#[derive(Default)]
pub struct CommandInbox {
    pending: Vec<(String<CHAT_ID_MAX>, Command), INBOX_DEPTH>,
}

impl CommandHandler for CommandInbox {
    fn on_command(&mut self, chat_id: &str, text: &str) {
        let command = Command::parse(text);
        info!("Command {} from chat {}", command, chat_id);
        let Ok(chat) = String::try_from(chat_id) else {
            warn!("Chat id too long: {}", chat_id);
            return;
        };
        if self.pending.push((chat, command)).is_err() {
            warn!("Command inbox full, dropping {}", command);
        }
    }
}

impl CommandInbox {
    /// Apply and answer every queued command
    pub async fn answer_pending<L, C, H, D>(
        &mut self,
        conn: &mut Connectivity<L, C, H, D>,
        timers: &mut TimerBank,
        now: u32,
    ) where
        L: NetworkLink,
        C: WallClock,
        H: HttpClient,
        D: DelayNs,
    {
        for (chat_id, command) in core::mem::take(&mut self.pending) {
            let reply = command.execute(timers);
            if let Err(e) = conn.reply(&chat_id, &reply, now).await {
                warn!("Reply to {} failed: {}", chat_id.as_str(), e);
            }
        }
    }
}
