//! Connectivity context driven by the firmware's tick loop
//!
//! `Connectivity` owns the link, wall clock, HTTP client and delay together
//! with the four connectivity components. The board calls [`Connectivity::tick`]
//! every 100 ms:
//!
//! 1. the supervisor advances the link state machine
//! 2. a `Connected` event triggers the two-phase time sync
//! 3. while connected, the command poller runs
//!
//! Outbound notifications are plain async calls on the same context.

use embedded_hal_async::delay::DelayNs;
use heapless::{String, Vec};
use potty_hal::{HttpClient, NetworkLink, WallClock};

use crate::config::{Config, LinkConfig, NotifyMeConfig, VoiceConfig, WebhookConfig, MAX_BOTS, TOKEN_MAX};
use crate::dispatcher::NotificationDispatcher;
use crate::error::NotifyError;
use crate::poller::{CommandHandler, CommandPoller};
use crate::policy::{AlertDecision, AlertGate};
use crate::supervisor::{ConnectionSupervisor, LinkEvent, LinkState};
use crate::time_sync::TimeSyncService;

/// Per-channel outcome of a broadcast alert
///
/// Channels that are not configured are `None`. Suppressed alerts carry the
/// reason and no results.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlertReport {
    pub decision: AlertDecision,
    pub bots: Vec<Result<(), NotifyError>, MAX_BOTS>,
    pub voice: Option<Result<(), NotifyError>>,
    pub webhook: Option<Result<(), NotifyError>>,
    pub notify_me: Option<Result<(), NotifyError>>,
}

impl AlertReport {
    fn empty(decision: AlertDecision) -> Self {
        Self {
            decision,
            bots: Vec::new(),
            voice: None,
            webhook: None,
            notify_me: None,
        }
    }

    /// Channels that accepted the alert
    pub fn delivered(&self) -> usize {
        self.bots
            .iter()
            .chain(self.voice.iter())
            .chain(self.webhook.iter())
            .chain(self.notify_me.iter())
            .filter(|r| r.is_ok())
            .count()
    }
}

pub struct Connectivity<L, C, H, D> {
    link: L,
    clock: C,
    http: H,
    delay: D,
    credentials: LinkConfig,
    voice: Option<VoiceConfig>,
    webhook: Option<WebhookConfig>,
    notify_me: Option<NotifyMeConfig>,
    supervisor: ConnectionSupervisor,
    time_sync: TimeSyncService,
    dispatcher: NotificationDispatcher,
    poller: CommandPoller,
    alerts: AlertGate,
}

impl<L, C, H, D> Connectivity<L, C, H, D>
where
    L: NetworkLink,
    C: WallClock,
    H: HttpClient,
    D: DelayNs,
{
    pub fn new(config: Config, link: L, clock: C, http: H, delay: D) -> Self {
        let poller = CommandPoller::new(config.poller, config.notify.bot_api_host, &config.bots);
        Self {
            link,
            clock,
            http,
            delay,
            credentials: config.link,
            voice: config.voice,
            webhook: config.webhook,
            notify_me: config.notify_me,
            supervisor: ConnectionSupervisor::new(config.backoff),
            time_sync: TimeSyncService::new(config.time),
            dispatcher: NotificationDispatcher::new(config.notify),
            poller,
            alerts: AlertGate::new(config.alerts),
        }
    }

    /// Start the first association
    pub fn begin(&mut self, now: u32) {
        self.supervisor
            .begin(&mut self.link, self.credentials.clone(), now);
    }

    /// One scheduler tick; see the module docs for the order of work
    pub async fn tick<F: CommandHandler>(&mut self, now: u32, handler: &mut F) -> LinkEvent {
        let event = self.supervisor.update(&mut self.link, &self.clock, now);

        if event == LinkEvent::Connected {
            if let Err(e) = self
                .time_sync
                .sync_time(&mut self.clock, &mut self.delay)
                .await
            {
                warn!("Time sync failed: {}", e);
            }
        }

        if self.supervisor.is_connected() {
            self.poller.poll(&mut self.http, true, now, handler).await;
        }
        event
    }

    pub async fn send_bot_message(
        &mut self,
        token: &str,
        chat_id: &str,
        text: &str,
    ) -> Result<(), NotifyError> {
        let link_up = self.supervisor.is_connected();
        self.dispatcher
            .send_bot_message(&mut self.http, &mut self.delay, link_up, token, chat_id, text)
            .await
    }

    pub async fn trigger_voice_device(&mut self, token: &str, device: &str) -> Result<(), NotifyError> {
        let link_up = self.supervisor.is_connected();
        self.dispatcher
            .trigger_voice_device(&mut self.http, link_up, token, device)
            .await
    }

    pub async fn send_webhook(&mut self, key: &str, event: &str, value: &str) -> Result<(), NotifyError> {
        let link_up = self.supervisor.is_connected();
        self.dispatcher
            .send_webhook(&mut self.http, link_up, key, event, value)
            .await
    }

    pub async fn send_notify_me(&mut self, access_code: &str, message: &str) -> Result<(), NotifyError> {
        let link_up = self.supervisor.is_connected();
        self.dispatcher
            .send_notify_me(&mut self.http, link_up, access_code, message)
            .await
    }

    /// Answer a chat through the bot registered for it
    ///
    /// Polling is suspended for the duration of the send.
    pub async fn reply(&mut self, chat_id: &str, text: &str, now: u32) -> Result<(), NotifyError> {
        let Some(bot) = self.poller.bot_for_chat(chat_id) else {
            warn!("No bot registered for chat {}", chat_id);
            return Err(NotifyError::NotConfigured);
        };
        let token: String<TOKEN_MAX> = bot.token.clone();

        self.poller.set_reply_pending(true, now);
        let result = self.send_bot_message(&token, chat_id, text).await;
        self.poller.set_reply_pending(false, now);
        result
    }

    /// Send `message` to every configured channel unless the alert policy
    /// suppresses it
    ///
    /// The cooldown starts only when at least one channel accepted the alert.
    pub async fn broadcast_alert(&mut self, message: &str, now: u32) -> AlertReport {
        let decision = self.alerts.check(self.local_hour(), now);
        if decision != AlertDecision::Send {
            info!("Alert suppressed: {}", decision);
            return AlertReport::empty(decision);
        }

        let link_up = self.supervisor.is_connected();
        let mut report = AlertReport::empty(decision);

        for registration in self.poller.bots() {
            let result = self
                .dispatcher
                .send_bot_message(
                    &mut self.http,
                    &mut self.delay,
                    link_up,
                    &registration.bot.token,
                    &registration.bot.chat_id,
                    message,
                )
                .await;
            // At most MAX_BOTS registrations exist
            let _ = report.bots.push(result);
        }

        if let Some(voice) = &self.voice {
            report.voice = Some(
                self.dispatcher
                    .trigger_voice_device(&mut self.http, link_up, &voice.token, &voice.device)
                    .await,
            );
        }
        if let Some(webhook) = &self.webhook {
            report.webhook = Some(
                self.dispatcher
                    .send_webhook(&mut self.http, link_up, &webhook.key, &webhook.event, message)
                    .await,
            );
        }
        if let Some(notify_me) = &self.notify_me {
            report.notify_me = Some(
                self.dispatcher
                    .send_notify_me(&mut self.http, link_up, &notify_me.access_code, message)
                    .await,
            );
        }

        let delivered = report.delivered();
        if delivered > 0 {
            self.alerts.record(now);
        }
        info!("Alert delivered on {} channels", delivered);
        report
    }

    pub fn set_reply_pending(&mut self, pending: bool, now: u32) {
        self.poller.set_reply_pending(pending, now);
    }

    pub fn is_connected(&self) -> bool {
        self.supervisor.is_connected()
    }

    pub fn is_time_synced(&self) -> bool {
        self.supervisor.is_time_synced()
    }

    pub fn link_state(&self) -> LinkState {
        self.supervisor.state()
    }

    /// Local hour of day, once the wall clock is plausible
    pub fn local_hour(&self) -> Option<u8> {
        self.time_sync.local_time(&self.clock).map(|t| t.hour)
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    pub fn link_mut(&mut self) -> &mut L {
        &mut self.link
    }

    pub fn http_mut(&mut self) -> &mut H {
        &mut self.http
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AlertPolicyConfig, BotConfig};
    use crate::testing::{MockClock, MockDelay, MockHttp, MockLink};
    use embassy_futures::block_on;

    // 2024-06-15 12:00:00 UTC, 08:00 local
    const JUNE: u64 = 1_718_452_800;

    type TestConnectivity = Connectivity<MockLink, MockClock, MockHttp, MockDelay>;

    fn config() -> Config {
        let mut config = Config {
            link: LinkConfig::new("kennel", "woof").unwrap(),
            ..Config::default()
        };
        config.add_bot(BotConfig::new("tok", "42").unwrap()).unwrap();
        config
    }

    fn connectivity(config: Config, clock: MockClock) -> TestConnectivity {
        Connectivity::new(
            config,
            MockLink::default(),
            clock,
            MockHttp::default(),
            MockDelay::default(),
        )
    }

    fn ignore_commands() -> impl FnMut(&str, &str) {
        |_: &str, _: &str| {}
    }

    #[test]
    fn test_connect_runs_time_sync_then_polls() {
        let mut c = connectivity(config(), MockClock::synced(JUNE));
        c.begin(0);
        assert_eq!(c.link_state(), LinkState::Connecting);

        let mut handler = ignore_commands();
        assert_eq!(block_on(c.tick(100, &mut handler)), LinkEvent::Idle);
        assert!(c.http_mut().requests.is_empty());

        c.link_mut().connected = true;
        assert_eq!(block_on(c.tick(200, &mut handler)), LinkEvent::Connected);
        assert_eq!(c.clock().configured, [(-18_000, 0), (-18_000, 3_600)]);
        assert_eq!(c.http_mut().requests.len(), 1);
        assert!(c.http_mut().requests[0].url.contains("getUpdates?offset=0"));

        assert_eq!(block_on(c.tick(300, &mut handler)), LinkEvent::TimeSynced);
        assert!(c.is_time_synced());
        assert_eq!(c.local_hour(), Some(8));
    }

    #[test]
    fn test_tick_dispatches_commands() {
        let mut c = connectivity(config(), MockClock::synced(JUNE));
        c.begin(0);
        c.link_mut().connected = true;
        c.http_mut().push_response(
            200,
            r#"{"ok":true,"result":[{"update_id":5,"message":{"chat":{"id":42},"text":"/status"}}]}"#,
        );

        let mut seen = std::vec::Vec::new();
        let mut handler = |chat: &str, text: &str| seen.push(std::format!("{}:{}", chat, text));
        block_on(c.tick(0, &mut handler));
        assert_eq!(seen, ["42:/status"]);
    }

    #[test]
    fn test_sends_require_link() {
        let mut c = connectivity(config(), MockClock::unsynced());
        c.begin(0);
        assert_eq!(
            block_on(c.send_bot_message("tok", "42", "hi")),
            Err(NotifyError::LinkDown)
        );
        assert_eq!(
            block_on(c.send_webhook("k", "e", "v")),
            Err(NotifyError::LinkDown)
        );
        assert!(c.http_mut().requests.is_empty());
    }

    #[test]
    fn test_reply_uses_registered_bot() {
        let mut c = connectivity(config(), MockClock::unsynced());
        c.begin(0);
        c.link_mut().connected = true;
        block_on(c.tick(0, &mut ignore_commands()));

        assert_eq!(block_on(c.reply("42", "Pee: 0h 10m ago", 50)), Ok(()));
        let last = c.http_mut().requests.last().unwrap().url.clone();
        assert!(last.starts_with("https://api.telegram.org/bottok/sendMessage?chat_id=42"));
        // Gate is lowered again so the next poll is not blocked
        assert!(!c.poller.is_reply_pending(60));

        assert_eq!(
            block_on(c.reply("7", "hi", 60)),
            Err(NotifyError::NotConfigured)
        );
    }

    #[test]
    fn test_reply_goes_through_the_bot_of_that_chat() {
        let mut config = config();
        config.add_bot(BotConfig::new("tok2", "43").unwrap()).unwrap();
        let mut c = connectivity(config, MockClock::unsynced());
        c.begin(0);
        c.link_mut().connected = true;
        block_on(c.tick(0, &mut ignore_commands()));

        assert_eq!(block_on(c.reply("43", "Poop recorded", 50)), Ok(()));
        let last = c.http_mut().requests.last().unwrap().url.clone();
        assert!(last.starts_with("https://api.telegram.org/bottok2/sendMessage?chat_id=43"));
    }

    #[test]
    fn test_broadcast_alert_fans_out() {
        let mut config = config();
        config.add_bot(BotConfig::new("tok2", "43").unwrap()).unwrap();
        config.voice = Some(VoiceConfig::new("vt", "Echo").unwrap());
        config.webhook = Some(WebhookConfig::new("key", "dog").unwrap());
        let mut c = connectivity(config, MockClock::unsynced());
        c.begin(0);
        c.link_mut().connected = true;
        block_on(c.tick(0, &mut ignore_commands()));
        let before = c.http_mut().requests.len();

        // Second bot fails; the remaining channels still go out
        c.http_mut().push_response(200, "");
        c.http_mut().push_response(500, "");
        let report = block_on(c.broadcast_alert("Pee overdue", 1_000));

        assert_eq!(report.decision, AlertDecision::Send);
        assert_eq!(report.bots.as_slice(), [Ok(()), Err(NotifyError::Status(500))]);
        assert_eq!(report.voice, Some(Ok(())));
        assert_eq!(report.webhook, Some(Ok(())));
        assert_eq!(report.notify_me, None);
        assert_eq!(report.delivered(), 3);
        assert_eq!(c.http_mut().requests.len() - before, 4);

        // Cooldown now applies
        let again = block_on(c.broadcast_alert("Pee overdue", 2_000));
        assert!(matches!(again.decision, AlertDecision::Cooldown { .. }));
        assert_eq!(c.http_mut().requests.len() - before, 4);
    }

    #[test]
    fn test_failed_broadcast_does_not_start_cooldown() {
        let mut c = connectivity(config(), MockClock::unsynced());
        c.begin(0);
        let report = block_on(c.broadcast_alert("x", 0));
        assert_eq!(report.bots.as_slice(), [Err(NotifyError::LinkDown)]);
        assert_eq!(report.delivered(), 0);
        assert_eq!(
            block_on(c.broadcast_alert("x", 1)).decision,
            AlertDecision::Send
        );
    }

    #[test]
    fn test_broadcast_respects_quiet_hours() {
        let config = Config {
            alerts: AlertPolicyConfig {
                quiet_start_hour: 6,
                quiet_end_hour: 9,
                ..AlertPolicyConfig::default()
            },
            ..config()
        };
        // 08:00 local after sync
        let mut c = connectivity(config, MockClock::synced(JUNE));
        c.begin(0);
        c.link_mut().connected = true;
        block_on(c.tick(0, &mut ignore_commands()));

        let report = block_on(c.broadcast_alert("x", 100));
        assert_eq!(report.decision, AlertDecision::QuietHours);
        assert_eq!(report.delivered(), 0);
    }

    #[test]
    fn test_link_loss_stops_polling() {
        let mut c = connectivity(config(), MockClock::unsynced());
        c.begin(0);
        c.link_mut().connected = true;
        block_on(c.tick(0, &mut ignore_commands()));
        assert_eq!(c.http_mut().requests.len(), 1);

        c.link_mut().connected = false;
        assert_eq!(
            block_on(c.tick(10_000, &mut ignore_commands())),
            LinkEvent::LinkLost
        );
        assert!(!c.is_connected());
        assert_eq!(c.http_mut().requests.len(), 1);
    }
}
