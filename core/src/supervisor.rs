//! Link supervision with capped exponential backoff
//!
//! `ConnectionSupervisor` is advanced once per tick. It never blocks and
//! never gives up: while the link is down it re-associates on the schedule
//! 2 s, 4 s, 8 s, 16 s, 32 s, 60 s, 60 s, ... and reports what happened as a
//! `LinkEvent` so the scheduler can react (time sync on `Connected`).

use potty_hal::{NetworkLink, WallClock};

use crate::config::{BackoffConfig, LinkConfig};
use crate::mono;
use crate::time_sync::is_plausible_epoch;

/// Link lifecycle as seen by the supervisor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LinkState {
    Disconnected,
    Connecting,
    Connected,
}

/// What a call to `update` observed or did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LinkEvent {
    /// Nothing changed
    Idle,
    /// Link came up this tick; time sync should run now
    Connected,
    /// Link went down this tick
    LinkLost,
    /// Wall clock became plausible for the first time this episode
    TimeSynced,
    /// A re-association was started; the next one is `backoff_ms` away
    ReconnectScheduled { attempt: u32, backoff_ms: u32 },
}

/// Backoff delay after `attempts` consecutive failed attempts
///
/// `min(base_ms * 2^attempts, cap_ms)`, saturating instead of overflowing.
pub fn backoff_ms(attempts: u32, config: &BackoffConfig) -> u32 {
    let factor = 1u32.checked_shl(attempts).unwrap_or(u32::MAX);
    config.base_ms.saturating_mul(factor).min(config.cap_ms)
}

/// Owns link state, the backoff counter and the time-synced flag
#[derive(Debug)]
pub struct ConnectionSupervisor {
    backoff: BackoffConfig,
    credentials: Option<LinkConfig>,
    state: LinkState,
    attempts: u32,
    next_attempt_at: u32,
    time_synced: bool,
}

impl ConnectionSupervisor {
    pub fn new(backoff: BackoffConfig) -> Self {
        Self {
            backoff,
            credentials: None,
            state: LinkState::Disconnected,
            attempts: 0,
            next_attempt_at: 0,
            time_synced: false,
        }
    }

    /// Store credentials and start the first association
    ///
    /// The first retry is held off for `connect_timeout_ms` so a slow initial
    /// association is not torn down immediately.
    pub fn begin<L: NetworkLink>(&mut self, link: &mut L, credentials: LinkConfig, now: u32) {
        info!("Starting connection to {}", credentials.ssid.as_str());
        link.begin(credentials.ssid.as_str(), credentials.password.as_str());
        self.next_attempt_at = now.wrapping_add(credentials.connect_timeout_ms);
        self.credentials = Some(credentials);
        self.state = LinkState::Connecting;
    }

    /// Advance the link state machine; call once per tick
    pub fn update<L: NetworkLink, C: WallClock>(
        &mut self,
        link: &mut L,
        clock: &C,
        now: u32,
    ) -> LinkEvent {
        if link.is_connected() {
            if self.state != LinkState::Connected {
                info!("Link connected (after {} reconnect attempts)", self.attempts);
                self.attempts = 0;
                self.state = LinkState::Connected;
                return LinkEvent::Connected;
            }

            if !self.time_synced && is_plausible_epoch(clock.now_epoch()) {
                self.time_synced = true;
                info!("Wall clock synchronized");
                return LinkEvent::TimeSynced;
            }
            return LinkEvent::Idle;
        }

        if self.state == LinkState::Connected {
            warn!("Link lost");
            self.state = LinkState::Disconnected;
            self.time_synced = false;
            // Keep a pending deadline; only pull it forward to `now` if it already passed
            if mono::deadline_reached(now, self.next_attempt_at) {
                self.next_attempt_at = now;
            }
            return LinkEvent::LinkLost;
        }

        if self.credentials.is_some() && mono::deadline_reached(now, self.next_attempt_at) {
            return self.attempt_reconnect(link, now);
        }
        LinkEvent::Idle
    }

    fn attempt_reconnect<L: NetworkLink>(&mut self, link: &mut L, now: u32) -> LinkEvent {
        let Some(credentials) = self.credentials.as_ref() else {
            return LinkEvent::Idle;
        };

        link.disconnect();
        link.begin(credentials.ssid.as_str(), credentials.password.as_str());

        self.attempts = self.attempts.saturating_add(1);
        self.time_synced = false;
        self.state = LinkState::Connecting;

        let delay = backoff_ms(self.attempts, &self.backoff);
        self.next_attempt_at = now.wrapping_add(delay);
        info!(
            "Reconnect attempt {}, next attempt in {} s",
            self.attempts,
            delay / 1000
        );

        LinkEvent::ReconnectScheduled {
            attempt: self.attempts,
            backoff_ms: delay,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.state == LinkState::Connected
    }

    pub fn is_time_synced(&self) -> bool {
        self.time_synced
    }

    pub fn state(&self) -> LinkState {
        self.state
    }

    /// Consecutive reconnect attempts since the last successful connect
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn next_attempt_at(&self) -> u32 {
        self.next_attempt_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MockClock, MockLink};

    fn started(now: u32) -> (ConnectionSupervisor, MockLink) {
        let mut sup = ConnectionSupervisor::new(BackoffConfig::default());
        let mut link = MockLink::default();
        sup.begin(&mut link, LinkConfig::new("kennel", "woof").unwrap(), now);
        (sup, link)
    }

    #[test]
    fn test_backoff_formula() {
        let config = BackoffConfig::default();
        let expected = [1_000, 2_000, 4_000, 8_000, 16_000, 32_000, 60_000, 60_000];
        for (n, want) in expected.iter().enumerate() {
            assert_eq!(backoff_ms(n as u32, &config), *want);
        }
        // Large counts saturate at the cap instead of overflowing
        assert_eq!(backoff_ms(31, &config), 60_000);
        assert_eq!(backoff_ms(32, &config), 60_000);
        assert_eq!(backoff_ms(u32::MAX, &config), 60_000);
    }

    #[test]
    fn test_backoff_monotonic() {
        let config = BackoffConfig::default();
        let mut prev = 0;
        for n in 0..64 {
            let b = backoff_ms(n, &config);
            assert!(b >= prev);
            assert!(b <= config.cap_ms);
            prev = b;
        }
    }

    #[test]
    fn test_begin_starts_association() {
        let (sup, link) = started(0);
        assert_eq!(link.begins, 1);
        assert_eq!(link.ssid.as_str(), "kennel");
        assert_eq!(sup.state(), LinkState::Connecting);
        assert_eq!(sup.next_attempt_at(), 10_000);
    }

    #[test]
    fn test_no_retry_before_connect_timeout() {
        let (mut sup, mut link) = started(0);
        let clock = MockClock::unsynced();
        assert_eq!(sup.update(&mut link, &clock, 9_999), LinkEvent::Idle);
        assert_eq!(link.begins, 1);
        assert_eq!(
            sup.update(&mut link, &clock, 10_000),
            LinkEvent::ReconnectScheduled {
                attempt: 1,
                backoff_ms: 2_000
            }
        );
        assert_eq!(link.disconnects, 1);
        assert_eq!(link.begins, 2);
    }

    #[test]
    fn test_reconnect_schedule() {
        let (mut sup, mut link) = started(0);
        let clock = MockClock::unsynced();
        let mut now = 10_000;
        let mut delays = [0u32; 8];
        for slot in delays.iter_mut() {
            match sup.update(&mut link, &clock, now) {
                LinkEvent::ReconnectScheduled { backoff_ms, .. } => *slot = backoff_ms,
                other => panic!("unexpected event {:?}", other),
            }
            // Ticks before the deadline do nothing
            assert_eq!(sup.update(&mut link, &clock, now + 1), LinkEvent::Idle);
            now = sup.next_attempt_at();
        }
        assert_eq!(
            delays,
            [2_000, 4_000, 8_000, 16_000, 32_000, 60_000, 60_000, 60_000]
        );
    }

    #[test]
    fn test_connect_resets_backoff() {
        let (mut sup, mut link) = started(0);
        let clock = MockClock::unsynced();
        let mut now = 10_000;
        for _ in 0..4 {
            sup.update(&mut link, &clock, now);
            now = sup.next_attempt_at();
        }
        assert_eq!(sup.attempts(), 4);

        link.connected = true;
        assert_eq!(sup.update(&mut link, &clock, now), LinkEvent::Connected);
        assert_eq!(sup.attempts(), 0);
        assert!(sup.is_connected());

        link.connected = false;
        now += 100_000;
        assert_eq!(sup.update(&mut link, &clock, now), LinkEvent::LinkLost);
        assert_eq!(sup.state(), LinkState::Disconnected);
        assert_eq!(
            sup.update(&mut link, &clock, now),
            LinkEvent::ReconnectScheduled {
                attempt: 1,
                backoff_ms: 2_000
            }
        );
    }

    #[test]
    fn test_first_connect_without_failures_is_a_transition() {
        let (mut sup, mut link) = started(0);
        let clock = MockClock::unsynced();
        link.connected = true;
        assert_eq!(sup.update(&mut link, &clock, 50), LinkEvent::Connected);
        assert_eq!(sup.update(&mut link, &clock, 60), LinkEvent::Idle);
    }

    #[test]
    fn test_time_synced_flag() {
        let (mut sup, mut link) = started(0);
        let clock = MockClock::plausible_after(2);
        link.connected = true;
        assert_eq!(sup.update(&mut link, &clock, 0), LinkEvent::Connected);
        assert!(!sup.is_time_synced());
        assert_eq!(sup.update(&mut link, &clock, 100), LinkEvent::Idle);
        assert_eq!(sup.update(&mut link, &clock, 200), LinkEvent::Idle);
        assert_eq!(sup.update(&mut link, &clock, 300), LinkEvent::TimeSynced);
        assert!(sup.is_time_synced());

        // Probing stops once set
        let reads = clock.reads();
        assert_eq!(sup.update(&mut link, &clock, 400), LinkEvent::Idle);
        assert_eq!(clock.reads(), reads);

        // Disconnect clears it so the next episode resyncs
        link.connected = false;
        sup.update(&mut link, &clock, 500);
        assert!(!sup.is_time_synced());
    }

    #[test]
    fn test_pending_deadline_survives_link_loss() {
        let (mut sup, mut link) = started(0);
        let clock = MockClock::unsynced();
        sup.update(&mut link, &clock, 10_000); // attempt 1, next at 12_000
        link.connected = true;
        sup.update(&mut link, &clock, 10_500);
        link.connected = false;
        assert_eq!(sup.update(&mut link, &clock, 11_000), LinkEvent::LinkLost);
        assert_eq!(sup.next_attempt_at(), 12_000);
        assert_eq!(sup.update(&mut link, &clock, 11_500), LinkEvent::Idle);
        assert!(matches!(
            sup.update(&mut link, &clock, 12_000),
            LinkEvent::ReconnectScheduled { attempt: 1, .. }
        ));
    }

    #[test]
    fn test_deadline_across_counter_wrap() {
        let start = u32::MAX - 5_000;
        let (mut sup, mut link) = started(start);
        let clock = MockClock::unsynced();
        // Deadline wrapped past zero; a huge `now` just before the wrap must not fire
        assert_eq!(sup.update(&mut link, &clock, u32::MAX - 10), LinkEvent::Idle);
        assert!(matches!(
            sup.update(&mut link, &clock, 5_000),
            LinkEvent::ReconnectScheduled { attempt: 1, .. }
        ));
    }

    #[test]
    fn test_update_without_begin_is_idle() {
        let mut sup = ConnectionSupervisor::new(BackoffConfig::default());
        let mut link = MockLink::default();
        let clock = MockClock::unsynced();
        assert_eq!(sup.update(&mut link, &clock, 1_000_000), LinkEvent::Idle);
        assert_eq!(link.begins, 0);
        assert_eq!(sup.state(), LinkState::Disconnected);
    }
}
