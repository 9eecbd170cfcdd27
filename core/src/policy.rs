//! Broadcast alert suppression
//!
//! Alerts fan out to every channel, so they are rate limited: none during
//! the configured quiet hours (local time) and at most one per cooldown.

use crate::config::AlertPolicyConfig;
use crate::mono;

/// Outcome of asking whether an alert may go out now
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AlertDecision {
    Send,
    QuietHours,
    Cooldown { remaining_ms: u32 },
}

#[derive(Debug)]
pub struct AlertGate {
    config: AlertPolicyConfig,
    last_alert: Option<u32>,
}

impl AlertGate {
    pub fn new(config: AlertPolicyConfig) -> Self {
        Self {
            config,
            last_alert: None,
        }
    }

    /// Quiet window membership; handles windows that wrap past midnight
    ///
    /// An empty window (`start == end`) is never quiet.
    pub fn is_quiet_hour(&self, hour: u8) -> bool {
        let (start, end) = (self.config.quiet_start_hour, self.config.quiet_end_hour);
        if start <= end {
            start <= hour && hour < end
        } else {
            hour >= start || hour < end
        }
    }

    /// `local_hour` is `None` while the clock is unsynced, which never
    /// suppresses
    pub fn check(&self, local_hour: Option<u8>, now: u32) -> AlertDecision {
        if local_hour.is_some_and(|h| self.is_quiet_hour(h)) {
            return AlertDecision::QuietHours;
        }
        if let Some(last) = self.last_alert {
            let since = mono::elapsed(now, last);
            if since < self.config.cooldown_ms {
                return AlertDecision::Cooldown {
                    remaining_ms: self.config.cooldown_ms - since,
                };
            }
        }
        AlertDecision::Send
    }

    /// Start the cooldown
    pub fn record(&mut self, now: u32) {
        self.last_alert = Some(now);
    }
}
