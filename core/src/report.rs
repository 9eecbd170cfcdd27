//! Potty timers and the text status report sent to bot chats

use core::fmt::Write;

use heapless::String;

use crate::time_sync::is_plausible_epoch;

/// The three tracked events
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TimerKind {
    Outside,
    Pee,
    Poop,
}

impl TimerKind {
    pub const ALL: [TimerKind; 3] = [TimerKind::Outside, TimerKind::Pee, TimerKind::Poop];

    pub const fn label(self) -> &'static str {
        match self {
            Self::Outside => "Outside",
            Self::Pee => "Pee",
            Self::Poop => "Poop",
        }
    }

    const fn index(self) -> usize {
        match self {
            Self::Outside => 0,
            Self::Pee => 1,
            Self::Poop => 2,
        }
    }
}

/// Source of timer state for reports and commands
///
/// Times are UTC epoch seconds. Elapsed time is 0 whenever either end of the
/// interval predates a synced clock.
pub trait TimeKeeper {
    fn elapsed_secs(&self, kind: TimerKind) -> u64;
    fn timestamp(&self, kind: TimerKind) -> u64;
    fn set_timestamp(&mut self, kind: TimerKind, epoch: u64);
    fn is_time_synced(&self) -> bool;
}

/// In-memory timers driven by the latest wall-clock reading
#[derive(Debug, Clone, Default)]
pub struct TimerBank {
    stamps: [u64; 3],
    now: u64,
}

impl TimerBank {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed the current wall-clock reading; call before querying
    pub fn observe(&mut self, now_epoch: u64) {
        self.now = now_epoch;
    }

    /// Restart a timer at the last observed time
    pub fn reset(&mut self, kind: TimerKind) {
        let now = self.now;
        self.set_timestamp(kind, now);
    }
}

impl TimeKeeper for TimerBank {
    fn elapsed_secs(&self, kind: TimerKind) -> u64 {
        let start = self.stamps[kind.index()];
        if !is_plausible_epoch(self.now) || !is_plausible_epoch(start) {
            return 0;
        }
        self.now.saturating_sub(start)
    }

    fn timestamp(&self, kind: TimerKind) -> u64 {
        self.stamps[kind.index()]
    }

    fn set_timestamp(&mut self, kind: TimerKind, epoch: u64) {
        self.stamps[kind.index()] = epoch;
    }

    fn is_time_synced(&self) -> bool {
        is_plausible_epoch(self.now)
    }
}

/// `"<h>h <mm>m ago"`; anything under a minute reads `"0h 00m ago"`
pub fn format_elapsed(secs: u64) -> String<32> {
    let minutes = secs / 60;
    let mut out = String::new();
    // 20 digits of u64 plus the fixed text always fits
    let _ = write!(out, "{}h {:02}m ago", minutes / 60, minutes % 60);
    out
}

/// Status report body
pub type Report = String<160>;

/// One line per timer, plus a note while the clock is unsynced
pub fn status_report<K: TimeKeeper>(keeper: &K) -> Report {
    let mut out = Report::new();
    for (i, kind) in TimerKind::ALL.iter().enumerate() {
        if i > 0 {
            let _ = out.push('\n');
        }
        let _ = write!(
            out,
            "{}: {}",
            kind.label(),
            format_elapsed(keeper.elapsed_secs(*kind)).as_str()
        );
    }
    if !keeper.is_time_synced() {
        let _ = out.push_str("\n(clock not synced)");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    const NOW: u64 = 1_718_452_800;

    #[test]
    fn test_format_elapsed() {
        assert_eq!(format_elapsed(0).as_str(), "0h 00m ago");
        assert_eq!(format_elapsed(59).as_str(), "0h 00m ago");
        assert_eq!(format_elapsed(60).as_str(), "0h 01m ago");
        assert_eq!(format_elapsed(2 * 3600 + 5 * 60 + 30).as_str(), "2h 05m ago");
        assert_eq!(format_elapsed(26 * 3600).as_str(), "26h 00m ago");
        assert!(format_elapsed(u64::MAX).as_str().ends_with("m ago"));
    }

    #[test]
    fn test_timer_bank_elapsed() {
        let mut bank = TimerBank::new();
        bank.observe(NOW);
        bank.set_timestamp(TimerKind::Pee, NOW - 1_800);
        assert_eq!(bank.elapsed_secs(TimerKind::Pee), 1_800);
        // Never set
        assert_eq!(bank.elapsed_secs(TimerKind::Poop), 0);

        bank.observe(NOW + 60);
        bank.reset(TimerKind::Outside);
        assert_eq!(bank.timestamp(TimerKind::Outside), NOW + 60);
        assert_eq!(bank.elapsed_secs(TimerKind::Outside), 0);
    }

    #[test]
    fn test_timer_bank_unsynced() {
        let mut bank = TimerBank::new();
        bank.set_timestamp(TimerKind::Pee, NOW);
        bank.observe(42);
        assert!(!bank.is_time_synced());
        assert_eq!(bank.elapsed_secs(TimerKind::Pee), 0);
    }

    #[test]
    fn test_status_report() {
        let mut bank = TimerBank::new();
        bank.observe(NOW);
        bank.set_timestamp(TimerKind::Outside, NOW - 3_900);
        bank.set_timestamp(TimerKind::Pee, NOW - 1_800);
        bank.set_timestamp(TimerKind::Poop, NOW - 3 * 3_600);
        assert_eq!(
            status_report(&bank).as_str(),
            "Outside: 1h 05m ago\nPee: 0h 30m ago\nPoop: 3h 00m ago"
        );
    }

    #[test]
    fn test_status_report_unsynced() {
        let bank = TimerBank::new();
        assert!(status_report(&bank).ends_with("(clock not synced)"));
    }
}
