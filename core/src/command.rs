//! Bot command vocabulary and the replies the tracker sends back

use core::fmt::Write;

use heapless::String;

use crate::report::{format_elapsed, status_report, TimeKeeper, TimerBank, TimerKind};

/// Outside-timer age that makes a walk overdue
pub const OVERDUE_SECS: u64 = 6 * 3600;

/// Reply text for one command
pub type Reply = String<192>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Command {
    /// Reply with the status report
    Status,
    /// Restart one timer
    Reset(TimerKind),
    Help,
    Unknown,
}

/// Reply text for `/help` and unknown commands
pub const HELP_TEXT: &str = "Commands:\n/status - time since each event\n/outside - record a trip outside\n/pee - record a pee\n/poop - record a poop";

impl Command {
    /// Parse the first word of a message
    ///
    /// Accepts an optional `@botname` suffix as sent in group chats and
    /// ignores ASCII case. Trailing words are ignored.
    pub fn parse(text: &str) -> Self {
        let word = text.split_whitespace().next().unwrap_or("");
        let Some(word) = word.strip_prefix('/') else {
            return Self::Unknown;
        };
        let name = word.split('@').next().unwrap_or("");

        const TABLE: [(&str, Command); 5] = [
            ("status", Command::Status),
            ("outside", Command::Reset(TimerKind::Outside)),
            ("pee", Command::Reset(TimerKind::Pee)),
            ("poop", Command::Reset(TimerKind::Poop)),
            ("help", Command::Help),
        ];
        TABLE
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, c)| *c)
            .unwrap_or(Self::Unknown)
    }
}

impl Command {
    /// Apply the command to `timers` and build the reply
    ///
    /// Resets restart the timer at the last observed wall-clock time and
    /// quote the interval they ended.
    pub fn execute(self, timers: &mut TimerBank) -> Reply {
        let mut reply = Reply::new();
        match self {
            Self::Status => {
                let _ = reply.push_str(&status_report(&*timers));
            }
            Self::Reset(kind) => {
                let before = timers.elapsed_secs(kind);
                timers.reset(kind);
                let _ = write!(
                    reply,
                    "{} recorded (previous {})",
                    kind.label(),
                    format_elapsed(before).as_str()
                );
                if !timers.is_time_synced() {
                    let _ = reply.push_str("\n(clock not synced)");
                }
            }
            Self::Help | Self::Unknown => {
                let _ = reply.push_str(HELP_TEXT);
            }
        }
        reply
    }
}

/// Whether the dog has been inside for `OVERDUE_SECS` or more
///
/// Never true on an unsynced clock or before the outside timer was first set.
pub fn outside_overdue<K: TimeKeeper>(timers: &K) -> bool {
    timers.is_time_synced()
        && timers.timestamp(TimerKind::Outside) != 0
        && timers.elapsed_secs(TimerKind::Outside) >= OVERDUE_SECS
}
