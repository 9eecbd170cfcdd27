//! Error types for connectivity operations
//!
//! None of these are fatal. Callers log them and let the next tick (or the
//! reconnect backoff) act as the retry.

/// Outbound notification failures
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum NotifyError {
    /// Link is not connected; no request was issued
    LinkDown,
    /// Token, chat id, key or device missing; no request was issued
    NotConfigured,
    /// Request URL or payload exceeded its fixed buffer
    TooLong,
    /// Exchange failed before a status line was received
    Transport,
    /// Service answered with a non-success status
    Status(u16),
}

impl core::fmt::Display for NotifyError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::LinkDown => write!(f, "Link down"),
            Self::NotConfigured => write!(f, "Channel not configured"),
            Self::TooLong => write!(f, "Request too long"),
            Self::Transport => write!(f, "Transport error"),
            Self::Status(code) => write!(f, "HTTP status {}", code),
        }
    }
}

impl core::error::Error for NotifyError {}

/// Time synchronization failures
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TimeSyncError {
    /// Clock never produced a plausible date within the poll budget
    ClockNotPlausible,
    /// The clock rejected a configuration request
    ConfigureFailed,
}

impl core::fmt::Display for TimeSyncError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::ClockNotPlausible => write!(f, "Clock not plausible"),
            Self::ConfigureFailed => write!(f, "Time sync configuration failed"),
        }
    }
}

impl core::error::Error for TimeSyncError {}
