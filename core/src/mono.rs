//! Wrapping millisecond counter arithmetic
//!
//! Tick time is a free-running `u32` millisecond counter that wraps after
//! ~49.7 days. Deadlines must never be compared with plain `>=`.

/// Milliseconds since `since`, correct across one counter wrap
#[inline]
pub const fn elapsed(now: u32, since: u32) -> u32 {
    now.wrapping_sub(since)
}

/// Whether `now` is at or past `deadline`
///
/// Valid as long as the two values are less than 2^31 ms apart.
#[inline]
pub const fn deadline_reached(now: u32, deadline: u32) -> bool {
    (now.wrapping_sub(deadline) as i32) >= 0
}
