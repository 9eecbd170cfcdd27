//! Wall-clock abstraction

use core::future::Future;

/// Calendar time source kept in step by network time synchronization
pub trait WallClock {
    /// Error reported when a synchronization request cannot be issued
    type Error: core::fmt::Debug;

    /// Current UTC time in seconds since the Unix epoch
    ///
    /// Returns a small (implausible) value until the first successful sync.
    fn now_epoch(&self) -> u64;

    /// Configure network time synchronization
    ///
    /// `utc_offset_secs` and `dst_offset_secs` describe the local zone. The
    /// request may complete in the background; callers observe the result
    /// through `now_epoch`.
    fn configure(
        &mut self,
        utc_offset_secs: i32,
        dst_offset_secs: i32,
    ) -> impl Future<Output = Result<(), Self::Error>>;
}
