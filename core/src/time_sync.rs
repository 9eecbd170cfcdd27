//! Network time synchronization with US daylight-saving correction
//!
//! The DST offset depends on the date, and the date is unknown until the
//! clock has synced once. `TimeSyncService::sync_time` therefore runs in two
//! phases:
//!
//! 1. Configure sync with the standard-time offset only
//! 2. Poll the wall clock (bounded) until it reads a plausible date
//! 3. Evaluate the DST rule on local standard time
//! 4. Reconfigure with `timezone_hours * 3600 + dst_hours * 3600`
//!
//! Step 2 is the one deliberate blocking wait in the tick loop. It only runs
//! once per reconnection and is capped at
//! `poll_interval_ms * max_poll_attempts`.

use embedded_hal_async::delay::DelayNs;
use potty_hal::WallClock;

use crate::calendar::{is_us_dst, CivilDateTime};
use crate::config::TimeSyncConfig;
use crate::error::TimeSyncError;
use crate::fmt::Debug2Format;

/// Epoch seconds after which the clock is trusted (2001-09-09)
pub const PLAUSIBLE_EPOCH: u64 = 1_000_000_000;

/// Whether an epoch reading looks like a real date rather than boot time
pub fn is_plausible_epoch(epoch: u64) -> bool {
    epoch > PLAUSIBLE_EPOCH
}

/// Offsets most recently handed to the clock
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ZoneOffsets {
    pub utc_offset_secs: i32,
    pub dst_offset_secs: i32,
}

impl ZoneOffsets {
    pub const fn total_secs(&self) -> i32 {
        self.utc_offset_secs + self.dst_offset_secs
    }

    pub const fn dst_active(&self) -> bool {
        self.dst_offset_secs != 0
    }
}

/// Drives the two-phase sync and remembers the resulting zone offsets
#[derive(Debug)]
pub struct TimeSyncService {
    config: TimeSyncConfig,
    offsets: Option<ZoneOffsets>,
}

impl TimeSyncService {
    pub fn new(config: TimeSyncConfig) -> Self {
        Self {
            config,
            offsets: None,
        }
    }

    fn standard_offset_secs(&self) -> i32 {
        i32::from(self.config.timezone_hours) * 3600
    }

    /// Compute the DST offset for a UTC instant
    pub fn dst_offset_secs(&self, utc_epoch: u64) -> i32 {
        let local_standard = utc_epoch as i64 + i64::from(self.standard_offset_secs());
        if is_us_dst(&CivilDateTime::from_unix(local_standard)) {
            i32::from(self.config.dst_hours) * 3600
        } else {
            0
        }
    }

    /// Run the full sync; see the module docs for the phases
    pub async fn sync_time<C: WallClock, D: DelayNs>(
        &mut self,
        clock: &mut C,
        delay: &mut D,
    ) -> Result<ZoneOffsets, TimeSyncError> {
        let standard = self.standard_offset_secs();
        info!(
            "Syncing time with {} (UTC offset {} s)",
            self.config.servers.first().copied().unwrap_or("default server"),
            standard
        );
        self.configure(clock, standard, 0).await?;

        let mut epoch = clock.now_epoch();
        let mut attempts = 0u8;
        while !is_plausible_epoch(epoch) {
            if attempts >= self.config.max_poll_attempts {
                warn!(
                    "Clock not plausible after {} polls; keeping standard time",
                    attempts
                );
                return Err(TimeSyncError::ClockNotPlausible);
            }
            delay.delay_ms(self.config.poll_interval_ms).await;
            attempts += 1;
            epoch = clock.now_epoch();
        }

        let dst = self.dst_offset_secs(epoch);
        let offsets = self.configure(clock, standard, dst).await?;
        info!(
            "Time synced: epoch {} DST {} (total offset {} s)",
            epoch,
            offsets.dst_active(),
            offsets.total_secs()
        );
        Ok(offsets)
    }

    async fn configure<C: WallClock>(
        &mut self,
        clock: &mut C,
        utc_offset_secs: i32,
        dst_offset_secs: i32,
    ) -> Result<ZoneOffsets, TimeSyncError> {
        clock
            .configure(utc_offset_secs, dst_offset_secs)
            .await
            .map_err(|e| {
                error!("Time sync configuration failed: {:?}", Debug2Format(&e));
                TimeSyncError::ConfigureFailed
            })?;
        let offsets = ZoneOffsets {
            utc_offset_secs,
            dst_offset_secs,
        };
        self.offsets = Some(offsets);
        Ok(offsets)
    }

    /// Offsets currently applied, if a sync was ever attempted
    pub fn offsets(&self) -> Option<ZoneOffsets> {
        self.offsets
    }

    /// Local broken-down time, once the clock is plausible
    pub fn local_time<C: WallClock>(&self, clock: &C) -> Option<CivilDateTime> {
        let epoch = clock.now_epoch();
        if !is_plausible_epoch(epoch) {
            return None;
        }
        let offset = self
            .offsets
            .map(|o| o.total_secs())
            .unwrap_or_else(|| self.standard_offset_secs());
        Some(CivilDateTime::from_unix(epoch as i64 + i64::from(offset)))
    }
}
