//! Wall clock backed by the hardware RTC and set over SNTP
//!
//! ## Architecture
//! - `RtcClock` implements `potty_hal::WallClock` for the connectivity core
//! - `configure` fetches UTC over SNTP and writes it to the RTC
//! - Between syncs, `now_epoch` reads the RTC (LSE, ±20-50ppm)
//! - The RTC always holds UTC; zone offsets are applied by the core
//!
//! The core's two-phase sync calls `configure` twice within a few seconds
//! (standard offset first, then with DST). The second call finds a fresh
//! sync and only logs the offsets.
#![deny(unsafe_code)]
#![deny(warnings)]

mod calendar;
mod rtc;

use rtc::RtcError;

use defmt::{info, warn};
use embassy_net::Stack;
use embassy_time::{Duration, Instant};
use potty_hal::WallClock;

use crate::network::{NetworkError, SntpClient};

impl From<RtcError> for NetworkError {
    fn from(e: RtcError) -> Self {
        match e {
            RtcError::NotInitialized => NetworkError::RtcNotInitialized,
            RtcError::OutOfRange | RtcError::HardwareError => NetworkError::RtcHardwareError,
        }
    }
}

/// Start the RTC on the LSE; called from `init`
pub fn init_time_system(rtc_peripheral: embassy_stm32::Peri<'static, embassy_stm32::peripherals::RTC>) {
    use embassy_stm32::rtc::{Rtc, RtcConfig};

    rtc::install(Rtc::new(rtc_peripheral, RtcConfig::default()));
    info!("Internal RTC initialized with LSE (32.768kHz, ±20-50ppm accuracy)");
}

pub struct RtcClock {
    stack: Stack<'static>,
    sntp: SntpClient,
    last_sync: Option<Instant>,
}

impl RtcClock {
    pub fn new(stack: Stack<'static>, sntp: SntpClient) -> Self {
        Self {
            stack,
            sntp,
            last_sync: None,
        }
    }

    fn synced_recently(&self) -> bool {
        let window = Duration::from_secs(self.sntp.config().min_resync_secs);
        self.last_sync
            .is_some_and(|at| Instant::now().duration_since(at) < window)
    }
}

impl WallClock for RtcClock {
    type Error = NetworkError;

    fn now_epoch(&self) -> u64 {
        rtc::unix().unwrap_or(0)
    }

    async fn configure(&mut self, utc_offset_secs: i32, dst_offset_secs: i32) -> Result<(), NetworkError> {
        info!(
            "Zone offset {}s, DST offset {}s",
            utc_offset_secs, dst_offset_secs
        );
        if self.synced_recently() {
            return Ok(());
        }

        let unix = match self.sntp.fetch(self.stack).await {
            Ok(unix) => unix,
            Err(e) => {
                warn!("SNTP sync failed: {}", e);
                return Err(e);
            }
        };
        rtc::set_unix(unix)?;
        self.last_sync = Some(Instant::now());
        info!("RTC set to {} UTC", unix);
        Ok(())
    }
}
