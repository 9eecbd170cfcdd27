//! Hardware RTC holding UTC
//!
//! The RTC keeps counting through resets while VBAT is present, but its
//! contents are only trusted once this boot has written a network time.

use core::cell::RefCell;
use critical_section::Mutex;
use defmt::Format;
use embassy_stm32::rtc::Rtc;

use super::calendar::{datetime_to_unix, unix_to_datetime};

struct Backing {
    rtc: Rtc,
    set_this_boot: bool,
}

static RTC: Mutex<RefCell<Option<Backing>>> = Mutex::new(RefCell::new(None));

#[derive(Debug, Clone, Copy, PartialEq, Eq, Format)]
pub enum RtcError {
    /// `install` has not run
    NotInitialized,
    /// Time outside the 2000-2099 range of the calendar registers
    OutOfRange,
    /// The peripheral rejected the access
    HardwareError,
}

/// Hand the peripheral over; called once from `init`
pub fn install(rtc: Rtc) {
    critical_section::with(|cs| {
        RTC.borrow_ref_mut(cs).replace(Backing {
            rtc,
            set_this_boot: false,
        });
    });
}

fn with_backing<R>(f: impl FnOnce(&mut Backing) -> Result<R, RtcError>) -> Result<R, RtcError> {
    critical_section::with(|cs| match RTC.borrow_ref_mut(cs).as_mut() {
        Some(backing) => f(backing),
        None => Err(RtcError::NotInitialized),
    })
}

pub fn set_unix(secs: u64) -> Result<(), RtcError> {
    let datetime = unix_to_datetime(secs)?;
    with_backing(|b| {
        b.rtc
            .set_datetime(datetime)
            .map_err(|_| RtcError::HardwareError)?;
        b.set_this_boot = true;
        Ok(())
    })
}

/// UTC seconds, or `None` before the first `set_unix` of this boot
pub fn unix() -> Option<u64> {
    with_backing(|b| {
        if !b.set_this_boot {
            return Ok(None);
        }
        let now = b.rtc.now().map_err(|_| RtcError::HardwareError)?;
        Ok(Some(datetime_to_unix(now)))
    })
    .ok()
    .flatten()
}
