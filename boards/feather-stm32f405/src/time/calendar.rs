//! RTC `DateTime` conversions
//!
//! The calendar arithmetic lives in `potty_core::calendar`; this module only
//! maps between its `CivilDateTime` and the embassy-stm32 register type.
#![deny(unsafe_code)]
#![deny(warnings)]

use embassy_stm32::rtc::{DateTime, DayOfWeek};
use potty_core::calendar::{weekday, CivilDateTime};

use super::rtc::RtcError;

fn day_of_week(sunday_based: u8) -> DayOfWeek {
    match sunday_based {
        0 => DayOfWeek::Sunday,
        1 => DayOfWeek::Monday,
        2 => DayOfWeek::Tuesday,
        3 => DayOfWeek::Wednesday,
        4 => DayOfWeek::Thursday,
        5 => DayOfWeek::Friday,
        _ => DayOfWeek::Saturday,
    }
}

/// Convert a UTC Unix timestamp to an RTC `DateTime`
///
/// The RTC year register covers 2000-2099; anything outside is rejected.
pub fn unix_to_datetime(unix_secs: u64) -> Result<DateTime, RtcError> {
    let civil = CivilDateTime::from_unix(unix_secs as i64);
    let year = u16::try_from(civil.year).map_err(|_| RtcError::OutOfRange)?;
    DateTime::from(
        year,
        civil.month,
        civil.day,
        day_of_week(weekday(civil.year, civil.month, civil.day)),
        civil.hour,
        civil.minute,
        civil.second,
        0, // microsecond
    )
    .map_err(|_| RtcError::OutOfRange)
}

/// Convert an RTC `DateTime` back to UTC Unix seconds
pub fn datetime_to_unix(dt: DateTime) -> u64 {
    let civil = CivilDateTime {
        year: i32::from(dt.year()),
        month: dt.month(),
        day: dt.day(),
        hour: dt.hour(),
        minute: dt.minute(),
        second: dt.second(),
    };
    civil.to_unix().max(0) as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_day_of_week_mapping() {
        // 2024-06-15 was a Saturday
        assert_eq!(day_of_week(weekday(2024, 6, 15)), DayOfWeek::Saturday);
        assert_eq!(day_of_week(0), DayOfWeek::Sunday);
    }
}
