//! Calendar date/time conversions using O(1) algorithms
//!
//! Implements Howard Hinnant's civil_from_days and days_from_civil algorithms.
//! Reference: http://howardhinnant.github.io/date_algorithms.html
//!
//! On top of those sit the weekday and "Nth Sunday of the month" helpers the
//! US daylight-saving rule needs:
//! - DST starts on the second Sunday of March at 02:00 local time
//! - DST ends on the first Sunday of November at 02:00 local time

/// Seconds in one civil day
const SECONDS_PER_DAY: i64 = 86_400;

/// Check if year is a leap year (Gregorian calendar)
///
/// - Divisible by 4: leap year
/// - EXCEPT divisible by 100: not a leap year
/// - EXCEPT divisible by 400: leap year
pub fn is_leap_year(year: i32) -> bool {
    (year % 4 == 0 && year % 100 != 0) || year % 400 == 0
}

/// Broken-down calendar time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CivilDateTime {
    pub year: i32,
    /// 1-12
    pub month: u8,
    /// 1-31
    pub day: u8,
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
}

impl CivilDateTime {
    /// Build from a count of seconds since 1970-01-01 00:00:00
    ///
    /// The input is whatever time scale the caller wants broken down; pass
    /// UTC seconds plus a zone offset to get local fields.
    pub fn from_unix(secs: i64) -> Self {
        let days = secs.div_euclid(SECONDS_PER_DAY);
        let secs_today = secs.rem_euclid(SECONDS_PER_DAY);

        let (year, month, day) = civil_from_days(days);
        Self {
            year,
            month,
            day,
            hour: (secs_today / 3600) as u8,
            minute: ((secs_today % 3600) / 60) as u8,
            second: (secs_today % 60) as u8,
        }
    }

    /// Inverse of `from_unix`
    pub fn to_unix(&self) -> i64 {
        days_from_civil(self.year, self.month, self.day) * SECONDS_PER_DAY
            + i64::from(self.hour) * 3600
            + i64::from(self.minute) * 60
            + i64::from(self.second)
    }
}

/// Day of week for a civil date, 0 = Sunday .. 6 = Saturday
pub fn weekday(year: i32, month: u8, day: u8) -> u8 {
    // 1970-01-01 was a Thursday
    (days_from_civil(year, month, day) + 4).rem_euclid(7) as u8
}

/// Day of month of the `n`th (1-based) Sunday
///
/// Normalizes through the first of the month: find its weekday, step to the
/// first Sunday, then add whole weeks.
pub fn nth_sunday(year: i32, month: u8, n: u8) -> u8 {
    let first_weekday = weekday(year, month, 1);
    let first_sunday = 1 + (7 - first_weekday) % 7;
    first_sunday + 7 * n.saturating_sub(1)
}

/// US daylight-saving rule evaluated on local standard time
///
/// On a transition day the switch happens at 02:00; any earlier time still
/// belongs to the previous regime.
pub fn is_us_dst(local: &CivilDateTime) -> bool {
    const TRANSITION_HOUR: u8 = 2;

    match local.month {
        1 | 2 | 12 => false,
        4..=10 => true,
        3 => {
            let start = nth_sunday(local.year, 3, 2);
            local.day > start || (local.day == start && local.hour >= TRANSITION_HOUR)
        }
        11 => {
            let end = nth_sunday(local.year, 11, 1);
            local.day < end || (local.day == end && local.hour < TRANSITION_HOUR)
        }
        _ => false,
    }
}

/// Convert days since Unix epoch to civil date (year, month, day)
///
/// Howard Hinnant's civil_from_days algorithm.
fn civil_from_days(days_since_epoch: i64) -> (i32, u8, u8) {
    // Shift epoch from 1970-01-01 to 0000-03-01 so the leap day ends the year
    let z = days_since_epoch + 719_468;

    let era = if z >= 0 { z } else { z - 146_096 } / 146_097;
    let doe = (z - era * 146_097) as u32; // day of era [0, 146096]
    let yoe = (doe - doe / 1460 + doe / 36_524 - doe / 146_096) / 365; // [0, 399]
    let y = i64::from(yoe) + era * 400;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100); // [0, 365]
    let mp = (5 * doy + 2) / 153; // March = 0
    let d = (doy - (153 * mp + 2) / 5 + 1) as u8;
    let m = if mp < 10 { mp + 3 } else { mp - 9 } as u8;

    let year = if m <= 2 { y + 1 } else { y };
    (year as i32, m, d)
}

/// Convert civil date (year, month, day) to days since Unix epoch
///
/// Howard Hinnant's days_from_civil algorithm.
pub fn days_from_civil(year: i32, month: u8, day: u8) -> i64 {
    let y = i64::from(year);
    let m = i64::from(month);
    let d = i64::from(day);

    // March = month 0, February = month 11
    let (y, m) = if m <= 2 { (y - 1, m + 9) } else { (y, m - 3) };

    let era = if y >= 0 { y } else { y - 399 } / 400;
    let yoe = y - era * 400; // [0, 399]
    let doy = (153 * m + 2) / 5 + d - 1; // [0, 365]
    let doe = yoe * 365 + yoe / 4 - yoe / 100 + doy; // [0, 146096]

    era * 146_097 + doe - 719_468
}
