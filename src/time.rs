//! File timestamp representations.
//!
//! Backing files carry creation, last-access and last-write timestamps. This module offers the
//! two representations that the platform layer converts between:
//!
//! - [`FileTime`] - a count of 100-nanosecond intervals since 1601-01-01 00:00:00 UTC
//! - [`SystemTimeParts`] - the same instant broken into calendar fields (UTC)
//!
//! Both convert to and from [`std::time::SystemTime`].
//!
//! # Examples
//!
//! ```rust
//! use mapregion::time::{FileTime, SystemTimeParts};
//! use std::time::UNIX_EPOCH;
//!
//! let epoch = FileTime::from(UNIX_EPOCH);
//! assert_eq!(epoch.ticks(), 116_444_736_000_000_000);
//!
//! let parts = SystemTimeParts::from(epoch);
//! assert_eq!((parts.year, parts.month, parts.day), (1970, 1, 1));
//! assert_eq!(parts.day_of_week, 4); // Thursday
//! assert_eq!(parts.to_file_time()?, epoch);
//! # Ok::<(), mapregion::Error>(())
//! ```

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::Result;

const TICKS_PER_SECOND: u64 = 10_000_000;
const TICKS_PER_MILLISECOND: u64 = 10_000;
const TICKS_PER_DAY: u64 = 86_400 * TICKS_PER_SECOND;
/// Ticks between 1601-01-01 and 1970-01-01
const UNIX_EPOCH_TICKS: u64 = 116_444_736_000_000_000;
/// Days between 1601-01-01 and 1970-01-01
const UNIX_EPOCH_DAYS: i64 = 134_774;

/// An instant as 100-nanosecond ticks since 1601-01-01 00:00:00 UTC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct FileTime(u64);

impl FileTime {
    /// Creates a timestamp from a raw tick count.
    #[must_use]
    pub fn from_ticks(ticks: u64) -> Self {
        FileTime(ticks)
    }

    /// The raw tick count.
    #[must_use]
    pub fn ticks(self) -> u64 {
        self.0
    }

    /// Splits the tick count into the high and low 32-bit halves.
    #[must_use]
    pub fn to_parts(self) -> (u32, u32) {
        ((self.0 >> 32) as u32, self.0 as u32)
    }

    /// Joins high and low 32-bit halves into a timestamp.
    #[must_use]
    pub fn from_parts(high: u32, low: u32) -> Self {
        FileTime((u64::from(high) << 32) | u64::from(low))
    }

    /// Converts to a [`SystemTime`].
    #[must_use]
    pub fn to_system_time(self) -> SystemTime {
        let nanos = |ticks: u64| {
            Duration::new(
                ticks / TICKS_PER_SECOND,
                ((ticks % TICKS_PER_SECOND) * 100) as u32,
            )
        };

        if self.0 >= UNIX_EPOCH_TICKS {
            UNIX_EPOCH + nanos(self.0 - UNIX_EPOCH_TICKS)
        } else {
            UNIX_EPOCH - nanos(UNIX_EPOCH_TICKS - self.0)
        }
    }
}

impl From<SystemTime> for FileTime {
    /// Instants before 1601 saturate to zero.
    fn from(time: SystemTime) -> Self {
        let ticks = |duration: Duration| {
            duration.as_secs() * TICKS_PER_SECOND + u64::from(duration.subsec_nanos()) / 100
        };

        match time.duration_since(UNIX_EPOCH) {
            Ok(after) => FileTime(UNIX_EPOCH_TICKS.saturating_add(ticks(after))),
            Err(before) => FileTime(UNIX_EPOCH_TICKS.saturating_sub(ticks(before.duration()))),
        }
    }
}

impl From<FileTime> for SystemTime {
    fn from(time: FileTime) -> Self {
        time.to_system_time()
    }
}

/// An instant broken down into UTC calendar fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SystemTimeParts {
    /// Year, 1601 or later
    pub year: u16,
    /// Month, 1 (January) to 12
    pub month: u8,
    /// Day of the week, 0 (Sunday) to 6; ignored when converting back
    pub day_of_week: u8,
    /// Day of the month, 1 to 31
    pub day: u8,
    /// Hour, 0 to 23
    pub hour: u8,
    /// Minute, 0 to 59
    pub minute: u8,
    /// Second, 0 to 59
    pub second: u8,
    /// Millisecond, 0 to 999
    pub milliseconds: u16,
}

impl SystemTimeParts {
    /// Converts the calendar fields to a [`FileTime`].
    ///
    /// # Errors
    /// Returns [`crate::Error::InvalidPosition`] if any field is out of range, including days
    /// that do not exist in the given month.
    pub fn to_file_time(&self) -> Result<FileTime> {
        if self.year < 1601
            || !(1..=12).contains(&self.month)
            || self.day == 0
            || self.day > days_in_month(i64::from(self.year), self.month)
            || self.hour > 23
            || self.minute > 59
            || self.second > 59
            || self.milliseconds > 999
        {
            return Err(invalid_position!("invalid calendar time {:?}", self));
        }

        let days = days_from_civil(
            i64::from(self.year),
            i64::from(self.month),
            i64::from(self.day),
        ) + UNIX_EPOCH_DAYS;
        let seconds = u64::from(self.hour) * 3600 + u64::from(self.minute) * 60 + u64::from(self.second);

        (days as u64)
            .checked_mul(TICKS_PER_DAY)
            .and_then(|ticks| ticks.checked_add(seconds * TICKS_PER_SECOND))
            .and_then(|ticks| ticks.checked_add(u64::from(self.milliseconds) * TICKS_PER_MILLISECOND))
            .map(FileTime)
            .ok_or_else(|| invalid_position!("calendar time {:?} overflows", self))
    }

    /// The current instant, as reported by the system clock.
    #[must_use]
    pub fn now() -> Self {
        SystemTimeParts::from(FileTime::from(SystemTime::now()))
    }
}

impl From<FileTime> for SystemTimeParts {
    fn from(time: FileTime) -> Self {
        let days = time.0 / TICKS_PER_DAY;
        let rest = time.0 % TICKS_PER_DAY;
        let (year, month, day) = civil_from_days(days as i64 - UNIX_EPOCH_DAYS);

        SystemTimeParts {
            year: year as u16,
            month: month as u8,
            // 1601-01-01 was a Monday
            day_of_week: ((days + 1) % 7) as u8,
            day: day as u8,
            hour: (rest / (3600 * TICKS_PER_SECOND)) as u8,
            minute: (rest / (60 * TICKS_PER_SECOND) % 60) as u8,
            second: (rest / TICKS_PER_SECOND % 60) as u8,
            milliseconds: (rest / TICKS_PER_MILLISECOND % 1000) as u16,
        }
    }
}

/// The three timestamps of a backing file.
///
/// When setting timestamps, `None` leaves the corresponding value unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FileTimes {
    /// Creation time
    pub created: Option<FileTime>,
    /// Last access time
    pub accessed: Option<FileTime>,
    /// Last write time
    pub written: Option<FileTime>,
}

fn is_leap(year: i64) -> bool {
    (year % 4 == 0 && year % 100 != 0) || year % 400 == 0
}

fn days_in_month(year: i64, month: u8) -> u8 {
    match month {
        2 if is_leap(year) => 29,
        2 => 28,
        4 | 6 | 9 | 11 => 30,
        _ => 31,
    }
}

/// Days since 1970-01-01 for a proleptic Gregorian date.
fn days_from_civil(year: i64, month: i64, day: i64) -> i64 {
    let year = if month <= 2 { year - 1 } else { year };
    let era = (if year >= 0 { year } else { year - 399 }) / 400;
    let yoe = year - era * 400;
    let doy = (153 * (if month > 2 { month - 3 } else { month + 9 }) + 2) / 5 + day - 1;
    let doe = yoe * 365 + yoe / 4 - yoe / 100 + doy;
    era * 146_097 + doe - 719_468
}

/// Proleptic Gregorian date for a count of days since 1970-01-01.
fn civil_from_days(days: i64) -> (i64, i64, i64) {
    let z = days + 719_468;
    let era = (if z >= 0 { z } else { z - 146_096 }) / 146_097;
    let doe = z - era * 146_097;
    let yoe = (doe - doe / 1460 + doe / 36_524 - doe / 146_096) / 365;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let day = doy - (153 * mp + 2) / 5 + 1;
    let month = if mp < 10 { mp + 3 } else { mp - 9 };
    let year = yoe + era * 400 + i64::from(month <= 2);
    (year, month, day)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn epoch_of_filetime() {
        let parts = SystemTimeParts::from(FileTime::from_ticks(0));
        assert_eq!((parts.year, parts.month, parts.day), (1601, 1, 1));
        assert_eq!(parts.day_of_week, 1);
        assert_eq!(parts.to_file_time().unwrap().ticks(), 0);
    }

    #[test]
    fn leap_day_roundtrip() {
        let parts = SystemTimeParts {
            year: 2000,
            month: 2,
            day: 29,
            hour: 13,
            minute: 45,
            second: 30,
            milliseconds: 250,
            ..SystemTimeParts::default()
        };
        let time = parts.to_file_time().unwrap();
        let back = SystemTimeParts::from(time);
        assert_eq!(back.day_of_week, 2); // Tuesday
        assert_eq!(SystemTimeParts { day_of_week: 0, ..back }, parts);
    }

    #[test]
    fn invalid_fields() {
        let base = SystemTimeParts {
            year: 2023,
            month: 2,
            day: 29,
            ..SystemTimeParts::default()
        };
        assert!(base.to_file_time().is_err());
        assert!(SystemTimeParts { year: 1600, day: 1, ..base }.to_file_time().is_err());
        assert!(SystemTimeParts { month: 13, day: 1, ..base }.to_file_time().is_err());
        assert!(SystemTimeParts { day: 1, hour: 24, ..base }.to_file_time().is_err());
        assert!(SystemTimeParts { day: 1, milliseconds: 1000, ..base }.to_file_time().is_err());
    }

    #[test]
    fn system_time_conversion() {
        let later = UNIX_EPOCH + Duration::new(1_700_000_000, 123_456_700);
        let time = FileTime::from(later);
        assert_eq!(time.to_system_time(), later);

        let earlier = UNIX_EPOCH - Duration::from_secs(86_400);
        assert_eq!(FileTime::from(earlier).to_system_time(), earlier);
        assert_eq!(
            SystemTimeParts::from(FileTime::from(earlier)).year,
            1969
        );
    }

    #[test]
    fn high_low_parts() {
        let time = FileTime::from_ticks(0x0123_4567_89AB_CDEF);
        assert_eq!(time.to_parts(), (0x0123_4567, 0x89AB_CDEF));
        assert_eq!(FileTime::from_parts(0x0123_4567, 0x89AB_CDEF), time);
    }
}
