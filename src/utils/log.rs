//! Leveled logging to stderr.
//!
//! The VM emits only a handful of diagnostic lines, so the logger stays
//! dependency-free: a static level threshold, a hand-built timestamp, and
//! macros as the front door.

use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Log level for filtering messages.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Level {
    Info = 1,
    Warn = 2,
    Error = 3,
}

impl Level {
    const fn as_str(self) -> &'static str {
        match self {
            Level::Info => "INFO",
            Level::Warn => "WARN",
            Level::Error => "ERROR",
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

static THRESHOLD: AtomicU8 = AtomicU8::new(Level::Info as u8);

/// Sets the minimum level that gets written.
pub fn init(level: Level) {
    THRESHOLD.store(level as u8, Ordering::Relaxed);
}

/// Writes one timestamped line to stderr if `level` passes the threshold.
pub fn log(level: Level, message: &str) {
    if (level as u8) < THRESHOLD.load(Ordering::Relaxed) {
        return;
    }
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();
    eprintln!("{} [{:5}] {}", timestamp(now), level, message);
}

/// Formats a Unix timestamp as `YYYY-MM-DD HH:MM:SS.mmm`.
fn timestamp(now: Duration) -> String {
    let secs = now.as_secs();
    let (year, month, day) = civil_date(secs / 86_400);
    let in_day = secs % 86_400;
    format!(
        "{:04}-{:02}-{:02} {:02}:{:02}:{:02}.{:03}",
        year,
        month,
        day,
        in_day / 3600,
        in_day % 3600 / 60,
        in_day % 60,
        now.subsec_millis()
    )
}

/// Resolves days since the Unix epoch to (year, month, day).
///
/// Walks whole years, then months, forward from 1970. Log volume is tiny,
/// so the linear scan is not worth trading for a closed-form conversion.
fn civil_date(days: u64) -> (u64, u64, u64) {
    let mut year = 1970;
    let mut remaining = days;
    loop {
        let year_len = if is_leap_year(year) { 366 } else { 365 };
        if remaining < year_len {
            break;
        }
        remaining -= year_len;
        year += 1;
    }

    // December absorbs whatever the first eleven months leave behind.
    let mut month = 0;
    while month < 11 {
        let len = month_len(year, month);
        if remaining < len {
            break;
        }
        remaining -= len;
        month += 1;
    }

    (year, month as u64 + 1, remaining + 1)
}

/// Days in the given zero-based month.
fn month_len(year: u64, month: usize) -> u64 {
    const LENGTHS: [u64; 12] = [31, 28, 31, 30, 31, 30, 31, 31, 30, 31, 30, 31];
    if month == 1 && is_leap_year(year) {
        29
    } else {
        LENGTHS[month]
    }
}

fn is_leap_year(year: u64) -> bool {
    year % 4 == 0 && (year % 100 != 0 || year % 400 == 0)
}

/// Logs an info-level message.
#[macro_export]
macro_rules! info {
    ($($arg:tt)*) => {
        $crate::utils::log::log($crate::utils::log::Level::Info, &format!($($arg)*))
    };
}

/// Logs a warning-level message.
#[macro_export]
macro_rules! warn {
    ($($arg:tt)*) => {
        $crate::utils::log::log($crate::utils::log::Level::Warn, &format!($($arg)*))
    };
}

/// Logs an error-level message.
#[macro_export]
macro_rules! error {
    ($($arg:tt)*) => {
        $crate::utils::log::log($crate::utils::log::Level::Error, &format!($($arg)*))
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_ordering() {
        assert!(Level::Info < Level::Warn);
        assert!(Level::Warn < Level::Error);
    }

    #[test]
    fn level_display() {
        assert_eq!(format!("{}", Level::Info), "INFO");
        assert_eq!(format!("{}", Level::Warn), "WARN");
        assert_eq!(format!("{}", Level::Error), "ERROR");
    }

    #[test]
    fn leap_years() {
        assert!(is_leap_year(2024));
        assert!(is_leap_year(2000));
        assert!(!is_leap_year(2023));
        assert!(!is_leap_year(1900));
    }

    #[test]
    fn civil_date_epoch() {
        assert_eq!(civil_date(0), (1970, 1, 1));
    }

    #[test]
    fn civil_date_year_boundary() {
        assert_eq!(civil_date(364), (1970, 12, 31));
        assert_eq!(civil_date(365), (1971, 1, 1));
    }

    #[test]
    fn civil_date_known_day() {
        // 2024-01-01 is 19723 days after the epoch
        assert_eq!(civil_date(19723), (2024, 1, 1));
    }

    #[test]
    fn civil_date_leap_day() {
        // 2024-02-29 is 19782 days after the epoch
        assert_eq!(civil_date(19782), (2024, 2, 29));
    }

    #[test]
    fn timestamp_formats_the_last_instant_of_a_day() {
        let now = Duration::from_millis(86_399_999);
        assert_eq!(timestamp(now), "1970-01-01 23:59:59.999");
    }

    #[test]
    fn init_sets_the_threshold() {
        init(Level::Error);
        assert_eq!(THRESHOLD.load(Ordering::Relaxed), Level::Error as u8);

        // Reset to default for other tests
        init(Level::Info);
    }
}
