//! Human-readable formatting for file-list rows.

use chrono::{DateTime, TimeZone};
use std::fmt;

const SIZE_UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];

/// Format a byte count with 1024-based units and at most one decimal.
///
/// `0` → `0 B`, `1536` → `1.5 KB`, `2048` → `2 KB`. Sizes beyond the GB
/// range stay in GB.
pub fn format_size(bytes: u64) -> String {
    if bytes == 0 {
        return "0 B".to_string();
    }
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < SIZE_UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    let rounded = format!("{value:.1}");
    let trimmed = rounded.strip_suffix(".0").unwrap_or(&rounded);
    format!("{trimmed} {}", SIZE_UNITS[unit])
}

/// Format a timestamp as `YYYY/MM/DD HH:MM` in the timestamp's own zone.
///
/// Pass `at.with_timezone(&chrono::Local)` to show local wall-clock time.
pub fn format_date<Tz>(at: &DateTime<Tz>) -> String
where
    Tz: TimeZone,
    Tz::Offset: fmt::Display,
{
    at.format("%Y/%m/%d %H:%M").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{FixedOffset, Utc};

    #[test]
    fn sizes() {
        assert_eq!(format_size(0), "0 B");
        assert_eq!(format_size(1), "1 B");
        assert_eq!(format_size(1023), "1023 B");
        assert_eq!(format_size(1024), "1 KB");
        assert_eq!(format_size(1536), "1.5 KB");
        assert_eq!(format_size(1_572_864), "1.5 MB");
        assert_eq!(format_size(3 * 1024 * 1024 * 1024), "3 GB");
        assert_eq!(format_size(2048 * 1024 * 1024 * 1024), "2048 GB");
    }

    #[test]
    fn dates_are_zero_padded() {
        let at = Utc.with_ymd_and_hms(2024, 3, 7, 9, 5, 59).unwrap();
        assert_eq!(format_date(&at), "2024/03/07 09:05");
    }

    #[test]
    fn dates_use_the_given_zone() {
        let at = Utc.with_ymd_and_hms(2024, 12, 31, 20, 30, 0).unwrap();
        let tokyo = FixedOffset::east_opt(9 * 3600).unwrap();
        assert_eq!(format_date(&at.with_timezone(&tokyo)), "2025/01/01 05:30");
    }
}
