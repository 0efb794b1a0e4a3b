//! Time and duration conversion utilities.
//!
//! Saturating conversions for talking to APIs that take integer units, plus
//! the small amount of formatting the front-end needs.

use std::time::Duration;

/// Extension trait for safe Duration conversions.
pub trait DurationExt {
    /// Convert duration to milliseconds as u64, saturating at `u64::MAX`.
    fn as_millis_u64(&self) -> u64;

    /// Convert duration to milliseconds as i64, saturating at `i64::MAX`.
    ///
    /// Used for APIs that take signed offsets (Spotify seek positions).
    fn as_millis_i64(&self) -> i64;

    /// Convert duration to seconds as u32, saturating at `u32::MAX`.
    fn as_secs_u32(&self) -> u32;

    /// This duration as a fraction of `total`, clamped to `[0, 1]`.
    ///
    /// Returns 0.0 when `total` is zero (unknown length).
    fn fraction_of(&self, total: Duration) -> f64;

    /// Format as `m:ss`, the way players show track position.
    fn format_clock(&self) -> String;
}

impl DurationExt for Duration {
    fn as_millis_u64(&self) -> u64 {
        u64::try_from(self.as_millis()).unwrap_or(u64::MAX)
    }

    fn as_millis_i64(&self) -> i64 {
        i64::try_from(self.as_millis()).unwrap_or(i64::MAX)
    }

    fn as_secs_u32(&self) -> u32 {
        u32::try_from(self.as_secs()).unwrap_or(u32::MAX)
    }

    fn fraction_of(&self, total: Duration) -> f64 {
        if total.is_zero() {
            return 0.0;
        }
        (self.as_secs_f64() / total.as_secs_f64()).clamp(0.0, 1.0)
    }

    fn format_clock(&self) -> String {
        let secs = self.as_secs();
        format!("{}:{:02}", secs / 60, secs % 60)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_as_millis_u64() {
        assert_eq!(Duration::from_millis(1234).as_millis_u64(), 1234);
        assert_eq!(Duration::MAX.as_millis_u64(), u64::MAX);
    }

    #[test]
    fn test_as_millis_i64() {
        assert_eq!(Duration::from_millis(5000).as_millis_i64(), 5000);
        assert_eq!(Duration::MAX.as_millis_i64(), i64::MAX);
    }

    #[test]
    fn test_as_secs_u32_large() {
        let duration = Duration::from_secs(u64::from(u32::MAX) + 1);
        assert_eq!(duration.as_secs_u32(), u32::MAX);
    }

    #[test]
    fn test_fraction_of() {
        let total = Duration::from_secs(200);
        assert!((Duration::from_secs(50).fraction_of(total) - 0.25).abs() < f64::EPSILON);
        assert!((Duration::from_secs(500).fraction_of(total) - 1.0).abs() < f64::EPSILON);
        assert!(Duration::from_secs(5).fraction_of(Duration::ZERO).abs() < f64::EPSILON);
    }

    #[test]
    fn test_format_clock() {
        assert_eq!(Duration::ZERO.format_clock(), "0:00");
        assert_eq!(Duration::from_millis(65_900).format_clock(), "1:05");
        assert_eq!(Duration::from_secs(3600).format_clock(), "60:00");
    }
}
