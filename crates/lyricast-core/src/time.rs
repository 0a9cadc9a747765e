use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, Sub};

/// Tolerance used when converting fractional seconds to whole frames, so that
/// `10.0 * 30.0` style products never land one frame short.
const FRAME_EPSILON: f64 = 1e-9;

/// Time duration stored as fractional seconds.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Duration {
    seconds: f64,
}

impl Duration {
    /// Create a duration from seconds. Negative and NaN inputs clamp to zero.
    pub fn from_seconds(s: f64) -> Self {
        Self {
            seconds: if s.is_finite() { s.max(0.0) } else { 0.0 },
        }
    }

    /// Create a duration from milliseconds.
    pub fn from_millis(ms: f64) -> Self {
        Self::from_seconds(ms / 1000.0)
    }

    pub fn zero() -> Self {
        Self { seconds: 0.0 }
    }

    pub fn as_seconds(&self) -> f64 {
        self.seconds
    }

    pub fn as_millis(&self) -> f64 {
        self.seconds * 1000.0
    }

    pub fn is_zero(&self) -> bool {
        self.seconds <= 0.0
    }

    /// Number of whole frames that fit in this duration (truncating).
    pub fn frame_count(&self, fps: f64) -> u64 {
        if fps <= 0.0 {
            return 0;
        }
        (self.seconds * fps + FRAME_EPSILON).floor() as u64
    }
}

impl Default for Duration {
    fn default() -> Self {
        Duration::zero()
    }
}

impl Add for Duration {
    type Output = Duration;
    fn add(self, rhs: Duration) -> Duration {
        Duration::from_seconds(self.seconds + rhs.seconds)
    }
}

impl Sub for Duration {
    type Output = Duration;
    fn sub(self, rhs: Duration) -> Duration {
        Duration::from_seconds(self.seconds - rhs.seconds)
    }
}

impl From<std::time::Duration> for Duration {
    fn from(d: std::time::Duration) -> Self {
        Duration::from_seconds(d.as_secs_f64())
    }
}

impl fmt::Display for Duration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.seconds < 1.0 {
            write!(f, "{:.0}ms", self.seconds * 1000.0)
        } else {
            write!(f, "{:.2}s", self.seconds)
        }
    }
}

/// A point in time within the output video.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp {
    seconds: f64,
}

impl Timestamp {
    pub fn from_seconds(s: f64) -> Self {
        Self {
            seconds: if s.is_finite() { s.max(0.0) } else { 0.0 },
        }
    }

    /// Timestamp of frame `index` at `fps`.
    pub fn from_frame(index: u64, fps: f64) -> Self {
        if fps <= 0.0 {
            return Self::zero();
        }
        Self::from_seconds(index as f64 / fps)
    }

    pub fn zero() -> Self {
        Self { seconds: 0.0 }
    }

    pub fn as_seconds(&self) -> f64 {
        self.seconds
    }

    /// Convert to a frame index for a given FPS.
    pub fn to_frame(&self, fps: f64) -> u64 {
        (self.seconds * fps + FRAME_EPSILON).floor() as u64
    }

    /// Compute the duration between two timestamps.
    pub fn duration_to(&self, other: &Timestamp) -> Duration {
        Duration::from_seconds((other.seconds - self.seconds).abs())
    }
}

impl Default for Timestamp {
    fn default() -> Self {
        Timestamp::zero()
    }
}

impl Add<Duration> for Timestamp {
    type Output = Timestamp;
    fn add(self, rhs: Duration) -> Timestamp {
        Timestamp::from_seconds(self.seconds + rhs.as_seconds())
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let total_ms = (self.seconds * 1000.0).round() as u64;
        let hours = total_ms / 3_600_000;
        let minutes = (total_ms % 3_600_000) / 60_000;
        let secs = (total_ms % 60_000) / 1_000;
        let ms = total_ms % 1_000;
        write!(f, "{:02}:{:02}:{:02}.{:03}", hours, minutes, secs, ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duration_from_seconds() {
        let d = Duration::from_seconds(2.5);
        assert!((d.as_seconds() - 2.5).abs() < 0.001);
        assert!((d.as_millis() - 2500.0).abs() < 0.1);
    }

    #[test]
    fn test_duration_clamps_negative_and_nan() {
        assert!(Duration::from_seconds(-3.0).is_zero());
        assert!(Duration::from_seconds(f64::NAN).is_zero());
    }

    #[test]
    fn test_duration_frame_count_truncates() {
        assert_eq!(Duration::from_seconds(10.0).frame_count(30.0), 300);
        assert_eq!(Duration::from_seconds(1.0).frame_count(29.97), 29);
        assert_eq!(Duration::from_seconds(0.1).frame_count(30.0), 3);
        assert_eq!(Duration::from_seconds(5.0).frame_count(0.0), 0);
    }

    #[test]
    fn test_duration_display() {
        assert_eq!(format!("{}", Duration::from_seconds(2.5)), "2.50s");
        assert_eq!(format!("{}", Duration::from_millis(500.0)), "500ms");
    }

    #[test]
    fn test_timestamp_from_frame() {
        let ts = Timestamp::from_frame(75, 30.0);
        assert!((ts.as_seconds() - 2.5).abs() < 1e-9);
        assert_eq!(ts.to_frame(30.0), 75);
    }

    #[test]
    fn test_timestamp_display() {
        let ts = Timestamp::from_seconds(3661.5);
        assert_eq!(format!("{}", ts), "01:01:01.500");
    }

    #[test]
    fn test_timestamp_add_duration() {
        let result = Timestamp::from_seconds(1.0) + Duration::from_seconds(0.5);
        assert!((result.as_seconds() - 1.5).abs() < 0.001);
    }
}
