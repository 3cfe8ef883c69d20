//! Time values
//!
//! Timestamps and durations are both stored as two 32-bit fields
//! (seconds, nanoseconds). Timestamps are unsigned, durations signed.

use std::fmt;
use std::ops::{Add, Sub};

use crate::error::Result;

use super::primitives::{decode_i32, decode_u32};

const NANOS_PER_SEC: u64 = 1_000_000_000;

/// A point in time: seconds and nanoseconds since the epoch
///
/// Ordering is by `secs`, then `nsecs`. Constructors normalize so that
/// `nsecs < 1_000_000_000`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Time {
    pub secs: u32,
    pub nsecs: u32,
}

impl Time {
    pub const ZERO: Time = Time { secs: 0, nsecs: 0 };
    pub const MAX: Time = Time {
        secs: u32::MAX,
        nsecs: (NANOS_PER_SEC - 1) as u32,
    };

    /// Create a time, carrying excess nanoseconds into seconds
    pub fn new(secs: u32, nsecs: u32) -> Self {
        let carry = nsecs / NANOS_PER_SEC as u32;
        Self {
            secs: secs.saturating_add(carry),
            nsecs: nsecs % NANOS_PER_SEC as u32,
        }
    }

    /// Create a time from a total nanosecond count (saturates at `Time::MAX`)
    pub fn from_nanos(nanos: u64) -> Self {
        let secs = nanos / NANOS_PER_SEC;
        if secs > u64::from(u32::MAX) {
            return Time::MAX;
        }
        Self {
            secs: secs as u32,
            nsecs: (nanos % NANOS_PER_SEC) as u32,
        }
    }

    /// Create a time from fractional seconds; negative values clamp to zero
    pub fn from_secs_f64(secs: f64) -> Self {
        if secs <= 0.0 || secs.is_nan() {
            return Time::ZERO;
        }
        Self::from_nanos((secs * NANOS_PER_SEC as f64).round() as u64)
    }

    /// Total nanoseconds since the epoch
    pub fn as_nanos(&self) -> u64 {
        u64::from(self.secs) * NANOS_PER_SEC + u64::from(self.nsecs)
    }

    pub fn as_secs_f64(&self) -> f64 {
        f64::from(self.secs) + f64::from(self.nsecs) / NANOS_PER_SEC as f64
    }
}

impl fmt::Display for Time {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:09}", self.secs, self.nsecs)
    }
}

/// A signed span of time: seconds and nanoseconds
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Duration {
    pub secs: i32,
    pub nsecs: i32,
}

impl Duration {
    pub const ZERO: Duration = Duration { secs: 0, nsecs: 0 };

    /// Create a duration from a signed nanosecond count
    ///
    /// Both fields carry the sign of the total, so `-1.5s` is `(-1, -500_000_000)`.
    pub fn from_nanos(nanos: i64) -> Self {
        let per_sec = NANOS_PER_SEC as i64;
        let secs = (nanos / per_sec).clamp(i64::from(i32::MIN), i64::from(i32::MAX));
        Self {
            secs: secs as i32,
            nsecs: (nanos % per_sec) as i32,
        }
    }

    pub fn as_nanos(&self) -> i64 {
        i64::from(self.secs) * NANOS_PER_SEC as i64 + i64::from(self.nsecs)
    }

    pub fn as_secs_f64(&self) -> f64 {
        self.as_nanos() as f64 / NANOS_PER_SEC as f64
    }
}

impl fmt::Display for Duration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.3}s", self.as_secs_f64())
    }
}

impl Sub for Time {
    type Output = Duration;

    fn sub(self, rhs: Time) -> Duration {
        Duration::from_nanos(self.as_nanos() as i64 - rhs.as_nanos() as i64)
    }
}

impl Add<Duration> for Time {
    type Output = Time;

    fn add(self, rhs: Duration) -> Time {
        let total = self.as_nanos() as i64 + rhs.as_nanos();
        Time::from_nanos(total.max(0) as u64)
    }
}

// =============================================================================
// Encoding
// =============================================================================

/// Encode a time as `[secs: u32][nsecs: u32]`
pub fn encode_time(time: Time) -> [u8; 8] {
    let mut out = [0u8; 8];
    out[0..4].copy_from_slice(&time.secs.to_le_bytes());
    out[4..8].copy_from_slice(&time.nsecs.to_le_bytes());
    out
}

/// Decode a time from the first 8 bytes of `bytes`
pub fn decode_time(bytes: &[u8]) -> Result<Time> {
    let secs = decode_u32(bytes)?;
    let nsecs = decode_u32(bytes.get(4..).unwrap_or(&[]))?;
    Ok(Time { secs, nsecs })
}

/// Encode a duration as `[secs: i32][nsecs: i32]`
pub fn encode_duration(duration: Duration) -> [u8; 8] {
    let mut out = [0u8; 8];
    out[0..4].copy_from_slice(&duration.secs.to_le_bytes());
    out[4..8].copy_from_slice(&duration.nsecs.to_le_bytes());
    out
}

/// Decode a duration from the first 8 bytes of `bytes`
pub fn decode_duration(bytes: &[u8]) -> Result<Duration> {
    let secs = decode_i32(bytes)?;
    let nsecs = decode_i32(bytes.get(4..).unwrap_or(&[]))?;
    Ok(Duration { secs, nsecs })
}
