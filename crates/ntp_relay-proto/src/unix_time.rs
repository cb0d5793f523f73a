use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::error::RangeError;
use crate::protocol::TimestampFormat;

/// The number of seconds from 1st January 1900 UTC to the start of the Unix epoch.
pub const EPOCH_DELTA: i64 = 2_208_988_800;

/// The number of seconds in one NTP era (2^32 seconds, approximately 136 years).
///
/// Era 0 spans from 1900-01-01 00:00:00 UTC to 2036-02-07 06:28:15 UTC.
/// Era 1 begins at 2036-02-07 06:28:16 UTC.
pub const ERA_SECONDS: i64 = 1 << 32;

const NANOS_PER_SEC: u64 = 1_000_000_000;

/// Describes an instant relative to the `UNIX_EPOCH` - 00:00:00 Coordinated Universal Time (UTC),
/// Thursday, 1 January 1970 in seconds with the fractional part in nanoseconds.
///
/// The representation is floored: `secs` may be negative for moments before 1970, while
/// `subsec_nanos` always counts forward from `secs` and lies in `0..1_000_000_000`. So half a
/// second before the Unix epoch is `secs = -1, subsec_nanos = 500_000_000`.
#[derive(Copy, Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct Instant {
    secs: i64,
    subsec_nanos: u32,
}

impl Instant {
    /// The Unix epoch itself.
    pub const UNIX_EPOCH: Instant = Instant {
        secs: 0,
        subsec_nanos: 0,
    };

    /// Create a new **Instant** from whole seconds and forward nanoseconds.
    ///
    /// Nanosecond values of a second or more carry into `secs`.
    pub fn new(secs: i64, subsec_nanos: u32) -> Instant {
        let carry = (subsec_nanos as u64 / NANOS_PER_SEC) as i64;
        Instant {
            secs: secs.saturating_add(carry),
            subsec_nanos: (subsec_nanos as u64 % NANOS_PER_SEC) as u32,
        }
    }

    /// Uses `std::time::SystemTime::now` to determine the current **Instant**.
    ///
    /// ## Example
    ///
    /// ```
    /// println!("{:?}", ntp_proto::unix_time::Instant::now());
    /// ```
    pub fn now() -> Self {
        SystemTime::now().into()
    }

    /// The "seconds" component of the **Instant**.
    pub fn secs(&self) -> i64 {
        self.secs
    }

    /// The fractional component of the **Instant** in nanoseconds.
    pub fn subsec_nanos(&self) -> u32 {
        self.subsec_nanos
    }

    fn total_nanos(&self) -> i128 {
        self.secs as i128 * NANOS_PER_SEC as i128 + self.subsec_nanos as i128
    }

    fn from_total_nanos(total: i128) -> Instant {
        let secs = total.div_euclid(NANOS_PER_SEC as i128);
        let nanos = total.rem_euclid(NANOS_PER_SEC as i128);
        Instant {
            secs: secs.clamp(i64::MIN as i128, i64::MAX as i128) as i64,
            subsec_nanos: nanos as u32,
        }
    }
}

impl From<SystemTime> for Instant {
    fn from(t: SystemTime) -> Self {
        match t.duration_since(UNIX_EPOCH) {
            Ok(after) => Instant::new(after.as_secs() as i64, after.subsec_nanos()),
            Err(err) => {
                let before: Duration = err.duration();
                let back = Instant::new(before.as_secs() as i64, before.subsec_nanos());
                Instant::from_total_nanos(-back.total_nanos())
            }
        }
    }
}

// Era-aware conversion helpers.

/// Given a raw 32-bit NTP timestamp seconds value and a pivot `Instant`,
/// return the absolute NTP seconds (i64) by selecting the era closest to the pivot.
///
/// The algorithm assumes the timestamp is within half an era (~68 years) of the pivot.
fn era_aware_ntp_seconds(raw_seconds: u32, pivot: &Instant) -> i64 {
    let pivot_ntp = pivot.secs + EPOCH_DELTA;
    let candidate = pivot_ntp.div_euclid(ERA_SECONDS) * ERA_SECONDS + raw_seconds as i64;

    let diff = candidate - pivot_ntp;
    if diff > ERA_SECONDS / 2 {
        candidate - ERA_SECONDS
    } else if diff < -(ERA_SECONDS / 2) {
        candidate + ERA_SECONDS
    } else {
        candidate
    }
}

/// Encode a wall-clock instant as an on-wire NTP timestamp.
///
/// The sub-second part is scaled by 2^32 and truncated, never rounded, so a
/// decoded value is never later than the instant that produced it. Seconds past
/// the end of era 0 wrap modulo 2^32; the era is recovered by [`from_wire`].
///
/// Fails for instants before 1900-01-01, which the format cannot express.
pub fn to_wire(instant: Instant) -> Result<TimestampFormat, RangeError> {
    let ntp_secs = instant.secs + EPOCH_DELTA;
    if ntp_secs < 0 {
        return Err(RangeError { secs: instant.secs });
    }
    let fraction = ((instant.subsec_nanos as u64) << 32) / NANOS_PER_SEC;
    Ok(TimestampFormat {
        seconds: ntp_secs.rem_euclid(ERA_SECONDS) as u32,
        fraction: fraction as u32,
    })
}

/// Decode an on-wire NTP timestamp, choosing the era that places it within
/// half an era of `hint`.
///
/// For live traffic pass [`Instant::now`] as the hint. Nanoseconds are
/// reconstructed as `fraction * 10^9 >> 32`, truncating.
pub fn from_wire(ts: TimestampFormat, hint: &Instant) -> Instant {
    let ntp_secs = era_aware_ntp_seconds(ts.seconds, hint);
    let nanos = (ts.fraction as u64 * NANOS_PER_SEC) >> 32;
    Instant::new(ntp_secs - EPOCH_DELTA, nanos as u32)
}

/// The current time as an on-wire timestamp.
pub fn now_wire() -> Result<TimestampFormat, RangeError> {
    to_wire(Instant::now())
}
