use core::fmt;
use core::ops::{Add, Neg, Sub};

use super::{ConstPackedSizeBytes, MAXSTRAT};

/// **NTP Short Format** - Used in the root delay and root dispersion header fields, where the full
/// resolution and range of the other formats are not justified. It holds a 16-bit seconds field
/// and a 16-bit fraction field.
///
/// The pair is read as one signed 16.16 fixed-point value, as in the NTPv3 header, so a server
/// that received a slightly negative delay sample can still carry it without wrapping.
///
/// ### Layout
///
/// ```ignore
///  0                   1                   2                   3
///  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |          Seconds              |           Fraction            |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// ```
#[derive(Clone, Copy, Debug, Default, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct ShortFormat {
    /// Whole seconds (signed 16-bit).
    pub seconds: i16,
    /// Fractional seconds (16-bit unsigned, 1/65536 s).
    pub fraction: u16,
}

impl ShortFormat {
    /// Build from the raw signed 16.16 fixed-point value.
    pub fn from_fixed(raw: i32) -> Self {
        ShortFormat {
            seconds: (raw >> 16) as i16,
            fraction: raw as u16,
        }
    }

    /// The raw signed 16.16 fixed-point value.
    pub fn to_fixed(self) -> i32 {
        ((self.seconds as i32) << 16) | self.fraction as i32
    }

    /// Convert from seconds, saturating at the representable range.
    pub fn from_seconds_f64(seconds: f64) -> Self {
        let raw = (seconds * 65536.0).clamp(i32::MIN as f64, i32::MAX as f64);
        Self::from_fixed(raw as i32)
    }

    /// The value in seconds.
    pub fn as_seconds_f64(self) -> f64 {
        self.to_fixed() as f64 / 65536.0
    }

    /// Fixed-point addition that saturates instead of wrapping.
    pub fn saturating_add(self, other: ShortFormat) -> ShortFormat {
        Self::from_fixed(self.to_fixed().saturating_add(other.to_fixed()))
    }
}

impl From<TimeOffset> for ShortFormat {
    /// Narrow a 32.32 offset to 16.16, truncating the low fraction bits and
    /// saturating whole seconds outside the `i16` range.
    fn from(offset: TimeOffset) -> Self {
        let raw = (offset.0 >> 16).clamp(i32::MIN as i64, i32::MAX as i64);
        ShortFormat::from_fixed(raw as i32)
    }
}

impl From<ShortFormat> for TimeOffset {
    fn from(short: ShortFormat) -> Self {
        TimeOffset((short.to_fixed() as i64) << 16)
    }
}

/// **NTP Timestamp Format** - Used in packet headers. It includes a 32-bit unsigned seconds
/// field spanning 136 years and a 32-bit fraction field resolving 232 picoseconds.
///
/// The prime epoch is 0 h 1 January 1900 UTC, when all bits are zero. The seconds field wraps
/// in February 2036; see [`crate::unix_time::from_wire`] for how the era is recovered.
///
/// ### Layout
///
/// ```ignore
///  0                   1                   2                   3
///  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |                            Seconds                            |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |                            Fraction                           |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// ```
#[derive(Clone, Copy, Debug, Default, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct TimestampFormat {
    /// Seconds since 1900-01-01 00:00:00 UTC, modulo 2^32.
    pub seconds: u32,
    /// Fractional seconds (32-bit unsigned, resolution of ~232 picoseconds).
    pub fraction: u32,
}

impl TimestampFormat {
    /// The all-zero timestamp, which on the wire means "not set".
    pub const ZERO: Self = TimestampFormat {
        seconds: 0,
        fraction: 0,
    };

    /// Build from the 64-bit big-endian wire value.
    pub fn from_u64(raw: u64) -> Self {
        TimestampFormat {
            seconds: (raw >> 32) as u32,
            fraction: raw as u32,
        }
    }

    /// The 64-bit wire value (seconds in the high word).
    pub fn to_u64(self) -> u64 {
        ((self.seconds as u64) << 32) | self.fraction as u64
    }

    /// Whether this is the unset (all-zero) timestamp.
    pub fn is_zero(self) -> bool {
        self == Self::ZERO
    }

    /// Drop the fractional part, keeping whole seconds only.
    pub fn truncate_fraction(self) -> Self {
        TimestampFormat {
            seconds: self.seconds,
            fraction: 0,
        }
    }

    /// Shift this timestamp by a signed offset, wrapping at the era boundary.
    pub fn wrapping_add_offset(self, offset: TimeOffset) -> Self {
        Self::from_u64(self.to_u64().wrapping_add(offset.0 as u64))
    }
}

impl Sub for TimestampFormat {
    type Output = TimeOffset;

    /// Signed difference between two timestamps.
    ///
    /// The subtraction is done modulo 2^64 and reinterpreted as signed, which
    /// gives the right answer whenever the two timestamps are less than half an
    /// era (~68 years) apart, including across the 2036 wraparound.
    fn sub(self, rhs: TimestampFormat) -> TimeOffset {
        TimeOffset(self.to_u64().wrapping_sub(rhs.to_u64()) as i64)
    }
}

/// A signed time interval in 32.32 fixed-point seconds.
///
/// This is the domain in which timestamp differences, clock offset and
/// round-trip delay are computed, so no precision is lost to floating point
/// before the final result.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct TimeOffset(pub i64);

impl TimeOffset {
    /// A zero-length interval.
    pub const ZERO: Self = TimeOffset(0);

    const SCALE: f64 = 4_294_967_296.0;

    /// Convert from seconds, saturating at the representable range.
    pub fn from_seconds_f64(seconds: f64) -> Self {
        let raw = (seconds * Self::SCALE).clamp(i64::MIN as f64, i64::MAX as f64);
        TimeOffset(raw as i64)
    }

    /// The interval in seconds.
    pub fn as_seconds_f64(self) -> f64 {
        self.0 as f64 / Self::SCALE
    }

    /// Half the sum of two intervals, rounded toward zero.
    ///
    /// The sum is taken in 128 bits, so this cannot overflow.
    pub fn halve_sum(self, other: TimeOffset) -> Self {
        TimeOffset(((self.0 as i128 + other.0 as i128) / 2) as i64)
    }

    /// Whether the interval is negative.
    pub fn is_negative(self) -> bool {
        self.0 < 0
    }
}

impl Add for TimeOffset {
    type Output = TimeOffset;

    fn add(self, rhs: TimeOffset) -> TimeOffset {
        TimeOffset(self.0.wrapping_add(rhs.0))
    }
}

impl Sub for TimeOffset {
    type Output = TimeOffset;

    fn sub(self, rhs: TimeOffset) -> TimeOffset {
        TimeOffset(self.0.wrapping_sub(rhs.0))
    }
}

impl Neg for TimeOffset {
    type Output = TimeOffset;

    fn neg(self) -> TimeOffset {
        TimeOffset(self.0.wrapping_neg())
    }
}

impl fmt::Display for TimeOffset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:+.9}s", self.as_seconds_f64())
    }
}

/// A 2-bit integer warning of an impending leap second to be inserted or deleted in the last
/// minute of the current month, or signalling that the clock is unsynchronized.
///
/// Note that this field is packed in the actual header.
#[repr(u8)]
#[derive(Copy, Clone, Debug, Default, Eq, Hash, PartialEq)]
pub enum LeapIndicator {
    /// No leap required.
    #[default]
    NoWarning = 0,
    /// Last minute of the day has 61 seconds.
    AddOne = 1,
    /// Last minute of the day has 59 seconds.
    SubOne = 2,
    /// Clock unsynchronized (alarm condition).
    Unknown = 3,
}

impl LeapIndicator {
    /// Decode the 2-bit field. Every value is defined, so this cannot fail.
    pub fn from_bits(bits: u8) -> Self {
        match bits & 0b11 {
            0 => LeapIndicator::NoWarning,
            1 => LeapIndicator::AddOne,
            2 => LeapIndicator::SubOne,
            _ => LeapIndicator::Unknown,
        }
    }
}

/// A 3-bit integer representing the NTP version number.
///
/// Note that while this struct is 8-bits, this field is packed to 3 in the actual header. Values
/// outside the known range survive a decode/encode round trip unchanged; validation is the job of
/// the variant codecs.
#[derive(Copy, Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct Version(pub(crate) u8);

impl Version {
    /// NTP version 1 (RFC 1059).
    pub const V1: Self = Version(1);
    /// NTP version 2 (RFC 1119).
    pub const V2: Self = Version(2);
    /// NTP version 3 (RFC 1305).
    pub const V3: Self = Version(3);
    /// NTP version 4 (RFC 5905).
    pub const V4: Self = Version(4);
}

impl Default for Version {
    fn default() -> Self {
        Version::V4
    }
}

/// A 3-bit integer representing the association mode.
///
/// Only the modes this server can take part in are representable. Mode 0 (reserved), 6 (control
/// messages) and 7 (private use) are rejected on decode with an unsupported-mode error rather
/// than mapped to a best guess.
#[repr(u8)]
#[derive(Copy, Clone, Debug, Default, Eq, Hash, PartialEq)]
pub enum Mode {
    /// Symmetric active mode (value 1).
    SymmetricActive = 1,
    /// Symmetric passive mode (value 2).
    SymmetricPassive = 2,
    /// Client mode (value 3).
    #[default]
    Client = 3,
    /// Server mode (value 4).
    Server = 4,
    /// Broadcast mode (value 5).
    Broadcast = 5,
}

impl TryFrom<u8> for Mode {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Mode::SymmetricActive),
            2 => Ok(Mode::SymmetricPassive),
            3 => Ok(Mode::Client),
            4 => Ok(Mode::Server),
            5 => Ok(Mode::Broadcast),
            other => Err(other),
        }
    }
}

/// An 8-bit integer representing the stratum.
///
/// ```ignore
/// +--------+-----------------------------------------------------+
/// | Value  | Meaning                                             |
/// +--------+-----------------------------------------------------+
/// | 0      | unspecified or invalid (kiss-o'-death)              |
/// | 1      | primary server (e.g., equipped with a GPS receiver) |
/// | 2-15   | secondary server (via NTP)                          |
/// | 16     | unsynchronized                                      |
/// | 17-255 | reserved                                            |
/// +--------+-----------------------------------------------------+
/// ```
#[derive(Copy, Clone, Debug, Default, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct Stratum(pub u8);

impl Stratum {
    /// Unspecified or invalid.
    pub const UNSPECIFIED: Self = Stratum(0);
    /// The primary server (e.g. equipped with a GPS receiver).
    pub const PRIMARY: Self = Stratum(1);
    /// The minimum value specifying a secondary server (via NTP).
    pub const SECONDARY_MIN: Self = Stratum(2);
    /// The maximum value specifying a secondary server (via NTP).
    pub const SECONDARY_MAX: Self = Stratum(15);
    /// An unsynchronized stratum.
    pub const UNSYNCHRONIZED: Self = Stratum(MAXSTRAT);
    /// The maximum valid stratum value.
    pub const MAX: Self = Stratum(MAXSTRAT);

    /// The stratum of a server synchronized to a peer at this stratum.
    ///
    /// Capped at [`Stratum::MAX`].
    pub fn downstream(&self) -> Stratum {
        Stratum(self.0.saturating_add(1).min(MAXSTRAT))
    }
}

/// A 32-bit code identifying the particular server or reference clock.
///
/// The interpretation depends on the stratum: a four-character kiss code at stratum 0, an ASCII
/// reference clock code at stratum 1, and the upstream server's IPv4 address at stratum 2 and
/// above. The bytes are carried opaquely; helpers interpret them on request.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
pub struct ReferenceIdentifier(pub [u8; 4]);

impl ReferenceIdentifier {
    /// Uncalibrated local clock.
    pub const LOCL: Self = ReferenceIdentifier(*b"LOCL");
    /// Global Position System.
    pub const GPS: Self = ReferenceIdentifier(*b"GPS\0");

    /// Construct a reference identifier from an IPv4 address.
    ///
    /// For stratum 2+ servers, the reference identifier is the upstream
    /// server's IPv4 address (RFC 5905 Section 7.3).
    pub fn from_ipv4(addr: std::net::Ipv4Addr) -> Self {
        ReferenceIdentifier(addr.octets())
    }

    /// The kiss code carried by a stratum-0 packet, if it is one we act on.
    pub fn kiss_code(&self, stratum: Stratum) -> Option<KissOfDeath> {
        if stratum != Stratum::UNSPECIFIED {
            return None;
        }
        match &self.0 {
            b"DENY" => Some(KissOfDeath::Deny),
            b"RSTR" => Some(KissOfDeath::Rstr),
            b"RATE" => Some(KissOfDeath::Rate),
            _ => None,
        }
    }
}

impl fmt::Display for ReferenceIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.iter().all(|b| b.is_ascii_uppercase() || *b == 0) && self.0[0] != 0 {
            for b in self.0.iter().take_while(|b| **b != 0) {
                write!(f, "{}", *b as char)?;
            }
            Ok(())
        } else {
            write!(f, "{}", std::net::Ipv4Addr::from(self.0))
        }
    }
}

/// Kiss-o'-Death codes: stratum-0 replies whose reference identifier tells the
/// client to back off.
///
/// The kiss codes are encoded in four-character ASCII strings that are left justified and zero
/// filled.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum KissOfDeath {
    /// The client MUST demobilize any associations to that server and stop sending packets to it.
    Deny,
    /// The client MUST demobilize any associations to that server and stop sending packets to it.
    Rstr,
    /// The client MUST immediately reduce its polling interval to that server.
    Rate,
}

/// **Packet Header** of the standard 48-byte variant.
///
/// ```ignore
///  0                   1                   2                   3
///  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |LI | VN  |Mode |    Stratum     |     Poll      |  Precision   |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |                         Root Delay                            |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |                         Root Dispersion                       |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |                          Reference ID                         |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |                                                               |
/// +                     Reference Timestamp (64)                  +
/// |                                                               |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |                                                               |
/// +                      Origin Timestamp (64)                    +
/// |                                                               |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |                                                               |
/// +                      Receive Timestamp (64)                   +
/// |                                                               |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |                                                               |
/// +                      Transmit Timestamp (64)                  +
/// |                                                               |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// ```
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
pub struct Packet {
    /// Leap indicator warning of impending leap second.
    pub leap_indicator: LeapIndicator,
    /// NTP protocol version number.
    pub version: Version,
    /// Association mode (client, server, broadcast, etc.).
    pub mode: Mode,
    /// Stratum level of the time source.
    pub stratum: Stratum,
    /// Maximum interval between successive messages, in log2 seconds.
    pub poll: i8,
    /// Precision of the system clock, in log2 seconds. For instance, -18 corresponds to a
    /// precision of about one microsecond.
    pub precision: i8,
    /// Total round-trip delay to the reference clock.
    pub root_delay: ShortFormat,
    /// Total dispersion to the reference clock.
    pub root_dispersion: ShortFormat,
    /// Reference identifier (clock source or server address).
    pub reference_id: ReferenceIdentifier,
    /// Time when the system clock was last set or corrected.
    pub reference_timestamp: TimestampFormat,
    /// Time at the client when the request departed for the server.
    pub origin_timestamp: TimestampFormat,
    /// Time at the server when the request arrived from the client.
    pub receive_timestamp: TimestampFormat,
    /// Time at the server when the response left for the client.
    pub transmit_timestamp: TimestampFormat,
}

// Size implementations.

impl ConstPackedSizeBytes for ShortFormat {
    const PACKED_SIZE_BYTES: usize = 4;
}

impl ConstPackedSizeBytes for TimestampFormat {
    const PACKED_SIZE_BYTES: usize = 8;
}

impl ConstPackedSizeBytes for ReferenceIdentifier {
    const PACKED_SIZE_BYTES: usize = 4;
}

impl ConstPackedSizeBytes for Packet {
    const PACKED_SIZE_BYTES: usize = 4
        + ShortFormat::PACKED_SIZE_BYTES * 2
        + ReferenceIdentifier::PACKED_SIZE_BYTES
        + TimestampFormat::PACKED_SIZE_BYTES * 4;
}
