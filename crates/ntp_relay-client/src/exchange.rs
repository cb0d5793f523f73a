//! Request building, reply validation and the four-timestamp computation.
//!
//! Everything here is pure: the caller samples T1 before sending and T4 on
//! arrival, and passes both in. The async module and the server's sync loop
//! both drive an exchange through these helpers.

use std::ops::Deref;

use log::debug;
use ntp_proto::protocol::{
    LeapIndicator, Mode, Packet, Stratum, TimeOffset, TimestampFormat, Version,
};
use ntp_proto::{Frame, WireVariant, classify, decode, encode};

use crate::error::ExchangeError;

/// A validated reply together with the four timestamps of its exchange.
///
/// Derefs to the reply [`Packet`], so header fields can be read directly
/// (e.g. `sample.stratum`).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SyncSample {
    /// The upstream server's reply.
    pub packet: Packet,
    /// T1: our transmit time, echoed back as the reply's origin.
    pub t1: TimestampFormat,
    /// T2: upstream receive time.
    pub t2: TimestampFormat,
    /// T3: upstream transmit time.
    pub t3: TimestampFormat,
    /// T4: our receive time.
    pub t4: TimestampFormat,
    /// Clock offset `((T2 - T1) + (T3 - T4)) / 2`. Positive means the local
    /// clock is behind the server.
    pub offset: TimeOffset,
    /// Round-trip delay `(T4 - T1) - (T3 - T2)`.
    pub delay: TimeOffset,
}

impl SyncSample {
    /// Clock offset in seconds.
    pub fn offset_seconds(&self) -> f64 {
        self.offset.as_seconds_f64()
    }

    /// Round-trip delay in seconds.
    pub fn delay_seconds(&self) -> f64 {
        self.delay.as_seconds_f64()
    }
}

impl Deref for SyncSample {
    type Target = Packet;
    fn deref(&self) -> &Self::Target {
        &self.packet
    }
}

/// Compute clock offset and round-trip delay from the four timestamps.
///
/// All arithmetic is 32.32 fixed point. Each difference is taken modulo 2^64
/// and read as signed, so an exchange that straddles the 2036 rollover still
/// yields the right values. The offset goes through
/// [`TimeOffset::halve_sum`] and cannot overflow.
pub fn compute_offset_delay(
    t1: TimestampFormat,
    t2: TimestampFormat,
    t3: TimestampFormat,
    t4: TimestampFormat,
) -> (TimeOffset, TimeOffset) {
    let outbound = t2 - t1;
    let inbound = t3 - t4;
    let offset = outbound.halve_sum(inbound);
    let delay = (t4 - t1) - (t3 - t2);
    (offset, delay)
}

/// Build a version-4 client request stamped with `t1`.
pub fn build_request(t1: TimestampFormat) -> Packet {
    Packet {
        version: Version::V4,
        mode: Mode::Client,
        transmit_timestamp: t1,
        ..Packet::default()
    }
}

/// Serialize a request stamped with `t1`.
pub fn build_request_bytes(t1: TimestampFormat) -> Vec<u8> {
    encode(&Frame::Standard(build_request(t1)))
}

/// Classify and decode a reply datagram. Only the standard layout is accepted.
pub fn parse_reply(bytes: &[u8]) -> Result<Packet, ExchangeError> {
    match classify(bytes)? {
        WireVariant::Standard => match decode(bytes, WireVariant::Standard)? {
            Frame::Standard(packet) => Ok(packet),
            Frame::Legacy(_) => Err(ExchangeError::LegacyReply),
        },
        WireVariant::Legacy => Err(ExchangeError::LegacyReply),
    }
}

/// Check that `reply` answers the request sent at `t1` and compute the sample.
///
/// Checks, in order: mode is Server; origin echoes `t1`; no kiss code;
/// transmit timestamp set; server itself synchronized.
pub fn validate_reply(
    reply: &Packet,
    t1: TimestampFormat,
    t4: TimestampFormat,
) -> Result<SyncSample, ExchangeError> {
    if reply.mode != Mode::Server {
        return Err(ExchangeError::UnexpectedMode {
            mode: reply.mode as u8,
        });
    }

    if reply.origin_timestamp != t1 {
        return Err(ExchangeError::OriginMismatch);
    }

    if reply.stratum == Stratum::UNSPECIFIED {
        return match reply.reference_id.kiss_code(reply.stratum) {
            Some(code) => Err(ExchangeError::KissOfDeath(code)),
            None => Err(ExchangeError::UnsynchronizedServer),
        };
    }

    if reply.transmit_timestamp.is_zero() {
        return Err(ExchangeError::ZeroTransmitTimestamp);
    }

    if reply.leap_indicator == LeapIndicator::Unknown || reply.stratum >= Stratum::MAX {
        return Err(ExchangeError::UnsynchronizedServer);
    }

    let (offset, delay) =
        compute_offset_delay(t1, reply.receive_timestamp, reply.transmit_timestamp, t4);
    debug!(
        "upstream sample: stratum={} offset={} delay={}",
        reply.stratum.0, offset, delay
    );

    Ok(SyncSample {
        packet: *reply,
        t1,
        t2: reply.receive_timestamp,
        t3: reply.transmit_timestamp,
        t4,
        offset,
        delay,
    })
}
