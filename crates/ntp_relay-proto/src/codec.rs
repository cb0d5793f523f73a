// Copyright 2026 U.S. Federal Government (in countries where recognized)
// SPDX-License-Identifier: Apache-2.0

//! One decode/encode interface over both header layouts.
//!
//! [`decode`] takes the variant chosen by [`classify`](crate::classify) and
//! produces a [`Frame`]; [`encode`] is its exact inverse, except that legacy
//! timestamps lose their fraction on the wire.

use crate::error::{DecodeError, ParseError};
use crate::protocol::{
    ConstPackedSizeBytes, FromBytes, LEGACY_AUTH_LEN, LegacyPacket, Mode, Packet, TimestampFormat,
    ToBytes, Version, vn_bits,
};
use crate::variant::WireVariant;

/// A decoded datagram of either variant.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Frame {
    /// A 48-octet standard header.
    Standard(Packet),
    /// A 32- or 40-octet legacy header.
    Legacy(LegacyPacket),
}

impl Frame {
    /// The variant this frame encodes as.
    pub fn variant(&self) -> WireVariant {
        match self {
            Frame::Standard(_) => WireVariant::Standard,
            Frame::Legacy(_) => WireVariant::Legacy,
        }
    }

    /// Association mode of the frame.
    pub fn mode(&self) -> Mode {
        match self {
            Frame::Standard(p) => p.mode,
            Frame::Legacy(p) => p.mode,
        }
    }

    /// Protocol version of the frame.
    pub fn version(&self) -> Version {
        match self {
            Frame::Standard(p) => p.version,
            Frame::Legacy(p) => p.version,
        }
    }

    /// Transmit timestamp of the frame.
    pub fn transmit_timestamp(&self) -> TimestampFormat {
        match self {
            Frame::Standard(p) => p.transmit_timestamp,
            Frame::Legacy(p) => p.transmit_timestamp,
        }
    }

    /// Encoded length in octets.
    pub fn packed_len(&self) -> usize {
        match self {
            Frame::Standard(_) => Packet::PACKED_SIZE_BYTES,
            Frame::Legacy(p) => p.packed_len(),
        }
    }
}

fn invalid_length(variant: WireVariant, expected: usize, received: usize) -> DecodeError {
    DecodeError::InvalidLength {
        variant,
        expected,
        received,
    }
}

fn from_parse(variant: WireVariant, received: usize, err: ParseError) -> DecodeError {
    match err {
        ParseError::UnsupportedMode(mode) => DecodeError::UnsupportedMode { mode },
        ParseError::BufferTooShort { needed, .. } => invalid_length(variant, needed, received),
    }
}

/// Decode `bytes` as the given variant.
///
/// The length must be exact: 48 for [`WireVariant::Standard`], 32 or 40 for
/// [`WireVariant::Legacy`]. Checks run in the order length, version, mode, so
/// a datagram with several faults reports the first.
pub fn decode(bytes: &[u8], variant: WireVariant) -> Result<Frame, DecodeError> {
    let len = bytes.len();
    match variant {
        WireVariant::Standard => {
            if len != Packet::PACKED_SIZE_BYTES {
                return Err(invalid_length(variant, Packet::PACKED_SIZE_BYTES, len));
            }
        }
        WireVariant::Legacy => {
            let base = LegacyPacket::PACKED_SIZE_BYTES;
            if len != base && len != base + LEGACY_AUTH_LEN {
                return Err(invalid_length(variant, base, len));
            }
        }
    }

    let version = vn_bits(bytes[0]);
    if !variant.supports_version(version) {
        return Err(DecodeError::UnsupportedVersion { variant, version });
    }

    match variant {
        WireVariant::Standard => Packet::from_bytes(bytes)
            .map(|(packet, _)| Frame::Standard(packet))
            .map_err(|e| from_parse(variant, len, e)),
        WireVariant::Legacy => LegacyPacket::from_bytes(bytes)
            .map(|(packet, _)| Frame::Legacy(packet))
            .map_err(|e| from_parse(variant, len, e)),
    }
}

/// Serialize a frame to its wire form.
pub fn encode(frame: &Frame) -> Vec<u8> {
    let mut buf = vec![0u8; frame.packed_len()];
    // The buffer is sized from the frame itself, so the writers cannot run short.
    let written = match frame {
        Frame::Standard(p) => p.to_bytes(&mut buf),
        Frame::Legacy(p) => p.to_bytes(&mut buf),
    };
    if let Ok(n) = written {
        buf.truncate(n);
    }
    buf
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{LeapIndicator, ReferenceIdentifier, ShortFormat, Stratum};

    fn server_packet() -> Packet {
        Packet {
            leap_indicator: LeapIndicator::NoWarning,
            version: Version::V4,
            mode: Mode::Server,
            stratum: Stratum(2),
            poll: 6,
            precision: -20,
            root_delay: ShortFormat::from_seconds_f64(0.015),
            root_dispersion: ShortFormat::from_seconds_f64(0.002),
            reference_id: ReferenceIdentifier([192, 0, 2, 1]),
            reference_timestamp: TimestampFormat::from_u64(0xE900_0000_0000_0000),
            origin_timestamp: TimestampFormat::from_u64(0xE900_0001_1234_5678),
            receive_timestamp: TimestampFormat::from_u64(0xE900_0002_8000_0000),
            transmit_timestamp: TimestampFormat::from_u64(0xE900_0002_8000_1000),
        }
    }

    #[test]
    fn standard_round_trip() {
        let frame = Frame::Standard(server_packet());
        let bytes = encode(&frame);
        assert_eq!(bytes.len(), 48);
        assert_eq!(decode(&bytes, WireVariant::Standard), Ok(frame));
    }

    #[test]
    fn legacy_round_trip_truncates() {
        let p = server_packet();
        let legacy = LegacyPacket {
            leap_indicator: p.leap_indicator,
            version: Version::V3,
            mode: p.mode,
            stratum: p.stratum,
            poll: p.poll,
            precision: p.precision,
            root_delay: p.root_delay,
            root_dispersion: p.root_dispersion,
            reference_id: p.reference_id,
            reference_timestamp: p.reference_timestamp,
            origin_timestamp: p.origin_timestamp,
            receive_timestamp: p.receive_timestamp,
            transmit_timestamp: p.transmit_timestamp,
            authenticator: Some([9; 8]),
        };
        let bytes = encode(&Frame::Legacy(legacy));
        assert_eq!(bytes.len(), 40);
        let decoded = decode(&bytes, WireVariant::Legacy).unwrap();
        assert_eq!(decoded, Frame::Legacy(legacy.truncated()));
    }

    #[test]
    fn wrong_length_for_variant() {
        let bytes = encode(&Frame::Standard(server_packet()));
        assert_eq!(
            decode(&bytes[..40], WireVariant::Standard),
            Err(DecodeError::InvalidLength {
                variant: WireVariant::Standard,
                expected: 48,
                received: 40
            })
        );
        assert!(matches!(
            decode(&bytes, WireVariant::Legacy),
            Err(DecodeError::InvalidLength { received: 48, .. })
        ));
    }

    #[test]
    fn unsupported_version() {
        let mut bytes = encode(&Frame::Standard(server_packet()));
        bytes[0] = (bytes[0] & !0b0011_1000) | (5 << 3);
        assert_eq!(
            decode(&bytes, WireVariant::Standard),
            Err(DecodeError::UnsupportedVersion {
                variant: WireVariant::Standard,
                version: 5
            })
        );
    }

    #[test]
    fn unsupported_mode() {
        let mut bytes = encode(&Frame::Standard(server_packet()));
        for mode in [0u8, 6, 7] {
            bytes[0] = (bytes[0] & !0b111) | mode;
            assert_eq!(
                decode(&bytes, WireVariant::Standard),
                Err(DecodeError::UnsupportedMode { mode })
            );
        }
    }

    #[test]
    fn empty_input_is_invalid_length() {
        assert!(matches!(
            decode(&[], WireVariant::Standard),
            Err(DecodeError::InvalidLength { received: 0, .. })
        ));
        assert!(matches!(
            decode(&[], WireVariant::Legacy),
            Err(DecodeError::InvalidLength { received: 0, .. })
        ));
    }
}
