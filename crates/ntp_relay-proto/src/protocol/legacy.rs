//! The compact header still sent by older SNTP clients.
//!
//! The first 16 octets match the standard header. The four timestamps follow
//! as bare 32-bit seconds with no fraction word, and an optional 8-octet
//! authenticator may trail them:
//!
//! ```ignore
//!  0                   1                   2                   3
//!  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |LI | VN  |Mode |    Stratum     |     Poll      |  Precision   |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |                  Root Delay / Root Dispersion                 |
//! |                         Reference ID                          |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |                    Reference Seconds (32)                     |
//! |                     Origin Seconds (32)                       |
//! |                     Receive Seconds (32)                      |
//! |                    Transmit Seconds (32)                      |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |                 Authenticator (64, optional)                  |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! ```

use byteorder::{BigEndian, ByteOrder};

use crate::error::ParseError;

use super::traits::ensure_len;
use super::{
    ConstPackedSizeBytes, FromBytes, LeapIndicator, Mode, ReferenceIdentifier, ShortFormat,
    Stratum, TimestampFormat, ToBytes, Version, li_bits, mode_bits, pack_li_vn_mode, vn_bits,
};

/// Length of the trailing authenticator.
pub const LEGACY_AUTH_LEN: usize = 8;

/// A decoded legacy-format header.
///
/// Timestamps are held as [`TimestampFormat`] with a zero fraction so the
/// reply path can share code with the standard variant. Any fraction present
/// when encoding is dropped.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
pub struct LegacyPacket {
    /// Leap indicator.
    pub leap_indicator: LeapIndicator,
    /// Protocol version (1 to 3 on the wire).
    pub version: Version,
    /// Association mode.
    pub mode: Mode,
    /// Stratum of the sender.
    pub stratum: Stratum,
    /// Poll interval, log2 seconds.
    pub poll: i8,
    /// Clock precision, log2 seconds.
    pub precision: i8,
    /// Root delay.
    pub root_delay: ShortFormat,
    /// Root dispersion.
    pub root_dispersion: ShortFormat,
    /// Reference identifier.
    pub reference_id: ReferenceIdentifier,
    /// Reference timestamp, whole seconds.
    pub reference_timestamp: TimestampFormat,
    /// Origin timestamp, whole seconds.
    pub origin_timestamp: TimestampFormat,
    /// Receive timestamp, whole seconds.
    pub receive_timestamp: TimestampFormat,
    /// Transmit timestamp, whole seconds.
    pub transmit_timestamp: TimestampFormat,
    /// Opaque trailing authenticator. Carried through untouched, never checked.
    pub authenticator: Option<[u8; LEGACY_AUTH_LEN]>,
}

impl LegacyPacket {
    /// Encoded length of this packet: 32 octets, or 40 with an authenticator.
    pub fn packed_len(&self) -> usize {
        match self.authenticator {
            Some(_) => Self::PACKED_SIZE_BYTES + LEGACY_AUTH_LEN,
            None => Self::PACKED_SIZE_BYTES,
        }
    }

    /// The same packet with every timestamp fraction cleared, which is what
    /// survives an encode/decode round trip.
    pub fn truncated(mut self) -> Self {
        self.reference_timestamp = self.reference_timestamp.truncate_fraction();
        self.origin_timestamp = self.origin_timestamp.truncate_fraction();
        self.receive_timestamp = self.receive_timestamp.truncate_fraction();
        self.transmit_timestamp = self.transmit_timestamp.truncate_fraction();
        self
    }
}

/// The base length, without authenticator.
impl ConstPackedSizeBytes for LegacyPacket {
    const PACKED_SIZE_BYTES: usize = 32;
}

fn read_seconds(buf: &[u8]) -> TimestampFormat {
    TimestampFormat {
        seconds: BigEndian::read_u32(buf),
        fraction: 0,
    }
}

impl FromBytes for LegacyPacket {
    fn from_bytes(buf: &[u8]) -> Result<(Self, usize), ParseError> {
        ensure_len(buf, Self::PACKED_SIZE_BYTES)?;

        let version = Version(vn_bits(buf[0]));
        let mode = match (version.0, mode_bits(buf[0])) {
            // Version 1 predates the mode field; a zero there is a plain query.
            (1, 0) => Mode::Client,
            (_, raw) => Mode::try_from(raw).map_err(ParseError::UnsupportedMode)?,
        };

        let (root_delay, _) = ShortFormat::from_bytes(&buf[4..8])?;
        let (root_dispersion, _) = ShortFormat::from_bytes(&buf[8..12])?;
        let (reference_id, _) = ReferenceIdentifier::from_bytes(&buf[12..16])?;

        let (authenticator, consumed) = if buf.len() >= Self::PACKED_SIZE_BYTES + LEGACY_AUTH_LEN
        {
            let mut auth = [0u8; LEGACY_AUTH_LEN];
            auth.copy_from_slice(&buf[32..40]);
            (Some(auth), Self::PACKED_SIZE_BYTES + LEGACY_AUTH_LEN)
        } else {
            (None, Self::PACKED_SIZE_BYTES)
        };

        Ok((
            LegacyPacket {
                leap_indicator: LeapIndicator::from_bits(li_bits(buf[0])),
                version,
                mode,
                stratum: Stratum(buf[1]),
                poll: buf[2] as i8,
                precision: buf[3] as i8,
                root_delay,
                root_dispersion,
                reference_id,
                reference_timestamp: read_seconds(&buf[16..20]),
                origin_timestamp: read_seconds(&buf[20..24]),
                receive_timestamp: read_seconds(&buf[24..28]),
                transmit_timestamp: read_seconds(&buf[28..32]),
                authenticator,
            },
            consumed,
        ))
    }
}

impl ToBytes for LegacyPacket {
    fn to_bytes(&self, buf: &mut [u8]) -> Result<usize, ParseError> {
        let len = self.packed_len();
        ensure_len(buf, len)?;

        buf[0] = pack_li_vn_mode(self.leap_indicator as u8, self.version.0, self.mode as u8);
        buf[1] = self.stratum.0;
        buf[2] = self.poll as u8;
        buf[3] = self.precision as u8;
        self.root_delay.to_bytes(&mut buf[4..8])?;
        self.root_dispersion.to_bytes(&mut buf[8..12])?;
        self.reference_id.to_bytes(&mut buf[12..16])?;
        BigEndian::write_u32(&mut buf[16..20], self.reference_timestamp.seconds);
        BigEndian::write_u32(&mut buf[20..24], self.origin_timestamp.seconds);
        BigEndian::write_u32(&mut buf[24..28], self.receive_timestamp.seconds);
        BigEndian::write_u32(&mut buf[28..32], self.transmit_timestamp.seconds);
        if let Some(auth) = &self.authenticator {
            buf[32..40].copy_from_slice(auth);
        }

        Ok(len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request_bytes(with_auth: bool) -> Vec<u8> {
        let mut buf = vec![0u8; if with_auth { 40 } else { 32 }];
        buf[0] = 0x1B; // VN 3, client
        buf[28..32].copy_from_slice(&0xE900_0010u32.to_be_bytes());
        if with_auth {
            buf[32..40].copy_from_slice(b"\x01\x02\x03\x04\x05\x06\x07\x08");
        }
        buf
    }

    #[test]
    fn decode_without_authenticator() {
        let (packet, n) = LegacyPacket::from_bytes(&request_bytes(false)).unwrap();
        assert_eq!(n, 32);
        assert_eq!(packet.version, Version::V3);
        assert_eq!(packet.mode, Mode::Client);
        assert_eq!(packet.transmit_timestamp.seconds, 0xE900_0010);
        assert_eq!(packet.authenticator, None);
    }

    #[test]
    fn authenticator_passes_through() {
        let input = request_bytes(true);
        let (packet, n) = LegacyPacket::from_bytes(&input).unwrap();
        assert_eq!(n, 40);
        assert_eq!(packet.authenticator, Some(*b"\x01\x02\x03\x04\x05\x06\x07\x08"));

        let mut out = [0u8; 40];
        assert_eq!(packet.to_bytes(&mut out).unwrap(), 40);
        assert_eq!(&out[..], &input[..]);
    }

    #[test]
    fn version_one_mode_zero_is_client() {
        let mut input = request_bytes(false);
        input[0] = 0x08; // VN 1, mode 0
        let (packet, _) = LegacyPacket::from_bytes(&input).unwrap();
        assert_eq!(packet.mode, Mode::Client);
        assert_eq!(packet.version, Version::V1);
    }

    #[test]
    fn mode_zero_rejected_after_version_one() {
        let mut input = request_bytes(false);
        input[0] = 0x10; // VN 2, mode 0
        assert_eq!(
            LegacyPacket::from_bytes(&input).unwrap_err(),
            ParseError::UnsupportedMode(0)
        );
    }

    #[test]
    fn encode_drops_fractions() {
        let packet = LegacyPacket {
            transmit_timestamp: TimestampFormat {
                seconds: 7,
                fraction: 0xFFFF_FFFF,
            },
            ..Default::default()
        };
        let mut out = [0u8; 32];
        packet.to_bytes(&mut out).unwrap();
        let (decoded, _) = LegacyPacket::from_bytes(&out).unwrap();
        assert_eq!(decoded, packet.truncated());
        assert_eq!(decoded.transmit_timestamp.fraction, 0);
    }
}
