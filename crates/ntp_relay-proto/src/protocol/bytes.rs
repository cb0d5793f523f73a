use byteorder::{BigEndian, ByteOrder};

use crate::error::ParseError;

use super::traits::ensure_len;
use super::{
    ConstPackedSizeBytes, FromBytes, LeapIndicator, Mode, Packet, ReferenceIdentifier,
    ShortFormat, Stratum, TimestampFormat, ToBytes, Version, li_bits, mode_bits,
    pack_li_vn_mode, vn_bits,
};

impl FromBytes for ShortFormat {
    fn from_bytes(buf: &[u8]) -> Result<(Self, usize), ParseError> {
        ensure_len(buf, Self::PACKED_SIZE_BYTES)?;
        let seconds = BigEndian::read_i16(&buf[0..2]);
        let fraction = BigEndian::read_u16(&buf[2..4]);
        Ok((ShortFormat { seconds, fraction }, Self::PACKED_SIZE_BYTES))
    }
}

impl FromBytes for TimestampFormat {
    fn from_bytes(buf: &[u8]) -> Result<(Self, usize), ParseError> {
        ensure_len(buf, Self::PACKED_SIZE_BYTES)?;
        let raw = BigEndian::read_u64(&buf[..8]);
        Ok((TimestampFormat::from_u64(raw), Self::PACKED_SIZE_BYTES))
    }
}

impl FromBytes for ReferenceIdentifier {
    fn from_bytes(buf: &[u8]) -> Result<(Self, usize), ParseError> {
        ensure_len(buf, Self::PACKED_SIZE_BYTES)?;
        Ok((
            ReferenceIdentifier([buf[0], buf[1], buf[2], buf[3]]),
            Self::PACKED_SIZE_BYTES,
        ))
    }
}

impl FromBytes for (LeapIndicator, Version, Mode) {
    fn from_bytes(buf: &[u8]) -> Result<(Self, usize), ParseError> {
        ensure_len(buf, 1)?;
        let li = LeapIndicator::from_bits(li_bits(buf[0]));
        let vn = Version(vn_bits(buf[0]));
        let mode = Mode::try_from(mode_bits(buf[0])).map_err(ParseError::UnsupportedMode)?;
        Ok(((li, vn, mode), 1))
    }
}

impl FromBytes for Packet {
    fn from_bytes(buf: &[u8]) -> Result<(Self, usize), ParseError> {
        ensure_len(buf, Self::PACKED_SIZE_BYTES)?;

        let ((leap_indicator, version, mode), mut offset) =
            <(LeapIndicator, Version, Mode)>::from_bytes(buf)?;

        let stratum = Stratum(buf[offset]);
        let poll = buf[offset + 1] as i8;
        let precision = buf[offset + 2] as i8;
        offset += 3;

        let (root_delay, n) = ShortFormat::from_bytes(&buf[offset..])?;
        offset += n;
        let (root_dispersion, n) = ShortFormat::from_bytes(&buf[offset..])?;
        offset += n;
        let (reference_id, n) = ReferenceIdentifier::from_bytes(&buf[offset..])?;
        offset += n;
        let (reference_timestamp, n) = TimestampFormat::from_bytes(&buf[offset..])?;
        offset += n;
        let (origin_timestamp, n) = TimestampFormat::from_bytes(&buf[offset..])?;
        offset += n;
        let (receive_timestamp, n) = TimestampFormat::from_bytes(&buf[offset..])?;
        offset += n;
        let (transmit_timestamp, n) = TimestampFormat::from_bytes(&buf[offset..])?;
        offset += n;

        Ok((
            Packet {
                leap_indicator,
                version,
                mode,
                stratum,
                poll,
                precision,
                root_delay,
                root_dispersion,
                reference_id,
                reference_timestamp,
                origin_timestamp,
                receive_timestamp,
                transmit_timestamp,
            },
            offset,
        ))
    }
}

// Writers.

impl ToBytes for ShortFormat {
    fn to_bytes(&self, buf: &mut [u8]) -> Result<usize, ParseError> {
        ensure_len(buf, Self::PACKED_SIZE_BYTES)?;
        BigEndian::write_i16(&mut buf[0..2], self.seconds);
        BigEndian::write_u16(&mut buf[2..4], self.fraction);
        Ok(Self::PACKED_SIZE_BYTES)
    }
}

impl ToBytes for TimestampFormat {
    fn to_bytes(&self, buf: &mut [u8]) -> Result<usize, ParseError> {
        ensure_len(buf, Self::PACKED_SIZE_BYTES)?;
        BigEndian::write_u64(&mut buf[..8], self.to_u64());
        Ok(Self::PACKED_SIZE_BYTES)
    }
}

impl ToBytes for ReferenceIdentifier {
    fn to_bytes(&self, buf: &mut [u8]) -> Result<usize, ParseError> {
        ensure_len(buf, Self::PACKED_SIZE_BYTES)?;
        buf[..4].copy_from_slice(&self.0);
        Ok(Self::PACKED_SIZE_BYTES)
    }
}

impl ToBytes for (LeapIndicator, Version, Mode) {
    fn to_bytes(&self, buf: &mut [u8]) -> Result<usize, ParseError> {
        ensure_len(buf, 1)?;
        let (li, vn, mode) = *self;
        buf[0] = pack_li_vn_mode(li as u8, vn.0, mode as u8);
        Ok(1)
    }
}

impl ToBytes for Packet {
    fn to_bytes(&self, buf: &mut [u8]) -> Result<usize, ParseError> {
        ensure_len(buf, Self::PACKED_SIZE_BYTES)?;

        let mut offset = (self.leap_indicator, self.version, self.mode).to_bytes(buf)?;
        buf[offset] = self.stratum.0;
        buf[offset + 1] = self.poll as u8;
        buf[offset + 2] = self.precision as u8;
        offset += 3;
        offset += self.root_delay.to_bytes(&mut buf[offset..])?;
        offset += self.root_dispersion.to_bytes(&mut buf[offset..])?;
        offset += self.reference_id.to_bytes(&mut buf[offset..])?;
        offset += self.reference_timestamp.to_bytes(&mut buf[offset..])?;
        offset += self.origin_timestamp.to_bytes(&mut buf[offset..])?;
        offset += self.receive_timestamp.to_bytes(&mut buf[offset..])?;
        offset += self.transmit_timestamp.to_bytes(&mut buf[offset..])?;

        Ok(offset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_request() -> [u8; 48] {
        let mut buf = [0u8; 48];
        buf[0] = 0x23; // LI 0, VN 4, client
        buf[2] = 6;
        buf[3] = 0xEC; // precision -20
        buf[40..48].copy_from_slice(&[0xE9, 0x00, 0x00, 0x01, 0x80, 0x00, 0x00, 0x00]);
        buf
    }

    #[test]
    fn decode_standard_header_fields() {
        let (packet, n) = Packet::from_bytes(&sample_request()).unwrap();
        assert_eq!(n, 48);
        assert_eq!(packet.leap_indicator, LeapIndicator::NoWarning);
        assert_eq!(packet.version, Version::V4);
        assert_eq!(packet.mode, Mode::Client);
        assert_eq!(packet.poll, 6);
        assert_eq!(packet.precision, -20);
        assert_eq!(
            packet.transmit_timestamp,
            TimestampFormat {
                seconds: 0xE900_0001,
                fraction: 0x8000_0000
            }
        );
    }

    #[test]
    fn encode_reproduces_input() {
        let input = sample_request();
        let (packet, _) = Packet::from_bytes(&input).unwrap();
        let mut out = [0u8; 48];
        assert_eq!(packet.to_bytes(&mut out).unwrap(), 48);
        assert_eq!(out, input);
    }

    #[test]
    fn short_buffer_is_rejected() {
        let err = Packet::from_bytes(&[0x23; 47]).unwrap_err();
        assert_eq!(
            err,
            ParseError::BufferTooShort {
                needed: 48,
                available: 47
            }
        );
    }

    #[test]
    fn reserved_mode_is_rejected() {
        let mut buf = sample_request();
        buf[0] = 0x27; // mode 7
        assert_eq!(
            Packet::from_bytes(&buf).unwrap_err(),
            ParseError::UnsupportedMode(7)
        );
    }

    #[test]
    fn negative_root_delay_survives() {
        let mut buf = sample_request();
        buf[4..8].copy_from_slice(&[0xFF, 0xFF, 0x80, 0x00]);
        let (packet, _) = Packet::from_bytes(&buf).unwrap();
        assert_eq!(packet.root_delay.as_seconds_f64(), -0.5);
    }
}
