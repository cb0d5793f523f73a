use crate::error::Unrecognized;
use crate::protocol::{ConstPackedSizeBytes, LEGACY_AUTH_LEN, LegacyPacket, Packet, vn_bits};

/// The two header layouts that share the server's UDP port.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum WireVariant {
    /// The 48-octet header of NTP versions 1 to 4.
    Standard,
    /// The compact header with 32-bit seconds timestamps and an optional
    /// authenticator: 32 or 40 octets.
    Legacy,
}

impl WireVariant {
    /// Versions a datagram of this variant may carry.
    pub fn supports_version(self, version: u8) -> bool {
        match self {
            WireVariant::Standard => (1..=4).contains(&version),
            WireVariant::Legacy => (1..=3).contains(&version),
        }
    }
}

/// Decide which variant a raw datagram is, without consuming it.
///
/// Length is the primary discriminant, since the layouts have disjoint sizes.
/// The version bits of the first octet are then checked against the range the
/// variant supports. Anything else is reported as [`Unrecognized`]; nothing is
/// ever guessed.
pub fn classify(bytes: &[u8]) -> Result<WireVariant, Unrecognized> {
    const LEGACY_BASE: usize = LegacyPacket::PACKED_SIZE_BYTES;
    const LEGACY_AUTH: usize = LegacyPacket::PACKED_SIZE_BYTES + LEGACY_AUTH_LEN;

    let variant = match bytes.len() {
        Packet::PACKED_SIZE_BYTES => WireVariant::Standard,
        LEGACY_BASE | LEGACY_AUTH => WireVariant::Legacy,
        length => {
            return Err(Unrecognized {
                length,
                reason: "length matches no variant",
            });
        }
    };

    if !variant.supports_version(vn_bits(bytes[0])) {
        return Err(Unrecognized {
            length: bytes.len(),
            reason: "version out of range for the variant",
        });
    }

    Ok(variant)
}
