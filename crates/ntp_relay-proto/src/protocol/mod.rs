//! Types and constants for the NTP header and its legacy compact form.
//!
//! Provides [`FromBytes`] and [`ToBytes`] implementations that read and write
//! the protocol types in network byte order directly on byte slices.
//!
//! Documentation is largely derived from IETF RFC 5905.

/// NTP port number.
pub const PORT: u16 = 123;

/// Frequency tolerance PHI (s/s).
pub const TOLERANCE: f64 = 15e-6;

/// Maximum stratum number.
pub const MAXSTRAT: u8 = 16;

// Layout of the first header octet: LI(2) | VN(3) | Mode(3).

/// Mask selecting the leap indicator bits of the first header octet.
pub const LI_MASK: u8 = 0b1100_0000;
/// Right shift applied after [`LI_MASK`].
pub const LI_SHIFT: u32 = 6;
/// Mask selecting the version number bits of the first header octet.
pub const VN_MASK: u8 = 0b0011_1000;
/// Right shift applied after [`VN_MASK`].
pub const VN_SHIFT: u32 = 3;
/// Mask selecting the mode bits of the first header octet.
pub const MODE_MASK: u8 = 0b0000_0111;

/// Raw leap indicator bits of a first header octet.
#[inline]
pub fn li_bits(byte0: u8) -> u8 {
    (byte0 & LI_MASK) >> LI_SHIFT
}

/// Raw version number bits of a first header octet.
#[inline]
pub fn vn_bits(byte0: u8) -> u8 {
    (byte0 & VN_MASK) >> VN_SHIFT
}

/// Raw mode bits of a first header octet.
#[inline]
pub fn mode_bits(byte0: u8) -> u8 {
    byte0 & MODE_MASK
}

/// Pack raw leap indicator, version and mode values into a first header octet.
///
/// Each value is masked to its field width, so out-of-range inputs cannot
/// spill into a neighbouring field.
#[inline]
pub fn pack_li_vn_mode(li: u8, vn: u8, mode: u8) -> u8 {
    ((li << LI_SHIFT) & LI_MASK) | ((vn << VN_SHIFT) & VN_MASK) | (mode & MODE_MASK)
}

mod bytes;
mod legacy;
mod traits;
mod types;

pub use self::legacy::*;
pub use self::traits::*;
pub use self::types::*;
