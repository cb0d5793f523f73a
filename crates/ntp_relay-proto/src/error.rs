// Copyright 2026 U.S. Federal Government (in countries where recognized)
// SPDX-License-Identifier: Apache-2.0

//! Error types for datagram classification, packet decoding, and timestamp
//! conversion.
//!
//! None of these are fatal to a server: a datagram that fails classification
//! or decoding is dropped, and a [`RangeError`] aborts only the single
//! conversion that produced it. [`FrameError`] gathers all of them so the
//! request pipeline can report a single drop reason.

use thiserror::Error;

use crate::variant::WireVariant;

/// Errors produced while decoding a datagram of a known variant.
#[derive(Clone, Debug, Eq, PartialEq, Error)]
pub enum DecodeError {
    /// The datagram length does not match the layout of the variant.
    #[error("invalid length for {variant:?} datagram: expected {expected}, got {received}")]
    InvalidLength {
        /// Variant the datagram was decoded as.
        variant: WireVariant,
        /// Length (or one of the lengths) the variant accepts.
        expected: usize,
        /// Length actually received.
        received: usize,
    },
    /// The mode field carries a reserved or unsupported value.
    #[error("unsupported association mode: {mode}")]
    UnsupportedMode {
        /// Raw 3-bit mode value.
        mode: u8,
    },
    /// The version field is outside the range the variant understands.
    #[error("unsupported version {version} for {variant:?} datagram")]
    UnsupportedVersion {
        /// Variant the datagram was decoded as.
        variant: WireVariant,
        /// Raw 3-bit version value.
        version: u8,
    },
}

/// A datagram that matches neither wire variant.
#[derive(Clone, Debug, Eq, PartialEq, Error)]
#[error("unrecognized datagram ({length} bytes): {reason}")]
pub struct Unrecognized {
    /// Length of the rejected datagram.
    pub length: usize,
    /// Which check rejected it.
    pub reason: &'static str,
}

/// A wall-clock instant that cannot be represented on the wire.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Error)]
#[error("instant {secs}s relative to 1970 predates the NTP epoch (1900-01-01)")]
pub struct RangeError {
    /// Seconds relative to the Unix epoch of the rejected instant.
    pub secs: i64,
}

/// Any failure turning an inbound datagram into a reply.
#[derive(Clone, Debug, Eq, PartialEq, Error)]
pub enum FrameError {
    /// Classification failed.
    #[error(transparent)]
    Unrecognized(#[from] Unrecognized),
    /// Decoding failed.
    #[error(transparent)]
    Decode(#[from] DecodeError),
    /// A timestamp could not be encoded.
    #[error(transparent)]
    Range(#[from] RangeError),
}

/// Errors from the slice-based [`FromBytes`](crate::protocol::FromBytes) and
/// [`ToBytes`](crate::protocol::ToBytes) implementations.
#[derive(Clone, Debug, Eq, PartialEq, Error)]
pub enum ParseError {
    /// The buffer is too short for the expected data.
    #[error("buffer too short: needed {needed} bytes, got {available}")]
    BufferTooShort {
        /// Number of bytes needed.
        needed: usize,
        /// Number of bytes available.
        available: usize,
    },
    /// The mode field carries a reserved or unsupported value.
    #[error("unsupported association mode: {0}")]
    UnsupportedMode(u8),
}

impl From<ParseError> for std::io::Error {
    fn from(err: ParseError) -> std::io::Error {
        let kind = match &err {
            ParseError::BufferTooShort { .. } => std::io::ErrorKind::UnexpectedEof,
            ParseError::UnsupportedMode(_) => std::io::ErrorKind::InvalidData,
        };
        std::io::Error::new(kind, err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_invalid_length() {
        let err = DecodeError::InvalidLength {
            variant: WireVariant::Standard,
            expected: 48,
            received: 10,
        };
        assert_eq!(
            err.to_string(),
            "invalid length for Standard datagram: expected 48, got 10"
        );
    }

    #[test]
    fn test_display_unsupported_mode() {
        let err = DecodeError::UnsupportedMode { mode: 7 };
        assert_eq!(err.to_string(), "unsupported association mode: 7");
    }

    #[test]
    fn test_display_range_error() {
        let err = RangeError {
            secs: -2_208_988_801,
        };
        assert!(err.to_string().contains("predates the NTP epoch"));
    }

    #[test]
    fn test_frame_error_is_transparent() {
        let err: FrameError = Unrecognized {
            length: 3,
            reason: "length matches no variant",
        }
        .into();
        assert_eq!(
            err.to_string(),
            "unrecognized datagram (3 bytes): length matches no variant"
        );
    }

    #[test]
    fn test_parse_error_into_io_error() {
        let parse_err = ParseError::BufferTooShort {
            needed: 48,
            available: 0,
        };
        let io_err: std::io::Error = parse_err.into();
        assert_eq!(io_err.kind(), std::io::ErrorKind::UnexpectedEof);
    }
}
