// Copyright 2026 U.S. Federal Government (in countries where recognized)
// SPDX-License-Identifier: Apache-2.0

//! Error types for an upstream exchange.
//!
//! The one-shot async API returns `io::Result<T>`. Failures are built as
//! [`ExchangeError`] and converted with `From<ExchangeError> for io::Error`,
//! so callers that need to match on the cause can downcast:
//!
//! ```no_run
//! use ntp_client::error::ExchangeError;
//!
//! # async fn example() {
//! match ntp_client::async_ntp::request("192.0.2.1:123").await {
//!     Ok(sample) => println!("offset: {}", sample.offset),
//!     Err(e) => {
//!         if let Some(err) = e.get_ref().and_then(|inner| inner.downcast_ref::<ExchangeError>()) {
//!             eprintln!("exchange failed: {err}");
//!         }
//!     }
//! }
//! # }
//! ```

use std::io;

use ntp_proto::error::{DecodeError, RangeError, Unrecognized};
use ntp_proto::protocol::KissOfDeath;
use thiserror::Error;

/// Ways an exchange with the upstream server can fail.
#[derive(Debug, Error)]
pub enum ExchangeError {
    /// The reply is not a datagram of either variant.
    #[error("malformed reply: {0}")]
    Unrecognized(#[from] Unrecognized),
    /// The reply classified but failed to decode.
    #[error("malformed reply: {0}")]
    Decode(#[from] DecodeError),
    /// The reply is a legacy header, which we never request.
    #[error("reply uses the legacy layout")]
    LegacyReply,
    /// The reply's mode is not Server.
    #[error("unexpected reply mode {mode} (expected Server)")]
    UnexpectedMode {
        /// Raw mode of the reply.
        mode: u8,
    },
    /// The reply's origin timestamp does not echo our transmit timestamp.
    #[error("origin timestamp mismatch: reply does not match our request")]
    OriginMismatch,
    /// The server left its transmit timestamp unset.
    #[error("server transmit timestamp is zero")]
    ZeroTransmitTimestamp,
    /// The server reports that it is not synchronized itself.
    #[error("server reports unsynchronized clock")]
    UnsynchronizedServer,
    /// The server replied with a kiss code.
    #[error("server sent Kiss-o'-Death {0:?}")]
    KissOfDeath(KissOfDeath),
    /// No reply arrived in time.
    #[error("upstream request timed out")]
    Timeout,
    /// The server address resolved to nothing.
    #[error("address resolved to no socket addresses")]
    NoAddresses,
    /// The local clock could not be encoded.
    #[error(transparent)]
    Range(#[from] RangeError),
    /// Socket failure.
    #[error(transparent)]
    Io(#[from] io::Error),
}

impl From<ExchangeError> for io::Error {
    fn from(err: ExchangeError) -> io::Error {
        let kind = match &err {
            ExchangeError::Timeout => io::ErrorKind::TimedOut,
            ExchangeError::KissOfDeath(_) => io::ErrorKind::ConnectionRefused,
            ExchangeError::NoAddresses => io::ErrorKind::InvalidInput,
            ExchangeError::Io(e) => e.kind(),
            _ => io::ErrorKind::InvalidData,
        };
        if let ExchangeError::Io(e) = err {
            return e;
        }
        io::Error::new(kind, err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        assert_eq!(
            ExchangeError::UnexpectedMode { mode: 3 }.to_string(),
            "unexpected reply mode 3 (expected Server)"
        );
        assert_eq!(
            ExchangeError::KissOfDeath(KissOfDeath::Rate).to_string(),
            "server sent Kiss-o'-Death Rate"
        );
    }

    #[test]
    fn test_to_io_error_kind() {
        let cases: Vec<(ExchangeError, io::ErrorKind)> = vec![
            (ExchangeError::Timeout, io::ErrorKind::TimedOut),
            (ExchangeError::OriginMismatch, io::ErrorKind::InvalidData),
            (
                ExchangeError::KissOfDeath(KissOfDeath::Deny),
                io::ErrorKind::ConnectionRefused,
            ),
            (ExchangeError::NoAddresses, io::ErrorKind::InvalidInput),
        ];
        for (err, expected) in cases {
            let io_err: io::Error = err.into();
            assert_eq!(io_err.kind(), expected);
        }
    }

    #[test]
    fn test_downcast_roundtrip() {
        let io_err: io::Error = ExchangeError::ZeroTransmitTimestamp.into();
        let inner = io_err
            .get_ref()
            .unwrap()
            .downcast_ref::<ExchangeError>()
            .unwrap();
        assert!(matches!(inner, ExchangeError::ZeroTransmitTimestamp));
    }

    #[test]
    fn test_io_error_passthrough() {
        let orig = io::Error::new(io::ErrorKind::ConnectionReset, "reset");
        let io_err: io::Error = ExchangeError::Io(orig).into();
        assert_eq!(io_err.kind(), io::ErrorKind::ConnectionReset);
        assert_eq!(io_err.to_string(), "reset");
    }
}
