// Copyright 2026 U.S. Federal Government (in countries where recognized)
// SPDX-License-Identifier: Apache-2.0

//! Custom error types for the relay server.
//!
//! Public async APIs return `io::Result<T>`. Internally, errors are
//! constructed as [`NtpServerError`] variants and converted to `io::Error`
//! via `From<NtpServerError> for io::Error`, so callers can downcast:
//!
//! ```no_run
//! use ntp_server::error::NtpServerError;
//!
//! # fn example(result: std::io::Result<()>) {
//! if let Err(e) = result {
//!     if let Some(NtpServerError::Config(c)) = e
//!         .get_ref()
//!         .and_then(|inner| inner.downcast_ref::<NtpServerError>())
//!     {
//!         eprintln!("bad configuration: {c}");
//!     }
//! }
//! # }
//! ```

use std::io;

use thiserror::Error;

/// Errors that can occur while configuring or running the server.
#[derive(Debug, Error)]
pub enum NtpServerError {
    /// Invalid configuration.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    /// Underlying I/O error (socket bind, send/recv, file read).
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Configuration errors, from the builder or from a configuration file.
#[derive(Clone, Debug, Eq, PartialEq, Error)]
pub enum ConfigError {
    /// A line is not of the form `key:value`.
    #[error("line {line}: expected `key:value`")]
    MalformedLine {
        /// 1-based line number.
        line: usize,
    },
    /// The key is not one this server understands.
    #[error("line {line}: unknown key `{key}`")]
    UnknownKey {
        /// 1-based line number.
        line: usize,
        /// The offending key.
        key: String,
    },
    /// The value does not parse for its key.
    #[error("invalid value `{value}` for `{key}`: {reason}")]
    InvalidValue {
        /// The key whose value was rejected.
        key: &'static str,
        /// The value as given.
        value: String,
        /// Why it was rejected.
        reason: &'static str,
    },
    /// An address did not resolve to a socket address.
    #[error("address `{0}` resolved to no socket addresses")]
    UnresolvedAddress(String),
}

impl From<NtpServerError> for io::Error {
    fn from(err: NtpServerError) -> io::Error {
        match err {
            NtpServerError::Io(e) => e,
            other => io::Error::new(io::ErrorKind::InvalidInput, other),
        }
    }
}

impl From<ConfigError> for io::Error {
    fn from(err: ConfigError) -> io::Error {
        NtpServerError::Config(err).into()
    }
}
