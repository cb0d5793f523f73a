// Copyright 2026 U.S. Federal Government (in countries where recognized)
// SPDX-License-Identifier: Apache-2.0

//! Wire-level building blocks for the `ntp_relay` time server.
//!
//! This crate provides the protocol types for the standard 48-byte NTP header
//! (RFC 5905) and the compact legacy format still sent by older SNTP clients,
//! the conversion between wall-clock instants and the 1900-based fixed-point
//! timestamp format, and classification of raw datagrams into one of the two
//! wire variants.
//!
//! Everything here is pure computation: no sockets, no clocks other than
//! [`unix_time::Instant::now`], and no shared state.

#![deny(unsafe_code)]
#![warn(missing_docs)]

/// Error types for decoding, classification, and timestamp range failures.
pub mod error;

/// NTP protocol types, constants, and the slice-based codec traits.
pub mod protocol;

/// Unix time conversion utilities for NTP timestamps.
pub mod unix_time;

/// Datagram classification into wire variants.
pub mod variant;

/// Variant-dispatched decode/encode over [`codec::Frame`].
pub mod codec;

pub use codec::{Frame, decode, encode};
pub use variant::{WireVariant, classify};
