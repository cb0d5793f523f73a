// Copyright 2026 U.S. Federal Government (in countries where recognized)
// SPDX-License-Identifier: Apache-2.0

//! Time server that answers standard and legacy client queries, optionally
//! following one upstream server.
//!
//! The pieces:
//!
//! - [`server_common`]: the shared [`ClockState`](server_common::ClockState)
//!   snapshot, reply construction, the per-datagram pipeline, metrics and
//!   configuration. No I/O.
//! - [`server`]: the Tokio serving loop, one task per datagram.
//! - [`upstream`]: the periodic exchange with the upstream server that keeps
//!   the clock state current, or degrades it when the upstream goes away.
//! - [`transport`]: the datagram seam both loops are written against.
//!
//! # Example
//!
//! ```no_run
//! # async fn example() -> std::io::Result<()> {
//! use ntp_server::server::NtpServer;
//!
//! let server = NtpServer::builder()
//!     .listen("0.0.0.0:123")
//!     .upstream("10.10.10.10:123")
//!     .build()
//!     .await?;
//! server.run().await
//! # }
//! ```

#![warn(missing_docs)]

// Re-export protocol types from ntp_proto for convenience.
pub use ntp_proto::{protocol, unix_time};

/// Error types for configuration and I/O.
pub mod error;

/// Shared clock state, reply construction and request handling.
pub mod server_common;

/// Datagram send/receive abstraction.
pub mod transport;

/// Upstream synchronization loop.
pub mod upstream;

/// Tokio serving loop and its builder.
pub mod server;
