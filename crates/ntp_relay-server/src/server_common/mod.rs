// Copyright 2026 U.S. Federal Government (in countries where recognized)
// SPDX-License-Identifier: Apache-2.0

//! Runtime-independent server logic: the shared clock state, reply
//! construction, the per-datagram pipeline, counters and configuration.
//!
//! Nothing here touches a socket. [`crate::server`] and [`crate::upstream`]
//! drive these pieces from tokio tasks.

mod config;
mod metrics;
mod pipeline;
mod response;
mod state;

pub use self::config::RelayConfig;
pub use self::metrics::{MetricsSnapshot, ServerMetrics};
pub use self::pipeline::{DropReason, HandleResult, handle_request, handle_request_at};
pub use self::response::build_response;
pub use self::state::{ClockHandle, ClockState, LocalReference, SyncStatus};
