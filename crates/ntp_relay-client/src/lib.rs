// Copyright 2026 U.S. Federal Government (in countries where recognized)
// SPDX-License-Identifier: Apache-2.0

/*!
Upstream side of the `ntp_relay` time server.

The [`exchange`] module holds the pure pieces of a client/server exchange:
request construction, reply validation, and the four-timestamp offset and
delay computation. [`async_ntp`] drives one exchange over a Tokio UDP socket.

# Example

```rust,no_run
# async fn example() -> std::io::Result<()> {
let sample = ntp_client::async_ntp::request("192.0.2.1:123").await?;
println!("stratum {} offset {:.6}s", sample.stratum.0, sample.offset_seconds());
# Ok(())
# }
```
*/

#![warn(missing_docs)]

// Re-export protocol types from ntp_proto for convenience.
pub use ntp_proto::{protocol, unix_time};

/// Error types for upstream exchanges.
pub mod error;

/// Pure request/reply helpers.
pub mod exchange;

/// One-shot async exchange over Tokio.
pub mod async_ntp;

pub use error::ExchangeError;
pub use exchange::{SyncSample, compute_offset_delay};
