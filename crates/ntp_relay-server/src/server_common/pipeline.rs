use log::debug;

use ntp_proto::error::{DecodeError, FrameError};
use ntp_proto::{classify, decode, encode};

use crate::protocol::TimeOffset;
use crate::unix_time::{self, Instant};

use super::{ClockState, ServerMetrics, build_response};

/// Why a datagram got no reply.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum DropReason {
    /// Length or version matched neither variant.
    Unrecognized,
    /// Length wrong for the chosen variant.
    InvalidLength,
    /// Reserved or unsupported association mode.
    UnsupportedMode,
    /// Version outside the variant's range.
    UnsupportedVersion,
    /// The local clock could not be encoded as a timestamp.
    Range,
}

impl From<&FrameError> for DropReason {
    fn from(err: &FrameError) -> Self {
        match err {
            FrameError::Unrecognized(_) => DropReason::Unrecognized,
            FrameError::Decode(DecodeError::InvalidLength { .. }) => DropReason::InvalidLength,
            FrameError::Decode(DecodeError::UnsupportedMode { .. }) => DropReason::UnsupportedMode,
            FrameError::Decode(DecodeError::UnsupportedVersion { .. }) => {
                DropReason::UnsupportedVersion
            }
            FrameError::Range(_) => DropReason::Range,
        }
    }
}

/// The complete result of handling one datagram.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum HandleResult {
    /// Send these bytes back to the source.
    Response(Vec<u8>),
    /// Send nothing.
    Drop(DropReason),
}

/// Handle one inbound datagram (pure logic, no I/O).
///
/// Classify, decode, sample T2, sample T3, build and encode. T3 is sampled
/// after everything that can fail, immediately before the reply is built and
/// serialized, and is always strictly later than T2. Any failure drops the datagram; it is counted and logged at
/// debug level, and never reaches the caller as an error.
pub fn handle_request(
    buf: &[u8],
    src: std::net::SocketAddr,
    snapshot: &ClockState,
    metrics: &ServerMetrics,
) -> HandleResult {
    handle_request_at(buf, src, snapshot, metrics, Instant::now)
}

/// [`handle_request`] with an explicit wall clock, sampled once for T2 and
/// once for T3.
pub fn handle_request_at<C>(
    buf: &[u8],
    src: std::net::SocketAddr,
    snapshot: &ClockState,
    metrics: &ServerMetrics,
    mut clock: C,
) -> HandleResult
where
    C: FnMut() -> Instant,
{
    metrics.inc_requests_received();

    match respond(buf, snapshot, &mut clock) {
        Ok(reply) => HandleResult::Response(reply),
        Err(e) => {
            debug!("dropping datagram from {}: {}", src, e);
            let reason = DropReason::from(&e);
            metrics.inc_dropped(reason);
            HandleResult::Drop(reason)
        }
    }
}

fn respond<C>(buf: &[u8], snapshot: &ClockState, clock: &mut C) -> Result<Vec<u8>, FrameError>
where
    C: FnMut() -> Instant,
{
    let variant = classify(buf)?;
    let request = decode(buf, variant)?;
    let t2 = unix_time::to_wire(clock())?;
    let mut t3 = unix_time::to_wire(clock())?;
    // Transmit must follow receive even when the clock did not advance.
    if (t3 - t2).0 <= 0 {
        t3 = t2.wrapping_add_offset(TimeOffset(1));
    }
    Ok(encode(&build_response(&request, t2, t3, snapshot)))
}
