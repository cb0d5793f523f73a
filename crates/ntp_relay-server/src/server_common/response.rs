use crate::protocol::{LeapIndicator, LegacyPacket, Mode, Packet, Stratum, TimestampFormat};
use ntp_proto::Frame;

use super::ClockState;

/// Build the reply to `request` from one clock snapshot.
///
/// Per RFC 5905 Section 8:
/// - `mode` is `Server` whatever the request's mode
/// - `origin_timestamp` is the request's `transmit_timestamp`, verbatim
/// - `receive_timestamp` and `transmit_timestamp` are T2 and T3 as given
/// - `version` and `poll` echo the request
/// - the system variables come from `snapshot` and nowhere else
///
/// An unsynchronized snapshot always yields LI = unknown and stratum 16.
/// A legacy request gets a legacy reply carrying its authenticator back.
pub fn build_response(
    request: &Frame,
    receive: TimestampFormat,
    transmit: TimestampFormat,
    snapshot: &ClockState,
) -> Frame {
    let (leap_indicator, stratum) = if snapshot.is_synchronized() {
        (snapshot.leap_indicator, snapshot.stratum)
    } else {
        (LeapIndicator::Unknown, Stratum::UNSYNCHRONIZED)
    };

    match request {
        Frame::Standard(req) => Frame::Standard(Packet {
            leap_indicator,
            version: req.version,
            mode: Mode::Server,
            stratum,
            poll: req.poll,
            precision: snapshot.precision,
            root_delay: snapshot.root_delay,
            root_dispersion: snapshot.root_dispersion,
            reference_id: snapshot.reference_id,
            reference_timestamp: snapshot.reference_timestamp,
            origin_timestamp: req.transmit_timestamp,
            receive_timestamp: receive,
            transmit_timestamp: transmit,
        }),
        Frame::Legacy(req) => Frame::Legacy(LegacyPacket {
            leap_indicator,
            version: req.version,
            mode: Mode::Server,
            stratum,
            poll: req.poll,
            precision: snapshot.precision,
            root_delay: snapshot.root_delay,
            root_dispersion: snapshot.root_dispersion,
            reference_id: snapshot.reference_id,
            reference_timestamp: snapshot.reference_timestamp,
            origin_timestamp: req.transmit_timestamp,
            receive_timestamp: receive,
            transmit_timestamp: transmit,
            authenticator: req.authenticator,
        }),
    }
}
