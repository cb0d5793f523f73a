use std::sync::{Arc, PoisonError, RwLock};

use crate::protocol::{
    LeapIndicator, ReferenceIdentifier, ShortFormat, Stratum, TimeOffset, TimestampFormat,
};

/// Where the server's notion of time currently comes from.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum SyncStatus {
    /// No usable reference: replies advertise LI = unknown and stratum 16.
    Unsynchronized,
    /// The local clock is served as a reference with a configured stratum.
    LocalReference,
    /// Synchronized to the configured upstream server.
    Synchronized,
}

/// Stratum and identifier to advertise when the local clock is served as a
/// reference and no upstream is configured.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct LocalReference {
    /// Advertised stratum.
    pub stratum: Stratum,
    /// Advertised reference identifier, usually [`ReferenceIdentifier::LOCL`].
    pub reference_id: ReferenceIdentifier,
}

impl LocalReference {
    /// A `LOCL` reference at the given stratum.
    pub fn locl(stratum: u8) -> Self {
        LocalReference {
            stratum: Stratum(stratum),
            reference_id: ReferenceIdentifier::LOCL,
        }
    }
}

/// Server-wide system variables (RFC 5905 Section 11) as one immutable snapshot.
///
/// Every reply is built from exactly one snapshot. Updates never mutate a
/// snapshot in place; they publish a whole new one through [`ClockHandle`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ClockState {
    /// Current synchronization source.
    pub status: SyncStatus,
    /// Leap indicator advertised in replies.
    pub leap_indicator: LeapIndicator,
    /// Stratum advertised in replies.
    pub stratum: Stratum,
    /// Precision of the local clock, in log2 seconds (e.g., -20 ≈ 1μs).
    pub precision: i8,
    /// Total round-trip delay to the primary reference source.
    pub root_delay: ShortFormat,
    /// Total dispersion to the primary reference source.
    pub root_dispersion: ShortFormat,
    /// Reference identifier (upstream address, or a clock code).
    pub reference_id: ReferenceIdentifier,
    /// When the state was last set from its reference.
    pub reference_timestamp: TimestampFormat,
    /// Last measured offset of the local clock against the upstream.
    pub offset: TimeOffset,
    /// Last measured round-trip delay to the upstream.
    pub delay: TimeOffset,
    /// Incremented by every publish.
    pub generation: u64,
}

impl ClockState {
    /// The state of a server with no usable reference.
    pub fn unsynchronized(precision: i8) -> Self {
        ClockState {
            status: SyncStatus::Unsynchronized,
            leap_indicator: LeapIndicator::Unknown,
            stratum: Stratum::UNSYNCHRONIZED,
            precision,
            root_delay: ShortFormat::default(),
            root_dispersion: ShortFormat::default(),
            reference_id: ReferenceIdentifier::default(),
            reference_timestamp: TimestampFormat::ZERO,
            offset: TimeOffset::ZERO,
            delay: TimeOffset::ZERO,
            generation: 0,
        }
    }

    /// The state of a server serving its own clock as a reference.
    pub fn local_reference(
        precision: i8,
        reference: LocalReference,
        reference_timestamp: TimestampFormat,
    ) -> Self {
        ClockState {
            status: SyncStatus::LocalReference,
            leap_indicator: LeapIndicator::NoWarning,
            stratum: reference.stratum,
            reference_id: reference.reference_id,
            reference_timestamp,
            ..Self::unsynchronized(precision)
        }
    }

    /// Whether replies built from this state advertise a usable time.
    pub fn is_synchronized(&self) -> bool {
        self.status != SyncStatus::Unsynchronized
    }
}

/// Shared handle to the current [`ClockState`].
///
/// Readers take a cheap `Arc` clone of the current snapshot; writers swap in
/// a whole new snapshot. The lock is held only for the clone or the swap and
/// never across an `.await`. Cloning the handle shares the same state.
#[derive(Clone, Debug)]
pub struct ClockHandle {
    inner: Arc<RwLock<Arc<ClockState>>>,
}

impl ClockHandle {
    /// Create a handle holding `initial`.
    pub fn new(initial: ClockState) -> Self {
        ClockHandle {
            inner: Arc::new(RwLock::new(Arc::new(initial))),
        }
    }

    /// The current snapshot.
    pub fn snapshot(&self) -> Arc<ClockState> {
        // A panicking writer cannot leave a half-built snapshot behind, so a
        // poisoned lock still holds a valid one.
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Replace the current snapshot with `next`, returning the new generation.
    pub fn publish(&self, mut next: ClockState) -> u64 {
        let mut slot = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        next.generation = slot.generation.wrapping_add(1);
        let generation = next.generation;
        *slot = Arc::new(next);
        generation
    }

    /// Replace the snapshot with the unsynchronized form, keeping only the
    /// precision. Returns whether the previous snapshot was synchronized.
    pub fn degrade(&self) -> bool {
        let mut slot = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        let was_synchronized = slot.is_synchronized();
        let mut next = ClockState::unsynchronized(slot.precision);
        next.generation = slot.generation.wrapping_add(1);
        *slot = Arc::new(next);
        was_synchronized
    }

    /// The last measured offset against the upstream, if synchronized to one.
    pub fn offset(&self) -> Option<TimeOffset> {
        let snap = self.snapshot();
        (snap.status == SyncStatus::Synchronized).then_some(snap.offset)
    }

    /// Whether the current snapshot advertises a usable time.
    pub fn is_synchronized(&self) -> bool {
        self.snapshot().is_synchronized()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn synced(stratum: u8) -> ClockState {
        ClockState {
            status: SyncStatus::Synchronized,
            leap_indicator: LeapIndicator::NoWarning,
            stratum: Stratum(stratum),
            reference_id: ReferenceIdentifier([10, 0, 0, 1]),
            offset: TimeOffset::from_seconds_f64(0.25),
            ..ClockState::unsynchronized(-20)
        }
    }

    #[test]
    fn initial_state_is_unsynchronized() {
        let handle = ClockHandle::new(ClockState::unsynchronized(-20));
        let snap = handle.snapshot();
        assert_eq!(snap.leap_indicator, LeapIndicator::Unknown);
        assert_eq!(snap.stratum, Stratum::MAX);
        assert!(!handle.is_synchronized());
        assert_eq!(handle.offset(), None);
    }

    #[test]
    fn publish_swaps_whole_snapshot() {
        let handle = ClockHandle::new(ClockState::unsynchronized(-20));
        let before = handle.snapshot();
        assert_eq!(handle.publish(synced(3)), 1);
        let after = handle.snapshot();

        // Readers holding the old snapshot keep seeing it unchanged.
        assert_eq!(before.stratum, Stratum::MAX);
        assert_eq!(after.stratum, Stratum(3));
        assert_eq!(after.generation, 1);
        assert_eq!(handle.offset(), Some(TimeOffset::from_seconds_f64(0.25)));
    }

    #[test]
    fn degrade_clears_everything_but_precision() {
        let handle = ClockHandle::new(ClockState::unsynchronized(-18));
        handle.publish(ClockState {
            precision: -18,
            ..synced(2)
        });
        assert!(handle.degrade());
        let snap = handle.snapshot();
        assert_eq!(
            *snap,
            ClockState {
                generation: 2,
                ..ClockState::unsynchronized(-18)
            }
        );
        // Degrading twice reports no transition.
        assert!(!handle.degrade());
    }

    #[test]
    fn local_reference_counts_as_synchronized_without_offset() {
        let state = ClockState::local_reference(-20, LocalReference::locl(1), TimestampFormat::ZERO);
        let handle = ClockHandle::new(state);
        assert!(handle.is_synchronized());
        assert_eq!(handle.offset(), None);
        assert_eq!(handle.snapshot().reference_id, ReferenceIdentifier::LOCL);
    }

    #[test]
    fn clones_share_state() {
        let a = ClockHandle::new(ClockState::unsynchronized(-20));
        let b = a.clone();
        a.publish(synced(4));
        assert_eq!(b.snapshot().stratum, Stratum(4));
    }
}
