//! Shared driver state: the latest-message cache, the time-to-first-fix
//! latch, and the satellite diagnostics snapshot.
//!
//! The receiver loop is the only writer; callers take snapshot reads. Locks
//! are held for map operations only, never across await points.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use crate::messages::Message;
use crate::types::{Diagnostics, MessageKind};

/// How many of the strongest signals feed the quality score.
pub(crate) const TOP_SIGNAL_COUNT: usize = 4;

#[derive(Default)]
pub(crate) struct SharedState {
    latest: Mutex<HashMap<MessageKind, Message>>,
    time_to_first_fix: Mutex<Duration>,
    diagnostics: Mutex<Diagnostics>,
}

impl SharedState {
    pub(crate) fn new() -> Self {
        SharedState::default()
    }

    /// Stores the newest message of its kind, displacing the previous one.
    pub(crate) fn record(&self, message: Message) -> MessageKind {
        let kind = message.kind();
        self.latest
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(kind, message);
        kind
    }

    /// A clone of the latest message of `kind`, if one has arrived.
    pub(crate) fn latest(&self, kind: MessageKind) -> Option<Message> {
        self.latest
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&kind)
            .cloned()
    }

    /// Latches the device-reported time to first fix. Zero reports never
    /// latch, and once a nonzero value is in, later reports are ignored.
    /// Returns whether this call set the value.
    pub(crate) fn note_time_to_first_fix(&self, reported: Duration) -> bool {
        if reported.is_zero() {
            return false;
        }
        let mut latched = self
            .time_to_first_fix
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if latched.is_zero() {
            *latched = reported;
            true
        } else {
            false
        }
    }

    /// Zero until the device first reports a nonzero time to first fix.
    pub(crate) fn time_to_first_fix(&self) -> Duration {
        *self
            .time_to_first_fix
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Replaces the satellite snapshot wholesale.
    pub(crate) fn replace_diagnostics(&self, snapshot: Diagnostics) {
        *self
            .diagnostics
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = snapshot;
    }

    /// The current snapshot, with the live time-to-first-fix latch folded in
    /// so a fix latched after the last satellite-info message still shows.
    pub(crate) fn diagnostics(&self) -> Diagnostics {
        let mut snapshot = *self
            .diagnostics
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        snapshot.time_to_first_fix = self.time_to_first_fix();
        snapshot
    }

    /// Forgets everything: cache, diagnostics, and the latch. The next
    /// nonzero time-to-first-fix report latches again.
    pub(crate) fn reset(&self) {
        self.latest
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
        *self
            .time_to_first_fix
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Duration::ZERO;
        *self
            .diagnostics
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Diagnostics::default();
    }
}

/// Average of the `TOP_SIGNAL_COUNT` strongest carrier-to-noise ratios, in
/// dBHz. Averages over whatever is available when fewer, 0.0 when none.
pub(crate) fn signal_quality(carrier_to_noise: &[u8]) -> f32 {
    if carrier_to_noise.is_empty() {
        return 0.0;
    }
    let mut strongest: Vec<u8> = carrier_to_noise.to_vec();
    strongest.sort_unstable_by(|a, b| b.cmp(a));
    strongest.truncate(TOP_SIGNAL_COUNT);
    let sum: u32 = strongest.iter().map(|&cno| u32::from(cno)).sum();
    sum as f32 / strongest.len() as f32
}

/// Builds a snapshot from one satellite-info message's carrier-to-noise
/// ratios: known = reported count, in view = nonzero signals.
pub(crate) fn diagnostics_from_cnos(
    carrier_to_noise: &[u8],
    time_to_first_fix: Duration,
) -> Diagnostics {
    Diagnostics {
        known_satellites: carrier_to_noise.len() as u16,
        satellites_in_view: carrier_to_noise.iter().filter(|&&cno| cno > 0).count() as u16,
        quality: signal_quality(carrier_to_noise),
        time_to_first_fix,
    }
}
