//! The receiver loop: sole reader of the transport, feeding the scanner,
//! the latest-message cache, the command slot, and the fix watch channel.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use crate::command::PendingSlot;
use crate::frame::{Frame, FrameScanner};
use crate::messages::Message;
use crate::state::{SharedState, diagnostics_from_cnos};
use crate::transport::TransportReader;
use crate::types::{Location, MessageKind};

/// Transport read chunk; frames span chunks freely.
const READ_CHUNK: usize = 512;

/// Consecutive transport errors tolerated before the loop gives up.
const MAX_CONSECUTIVE_ERRORS: u32 = 10;

/// Requests handled by the receiver task between reads.
pub(crate) enum Control {
    /// Clear fix, diagnostics, and time-to-first-fix state.
    Reset { done: oneshot::Sender<()> },
}

/// Handles returned by [`Driver::spawn`].
pub(crate) struct DriverChannels {
    /// Latest accepted fix; `None` until the first one arrives.
    pub(crate) fixes: watch::Receiver<Option<Location>>,
    /// Control requests into the receiver task.
    pub(crate) control: mpsc::UnboundedSender<Control>,
    /// Resolved once the task is reading; commands go out only after this.
    pub(crate) ready: oneshot::Receiver<()>,
    /// Cancellation token for graceful shutdown.
    pub(crate) cancel: CancellationToken,
}

/// Driver spawns and manages the receiver task.
///
/// The task owns the transport reader; everything else observes it through
/// shared state, the pending command slot, and the fix watch channel. When
/// the task ends, for any reason, it drops the watch sender and closes the
/// command slot so waiters fail with `Closed` instead of hanging.
pub(crate) struct Driver;

impl Driver {
    pub(crate) fn spawn<R>(
        reader: R,
        state: Arc<SharedState>,
        slot: Arc<PendingSlot>,
    ) -> DriverChannels
    where
        R: TransportReader,
    {
        let (fix_tx, fix_rx) = watch::channel(None);
        let (control_tx, control_rx) = mpsc::unbounded_channel();
        let (ready_tx, ready_rx) = oneshot::channel();

        let cancel = CancellationToken::new();
        let cancel_task = cancel.clone();

        tokio::spawn(async move {
            Self::receiver_task(reader, state, slot, fix_tx, control_rx, ready_tx, cancel_task)
                .await;
        });

        DriverChannels { fixes: fix_rx, control: control_tx, ready: ready_rx, cancel }
    }

    async fn receiver_task<R>(
        mut reader: R,
        state: Arc<SharedState>,
        slot: Arc<PendingSlot>,
        fix_tx: watch::Sender<Option<Location>>,
        mut control: mpsc::UnboundedReceiver<Control>,
        ready: oneshot::Sender<()>,
        cancel: CancellationToken,
    ) where
        R: TransportReader,
    {
        info!("Receiver loop started");
        let _ = ready.send(());

        let mut scanner = FrameScanner::new();
        let mut chunk = [0u8; READ_CHUNK];
        let mut frame_count = 0u64;
        let mut error_count = 0u32;

        loop {
            if cancel.is_cancelled() {
                info!("Receiver loop cancelled");
                break;
            }

            let read = tokio::select! {
                _ = cancel.cancelled() => {
                    info!("Receiver loop cancelled during read");
                    break;
                }
                Some(request) = control.recv() => {
                    handle_control(request, &state, &fix_tx);
                    continue;
                }
                result = reader.read_available(&mut chunk) => result,
            };

            match read {
                Ok(0) => {
                    info!("Transport closed after {} frames", frame_count);
                    break;
                }
                Ok(n) => {
                    error_count = 0;
                    scanner.push(&chunk[..n]);
                    while let Some(frame) = scanner.next_frame() {
                        frame_count += 1;
                        dispatch(frame, &state, &slot, &fix_tx);
                    }
                }
                Err(e) => {
                    error_count += 1;
                    error!("Transport error ({}/{}): {}", error_count, MAX_CONSECUTIVE_ERRORS, e);

                    if error_count >= MAX_CONSECUTIVE_ERRORS {
                        error!("Too many transport errors, shutting down");
                        break;
                    }

                    // Exponential backoff: 100ms, 200ms, 400ms, ...
                    let backoff = Duration::from_millis(50 * (1 << error_count.min(5)));
                    tokio::time::sleep(backoff).await;
                }
            }
        }

        // Fail the in-flight command and all future ones; dropping `fix_tx`
        // below wakes every location waiter with a closed channel.
        slot.shutdown();
        info!("Receiver loop ended (processed {} frames)", frame_count);
    }
}

fn handle_control(
    request: Control,
    state: &SharedState,
    fix_tx: &watch::Sender<Option<Location>>,
) {
    match request {
        Control::Reset { done } => {
            state.reset();
            fix_tx.send_replace(None);
            debug!("Driver state reset");
            let _ = done.send(());
        }
    }
}

/// Routes one validated frame: cache, command slot, fix state, diagnostics.
fn dispatch(
    frame: Frame,
    state: &SharedState,
    slot: &PendingSlot,
    fix_tx: &watch::Sender<Option<Location>>,
) {
    let message = match Message::from_frame(&frame) {
        Ok(Some(message)) => message,
        Ok(None) => {
            trace!("Ignoring unknown message {:#04x}/{:#04x}", frame.class, frame.id);
            return;
        }
        Err(e) => {
            warn!("Dropping undecodable frame: {}", e);
            return;
        }
    };

    trace!("Decoded {}", message.kind());
    state.record(message.clone());

    if slot.offer(&message) {
        trace!("{} resolved the pending command", message.kind());
    }

    match &message {
        Message::NavPvt(pvt) => {
            if pvt.has_fix() {
                accept_fix(pvt.to_location(), fix_tx);
            }
        }
        Message::NavPosllh(posllh) => {
            // POSLLH carries no validity field; the latest NAV-STATUS gates it.
            let fixed = matches!(
                state.latest(MessageKind::NavStatus),
                Some(Message::NavStatus(status)) if status.has_fix()
            );
            if fixed {
                accept_fix(posllh.to_location(), fix_tx);
            }
        }
        Message::NavStatus(status) => {
            if let Some(ttff) = status.time_to_first_fix() {
                if state.note_time_to_first_fix(ttff) {
                    debug!("Time to first fix: {:?}", ttff);
                }
            }
        }
        Message::NavSat(sat) => {
            let snapshot =
                diagnostics_from_cnos(&sat.carrier_to_noise(), state.time_to_first_fix());
            trace!(
                "Satellite snapshot: {} known, {} in view, quality {:.1}",
                snapshot.known_satellites, snapshot.satellites_in_view, snapshot.quality
            );
            state.replace_diagnostics(snapshot);
        }
        Message::NavSvinfo(info) => {
            let snapshot =
                diagnostics_from_cnos(&info.carrier_to_noise(), state.time_to_first_fix());
            trace!(
                "Satellite snapshot: {} known, {} in view, quality {:.1}",
                snapshot.known_satellites, snapshot.satellites_in_view, snapshot.quality
            );
            state.replace_diagnostics(snapshot);
        }
        _ => {}
    }
}

fn accept_fix(location: Location, fix_tx: &watch::Sender<Option<Location>>) {
    trace!("Fix accepted: {:.7}, {:.7}", location.latitude, location.longitude);
    let _ = fix_tx.send(Some(location));
}
