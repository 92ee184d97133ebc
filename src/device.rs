//! The public device handle: attach, query, command, close.

use std::sync::Arc;
use std::time::Duration;

use futures::{Stream, StreamExt};
use tokio::sync::{mpsc, oneshot, watch};
use tokio_stream::wrappers::WatchStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::command::{CommandOutcome, Commander, Expectation, PendingSlot};
use crate::driver::{Control, Driver};
use crate::error::{Result, UbxError};
use crate::messages::{CfgRate, Message};
use crate::negotiate;
use crate::state::SharedState;
use crate::transport::{TransportReader, TransportWriter};
use crate::types::{DeviceOptions, DeviceProfile, Diagnostics, Location};

/// Handle to a GNSS receiver speaking the UBX protocol.
///
/// Created by [`Device::attach`], which spawns the receiver loop, negotiates
/// the protocol version, and subscribes to the navigation messages for the
/// resolved message set. All methods take `&self`; the handle is cheap to
/// share behind an `Arc`.
pub struct Device {
    commander: Arc<Commander>,
    state: Arc<SharedState>,
    profile: DeviceProfile,
    options: DeviceOptions,

    /// Latest accepted fix from the receiver loop
    fixes: watch::Receiver<Option<Location>>,

    /// Control requests into the receiver loop
    control: mpsc::UnboundedSender<Control>,

    /// Cancellation token for stopping the loop
    cancel: CancellationToken,
}

impl Device {
    /// Attaches to a receiver over the given transport halves.
    ///
    /// Spawns the receiver loop, waits out the flush window so boot-time
    /// output drains through the scanner, polls MON-VER to resolve the
    /// protocol version, then issues the rate subscriptions for the
    /// selected message set. Returns once the device is configured.
    pub async fn attach<R, W>(reader: R, writer: W, options: DeviceOptions) -> Result<Self>
    where
        R: TransportReader,
        W: TransportWriter,
    {
        info!("Attaching to receiver");

        let state = Arc::new(SharedState::new());
        let slot = Arc::new(PendingSlot::new());
        let commander =
            Arc::new(Commander::new(Box::new(writer), Arc::clone(&slot), options.settle_delay));

        let channels = Driver::spawn(reader, Arc::clone(&state), Arc::clone(&slot));
        if channels.ready.await.is_err() {
            return Err(UbxError::Closed);
        }

        if !options.flush_window.is_zero() {
            tokio::time::sleep(options.flush_window).await;
        }

        let profile = match negotiate::negotiate(&commander, &options).await {
            Ok(profile) => profile,
            Err(e) => {
                channels.cancel.cancel();
                return Err(e);
            }
        };
        if let Err(e) = negotiate::subscribe(&commander, &profile, &options).await {
            channels.cancel.cancel();
            return Err(e);
        }
        if options.disable_nmea {
            negotiate::disable_nmea(&commander, &options).await;
        }

        info!("Receiver attached (PROTVER {})", profile.protocol_version);

        Ok(Device {
            commander,
            state,
            profile,
            options,
            fixes: channels.fixes,
            control: channels.control,
            cancel: channels.cancel,
        })
    }

    /// The identity and message set resolved during attach.
    pub fn profile(&self) -> &DeviceProfile {
        &self.profile
    }

    /// The latest accepted fix, or `None` before the first one.
    pub fn location(&self) -> Option<Location> {
        *self.fixes.borrow()
    }

    /// Waits until the receiver reports a valid fix.
    ///
    /// Returns immediately when a fix is already held. The wait itself is
    /// unbounded; a cold start legitimately takes minutes, so callers with a
    /// deadline should wrap this in [`tokio::time::timeout`]. Every
    /// concurrent caller observes the same fix. Fails with
    /// [`UbxError::Closed`] once the receiver loop has stopped.
    pub async fn wait_for_location(&self) -> Result<Location> {
        let mut fixes = self.fixes.clone();
        let fix = fixes.wait_for(|fix| fix.is_some()).await.map_err(|_| UbxError::Closed)?;
        match *fix {
            Some(location) => Ok(location),
            None => Err(UbxError::Closed),
        }
    }

    /// Stream of accepted fixes.
    ///
    /// Yields the current fix immediately (if any), then every subsequent
    /// one. Ends when the receiver loop stops.
    pub fn fix_updates(&self) -> impl Stream<Item = Location> + 'static {
        WatchStream::new(self.fixes.clone()).filter_map(|fix| async move { fix })
    }

    /// Satellite diagnostics from the latest satellite-info message, with
    /// the time to first fix folded in.
    pub fn diagnostics(&self) -> Diagnostics {
        self.state.diagnostics()
    }

    /// Device-reported time to first fix. Zero until the device latches a
    /// value; stable afterwards until [`Device::reset`].
    pub fn time_to_first_fix(&self) -> Duration {
        self.state.time_to_first_fix()
    }

    /// Sends a typed command and waits up to `timeout` for its correlated
    /// acknowledgement or reply. At most one command is in flight; a second
    /// caller waits for the first to resolve.
    pub async fn send(&self, command: Message, timeout: Duration) -> Result<CommandOutcome> {
        let expectation = Expectation::for_command(&command);
        self.commander.send(command.to_frame(), expectation, timeout).await
    }

    /// Sends a command without waiting for any response. Writes are still
    /// serialized with correlated commands.
    pub async fn send_no_wait(&self, command: Message) -> Result<()> {
        self.commander.send_no_wait(command.to_frame()).await
    }

    /// Sets the measurement period in milliseconds via CFG-RATE, with one
    /// navigation solution per measurement and UTC time alignment.
    pub async fn set_measurement_rate(&self, period_ms: u16) -> Result<CommandOutcome> {
        let command =
            Message::CfgRate(CfgRate { measure_rate_ms: period_ms, nav_rate: 1, time_ref: 0 });
        self.send(command, self.options.command_timeout).await
    }

    /// Clears the driver's fix, diagnostics, and time-to-first-fix state.
    /// Device configuration is untouched; the next reports repopulate the
    /// state, and the time-to-first-fix latch reopens.
    pub async fn reset(&self) -> Result<()> {
        let (done, confirmed) = oneshot::channel();
        self.control
            .send(Control::Reset { done })
            .map_err(|_| UbxError::Closed)?;
        confirmed.await.map_err(|_| UbxError::Closed)
    }

    /// Stops the receiver loop. Outstanding location waiters and in-flight
    /// commands fail with [`UbxError::Closed`], as do later calls. Dropping
    /// the handle closes it too.
    pub fn close(&self) {
        self.cancel.cancel();
    }
}

impl Drop for Device {
    fn drop(&mut self) {
        debug!("Dropping device handle");
        self.cancel.cancel();
    }
}
