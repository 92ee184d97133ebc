//! Command/response correlation.
//!
//! Commands go out through [`Commander::send`], which holds the writer lock
//! across the whole exchange so at most one command is in flight. The
//! receiver loop feeds every decoded message to [`PendingSlot::offer`]; when
//! one satisfies the armed expectation, the waiting sender is resolved.
//! Spurious or late responses find no matching expectation and fall through.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::sync::oneshot;
use tracing::{debug, trace};

use crate::error::{Result, UbxError};
use crate::frame::Frame;
use crate::messages::Message;
use crate::transport::TransportWriter;
use crate::types::MessageKind;

/// Class byte whose writes the device answers with ACK/NAK.
const CFG_CLASS: u8 = 0x06;

/// How a correlated command concluded.
#[derive(Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum CommandOutcome {
    /// The device accepted the command.
    Acked,
    /// The device explicitly rejected the command. Distinct from a timeout:
    /// the command arrived and the device said no.
    Rejected { class: u8, id: u8 },
    /// A poll-style response frame of the expected kind.
    Reply(Message),
}

/// What response would satisfy the in-flight command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Expectation {
    /// An ACK-ACK or ACK-NAK naming this class/id.
    Acknowledgement { class: u8, id: u8 },
    /// Any message of this kind (poll responses).
    Reply(MessageKind),
}

impl Expectation {
    /// The expectation matching a typed command: CFG-class writes await an
    /// acknowledgement, anything else awaits an echo of its own kind.
    pub(crate) fn for_command(command: &Message) -> Self {
        let (class, id) = command.kind().class_id();
        if class == CFG_CLASS {
            Expectation::Acknowledgement { class, id }
        } else {
            Expectation::Reply(command.kind())
        }
    }

    /// Checks a decoded message against this expectation.
    pub(crate) fn accepts(&self, message: &Message) -> Option<CommandOutcome> {
        match (self, message) {
            (Expectation::Acknowledgement { class, id }, Message::AckAck(ack))
                if ack.matches(*class, *id) =>
            {
                Some(CommandOutcome::Acked)
            }
            (Expectation::Acknowledgement { class, id }, Message::AckNak(nak))
                if nak.matches(*class, *id) =>
            {
                Some(CommandOutcome::Rejected { class: *class, id: *id })
            }
            (Expectation::Reply(kind), _) if message.kind() == *kind => {
                Some(CommandOutcome::Reply(message.clone()))
            }
            _ => None,
        }
    }
}

struct Pending {
    expectation: Expectation,
    resolve: oneshot::Sender<CommandOutcome>,
}

/// The at-most-one in-flight correlation token, shared between command
/// issuers and the receiver loop.
#[derive(Default)]
pub(crate) struct PendingSlot {
    pending: Mutex<Option<Pending>>,
    closed: Mutex<bool>,
}

impl PendingSlot {
    pub(crate) fn new() -> Self {
        PendingSlot::default()
    }

    /// Arms the slot with a fresh expectation, dropping any stale token so
    /// a late response for the previous command cannot leak through.
    pub(crate) fn arm(&self, expectation: Expectation) -> oneshot::Receiver<CommandOutcome> {
        let (resolve, receiver) = oneshot::channel();
        if *self.closed.lock().unwrap_or_else(PoisonError::into_inner) {
            // Dropping the sender here resolves the receiver with Closed.
            return receiver;
        }
        let stale = self
            .pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(Pending { expectation, resolve });
        if stale.is_some() {
            trace!("Replaced stale command expectation");
        }
        receiver
    }

    /// Clears the slot after a timeout so the next command starts clean.
    fn disarm(&self) {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner).take();
    }

    /// Offers a decoded message to the armed expectation. Returns whether it
    /// resolved the in-flight command. Safe to call when nothing is pending.
    pub(crate) fn offer(&self, message: &Message) -> bool {
        let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(token) = pending.as_ref() else {
            return false;
        };
        let Some(outcome) = token.expectation.accepts(message) else {
            return false;
        };
        if let Some(token) = pending.take() {
            // The issuer may have timed out and dropped its receiver; that
            // just discards the outcome.
            let _ = token.resolve.send(outcome);
        }
        true
    }

    /// Fails the in-flight command (if any) and every future one with
    /// [`UbxError::Closed`]. Called when the receiver loop exits.
    pub(crate) fn shutdown(&self) {
        *self.closed.lock().unwrap_or_else(PoisonError::into_inner) = true;
        self.disarm();
    }
}

/// Serialized write path plus correlation.
///
/// Every outgoing frame, correlated or fire-and-forget, goes through the
/// same async mutex, so frames never interleave on the wire and a second
/// caller blocks until the first command resolves or times out.
pub(crate) struct Commander {
    writer: tokio::sync::Mutex<Box<dyn TransportWriter>>,
    slot: Arc<PendingSlot>,
    settle_delay: Duration,
}

impl Commander {
    pub(crate) fn new(
        writer: Box<dyn TransportWriter>,
        slot: Arc<PendingSlot>,
        settle_delay: Duration,
    ) -> Self {
        Commander { writer: tokio::sync::Mutex::new(writer), slot, settle_delay }
    }

    /// Sends a frame and waits up to `timeout` for the expected response.
    pub(crate) async fn send(
        &self,
        frame: Frame,
        expectation: Expectation,
        timeout: Duration,
    ) -> Result<CommandOutcome> {
        let mut writer = self.writer.lock().await;
        let receiver = self.arm_and_write(&mut writer, &frame, expectation).await?;

        match tokio::time::timeout(timeout, receiver).await {
            Ok(Ok(outcome)) => {
                debug!("Command {:#04x}/{:#04x} resolved: {:?}", frame.class, frame.id, outcome);
                Ok(outcome)
            }
            Ok(Err(_)) => Err(UbxError::Closed),
            Err(_) => {
                self.slot.disarm();
                Err(UbxError::command_timeout(frame.class, frame.id, timeout))
            }
        }
    }

    /// Sends a frame without waiting for any response. Still serialized
    /// through the writer lock.
    pub(crate) async fn send_no_wait(&self, frame: Frame) -> Result<()> {
        let mut writer = self.writer.lock().await;
        writer.write_all_bytes(&frame.encode()).await?;
        self.settle().await;
        Ok(())
    }

    async fn arm_and_write(
        &self,
        writer: &mut Box<dyn TransportWriter>,
        frame: &Frame,
        expectation: Expectation,
    ) -> Result<oneshot::Receiver<CommandOutcome>> {
        let receiver = self.slot.arm(expectation);
        writer.write_all_bytes(&frame.encode()).await?;
        self.settle().await;
        Ok(receiver)
    }

    async fn settle(&self) {
        if !self.settle_delay.is_zero() {
            tokio::time::sleep(self.settle_delay).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messages::{Acknowledge, CfgMsg, CfgRate, MonVer};
    use tokio::io::AsyncReadExt;

    fn cfg_command() -> Message {
        Message::CfgMsg(CfgMsg { msg_class: 0x01, msg_id: 0x07, rate: 1 })
    }

    fn ack_for(class: u8, id: u8) -> Message {
        Message::AckAck(Acknowledge { msg_class: class, msg_id: id })
    }

    fn nak_for(class: u8, id: u8) -> Message {
        Message::AckNak(Acknowledge { msg_class: class, msg_id: id })
    }

    fn commander() -> (Arc<PendingSlot>, Commander, tokio::io::DuplexStream) {
        let (writer, peer) = tokio::io::duplex(4096);
        let slot = Arc::new(PendingSlot::new());
        let commander = Commander::new(Box::new(writer), Arc::clone(&slot), Duration::ZERO);
        (slot, commander, peer)
    }

    #[test]
    fn expectation_for_cfg_commands_is_acknowledgement() {
        let expectation = Expectation::for_command(&cfg_command());
        assert_eq!(expectation, Expectation::Acknowledgement { class: 0x06, id: 0x01 });
    }

    #[test]
    fn expectation_accepts_matching_ack_and_nak() {
        let expectation = Expectation::Acknowledgement { class: 0x06, id: 0x01 };

        assert_eq!(expectation.accepts(&ack_for(0x06, 0x01)), Some(CommandOutcome::Acked));
        assert_eq!(
            expectation.accepts(&nak_for(0x06, 0x01)),
            Some(CommandOutcome::Rejected { class: 0x06, id: 0x01 })
        );
        assert_eq!(expectation.accepts(&ack_for(0x06, 0x08)), None);
        assert_eq!(expectation.accepts(&nak_for(0x0A, 0x04)), None);
    }

    #[test]
    fn expectation_reply_matches_kind_only() {
        let expectation = Expectation::Reply(MessageKind::MonVer);
        let report = Message::MonVer(MonVer {
            software_version: "1.00".to_string(),
            hardware_version: "00080000".to_string(),
            extensions: vec![],
        });

        assert!(matches!(expectation.accepts(&report), Some(CommandOutcome::Reply(_))));
        assert_eq!(expectation.accepts(&ack_for(0x0A, 0x04)), None);
    }

    #[test]
    fn offer_without_pending_is_dropped() {
        let slot = PendingSlot::new();
        assert!(!slot.offer(&ack_for(0x06, 0x01)));
    }

    #[tokio::test]
    async fn send_resolves_on_matching_ack() {
        let (slot, commander, mut peer) = commander();
        let command = cfg_command();
        let frame = command.to_frame();

        let send = tokio::spawn(async move {
            commander
                .send(frame, Expectation::for_command(&command), Duration::from_secs(5))
                .await
        });

        // The wire carries the encoded frame before any resolution.
        let mut wire = vec![0u8; cfg_command().to_frame().encode().len()];
        peer.read_exact(&mut wire).await.unwrap();
        assert_eq!(wire, cfg_command().to_frame().encode());

        assert!(slot.offer(&ack_for(0x06, 0x01)));
        assert_eq!(send.await.unwrap().unwrap(), CommandOutcome::Acked);
    }

    #[tokio::test]
    async fn nak_reports_rejection_not_timeout() {
        let (slot, commander, _peer) = commander();
        let command = cfg_command();
        let frame = command.to_frame();

        let send = tokio::spawn(async move {
            commander
                .send(frame, Expectation::for_command(&command), Duration::from_secs(5))
                .await
        });

        tokio::task::yield_now().await;
        while !slot.offer(&nak_for(0x06, 0x01)) {
            tokio::task::yield_now().await;
        }

        assert_eq!(
            send.await.unwrap().unwrap(),
            CommandOutcome::Rejected { class: 0x06, id: 0x01 }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_surfaces_and_slot_is_reusable() {
        let (slot, commander, _peer) = commander();
        let command = cfg_command();
        let timeout = Duration::from_millis(250);

        let started = tokio::time::Instant::now();
        let err = commander
            .send(command.to_frame(), Expectation::for_command(&command), timeout)
            .await
            .unwrap_err();
        assert!(matches!(err, UbxError::CommandTimeout { class: 0x06, id: 0x01, .. }));
        assert_eq!(started.elapsed(), timeout);

        // A late response finds nothing armed.
        assert!(!slot.offer(&ack_for(0x06, 0x01)));

        // The slot is reusable: the next command correlates normally.
        let retry = tokio::spawn({
            let frame = command.to_frame();
            let expectation = Expectation::for_command(&command);
            async move { commander.send(frame, expectation, timeout).await }
        });
        tokio::task::yield_now().await;
        while !slot.offer(&ack_for(0x06, 0x01)) {
            tokio::task::yield_now().await;
        }
        assert_eq!(retry.await.unwrap().unwrap(), CommandOutcome::Acked);
    }

    #[tokio::test]
    async fn second_send_waits_for_first_to_resolve() {
        let (slot, commander, _peer) = commander();
        let commander = Arc::new(commander);

        let first = tokio::spawn({
            let commander = Arc::clone(&commander);
            async move {
                let command = cfg_command();
                let frame = command.to_frame();
                commander
                    .send(frame, Expectation::for_command(&command), Duration::from_secs(5))
                    .await
            }
        });
        tokio::task::yield_now().await;

        let second_command =
            Message::CfgRate(CfgRate { measure_rate_ms: 1000, nav_rate: 1, time_ref: 0 });
        let second = tokio::spawn({
            let commander = Arc::clone(&commander);
            let frame = second_command.to_frame();
            let expectation = Expectation::for_command(&second_command);
            async move { commander.send(frame, expectation, Duration::from_secs(5)).await }
        });
        tokio::task::yield_now().await;

        // Only the first command's expectation is armed; an ACK for the
        // second finds no taker until the first resolves.
        assert!(!slot.offer(&ack_for(0x06, 0x08)));
        while !slot.offer(&ack_for(0x06, 0x01)) {
            tokio::task::yield_now().await;
        }
        assert_eq!(first.await.unwrap().unwrap(), CommandOutcome::Acked);

        while !slot.offer(&ack_for(0x06, 0x08)) {
            tokio::task::yield_now().await;
        }
        assert_eq!(second.await.unwrap().unwrap(), CommandOutcome::Acked);
    }

    #[tokio::test]
    async fn shutdown_fails_pending_and_future_sends() {
        let (slot, commander, _peer) = commander();
        let commander = Arc::new(commander);

        let pending = tokio::spawn({
            let commander = Arc::clone(&commander);
            async move {
                let command = cfg_command();
                let frame = command.to_frame();
                commander
                    .send(frame, Expectation::for_command(&command), Duration::from_secs(5))
                    .await
            }
        });
        tokio::task::yield_now().await;

        slot.shutdown();
        assert!(matches!(pending.await.unwrap(), Err(UbxError::Closed)));

        let command = cfg_command();
        let err = commander
            .send(command.to_frame(), Expectation::for_command(&command), Duration::from_secs(5))
            .await
            .unwrap_err();
        assert!(matches!(err, UbxError::Closed));
    }
}
