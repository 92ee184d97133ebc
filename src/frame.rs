//! UBX wire framing: the frame record, checksum, and the stream scanner.
//!
//! Wire layout: `[0xB5, 0x62, class, id, len:u16-LE, payload, ck_a, ck_b]`.
//! The checksum is the two-accumulator Fletcher variant over class, id, both
//! length bytes, and the payload.
//!
//! [`FrameScanner`] pulls validated frames out of an unreliable byte stream.
//! Recovery is always one byte at a time: garbage before a sync marker,
//! implausible length fields, and checksum mismatches each discard a single
//! byte and rescan, so a false sync match inside a payload cannot
//! permanently desynchronize the stream.

use std::collections::VecDeque;

use tracing::{trace, warn};

use crate::types::MessageKind;

/// First UBX sync byte.
pub const SYNC_1: u8 = 0xB5;
/// Second UBX sync byte.
pub const SYNC_2: u8 = 0x62;

/// Sync (2) + class + id + length (2).
const HEADER_LEN: usize = 6;
/// Everything around the payload: header plus the two checksum bytes.
const FRAME_OVERHEAD: usize = 8;

/// Largest payload the scanner will accept. The longest documented UBX
/// payload is just over 1 KiB; a declared length beyond this is treated as
/// a corrupted header rather than buffered.
pub const MAX_PAYLOAD_LEN: usize = 1240;

/// Computes the UBX checksum over the given bytes.
///
/// Callers feed it the checked region: class, id, length bytes, payload.
pub fn checksum(bytes: impl IntoIterator<Item = u8>) -> (u8, u8) {
    let mut ck_a: u8 = 0;
    let mut ck_b: u8 = 0;
    for byte in bytes {
        ck_a = ck_a.wrapping_add(byte);
        ck_b = ck_b.wrapping_add(ck_a);
    }
    (ck_a, ck_b)
}

/// One complete, checksum-validated UBX frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub class: u8,
    pub id: u8,
    pub payload: Vec<u8>,
}

impl Frame {
    pub fn new(class: u8, id: u8, payload: Vec<u8>) -> Self {
        Frame { class, id, payload }
    }

    /// The typed kind of this frame, if the driver knows the class/id pair.
    pub fn kind(&self) -> Option<MessageKind> {
        MessageKind::from_class_id(self.class, self.id)
    }

    /// Serializes the frame into its wire form, checksum included.
    pub fn encode(&self) -> Vec<u8> {
        let len = self.payload.len() as u16;
        let mut wire = Vec::with_capacity(self.payload.len() + FRAME_OVERHEAD);
        wire.push(SYNC_1);
        wire.push(SYNC_2);
        wire.push(self.class);
        wire.push(self.id);
        wire.extend_from_slice(&len.to_le_bytes());
        wire.extend_from_slice(&self.payload);
        let (ck_a, ck_b) = checksum(wire[2..].iter().copied());
        wire.push(ck_a);
        wire.push(ck_b);
        wire
    }
}

/// Incremental scanner over a buffered byte stream.
///
/// Feed raw transport reads in with [`push`](Self::push), then drain
/// validated frames with [`next_frame`](Self::next_frame). Bytes that do not
/// form a valid frame are discarded one at a time; the counters record how
/// much noise the stream carried.
#[derive(Debug, Default)]
pub struct FrameScanner {
    buffer: VecDeque<u8>,
    bytes_discarded: u64,
    checksum_failures: u64,
}

impl FrameScanner {
    pub fn new() -> Self {
        FrameScanner::default()
    }

    /// Appends raw bytes from the transport.
    pub fn push(&mut self, bytes: &[u8]) {
        self.buffer.extend(bytes.iter().copied());
    }

    /// Bytes currently buffered, waiting to form a frame.
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Total bytes dropped during resynchronization.
    pub fn bytes_discarded(&self) -> u64 {
        self.bytes_discarded
    }

    /// Candidate frames rejected by the checksum.
    pub fn checksum_failures(&self) -> u64 {
        self.checksum_failures
    }

    /// Extracts the next validated frame, or `None` if the buffer does not
    /// yet hold a complete one. Call repeatedly after each `push`; a single
    /// read can complete several frames.
    pub fn next_frame(&mut self) -> Option<Frame> {
        loop {
            // Hunt for the sync marker, shedding noise one byte at a time.
            loop {
                match (self.buffer.front().copied(), self.buffer.get(1).copied()) {
                    (Some(SYNC_1), Some(SYNC_2)) => break,
                    (_, None) => return None,
                    _ => self.discard_one(),
                }
            }

            if self.buffer.len() < HEADER_LEN {
                return None;
            }

            let length = u16::from_le_bytes([self.buffer[4], self.buffer[5]]) as usize;
            if length > MAX_PAYLOAD_LEN {
                trace!("Implausible payload length {}, resynchronizing", length);
                self.discard_one();
                continue;
            }

            let total = length + FRAME_OVERHEAD;
            if self.buffer.len() < total {
                return None;
            }

            let (ck_a, ck_b) = checksum(self.buffer.iter().copied().skip(2).take(length + 4));
            if ck_a != self.buffer[total - 2] || ck_b != self.buffer[total - 1] {
                warn!(
                    "Checksum mismatch on {:#04x}/{:#04x}, resynchronizing",
                    self.buffer[2], self.buffer[3]
                );
                self.checksum_failures += 1;
                // One byte only, so a frame hiding inside this candidate
                // still gets found.
                self.discard_one();
                continue;
            }

            let wire: Vec<u8> = self.buffer.drain(..total).collect();
            return Some(Frame {
                class: wire[2],
                id: wire[3],
                payload: wire[HEADER_LEN..HEADER_LEN + length].to_vec(),
            });
        }
    }

    fn discard_one(&mut self) {
        if self.buffer.pop_front().is_some() {
            self.bytes_discarded += 1;
        }
    }
}
