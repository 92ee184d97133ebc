//! ACK-class payloads.
//!
//! The device answers every CFG-class write with either ACK-ACK (0x05/0x01)
//! or ACK-NAK (0x05/0x00). Both carry the same two-byte payload naming the
//! class/id of the message being answered.

use serde::{Deserialize, Serialize};

use super::{expect_len, read_u8};
use crate::error::Result;

const ACK_LEN: usize = 2;

/// Payload of an ACK-ACK or ACK-NAK frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Acknowledge {
    /// Class of the message being acknowledged
    pub msg_class: u8,
    /// Id of the message being acknowledged
    pub msg_id: u8,
}

impl Acknowledge {
    pub fn decode(payload: &[u8]) -> Result<Self> {
        const KIND: &str = "ACK";
        expect_len(KIND, payload, ACK_LEN)?;
        Ok(Acknowledge {
            msg_class: read_u8(KIND, payload, 0)?,
            msg_id: read_u8(KIND, payload, 1)?,
        })
    }

    pub fn encode(&self) -> Vec<u8> {
        vec![self.msg_class, self.msg_id]
    }

    /// Whether this acknowledgement answers the given class/id.
    pub fn matches(&self, class: u8, id: u8) -> bool {
        self.msg_class == class && self.msg_id == id
    }
}
