//! CFG-class payloads: the configuration commands the driver issues.

use serde::{Deserialize, Serialize};

use super::{expect_len, read_u8, read_u16};
use crate::error::Result;
use crate::types::MessageKind;

const CFG_MSG_LEN: usize = 3;
const CFG_RATE_LEN: usize = 6;

/// UBX-CFG-MSG in its current-port form: set the output rate of one
/// message kind on the port the command arrives on.
///
/// A rate of 1 emits the message on every navigation solution, N on every
/// Nth, 0 disables it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CfgMsg {
    pub msg_class: u8,
    pub msg_id: u8,
    pub rate: u8,
}

impl CfgMsg {
    /// Rate command for one of the driver's own message kinds.
    pub fn for_kind(kind: MessageKind, rate: u8) -> Self {
        let (msg_class, msg_id) = kind.class_id();
        CfgMsg { msg_class, msg_id, rate }
    }

    pub fn decode(payload: &[u8]) -> Result<Self> {
        const KIND: &str = "CFG-MSG";
        expect_len(KIND, payload, CFG_MSG_LEN)?;
        Ok(CfgMsg {
            msg_class: read_u8(KIND, payload, 0)?,
            msg_id: read_u8(KIND, payload, 1)?,
            rate: read_u8(KIND, payload, 2)?,
        })
    }

    pub fn encode(&self) -> Vec<u8> {
        vec![self.msg_class, self.msg_id, self.rate]
    }
}

/// UBX-CFG-RATE: the navigation measurement and solution cadence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CfgRate {
    /// Time between GNSS measurements in milliseconds
    pub measure_rate_ms: u16,
    /// Measurements per navigation solution
    pub nav_rate: u16,
    /// Alignment reference: 0 UTC, 1 GPS time
    pub time_ref: u16,
}

impl CfgRate {
    pub fn decode(payload: &[u8]) -> Result<Self> {
        const KIND: &str = "CFG-RATE";
        expect_len(KIND, payload, CFG_RATE_LEN)?;
        Ok(CfgRate {
            measure_rate_ms: read_u16(KIND, payload, 0)?,
            nav_rate: read_u16(KIND, payload, 2)?,
            time_ref: read_u16(KIND, payload, 4)?,
        })
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(CFG_RATE_LEN);
        out.extend_from_slice(&self.measure_rate_ms.to_le_bytes());
        out.extend_from_slice(&self.nav_rate.to_le_bytes());
        out.extend_from_slice(&self.time_ref.to_le_bytes());
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messages::Message;

    #[test]
    fn cfg_msg_disable_nmea_gga_matches_wire_bytes() {
        // Zeroing the GGA rate on the current port.
        let wire = Message::CfgMsg(CfgMsg { msg_class: 0xF0, msg_id: 0x00, rate: 0 })
            .to_frame()
            .encode();
        assert_eq!(
            wire,
            vec![0xB5, 0x62, 0x06, 0x01, 0x03, 0x00, 0xF0, 0x00, 0x00, 0xFA, 0x0F]
        );
    }

    #[test]
    fn cfg_msg_for_kind_uses_class_id() {
        let cfg = CfgMsg::for_kind(MessageKind::NavPvt, 1);
        assert_eq!(cfg, CfgMsg { msg_class: 0x01, msg_id: 0x07, rate: 1 });
    }

    #[test]
    fn cfg_rate_roundtrip() {
        let rate = CfgRate { measure_rate_ms: 1000, nav_rate: 1, time_ref: 0 };
        let payload = rate.encode();
        assert_eq!(payload, vec![0xE8, 0x03, 0x01, 0x00, 0x00, 0x00]);
        assert_eq!(CfgRate::decode(&payload).unwrap(), rate);
    }

    #[test]
    fn cfg_payload_lengths_are_enforced() {
        assert!(CfgMsg::decode(&[0x01, 0x07]).is_err());
        assert!(CfgRate::decode(&[0xE8, 0x03, 0x01, 0x00]).is_err());
    }
}
