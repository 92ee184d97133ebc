//! Typed UBX message codec.
//!
//! This module turns validated [`Frame`]s into typed messages and typed
//! commands back into frames. Field layouts follow the u-blox interface
//! description; every multi-byte field is little-endian.
//!
//! Decoding is total over the handled set: a frame whose class/id the driver
//! does not know decodes to `Ok(None)` and is ignored upstream, while a known
//! kind with an uninterpretable payload is a [`UbxError::Decode`].

mod ack;
mod cfg;
mod mon;
mod nav;

pub use ack::Acknowledge;
pub use cfg::{CfgMsg, CfgRate};
pub use mon::MonVer;
pub use nav::{
    FIX_TYPE_2D, FIX_TYPE_3D, FIX_TYPE_GNSS_DR, FIX_TYPE_NONE, NavPosllh, NavPvt, NavSat,
    NavStatus, NavSvinfo, SatelliteInfo, SvChannel,
};

use serde::{Deserialize, Serialize};

use crate::error::{Result, UbxError};
use crate::frame::Frame;
use crate::types::MessageKind;

/// Every message kind the driver understands, as a tagged union.
///
/// The receiver loop matches on this exhaustively, so adding a kind here
/// forces every dispatch site to say what happens to it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Message {
    NavPvt(NavPvt),
    NavPosllh(NavPosllh),
    NavStatus(NavStatus),
    NavSat(NavSat),
    NavSvinfo(NavSvinfo),
    AckAck(Acknowledge),
    AckNak(Acknowledge),
    MonVer(MonVer),
    CfgMsg(CfgMsg),
    CfgRate(CfgRate),
}

impl Message {
    /// Decodes one frame's payload given its class/id.
    ///
    /// Returns `Ok(None)` for class/id pairs outside the handled set.
    pub fn decode(class: u8, id: u8, payload: &[u8]) -> Result<Option<Message>> {
        let Some(kind) = MessageKind::from_class_id(class, id) else {
            return Ok(None);
        };
        let message = match kind {
            MessageKind::NavPvt => Message::NavPvt(NavPvt::decode(payload)?),
            MessageKind::NavPosllh => Message::NavPosllh(NavPosllh::decode(payload)?),
            MessageKind::NavStatus => Message::NavStatus(NavStatus::decode(payload)?),
            MessageKind::NavSat => Message::NavSat(NavSat::decode(payload)?),
            MessageKind::NavSvinfo => Message::NavSvinfo(NavSvinfo::decode(payload)?),
            MessageKind::AckAck => Message::AckAck(Acknowledge::decode(payload)?),
            MessageKind::AckNak => Message::AckNak(Acknowledge::decode(payload)?),
            MessageKind::MonVer => Message::MonVer(MonVer::decode(payload)?),
            MessageKind::CfgMsg => Message::CfgMsg(CfgMsg::decode(payload)?),
            MessageKind::CfgRate => Message::CfgRate(CfgRate::decode(payload)?),
        };
        Ok(Some(message))
    }

    /// Decodes a scanned frame.
    pub fn from_frame(frame: &Frame) -> Result<Option<Message>> {
        Message::decode(frame.class, frame.id, &frame.payload)
    }

    /// The kind tag of this message.
    pub fn kind(&self) -> MessageKind {
        match self {
            Message::NavPvt(_) => MessageKind::NavPvt,
            Message::NavPosllh(_) => MessageKind::NavPosllh,
            Message::NavStatus(_) => MessageKind::NavStatus,
            Message::NavSat(_) => MessageKind::NavSat,
            Message::NavSvinfo(_) => MessageKind::NavSvinfo,
            Message::AckAck(_) => MessageKind::AckAck,
            Message::AckNak(_) => MessageKind::AckNak,
            Message::MonVer(_) => MessageKind::MonVer,
            Message::CfgMsg(_) => MessageKind::CfgMsg,
            Message::CfgRate(_) => MessageKind::CfgRate,
        }
    }

    /// Serializes this message's payload bytes.
    pub fn encode_payload(&self) -> Vec<u8> {
        match self {
            Message::NavPvt(m) => m.encode(),
            Message::NavPosllh(m) => m.encode(),
            Message::NavStatus(m) => m.encode(),
            Message::NavSat(m) => m.encode(),
            Message::NavSvinfo(m) => m.encode(),
            Message::AckAck(m) => m.encode(),
            Message::AckNak(m) => m.encode(),
            Message::MonVer(m) => m.encode(),
            Message::CfgMsg(m) => m.encode(),
            Message::CfgRate(m) => m.encode(),
        }
    }

    /// Wraps this message into a sendable frame.
    pub fn to_frame(&self) -> Frame {
        let (class, id) = self.kind().class_id();
        Frame::new(class, id, self.encode_payload())
    }
}

// Little-endian field readers shared by the payload decoders. Each failure
// names the message kind and the offending offset.

pub(crate) fn short_payload(kind: &str, payload: &[u8], wanted: usize) -> UbxError {
    UbxError::decode_error(
        kind,
        format!("payload is {} bytes, need at least {}", payload.len(), wanted),
    )
}

pub(crate) fn expect_len(kind: &str, payload: &[u8], len: usize) -> Result<()> {
    if payload.len() != len {
        return Err(UbxError::decode_error(
            kind,
            format!("payload is {} bytes, expected {}", payload.len(), len),
        ));
    }
    Ok(())
}

pub(crate) fn expect_min_len(kind: &str, payload: &[u8], len: usize) -> Result<()> {
    if payload.len() < len {
        return Err(short_payload(kind, payload, len));
    }
    Ok(())
}

pub(crate) fn read_u8(kind: &str, payload: &[u8], offset: usize) -> Result<u8> {
    payload.get(offset).copied().ok_or_else(|| short_payload(kind, payload, offset + 1))
}

pub(crate) fn read_i8(kind: &str, payload: &[u8], offset: usize) -> Result<i8> {
    Ok(read_u8(kind, payload, offset)? as i8)
}

pub(crate) fn read_u16(kind: &str, payload: &[u8], offset: usize) -> Result<u16> {
    let bytes = payload
        .get(offset..offset + 2)
        .ok_or_else(|| short_payload(kind, payload, offset + 2))?;
    Ok(u16::from_le_bytes([bytes[0], bytes[1]]))
}

pub(crate) fn read_i16(kind: &str, payload: &[u8], offset: usize) -> Result<i16> {
    Ok(read_u16(kind, payload, offset)? as i16)
}

pub(crate) fn read_u32(kind: &str, payload: &[u8], offset: usize) -> Result<u32> {
    let bytes = payload
        .get(offset..offset + 4)
        .ok_or_else(|| short_payload(kind, payload, offset + 4))?;
    Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}

pub(crate) fn read_i32(kind: &str, payload: &[u8], offset: usize) -> Result<i32> {
    Ok(read_u32(kind, payload, offset)? as i32)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn representative_messages() -> Vec<Message> {
        vec![
            Message::AckAck(Acknowledge { msg_class: 0x06, msg_id: 0x01 }),
            Message::AckNak(Acknowledge { msg_class: 0x06, msg_id: 0x08 }),
            Message::CfgMsg(CfgMsg { msg_class: 0x01, msg_id: 0x07, rate: 1 }),
            Message::CfgRate(CfgRate { measure_rate_ms: 1000, nav_rate: 1, time_ref: 0 }),
            Message::NavStatus(NavStatus {
                i_tow: 123456,
                gps_fix: FIX_TYPE_3D,
                flags: 0x01,
                fix_status: 0,
                flags2: 0,
                time_to_first_fix_ms: 32100,
                uptime_ms: 64000,
            }),
            Message::NavPosllh(NavPosllh {
                i_tow: 123456,
                longitude_e7: -1_224_926_436,
                latitude_e7: 376_551_811,
                height_mm: -13_707,
                height_msl_mm: 16_303,
                horizontal_accuracy_mm: 83_757,
                vertical_accuracy_mm: 468_059,
            }),
            Message::NavSat(NavSat {
                i_tow: 987,
                satellites: vec![
                    SatelliteInfo {
                        gnss_id: 0,
                        sv_id: 7,
                        cno: 41,
                        elevation: 63,
                        azimuth: 212,
                        pseudorange_residual: -4,
                        flags: 0x19,
                    },
                    SatelliteInfo {
                        gnss_id: 6,
                        sv_id: 3,
                        cno: 0,
                        elevation: -8,
                        azimuth: 45,
                        pseudorange_residual: 0,
                        flags: 0x11,
                    },
                ],
            }),
            Message::MonVer(MonVer {
                software_version: "ROM CORE 3.01 (107888)".to_string(),
                hardware_version: "00080000".to_string(),
                extensions: vec!["FWVER=SPG 3.01".to_string(), "PROTVER=18.00".to_string()],
            }),
        ]
    }

    #[test]
    fn unknown_class_id_decodes_to_none() {
        assert_eq!(Message::decode(0x02, 0x15, &[0x00; 8]).unwrap(), None);
        assert_eq!(Message::decode(0xF0, 0x00, &[]).unwrap(), None);
    }

    #[test]
    fn known_kind_with_short_payload_is_a_decode_error() {
        let result = Message::decode(0x01, 0x07, &[0x00; 10]);
        assert!(matches!(result, Err(UbxError::Decode { .. })));
    }

    #[test]
    fn codec_frames_roundtrip() {
        for message in representative_messages() {
            let frame = message.to_frame();
            let wire = frame.encode();

            let decoded = Message::from_frame(&frame)
                .unwrap()
                .unwrap_or_else(|| panic!("{} did not decode", message.kind()));
            assert_eq!(decoded, message);
            // Wire bytes regenerate exactly from the decoded form.
            assert_eq!(decoded.to_frame().encode(), wire);
        }
    }

    #[test]
    fn message_kind_matches_frame_identity() {
        for message in representative_messages() {
            let frame = message.to_frame();
            assert_eq!(frame.kind(), Some(message.kind()));
        }
    }

    #[test]
    fn readers_report_offsets_out_of_bounds() {
        let payload = [0x01, 0x02, 0x03];
        assert!(read_u8("TEST", &payload, 2).is_ok());
        assert!(read_u8("TEST", &payload, 3).is_err());
        assert!(read_u16("TEST", &payload, 2).is_err());
        assert!(read_u32("TEST", &payload, 0).is_err());
        assert_eq!(read_u16("TEST", &payload, 0).unwrap(), 0x0201);
    }
}
