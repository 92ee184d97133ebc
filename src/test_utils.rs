//! Shared fixtures for tests and benchmarks: canned messages, wire bytes,
//! and a scripted transport reader.

#![cfg(any(test, feature = "benchmark"))]

use std::collections::VecDeque;
use std::io;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::{Result, UbxError};
use crate::messages::{
    Acknowledge, Message, MonVer, NavPosllh, NavPvt, NavSat, NavStatus, NavSvinfo, SatelliteInfo,
    SvChannel,
};
use crate::transport::TransportReader;

/// NAV-PVT reporting a 3D fix at the given 1e-7 scaled coordinates.
pub fn fix_pvt(latitude_e7: i32, longitude_e7: i32) -> NavPvt {
    NavPvt {
        i_tow: 356_000_000,
        year: 0,
        month: 0,
        day: 0,
        hour: 0,
        minute: 0,
        second: 0,
        valid: 0,
        time_accuracy_ns: 0,
        nanosecond: 0,
        fix_type: 3,
        flags: 0,
        flags2: 0,
        satellites_used: 7,
        longitude_e7,
        latitude_e7,
        height_mm: 120_000,
        height_msl_mm: 90_000,
        horizontal_accuracy_mm: 2_500,
        vertical_accuracy_mm: 4_000,
        velocity_north_mm_s: 0,
        velocity_east_mm_s: 0,
        velocity_down_mm_s: 0,
        ground_speed_mm_s: 0,
        heading_e5: 0,
        speed_accuracy_mm_s: 0,
        heading_accuracy_e5: 0,
        p_dop: 250,
    }
}

/// NAV-PVT with no fix; position fields carry stale values on real devices.
pub fn no_fix_pvt() -> NavPvt {
    NavPvt { fix_type: 0, satellites_used: 0, ..fix_pvt(0, 0) }
}

pub fn nav_status(fixed: bool, time_to_first_fix_ms: u32) -> NavStatus {
    NavStatus {
        i_tow: 356_000_000,
        gps_fix: if fixed { 3 } else { 0 },
        flags: if fixed { 0x0D } else { 0x00 },
        fix_status: 0,
        flags2: 0,
        time_to_first_fix_ms,
        uptime_ms: 60_000,
    }
}

pub fn posllh(latitude_e7: i32, longitude_e7: i32) -> NavPosllh {
    NavPosllh {
        i_tow: 356_000_000,
        longitude_e7,
        latitude_e7,
        height_mm: 120_000,
        height_msl_mm: 90_000,
        horizontal_accuracy_mm: 2_500,
        vertical_accuracy_mm: 4_000,
    }
}

/// NAV-SAT with one satellite per carrier-to-noise entry.
pub fn nav_sat(carrier_to_noise: &[u8]) -> NavSat {
    NavSat {
        i_tow: 356_000_000,
        satellites: carrier_to_noise
            .iter()
            .enumerate()
            .map(|(index, &cno)| SatelliteInfo {
                gnss_id: 0,
                sv_id: index as u8 + 1,
                cno,
                elevation: 45,
                azimuth: 0,
                pseudorange_residual: 0,
                flags: if cno > 0 { 0x0C } else { 0x00 },
            })
            .collect(),
    }
}

/// NAV-SVINFO with one channel per carrier-to-noise entry.
pub fn nav_svinfo(carrier_to_noise: &[u8]) -> NavSvinfo {
    NavSvinfo {
        i_tow: 356_000_000,
        global_flags: 0,
        channels: carrier_to_noise
            .iter()
            .enumerate()
            .map(|(index, &cno)| SvChannel {
                channel: index as u8,
                sv_id: index as u8 + 1,
                flags: 0,
                quality: if cno > 0 { 4 } else { 0 },
                cno,
                elevation: 45,
                azimuth: 0,
                pseudorange_residual: 0,
            })
            .collect(),
    }
}

pub fn mon_ver(software: &str, hardware: &str, extensions: &[&str]) -> MonVer {
    MonVer {
        software_version: software.to_string(),
        hardware_version: hardware.to_string(),
        extensions: extensions.iter().map(|ext| ext.to_string()).collect(),
    }
}

pub fn ack(class: u8, id: u8) -> Message {
    Message::AckAck(Acknowledge { msg_class: class, msg_id: id })
}

pub fn nak(class: u8, id: u8) -> Message {
    Message::AckNak(Acknowledge { msg_class: class, msg_id: id })
}

/// Concatenated wire encoding of the given messages.
pub fn wire(messages: &[Message]) -> Vec<u8> {
    messages.iter().flat_map(|message| message.to_frame().encode()).collect()
}

/// What the scripted transport does on one `read_available` call.
#[derive(Debug, Clone)]
pub enum ScriptStep {
    /// Hand back these bytes (split across calls if the buffer is smaller).
    Bytes(Vec<u8>),
    /// Fail with this I/O error kind.
    Fail(io::ErrorKind),
    /// Sleep before serving the next step.
    Idle(Duration),
}

/// Transport reader that replays a fixed script, then reports end-of-stream.
pub struct ScriptedReader {
    steps: VecDeque<ScriptStep>,
}

impl ScriptedReader {
    pub fn new(steps: impl IntoIterator<Item = ScriptStep>) -> Self {
        ScriptedReader { steps: steps.into_iter().collect() }
    }
}

#[async_trait]
impl TransportReader for ScriptedReader {
    async fn read_available(&mut self, buf: &mut [u8]) -> Result<usize> {
        loop {
            match self.steps.pop_front() {
                Some(ScriptStep::Bytes(bytes)) => {
                    let n = bytes.len().min(buf.len());
                    buf[..n].copy_from_slice(&bytes[..n]);
                    if n < bytes.len() {
                        self.steps.push_front(ScriptStep::Bytes(bytes[n..].to_vec()));
                    }
                    return Ok(n);
                }
                Some(ScriptStep::Fail(kind)) => {
                    return Err(UbxError::io_error("read", io::Error::new(kind, "scripted failure")));
                }
                Some(ScriptStep::Idle(pause)) => tokio::time::sleep(pause).await,
                None => return Ok(0),
            }
        }
    }
}
