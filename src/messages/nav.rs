//! NAV-class payloads: position solutions, fix status, satellite info.
//!
//! Two generations are covered. Protocol 15.00 and newer devices emit
//! NAV-PVT (0x01/0x07) and NAV-SAT (0x01/0x35); older receivers only speak
//! NAV-POSLLH (0x01/0x02) and NAV-SVINFO (0x01/0x30). NAV-STATUS (0x01/0x03)
//! exists on both and carries the time-to-first-fix counter.

use std::time::Duration;

use chrono::{DateTime, NaiveDate, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

use super::{expect_len, expect_min_len, read_i8, read_i16, read_i32, read_u8, read_u16, read_u32};
use crate::error::{Result, UbxError};
use crate::types::{COORD_SCALE, Location};

/// No position solution.
pub const FIX_TYPE_NONE: u8 = 0;
/// Two-dimensional solution.
pub const FIX_TYPE_2D: u8 = 2;
/// Three-dimensional solution.
pub const FIX_TYPE_3D: u8 = 3;
/// Combined GNSS and dead-reckoning solution.
pub const FIX_TYPE_GNSS_DR: u8 = 4;

const VALID_DATE: u8 = 0x01;
const VALID_TIME: u8 = 0x02;
const FLAG_GPS_FIX_OK: u8 = 0x01;

const NAV_PVT_LEN: usize = 92;
const NAV_POSLLH_LEN: usize = 28;
const NAV_STATUS_LEN: usize = 16;
const NAV_SAT_HEADER_LEN: usize = 8;
const NAV_SAT_BLOCK_LEN: usize = 12;
const NAV_SVINFO_HEADER_LEN: usize = 8;
const NAV_SVINFO_BLOCK_LEN: usize = 12;

/// UBX-NAV-PVT: the combined position, velocity, and time solution.
///
/// 92-byte payload. Coordinates are 1e-7 degrees, heights and accuracies
/// millimeters, velocities millimeters per second, headings 1e-5 degrees.
/// Bytes 78..92 are reserved and not modeled; encoding emits them as zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NavPvt {
    /// GPS time of week in milliseconds
    pub i_tow: u32,
    pub year: u16,
    pub month: u8,
    pub day: u8,
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
    /// Validity bits: 0x01 date, 0x02 time, 0x04 fully resolved
    pub valid: u8,
    pub time_accuracy_ns: u32,
    /// Sub-second remainder, may be negative
    pub nanosecond: i32,
    pub fix_type: u8,
    pub flags: u8,
    pub flags2: u8,
    pub satellites_used: u8,
    pub longitude_e7: i32,
    pub latitude_e7: i32,
    pub height_mm: i32,
    pub height_msl_mm: i32,
    pub horizontal_accuracy_mm: u32,
    pub vertical_accuracy_mm: u32,
    pub velocity_north_mm_s: i32,
    pub velocity_east_mm_s: i32,
    pub velocity_down_mm_s: i32,
    pub ground_speed_mm_s: i32,
    /// Heading of motion in 1e-5 degrees
    pub heading_e5: i32,
    pub speed_accuracy_mm_s: u32,
    pub heading_accuracy_e5: u32,
    /// Position dilution of precision, scaled by 0.01
    pub p_dop: u16,
}

impl NavPvt {
    pub fn decode(payload: &[u8]) -> Result<Self> {
        const KIND: &str = "NAV-PVT";
        expect_min_len(KIND, payload, NAV_PVT_LEN)?;
        Ok(NavPvt {
            i_tow: read_u32(KIND, payload, 0)?,
            year: read_u16(KIND, payload, 4)?,
            month: read_u8(KIND, payload, 6)?,
            day: read_u8(KIND, payload, 7)?,
            hour: read_u8(KIND, payload, 8)?,
            minute: read_u8(KIND, payload, 9)?,
            second: read_u8(KIND, payload, 10)?,
            valid: read_u8(KIND, payload, 11)?,
            time_accuracy_ns: read_u32(KIND, payload, 12)?,
            nanosecond: read_i32(KIND, payload, 16)?,
            fix_type: read_u8(KIND, payload, 20)?,
            flags: read_u8(KIND, payload, 21)?,
            flags2: read_u8(KIND, payload, 22)?,
            satellites_used: read_u8(KIND, payload, 23)?,
            longitude_e7: read_i32(KIND, payload, 24)?,
            latitude_e7: read_i32(KIND, payload, 28)?,
            height_mm: read_i32(KIND, payload, 32)?,
            height_msl_mm: read_i32(KIND, payload, 36)?,
            horizontal_accuracy_mm: read_u32(KIND, payload, 40)?,
            vertical_accuracy_mm: read_u32(KIND, payload, 44)?,
            velocity_north_mm_s: read_i32(KIND, payload, 48)?,
            velocity_east_mm_s: read_i32(KIND, payload, 52)?,
            velocity_down_mm_s: read_i32(KIND, payload, 56)?,
            ground_speed_mm_s: read_i32(KIND, payload, 60)?,
            heading_e5: read_i32(KIND, payload, 64)?,
            speed_accuracy_mm_s: read_u32(KIND, payload, 68)?,
            heading_accuracy_e5: read_u32(KIND, payload, 72)?,
            p_dop: read_u16(KIND, payload, 76)?,
        })
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(NAV_PVT_LEN);
        out.extend_from_slice(&self.i_tow.to_le_bytes());
        out.extend_from_slice(&self.year.to_le_bytes());
        out.push(self.month);
        out.push(self.day);
        out.push(self.hour);
        out.push(self.minute);
        out.push(self.second);
        out.push(self.valid);
        out.extend_from_slice(&self.time_accuracy_ns.to_le_bytes());
        out.extend_from_slice(&self.nanosecond.to_le_bytes());
        out.push(self.fix_type);
        out.push(self.flags);
        out.push(self.flags2);
        out.push(self.satellites_used);
        out.extend_from_slice(&self.longitude_e7.to_le_bytes());
        out.extend_from_slice(&self.latitude_e7.to_le_bytes());
        out.extend_from_slice(&self.height_mm.to_le_bytes());
        out.extend_from_slice(&self.height_msl_mm.to_le_bytes());
        out.extend_from_slice(&self.horizontal_accuracy_mm.to_le_bytes());
        out.extend_from_slice(&self.vertical_accuracy_mm.to_le_bytes());
        out.extend_from_slice(&self.velocity_north_mm_s.to_le_bytes());
        out.extend_from_slice(&self.velocity_east_mm_s.to_le_bytes());
        out.extend_from_slice(&self.velocity_down_mm_s.to_le_bytes());
        out.extend_from_slice(&self.ground_speed_mm_s.to_le_bytes());
        out.extend_from_slice(&self.heading_e5.to_le_bytes());
        out.extend_from_slice(&self.speed_accuracy_mm_s.to_le_bytes());
        out.extend_from_slice(&self.heading_accuracy_e5.to_le_bytes());
        out.extend_from_slice(&self.p_dop.to_le_bytes());
        out.resize(NAV_PVT_LEN, 0);
        out
    }

    /// Whether the receiver reports a positional solution. Keyed on the fix
    /// type field; anything 2D or better qualifies.
    pub fn has_fix(&self) -> bool {
        matches!(self.fix_type, FIX_TYPE_2D | FIX_TYPE_3D | FIX_TYPE_GNSS_DR)
    }

    /// UTC timestamp of this solution, when the device marks date and time
    /// valid and the fields form a real calendar instant.
    pub fn utc_time(&self) -> Option<DateTime<Utc>> {
        if self.valid & (VALID_DATE | VALID_TIME) != (VALID_DATE | VALID_TIME) {
            return None;
        }
        let stamp = NaiveDate::from_ymd_opt(self.year as i32, self.month as u32, self.day as u32)?
            .and_hms_opt(self.hour as u32, self.minute as u32, self.second as u32)?
            + TimeDelta::nanoseconds(self.nanosecond as i64);
        Some(stamp.and_utc())
    }

    /// Converts the scaled wire fields into a caller-facing [`Location`].
    pub fn to_location(&self) -> Location {
        Location {
            latitude: self.latitude_e7 as f64 * COORD_SCALE,
            longitude: self.longitude_e7 as f64 * COORD_SCALE,
            height: self.height_mm as f64 / 1000.0,
            height_msl: self.height_msl_mm as f64 / 1000.0,
            horizontal_accuracy: self.horizontal_accuracy_mm as f64 / 1000.0,
            vertical_accuracy: self.vertical_accuracy_mm as f64 / 1000.0,
            satellites_used: Some(self.satellites_used),
            time: self.utc_time(),
        }
    }
}

/// UBX-NAV-POSLLH: geodetic position only, the legacy position message.
///
/// 28-byte payload, same coordinate scaling as NAV-PVT. Carries no validity
/// flag of its own; acceptance is gated on the latest NAV-STATUS.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NavPosllh {
    pub i_tow: u32,
    pub longitude_e7: i32,
    pub latitude_e7: i32,
    pub height_mm: i32,
    pub height_msl_mm: i32,
    pub horizontal_accuracy_mm: u32,
    pub vertical_accuracy_mm: u32,
}

impl NavPosllh {
    pub fn decode(payload: &[u8]) -> Result<Self> {
        const KIND: &str = "NAV-POSLLH";
        expect_min_len(KIND, payload, NAV_POSLLH_LEN)?;
        Ok(NavPosllh {
            i_tow: read_u32(KIND, payload, 0)?,
            longitude_e7: read_i32(KIND, payload, 4)?,
            latitude_e7: read_i32(KIND, payload, 8)?,
            height_mm: read_i32(KIND, payload, 12)?,
            height_msl_mm: read_i32(KIND, payload, 16)?,
            horizontal_accuracy_mm: read_u32(KIND, payload, 20)?,
            vertical_accuracy_mm: read_u32(KIND, payload, 24)?,
        })
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(NAV_POSLLH_LEN);
        out.extend_from_slice(&self.i_tow.to_le_bytes());
        out.extend_from_slice(&self.longitude_e7.to_le_bytes());
        out.extend_from_slice(&self.latitude_e7.to_le_bytes());
        out.extend_from_slice(&self.height_mm.to_le_bytes());
        out.extend_from_slice(&self.height_msl_mm.to_le_bytes());
        out.extend_from_slice(&self.horizontal_accuracy_mm.to_le_bytes());
        out.extend_from_slice(&self.vertical_accuracy_mm.to_le_bytes());
        out
    }

    pub fn to_location(&self) -> Location {
        Location {
            latitude: self.latitude_e7 as f64 * COORD_SCALE,
            longitude: self.longitude_e7 as f64 * COORD_SCALE,
            height: self.height_mm as f64 / 1000.0,
            height_msl: self.height_msl_mm as f64 / 1000.0,
            horizontal_accuracy: self.horizontal_accuracy_mm as f64 / 1000.0,
            vertical_accuracy: self.vertical_accuracy_mm as f64 / 1000.0,
            satellites_used: None,
            time: None,
        }
    }
}

/// UBX-NAV-STATUS: fix status plus the device's own time-to-first-fix.
///
/// 16-byte payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NavStatus {
    pub i_tow: u32,
    /// Fix type, same values as NAV-PVT's fixType
    pub gps_fix: u8,
    /// Bit 0x01 is gpsFixOk
    pub flags: u8,
    pub fix_status: u8,
    pub flags2: u8,
    /// Time to first fix in milliseconds, zero before the first fix
    pub time_to_first_fix_ms: u32,
    /// Milliseconds since startup or reset
    pub uptime_ms: u32,
}

impl NavStatus {
    pub fn decode(payload: &[u8]) -> Result<Self> {
        const KIND: &str = "NAV-STATUS";
        expect_min_len(KIND, payload, NAV_STATUS_LEN)?;
        Ok(NavStatus {
            i_tow: read_u32(KIND, payload, 0)?,
            gps_fix: read_u8(KIND, payload, 4)?,
            flags: read_u8(KIND, payload, 5)?,
            fix_status: read_u8(KIND, payload, 6)?,
            flags2: read_u8(KIND, payload, 7)?,
            time_to_first_fix_ms: read_u32(KIND, payload, 8)?,
            uptime_ms: read_u32(KIND, payload, 12)?,
        })
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(NAV_STATUS_LEN);
        out.extend_from_slice(&self.i_tow.to_le_bytes());
        out.push(self.gps_fix);
        out.push(self.flags);
        out.push(self.fix_status);
        out.push(self.flags2);
        out.extend_from_slice(&self.time_to_first_fix_ms.to_le_bytes());
        out.extend_from_slice(&self.uptime_ms.to_le_bytes());
        out
    }

    /// Whether the status declares a usable positional fix: gpsFixOk set and
    /// a 2D-or-better fix type.
    pub fn has_fix(&self) -> bool {
        self.flags & FLAG_GPS_FIX_OK != 0
            && matches!(self.gps_fix, FIX_TYPE_2D | FIX_TYPE_3D | FIX_TYPE_GNSS_DR)
    }

    /// The device-reported time to first fix, or `None` while it is still
    /// zero.
    pub fn time_to_first_fix(&self) -> Option<Duration> {
        if self.time_to_first_fix_ms > 0 {
            Some(Duration::from_millis(self.time_to_first_fix_ms as u64))
        } else {
            None
        }
    }
}

/// One satellite block of a NAV-SAT message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SatelliteInfo {
    pub gnss_id: u8,
    pub sv_id: u8,
    /// Carrier-to-noise ratio in dBHz, zero when not tracked
    pub cno: u8,
    /// Elevation in degrees, -91 when unknown
    pub elevation: i8,
    /// Azimuth in degrees
    pub azimuth: i16,
    /// Pseudorange residual in 0.1 m
    pub pseudorange_residual: i16,
    pub flags: u32,
}

/// UBX-NAV-SAT: per-satellite signal information, protocol 15.00 and newer.
///
/// 8-byte header (version must be 1) followed by 12 bytes per satellite.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NavSat {
    pub i_tow: u32,
    pub satellites: Vec<SatelliteInfo>,
}

impl NavSat {
    const VERSION: u8 = 1;

    pub fn decode(payload: &[u8]) -> Result<Self> {
        const KIND: &str = "NAV-SAT";
        expect_min_len(KIND, payload, NAV_SAT_HEADER_LEN)?;
        let version = read_u8(KIND, payload, 4)?;
        if version != Self::VERSION {
            return Err(UbxError::decode_error(KIND, format!("unsupported version {version}")));
        }
        let count = read_u8(KIND, payload, 5)? as usize;
        expect_len(KIND, payload, NAV_SAT_HEADER_LEN + count * NAV_SAT_BLOCK_LEN)?;

        let mut satellites = Vec::with_capacity(count);
        for index in 0..count {
            let base = NAV_SAT_HEADER_LEN + index * NAV_SAT_BLOCK_LEN;
            satellites.push(SatelliteInfo {
                gnss_id: read_u8(KIND, payload, base)?,
                sv_id: read_u8(KIND, payload, base + 1)?,
                cno: read_u8(KIND, payload, base + 2)?,
                elevation: read_i8(KIND, payload, base + 3)?,
                azimuth: read_i16(KIND, payload, base + 4)?,
                pseudorange_residual: read_i16(KIND, payload, base + 6)?,
                flags: read_u32(KIND, payload, base + 8)?,
            });
        }
        Ok(NavSat { i_tow: read_u32(KIND, payload, 0)?, satellites })
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut out =
            Vec::with_capacity(NAV_SAT_HEADER_LEN + self.satellites.len() * NAV_SAT_BLOCK_LEN);
        out.extend_from_slice(&self.i_tow.to_le_bytes());
        out.push(Self::VERSION);
        out.push(self.satellites.len() as u8);
        out.extend_from_slice(&[0, 0]);
        for sv in &self.satellites {
            out.push(sv.gnss_id);
            out.push(sv.sv_id);
            out.push(sv.cno);
            out.push(sv.elevation as u8);
            out.extend_from_slice(&sv.azimuth.to_le_bytes());
            out.extend_from_slice(&sv.pseudorange_residual.to_le_bytes());
            out.extend_from_slice(&sv.flags.to_le_bytes());
        }
        out
    }

    /// Carrier-to-noise ratios of every reported satellite, in report order.
    pub fn carrier_to_noise(&self) -> Vec<u8> {
        self.satellites.iter().map(|sv| sv.cno).collect()
    }
}

/// One channel block of a NAV-SVINFO message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SvChannel {
    pub channel: u8,
    pub sv_id: u8,
    pub flags: u8,
    pub quality: u8,
    /// Carrier-to-noise ratio in dBHz, zero when not tracked
    pub cno: u8,
    pub elevation: i8,
    pub azimuth: i16,
    /// Pseudorange residual in centimeters
    pub pseudorange_residual: i32,
}

/// UBX-NAV-SVINFO: the legacy satellite report, superseded by NAV-SAT.
///
/// 8-byte header followed by 12 bytes per channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NavSvinfo {
    pub i_tow: u32,
    pub global_flags: u8,
    pub channels: Vec<SvChannel>,
}

impl NavSvinfo {
    pub fn decode(payload: &[u8]) -> Result<Self> {
        const KIND: &str = "NAV-SVINFO";
        expect_min_len(KIND, payload, NAV_SVINFO_HEADER_LEN)?;
        let count = read_u8(KIND, payload, 4)? as usize;
        expect_len(KIND, payload, NAV_SVINFO_HEADER_LEN + count * NAV_SVINFO_BLOCK_LEN)?;

        let mut channels = Vec::with_capacity(count);
        for index in 0..count {
            let base = NAV_SVINFO_HEADER_LEN + index * NAV_SVINFO_BLOCK_LEN;
            channels.push(SvChannel {
                channel: read_u8(KIND, payload, base)?,
                sv_id: read_u8(KIND, payload, base + 1)?,
                flags: read_u8(KIND, payload, base + 2)?,
                quality: read_u8(KIND, payload, base + 3)?,
                cno: read_u8(KIND, payload, base + 4)?,
                elevation: read_i8(KIND, payload, base + 5)?,
                azimuth: read_i16(KIND, payload, base + 6)?,
                pseudorange_residual: read_i32(KIND, payload, base + 8)?,
            });
        }
        Ok(NavSvinfo {
            i_tow: read_u32(KIND, payload, 0)?,
            global_flags: read_u8(KIND, payload, 5)?,
            channels,
        })
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut out =
            Vec::with_capacity(NAV_SVINFO_HEADER_LEN + self.channels.len() * NAV_SVINFO_BLOCK_LEN);
        out.extend_from_slice(&self.i_tow.to_le_bytes());
        out.push(self.channels.len() as u8);
        out.push(self.global_flags);
        out.extend_from_slice(&[0, 0]);
        for ch in &self.channels {
            out.push(ch.channel);
            out.push(ch.sv_id);
            out.push(ch.flags);
            out.push(ch.quality);
            out.push(ch.cno);
            out.push(ch.elevation as u8);
            out.extend_from_slice(&ch.azimuth.to_le_bytes());
            out.extend_from_slice(&ch.pseudorange_residual.to_le_bytes());
        }
        out
    }

    /// Carrier-to-noise ratios of every reported channel, in report order.
    pub fn carrier_to_noise(&self) -> Vec<u8> {
        self.channels.iter().map(|ch| ch.cno).collect()
    }
}
