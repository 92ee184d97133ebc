//! Core data types shared across the driver.
//!
//! These are the records callers actually see: the latest position fix, the
//! satellite diagnostics snapshot, and the device profile resolved during
//! version negotiation. Everything here is a plain value type; the live
//! state machinery lives in [`crate::state`].

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::UbxError;

/// Scale factor for the fixed-point latitude/longitude fields (1e-7 degrees).
pub const COORD_SCALE: f64 = 1e-7;

/// A position fix reported by the receiver.
///
/// Coordinates are in degrees, heights and accuracies in meters. `time` is
/// populated only when the device marks its UTC date and time valid.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Location {
    /// Latitude in degrees, positive north
    pub latitude: f64,

    /// Longitude in degrees, positive east
    pub longitude: f64,

    /// Height above the ellipsoid in meters
    pub height: f64,

    /// Height above mean sea level in meters
    pub height_msl: f64,

    /// Horizontal accuracy estimate in meters
    pub horizontal_accuracy: f64,

    /// Vertical accuracy estimate in meters
    pub vertical_accuracy: f64,

    /// Satellites used in the solution, if the message reports it
    pub satellites_used: Option<u8>,

    /// UTC timestamp of the fix, if the device marks it valid
    pub time: Option<DateTime<Utc>>,
}

/// Satellite signal diagnostics derived from the latest satellite-info
/// message. Replaced wholesale on each arrival, never mutated in place.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Diagnostics {
    /// Satellites the receiver reports knowledge of
    pub known_satellites: u16,

    /// Satellites with a nonzero carrier-to-noise ratio
    pub satellites_in_view: u16,

    /// Average carrier-to-noise ratio of the strongest signals, in dBHz
    pub quality: f32,

    /// Time to first fix, zero until the device reports one
    pub time_to_first_fix: Duration,
}

impl Default for Diagnostics {
    fn default() -> Self {
        Diagnostics {
            known_satellites: 0,
            satellites_in_view: 0,
            quality: 0.0,
            time_to_first_fix: Duration::ZERO,
        }
    }
}

/// Message kind, the typed form of a UBX class/id pair.
///
/// Only kinds the driver handles are enumerated; frames with any other
/// class/id pass through the receiver loop untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MessageKind {
    /// UBX-NAV-PVT: position, velocity, time solution
    NavPvt,
    /// UBX-NAV-POSLLH: geodetic position (legacy devices)
    NavPosllh,
    /// UBX-NAV-STATUS: fix status and time to first fix
    NavStatus,
    /// UBX-NAV-SAT: satellite information
    NavSat,
    /// UBX-NAV-SVINFO: satellite information (legacy devices)
    NavSvinfo,
    /// UBX-ACK-ACK: command accepted
    AckAck,
    /// UBX-ACK-NAK: command rejected
    AckNak,
    /// UBX-MON-VER: software and hardware version report
    MonVer,
    /// UBX-CFG-MSG: per-message output rate
    CfgMsg,
    /// UBX-CFG-RATE: navigation measurement rate
    CfgRate,
}

impl MessageKind {
    /// Maps a class/id pair to a known kind, or `None` for anything the
    /// driver does not handle.
    pub fn from_class_id(class: u8, id: u8) -> Option<Self> {
        match (class, id) {
            (0x01, 0x07) => Some(MessageKind::NavPvt),
            (0x01, 0x02) => Some(MessageKind::NavPosllh),
            (0x01, 0x03) => Some(MessageKind::NavStatus),
            (0x01, 0x35) => Some(MessageKind::NavSat),
            (0x01, 0x30) => Some(MessageKind::NavSvinfo),
            (0x05, 0x01) => Some(MessageKind::AckAck),
            (0x05, 0x00) => Some(MessageKind::AckNak),
            (0x0A, 0x04) => Some(MessageKind::MonVer),
            (0x06, 0x01) => Some(MessageKind::CfgMsg),
            (0x06, 0x08) => Some(MessageKind::CfgRate),
            _ => None,
        }
    }

    /// The UBX class byte for this kind.
    pub fn class(&self) -> u8 {
        self.class_id().0
    }

    /// The UBX message id byte for this kind.
    pub fn id(&self) -> u8 {
        self.class_id().1
    }

    /// The (class, id) pair for this kind.
    pub fn class_id(&self) -> (u8, u8) {
        match self {
            MessageKind::NavPvt => (0x01, 0x07),
            MessageKind::NavPosllh => (0x01, 0x02),
            MessageKind::NavStatus => (0x01, 0x03),
            MessageKind::NavSat => (0x01, 0x35),
            MessageKind::NavSvinfo => (0x01, 0x30),
            MessageKind::AckAck => (0x05, 0x01),
            MessageKind::AckNak => (0x05, 0x00),
            MessageKind::MonVer => (0x0A, 0x04),
            MessageKind::CfgMsg => (0x06, 0x01),
            MessageKind::CfgRate => (0x06, 0x08),
        }
    }

    /// Conventional UBX name, e.g. `NAV-PVT`.
    pub fn label(&self) -> &'static str {
        match self {
            MessageKind::NavPvt => "NAV-PVT",
            MessageKind::NavPosllh => "NAV-POSLLH",
            MessageKind::NavStatus => "NAV-STATUS",
            MessageKind::NavSat => "NAV-SAT",
            MessageKind::NavSvinfo => "NAV-SVINFO",
            MessageKind::AckAck => "ACK-ACK",
            MessageKind::AckNak => "ACK-NAK",
            MessageKind::MonVer => "MON-VER",
            MessageKind::CfgMsg => "CFG-MSG",
            MessageKind::CfgRate => "CFG-RATE",
        }
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A protocol version as `major.minor`, ordered numerically.
///
/// u-blox advertises these as strings like `"15.00"` or `"27.01"`; the
/// string form round-trips through [`FromStr`] and [`fmt::Display`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ProtocolVersion {
    pub major: u16,
    pub minor: u16,
}

impl ProtocolVersion {
    pub const fn new(major: u16, minor: u16) -> Self {
        ProtocolVersion { major, minor }
    }
}

impl FromStr for ProtocolVersion {
    type Err = UbxError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.trim().splitn(2, '.');
        let major = parts.next().unwrap_or_default();
        let minor = parts.next().unwrap_or("0");
        let parse = |field: &str| {
            field.parse::<u16>().map_err(|_| UbxError::VersionParse { extension: s.to_string() })
        };
        Ok(ProtocolVersion { major: parse(major)?, minor: parse(minor)? })
    }
}

impl fmt::Display for ProtocolVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:02}", self.major, self.minor)
    }
}

/// Which rule of the ordered version-resolution chain produced the result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VersionSource {
    /// A `PROTVER` entry in the MON-VER extension fields
    Extension,
    /// The hardware-version lookup table
    HardwareLookup,
    /// The conservative default for unknown hardware
    Default,
}

/// Which periodic navigation messages the driver subscribes to.
///
/// Devices at protocol 15.00 and newer carry NAV-PVT and NAV-SAT; older
/// generations only speak the NAV-POSLLH / NAV-SVINFO pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MessageSet {
    Modern,
    Legacy,
}

impl MessageSet {
    /// Threshold at which the modern message pair becomes available.
    pub const MODERN_THRESHOLD: ProtocolVersion = ProtocolVersion::new(15, 0);

    /// Selects the message set for a resolved protocol version.
    pub fn for_version(version: ProtocolVersion) -> Self {
        if version >= Self::MODERN_THRESHOLD { MessageSet::Modern } else { MessageSet::Legacy }
    }

    /// The kind carrying position solutions in this set.
    pub fn position_kind(&self) -> MessageKind {
        match self {
            MessageSet::Modern => MessageKind::NavPvt,
            MessageSet::Legacy => MessageKind::NavPosllh,
        }
    }

    /// The kind carrying satellite information in this set.
    pub fn satellite_kind(&self) -> MessageKind {
        match self {
            MessageSet::Modern => MessageKind::NavSat,
            MessageSet::Legacy => MessageKind::NavSvinfo,
        }
    }
}

/// Resolved device identity, immutable once negotiation completes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceProfile {
    /// Software version string from MON-VER
    pub software_version: String,

    /// Hardware version string from MON-VER
    pub hardware_version: String,

    /// Resolved protocol version
    pub protocol_version: ProtocolVersion,

    /// Which resolution rule produced the version
    pub version_source: VersionSource,

    /// Message set selected for this version
    pub message_set: MessageSet,
}

/// Tuning knobs for [`crate::Device::attach`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceOptions {
    /// Deadline for each correlated command
    pub command_timeout: Duration,

    /// Pause after each transport write, giving the device time to process
    pub settle_delay: Duration,

    /// MON-VER poll attempts before negotiation gives up
    pub negotiation_attempts: u32,

    /// How long to drain boot-time output before negotiating
    pub flush_window: Duration,

    /// Whether to zero the rates of the standard NMEA outputs
    pub disable_nmea: bool,
}

impl Default for DeviceOptions {
    fn default() -> Self {
        DeviceOptions {
            command_timeout: Duration::from_millis(1500),
            settle_delay: Duration::from_millis(50),
            negotiation_attempts: 3,
            flush_window: Duration::from_millis(200),
            disable_nmea: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_kind_class_id_roundtrip() {
        let kinds = [
            MessageKind::NavPvt,
            MessageKind::NavPosllh,
            MessageKind::NavStatus,
            MessageKind::NavSat,
            MessageKind::NavSvinfo,
            MessageKind::AckAck,
            MessageKind::AckNak,
            MessageKind::MonVer,
            MessageKind::CfgMsg,
            MessageKind::CfgRate,
        ];
        for kind in kinds {
            let (class, id) = kind.class_id();
            assert_eq!(MessageKind::from_class_id(class, id), Some(kind));
        }
    }

    #[test]
    fn unknown_class_id_maps_to_none() {
        assert_eq!(MessageKind::from_class_id(0x02, 0x15), None);
        assert_eq!(MessageKind::from_class_id(0xF0, 0x00), None);
    }

    #[test]
    fn protocol_version_parses_and_orders() {
        let v14: ProtocolVersion = "14.00".parse().unwrap();
        let v15: ProtocolVersion = "15.00".parse().unwrap();
        let v27: ProtocolVersion = "27.01".parse().unwrap();

        assert_eq!(v14, ProtocolVersion::new(14, 0));
        assert!(v14 < v15);
        assert!(v15 < v27);
        assert_eq!(v15.to_string(), "15.00");
        assert_eq!(v27.to_string(), "27.01");
    }

    #[test]
    fn protocol_version_rejects_garbage() {
        assert!("".parse::<ProtocolVersion>().is_err());
        assert!("abc".parse::<ProtocolVersion>().is_err());
        assert!("15.xy".parse::<ProtocolVersion>().is_err());
    }

    #[test]
    fn message_set_selection_at_threshold() {
        assert_eq!(MessageSet::for_version(ProtocolVersion::new(15, 0)), MessageSet::Modern);
        assert_eq!(MessageSet::for_version(ProtocolVersion::new(27, 1)), MessageSet::Modern);
        assert_eq!(MessageSet::for_version(ProtocolVersion::new(14, 99)), MessageSet::Legacy);
        assert_eq!(MessageSet::for_version(ProtocolVersion::new(10, 0)), MessageSet::Legacy);
    }

    #[test]
    fn message_set_kinds() {
        assert_eq!(MessageSet::Modern.position_kind(), MessageKind::NavPvt);
        assert_eq!(MessageSet::Modern.satellite_kind(), MessageKind::NavSat);
        assert_eq!(MessageSet::Legacy.position_kind(), MessageKind::NavPosllh);
        assert_eq!(MessageSet::Legacy.satellite_kind(), MessageKind::NavSvinfo);
    }

    #[test]
    fn default_options_are_sane() {
        let options = DeviceOptions::default();
        assert!(options.command_timeout > Duration::ZERO);
        assert!(options.settle_delay < options.command_timeout);
        assert!(options.negotiation_attempts >= 1);
    }
}
