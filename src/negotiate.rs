//! Protocol-version negotiation: poll MON-VER, resolve PROTVER, pick the
//! message set, and issue the subscription batch.

use tracing::{debug, info, trace, warn};

use crate::command::{CommandOutcome, Commander, Expectation};
use crate::error::{Result, UbxError};
use crate::frame::Frame;
use crate::messages::{CfgMsg, Message, MonVer};
use crate::types::{
    DeviceOptions, DeviceProfile, MessageKind, MessageSet, ProtocolVersion, VersionSource,
};

/// Assumed when neither the extensions nor the hardware table resolve.
const DEFAULT_VERSION: ProtocolVersion = ProtocolVersion::new(14, 0);

/// Hardware version strings with known protocol versions. Covers antaris 4
/// through generation 9; devices outside the table negotiate via PROTVER or
/// fall back to the default.
const HARDWARE_VERSIONS: &[(&str, ProtocolVersion)] = &[
    ("00040005", ProtocolVersion::new(10, 0)),
    ("00040007", ProtocolVersion::new(12, 0)),
    ("00070000", ProtocolVersion::new(14, 0)),
    ("00080000", ProtocolVersion::new(15, 0)),
    ("00190000", ProtocolVersion::new(27, 0)),
];

/// Solution rate divisors for the subscription batch.
const POSITION_RATE: u8 = 1;
const SATELLITE_RATE: u8 = 10;
const STATUS_RATE: u8 = 1;

/// Standard NMEA outputs silenced when `disable_nmea` is set: GGA, GLL,
/// GSA, GSV, RMC, VTG on the current port.
const NMEA_CLASS: u8 = 0xF0;
const NMEA_IDS: std::ops::RangeInclusive<u8> = 0x00..=0x05;

/// Polls the device identity and resolves the protocol version.
pub(crate) async fn negotiate(
    commander: &Commander,
    options: &DeviceOptions,
) -> Result<DeviceProfile> {
    let report = poll_version(commander, options).await?;
    let (protocol_version, version_source) = resolve_version(&report)?;
    let message_set = MessageSet::for_version(protocol_version);

    info!(
        "Negotiated PROTVER {} ({:?}) for {} / {} - {:?} message set",
        protocol_version,
        version_source,
        report.software_version,
        report.hardware_version,
        message_set
    );

    Ok(DeviceProfile {
        software_version: report.software_version,
        hardware_version: report.hardware_version,
        protocol_version,
        version_source,
        message_set,
    })
}

/// Issues the rate subscriptions for the resolved message set. A rejected
/// subscription means the profile does not match the device; that is fatal.
pub(crate) async fn subscribe(
    commander: &Commander,
    profile: &DeviceProfile,
    options: &DeviceOptions,
) -> Result<()> {
    let batch = [
        (profile.message_set.position_kind(), POSITION_RATE),
        (profile.message_set.satellite_kind(), SATELLITE_RATE),
        (MessageKind::NavStatus, STATUS_RATE),
    ];

    for (kind, rate) in batch {
        let command = Message::CfgMsg(CfgMsg::for_kind(kind, rate));
        debug!("Subscribing to {} at rate {}", kind, rate);
        let outcome = commander
            .send(command.to_frame(), Expectation::for_command(&command), options.command_timeout)
            .await?;
        match outcome {
            CommandOutcome::Acked => {}
            CommandOutcome::Rejected { class, id } => {
                return Err(UbxError::negotiation_failed(format!(
                    "device rejected the rate for {kind} (command {class:#04x}/{id:#04x})"
                )));
            }
            other => {
                warn!("Unexpected outcome for subscription: {:?}", other);
            }
        }
    }
    Ok(())
}

/// Zeroes the rates of the standard NMEA outputs. Best-effort: rejections
/// and timeouts are logged, never surfaced.
pub(crate) async fn disable_nmea(commander: &Commander, options: &DeviceOptions) {
    for id in NMEA_IDS {
        let command = Message::CfgMsg(CfgMsg { msg_class: NMEA_CLASS, msg_id: id, rate: 0 });
        let sent = commander
            .send(command.to_frame(), Expectation::for_command(&command), options.command_timeout)
            .await;
        match sent {
            Ok(CommandOutcome::Acked) => trace!("NMEA output {:#04x} disabled", id),
            Ok(CommandOutcome::Rejected { .. }) => {
                debug!("Device rejected NMEA disable for {:#04x}", id);
            }
            Ok(_) => {}
            Err(UbxError::Closed) => break,
            Err(e) => debug!("NMEA disable for {:#04x} failed: {}", id, e),
        }
    }
}

async fn poll_version(commander: &Commander, options: &DeviceOptions) -> Result<MonVer> {
    let (class, id) = MessageKind::MonVer.class_id();
    let mut last_error = None;

    for attempt in 1..=options.negotiation_attempts {
        let poll = Frame::new(class, id, Vec::new());
        let sent = commander
            .send(poll, Expectation::Reply(MessageKind::MonVer), options.command_timeout)
            .await;
        match sent {
            Ok(CommandOutcome::Reply(Message::MonVer(report))) => return Ok(report),
            Ok(other) => {
                warn!("Unexpected outcome for version poll {}: {:?}", attempt, other);
            }
            Err(UbxError::Closed) => return Err(UbxError::Closed),
            Err(e) => {
                warn!("Version poll {} failed: {}", attempt, e);
                last_error = Some(e);
            }
        }
    }

    Err(match last_error {
        Some(source) => UbxError::negotiation_failed_with_source(
            format!("no MON-VER reply in {} attempts", options.negotiation_attempts),
            Box::new(source),
        ),
        None => UbxError::negotiation_failed("no MON-VER reply"),
    })
}

/// Ordered resolution: PROTVER extension, hardware lookup, default. A
/// malformed PROTVER entry is fatal rather than silently defaulted.
fn resolve_version(report: &MonVer) -> Result<(ProtocolVersion, VersionSource)> {
    if let Some(extension) = report.protver_extension() {
        let version = parse_protver(extension)?;
        return Ok((version, VersionSource::Extension));
    }

    for (hardware, version) in HARDWARE_VERSIONS {
        if report.hardware_version == *hardware {
            return Ok((*version, VersionSource::HardwareLookup));
        }
    }

    debug!(
        "Hardware {} not in the lookup table, assuming PROTVER {}",
        report.hardware_version, DEFAULT_VERSION
    );
    Ok((DEFAULT_VERSION, VersionSource::Default))
}

/// Accepts `PROTVER=XX.YY` and `PROTVER XX.YY`.
fn parse_protver(extension: &str) -> Result<ProtocolVersion> {
    let malformed = || UbxError::VersionParse { extension: extension.to_string() };

    let rest = extension.strip_prefix("PROTVER").ok_or_else(malformed)?;
    let value = match rest.strip_prefix('=') {
        Some(value) => value.trim(),
        None if rest.starts_with(char::is_whitespace) => rest.trim(),
        _ => return Err(malformed()),
    };
    if value.is_empty() {
        return Err(malformed());
    }
    value.parse::<ProtocolVersion>().map_err(|_| malformed())
}
