//! MON-class payloads.
//!
//! Only MON-VER (0x0A/0x04) is handled: the version report the negotiator
//! polls at startup. Its payload is a 30-byte software version field, a
//! 10-byte hardware version field, and any number of 30-byte extension
//! fields. Every field is a NUL-terminated string padded to its width.

use serde::{Deserialize, Serialize};

use super::expect_min_len;
use crate::error::{Result, UbxError};

const SW_VERSION_LEN: usize = 30;
const HW_VERSION_LEN: usize = 10;
const EXTENSION_LEN: usize = 30;
const FIXED_LEN: usize = SW_VERSION_LEN + HW_VERSION_LEN;

/// Payload of a MON-VER report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonVer {
    pub software_version: String,
    pub hardware_version: String,
    /// Extension fields in report order, e.g. `FWVER=SPG 3.01`,
    /// `PROTVER=18.00`, enabled GNSS names
    pub extensions: Vec<String>,
}

impl MonVer {
    pub fn decode(payload: &[u8]) -> Result<Self> {
        const KIND: &str = "MON-VER";
        expect_min_len(KIND, payload, FIXED_LEN)?;
        let trailing = payload.len() - FIXED_LEN;
        if trailing % EXTENSION_LEN != 0 {
            return Err(UbxError::decode_error(
                KIND,
                format!("trailing {trailing} bytes do not form whole extension fields"),
            ));
        }

        let software_version = field_str(KIND, &payload[..SW_VERSION_LEN])?;
        let hardware_version = field_str(KIND, &payload[SW_VERSION_LEN..FIXED_LEN])?;
        let extensions = payload[FIXED_LEN..]
            .chunks_exact(EXTENSION_LEN)
            .map(|chunk| field_str(KIND, chunk))
            .collect::<Result<Vec<_>>>()?;

        Ok(MonVer { software_version, hardware_version, extensions })
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(FIXED_LEN + self.extensions.len() * EXTENSION_LEN);
        push_field(&mut out, &self.software_version, SW_VERSION_LEN);
        push_field(&mut out, &self.hardware_version, HW_VERSION_LEN);
        for extension in &self.extensions {
            push_field(&mut out, extension, EXTENSION_LEN);
        }
        out
    }

    /// The first extension entry advertising a protocol version, if any.
    pub fn protver_extension(&self) -> Option<&str> {
        self.extensions.iter().map(String::as_str).find(|ext| ext.starts_with("PROTVER"))
    }
}

/// Reads one NUL-terminated, width-padded field. A field with no terminator
/// or non-UTF-8 content is a decode error.
fn field_str(kind: &str, field: &[u8]) -> Result<String> {
    let end = field
        .iter()
        .position(|b| *b == 0)
        .ok_or_else(|| UbxError::decode_error(kind, "version field missing NUL terminator"))?;
    std::str::from_utf8(&field[..end])
        .map(str::to_owned)
        .map_err(|_| UbxError::decode_error(kind, "version field is not valid UTF-8"))
}

/// Writes a string as a NUL-terminated field of exactly `width` bytes,
/// truncating oversized input to fit.
fn push_field(out: &mut Vec<u8>, value: &str, width: usize) {
    let bytes = value.as_bytes();
    let take = bytes.len().min(width - 1);
    out.extend_from_slice(&bytes[..take]);
    out.resize(out.len() + (width - take), 0);
}
