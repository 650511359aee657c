//! Vault format v1.
//!
//! ```text
//! { "version": 1,
//!   "header": { "slots": [ {type, uuid, key, key_params{nonce,tag}, n, r, p, salt, ...} ],
//!               "params": { "nonce", "tag" } },
//!   "db": "<base64 ciphertext>" }
//! ```
//!
//! Binary fields are hex except `db`. Plain exports carry `null` slots and
//! params and an inline `db` object.

use serde::Deserialize;

use super::VaultFile;
use crate::error::FormatError;
use crate::slots::{KeySlot, SlotType};
use crate::vault::{AeadParams, EncryptedPayload, VaultHeader};

/// Current file format version.
pub const VERSION_V1: u64 = 1;

#[derive(Deserialize)]
struct RawVault {
    version: u64,
    header: RawHeader,
    db: serde_json::Value,
}

#[derive(Deserialize)]
struct RawHeader {
    slots: Option<Vec<RawSlot>>,
    params: Option<RawParams>,
}

#[derive(Deserialize)]
struct RawParams {
    nonce: String,
    tag: String,
}

// Only the type is required; other slot kinds may omit the rest.
#[derive(Deserialize)]
struct RawSlot {
    #[serde(rename = "type")]
    slot_type: i64,
    uuid: Option<String>,
    #[serde(default)]
    key: Option<String>,
    #[serde(default)]
    key_params: Option<RawParams>,
    // scrypt fields only exist on password slots; range checks happen later
    n: Option<serde_json::Number>,
    r: Option<serde_json::Number>,
    p: Option<serde_json::Number>,
    salt: Option<String>,
    #[serde(default)]
    repaired: bool,
    #[serde(default)]
    is_backup: bool,
}

impl From<RawParams> for AeadParams {
    fn from(raw: RawParams) -> Self {
        AeadParams {
            nonce: raw.nonce,
            tag: raw.tag,
        }
    }
}

impl From<RawSlot> for KeySlot {
    fn from(raw: RawSlot) -> Self {
        KeySlot {
            slot_type: SlotType::from(raw.slot_type),
            uuid: raw.uuid,
            wrapped_key: raw.key,
            key_params: raw.key_params.map(AeadParams::from),
            salt: raw.salt,
            n: raw.n,
            r: raw.r,
            p: raw.p,
            repaired: raw.repaired,
            is_backup: raw.is_backup,
        }
    }
}

/// Parses a v1 vault document.
///
/// # Errors
///
/// Returns an error if the document is malformed, unencrypted, or its
/// payload is not a base64 string.
pub fn parse(data: &[u8]) -> Result<VaultFile, FormatError> {
    let raw: RawVault = serde_json::from_slice(data)?;

    let (slots, params) = match (raw.header.slots, raw.header.params) {
        (None, None) if raw.db.is_object() => return Err(FormatError::NotEncrypted),
        (None, _) => return Err(FormatError::MissingHeaderField("slots")),
        (_, None) => return Err(FormatError::MissingHeaderField("params")),
        (Some(slots), Some(params)) => (slots, params),
    };

    let ciphertext = match raw.db {
        serde_json::Value::String(db) => db,
        _ => return Err(FormatError::InvalidPayload),
    };

    let header = VaultHeader {
        slots: slots.into_iter().map(KeySlot::from).collect(),
        params: params.into(),
    };

    Ok(VaultFile::new(
        raw.version,
        header,
        EncryptedPayload { ciphertext },
    ))
}
