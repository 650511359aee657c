//! Vault document handling.
//!
//! Provides version-aware parsing of the JSON vault export into the
//! header/payload records the decryptor consumes.

use serde::Deserialize;

use crate::error::FormatError;
use crate::vault::{EncryptedPayload, VaultHeader};

pub mod v1;

/// Latest format version.
pub const CURRENT_VERSION: u64 = v1::VERSION_V1;

/// A parsed encrypted vault.
#[derive(Debug, Clone)]
pub struct VaultFile {
    version: u64,
    header: VaultHeader,
    payload: EncryptedPayload,
}

impl VaultFile {
    pub fn new(version: u64, header: VaultHeader, payload: EncryptedPayload) -> Self {
        Self {
            version,
            header,
            payload,
        }
    }

    /// Returns the document format version.
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Returns the key slots and payload parameters.
    pub fn header(&self) -> &VaultHeader {
        &self.header
    }

    /// Returns the encrypted database.
    pub fn payload(&self) -> &EncryptedPayload {
        &self.payload
    }
}

#[derive(Deserialize)]
struct VersionProbe {
    version: u64,
}

/// Parses a vault document and returns a VaultFile.
///
/// Automatically dispatches to the appropriate version parser.
///
/// # Errors
///
/// Returns an error if:
/// - The document is not JSON or lacks a version
/// - The version is unsupported
/// - The vault is a plain (unencrypted) export
pub fn parse(data: &[u8]) -> Result<VaultFile, FormatError> {
    let probe: VersionProbe = serde_json::from_slice(data)?;

    match probe.version {
        1 => v1::parse(data),
        other => Err(FormatError::UnsupportedVersion(other)),
    }
}
