//! Error types for every stage of the unlock pipeline.

use std::fmt;

/// Failure to decode a hex or base64 field.
#[derive(Debug, thiserror::Error)]
pub enum EncodingError {
    #[error("invalid hex: {0}")]
    Hex(#[from] hex::FromHexError),

    #[error("invalid base64: {0}")]
    Base64(#[from] base64::DecodeError),
}

/// Rejected scrypt parameters or a failure inside the primitive.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum KdfError {
    #[error("scrypt parameter {name} must be positive, got {value}")]
    NonPositive { name: &'static str, value: i64 },

    #[error("scrypt parameter {name} must be an integer")]
    NotAnInteger { name: &'static str },

    #[error("scrypt N must be a power of two greater than 1, got {0}")]
    InvalidCost(i64),

    #[error("scrypt parameter {name} = {value} exceeds the limit of {max}")]
    ExceedsLimit {
        name: &'static str,
        value: u64,
        max: u64,
    },

    #[error("scrypt rejected the parameters")]
    InvalidParams,

    #[error("invalid scrypt output length: {0}")]
    InvalidOutputLen(usize),
}

impl From<scrypt::errors::InvalidParams> for KdfError {
    fn from(_: scrypt::errors::InvalidParams) -> Self {
        KdfError::InvalidParams
    }
}

/// AES-256-GCM failures.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum CipherError {
    #[error("invalid key length: {0} bytes (expected 32)")]
    InvalidKey(usize),

    #[error("invalid nonce length: {0} bytes (expected 12)")]
    InvalidNonce(usize),

    /// Tag did not verify: wrong key, corrupted or tampered data.
    #[error("authentication failed")]
    Authentication,
}

/// Why a single key slot could not be unwrapped.
#[derive(Debug, thiserror::Error)]
pub enum SlotError {
    #[error(transparent)]
    Encoding(#[from] EncodingError),

    #[error(transparent)]
    Kdf(#[from] KdfError),

    #[error(transparent)]
    Cipher(#[from] CipherError),

    #[error("password slot is missing its {0} field")]
    MissingField(&'static str),

    #[error("unwrapped master key has {0} bytes (expected 32)")]
    MasterKeyLength(usize),
}

impl SlotError {
    /// `true` when the slot was well formed but the passphrase did not match.
    pub fn is_rejection(&self) -> bool {
        matches!(self, SlotError::Cipher(CipherError::Authentication))
    }
}

/// No passphrase slot produced a master key.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ResolveError {
    #[error(
        "no key slot accepted the passphrase ({attempted} attempted, {rejected} rejected, {malformed} malformed)"
    )]
    Exhausted {
        attempted: usize,
        rejected: usize,
        malformed: usize,
    },
}

/// Structural problems in the vault document.
#[derive(Debug, thiserror::Error)]
pub enum FormatError {
    #[error("malformed vault document: {0}")]
    Json(#[from] serde_json::Error),

    #[error("unsupported vault version: {0}")]
    UnsupportedVersion(u64),

    #[error("vault is not encrypted")]
    NotEncrypted,

    #[error("vault header is missing {0}")]
    MissingHeaderField(&'static str),

    #[error("encrypted payload must be a base64 string")]
    InvalidPayload,
}

/// Why the vault as a whole could not be decrypted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureReason {
    /// No slot accepted the passphrase.
    AuthenticationFailed,
    /// A master key was recovered but the payload did not verify under it.
    PayloadIntegrity,
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureReason::AuthenticationFailed => write!(f, "authentication failed"),
            FailureReason::PayloadIntegrity => write!(f, "payload integrity check failed"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum VaultError {
    #[error("vault decryption failed: {reason}")]
    DecryptionFailure { reason: FailureReason },

    #[error("invalid payload encoding: {0}")]
    Encoding(#[from] EncodingError),

    #[error("invalid payload parameters: {0}")]
    Cipher(#[from] CipherError),
}

impl VaultError {
    pub fn reason(&self) -> Option<FailureReason> {
        match self {
            VaultError::DecryptionFailure { reason } => Some(*reason),
            _ => None,
        }
    }
}

impl From<ResolveError> for VaultError {
    fn from(_: ResolveError) -> Self {
        VaultError::DecryptionFailure {
            reason: FailureReason::AuthenticationFailed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failure_reasons_are_distinct() {
        let auth = VaultError::DecryptionFailure {
            reason: FailureReason::AuthenticationFailed,
        };
        let integrity = VaultError::DecryptionFailure {
            reason: FailureReason::PayloadIntegrity,
        };

        assert_eq!(
            auth.to_string(),
            "vault decryption failed: authentication failed"
        );
        assert_eq!(
            integrity.to_string(),
            "vault decryption failed: payload integrity check failed"
        );
    }

    #[test]
    fn exhausted_summary_reports_counts_only() {
        let err = ResolveError::Exhausted {
            attempted: 3,
            rejected: 2,
            malformed: 1,
        };
        assert_eq!(
            err.to_string(),
            "no key slot accepted the passphrase (3 attempted, 2 rejected, 1 malformed)"
        );

        let vault: VaultError = err.into();
        assert_eq!(vault.reason(), Some(FailureReason::AuthenticationFailed));
    }

    #[test]
    fn only_authentication_counts_as_rejection() {
        assert!(SlotError::Cipher(CipherError::Authentication).is_rejection());
        assert!(!SlotError::Cipher(CipherError::InvalidNonce(8)).is_rejection());
        assert!(!SlotError::MissingField("salt").is_rejection());
    }
}
