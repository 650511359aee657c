//! Payload decryption under a recovered master key.

use tracing::{debug, info};
use zeroize::Zeroizing;

use crate::crypto::{KdfLimits, aead, codec};
use crate::error::{CipherError, FailureReason, VaultError};
use crate::slots::{KeySlot, Resolver, Strategy};

/// Hex-encoded nonce and tag for one AES-GCM message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AeadParams {
    pub nonce: String,
    pub tag: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VaultHeader {
    pub slots: Vec<KeySlot>,
    /// Protects the payload under the master key.
    pub params: AeadParams,
}

/// Base64 ciphertext of the entry database, tag stored in the header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptedPayload {
    pub ciphertext: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DecryptOptions {
    pub limits: KdfLimits,
    pub strategy: Strategy,
}

/// Decrypts a vault payload, resolving the master key from the header slots.
///
/// # Errors
///
/// - `DecryptionFailure { AuthenticationFailed }` when no slot accepts the
///   passphrase
/// - `DecryptionFailure { PayloadIntegrity }` when the master key was
///   recovered but the payload does not verify
/// - `Encoding` / `Cipher` when the payload fields cannot be decoded
pub fn decrypt_vault_with(
    header: &VaultHeader,
    payload: &EncryptedPayload,
    passphrase: &[u8],
    options: &DecryptOptions,
) -> Result<Zeroizing<Vec<u8>>, VaultError> {
    let resolver = Resolver::new(options.limits, options.strategy);
    let master_key = resolver.resolve(&header.slots, passphrase).map_err(|err| {
        debug!(error = %err, "slot resolution failed");
        VaultError::from(err)
    })?;

    let ciphertext = codec::decode_base64(&payload.ciphertext)?;
    let nonce = codec::decode_hex(&header.params.nonce)?;
    let tag = codec::decode_hex(&header.params.tag)?;

    let sealed = aead::with_tag(&ciphertext, &tag);
    let plaintext =
        aead::open(master_key.as_bytes(), &nonce, &sealed, &[]).map_err(|err| match err {
            CipherError::Authentication => VaultError::DecryptionFailure {
                reason: FailureReason::PayloadIntegrity,
            },
            other => VaultError::Cipher(other),
        })?;
    drop(master_key);

    info!(bytes = plaintext.len(), "vault payload decrypted");
    Ok(plaintext)
}

/// [`decrypt_vault_with`] using default limits and sequential resolution.
pub fn decrypt_vault(
    header: &VaultHeader,
    payload: &EncryptedPayload,
    passphrase: &[u8],
) -> Result<Zeroizing<Vec<u8>>, VaultError> {
    decrypt_vault_with(header, payload, passphrase, &DecryptOptions::default())
}
