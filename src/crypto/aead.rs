use aes_gcm::{
    Aes256Gcm, Nonce,
    aead::{Aead, KeyInit, Payload},
};
use zeroize::Zeroizing;

use super::{KEY_LEN, NONCE_LEN};
use crate::error::CipherError;

/// Append a detached tag to a ciphertext body, giving the combined form
/// AES-GCM expects.
pub fn with_tag(ciphertext: &[u8], tag: &[u8]) -> Vec<u8> {
    let mut combined = Vec::with_capacity(ciphertext.len() + tag.len());
    combined.extend_from_slice(ciphertext);
    combined.extend_from_slice(tag);
    combined
}

/// Decrypt and verify `ciphertext || tag` with AES-256-GCM.
pub fn open(
    key: &[u8],
    nonce: &[u8],
    ciphertext_with_tag: &[u8],
    aad: &[u8],
) -> Result<Zeroizing<Vec<u8>>, CipherError> {
    if key.len() != KEY_LEN {
        return Err(CipherError::InvalidKey(key.len()));
    }
    if nonce.len() != NONCE_LEN {
        return Err(CipherError::InvalidNonce(nonce.len()));
    }

    let cipher =
        Aes256Gcm::new_from_slice(key).map_err(|_| CipherError::InvalidKey(key.len()))?;

    let plaintext = cipher
        .decrypt(
            Nonce::from_slice(nonce),
            Payload {
                msg: ciphertext_with_tag,
                aad,
            },
        )
        .map_err(|_| CipherError::Authentication)?;

    Ok(Zeroizing::new(plaintext))
}

/// Encrypt for fixtures, returning `(ciphertext, tag)` detached.
#[cfg(test)]
pub(crate) fn seal(key: &[u8], nonce: &[u8], plaintext: &[u8]) -> (Vec<u8>, Vec<u8>) {
    use super::TAG_LEN;

    let cipher = Aes256Gcm::new_from_slice(key).unwrap();
    let mut sealed = cipher.encrypt(Nonce::from_slice(nonce), plaintext).unwrap();
    let tag = sealed.split_off(sealed.len() - TAG_LEN);
    (sealed, tag)
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEK: &str = "e62c5885e984b9f4648abe33a696dd7f3321d09167d4fa77fbb0da94221a248a";
    const NONCE: &str = "0102030405060708090a0b0c";
    const WRAPPED: &str = "fdb706f95ea8ce48ae5fc5c82f017da1a83318dea8b409317728d307b60eb25c";
    const TAG: &str = "9eb2089899cc2dfe1d3444d8fbc96686";
    const MASTER: &str = "202122232425262728292a2b2c2d2e2f303132333435363738393a3b3c3d3e3f";

    fn fixture() -> (Vec<u8>, Vec<u8>, Vec<u8>) {
        let key = hex::decode(KEK).unwrap();
        let nonce = hex::decode(NONCE).unwrap();
        let sealed = with_tag(&hex::decode(WRAPPED).unwrap(), &hex::decode(TAG).unwrap());
        (key, nonce, sealed)
    }

    #[test]
    fn opens_reference_wrapped_key() {
        let (key, nonce, sealed) = fixture();

        let master = open(&key, &nonce, &sealed, &[]).unwrap();

        assert_eq!(hex::encode(&*master), MASTER);
    }

    #[test]
    fn flipped_tag_byte_fails_authentication() {
        let (key, nonce, mut sealed) = fixture();
        let last = sealed.len() - 1;
        sealed[last] ^= 0x01;

        assert_eq!(
            open(&key, &nonce, &sealed, &[]),
            Err(CipherError::Authentication)
        );
    }

    #[test]
    fn wrong_key_fails_authentication() {
        let (_, nonce, sealed) = fixture();

        assert_eq!(
            open(&[0u8; 32], &nonce, &sealed, &[]),
            Err(CipherError::Authentication)
        );
    }

    #[test]
    fn associated_data_must_match() {
        let (key, nonce, sealed) = fixture();

        assert_eq!(
            open(&key, &nonce, &sealed, b"header"),
            Err(CipherError::Authentication)
        );
    }

    #[test]
    fn truncated_input_fails_authentication() {
        let (key, nonce, _) = fixture();

        assert_eq!(
            open(&key, &nonce, &[0u8; 4], &[]),
            Err(CipherError::Authentication)
        );
    }

    #[test]
    fn bad_lengths_are_reported() {
        let (key, nonce, sealed) = fixture();

        assert_eq!(
            open(&key[..16], &nonce, &sealed, &[]),
            Err(CipherError::InvalidKey(16))
        );
        assert_eq!(
            open(&key, &nonce[..8], &sealed, &[]),
            Err(CipherError::InvalidNonce(8))
        );
    }

    #[test]
    fn seal_then_open() {
        let key = [9u8; 32];
        let nonce = [3u8; 12];
        let (ciphertext, tag) = seal(&key, &nonce, b"payload");

        let plaintext = open(&key, &nonce, &with_tag(&ciphertext, &tag), &[]).unwrap();
        assert_eq!(&plaintext[..], b"payload");
    }
}
