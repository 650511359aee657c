//! Cryptographic primitives for unlocking a vault.
//!
//! Provides field decoding, scrypt key derivation and AES-256-GCM opening.

pub mod aead;
pub mod codec;
pub mod kdf;

pub use aead::{open, with_tag};
pub use codec::{decode_base64, decode_hex};
pub use kdf::{KdfLimits, KdfParams, derive, derive_key};

/// Length of every symmetric key (32 bytes / 256 bits).
pub const KEY_LEN: usize = 32;
/// Length of the AES-GCM nonce (12 bytes).
pub const NONCE_LEN: usize = 12;
/// Length of the AES-GCM authentication tag (16 bytes).
pub const TAG_LEN: usize = 16;
