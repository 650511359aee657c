pub mod crypto;
pub mod error;
pub mod format;
pub mod slots;
mod storage;
pub mod vault;

use std::fmt;

pub use crate::crypto::{KdfLimits, KdfParams};
pub use crate::error::{FailureReason, VaultError};
pub use crate::format::VaultFile;
pub use crate::slots::{KeySlot, MasterKey, Resolver, SlotType, Strategy, resolve_master_key};
pub use crate::storage::Storage;
pub use crate::vault::{
    AeadParams, DecryptOptions, EncryptedPayload, VaultHeader, decrypt_vault, decrypt_vault_with,
};
use anyhow::{Context, Result, bail};
use tracing::info;
use zeroize::Zeroizing;

/// An encrypted vault loaded from disk.
pub struct Unvault {
    storage: Storage,
    file: VaultFile,
}

impl Unvault {
    /// Reads and parses the vault at `storage`.
    pub fn open(storage: Storage) -> Result<Self> {
        if !storage.exists() {
            bail!("vault file {} does not exist", storage.path().display());
        }

        let data = storage.load()?;
        let file = format::parse(&data)
            .with_context(|| format!("failed to parse vault {}", storage.path().display()))?;

        info!(
            version = file.version(),
            slots = file.header().slots.len(),
            "vault loaded"
        );

        Ok(Self { storage, file })
    }

    pub fn file(&self) -> &VaultFile {
        &self.file
    }

    /// Describes the vault without decrypting anything.
    pub fn info(&self) -> VaultInfo {
        let slots = self
            .file
            .header()
            .slots
            .iter()
            .map(|slot| SlotInfo {
                slot_type: slot.slot_type,
                uuid: slot.uuid.clone(),
                kdf: slot.kdf_params().ok(),
                is_backup: slot.is_backup,
            })
            .collect();

        VaultInfo {
            path: self.storage.path().display().to_string(),
            version: self.file.version(),
            slots,
            payload_len: self.file.payload().ciphertext.len(),
        }
    }

    /// Decrypts the payload with `password`.
    pub fn decrypt(
        &self,
        password: Zeroizing<String>,
        options: &DecryptOptions,
    ) -> Result<Zeroizing<Vec<u8>>> {
        let plaintext = decrypt_vault_with(
            self.file.header(),
            self.file.payload(),
            password.as_bytes(),
            options,
        )?;
        drop(password);

        Ok(plaintext)
    }
}

pub struct SlotInfo {
    slot_type: SlotType,
    uuid: Option<String>,
    kdf: Option<KdfParams>,
    is_backup: bool,
}

impl SlotInfo {
    pub fn slot_type(&self) -> SlotType {
        self.slot_type
    }

    pub fn uuid(&self) -> Option<&str> {
        self.uuid.as_deref()
    }

    /// Valid scrypt parameters, if the slot carries any.
    pub fn kdf(&self) -> Option<&KdfParams> {
        self.kdf.as_ref()
    }

    pub fn is_backup(&self) -> bool {
        self.is_backup
    }
}

pub struct VaultInfo {
    path: String,
    version: u64,
    slots: Vec<SlotInfo>,
    payload_len: usize,
}

impl VaultInfo {
    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn slots(&self) -> &[SlotInfo] {
        &self.slots
    }

    /// Length of the base64 payload text.
    pub fn payload_len(&self) -> usize {
        self.payload_len
    }
}

impl fmt::Display for VaultInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Vault:    {}", self.path)?;
        writeln!(f, "Version:  {}", self.version)?;
        writeln!(f, "Payload:  {} bytes (base64)", self.payload_len)?;
        write!(f, "Slots:    {}", self.slots.len())?;

        for (index, slot) in self.slots.iter().enumerate() {
            write!(f, "\n  [{index}] {}", slot.slot_type)?;
            if let Some(uuid) = &slot.uuid {
                write!(f, " {uuid}")?;
            }
            if let Some(kdf) = &slot.kdf {
                write!(f, " scrypt(N={}, r={}, p={})", kdf.n(), kdf.r(), kdf.p())?;
            }
            if slot.is_backup {
                write!(f, " backup")?;
            }
        }
        Ok(())
    }
}
