//! Key slots and master-key resolution.
//!
//! Every slot independently wraps the same master key. Password slots are
//! unwrapped with an scrypt-derived key; the first slot in header order that
//! opens wins. Other slot kinds are skipped.

use std::fmt;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, mpsc};
use std::thread;

use serde_json::Number;
use tracing::{debug, warn};
use zeroize::Zeroizing;

use crate::crypto::{KEY_LEN, KdfLimits, KdfParams, aead, codec, kdf};
use crate::error::{KdfError, ResolveError, SlotError};
use crate::vault::AeadParams;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotType {
    Raw,
    Password,
    Biometric,
    Unknown(i64),
}

impl From<i64> for SlotType {
    fn from(value: i64) -> Self {
        match value {
            0 => SlotType::Raw,
            1 => SlotType::Password,
            2 => SlotType::Biometric,
            other => SlotType::Unknown(other),
        }
    }
}

impl fmt::Display for SlotType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SlotType::Raw => write!(f, "raw"),
            SlotType::Password => write!(f, "password"),
            SlotType::Biometric => write!(f, "biometric"),
            SlotType::Unknown(t) => write!(f, "unknown({t})"),
        }
    }
}

/// One way of recovering the master key. Binary fields stay hex-encoded
/// until an unwrap is attempted.
///
/// Every field past the type is optional so that slot kinds this crate does
/// not understand still load. Cost values keep their JSON form until
/// [`KeySlot::kdf_params`] validates them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeySlot {
    pub slot_type: SlotType,
    pub uuid: Option<String>,
    pub wrapped_key: Option<String>,
    pub key_params: Option<AeadParams>,
    pub salt: Option<String>,
    pub n: Option<Number>,
    pub r: Option<Number>,
    pub p: Option<Number>,
    pub repaired: bool,
    pub is_backup: bool,
}

/// Reads one cost value. Integers outside `i64` never reach the KDF.
fn cost(
    field: &'static str,
    name: &'static str,
    value: Option<&Number>,
) -> Result<i64, SlotError> {
    let value = value.ok_or(SlotError::MissingField(field))?;
    if let Some(value) = value.as_i64() {
        return Ok(value);
    }

    let err = match value.as_u64() {
        Some(value) => KdfError::ExceedsLimit {
            name,
            value,
            max: i64::MAX as u64,
        },
        None => KdfError::NotAnInteger { name },
    };
    Err(err.into())
}

impl KeySlot {
    pub fn is_password(&self) -> bool {
        self.slot_type == SlotType::Password
    }

    /// Validated scrypt parameters of a password slot.
    pub fn kdf_params(&self) -> Result<KdfParams, SlotError> {
        let n = cost("n", "N", self.n.as_ref())?;
        let r = cost("r", "r", self.r.as_ref())?;
        let p = cost("p", "p", self.p.as_ref())?;
        Ok(KdfParams::new(n, r, p)?)
    }

    /// Attempt to unwrap the master key with `passphrase`.
    pub fn unwrap_key(
        &self,
        passphrase: &[u8],
        limits: &KdfLimits,
    ) -> Result<MasterKey, SlotError> {
        let salt = self.salt.as_deref().ok_or(SlotError::MissingField("salt"))?;
        let wrapped = self.wrapped_key.as_deref().ok_or(SlotError::MissingField("key"))?;
        let key_params = self
            .key_params
            .as_ref()
            .ok_or(SlotError::MissingField("key_params"))?;

        let salt = codec::decode_hex(salt)?;
        let wrapped = codec::decode_hex(wrapped)?;
        let nonce = codec::decode_hex(&key_params.nonce)?;
        let tag = codec::decode_hex(&key_params.tag)?;

        let params = self.kdf_params()?;
        let kek = kdf::derive_key(passphrase, &salt, &params, limits)?;

        let opened = aead::open(kek.as_ref(), &nonce, &aead::with_tag(&wrapped, &tag), &[])?;
        MasterKey::from_slice(&opened)
    }
}

/// The 32-byte key protecting the vault payload. Zeroed on drop.
pub struct MasterKey(Zeroizing<[u8; KEY_LEN]>);

impl MasterKey {
    pub fn from_slice(bytes: &[u8]) -> Result<Self, SlotError> {
        if bytes.len() != KEY_LEN {
            return Err(SlotError::MasterKeyLength(bytes.len()));
        }
        let mut key = Zeroizing::new([0u8; KEY_LEN]);
        key.copy_from_slice(bytes);
        Ok(Self(key))
    }

    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.0
    }
}

impl fmt::Debug for MasterKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("MasterKey(<redacted>)")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Strategy {
    /// Try slots one after another.
    #[default]
    Sequential,
    /// Try slots on up to `workers` threads.
    Parallel { workers: usize },
}

impl Strategy {
    /// Parallel with one worker per available CPU.
    pub fn parallel() -> Self {
        let workers = thread::available_parallelism()
            .map(NonZeroUsize::get)
            .unwrap_or(1);
        Strategy::Parallel { workers }
    }
}

#[derive(Debug, Default)]
struct Tally {
    attempted: usize,
    rejected: usize,
    malformed: usize,
}

impl Tally {
    fn record(&mut self, index: usize, err: &SlotError) {
        self.attempted += 1;
        if err.is_rejection() {
            self.rejected += 1;
            debug!(slot = index, "passphrase did not match slot");
        } else {
            self.malformed += 1;
            debug!(slot = index, error = %err, "slot could not be attempted");
        }
    }

    fn lost(&mut self, index: usize) {
        self.attempted += 1;
        self.malformed += 1;
        warn!(slot = index, "slot worker exited without a result");
    }

    fn exhausted(self) -> ResolveError {
        ResolveError::Exhausted {
            attempted: self.attempted,
            rejected: self.rejected,
            malformed: self.malformed,
        }
    }
}

/// Finds the master key among a vault's key slots.
#[derive(Debug, Clone, Copy, Default)]
pub struct Resolver {
    limits: KdfLimits,
    strategy: Strategy,
}

impl Resolver {
    pub fn new(limits: KdfLimits, strategy: Strategy) -> Self {
        Self { limits, strategy }
    }

    pub fn limits(&self) -> &KdfLimits {
        &self.limits
    }

    pub fn strategy(&self) -> Strategy {
        self.strategy
    }

    /// Returns the master key from the first password slot, in header order,
    /// that `passphrase` unlocks.
    ///
    /// Per-slot failures never abort resolution; only exhausting every
    /// password slot does.
    pub fn resolve(
        &self,
        slots: &[KeySlot],
        passphrase: &[u8],
    ) -> Result<MasterKey, ResolveError> {
        let candidates: Vec<(usize, &KeySlot)> = slots
            .iter()
            .enumerate()
            .filter(|(index, slot)| match slot.slot_type {
                SlotType::Password => true,
                SlotType::Unknown(t) => {
                    warn!(slot = index, slot_type = t, "skipping unknown slot type");
                    false
                }
                other => {
                    debug!(slot = index, slot_type = %other, "skipping non-password slot");
                    false
                }
            })
            .collect();

        match self.strategy {
            Strategy::Parallel { workers } if workers > 1 && candidates.len() > 1 => {
                let owned = candidates
                    .into_iter()
                    .map(|(index, slot)| (index, slot.clone()))
                    .collect();
                self.resolve_parallel(owned, passphrase, workers)
            }
            _ => self.resolve_sequential(&candidates, passphrase),
        }
    }

    fn resolve_sequential(
        &self,
        candidates: &[(usize, &KeySlot)],
        passphrase: &[u8],
    ) -> Result<MasterKey, ResolveError> {
        let mut tally = Tally::default();

        for &(index, slot) in candidates {
            match slot.unwrap_key(passphrase, &self.limits) {
                Ok(key) => {
                    debug!(slot = index, "slot unlocked");
                    return Ok(key);
                }
                Err(err) => tally.record(index, &err),
            }
        }

        Err(tally.exhausted())
    }

    /// Bounded worker pool pulling slot positions from a shared counter.
    ///
    /// Outcomes are consumed in slot order so the lowest matching slot wins.
    /// Once it is known the stop flag keeps workers from starting new slots;
    /// slots already in flight are abandoned, not joined.
    fn resolve_parallel(
        &self,
        candidates: Vec<(usize, KeySlot)>,
        passphrase: &[u8],
        workers: usize,
    ) -> Result<MasterKey, ResolveError> {
        let total = candidates.len();
        let jobs = Arc::new(candidates);
        let secret = Arc::new(Zeroizing::new(passphrase.to_vec()));
        let next = Arc::new(AtomicUsize::new(0));
        let stop = Arc::new(AtomicBool::new(false));
        let (tx, rx) = mpsc::channel::<(usize, Result<MasterKey, SlotError>)>();

        let mut spawned = 0;
        for _ in 0..workers.min(total) {
            let jobs = Arc::clone(&jobs);
            let secret = Arc::clone(&secret);
            let next = Arc::clone(&next);
            let stop = Arc::clone(&stop);
            let tx = tx.clone();
            let limits = self.limits;

            let worker = thread::Builder::new()
                .name("unvault-slot".to_string())
                .spawn(move || {
                    while !stop.load(Ordering::Acquire) {
                        let pos = next.fetch_add(1, Ordering::AcqRel);
                        let Some((_, slot)) = jobs.get(pos) else {
                            break;
                        };
                        let outcome = slot.unwrap_key(secret.as_slice(), &limits);
                        if tx.send((pos, outcome)).is_err() {
                            break;
                        }
                    }
                });

            match worker {
                Ok(_) => spawned += 1,
                Err(err) => warn!(error = %err, "failed to spawn slot worker"),
            }
        }
        drop(tx);

        if spawned == 0 {
            let borrowed: Vec<(usize, &KeySlot)> =
                jobs.iter().map(|(index, slot)| (*index, slot)).collect();
            return self.resolve_sequential(&borrowed, passphrase);
        }

        let mut outcomes: Vec<Option<Result<MasterKey, SlotError>>> =
            (0..total).map(|_| None).collect();
        let mut tally = Tally::default();
        let mut cursor = 0;
        let mut disconnected = false;

        while cursor < total {
            let index = jobs[cursor].0;
            match outcomes[cursor].take() {
                Some(Ok(key)) => {
                    stop.store(true, Ordering::Release);
                    debug!(slot = index, "slot unlocked");
                    return Ok(key);
                }
                Some(Err(err)) => {
                    tally.record(index, &err);
                    cursor += 1;
                }
                None if disconnected => {
                    tally.lost(index);
                    cursor += 1;
                }
                None => match rx.recv() {
                    Ok((pos, outcome)) => outcomes[pos] = Some(outcome),
                    Err(_) => disconnected = true,
                },
            }
        }

        Err(tally.exhausted())
    }
}

/// Resolve with default limits, one slot at a time.
pub fn resolve_master_key(
    slots: &[KeySlot],
    passphrase: &[u8],
) -> Result<MasterKey, ResolveError> {
    Resolver::default().resolve(slots, passphrase)
}

/// Builds a password slot wrapping `master` under `passphrase` with cheap
/// scrypt costs.
#[cfg(test)]
pub(crate) fn sealed_password_slot(passphrase: &[u8], master: &[u8], salt: &[u8]) -> KeySlot {
    let params = KdfParams::new(16, 8, 1).unwrap();
    let kek = kdf::derive_key(passphrase, salt, &params, &KdfLimits::default()).unwrap();
    let nonce = [0x5au8; 12];
    let (ciphertext, tag) = aead::seal(kek.as_ref(), &nonce, master);

    KeySlot {
        slot_type: SlotType::Password,
        uuid: None,
        wrapped_key: Some(hex::encode(ciphertext)),
        key_params: Some(AeadParams {
            nonce: hex::encode(nonce),
            tag: hex::encode(tag),
        }),
        salt: Some(hex::encode(salt)),
        n: Some(Number::from(16)),
        r: Some(Number::from(8)),
        p: Some(Number::from(1)),
        repaired: true,
        is_backup: false,
    }
}
