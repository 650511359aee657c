use zeroize::Zeroizing;

use super::KEY_LEN;
use crate::error::KdfError;

/// Upper bounds applied to cost parameters read from a vault file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KdfLimits {
    pub max_log_n: u8,
    pub max_r: u32,
    pub max_p: u32,
    pub max_memory_bytes: u64,
}

impl Default for KdfLimits {
    fn default() -> Self {
        Self {
            // N up to 2^20
            max_log_n: 20,
            max_r: 32,
            max_p: 16,
            max_memory_bytes: 1 << 30, // 1 GiB
        }
    }
}

/// Validated scrypt cost triple.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KdfParams {
    n: u64,
    r: u32,
    p: u32,
}

impl KdfParams {
    /// Validates raw (possibly hostile) cost values taken from a vault file.
    pub fn new(n: i64, r: i64, p: i64) -> Result<Self, KdfError> {
        let n_cost = positive("N", n)?;
        let r = positive("r", r)?;
        let p = positive("p", p)?;

        if n_cost < 2 || !n_cost.is_power_of_two() {
            return Err(KdfError::InvalidCost(n));
        }

        Ok(Self {
            n: n_cost,
            r: narrow("r", r)?,
            p: narrow("p", p)?,
        })
    }

    pub fn n(&self) -> u64 {
        self.n
    }

    pub fn r(&self) -> u32 {
        self.r
    }

    pub fn p(&self) -> u32 {
        self.p
    }

    pub fn log_n(&self) -> u8 {
        self.n.trailing_zeros() as u8
    }

    /// Size in bytes of the scrypt scratch vector, `128 * r * N`.
    pub fn memory_cost(&self) -> u64 {
        128u64.saturating_mul(self.r as u64).saturating_mul(self.n)
    }

    pub fn check(&self, limits: &KdfLimits) -> Result<(), KdfError> {
        if self.log_n() > limits.max_log_n {
            return Err(KdfError::ExceedsLimit {
                name: "N",
                value: self.n,
                max: 1u64 << limits.max_log_n,
            });
        }
        if self.r > limits.max_r {
            return Err(KdfError::ExceedsLimit {
                name: "r",
                value: self.r as u64,
                max: limits.max_r as u64,
            });
        }
        if self.p > limits.max_p {
            return Err(KdfError::ExceedsLimit {
                name: "p",
                value: self.p as u64,
                max: limits.max_p as u64,
            });
        }
        if self.memory_cost() > limits.max_memory_bytes {
            return Err(KdfError::ExceedsLimit {
                name: "memory",
                value: self.memory_cost(),
                max: limits.max_memory_bytes,
            });
        }
        Ok(())
    }

    fn scrypt_params(&self, output_len: usize) -> Result<scrypt::Params, KdfError> {
        Ok(scrypt::Params::new(self.log_n(), self.r, self.p, output_len)?)
    }
}

fn positive(name: &'static str, value: i64) -> Result<u64, KdfError> {
    if value < 1 {
        return Err(KdfError::NonPositive { name, value });
    }
    Ok(value as u64)
}

fn narrow(name: &'static str, value: u64) -> Result<u32, KdfError> {
    u32::try_from(value).map_err(|_| KdfError::ExceedsLimit {
        name,
        value,
        max: u32::MAX as u64,
    })
}

/// Derive `output_len` bytes from a passphrase with scrypt.
///
/// Parameters are checked against `limits` before any work is done.
pub fn derive(
    passphrase: &[u8],
    salt: &[u8],
    params: &KdfParams,
    limits: &KdfLimits,
    output_len: usize,
) -> Result<Zeroizing<Vec<u8>>, KdfError> {
    params.check(limits)?;
    let scrypt_params = params.scrypt_params(output_len)?;

    let mut output = Zeroizing::new(vec![0u8; output_len]);
    scrypt::scrypt(passphrase, salt, &scrypt_params, &mut output)
        .map_err(|_| KdfError::InvalidOutputLen(output_len))?;

    Ok(output)
}

/// Derive a 32-byte key-encryption key.
pub fn derive_key(
    passphrase: &[u8],
    salt: &[u8],
    params: &KdfParams,
    limits: &KdfLimits,
) -> Result<Zeroizing<[u8; KEY_LEN]>, KdfError> {
    params.check(limits)?;
    let scrypt_params = params.scrypt_params(KEY_LEN)?;

    let mut key = Zeroizing::new([0u8; KEY_LEN]);
    scrypt::scrypt(passphrase, salt, &scrypt_params, key.as_mut())
        .map_err(|_| KdfError::InvalidOutputLen(KEY_LEN))?;

    Ok(key)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cheap() -> KdfParams {
        KdfParams::new(16, 8, 1).unwrap()
    }

    #[test]
    fn matches_reference_vector() {
        let salt = hex::decode("00112233445566778899aabbccddeeff").unwrap();
        let params = KdfParams::new(32768, 8, 1).unwrap();

        let key = derive_key(b"correct-horse", &salt, &params, &KdfLimits::default()).unwrap();

        assert_eq!(
            hex::encode(*key),
            "e62c5885e984b9f4648abe33a696dd7f3321d09167d4fa77fbb0da94221a248a"
        );
    }

    #[test]
    fn kdf_is_deterministic() {
        let salt = [42u8; 16];
        let limits = KdfLimits::default();

        let k1 = derive_key(b"password", &salt, &cheap(), &limits).unwrap();
        let k2 = derive_key(b"password", &salt, &cheap(), &limits).unwrap();

        assert_eq!(*k1, *k2);
    }

    #[test]
    fn salt_and_params_affect_output() {
        let limits = KdfLimits::default();

        let k1 = derive_key(b"pw", &[7u8; 16], &cheap(), &limits).unwrap();
        let k2 = derive_key(b"pw", &[8u8; 16], &cheap(), &limits).unwrap();
        let k3 = derive_key(b"pw", &[7u8; 16], &KdfParams::new(32, 8, 1).unwrap(), &limits)
            .unwrap();

        assert_ne!(*k1, *k2);
        assert_ne!(*k1, *k3);
    }

    #[test]
    fn derive_honours_output_length() {
        let limits = KdfLimits::default();
        let long = derive(b"pw", b"salt", &cheap(), &limits, 64).unwrap();
        let key = derive_key(b"pw", b"salt", &cheap(), &limits).unwrap();

        assert_eq!(long.len(), 64);
        assert_eq!(&long[..KEY_LEN], &key[..]);
    }

    #[test]
    fn zero_and_negative_costs_are_rejected() {
        assert_eq!(
            KdfParams::new(0, 8, 1),
            Err(KdfError::NonPositive { name: "N", value: 0 })
        );
        assert_eq!(
            KdfParams::new(16, -8, 1),
            Err(KdfError::NonPositive { name: "r", value: -8 })
        );
        assert_eq!(
            KdfParams::new(16, 8, 0),
            Err(KdfError::NonPositive { name: "p", value: 0 })
        );
    }

    #[test]
    fn n_must_be_a_power_of_two_above_one() {
        assert_eq!(KdfParams::new(1000, 8, 1), Err(KdfError::InvalidCost(1000)));
        assert_eq!(KdfParams::new(1, 8, 1), Err(KdfError::InvalidCost(1)));
        assert!(KdfParams::new(2, 1, 1).is_ok());
    }

    #[test]
    fn oversized_costs_are_rejected_before_derivation() {
        let limits = KdfLimits::default();

        let huge_n = KdfParams::new(1 << 40, 8, 1).unwrap();
        assert!(matches!(
            derive_key(b"pw", b"salt", &huge_n, &limits),
            Err(KdfError::ExceedsLimit { name: "N", .. })
        ));

        let huge_r = KdfParams::new(16, 1 << 20, 1).unwrap();
        assert!(matches!(
            huge_r.check(&limits),
            Err(KdfError::ExceedsLimit { name: "r", .. })
        ));

        let huge_p = KdfParams::new(16, 8, 1024).unwrap();
        assert!(matches!(
            huge_p.check(&limits),
            Err(KdfError::ExceedsLimit { name: "p", .. })
        ));

        assert!(matches!(
            KdfParams::new(16, 1 << 40, 1),
            Err(KdfError::ExceedsLimit { name: "r", .. })
        ));
    }

    #[test]
    fn memory_limit_is_enforced() {
        let params = KdfParams::new(1 << 20, 16, 1).unwrap();
        let limits = KdfLimits {
            max_log_n: 24,
            ..KdfLimits::default()
        };

        assert_eq!(params.memory_cost(), 2 << 30);
        assert!(matches!(
            params.check(&limits),
            Err(KdfError::ExceedsLimit { name: "memory", .. })
        ));
    }
}
