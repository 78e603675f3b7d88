use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use zeroize::Zeroizing;

use super::{BLOCK_LEN, HASH_LEN, KEY_LEN, block};
use crate::error::Error;

/// Lowest iteration count accepted when writing a database.
pub const MIN_ITERATIONS: u32 = 2048;
/// Highest iteration count accepted on load or store. Larger counts are
/// refused before any hashing happens.
pub const MAX_ITERATIONS: u32 = 1 << 22;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StretchParams {
    iterations: u32,
}

impl Default for StretchParams {
    fn default() -> Self {
        Self {
            iterations: MIN_ITERATIONS,
        }
    }
}

impl StretchParams {
    pub fn new(iterations: u32) -> anyhow::Result<Self> {
        let params = Self { iterations };
        params.validate()?;
        Ok(params)
    }

    pub fn iterations(&self) -> u32 {
        self.iterations
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.iterations < MIN_ITERATIONS {
            anyhow::bail!("iteration count must be >= {MIN_ITERATIONS}");
        }
        if self.iterations > MAX_ITERATIONS {
            anyhow::bail!("iteration count must be <= {MAX_ITERATIONS}");
        }
        Ok(())
    }
}

/// Password after salting and repeated hashing. Wiped on drop.
pub struct StretchedPassword(Zeroizing<[u8; KEY_LEN]>);

impl StretchedPassword {
    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.0
    }

    /// SHA-256 of the stretched password, as stored in the file.
    pub fn verifier(&self) -> [u8; HASH_LEN] {
        Sha256::digest(self.0.as_slice()).into()
    }
}

/// `SHA256(password || salt)` followed by `iterations` further rounds.
///
/// The count is of rounds after the first one; files in the wild depend on it.
pub fn stretch(password: &str, salt: &[u8], iterations: u32) -> StretchedPassword {
    let mut hasher = Sha256::new();
    hasher.update(password.as_bytes());
    hasher.update(salt);
    let mut out = Zeroizing::new([0u8; KEY_LEN]);
    out.copy_from_slice(&hasher.finalize());

    for _ in 0..iterations {
        let next = Sha256::digest(out.as_slice());
        out.copy_from_slice(&next);
    }

    StretchedPassword(out)
}

/// Constant-time check of `SHA256(stretched)` against the stored verifier.
pub fn verify(stretched: &StretchedPassword, expected: &[u8; HASH_LEN]) -> bool {
    let actual = stretched.verifier();
    actual[..].ct_eq(&expected[..]).into()
}

/// Recover a 32-byte key from its two independently encrypted halves.
pub fn unwrap_key(
    stretched: &StretchedPassword,
    part_a: &[u8; BLOCK_LEN],
    part_b: &[u8; BLOCK_LEN],
) -> Result<Zeroizing<[u8; KEY_LEN]>, Error> {
    let mut a = Zeroizing::new(*part_a);
    let mut b = Zeroizing::new(*part_b);
    block::decrypt_block(stretched.as_bytes(), &mut a)?;
    block::decrypt_block(stretched.as_bytes(), &mut b)?;

    let mut key = Zeroizing::new([0u8; KEY_LEN]);
    key[..BLOCK_LEN].copy_from_slice(a.as_slice());
    key[BLOCK_LEN..].copy_from_slice(b.as_slice());
    Ok(key)
}

/// Inverse of [`unwrap_key`]: encrypt both halves, no IV, no chaining.
pub fn wrap_key(stretched: &StretchedPassword, key: &[u8; KEY_LEN]) -> Result<[u8; KEY_LEN], Error> {
    let mut out = *key;
    for half in out.chunks_exact_mut(BLOCK_LEN) {
        let half: &mut [u8; BLOCK_LEN] = half
            .try_into()
            .map_err(|_| Error::Resource("key half is not one block".into()))?;
        block::encrypt_block(stretched.as_bytes(), half)?;
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_iterations_is_single_salted_hash() {
        let salt = [5u8; 32];
        let stretched = stretch("123456", &salt, 0);

        let mut hasher = Sha256::new();
        hasher.update(b"123456");
        hasher.update(salt);
        let expected: [u8; 32] = hasher.finalize().into();

        assert_eq!(stretched.as_bytes(), &expected);
    }

    #[test]
    fn iterations_count_extra_rounds() {
        let salt = [1u8; 32];
        let one = stretch("pw", &salt, 1);
        let zero = stretch("pw", &salt, 0);

        let expected: [u8; 32] = Sha256::digest(zero.as_bytes()).into();
        assert_eq!(one.as_bytes(), &expected);
    }

    #[test]
    fn stretch_is_deterministic() {
        let salt = [42u8; 32];
        let a = stretch("password", &salt, MIN_ITERATIONS);
        let b = stretch("password", &salt, MIN_ITERATIONS);
        assert_eq!(a.as_bytes(), b.as_bytes());
    }

    #[test]
    fn verify_accepts_own_verifier_only() {
        let salt = [8u8; 32];
        let stretched = stretch("right", &salt, 10);
        let verifier = stretched.verifier();

        assert!(verify(&stretched, &verifier));
        assert!(!verify(&stretch("wrong", &salt, 10), &verifier));
        assert!(!verify(&stretch("right", &salt, 11), &verifier));
    }

    #[test]
    fn wrap_then_unwrap_restores_key() {
        let stretched = stretch("pw", &[0u8; 32], 3);
        let key = [0xabu8; KEY_LEN];

        let wrapped = wrap_key(&stretched, &key).unwrap();
        assert_ne!(wrapped, key);
        // identical halves encrypt identically: no chaining between them
        assert_eq!(wrapped[..BLOCK_LEN], wrapped[BLOCK_LEN..]);

        let a: [u8; BLOCK_LEN] = wrapped[..BLOCK_LEN].try_into().unwrap();
        let b: [u8; BLOCK_LEN] = wrapped[BLOCK_LEN..].try_into().unwrap();
        let unwrapped = unwrap_key(&stretched, &a, &b).unwrap();
        assert_eq!(*unwrapped, key);
    }

    #[test]
    fn stretch_params_enforce_bounds() {
        assert!(StretchParams::new(10).is_err());
        assert!(StretchParams::new(MAX_ITERATIONS + 1).is_err());
        assert_eq!(
            StretchParams::new(MAX_ITERATIONS).unwrap().iterations(),
            MAX_ITERATIONS
        );
        assert_eq!(StretchParams::new(4096).unwrap().iterations(), 4096);
        assert_eq!(StretchParams::default().iterations(), MIN_ITERATIONS);
    }
}
