//! Cryptographic primitives for the database envelope.
//!
//! Provides the Twofish block engine, password stretching and key wrapping,
//! the HMAC integrity digest and the secure random source.

pub mod block;
pub mod digest;
pub mod kdf;

pub use block::{CbcDecryptor, CbcEncryptor, decrypt_block, encrypt_block};
pub use digest::IntegrityDigest;
pub use kdf::{StretchParams, StretchedPassword, stretch, unwrap_key, verify, wrap_key};

use crate::error::Error;
use getrandom::fill;

/// Cipher block size (16 bytes / 128 bits).
pub const BLOCK_LEN: usize = 16;
/// Length of the data key, the HMAC key and the stretched password (32 bytes).
pub const KEY_LEN: usize = 32;
/// Length of the password salt (32 bytes).
pub const SALT_LEN: usize = 32;
/// Length of a SHA-256 output (32 bytes).
pub const HASH_LEN: usize = 32;

/// Fill buffer with cryptographically secure random bytes
pub fn secure_random(buf: &mut [u8]) -> Result<(), Error> {
    fill(buf).map_err(|e| Error::Resource(format!("OS random generator unavailable: {e}")))
}

/// Generate a fixed-size random array
pub fn random_array<const N: usize>() -> Result<[u8; N], Error> {
    let mut out = [0u8; N];
    secure_random(&mut out)?;
    Ok(out)
}
