use hmac::{Hmac, Mac};
use sha2::Sha256;

use super::HASH_LEN;
use crate::error::Error;

type HmacSha256 = Hmac<Sha256>;

/// HMAC-SHA-256 accumulated over the plaintext payload of every field.
///
/// Only field data is fed in, never the length/type prefix or the padding.
pub struct IntegrityDigest {
    mac: HmacSha256,
}

impl IntegrityDigest {
    pub fn new(key: &[u8]) -> Result<Self, Error> {
        let mac = <HmacSha256 as Mac>::new_from_slice(key)
            .map_err(|_| Error::Resource("invalid HMAC key length".into()))?;
        Ok(Self { mac })
    }

    pub fn update(&mut self, data: &[u8]) {
        self.mac.update(data);
    }

    pub fn finalize(self) -> [u8; HASH_LEN] {
        self.mac.finalize().into_bytes().into()
    }

    /// Constant-time comparison against the digest stored in the file.
    pub fn verify(self, expected: &[u8; HASH_LEN]) -> bool {
        self.mac.verify_slice(expected).is_ok()
    }
}
