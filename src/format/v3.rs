//! Fixed layout of a V3 database file.
//!
//! ```text
//! TAG (4) | SALT (32) | ITER (4) | H(P') (32) | B1 B2 (32) | B3 B4 (32) | IV (16) | FIELDS (n*16) | EOF (16) | HMAC (32)
//! ```
//! `B1 B2` wrap the data key, `B3 B4` the HMAC key. Integers are little-endian.

use crate::crypto::{BLOCK_LEN, HASH_LEN, KEY_LEN, SALT_LEN};
use crate::error::Error;

/// Magic bytes opening every V3 database ("PWS3").
pub const TAG: &[u8; 4] = b"PWS3";
/// Literal separating the encrypted fields from the HMAC.
pub const EOF_MARKER: &[u8; 16] = b"PWS3-EOFPWS3-EOF";

const TAG_LEN: usize = 4;
const ITER_LEN: usize = 4;

/// Bytes before the first encrypted field.
pub const PREAMBLE_LEN: usize =
    TAG_LEN + SALT_LEN + ITER_LEN + HASH_LEN + KEY_LEN + KEY_LEN + BLOCK_LEN;
/// Bytes after the last encrypted field.
pub const TRAILER_LEN: usize = EOF_MARKER.len() + HASH_LEN;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Preamble {
    salt: [u8; SALT_LEN],
    iterations: u32,
    verifier: [u8; HASH_LEN],
    wrapped_data_key: [[u8; BLOCK_LEN]; 2],
    wrapped_hmac_key: [[u8; BLOCK_LEN]; 2],
    iv: [u8; BLOCK_LEN],
}

impl Preamble {
    pub fn new(
        salt: [u8; SALT_LEN],
        iterations: u32,
        verifier: [u8; HASH_LEN],
        wrapped_data_key: [u8; KEY_LEN],
        wrapped_hmac_key: [u8; KEY_LEN],
        iv: [u8; BLOCK_LEN],
    ) -> Self {
        Self {
            salt,
            iterations,
            verifier,
            wrapped_data_key: split(&wrapped_data_key),
            wrapped_hmac_key: split(&wrapped_hmac_key),
            iv,
        }
    }

    pub fn salt(&self) -> &[u8; SALT_LEN] {
        &self.salt
    }

    pub fn iterations(&self) -> u32 {
        self.iterations
    }

    pub fn verifier(&self) -> &[u8; HASH_LEN] {
        &self.verifier
    }

    pub fn wrapped_data_key(&self) -> (&[u8; BLOCK_LEN], &[u8; BLOCK_LEN]) {
        (&self.wrapped_data_key[0], &self.wrapped_data_key[1])
    }

    pub fn wrapped_hmac_key(&self) -> (&[u8; BLOCK_LEN], &[u8; BLOCK_LEN]) {
        (&self.wrapped_hmac_key[0], &self.wrapped_hmac_key[1])
    }

    pub fn iv(&self) -> &[u8; BLOCK_LEN] {
        &self.iv
    }
}

fn split(key: &[u8; KEY_LEN]) -> [[u8; BLOCK_LEN]; 2] {
    let mut out = [[0u8; BLOCK_LEN]; 2];
    out[0].copy_from_slice(&key[..BLOCK_LEN]);
    out[1].copy_from_slice(&key[BLOCK_LEN..]);
    out
}

/// A split but still encrypted database.
#[derive(Debug)]
pub struct Envelope<'a> {
    pub preamble: Preamble,
    pub ciphertext: &'a [u8],
    pub hmac: [u8; HASH_LEN],
}

fn array<const N: usize>(data: &[u8], offset: &mut usize) -> Result<[u8; N], Error> {
    let bytes = data
        .get(*offset..*offset + N)
        .and_then(|b| <[u8; N]>::try_from(b).ok())
        .ok_or_else(|| Error::Format("file too short".into()))?;
    *offset += N;
    Ok(bytes)
}

/// Splits a V3 file into preamble, encrypted fields and HMAC.
///
/// # Errors
///
/// Returns [`Error::Format`] if:
/// - The file is shorter than preamble plus trailer
/// - The tag or the EOF marker is wrong
/// - The encrypted region is empty or not a whole number of blocks
pub fn parse(data: &[u8]) -> Result<Envelope<'_>, Error> {
    if data.len() < PREAMBLE_LEN + TRAILER_LEN {
        return Err(Error::Format(format!(
            "file too short: {} bytes, need at least {}",
            data.len(),
            PREAMBLE_LEN + TRAILER_LEN
        )));
    }

    let trailer = data.len() - TRAILER_LEN;
    if &data[trailer..trailer + EOF_MARKER.len()] != EOF_MARKER {
        return Err(Error::Format("missing EOF marker".into()));
    }

    let mut offset = 0;
    let tag: [u8; TAG_LEN] = array(data, &mut offset)?;
    if &tag != TAG {
        return Err(Error::Format("not a V3 database (bad tag)".into()));
    }

    let salt = array(data, &mut offset)?;
    let iterations = u32::from_le_bytes(array(data, &mut offset)?);
    let verifier = array(data, &mut offset)?;
    let wrapped_data_key = array(data, &mut offset)?;
    let wrapped_hmac_key = array(data, &mut offset)?;
    let iv = array(data, &mut offset)?;

    let ciphertext = &data[offset..trailer];
    if ciphertext.is_empty() || ciphertext.len() % BLOCK_LEN != 0 {
        return Err(Error::Format(format!(
            "encrypted region of {} bytes is not a positive multiple of {BLOCK_LEN}",
            ciphertext.len()
        )));
    }

    let mut hmac_offset = trailer + EOF_MARKER.len();
    let hmac = array(data, &mut hmac_offset)?;

    Ok(Envelope {
        preamble: Preamble::new(
            salt,
            iterations,
            verifier,
            wrapped_data_key,
            wrapped_hmac_key,
            iv,
        ),
        ciphertext,
        hmac,
    })
}

/// Assembles a V3 file from its parts.
pub fn serialize(preamble: &Preamble, ciphertext: &[u8], hmac: &[u8; HASH_LEN]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(PREAMBLE_LEN + ciphertext.len() + TRAILER_LEN);

    buf.extend_from_slice(TAG);
    buf.extend_from_slice(&preamble.salt);
    buf.extend_from_slice(&preamble.iterations.to_le_bytes());
    buf.extend_from_slice(&preamble.verifier);
    for half in preamble.wrapped_data_key.iter().chain(&preamble.wrapped_hmac_key) {
        buf.extend_from_slice(half);
    }
    buf.extend_from_slice(&preamble.iv);
    buf.extend_from_slice(ciphertext);
    buf.extend_from_slice(EOF_MARKER);
    buf.extend_from_slice(hmac);

    buf
}
