//! Framing of variable-length fields into cipher blocks.
//!
//! The first block of a field holds a little-endian u32 data length, the
//! field type and up to 11 data bytes. Further blocks carry 16 data bytes
//! each; the tail of the last block is random padding.

use std::slice::ChunksExact;

use thiserror::Error;
use zeroize::Zeroizing;

use crate::crypto::{self, BLOCK_LEN, CbcDecryptor, CbcEncryptor};
use crate::error::Error;

/// Length prefix plus type byte.
const PREFIX_LEN: usize = 5;
/// Data bytes that fit into the first block of a field.
const FIRST_CHUNK: usize = BLOCK_LEN - PREFIX_LEN;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    pub field_type: u8,
    pub data: Vec<u8>,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FramingError {
    #[error("no block left for the next field")]
    MissingBlock,
    #[error("field of {0} bytes runs past the end of the data")]
    Overrun(usize),
}

/// Decrypts fields one at a time from a block-aligned ciphertext.
pub struct FieldReader<'a> {
    blocks: ChunksExact<'a, u8>,
    decryptor: CbcDecryptor,
}

impl<'a> FieldReader<'a> {
    /// Trailing bytes short of a whole block are never read.
    pub fn new(ciphertext: &'a [u8], decryptor: CbcDecryptor) -> Self {
        Self {
            blocks: ciphertext.chunks_exact(BLOCK_LEN),
            decryptor,
        }
    }

    /// `true` once every block has been consumed.
    pub fn is_at_end(&self) -> bool {
        self.blocks.len() == 0
    }

    fn next_block(&mut self) -> Option<Zeroizing<[u8; BLOCK_LEN]>> {
        let chunk = self.blocks.next()?;
        let mut block = Zeroizing::new([0u8; BLOCK_LEN]);
        block.copy_from_slice(chunk);
        self.decryptor.decrypt_block(&mut block);
        Some(block)
    }

    pub fn read_field(&mut self) -> Result<Field, FramingError> {
        let first = self.next_block().ok_or(FramingError::MissingBlock)?;

        let length = u32::from_le_bytes([first[0], first[1], first[2], first[3]]) as usize;
        let field_type = first[4];

        let head = length.min(FIRST_CHUNK);
        let mut remaining = length - head;
        if remaining > self.blocks.len() * BLOCK_LEN {
            return Err(FramingError::Overrun(length));
        }

        let mut data = Vec::with_capacity(length);
        data.extend_from_slice(&first[PREFIX_LEN..PREFIX_LEN + head]);

        while remaining > 0 {
            let block = self.next_block().ok_or(FramingError::Overrun(length))?;
            let take = remaining.min(BLOCK_LEN);
            data.extend_from_slice(&block[..take]);
            remaining -= take;
        }

        Ok(Field { field_type, data })
    }
}

/// Encrypts fields into one growing ciphertext buffer.
pub struct FieldWriter {
    encryptor: CbcEncryptor,
    out: Vec<u8>,
}

impl FieldWriter {
    pub fn new(encryptor: CbcEncryptor) -> Self {
        Self {
            encryptor,
            out: Vec::new(),
        }
    }

    pub fn write_field(&mut self, field_type: u8, data: &[u8]) -> Result<(), Error> {
        let length = u32::try_from(data.len())
            .map_err(|_| Error::Resource(format!("field of {} bytes is too large", data.len())))?;

        let used = PREFIX_LEN + data.len();
        let mut plain = Zeroizing::new(vec![0u8; used.div_ceil(BLOCK_LEN) * BLOCK_LEN]);
        // padding must be random, not zero
        crypto::secure_random(&mut plain)?;
        plain[..4].copy_from_slice(&length.to_le_bytes());
        plain[4] = field_type;
        plain[PREFIX_LEN..used].copy_from_slice(data);

        for chunk in plain.chunks_exact(BLOCK_LEN) {
            let mut block = [0u8; BLOCK_LEN];
            block.copy_from_slice(chunk);
            self.encryptor.encrypt_block(&mut block);
            self.out.extend_from_slice(&block);
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.out.len()
    }

    pub fn is_empty(&self) -> bool {
        self.out.is_empty()
    }

    pub fn into_ciphertext(self) -> Vec<u8> {
        self.out
    }
}
