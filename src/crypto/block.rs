use super::BLOCK_LEN;
use crate::error::Error;
use cipher::{
    BlockDecrypt, BlockDecryptMut, BlockEncrypt, BlockEncryptMut, KeyInit, KeyIvInit,
    generic_array::GenericArray,
};
use twofish::Twofish;

fn twofish(key: &[u8]) -> Result<Twofish, Error> {
    Twofish::new_from_slice(key).map_err(|_| Error::Resource("invalid Twofish key length".into()))
}

/// Encrypt a single block in place with no chaining (ECB).
pub fn encrypt_block(key: &[u8], block: &mut [u8; BLOCK_LEN]) -> Result<(), Error> {
    twofish(key)?.encrypt_block(GenericArray::from_mut_slice(block));
    Ok(())
}

/// Decrypt a single block in place with no chaining (ECB).
pub fn decrypt_block(key: &[u8], block: &mut [u8; BLOCK_LEN]) -> Result<(), Error> {
    twofish(key)?.decrypt_block(GenericArray::from_mut_slice(block));
    Ok(())
}

/// Twofish-CBC encryptor carrying the chain state between blocks.
///
/// No padding is applied here; every call consumes exactly one block.
pub struct CbcEncryptor {
    inner: cbc::Encryptor<Twofish>,
}

impl CbcEncryptor {
    pub fn new(key: &[u8], iv: &[u8; BLOCK_LEN]) -> Result<Self, Error> {
        let inner = cbc::Encryptor::<Twofish>::new_from_slices(key, iv)
            .map_err(|_| Error::Resource("invalid Twofish-CBC key or IV length".into()))?;
        Ok(Self { inner })
    }

    pub fn encrypt_block(&mut self, block: &mut [u8; BLOCK_LEN]) {
        self.inner
            .encrypt_block_mut(GenericArray::from_mut_slice(block));
    }
}

/// Twofish-CBC decryptor; mirror of [`CbcEncryptor`].
pub struct CbcDecryptor {
    inner: cbc::Decryptor<Twofish>,
}

impl CbcDecryptor {
    pub fn new(key: &[u8], iv: &[u8; BLOCK_LEN]) -> Result<Self, Error> {
        let inner = cbc::Decryptor::<Twofish>::new_from_slices(key, iv)
            .map_err(|_| Error::Resource("invalid Twofish-CBC key or IV length".into()))?;
        Ok(Self { inner })
    }

    pub fn decrypt_block(&mut self, block: &mut [u8; BLOCK_LEN]) {
        self.inner
            .decrypt_block_mut(GenericArray::from_mut_slice(block));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn xor(a: &[u8; BLOCK_LEN], b: &[u8; BLOCK_LEN]) -> [u8; BLOCK_LEN] {
        let mut out = [0u8; BLOCK_LEN];
        for i in 0..BLOCK_LEN {
            out[i] = a[i] ^ b[i];
        }
        out
    }

    #[test]
    fn twofish_256_known_answer() {
        let key = [0u8; 32];
        let mut block = [0u8; BLOCK_LEN];
        encrypt_block(&key, &mut block).unwrap();
        assert_eq!(
            block,
            [
                0x57, 0xff, 0x73, 0x9d, 0x4d, 0xc9, 0x2c, 0x1b, 0xd7, 0xfc, 0x01, 0x70, 0x0c,
                0xc8, 0x21, 0x6f
            ]
        );

        decrypt_block(&key, &mut block).unwrap();
        assert_eq!(block, [0u8; BLOCK_LEN]);
    }

    #[test]
    fn cbc_chains_previous_ciphertext() {
        let key = [3u8; 32];
        let iv = [9u8; BLOCK_LEN];
        let p0 = [1u8; BLOCK_LEN];
        let p1 = [2u8; BLOCK_LEN];

        let mut enc = CbcEncryptor::new(&key, &iv).unwrap();
        let mut c0 = p0;
        let mut c1 = p1;
        enc.encrypt_block(&mut c0);
        enc.encrypt_block(&mut c1);

        let mut expected0 = xor(&p0, &iv);
        encrypt_block(&key, &mut expected0).unwrap();
        let mut expected1 = xor(&p1, &c0);
        encrypt_block(&key, &mut expected1).unwrap();
        assert_eq!(c0, expected0);
        assert_eq!(c1, expected1);

        let mut dec = CbcDecryptor::new(&key, &iv).unwrap();
        dec.decrypt_block(&mut c0);
        dec.decrypt_block(&mut c1);
        assert_eq!(c0, p0);
        assert_eq!(c1, p1);
    }

    #[test]
    fn rejects_bad_key_length() {
        let mut block = [0u8; BLOCK_LEN];
        assert!(matches!(
            encrypt_block(&[0u8; 40], &mut block),
            Err(Error::Resource(_))
        ));
        assert!(CbcDecryptor::new(&[0u8; 40], &[0u8; BLOCK_LEN]).is_err());
    }
}
