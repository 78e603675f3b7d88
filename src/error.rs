use thiserror::Error;

/// Failure of a database load or store.
///
/// The variants are disjoint so callers can tell a bad file apart from a bad
/// password or a tampered one. A failed load never yields partial records.
#[derive(Debug, Error)]
pub enum Error {
    /// The envelope is malformed: bad tag or EOF marker, or truncated input.
    #[error("invalid database format: {0}")]
    Format(String),

    /// The password does not match the verifier stored in the file.
    #[error("wrong password provided")]
    Auth,

    /// The decrypted content does not match the stored HMAC.
    #[error("database integrity check failed (HMAC mismatch)")]
    Integrity,

    /// The random source or a cipher primitive could not be used.
    #[error("resource unavailable: {0}")]
    Resource(String),
}

#[derive(Debug, Error)]
pub enum RecordError {
    #[error("entry '{0}' not found")]
    EntryNotFound(String),

    #[error("entry '{0}' already exists")]
    EntryAlreadyExists(String),

    #[error("field 0x{field_type:02x} holds {actual} bytes, expected {expected}")]
    InvalidFieldLength {
        field_type: u8,
        expected: usize,
        actual: usize,
    },
}
