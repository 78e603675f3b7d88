//! Loading and storing Password Safe V3 databases.
//!
//! A load runs strictly in order: split the file, verify the password,
//! unwrap the keys, read header fields up to the first terminator, read
//! entries until the ciphertext is exhausted, then check the HMAC. Any
//! failure ends the load with a single error and no records.

pub mod field;
pub mod v3;

use tracing::{debug, warn};
use uuid::Uuid;
use zeroize::Zeroizing;

use crate::crypto::{
    self, BLOCK_LEN, CbcDecryptor, CbcEncryptor, IntegrityDigest, KEY_LEN, SALT_LEN,
    StretchParams, kdf,
};
use crate::error::Error;
use crate::record::{END_OF_RECORD, EntryRecord, FieldMap, HeaderRecord, Record};
use field::{FieldReader, FieldWriter, FramingError};
use v3::Preamble;

/// Decoded content of a database file.
///
/// Entries keep file order; duplicate UUIDs are preserved.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Database {
    pub header: HeaderRecord,
    pub entries: Vec<EntryRecord>,
    /// Stretch iterations declared in the file this was loaded from.
    pub iterations: u32,
}

impl Database {
    /// Empty database with a fresh header.
    pub fn new() -> Self {
        Self {
            header: HeaderRecord::create(),
            entries: Vec::new(),
            iterations: StretchParams::default().iterations(),
        }
    }

    /// First entry carrying `uuid`.
    pub fn entry(&self, uuid: &Uuid) -> Option<&EntryRecord> {
        self.entries
            .iter()
            .find(|e| matches!(e.uuid(), Ok(Some(u)) if u == *uuid))
    }
}

fn corrupt(err: FramingError) -> Error {
    warn!(%err, "field framing broken after password check");
    Error::Integrity
}

/// Decrypts and verifies a database.
///
/// # Errors
///
/// - [`Error::Format`] for a malformed envelope or an iteration count above
///   [`kdf::MAX_ITERATIONS`]
/// - [`Error::Auth`] if `password` is wrong
/// - [`Error::Integrity`] if the HMAC or the field framing does not check out
pub fn load(data: &[u8], password: &str) -> Result<Database, Error> {
    let envelope = v3::parse(data)?;
    let preamble = &envelope.preamble;
    debug!(
        iterations = preamble.iterations(),
        ciphertext_len = envelope.ciphertext.len(),
        "parsed preamble"
    );

    if preamble.iterations() > kdf::MAX_ITERATIONS {
        return Err(Error::Format(format!(
            "iteration count {} exceeds {}",
            preamble.iterations(),
            kdf::MAX_ITERATIONS
        )));
    }

    let stretched = kdf::stretch(password, preamble.salt(), preamble.iterations());
    if !kdf::verify(&stretched, preamble.verifier()) {
        return Err(Error::Auth);
    }

    let (b1, b2) = preamble.wrapped_data_key();
    let data_key = kdf::unwrap_key(&stretched, b1, b2)?;
    let (b3, b4) = preamble.wrapped_hmac_key();
    let hmac_key = kdf::unwrap_key(&stretched, b3, b4)?;
    drop(stretched);
    debug!("password verified, keys unwrapped");

    let mut digest = IntegrityDigest::new(hmac_key.as_slice())?;
    let mut reader = FieldReader::new(
        envelope.ciphertext,
        CbcDecryptor::new(data_key.as_slice(), preamble.iv())?,
    );

    let mut header = HeaderRecord::new();
    loop {
        let field = reader.read_field().map_err(corrupt)?;
        digest.update(&field.data);
        if field.field_type == END_OF_RECORD {
            break;
        }
        header.insert_field(field.field_type, field.data);
    }
    debug!(fields = header.field_count(), "header read");

    let mut entries = Vec::new();
    let mut current = FieldMap::new();
    while !reader.is_at_end() {
        let field = reader.read_field().map_err(corrupt)?;
        digest.update(&field.data);
        if field.field_type == END_OF_RECORD {
            entries.push(EntryRecord::from_fields(std::mem::take(&mut current)));
        } else {
            current.insert(field.field_type, field.data);
        }
    }

    if !digest.verify(&envelope.hmac) {
        return Err(Error::Integrity);
    }

    if !current.is_empty() {
        warn!(
            fields = current.len(),
            "dropping trailing entry without terminator"
        );
    }
    debug!(entries = entries.len(), "database loaded");

    Ok(Database {
        header,
        entries,
        iterations: preamble.iterations(),
    })
}

/// Encrypts a header and entries under `password` with fresh salt, IV and keys.
///
/// # Errors
///
/// Returns [`Error::Resource`] if the random source fails or a field is
/// larger than the 32-bit length prefix allows.
pub fn store(
    header: &HeaderRecord,
    entries: &[EntryRecord],
    password: &str,
    params: StretchParams,
) -> Result<Vec<u8>, Error> {
    let salt: [u8; SALT_LEN] = crypto::random_array()?;
    let iv: [u8; BLOCK_LEN] = crypto::random_array()?;
    let data_key = Zeroizing::new(crypto::random_array::<KEY_LEN>()?);
    let hmac_key = Zeroizing::new(crypto::random_array::<KEY_LEN>()?);

    let stretched = kdf::stretch(password, &salt, params.iterations());
    let preamble = Preamble::new(
        salt,
        params.iterations(),
        stretched.verifier(),
        kdf::wrap_key(&stretched, &data_key)?,
        kdf::wrap_key(&stretched, &hmac_key)?,
        iv,
    );
    drop(stretched);

    let mut digest = IntegrityDigest::new(hmac_key.as_slice())?;
    let mut writer = FieldWriter::new(CbcEncryptor::new(data_key.as_slice(), &iv)?);

    write_record(&mut writer, &mut digest, header)?;
    for entry in entries {
        write_record(&mut writer, &mut digest, entry)?;
    }
    debug!(
        entries = entries.len(),
        ciphertext_len = writer.len(),
        "database encrypted"
    );

    let ciphertext = writer.into_ciphertext();
    Ok(v3::serialize(&preamble, &ciphertext, &digest.finalize()))
}

// Terminator goes last, whatever the record holds.
fn write_record(
    writer: &mut FieldWriter,
    digest: &mut IntegrityDigest,
    record: &impl Record,
) -> Result<(), Error> {
    for (field_type, data) in record.fields_in_order() {
        digest.update(data);
        writer.write_field(field_type, data)?;
    }
    writer.write_field(END_OF_RECORD, &[])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{entry, header};
    use chrono::DateTime;

    fn params() -> StretchParams {
        StretchParams::default()
    }

    fn sample_entry(title: &str, group: Option<&str>) -> EntryRecord {
        let mut e = EntryRecord::create(title, &format!("{title}.password")).unwrap();
        if let Some(group) = group {
            e.set_group(group);
        }
        e.set_username(&format!("{title}.username"));
        e
    }

    #[test]
    fn roundtrip_preserves_header_and_entries() {
        let mut header = HeaderRecord::create();
        header.set_database_name("db");
        header.add_empty_group("g1");
        header.add_empty_group("g0");

        let entries = vec![
            sample_entry("a", None),
            sample_entry("b", Some("grp")),
            EntryRecord::new(),
        ];

        let bytes = store(&header, &entries, "pw", params()).unwrap();
        let db = load(&bytes, "pw").unwrap();

        assert_eq!(db.header, header);
        assert_eq!(db.header.empty_groups(), vec!["g1", "g0"]);
        assert_eq!(db.entries, entries);
    }

    #[test]
    fn minimal_header_without_entries() {
        let bytes = store(&HeaderRecord::create(), &[], "123456", params()).unwrap();
        // one version field block plus one terminator block
        assert_eq!(bytes.len(), v3::PREAMBLE_LEN + 2 * BLOCK_LEN + v3::TRAILER_LEN);

        let db = load(&bytes, "123456").unwrap();
        assert!(db.entries.is_empty());
        assert_eq!(db.header.version_name().unwrap(), Some("V3.30"));
    }

    #[test]
    fn wrong_password_is_auth_error() {
        let bytes = store(&HeaderRecord::create(), &[], "123456", params()).unwrap();
        for wrong in ["", "12345", "1234567", "invalidPassword"] {
            assert!(matches!(load(&bytes, wrong), Err(Error::Auth)));
        }
    }

    #[test]
    fn flipping_any_ciphertext_byte_is_integrity_error() {
        let entries = vec![sample_entry("title1", None), sample_entry("t2", Some("g"))];
        let bytes = store(&HeaderRecord::create(), &entries, "pw", params()).unwrap();

        for at in v3::PREAMBLE_LEN..bytes.len() - v3::TRAILER_LEN {
            let mut tampered = bytes.clone();
            tampered[at] ^= 0x40;
            assert!(
                matches!(load(&tampered, "pw"), Err(Error::Integrity)),
                "byte {at} not detected"
            );
        }
    }

    #[test]
    fn tampered_hmac_is_integrity_error() {
        let bytes = store(&HeaderRecord::create(), &[], "pw", params()).unwrap();
        let mut tampered = bytes.clone();
        let last = tampered.len() - 1;
        tampered[last] ^= 0x01;
        assert!(matches!(load(&tampered, "pw"), Err(Error::Integrity)));
    }

    #[test]
    fn truncated_buffer_is_format_error() {
        let bytes = store(&HeaderRecord::create(), &[], "pw", params()).unwrap();
        for len in [0, 4, 100, 199] {
            assert!(matches!(load(&bytes[..len], "pw"), Err(Error::Format(_))));
        }
    }

    #[test]
    fn corrupted_eof_marker_is_format_error() {
        let bytes = store(&HeaderRecord::create(), &[], "pw", params()).unwrap();
        let mut tampered = bytes.clone();
        let at = tampered.len() - v3::TRAILER_LEN;
        tampered[at] = b'X';
        assert!(matches!(load(&tampered, "pw"), Err(Error::Format(_))));
    }

    #[test]
    fn duplicate_uuids_are_kept_in_order() {
        let first = sample_entry("first", None);
        let mut second = sample_entry("second", None);
        second.set_uuid(first.uuid().unwrap().unwrap());

        let bytes = store(&HeaderRecord::create(), &[first.clone(), second], "pw", params()).unwrap();
        let db = load(&bytes, "pw").unwrap();

        assert_eq!(db.entries.len(), 2);
        let uuid = first.uuid().unwrap().unwrap();
        assert_eq!(db.entry(&uuid).and_then(|e| e.title()).as_deref(), Some("first"));
    }

    #[test]
    fn stored_iteration_count_is_used() {
        let bytes = store(
            &HeaderRecord::create(),
            &[],
            "pw",
            StretchParams::new(4096).unwrap(),
        )
        .unwrap();
        assert_eq!(v3::parse(&bytes).unwrap().preamble.iterations(), 4096);
        assert_eq!(load(&bytes, "pw").unwrap().iterations, 4096);
    }

    // Encrypts `fields` as-is, terminators included only where listed.
    fn raw_database(fields: &[(u8, &[u8])], password: &str, iterations: u32) -> Vec<u8> {
        let salt = [0x5a; SALT_LEN];
        let iv = [0x3c; BLOCK_LEN];
        let data_key = [0x11; KEY_LEN];
        let hmac_key = [0x22; KEY_LEN];

        let stretched = kdf::stretch(password, &salt, iterations);
        let preamble = Preamble::new(
            salt,
            iterations,
            stretched.verifier(),
            kdf::wrap_key(&stretched, &data_key).unwrap(),
            kdf::wrap_key(&stretched, &hmac_key).unwrap(),
            iv,
        );

        let mut digest = IntegrityDigest::new(&hmac_key).unwrap();
        let mut writer = FieldWriter::new(CbcEncryptor::new(&data_key, &iv).unwrap());
        for (field_type, data) in fields {
            digest.update(data);
            writer.write_field(*field_type, data).unwrap();
        }
        v3::serialize(&preamble, &writer.into_ciphertext(), &digest.finalize())
    }

    #[test]
    fn unterminated_trailing_entry_is_dropped() {
        let version = header::CURRENT_VERSION.to_le_bytes();
        let fields: [(u8, &[u8]); 6] = [
            (header::VERSION, &version),
            (END_OF_RECORD, b""),
            (entry::TITLE, b"kept"),
            (entry::PASSWORD, b"secret"),
            (END_OF_RECORD, b""),
            (entry::TITLE, b"dangling"),
        ];
        let bytes = raw_database(&fields, "pw", 2048);

        let db = load(&bytes, "pw").unwrap();
        assert_eq!(db.entries.len(), 1);
        assert_eq!(db.entries[0].title().as_deref(), Some("kept"));
    }

    #[test]
    fn unterminated_header_is_integrity_error() {
        let version = header::CURRENT_VERSION.to_le_bytes();
        let fields: [(u8, &[u8]); 2] = [
            (header::VERSION, &version),
            (header::TREE_DISPLAY_STATUS, b"x"),
        ];
        let bytes = raw_database(&fields, "pw", 2048);

        assert!(matches!(load(&bytes, "pw"), Err(Error::Integrity)));
    }

    #[test]
    fn excessive_iteration_count_fails_before_stretching() {
        let mut bytes = store(&HeaderRecord::create(), &[], "pw", params()).unwrap();
        bytes[36..40].copy_from_slice(&u32::MAX.to_le_bytes());

        let err = load(&bytes, "pw").unwrap_err();
        assert!(matches!(err, Error::Format(msg) if msg.contains("iteration count")));
    }

    #[test]
    fn digest_covers_field_data_in_file_order() {
        // Rebuild the HMAC by hand from the decrypted fields.
        let mut header = HeaderRecord::create();
        header.add_empty_group("grp");
        let entries = vec![sample_entry("x", None)];
        let bytes = store(&header, &entries, "pw", params()).unwrap();

        let envelope = v3::parse(&bytes).unwrap();
        let stretched = kdf::stretch(
            "pw",
            envelope.preamble.salt(),
            envelope.preamble.iterations(),
        );
        let (b1, b2) = envelope.preamble.wrapped_data_key();
        let (b3, b4) = envelope.preamble.wrapped_hmac_key();
        let data_key = kdf::unwrap_key(&stretched, b1, b2).unwrap();
        let hmac_key = kdf::unwrap_key(&stretched, b3, b4).unwrap();

        let mut reader = FieldReader::new(
            envelope.ciphertext,
            CbcDecryptor::new(data_key.as_slice(), envelope.preamble.iv()).unwrap(),
        );
        let mut digest = IntegrityDigest::new(hmac_key.as_slice()).unwrap();
        let mut types = Vec::new();
        while !reader.is_at_end() {
            let field = reader.read_field().unwrap();
            digest.update(&field.data);
            types.push(field.field_type);
        }

        assert_eq!(
            types,
            vec![
                header::VERSION,
                header::EMPTY_GROUP,
                END_OF_RECORD,
                entry::UUID,
                entry::TITLE,
                entry::USERNAME,
                entry::PASSWORD,
                END_OF_RECORD
            ]
        );
        assert_eq!(digest.finalize(), envelope.hmac);
    }

    #[test]
    fn reference_database_contents() {
        // Mirrors the sample database shipped with the reference reader.
        let time = |s: i64| DateTime::from_timestamp(s, 0).unwrap();

        let mut header = HeaderRecord::create();
        header.set_uuid(Uuid::parse_str("aedb9da0-2cc7-478a-b14d-1d226cdaec19").unwrap());
        header.insert_field(header::NON_DEFAULT_PREFERENCES, b"I 11 2".to_vec());
        header.set_last_save_time(time(1_399_333_802));
        header.set_last_save_app("pwsafe V0.9");
        header.set_last_save_user("do");
        header.set_last_save_host("mute");
        header.add_empty_group("group.subgro");

        let make = |prefix: &str, n: u32, group: Option<&str>, created: i64| {
            let mut e = EntryRecord::create(
                &format!("{prefix}title{n}"),
                &format!("{prefix}password{n}"),
            )
            .unwrap();
            e.set_username(&format!("{prefix}username{n}"));
            e.set_notes(&format!("{prefix}notes{n}"));
            e.set_url(&format!("{prefix}url{n}"));
            e.set_email(&format!("{prefix}email{n}"));
            e.set_creation_time(time(created));
            if let Some(g) = group {
                e.set_group(g);
            }
            e
        };
        let entries = vec![
            make("", 2, None, 1_399_330_989),
            make("group.", 1, Some("group"), 1_399_331_072),
            make("", 1, None, 1_399_330_345),
        ];

        let bytes = store(&header, &entries, "123456", params()).unwrap();
        assert!(matches!(load(&bytes, "invalidPassword"), Err(Error::Auth)));
        let db = load(&bytes, "123456").unwrap();

        assert_eq!(db.entries.len(), 3);
        let record1 = &db.entries[2];
        assert_eq!(record1.group(), None);
        assert_eq!(record1.title().as_deref(), Some("title1"));
        assert_eq!(record1.username().as_deref(), Some("username1"));
        assert_eq!(record1.password().as_deref(), Some("password1"));
        assert_eq!(record1.notes().as_deref(), Some("notes1"));
        assert_eq!(record1.url().as_deref(), Some("url1"));
        assert_eq!(record1.email().as_deref(), Some("email1"));
        assert_eq!(record1.creation_time().unwrap(), Some(time(1_399_330_345)));

        let record2 = &db.entries[0];
        assert_eq!(record2.group(), None);
        assert_eq!(record2.title().as_deref(), Some("title2"));
        assert_eq!(record2.email().as_deref(), Some("email2"));

        let record3 = &db.entries[1];
        assert_eq!(record3.group().as_deref(), Some("group"));
        assert_eq!(record3.title().as_deref(), Some("group.title1"));
        assert_eq!(record3.username().as_deref(), Some("group.username1"));
        assert_eq!(record3.password().as_deref(), Some("group.password1"));
        assert_eq!(record3.url().as_deref(), Some("group.url1"));
        assert_eq!(record3.email().as_deref(), Some("group.email1"));
        assert_eq!(record3.notes().as_deref(), Some("group.notes1"));

        let h = &db.header;
        assert_eq!(h.version_name().unwrap(), Some("V3.30"));
        assert_eq!(
            h.uuid().unwrap().map(|u| u.to_string()).as_deref(),
            Some("aedb9da0-2cc7-478a-b14d-1d226cdaec19")
        );
        assert_eq!(h.non_default_preferences().as_deref(), Some("I 11 2"));
        assert_eq!(h.last_save_time().unwrap(), Some(time(1_399_333_802)));
        assert_eq!(h.last_save_app().as_deref(), Some("pwsafe V0.9"));
        assert_eq!(h.last_save_user().as_deref(), Some("do"));
        assert_eq!(h.last_save_host().as_deref(), Some("mute"));
        assert_eq!(h.empty_groups(), vec!["group.subgro"]);
    }
}
