//! Header and entry records: typed views over a field-type to bytes map.
//!
//! The codec only moves raw bytes per field type; interpretation lives here.

pub mod entry;
pub mod header;

pub use entry::EntryRecord;
pub use header::HeaderRecord;

use crate::error::RecordError;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use uuid::Uuid;
use zeroize::Zeroizing;

/// Field type closing a record. Carries no data.
pub const END_OF_RECORD: u8 = 0xff;

/// Raw record fields keyed by field type, iterated in ascending type order.
///
/// Inserting an existing type replaces it. The terminator is never stored.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldMap {
    fields: BTreeMap<u8, Zeroizing<Vec<u8>>>,
}

impl FieldMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, field_type: u8) -> Option<&[u8]> {
        self.fields.get(&field_type).map(|data| data.as_slice())
    }

    pub fn insert(&mut self, field_type: u8, data: Vec<u8>) {
        if field_type == END_OF_RECORD {
            return;
        }
        self.fields.insert(field_type, Zeroizing::new(data));
    }

    pub fn remove(&mut self, field_type: u8) -> bool {
        self.fields.remove(&field_type).is_some()
    }

    pub fn contains(&self, field_type: u8) -> bool {
        self.fields.contains_key(&field_type)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (u8, &[u8])> {
        self.fields.iter().map(|(t, data)| (*t, data.as_slice()))
    }

    /// UTF-8 text; invalid sequences are replaced rather than rejected.
    pub fn text(&self, field_type: u8) -> Option<String> {
        self.get(field_type)
            .map(|data| String::from_utf8_lossy(data).into_owned())
    }

    pub fn set_text(&mut self, field_type: u8, text: &str) {
        self.insert(field_type, text.as_bytes().to_vec());
    }

    /// `time_t` stored as 32-bit little-endian seconds since the epoch.
    pub fn time(&self, field_type: u8) -> Result<Option<DateTime<Utc>>, RecordError> {
        let Some(secs) = self.u32(field_type)? else {
            return Ok(None);
        };
        Ok(DateTime::from_timestamp(i64::from(secs), 0))
    }

    /// Times outside the 32-bit range are clamped to it.
    pub fn set_time(&mut self, field_type: u8, time: DateTime<Utc>) {
        let secs = time.timestamp().clamp(0, i64::from(u32::MAX)) as u32;
        self.set_u32(field_type, secs);
    }

    pub fn uuid(&self, field_type: u8) -> Result<Option<Uuid>, RecordError> {
        Ok(self
            .prefix::<16>(field_type)?
            .map(Uuid::from_bytes))
    }

    pub fn set_uuid(&mut self, field_type: u8, uuid: Uuid) {
        self.insert(field_type, uuid.as_bytes().to_vec());
    }

    pub fn u8(&self, field_type: u8) -> Result<Option<u8>, RecordError> {
        Ok(self.prefix::<1>(field_type)?.map(|b| b[0]))
    }

    pub fn set_u8(&mut self, field_type: u8, value: u8) {
        self.insert(field_type, vec![value]);
    }

    pub fn u16(&self, field_type: u8) -> Result<Option<u16>, RecordError> {
        Ok(self.prefix::<2>(field_type)?.map(u16::from_le_bytes))
    }

    pub fn set_u16(&mut self, field_type: u8, value: u16) {
        self.insert(field_type, value.to_le_bytes().to_vec());
    }

    pub fn u32(&self, field_type: u8) -> Result<Option<u32>, RecordError> {
        Ok(self.prefix::<4>(field_type)?.map(u32::from_le_bytes))
    }

    pub fn set_u32(&mut self, field_type: u8, value: u32) {
        self.insert(field_type, value.to_le_bytes().to_vec());
    }

    // Reads the first N bytes; longer payloads are tolerated like the reference reader does.
    fn prefix<const N: usize>(&self, field_type: u8) -> Result<Option<[u8; N]>, RecordError> {
        let Some(data) = self.get(field_type) else {
            return Ok(None);
        };
        let bytes = data
            .get(..N)
            .and_then(|b| <[u8; N]>::try_from(b).ok())
            .ok_or(RecordError::InvalidFieldLength {
                field_type,
                expected: N,
                actual: data.len(),
            })?;
        Ok(Some(bytes))
    }
}

/// A record the codec can frame: its fields in write order, terminator excluded.
pub trait Record {
    fn fields_in_order(&self) -> Vec<(u8, &[u8])>;
}
