use super::{END_OF_RECORD, FieldMap, Record};
use crate::error::RecordError;
use chrono::{DateTime, Utc};
use uuid::Uuid;
use zeroize::Zeroizing;

pub const VERSION: u8 = 0x00;
pub const UUID: u8 = 0x01;
pub const NON_DEFAULT_PREFERENCES: u8 = 0x02;
pub const TREE_DISPLAY_STATUS: u8 = 0x03;
pub const LAST_SAVE_TIME: u8 = 0x04;
pub const LAST_SAVE_USER_OLD: u8 = 0x05;
pub const LAST_SAVE_APP: u8 = 0x06;
pub const LAST_SAVE_USER: u8 = 0x07;
pub const LAST_SAVE_HOST: u8 = 0x08;
pub const DATABASE_NAME: u8 = 0x09;
pub const DATABASE_DESCRIPTION: u8 = 0x0a;
pub const DATABASE_FILTERS: u8 = 0x0b;
pub const RECENTLY_USED_ENTRIES: u8 = 0x0f;
pub const PASSWORD_POLICIES: u8 = 0x10;
/// The one repeatable header field: each occurrence names one empty group.
pub const EMPTY_GROUP: u8 = 0x11;
pub const YUBICO: u8 = 0x12;

/// Format version written into new databases (V3.30).
pub const CURRENT_VERSION: u16 = 0x030d;

/// Known format versions and the application release that introduced them.
pub static VERSION_NAMES: [(u16, &str); 14] = [
    (0x0300, "V3.01"),
    (0x0301, "V3.03"),
    (0x0302, "V3.09"),
    (0x0303, "V3.12"),
    (0x0304, "V3.13"),
    (0x0305, "V3.14"),
    (0x0306, "V3.19"),
    (0x0307, "V3.22"),
    (0x0308, "V3.25"),
    (0x0309, "V3.26"),
    (0x030a, "V3.28"),
    (0x030b, "V3.29"),
    (0x030c, "V3.29Y"),
    (0x030d, "V3.30"),
];

pub fn version_name(version: u16) -> Option<&'static str> {
    VERSION_NAMES
        .iter()
        .find(|(v, _)| *v == version)
        .map(|(_, name)| *name)
}

/// The single header record of a database.
///
/// Every field type follows last-write-wins except [`EMPTY_GROUP`], which is
/// kept as an ordered list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderRecord {
    fields: FieldMap,
    empty_groups: Vec<Zeroizing<Vec<u8>>>,
}

impl HeaderRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fresh header carrying only the current format version.
    pub fn create() -> Self {
        let mut header = Self::new();
        header.set_version(CURRENT_VERSION);
        header
    }

    pub fn fields(&self) -> &FieldMap {
        &self.fields
    }

    /// Store a decoded field. [`EMPTY_GROUP`] appends; the terminator is dropped.
    pub fn insert_field(&mut self, field_type: u8, data: Vec<u8>) {
        match field_type {
            EMPTY_GROUP => self.empty_groups.push(Zeroizing::new(data)),
            END_OF_RECORD => {}
            _ => self.fields.insert(field_type, data),
        }
    }

    /// Number of stored fields, counting each empty group.
    pub fn field_count(&self) -> usize {
        self.fields.len() + self.empty_groups.len()
    }

    pub fn version(&self) -> Result<Option<u16>, RecordError> {
        self.fields.u16(VERSION)
    }

    pub fn set_version(&mut self, version: u16) {
        self.fields.set_u16(VERSION, version);
    }

    pub fn version_name(&self) -> Result<Option<&'static str>, RecordError> {
        Ok(self.version()?.and_then(version_name))
    }

    pub fn uuid(&self) -> Result<Option<Uuid>, RecordError> {
        self.fields.uuid(UUID)
    }

    pub fn set_uuid(&mut self, uuid: Uuid) {
        self.fields.set_uuid(UUID, uuid);
    }

    pub fn non_default_preferences(&self) -> Option<String> {
        self.fields.text(NON_DEFAULT_PREFERENCES)
    }

    pub fn tree_display_status(&self) -> Option<String> {
        self.fields.text(TREE_DISPLAY_STATUS)
    }

    pub fn last_save_time(&self) -> Result<Option<DateTime<Utc>>, RecordError> {
        self.fields.time(LAST_SAVE_TIME)
    }

    pub fn set_last_save_time(&mut self, time: DateTime<Utc>) {
        self.fields.set_time(LAST_SAVE_TIME, time);
    }

    /// Deprecated combined user/host field written by old versions.
    pub fn last_save_user_old(&self) -> Option<String> {
        self.fields.text(LAST_SAVE_USER_OLD)
    }

    pub fn last_save_app(&self) -> Option<String> {
        self.fields.text(LAST_SAVE_APP)
    }

    pub fn set_last_save_app(&mut self, app: &str) {
        self.fields.set_text(LAST_SAVE_APP, app);
    }

    pub fn last_save_user(&self) -> Option<String> {
        self.fields.text(LAST_SAVE_USER)
    }

    pub fn set_last_save_user(&mut self, user: &str) {
        self.fields.set_text(LAST_SAVE_USER, user);
    }

    pub fn last_save_host(&self) -> Option<String> {
        self.fields.text(LAST_SAVE_HOST)
    }

    pub fn set_last_save_host(&mut self, host: &str) {
        self.fields.set_text(LAST_SAVE_HOST, host);
    }

    pub fn database_name(&self) -> Option<String> {
        self.fields.text(DATABASE_NAME)
    }

    pub fn set_database_name(&mut self, name: &str) {
        self.fields.set_text(DATABASE_NAME, name);
    }

    pub fn database_description(&self) -> Option<String> {
        self.fields.text(DATABASE_DESCRIPTION)
    }

    pub fn database_filters(&self) -> Option<String> {
        self.fields.text(DATABASE_FILTERS)
    }

    pub fn recently_used_entries(&self) -> Option<String> {
        self.fields.text(RECENTLY_USED_ENTRIES)
    }

    pub fn password_policies(&self) -> Option<String> {
        self.fields.text(PASSWORD_POLICIES)
    }

    pub fn yubico(&self) -> Option<String> {
        self.fields.text(YUBICO)
    }

    pub fn empty_groups(&self) -> Vec<String> {
        self.empty_groups
            .iter()
            .map(|g| String::from_utf8_lossy(g).into_owned())
            .collect()
    }

    pub fn add_empty_group(&mut self, group: &str) {
        self.empty_groups
            .push(Zeroizing::new(group.as_bytes().to_vec()));
    }
}

impl Record for HeaderRecord {
    // Ascending type order, with every empty group emitted at the 0x11 slot.
    fn fields_in_order(&self) -> Vec<(u8, &[u8])> {
        let (before, after): (Vec<_>, Vec<_>) =
            self.fields.iter().partition(|(t, _)| *t < EMPTY_GROUP);

        before
            .into_iter()
            .chain(
                self.empty_groups
                    .iter()
                    .map(|g| (EMPTY_GROUP, g.as_slice())),
            )
            .chain(after)
            .collect()
    }
}
