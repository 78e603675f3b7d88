use super::{FieldMap, Record};
use crate::error::RecordError;
use chrono::{DateTime, Utc};
use uuid::Uuid;

pub const UUID: u8 = 0x01;
pub const GROUP: u8 = 0x02;
pub const TITLE: u8 = 0x03;
pub const USERNAME: u8 = 0x04;
pub const NOTES: u8 = 0x05;
pub const PASSWORD: u8 = 0x06;
pub const CREATION_TIME: u8 = 0x07;
pub const PASSWORD_MODIFICATION_TIME: u8 = 0x08;
pub const LAST_ACCESS_TIME: u8 = 0x09;
pub const PASSWORD_EXPIRY_TIME: u8 = 0x0a;
pub const LAST_MODIFICATION_TIME: u8 = 0x0c;
pub const URL: u8 = 0x0d;
pub const AUTOTYPE: u8 = 0x0e;
pub const PASSWORD_HISTORY: u8 = 0x0f;
pub const PASSWORD_POLICY: u8 = 0x10;
pub const PASSWORD_EXPIRY_INTERVAL: u8 = 0x11;
pub const RUN_COMMAND: u8 = 0x12;
pub const DOUBLE_CLICK_ACTION: u8 = 0x13;
pub const EMAIL: u8 = 0x14;
pub const PROTECTED_ENTRY: u8 = 0x15;
pub const OWN_SYMBOLS: u8 = 0x16;
pub const SHIFT_DOUBLE_CLICK_ACTION: u8 = 0x17;
pub const PASSWORD_POLICY_NAME: u8 = 0x18;
pub const KEYBOARD_SHORTCUT: u8 = 0x19;

/// One password entry. Addressed by its UUID field, which the codec does not
/// require to be present or unique.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntryRecord {
    fields: FieldMap,
}

impl EntryRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_fields(fields: FieldMap) -> Self {
        Self { fields }
    }

    /// New entry with a title, a password and a random v4 UUID.
    pub fn create(title: &str, password: &str) -> Result<Self, crate::error::Error> {
        let bytes = crate::crypto::random_array::<16>()?;
        let mut entry = Self::new();
        entry.set_uuid(uuid::Builder::from_random_bytes(bytes).into_uuid());
        entry.set_title(title);
        entry.set_password(password);
        Ok(entry)
    }

    pub fn fields(&self) -> &FieldMap {
        &self.fields
    }

    pub fn fields_mut(&mut self) -> &mut FieldMap {
        &mut self.fields
    }

    pub fn uuid(&self) -> Result<Option<Uuid>, RecordError> {
        self.fields.uuid(UUID)
    }

    pub fn set_uuid(&mut self, uuid: Uuid) {
        self.fields.set_uuid(UUID, uuid);
    }

    pub fn group(&self) -> Option<String> {
        self.fields.text(GROUP)
    }

    pub fn set_group(&mut self, group: &str) {
        self.fields.set_text(GROUP, group);
    }

    pub fn title(&self) -> Option<String> {
        self.fields.text(TITLE)
    }

    pub fn set_title(&mut self, title: &str) {
        self.fields.set_text(TITLE, title);
    }

    pub fn username(&self) -> Option<String> {
        self.fields.text(USERNAME)
    }

    pub fn set_username(&mut self, username: &str) {
        self.fields.set_text(USERNAME, username);
    }

    pub fn notes(&self) -> Option<String> {
        self.fields.text(NOTES)
    }

    pub fn set_notes(&mut self, notes: &str) {
        self.fields.set_text(NOTES, notes);
    }

    pub fn password(&self) -> Option<String> {
        self.fields.text(PASSWORD)
    }

    pub fn set_password(&mut self, password: &str) {
        self.fields.set_text(PASSWORD, password);
    }

    pub fn creation_time(&self) -> Result<Option<DateTime<Utc>>, RecordError> {
        self.fields.time(CREATION_TIME)
    }

    pub fn set_creation_time(&mut self, time: DateTime<Utc>) {
        self.fields.set_time(CREATION_TIME, time);
    }

    pub fn password_modification_time(&self) -> Result<Option<DateTime<Utc>>, RecordError> {
        self.fields.time(PASSWORD_MODIFICATION_TIME)
    }

    pub fn last_access_time(&self) -> Result<Option<DateTime<Utc>>, RecordError> {
        self.fields.time(LAST_ACCESS_TIME)
    }

    pub fn password_expiry_time(&self) -> Result<Option<DateTime<Utc>>, RecordError> {
        self.fields.time(PASSWORD_EXPIRY_TIME)
    }

    pub fn last_modification_time(&self) -> Result<Option<DateTime<Utc>>, RecordError> {
        self.fields.time(LAST_MODIFICATION_TIME)
    }

    pub fn set_last_modification_time(&mut self, time: DateTime<Utc>) {
        self.fields.set_time(LAST_MODIFICATION_TIME, time);
    }

    pub fn url(&self) -> Option<String> {
        self.fields.text(URL)
    }

    pub fn set_url(&mut self, url: &str) {
        self.fields.set_text(URL, url);
    }

    pub fn autotype(&self) -> Option<String> {
        self.fields.text(AUTOTYPE)
    }

    pub fn password_history(&self) -> Option<String> {
        self.fields.text(PASSWORD_HISTORY)
    }

    pub fn password_policy(&self) -> Option<String> {
        self.fields.text(PASSWORD_POLICY)
    }

    /// Days until the password expires.
    pub fn password_expiry_interval(&self) -> Result<Option<u32>, RecordError> {
        self.fields.u32(PASSWORD_EXPIRY_INTERVAL)
    }

    pub fn run_command(&self) -> Option<String> {
        self.fields.text(RUN_COMMAND)
    }

    pub fn double_click_action(&self) -> Result<Option<u16>, RecordError> {
        self.fields.u16(DOUBLE_CLICK_ACTION)
    }

    pub fn email(&self) -> Option<String> {
        self.fields.text(EMAIL)
    }

    pub fn set_email(&mut self, email: &str) {
        self.fields.set_text(EMAIL, email);
    }

    pub fn protected_entry(&self) -> Result<Option<u8>, RecordError> {
        self.fields.u8(PROTECTED_ENTRY)
    }

    pub fn own_symbols(&self) -> Option<String> {
        self.fields.text(OWN_SYMBOLS)
    }

    pub fn shift_double_click_action(&self) -> Result<Option<u16>, RecordError> {
        self.fields.u16(SHIFT_DOUBLE_CLICK_ACTION)
    }

    pub fn password_policy_name(&self) -> Option<String> {
        self.fields.text(PASSWORD_POLICY_NAME)
    }

    pub fn keyboard_shortcut(&self) -> Result<Option<u32>, RecordError> {
        self.fields.u32(KEYBOARD_SHORTCUT)
    }
}

impl Record for EntryRecord {
    fn fields_in_order(&self) -> Vec<(u8, &[u8])> {
        self.fields.iter().collect()
    }
}
