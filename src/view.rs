//! Plain, serializable snapshots of records for display and export.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::RecordError;
use crate::record::{EntryRecord, HeaderRecord};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EntryView {
    pub uuid: Option<String>,
    pub group: Option<String>,
    pub title: Option<String>,
    pub username: Option<String>,
    pub notes: Option<String>,
    pub password: Option<String>,
    pub creation_time: Option<String>,
    pub password_modification_time: Option<String>,
    pub last_access_time: Option<String>,
    pub password_expiry_time: Option<String>,
    pub last_modification_time: Option<String>,
    pub url: Option<String>,
    pub autotype: Option<String>,
    pub password_history: Option<String>,
    pub password_policy: Option<String>,
    pub password_expiry_interval: Option<u32>,
    pub command: Option<String>,
    pub double_click_action: Option<u16>,
    pub email_address: Option<String>,
    pub protected_entry: Option<u8>,
    pub own_symbols_for_password: Option<String>,
    pub shift_double_click_action: Option<u16>,
    pub password_policy_name: Option<String>,
    pub entry_keyboard_shortcut: Option<u32>,
}

fn rfc3339(time: Option<DateTime<Utc>>) -> Option<String> {
    time.map(|t| t.to_rfc3339())
}

impl TryFrom<&EntryRecord> for EntryView {
    type Error = RecordError;

    fn try_from(e: &EntryRecord) -> Result<Self, Self::Error> {
        Ok(Self {
            uuid: e.uuid()?.map(|u| u.to_string()),
            group: e.group(),
            title: e.title(),
            username: e.username(),
            notes: e.notes(),
            password: e.password(),
            creation_time: rfc3339(e.creation_time()?),
            password_modification_time: rfc3339(e.password_modification_time()?),
            last_access_time: rfc3339(e.last_access_time()?),
            password_expiry_time: rfc3339(e.password_expiry_time()?),
            last_modification_time: rfc3339(e.last_modification_time()?),
            url: e.url(),
            autotype: e.autotype(),
            password_history: e.password_history(),
            password_policy: e.password_policy(),
            password_expiry_interval: e.password_expiry_interval()?,
            command: e.run_command(),
            double_click_action: e.double_click_action()?,
            email_address: e.email(),
            protected_entry: e.protected_entry()?,
            own_symbols_for_password: e.own_symbols(),
            shift_double_click_action: e.shift_double_click_action()?,
            password_policy_name: e.password_policy_name(),
            entry_keyboard_shortcut: e.keyboard_shortcut()?,
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HeaderView {
    pub version: Option<String>,
    pub uuid: Option<String>,
    pub database_name: Option<String>,
    pub database_description: Option<String>,
    pub last_save_time: Option<String>,
    pub last_save_app: Option<String>,
    pub last_save_user: Option<String>,
    pub last_save_host: Option<String>,
    pub empty_groups: Vec<String>,
}

impl TryFrom<&HeaderRecord> for HeaderView {
    type Error = RecordError;

    fn try_from(h: &HeaderRecord) -> Result<Self, Self::Error> {
        let version = match (h.version()?, h.version_name()?) {
            (_, Some(name)) => Some(name.to_string()),
            (Some(raw), None) => Some(format!("0x{raw:04x}")),
            (None, None) => None,
        };
        Ok(Self {
            version,
            uuid: h.uuid()?.map(|u| u.to_string()),
            database_name: h.database_name(),
            database_description: h.database_description(),
            last_save_time: rfc3339(h.last_save_time()?),
            last_save_app: h.last_save_app(),
            last_save_user: h.last_save_user(),
            last_save_host: h.last_save_host(),
            empty_groups: h.empty_groups(),
        })
    }
}
