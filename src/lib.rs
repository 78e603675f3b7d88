pub mod crypto;
mod error;
pub mod format;
pub mod record;
mod storage;
pub mod view;

pub use crate::crypto::StretchParams;
pub use crate::error::{Error, RecordError};
pub use crate::format::{Database, load, store};
pub use crate::record::{EntryRecord, FieldMap, HeaderRecord};
pub use crate::storage::Storage;
pub use crate::view::{EntryView, HeaderView};

use anyhow::{Result, bail};
use chrono::Utc;
use tracing::debug;
use uuid::{Builder, Uuid};
use zeroize::Zeroizing;

/// Name written into the header's "last save application" field.
const SAVING_APP: &str = concat!("pwsafe3 V", env!("CARGO_PKG_VERSION"));

/// An opened database bound to its file and master password.
///
/// Changes stay in memory until [`Safe::save`] re-encrypts the whole file.
pub struct Safe {
    database: Database,
    storage: Storage,
    password: Zeroizing<String>,
    params: StretchParams,
}

impl Safe {
    pub fn init_with_storage(
        password: Zeroizing<String>,
        storage: Storage,
        params: StretchParams,
    ) -> Result<Self> {
        if storage.exists() {
            bail!("database already exists");
        }
        params.validate()?;

        let safe = Self {
            database: Database::new(),
            storage,
            password,
            params,
        };
        safe.save()?;
        Ok(safe)
    }

    pub fn open_with_storage(password: Zeroizing<String>, storage: Storage) -> Result<Self> {
        if !storage.exists() {
            bail!("database does not exist");
        }

        let data = storage.load()?;
        let database = format::load(&data, &password)?;

        // Files written with a weaker count are upgraded on the next save.
        let params = StretchParams::new(database.iterations).unwrap_or_default();
        debug!(
            entries = database.entries.len(),
            iterations = database.iterations,
            "database opened"
        );

        Ok(Self {
            database,
            storage,
            password,
            params,
        })
    }

    pub fn database(&self) -> &Database {
        &self.database
    }

    pub fn header(&self) -> &HeaderRecord {
        &self.database.header
    }

    pub fn header_mut(&mut self) -> &mut HeaderRecord {
        &mut self.database.header
    }

    pub fn entries(&self) -> &[EntryRecord] {
        &self.database.entries
    }

    pub fn params(&self) -> StretchParams {
        self.params
    }

    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    pub fn find_by_title(&self, title: &str) -> Option<&EntryRecord> {
        self.database
            .entries
            .iter()
            .find(|e| e.title().as_deref() == Some(title))
    }

    /// Appends an entry, giving it a UUID and creation time when missing.
    pub fn add(&mut self, mut entry: EntryRecord) -> Result<Uuid> {
        let uuid = match entry.uuid()? {
            Some(uuid) => uuid,
            None => {
                let uuid = Builder::from_random_bytes(crypto::random_array()?).into_uuid();
                entry.set_uuid(uuid);
                uuid
            }
        };
        if self.database.entry(&uuid).is_some() {
            return Err(RecordError::EntryAlreadyExists(uuid.to_string()).into());
        }

        let now = Utc::now();
        if entry.creation_time()?.is_none() {
            entry.set_creation_time(now);
        }
        entry.set_last_modification_time(now);

        self.database.entries.push(entry);
        Ok(uuid)
    }

    /// Removes the first entry carrying `uuid`.
    pub fn remove(&mut self, uuid: &Uuid) -> Result<EntryRecord> {
        let position = self
            .database
            .entries
            .iter()
            .position(|e| matches!(e.uuid(), Ok(Some(u)) if u == *uuid))
            .ok_or_else(|| RecordError::EntryNotFound(uuid.to_string()))?;
        Ok(self.database.entries.remove(position))
    }

    /// Takes effect on the next [`Safe::save`].
    pub fn change_password(&mut self, password: Zeroizing<String>) {
        self.password = password;
    }

    pub fn save(&self) -> Result<()> {
        let mut header = self.database.header.clone();
        header.set_last_save_time(Utc::now());
        header.set_last_save_app(SAVING_APP);
        if let Some(user) = std::env::var("USER")
            .ok()
            .or_else(|| std::env::var("USERNAME").ok())
        {
            header.set_last_save_user(&user);
        }

        let bytes = format::store(
            &header,
            &self.database.entries,
            &self.password,
            self.params,
        )?;
        self.storage.save(&bytes)?;
        debug!(bytes = bytes.len(), "database saved");
        Ok(())
    }
}

impl std::fmt::Debug for Safe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Safe")
            .field("storage", &self.storage)
            .field("entries", &self.database.entries.len())
            .field("iterations", &self.params.iterations())
            .finish_non_exhaustive()
    }
}
