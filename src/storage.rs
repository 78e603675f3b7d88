//! Database file persistence. The codec itself never touches the filesystem.

use anyhow::{Context, Result};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Location of a `.psafe3` file on disk.
#[derive(Debug, Clone)]
pub struct Storage {
    path: PathBuf,
}

/// Temporary sibling file, removed on drop unless persisted.
struct PendingWrite {
    path: PathBuf,
    persisted: bool,
}

impl Drop for PendingWrite {
    fn drop(&mut self) {
        if !self.persisted {
            let _ = fs::remove_file(&self.path);
        }
    }
}

impl Storage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    pub fn load(&self) -> Result<Vec<u8>> {
        fs::read(&self.path)
            .with_context(|| format!("failed to read database {}", self.path.display()))
    }

    /// Replace the file contents so that a crash leaves either the old or
    /// the new database, never a torn one.
    ///
    /// Missing parent directories are created.
    pub fn save(&self, data: &[u8]) -> Result<()> {
        let parent = self
            .path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;

        let mut pending = PendingWrite {
            path: self.sibling_tmp_path()?,
            persisted: false,
        };

        let mut file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&pending.path)
            .context("failed to create temporary file")?;
        file.write_all(data)?;
        file.sync_all()?;
        drop(file);

        replace(&pending.path, &self.path).context("failed to replace database file")?;
        pending.persisted = true;

        #[cfg(unix)]
        fs::File::open(parent)?.sync_all()?;
        Ok(())
    }

    // `<name>.tmp.<16 hex digits>` in the same directory, so the rename stays on one filesystem.
    fn sibling_tmp_path(&self) -> Result<PathBuf> {
        let suffix: [u8; 8] = crate::crypto::random_array()?;
        let hex: String = suffix.iter().map(|b| format!("{b:02x}")).collect();

        let name = self
            .path
            .file_name()
            .context("database path has no file name")?
            .to_string_lossy();
        Ok(self.path.with_file_name(format!("{name}.tmp.{hex}")))
    }
}

#[cfg(target_os = "windows")]
fn replace(from: &Path, to: &Path) -> Result<()> {
    use std::os::windows::ffi::OsStrExt;
    use windows_sys::Win32::Storage::FileSystem::{
        MOVEFILE_REPLACE_EXISTING, MOVEFILE_WRITE_THROUGH, MoveFileExW,
    };

    let wide = |p: &Path| -> Vec<u16> {
        p.as_os_str().encode_wide().chain(std::iter::once(0)).collect()
    };
    let from_w = wide(from);
    let to_w = wide(to);

    // SAFETY: both buffers are NUL-terminated UTF-16 and outlive the call.
    let ok = unsafe {
        MoveFileExW(
            from_w.as_ptr(),
            to_w.as_ptr(),
            MOVEFILE_REPLACE_EXISTING | MOVEFILE_WRITE_THROUGH,
        )
    };
    if ok == 0 {
        return Err(std::io::Error::last_os_error().into());
    }
    Ok(())
}

#[cfg(not(target_os = "windows"))]
fn replace(from: &Path, to: &Path) -> Result<()> {
    fs::rename(from, to)?;
    Ok(())
}
