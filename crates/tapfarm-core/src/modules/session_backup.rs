//! Session file backups and invalid-session housekeeping.
//!
//! ```text
//! sessions/
//! ├── acct1.session
//! ├── telethon/acct2.session
//! ├── backups/
//! │   ├── acct1.session.backup
//! │   └── telethon/acct2.session.backup
//! └── error/            # credentials that failed authentication
//! ```

use std::io;
use std::path::{Path, PathBuf};

use super::accounts::{SESSION_EXTENSION, SESSION_SUBDIRS};
use crate::error::AppResult;

const BACKUP_DIR: &str = "backups";
const ERROR_DIR: &str = "error";
const BACKUP_SUFFIX: &str = "session.backup";

/// Backs up, restores and quarantines session files under one root.
#[derive(Debug, Clone)]
pub struct SessionBackupManager {
    sessions_dir: PathBuf,
    backup_dir: PathBuf,
}

impl SessionBackupManager {
    pub fn new(sessions_dir: impl Into<PathBuf>) -> Self {
        let sessions_dir = sessions_dir.into();
        let backup_dir = sessions_dir.join(BACKUP_DIR);
        Self { sessions_dir, backup_dir }
    }

    pub fn backup_dir(&self) -> &Path {
        &self.backup_dir
    }

    pub fn error_dir(&self) -> PathBuf {
        self.sessions_dir.join(ERROR_DIR)
    }

    /// Candidate locations relative to a base dir: root first, then subdirs.
    fn candidates<'a>(base: &'a Path, file_name: &str) -> impl Iterator<Item = PathBuf> + 'a {
        let file_name = file_name.to_string();
        std::iter::once(base.join(&file_name))
            .chain(SESSION_SUBDIRS.iter().map(move |sub| base.join(sub).join(&file_name)))
    }

    /// Locate the live session file for `name`.
    pub fn session_file(&self, name: &str) -> Option<PathBuf> {
        Self::candidates(&self.sessions_dir, &format!("{name}.{SESSION_EXTENSION}"))
            .find(|p| p.is_file())
    }

    fn backup_file(&self, name: &str) -> Option<PathBuf> {
        Self::candidates(&self.backup_dir, &format!("{name}.{BACKUP_SUFFIX}")).find(|p| p.is_file())
    }

    pub fn backup_exists(&self, name: &str) -> bool {
        self.backup_file(name).is_some()
    }

    /// Copy the session file to `backups/`, keeping its subdirectory.
    pub fn create_backup(&self, name: &str) -> AppResult<PathBuf> {
        let source = self.session_file(name).ok_or_else(|| not_found("session file", name))?;
        let relative = source
            .parent()
            .and_then(|dir| dir.strip_prefix(&self.sessions_dir).ok())
            .map(Path::to_path_buf)
            .unwrap_or_default();

        let target_dir = self.backup_dir.join(relative);
        std::fs::create_dir_all(&target_dir)?;
        let target = target_dir.join(format!("{name}.{BACKUP_SUFFIX}"));
        std::fs::copy(&source, &target)?;

        tracing::debug!(account = %name, backup = %target.display(), "Session backup created");
        Ok(target)
    }

    /// Copy the backup over the live session file.
    pub fn restore_from_backup(&self, name: &str) -> AppResult<PathBuf> {
        let backup = self.backup_file(name).ok_or_else(|| not_found("backup", name))?;
        let relative = backup
            .parent()
            .and_then(|dir| dir.strip_prefix(&self.backup_dir).ok())
            .map(Path::to_path_buf)
            .unwrap_or_default();

        let target_dir = self.sessions_dir.join(relative);
        std::fs::create_dir_all(&target_dir)?;
        let target = target_dir.join(format!("{name}.{SESSION_EXTENSION}"));
        std::fs::copy(&backup, &target)?;

        tracing::info!(account = %name, path = %target.display(), "Session restored from backup");
        Ok(target)
    }

    /// Back up every session file. Failures are logged and skipped.
    pub fn create_all_backups(&self) -> AppResult<usize> {
        let mut count = 0;
        for dir in super::accounts::session_dirs(&self.sessions_dir) {
            if !dir.is_dir() {
                continue;
            }
            for entry in std::fs::read_dir(&dir)?.filter_map(Result::ok) {
                let path = entry.path();
                if path.extension().and_then(|e| e.to_str()) != Some(SESSION_EXTENSION) {
                    continue;
                }
                let Some(name) = path.file_stem().and_then(|s| s.to_str()) else {
                    continue;
                };
                match self.create_backup(name) {
                    Ok(_) => count += 1,
                    Err(e) => tracing::error!(account = %name, "Backup failed: {}", e),
                }
            }
        }
        tracing::info!(count, dir = %self.backup_dir.display(), "Session backups created");
        Ok(count)
    }

    /// Move the live session file into `error/`.
    pub fn move_to_error(&self, name: &str) -> AppResult<PathBuf> {
        let source = self.session_file(name).ok_or_else(|| not_found("session file", name))?;
        let error_dir = self.error_dir();
        std::fs::create_dir_all(&error_dir)?;
        let target = error_dir.join(format!("{name}.{SESSION_EXTENSION}"));
        std::fs::rename(&source, &target)?;

        tracing::warn!(account = %name, path = %target.display(), "Invalid session moved to error dir");
        Ok(target)
    }
}

fn not_found(what: &str, name: &str) -> io::Error {
    io::Error::new(io::ErrorKind::NotFound, format!("{what} for {name} not found"))
}
