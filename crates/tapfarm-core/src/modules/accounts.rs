//! Account loading from a directory of session files.
//!
//! Layout (only `*.session` files are picked up):
//!
//! ```text
//! sessions/
//! ├── acct1.session
//! ├── telethon/acct2.session
//! └── pyrogram/acct3.session
//! ```

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tapfarm_types::{Account, ConfigError};

use crate::error::AppResult;

/// File extension of credential files.
pub const SESSION_EXTENSION: &str = "session";

/// Subdirectories scanned after the root, in order.
pub const SESSION_SUBDIRS: [&str; 2] = ["telethon", "pyrogram"];

/// Supplies the configured accounts.
pub trait AccountSource: Send + Sync {
    fn load_accounts(&self) -> AppResult<Vec<Account>>;
}

/// Directories scanned for session files: the root, then each subdirectory.
pub fn session_dirs(root: &Path) -> Vec<PathBuf> {
    std::iter::once(root.to_path_buf())
        .chain(SESSION_SUBDIRS.iter().map(|sub| root.join(sub)))
        .collect()
}

/// Accounts backed by `*.session` files.
#[derive(Debug, Clone)]
pub struct SessionDirSource {
    root: PathBuf,
    blacklist: HashSet<String>,
    reference_id: Option<String>,
}

impl SessionDirSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into(), blacklist: HashSet::new(), reference_id: None }
    }

    #[must_use]
    pub fn with_blacklist(mut self, blacklist: HashSet<String>) -> Self {
        self.blacklist = blacklist;
        self
    }

    #[must_use]
    pub fn with_reference_id(mut self, reference_id: impl Into<String>) -> Self {
        self.reference_id = Some(reference_id.into());
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl AccountSource for SessionDirSource {
    /// Accounts sorted by id; a stem seen twice keeps the first file found.
    fn load_accounts(&self) -> AppResult<Vec<Account>> {
        if !self.root.is_dir() {
            return Err(ConfigError::NotFound { path: self.root.display().to_string() }.into());
        }

        let mut seen = HashSet::new();
        let mut accounts = Vec::new();

        for dir in session_dirs(&self.root) {
            if !dir.is_dir() {
                continue;
            }
            let mut files: Vec<PathBuf> = std::fs::read_dir(&dir)?
                .filter_map(Result::ok)
                .map(|entry| entry.path())
                .filter(|path| {
                    path.is_file()
                        && path.extension().and_then(|e| e.to_str()) == Some(SESSION_EXTENSION)
                })
                .collect();
            files.sort();

            for path in files {
                let Some(id) = path.file_stem().and_then(|s| s.to_str()).map(str::to_string) else {
                    continue;
                };
                if !seen.insert(id.clone()) {
                    tracing::warn!(account = %id, path = %path.display(), "Duplicate session file ignored");
                    continue;
                }
                let mut account =
                    Account::new(id.clone(), path).with_blacklisted(self.blacklist.contains(&id));
                if let Some(reference_id) = &self.reference_id {
                    account = account.with_reference_id(reference_id.clone());
                }
                accounts.push(account);
            }
        }

        accounts.sort_by(|a, b| a.id.cmp(&b.id));
        tracing::info!(count = accounts.len(), dir = %self.root.display(), "Accounts loaded");
        Ok(accounts)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::error::AppError;

    #[test]
    fn test_loads_root_and_subdirs_sorted() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        std::fs::create_dir_all(root.join("telethon")).unwrap();
        std::fs::create_dir_all(root.join("pyrogram")).unwrap();
        std::fs::write(root.join("zed.session"), b"x").unwrap();
        std::fs::write(root.join("telethon/alpha.session"), b"x").unwrap();
        std::fs::write(root.join("pyrogram/mid.session"), b"x").unwrap();
        std::fs::write(root.join("pyrogram/zed.session"), b"x").unwrap();
        std::fs::write(root.join("notes.txt"), b"x").unwrap();

        let blacklist: HashSet<String> = ["mid".to_string()].into_iter().collect();
        let accounts = SessionDirSource::new(root)
            .with_blacklist(blacklist)
            .with_reference_id("REF")
            .load_accounts()
            .unwrap();

        let ids: Vec<_> = accounts.iter().map(|a| a.id.as_str()).collect();
        assert_eq!(ids, ["alpha", "mid", "zed"]);
        assert!(accounts[1].blacklisted);
        assert_eq!(accounts[2].credential, root.join("zed.session"));
        assert_eq!(accounts[0].reference_id.as_deref(), Some("REF"));
    }

    #[test]
    fn test_missing_dir_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = SessionDirSource::new(dir.path().join("nope")).load_accounts().unwrap_err();
        assert!(matches!(err, AppError::Config(ConfigError::NotFound { .. })));
    }
}
