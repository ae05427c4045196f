//! File-backed credential storage.
//!
//! The record lives in a single JSON file readable only by its owner.
//! Writes go through a sibling temp file and a rename, so a concurrent
//! reader sees either the old record or the new one.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use tracing::debug;

use crate::error::{Error, Result};
use crate::token::CredentialRecord;

/// Persists one [`CredentialRecord`] at a fixed path.
#[derive(Debug, Clone)]
pub struct TokenStore {
    path: PathBuf,
}

impl TokenStore {
    /// Creates a store for the given token file.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Token file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads the stored record, or `None` if nothing has been saved yet.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Parse`] if the file is not a valid record and
    /// [`Error::Io`] if it cannot be read.
    pub fn load(&self) -> Result<Option<CredentialRecord>> {
        let raw = match fs::read(&self.path) {
            Ok(data) => data,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "No token file");
                return Ok(None);
            }
            Err(err) => return Err(err.into()),
        };

        serde_json::from_slice(&raw)
            .map(Some)
            .map_err(|source| Error::Parse {
                path: self.path.clone(),
                source,
            })
    }

    /// Replaces the stored record.
    ///
    /// Creates parent directories as needed and leaves the file with mode
    /// `0600` on Unix.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or any filesystem step fails.
    pub fn save(&self, record: &CredentialRecord) -> Result<()> {
        let serialized = serde_json::to_vec_pretty(record)?;
        atomic_write(&self.path, &serialized)?;
        debug!(path = %self.path.display(), "Saved tokens");
        Ok(())
    }
}

fn atomic_write(path: &Path, data: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let file_name = path.file_name().ok_or_else(|| {
        Error::InvalidConfig(format!("token path {} has no file name", path.display()))
    })?;

    let nonce = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    let temp_path = path.with_file_name(format!(
        ".{}.tmp-{}-{nonce}",
        file_name.to_string_lossy(),
        std::process::id()
    ));

    let mut options = fs::OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }

    let write_result = (|| -> io::Result<()> {
        let mut temp_file = options.open(&temp_path)?;
        temp_file.write_all(data)?;
        temp_file.sync_all()
    })();

    if let Err(err) = write_result.and_then(|()| fs::rename(&temp_path, path)) {
        let _ = fs::remove_file(&temp_path);
        return Err(err.into());
    }

    restrict_permissions(path)?;
    Ok(())
}

#[cfg(unix)]
fn restrict_permissions(path: &Path) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o600))
}

#[cfg(not(unix))]
#[allow(clippy::unnecessary_wraps)]
const fn restrict_permissions(_path: &Path) -> io::Result<()> {
    Ok(())
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::redundant_clone,
    clippy::unreadable_literal,
    clippy::similar_names
)]
mod tests {
    use super::*;
    use chrono::{DateTime, TimeDelta, Utc};
    use proptest::prelude::*;
    use serde_json::{Map, Value};
    use tempfile::TempDir;
    use tokio_test::{assert_err, assert_ok};

    fn temp_store() -> (TempDir, TokenStore) {
        let dir = TempDir::new().unwrap();
        let store = TokenStore::new(dir.path().join("neomutt").join("oauth2_tokens.json"));
        (dir, store)
    }

    fn record(access: &str, refresh: &str) -> CredentialRecord {
        let mut extra = Map::new();
        extra.insert("token_type".to_string(), Value::from("Bearer"));
        CredentialRecord {
            access_token: access.to_string(),
            refresh_token: refresh.to_string(),
            expires_in: 3599,
            expires_at: Utc::now() + TimeDelta::seconds(3599),
            extra,
        }
    }

    #[test]
    fn test_load_missing_file() {
        let (_dir, store) = temp_store();
        assert_eq!(assert_ok!(store.load()), None);
    }

    #[test]
    fn test_save_creates_parent_and_round_trips() {
        let (_dir, store) = temp_store();
        let token = record("A1", "R1");

        assert_ok!(store.save(&token));
        assert!(store.path().exists());
        assert_eq!(store.load().unwrap(), Some(token));
    }

    #[test]
    fn test_save_overwrites_previous_record() {
        let (_dir, store) = temp_store();
        store.save(&record("A1", "R1")).unwrap();
        store.save(&record("A2", "R2")).unwrap();

        let loaded = store.load().unwrap().unwrap();
        assert_eq!(loaded.access_token, "A2");
        assert_eq!(loaded.refresh_token, "R2");

        let leftovers: Vec<_> = fs::read_dir(store.path().parent().unwrap())
            .unwrap()
            .filter_map(std::result::Result::ok)
            .filter(|entry| entry.file_name().to_string_lossy().contains(".tmp-"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn test_save_restricts_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let (_dir, store) = temp_store();
        fs::create_dir_all(store.path().parent().unwrap()).unwrap();
        fs::write(store.path(), "{}").unwrap();
        fs::set_permissions(store.path(), fs::Permissions::from_mode(0o644)).unwrap();

        store.save(&record("A1", "R1")).unwrap();

        let mode = fs::metadata(store.path()).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn test_load_invalid_data() {
        let (_dir, store) = temp_store();
        fs::create_dir_all(store.path().parent().unwrap()).unwrap();
        fs::write(store.path(), "not json at all").unwrap();

        let err = assert_err!(store.load());
        assert!(err.is_corrupt_state());
    }

    #[test]
    fn test_load_non_utf8_data() {
        let (_dir, store) = temp_store();
        fs::create_dir_all(store.path().parent().unwrap()).unwrap();
        fs::write(store.path(), [0xff, 0xfe, 0x00, 0x7b]).unwrap();

        let err = assert_err!(store.load());
        assert!(err.is_corrupt_state());
    }

    #[test]
    fn test_load_record_missing_fields() {
        let (_dir, store) = temp_store();
        fs::create_dir_all(store.path().parent().unwrap()).unwrap();
        fs::write(store.path(), r#"{"access_token": "A1"}"#).unwrap();

        assert!(matches!(store.load(), Err(Error::Parse { .. })));
    }

    #[test]
    fn test_save_rejects_path_without_file_name() {
        let store = TokenStore::new("/");
        assert!(matches!(
            store.save(&record("A1", "R1")),
            Err(Error::InvalidConfig(_))
        ));
    }

    proptest! {
        #[test]
        fn prop_save_then_load_is_identity(
            access in "[A-Za-z0-9._-]{1,64}",
            refresh in "[A-Za-z0-9._/-]{1,64}",
            expires_in in 0u64..100_000,
            offset in -100_000i64..100_000,
            scope in proptest::option::of("[a-z:/.]{1,32}"),
        ) {
            let (_dir, store) = temp_store();
            let mut extra = Map::new();
            if let Some(scope) = scope {
                extra.insert("scope".to_string(), Value::from(scope));
            }
            let expires_at = DateTime::<Utc>::from_timestamp(1_700_000_000 + offset, 0).unwrap();
            let token = CredentialRecord {
                access_token: access,
                refresh_token: refresh,
                expires_in,
                expires_at,
                extra,
            };

            store.save(&token).unwrap();
            prop_assert_eq!(store.load().unwrap(), Some(token));
        }
    }
}
