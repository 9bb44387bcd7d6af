//! Source profile layout and store access.
//!
//! Every relational store is read from a private snapshot:
//! 1. the database and its sidecar journal files are copied into a temp dir
//! 2. the copy is opened read-only
//! 3. the temp dir is removed when the handle is dropped
//!
//! A running browser holds locks on its live files, and the importer must
//! never write to the source profile.

use crate::error::{ImportError, Result};
use rusqlite::{Connection, OpenFlags};
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::debug;

pub const HISTORY_FILE: &str = "History";
pub const BOOKMARKS_FILE: &str = "Bookmarks";
pub const FAVICONS_FILE: &str = "Favicons";
pub const COOKIES_FILE: &str = "Cookies";
pub const LOGIN_DATA_FILE: &str = "Login Data";
pub const PREFERENCES_FILE: &str = "Preferences";

/// Preference key holding the per-profile keyring id.
pub const LOCAL_PROFILE_ID_PREF: &str = "profile.local_profile_id";

const SIDECAR_SUFFIXES: [&str; 3] = ["-journal", "-wal", "-shm"];

/// Root directory of the foreign profile. Read-only input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceProfile {
    pub source_path: PathBuf,
}

impl SourceProfile {
    pub fn new(source_path: impl Into<PathBuf>) -> Self {
        Self {
            source_path: source_path.into(),
        }
    }

    pub fn file(&self, name: &str) -> PathBuf {
        self.source_path.join(name)
    }

    /// Open one of the profile's SQLite stores through a snapshot.
    pub fn open_store(&self, name: &str) -> Result<ProfileStore> {
        ProfileStore::open(&self.file(name))
    }

    /// Load `Preferences` as JSON.
    pub fn read_preferences(&self) -> Result<Value> {
        let path = self.file(PREFERENCES_FILE);
        if !path.exists() {
            return Err(ImportError::MissingSource(path));
        }
        let content = fs::read_to_string(&path).map_err(|e| ImportError::open(&path, e))?;
        let json: Value =
            serde_json::from_str(&content).map_err(|e| ImportError::parse(&path, e))?;
        if !json.is_object() {
            return Err(ImportError::parse(&path, "top level is not an object"));
        }
        Ok(json)
    }

    /// The integer id the host browser uses to namespace this profile's
    /// entries in the desktop keyring.
    pub fn local_profile_id(&self) -> Result<i32> {
        let prefs = self.read_preferences()?;
        let path = self.file(PREFERENCES_FILE);
        let value = lookup_pref(&prefs, LOCAL_PROFILE_ID_PREF).ok_or_else(|| {
            ImportError::parse(&path, format!("{} is not set", LOCAL_PROFILE_ID_PREF))
        })?;
        value
            .as_i64()
            .and_then(|id| i32::try_from(id).ok())
            .ok_or_else(|| {
                ImportError::parse(&path, format!("{} is not an integer", LOCAL_PROFILE_ID_PREF))
            })
    }
}

/// Resolve a dotted preference path such as `profile.local_profile_id`.
pub fn lookup_pref<'a>(prefs: &'a Value, key: &str) -> Option<&'a Value> {
    key.split('.').try_fold(prefs, |node, part| node.get(part))
}

/// Read-only SQLite handle over a temporary copy of a profile store.
pub struct ProfileStore {
    conn: Connection,
    // Dropped after `conn`, which removes the copy.
    _snapshot: TempDir,
}

impl ProfileStore {
    pub fn open(db_path: &Path) -> Result<Self> {
        if !db_path.exists() {
            return Err(ImportError::MissingSource(db_path.to_path_buf()));
        }

        let snapshot = tempfile::Builder::new()
            .prefix("chrome-import-")
            .tempdir()
            .map_err(|e| ImportError::open(db_path, e))?;

        let file_name = db_path
            .file_name()
            .ok_or_else(|| ImportError::open(db_path, "invalid database path"))?;
        let copy_path = snapshot.path().join(file_name);

        debug!("Snapshotting {:?} to {:?}", db_path, copy_path);
        fs::copy(db_path, &copy_path).map_err(|e| ImportError::open(db_path, e))?;

        for suffix in SIDECAR_SUFFIXES {
            let mut sidecar = db_path.as_os_str().to_owned();
            sidecar.push(suffix);
            let sidecar = PathBuf::from(sidecar);
            if sidecar.exists() {
                let mut target = copy_path.as_os_str().to_owned();
                target.push(suffix);
                if let Err(e) = fs::copy(&sidecar, PathBuf::from(target)) {
                    debug!("Could not copy {:?}: {}", sidecar, e);
                }
            }
        }

        let conn = Connection::open_with_flags(
            &copy_path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .map_err(|e| ImportError::open(db_path, e))?;

        // SQLite opens lazily; touch the schema so a non-database file fails here.
        conn.query_row("SELECT count(*) FROM sqlite_master", [], |row| {
            row.get::<_, i64>(0)
        })
        .map_err(|e| ImportError::open(db_path, e))?;

        Ok(Self {
            conn,
            _snapshot: snapshot,
        })
    }

    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Column names of `table`, empty if the table does not exist.
    pub fn columns(&self, table: &str) -> Result<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare(&format!("PRAGMA table_info({})", table))
            .map_err(|e| ImportError::open(table, e))?;
        let names = stmt
            .query_map([], |row| row.get::<_, String>(1))
            .map_err(|e| ImportError::open(table, e))?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| ImportError::open(table, e))?;
        Ok(names)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_store() {
        let dir = tempfile::tempdir().unwrap();
        let profile = SourceProfile::new(dir.path());
        let err = profile.open_store(HISTORY_FILE).err().unwrap();
        assert!(err.is_missing_source());
    }

    #[test]
    fn test_garbage_store_is_open_failure() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(COOKIES_FILE), b"definitely not sqlite, just padding bytes")
            .unwrap();
        let profile = SourceProfile::new(dir.path());
        match profile.open_store(COOKIES_FILE) {
            Err(ImportError::OpenFailure { .. }) => {}
            other => panic!("expected open failure, got {:?}", other.err()),
        }
    }

    #[test]
    fn test_snapshot_reads_data_and_columns() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(HISTORY_FILE);
        {
            let conn = Connection::open(&path).unwrap();
            conn.execute_batch("CREATE TABLE urls (url TEXT, hidden INTEGER); INSERT INTO urls VALUES ('https://a.example/', 0);")
                .unwrap();
        }
        let store = SourceProfile::new(dir.path()).open_store(HISTORY_FILE).unwrap();
        let count: i64 = store
            .conn()
            .query_row("SELECT count(*) FROM urls", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 1);
        assert_eq!(store.columns("urls").unwrap(), vec!["url", "hidden"]);
        assert!(store.columns("missing").unwrap().is_empty());
    }

    #[test]
    fn test_local_profile_id() {
        let dir = tempfile::tempdir().unwrap();
        let profile = SourceProfile::new(dir.path());
        assert!(profile.local_profile_id().unwrap_err().is_missing_source());

        fs::write(
            dir.path().join(PREFERENCES_FILE),
            r#"{"profile": {"local_profile_id": 42, "name": "Person 1"}}"#,
        )
        .unwrap();
        assert_eq!(profile.local_profile_id().unwrap(), 42);

        fs::write(
            dir.path().join(PREFERENCES_FILE),
            r#"{"profile": {"local_profile_id": "42"}}"#,
        )
        .unwrap();
        assert!(profile.local_profile_id().is_err());

        fs::write(dir.path().join(PREFERENCES_FILE), "{not json").unwrap();
        assert!(matches!(
            profile.local_profile_id(),
            Err(ImportError::ParseFailure { .. })
        ));
    }
}
