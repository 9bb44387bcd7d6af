//! Saved login forms and the per-profile `Login Data` store.

use crate::error::{ImportError, Result};
use crate::keyring::PasswordBackend;
use crate::profile::{ProfileStore, SourceProfile, LOGIN_DATA_FILE};
use crate::time::chrome_time_to_double;
use rusqlite::Row;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::debug;

/// Authentication scheme of a saved credential.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PasswordScheme {
    #[default]
    Html,
    Basic,
    Digest,
    Other,
    UsernameOnly,
}

impl PasswordScheme {
    pub fn from_i32(value: i32) -> Self {
        match value {
            1 => PasswordScheme::Basic,
            2 => PasswordScheme::Digest,
            3 => PasswordScheme::Other,
            4 => PasswordScheme::UsernameOnly,
            _ => PasswordScheme::Html,
        }
    }
}

/// A saved credential, either autofillable or a "never save" entry.
///
/// `password_value` is whatever the store handed back; OS-encrypted values
/// stay encrypted.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PasswordForm {
    pub scheme: PasswordScheme,
    pub signon_realm: String,
    pub origin_url: String,
    pub action_url: String,
    pub username_element: String,
    pub username_value: String,
    pub password_element: String,
    pub password_value: Vec<u8>,
    pub submit_element: String,
    /// Unix seconds.
    pub date_created: f64,
    pub blacklisted_by_user: bool,
    pub preferred: bool,
    pub times_used: i32,
}

/// Columns that older or newer schemas may lack, with the value used instead.
const OPTIONAL_COLUMNS: [(&str, &str); 4] = [
    ("submit_element", "''"),
    ("preferred", "0"),
    ("scheme", "0"),
    ("times_used", "0"),
];

/// Direct reader for the profile's own `Login Data` SQLite file.
pub struct LoginDatabase {
    db_path: PathBuf,
    profile: SourceProfile,
    store: Option<ProfileStore>,
    select: String,
}

impl LoginDatabase {
    pub fn new(profile: &SourceProfile) -> Self {
        Self {
            db_path: profile.file(LOGIN_DATA_FILE),
            profile: profile.clone(),
            store: None,
            select: String::new(),
        }
    }

    fn logins(&self, blacklisted: bool) -> Result<Vec<PasswordForm>> {
        let store = self
            .store
            .as_ref()
            .ok_or_else(|| ImportError::open(&self.db_path, "login database not initialized"))?;

        let query = format!(
            "{} WHERE blacklisted_by_user = ?1 ORDER BY origin_url",
            self.select
        );
        let mut stmt = store
            .conn()
            .prepare(&query)
            .map_err(|e| ImportError::open(&self.db_path, e))?;
        let rows = stmt
            .query_map([blacklisted], form_from_row)
            .map_err(|e| ImportError::open(&self.db_path, e))?;

        let mut forms = Vec::new();
        for row in rows {
            match row {
                Ok(form) => forms.push(form),
                Err(e) => debug!("{}", ImportError::RecordDecodeFailure(format!("login row: {}", e))),
            }
        }
        Ok(forms)
    }
}

impl PasswordBackend for LoginDatabase {
    fn name(&self) -> &'static str {
        "login-database"
    }

    fn init(&mut self) -> Result<()> {
        let store = self.profile.open_store(LOGIN_DATA_FILE)?;
        let columns = store.columns("logins")?;
        if columns.is_empty() {
            return Err(ImportError::open(&self.db_path, "logins table not found"));
        }

        let mut select = String::from(
            "SELECT origin_url, action_url, username_element, username_value, \
             password_element, password_value, signon_realm, date_created, blacklisted_by_user",
        );
        for (column, fallback) in OPTIONAL_COLUMNS {
            select.push_str(", ");
            if columns.iter().any(|c| c == column) {
                select.push_str(column);
            } else {
                select.push_str(fallback);
            }
        }
        select.push_str(" FROM logins");

        self.select = select;
        self.store = Some(store);
        Ok(())
    }

    fn autofillable_logins(&mut self) -> Result<Vec<PasswordForm>> {
        self.logins(false)
    }

    fn blacklist_logins(&mut self) -> Result<Vec<PasswordForm>> {
        self.logins(true)
    }
}

fn form_from_row(row: &Row<'_>) -> rusqlite::Result<PasswordForm> {
    Ok(PasswordForm {
        origin_url: row.get::<_, Option<String>>(0)?.unwrap_or_default(),
        action_url: row.get::<_, Option<String>>(1)?.unwrap_or_default(),
        username_element: row.get::<_, Option<String>>(2)?.unwrap_or_default(),
        username_value: row.get::<_, Option<String>>(3)?.unwrap_or_default(),
        password_element: row.get::<_, Option<String>>(4)?.unwrap_or_default(),
        password_value: row.get::<_, Option<Vec<u8>>>(5)?.unwrap_or_default(),
        signon_realm: row.get::<_, Option<String>>(6)?.unwrap_or_default(),
        date_created: chrome_time_to_double(row.get::<_, Option<i64>>(7)?.unwrap_or(0)),
        blacklisted_by_user: row.get::<_, Option<bool>>(8)?.unwrap_or(false),
        submit_element: row.get::<_, Option<String>>(9)?.unwrap_or_default(),
        preferred: row.get::<_, Option<bool>>(10)?.unwrap_or(false),
        scheme: PasswordScheme::from_i32(row.get::<_, Option<i32>>(11)?.unwrap_or(0)),
        times_used: row.get::<_, Option<i32>>(12)?.unwrap_or(0),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::{params, Connection};

    fn write_login_data(dir: &std::path::Path) {
        let conn = Connection::open(dir.join(LOGIN_DATA_FILE)).unwrap();
        conn.execute_batch(
            "CREATE TABLE logins (origin_url VARCHAR NOT NULL, action_url VARCHAR,
                 username_element VARCHAR, username_value VARCHAR, password_element VARCHAR,
                 password_value BLOB, submit_element VARCHAR, signon_realm VARCHAR NOT NULL,
                 date_created INTEGER NOT NULL, blacklisted_by_user INTEGER NOT NULL,
                 scheme INTEGER NOT NULL, times_used INTEGER);",
        )
        .unwrap();
        let insert = "INSERT INTO logins (origin_url, action_url, username_element, username_value,
                 password_element, password_value, submit_element, signon_realm, date_created,
                 blacklisted_by_user, scheme, times_used)
             VALUES (?1, '', 'user', ?2, 'pass', ?3, '', ?4, 13348540800000000, ?5, 0, 2)";
        conn.execute(insert, params!["https://z.example/login", "zed", b"v10secret".to_vec(), "https://z.example/", 0])
            .unwrap();
        conn.execute(insert, params!["https://a.example/login", "ann", b"v10other".to_vec(), "https://a.example/", 0])
            .unwrap();
        conn.execute(insert, params!["https://never.example/", "", Vec::<u8>::new(), "https://never.example/", 1])
            .unwrap();
    }

    #[test]
    fn test_autofillable_and_blacklist_sets() {
        let dir = tempfile::tempdir().unwrap();
        write_login_data(dir.path());

        let mut db = LoginDatabase::new(&SourceProfile::new(dir.path()));
        db.init().unwrap();

        let forms = db.autofillable_logins().unwrap();
        assert_eq!(forms.len(), 2);
        assert_eq!(forms[0].username_value, "ann");
        assert_eq!(forms[0].password_value, b"v10other".to_vec());
        assert_eq!(forms[0].date_created, 1_704_067_200.0);
        assert_eq!(forms[0].times_used, 2);
        assert!(!forms[0].preferred);
        assert_eq!(forms[1].signon_realm, "https://z.example/");

        let blacklist = db.blacklist_logins().unwrap();
        assert_eq!(blacklist.len(), 1);
        assert!(blacklist[0].blacklisted_by_user);
    }

    #[test]
    fn test_init_fails_without_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut db = LoginDatabase::new(&SourceProfile::new(dir.path()));
        assert!(db.init().is_err());
        assert!(db.autofillable_logins().is_err());
    }

    #[test]
    fn test_scheme_mapping() {
        assert_eq!(PasswordScheme::from_i32(1), PasswordScheme::Basic);
        assert_eq!(PasswordScheme::from_i32(42), PasswordScheme::Html);
    }
}
