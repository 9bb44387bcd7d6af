//! Cookie reader.
//!
//! Only rows without an OS-encrypted value are imported; the encrypted ones
//! never leave the query.

use crate::cancel::Cancellation;
use crate::error::{ImportError, Result};
use crate::profile::{SourceProfile, COOKIES_FILE};
use crate::time::chrome_time_to_double;
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CookieEntry {
    pub domain: String,
    pub name: String,
    pub value: String,
    /// `*` followed by the domain.
    pub host: String,
    pub path: String,
    /// Unix seconds.
    pub expiry: f64,
    pub secure: bool,
    pub httponly: bool,
}

/// Pick the flag column names for this schema version.
fn flag_columns(columns: &[String]) -> Option<(&'static str, &'static str)> {
    let has = |name: &str| columns.iter().any(|c| c == name);
    if has("secure") && has("httponly") {
        Some(("secure", "httponly"))
    } else if has("is_secure") && has("is_httponly") {
        Some(("is_secure", "is_httponly"))
    } else {
        None
    }
}

pub fn read_cookies(profile: &SourceProfile, cancel: &dyn Cancellation) -> Result<Vec<CookieEntry>> {
    let store = profile.open_store(COOKIES_FILE)?;
    let path = profile.file(COOKIES_FILE);

    let columns = store.columns("cookies")?;
    let (secure, httponly) = flag_columns(&columns)
        .ok_or_else(|| ImportError::open(&path, "cookies table not found or unsupported schema"))?;

    let query = format!(
        "SELECT host_key, name, value, path, expires_utc, {}, {}, encrypted_value \
         FROM cookies WHERE length(encrypted_value) = 0",
        secure, httponly
    );
    let mut stmt = store
        .conn()
        .prepare(&query)
        .map_err(|e| ImportError::open(&path, e))?;

    let rows = stmt
        .query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, Option<String>>(2)?,
                row.get::<_, Option<String>>(3)?,
                row.get::<_, Option<i64>>(4)?,
                row.get::<_, Option<bool>>(5)?,
                row.get::<_, Option<bool>>(6)?,
            ))
        })
        .map_err(|e| ImportError::open(&path, e))?;

    let mut cookies = Vec::new();
    for row in rows {
        if cancel.is_cancelled() {
            break;
        }
        let (domain, name, value, cookie_path, expires_utc, is_secure, is_httponly) = match row {
            Ok(row) => row,
            Err(e) => {
                debug!("{}", ImportError::RecordDecodeFailure(format!("cookie row: {}", e)));
                continue;
            }
        };

        cookies.push(CookieEntry {
            host: format!("*{}", domain),
            domain,
            name,
            value: value.unwrap_or_default(),
            path: cookie_path.unwrap_or_default(),
            expiry: chrome_time_to_double(expires_utc.unwrap_or(0)),
            secure: is_secure.unwrap_or(false),
            httponly: is_httponly.unwrap_or(false),
        });
    }

    Ok(cookies)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cancel::CancellationFlag;
    use rusqlite::{params, Connection};

    fn write_cookies(dir: &std::path::Path, secure_col: &str, httponly_col: &str) {
        let conn = Connection::open(dir.join(COOKIES_FILE)).unwrap();
        conn.execute_batch(&format!(
            "CREATE TABLE cookies (creation_utc INTEGER NOT NULL, host_key TEXT NOT NULL, name TEXT NOT NULL,
                 value TEXT NOT NULL, path TEXT NOT NULL, expires_utc INTEGER NOT NULL,
                 {} INTEGER NOT NULL, {} INTEGER NOT NULL, encrypted_value BLOB DEFAULT '');",
            secure_col, httponly_col
        ))
        .unwrap();
        let insert = format!(
            "INSERT INTO cookies (creation_utc, host_key, name, value, path, expires_utc, {}, {}, encrypted_value)
             VALUES (0, ?1, ?2, ?3, '/', 13348540800000000, ?4, ?5, ?6)",
            secure_col, httponly_col
        );
        conn.execute(&insert, params![".example.com", "session", "plain", 1, 0, Vec::<u8>::new()])
            .unwrap();
        conn.execute(&insert, params![".secret.example", "token", "", 1, 1, b"v10\x01\x02".to_vec()])
            .unwrap();
        conn.execute(&insert, params!["app.example", "prefs", "dark", 0, 1, Vec::<u8>::new()])
            .unwrap();
    }

    #[test]
    fn test_encrypted_rows_are_excluded() {
        let dir = tempfile::tempdir().unwrap();
        write_cookies(dir.path(), "secure", "httponly");

        let cookies = read_cookies(&SourceProfile::new(dir.path()), &CancellationFlag::new()).unwrap();
        assert_eq!(cookies.len(), 2);
        assert!(cookies.iter().all(|c| c.domain != ".secret.example"));

        let session = &cookies[0];
        assert_eq!(session.host, "*.example.com");
        assert_eq!(session.domain, ".example.com");
        assert_eq!(session.value, "plain");
        assert_eq!(session.path, "/");
        assert_eq!(session.expiry, 1_704_067_200.0);
        assert!(session.secure);
        assert!(!session.httponly);

        assert_eq!(cookies[1].host, "*app.example");
        assert!(cookies[1].httponly);
    }

    #[test]
    fn test_newer_schema_column_names() {
        let dir = tempfile::tempdir().unwrap();
        write_cookies(dir.path(), "is_secure", "is_httponly");

        let cookies = read_cookies(&SourceProfile::new(dir.path()), &CancellationFlag::new()).unwrap();
        assert_eq!(cookies.len(), 2);
        assert!(cookies[0].secure);
    }

    #[test]
    fn test_missing_table_is_open_failure() {
        let dir = tempfile::tempdir().unwrap();
        Connection::open(dir.path().join(COOKIES_FILE))
            .unwrap()
            .execute_batch("CREATE TABLE meta (key TEXT, value TEXT);")
            .unwrap();
        assert!(matches!(
            read_cookies(&SourceProfile::new(dir.path()), &CancellationFlag::new()),
            Err(ImportError::OpenFailure { .. })
        ));
    }
}
