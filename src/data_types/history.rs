//! Browsing history reader.

use crate::cancel::Cancellation;
use crate::error::{ImportError, Result};
use crate::profile::{SourceProfile, HISTORY_FILE};
use crate::time::chrome_time_to_double;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// One visited URL.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub url: String,
    pub title: String,
    /// Unix seconds.
    pub last_visit: f64,
    pub typed_count: i32,
    pub visit_count: i32,
    pub hidden: bool,
}

const HISTORY_QUERY: &str = "SELECT url, title, last_visit_time, typed_count, visit_count \
                             FROM urls WHERE hidden = 0";

/// Read every non-hidden URL row.
///
/// Stops early when `cancel` is raised; the caller decides what to do with
/// the partial list.
pub fn read_history(profile: &SourceProfile, cancel: &dyn Cancellation) -> Result<Vec<HistoryEntry>> {
    let store = profile.open_store(HISTORY_FILE)?;
    let path = profile.file(HISTORY_FILE);

    let mut stmt = store
        .conn()
        .prepare(HISTORY_QUERY)
        .map_err(|e| ImportError::open(&path, e))?;

    let rows = stmt
        .query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, Option<String>>(1)?,
                row.get::<_, Option<i64>>(2)?,
                row.get::<_, Option<i32>>(3)?,
                row.get::<_, Option<i32>>(4)?,
            ))
        })
        .map_err(|e| ImportError::open(&path, e))?;

    let mut entries = Vec::new();
    for row in rows {
        if cancel.is_cancelled() {
            break;
        }
        let (url, title, last_visit_time, typed_count, visit_count) = match row {
            Ok(row) => row,
            Err(e) => {
                debug!("{}", ImportError::RecordDecodeFailure(format!("history row: {}", e)));
                continue;
            }
        };

        entries.push(HistoryEntry {
            url,
            title: title.unwrap_or_default(),
            last_visit: chrome_time_to_double(last_visit_time.unwrap_or(0)),
            typed_count: typed_count.unwrap_or(0),
            visit_count: visit_count.unwrap_or(0),
            hidden: false,
        });
    }

    Ok(entries)
}
