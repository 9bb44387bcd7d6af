//! Writes imported records as JSON files into an output directory.

use crate::progress::{create_item_spinner, finish_with_error, finish_with_success, record_written};
use anyhow::{Context, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::{DateTime, Utc};
use chrome_importer::time::unix_seconds_to_datetime;
use chrome_importer::{
    BookmarkEntry, CookieEntry, FaviconData, FaviconUsage, HistoryEntry, ImportItem,
    ImporterBridge, PasswordForm, PasswordScheme, VisitSource,
};
use indicatif::ProgressBar;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, error};

pub const HISTORY_JSON: &str = "history.json";
pub const BOOKMARKS_JSON: &str = "bookmarks.json";
pub const COOKIES_JSON: &str = "cookies.json";
pub const PASSWORDS_JSON: &str = "passwords.json";
pub const FAVICONS_DIR: &str = "favicons";
pub const FAVICONS_JSON: &str = "favicons.json";

#[derive(Serialize)]
struct HistoryExport<'a> {
    source: VisitSource,
    exported_at: DateTime<Utc>,
    newest_visit: Option<DateTime<Utc>>,
    entries: &'a [HistoryEntry],
}

#[derive(Serialize)]
struct BookmarksExport<'a> {
    top_level_folder: &'a str,
    bookmarks: &'a [BookmarkEntry],
}

#[derive(Serialize)]
struct FaviconIndexEntry<'a> {
    urls: Vec<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    file: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    remote_url: Option<&'a str>,
}

/// Saved login with the password bytes base64-encoded.
#[derive(Serialize)]
struct PasswordExport<'a> {
    scheme: PasswordScheme,
    signon_realm: &'a str,
    origin_url: &'a str,
    action_url: &'a str,
    username_element: &'a str,
    username_value: &'a str,
    password_element: &'a str,
    password_value: String,
    submit_element: &'a str,
    date_created: f64,
    blacklisted_by_user: bool,
    preferred: bool,
    times_used: i32,
}

impl<'a> From<&'a PasswordForm> for PasswordExport<'a> {
    fn from(form: &'a PasswordForm) -> Self {
        Self {
            scheme: form.scheme,
            signon_realm: &form.signon_realm,
            origin_url: &form.origin_url,
            action_url: &form.action_url,
            username_element: &form.username_element,
            username_value: &form.username_value,
            password_element: &form.password_element,
            password_value: STANDARD.encode(&form.password_value),
            submit_element: &form.submit_element,
            date_created: form.date_created,
            blacklisted_by_user: form.blacklisted_by_user,
            preferred: form.preferred,
            times_used: form.times_used,
        }
    }
}

/// Bridge that writes every delivery to disk.
///
/// Bridge calls cannot fail, so write errors are collected and reported by
/// [`JsonExportBridge::finish`].
pub struct JsonExportBridge {
    output_dir: PathBuf,
    show_progress: bool,
    spinner: Option<ProgressBar>,
    passwords: Vec<PasswordForm>,
    written: Vec<PathBuf>,
    errors: Vec<String>,
}

impl JsonExportBridge {
    pub fn new(output_dir: &Path, show_progress: bool) -> Result<Self> {
        fs::create_dir_all(output_dir)
            .with_context(|| format!("Failed to create output directory {:?}", output_dir))?;
        Ok(Self {
            output_dir: output_dir.to_path_buf(),
            show_progress,
            spinner: None,
            passwords: Vec::new(),
            written: Vec::new(),
            errors: Vec::new(),
        })
    }

    /// Files written so far, or the first write error.
    pub fn finish(self) -> Result<Vec<PathBuf>> {
        if let Some(first) = self.errors.first() {
            anyhow::bail!("{} export write(s) failed, first: {}", self.errors.len(), first);
        }
        Ok(self.written)
    }

    fn write_json<T: Serialize + ?Sized>(&mut self, name: &str, value: &T) -> Result<()> {
        let path = self.output_dir.join(name);
        let data = serde_json::to_string_pretty(value)?;
        fs::write(&path, data).with_context(|| format!("Failed to write {:?}", path))?;
        debug!("Wrote {:?}", path);
        self.written.push(path);
        Ok(())
    }

    fn record(&mut self, what: &str, count: usize, result: Result<()>) {
        match result {
            Ok(()) => {
                if let Some(pb) = &self.spinner {
                    record_written(pb, what, count);
                }
            }
            Err(e) => {
                error!("❌ Failed to export {}: {:#}", what, e);
                self.errors.push(format!("{:#}", e));
            }
        }
    }

    fn write_favicons(&mut self, favicons: &[FaviconUsage]) -> Result<()> {
        let dir = self.output_dir.join(FAVICONS_DIR);
        fs::create_dir_all(&dir).with_context(|| format!("Failed to create {:?}", dir))?;

        let mut index = Vec::with_capacity(favicons.len());
        for (i, usage) in favicons.iter().enumerate() {
            let urls = usage.urls.iter().map(String::as_str).collect();
            let entry = match &usage.data {
                FaviconData::Png(bytes) => {
                    let file = format!("{}.png", i);
                    let path = dir.join(&file);
                    fs::write(&path, bytes).with_context(|| format!("Failed to write {:?}", path))?;
                    FaviconIndexEntry {
                        urls,
                        file: Some(format!("{}/{}", FAVICONS_DIR, file)),
                        remote_url: None,
                    }
                }
                FaviconData::Remote(url) => FaviconIndexEntry {
                    urls,
                    file: None,
                    remote_url: Some(url),
                },
            };
            index.push(entry);
        }

        self.write_json(&format!("{}/{}", FAVICONS_DIR, FAVICONS_JSON), &index)
    }

    fn write_passwords(&mut self) -> Result<()> {
        let passwords = std::mem::take(&mut self.passwords);
        let export: Vec<PasswordExport<'_>> = passwords.iter().map(PasswordExport::from).collect();
        self.write_json(PASSWORDS_JSON, &export)
    }
}

impl ImporterBridge for JsonExportBridge {
    fn notify_started(&mut self) {
        debug!("Exporting into {:?}", self.output_dir);
    }

    fn notify_item_started(&mut self, item: ImportItem) {
        if self.show_progress {
            self.spinner = Some(create_item_spinner(item));
        }
    }

    fn notify_item_ended(&mut self, item: ImportItem) {
        if item == ImportItem::Passwords && !self.passwords.is_empty() {
            let count = self.passwords.len();
            let result = self.write_passwords();
            self.record("passwords", count, result);
        }

        if let Some(pb) = self.spinner.take() {
            if self.errors.is_empty() {
                finish_with_success(&pb, &format!("{} done", item));
            } else {
                finish_with_error(&pb, &format!("{} had write errors", item));
            }
        }
    }

    fn notify_ended(&mut self) {
        debug!("Export finished with {} file(s)", self.written.len());
    }

    fn set_history_items(&mut self, rows: Vec<HistoryEntry>, source: VisitSource) {
        let newest_visit = rows
            .iter()
            .map(|row| row.last_visit)
            .fold(None, |newest: Option<f64>, t| Some(newest.map_or(t, |n| n.max(t))))
            .and_then(unix_seconds_to_datetime);
        let export = HistoryExport {
            source,
            exported_at: Utc::now(),
            newest_visit,
            entries: &rows,
        };
        let result = self.write_json(HISTORY_JSON, &export);
        self.record("history entries", rows.len(), result);
    }

    fn add_bookmarks(&mut self, bookmarks: Vec<BookmarkEntry>, top_level_folder_name: &str) {
        let result = self.write_json(
            BOOKMARKS_JSON,
            &BookmarksExport {
                top_level_folder: top_level_folder_name,
                bookmarks: &bookmarks,
            },
        );
        self.record("bookmarks", bookmarks.len(), result);
    }

    fn set_favicons(&mut self, favicons: Vec<FaviconUsage>) {
        let result = self.write_favicons(&favicons);
        self.record("favicons", favicons.len(), result);
    }

    fn set_cookies(&mut self, cookies: Vec<CookieEntry>) {
        let result = self.write_json(COOKIES_JSON, &cookies);
        self.record("cookies", cookies.len(), result);
    }

    fn set_password_form(&mut self, form: PasswordForm) {
        self.passwords.push(form);
    }
}
