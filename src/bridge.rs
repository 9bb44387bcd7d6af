//! Destination-side call contract.

use crate::data_types::{BookmarkEntry, CookieEntry, FaviconUsage, HistoryEntry, PasswordForm};
use crate::items::ImportItem;
use serde::{Deserialize, Serialize};

/// Marker attached to imported history visits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VisitSource {
    ChromeImported,
}

/// Top-level folder the destination files imported bookmarks under.
pub const IMPORTED_BOOKMARKS_FOLDER: &str = "Imported from Chrome";

/// Receives normalized records from the importer.
///
/// Calls are synchronous. Bulk setters are invoked at most once per phase and
/// only with a non-empty list; `set_password_form` is invoked once per record.
pub trait ImporterBridge {
    fn notify_started(&mut self);
    fn notify_item_started(&mut self, item: ImportItem);
    fn notify_item_ended(&mut self, item: ImportItem);
    fn notify_ended(&mut self);

    fn set_history_items(&mut self, rows: Vec<HistoryEntry>, source: VisitSource);
    fn add_bookmarks(&mut self, bookmarks: Vec<BookmarkEntry>, top_level_folder_name: &str);
    fn set_favicons(&mut self, favicons: Vec<FaviconUsage>);
    fn set_cookies(&mut self, cookies: Vec<CookieEntry>);
    fn set_password_form(&mut self, form: PasswordForm);
}

/// One bridge call, in the order it was made.
#[derive(Debug, Clone, PartialEq)]
pub enum BridgeEvent {
    Started,
    ItemStarted(ImportItem),
    ItemEnded(ImportItem),
    Ended,
    HistoryItems(usize),
    Bookmarks(usize),
    Favicons(usize),
    Cookies(usize),
    PasswordForm,
}

/// Bridge that keeps everything in memory.
#[derive(Debug, Default)]
pub struct CollectingBridge {
    pub events: Vec<BridgeEvent>,
    pub history: Vec<HistoryEntry>,
    pub history_source: Option<VisitSource>,
    pub bookmarks: Vec<BookmarkEntry>,
    pub bookmark_folder: Option<String>,
    pub favicons: Vec<FaviconUsage>,
    pub cookies: Vec<CookieEntry>,
    pub passwords: Vec<PasswordForm>,
}

impl CollectingBridge {
    pub fn new() -> Self {
        Self::default()
    }

    /// Calls other than the start/end notifications.
    pub fn data_calls(&self) -> usize {
        self.events
            .iter()
            .filter(|event| {
                !matches!(
                    event,
                    BridgeEvent::Started
                        | BridgeEvent::Ended
                        | BridgeEvent::ItemStarted(_)
                        | BridgeEvent::ItemEnded(_)
                )
            })
            .count()
    }
}

impl ImporterBridge for CollectingBridge {
    fn notify_started(&mut self) {
        self.events.push(BridgeEvent::Started);
    }

    fn notify_item_started(&mut self, item: ImportItem) {
        self.events.push(BridgeEvent::ItemStarted(item));
    }

    fn notify_item_ended(&mut self, item: ImportItem) {
        self.events.push(BridgeEvent::ItemEnded(item));
    }

    fn notify_ended(&mut self) {
        self.events.push(BridgeEvent::Ended);
    }

    fn set_history_items(&mut self, rows: Vec<HistoryEntry>, source: VisitSource) {
        self.events.push(BridgeEvent::HistoryItems(rows.len()));
        self.history_source = Some(source);
        self.history.extend(rows);
    }

    fn add_bookmarks(&mut self, bookmarks: Vec<BookmarkEntry>, top_level_folder_name: &str) {
        self.events.push(BridgeEvent::Bookmarks(bookmarks.len()));
        self.bookmark_folder = Some(top_level_folder_name.to_string());
        self.bookmarks.extend(bookmarks);
    }

    fn set_favicons(&mut self, favicons: Vec<FaviconUsage>) {
        self.events.push(BridgeEvent::Favicons(favicons.len()));
        self.favicons.extend(favicons);
    }

    fn set_cookies(&mut self, cookies: Vec<CookieEntry>) {
        self.events.push(BridgeEvent::Cookies(cookies.len()));
        self.cookies.extend(cookies);
    }

    fn set_password_form(&mut self, form: PasswordForm) {
        self.events.push(BridgeEvent::PasswordForm);
        self.passwords.push(form);
    }
}
