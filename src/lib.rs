//! Imports browsing data from a Chromium profile directory.
//!
//! [`ChromeImporter`] reads history, bookmarks with favicons, cookies and
//! saved logins from a profile on disk and hands them to an
//! [`ImporterBridge`]. The source profile is never modified.

pub mod bridge;
pub mod cancel;
pub mod data_types;
pub mod error;
pub mod importer;
pub mod items;
pub mod keyring;
pub mod profile;
pub mod time;

pub use bridge::{BridgeEvent, CollectingBridge, ImporterBridge, VisitSource, IMPORTED_BOOKMARKS_FOLDER};
pub use cancel::{Cancellation, CancellationFlag};
pub use data_types::{
    BookmarkEntry, CookieEntry, FaviconData, FaviconUsage, HistoryEntry, PasswordForm, PasswordScheme,
};
pub use error::{ImportError, Result};
pub use importer::{ChromeImporter, ImportSummary};
pub use items::{ImportItem, ImportItems};
pub use keyring::{PasswordStoreType, PasswordStrategy, SecretBackendKind};
pub use profile::SourceProfile;
pub use time::chrome_time_to_double;
