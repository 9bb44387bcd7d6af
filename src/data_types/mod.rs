//! Record types produced by the importer and the readers that build them.
//!
//! Supports: history, bookmarks, favicons, cookies, passwords

pub mod bookmark;
pub mod cookie;
pub mod favicon;
pub mod history;
pub mod password;

pub use bookmark::{parse_bookmarks, read_bookmarks, BookmarkEntry};
pub use cookie::{read_cookies, CookieEntry};
pub use favicon::{read_favicons, reencode_favicon, FaviconData, FaviconReencoder, FaviconUsage};
pub use history::{read_history, HistoryEntry};
pub use password::{LoginDatabase, PasswordForm, PasswordScheme};
