//! Import item selection.
//!
//! Mirrors the host browser's importer item bits so a caller can pass its own
//! mask straight through.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{BitOr, BitOrAssign};
use std::str::FromStr;

/// One kind of data the importer can bring over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ImportItem {
    History,
    Favorites,
    Cookies,
    Passwords,
}

impl ImportItem {
    /// Phase order used by the orchestrator.
    pub const ORDERED: [ImportItem; 4] = [
        ImportItem::History,
        ImportItem::Favorites,
        ImportItem::Cookies,
        ImportItem::Passwords,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            ImportItem::History => "history",
            ImportItem::Favorites => "bookmarks",
            ImportItem::Cookies => "cookies",
            ImportItem::Passwords => "passwords",
        }
    }

    pub fn bit(&self) -> u16 {
        match self {
            ImportItem::History => ImportItems::HISTORY.0,
            ImportItem::Favorites => ImportItems::FAVORITES.0,
            ImportItem::Cookies => ImportItems::COOKIES.0,
            ImportItem::Passwords => ImportItems::PASSWORDS.0,
        }
    }
}

impl fmt::Display for ImportItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Bitmask of requested items.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ImportItems(u16);

impl ImportItems {
    pub const NONE: ImportItems = ImportItems(0);
    pub const HISTORY: ImportItems = ImportItems(1 << 0);
    pub const FAVORITES: ImportItems = ImportItems(1 << 1);
    pub const COOKIES: ImportItems = ImportItems(1 << 2);
    pub const PASSWORDS: ImportItems = ImportItems(1 << 3);
    pub const ALL: ImportItems = ImportItems((1 << 0) | (1 << 1) | (1 << 2) | (1 << 3));

    pub fn from_bits(bits: u16) -> Self {
        ImportItems(bits)
    }

    pub fn bits(&self) -> u16 {
        self.0
    }

    pub fn contains(&self, item: ImportItem) -> bool {
        self.0 & item.bit() != 0
    }

    pub fn is_empty(&self) -> bool {
        self.0 & Self::ALL.0 == 0
    }

    /// Requested items in phase order.
    pub fn iter(&self) -> impl Iterator<Item = ImportItem> + '_ {
        ImportItem::ORDERED
            .into_iter()
            .filter(move |item| self.contains(*item))
    }

    pub fn description(&self) -> String {
        let names: Vec<&str> = self.iter().map(|item| item.name()).collect();
        if names.is_empty() {
            "nothing".to_string()
        } else {
            names.join(", ")
        }
    }
}

impl From<ImportItem> for ImportItems {
    fn from(item: ImportItem) -> Self {
        ImportItems(item.bit())
    }
}

impl BitOr for ImportItems {
    type Output = ImportItems;

    fn bitor(self, rhs: Self) -> Self::Output {
        ImportItems(self.0 | rhs.0)
    }
}

impl BitOrAssign for ImportItems {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl FromStr for ImportItems {
    type Err = String;

    /// Comma-separated names, e.g. `history,bookmarks` or `all`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut items = ImportItems::NONE;
        for part in s.split(',') {
            let part = part.trim().to_lowercase();
            items |= match part.as_str() {
                "" => continue,
                "all" => ImportItems::ALL,
                "history" => ImportItems::HISTORY,
                "bookmarks" | "favorites" | "favicons" => ImportItems::FAVORITES,
                "cookies" => ImportItems::COOKIES,
                "passwords" | "logins" => ImportItems::PASSWORDS,
                other => return Err(format!("unknown import item: {}", other)),
            };
        }
        if items.is_empty() {
            return Err("no import items selected".to_string());
        }
        Ok(items)
    }
}
