//! Bookmarks JSON reader.
//!
//! The tree is flattened depth-first. Each entry keeps the titles of its
//! ancestors (the root's own name included) so the destination can rebuild
//! the folder structure.

use crate::cancel::Cancellation;
use crate::error::{ImportError, Result};
use crate::profile::{SourceProfile, BOOKMARKS_FILE};
use crate::time::chrome_time_to_double;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs;
use tracing::debug;

/// One flattened bookmark or folder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookmarkEntry {
    /// Titles of the strict ancestors, outermost first.
    pub path: Vec<String>,
    pub title: String,
    /// Empty for folders.
    pub url: String,
    pub is_folder: bool,
    pub in_toolbar: bool,
    /// Unix seconds.
    pub creation_time: f64,
}

/// A child node waiting to be visited.
struct Pending<'a> {
    node: &'a Value,
    parent_path: Vec<String>,
    under_toolbar: bool,
    depth: usize,
}

/// Load and flatten `Bookmarks`.
pub fn read_bookmarks(profile: &SourceProfile, cancel: &dyn Cancellation) -> Result<Vec<BookmarkEntry>> {
    let path = profile.file(BOOKMARKS_FILE);
    if !path.exists() {
        return Err(ImportError::MissingSource(path));
    }
    let content = fs::read_to_string(&path).map_err(|e| ImportError::open(&path, e))?;
    let json: Value = serde_json::from_str(&content).map_err(|e| ImportError::parse(&path, e))?;
    if !json.is_object() {
        return Err(ImportError::parse(&path, "top level is not an object"));
    }
    Ok(parse_bookmarks(&json, cancel))
}

/// Flatten `roots.bookmark_bar` followed by `roots.other`.
///
/// Toolbar flag: every URL under `bookmark_bar` is in the toolbar, but only
/// folders directly under it are; deeper folders are always `false`.
///
/// A node whose `date_added` is missing or not an integer is skipped, and for
/// a folder so is everything below it.
pub fn parse_bookmarks(json: &Value, cancel: &dyn Cancellation) -> Vec<BookmarkEntry> {
    let mut bookmarks = Vec::new();
    let Some(roots) = json.get("roots").filter(|v| v.is_object()) else {
        return bookmarks;
    };

    for (key, under_toolbar) in [("bookmark_bar", true), ("other", false)] {
        let Some(root) = roots.get(key).filter(|v| v.is_object()) else {
            continue;
        };
        let name = root.get("name").and_then(Value::as_str).unwrap_or_default();
        if !walk_folder(root, vec![name.to_string()], under_toolbar, cancel, &mut bookmarks) {
            break;
        }
    }

    bookmarks
}

/// Returns `false` if the walk stopped on cancellation.
fn walk_folder(
    root: &Value,
    root_path: Vec<String>,
    under_toolbar: bool,
    cancel: &dyn Cancellation,
    out: &mut Vec<BookmarkEntry>,
) -> bool {
    let mut stack = Vec::new();
    push_children(&mut stack, root, &root_path, under_toolbar, 1);

    while let Some(pending) = stack.pop() {
        if cancel.is_cancelled() {
            return false;
        }
        let Some(child) = pending.node.as_object() else {
            continue;
        };

        let kind = child.get("type").and_then(Value::as_str).unwrap_or_default();
        if kind != "folder" && kind != "url" {
            continue;
        }

        let title = child.get("name").and_then(Value::as_str).unwrap_or_default();
        let Some(date_added) = parse_date_added(child.get("date_added")) else {
            debug!(
                "{}",
                ImportError::RecordDecodeFailure(format!(
                    "bookmark {:?} has no usable date_added",
                    title
                ))
            );
            continue;
        };

        if kind == "folder" {
            out.push(BookmarkEntry {
                path: pending.parent_path.clone(),
                title: title.to_string(),
                url: String::new(),
                is_folder: true,
                in_toolbar: pending.under_toolbar && pending.depth == 1,
                creation_time: chrome_time_to_double(date_added),
            });

            let mut path = pending.parent_path;
            path.push(title.to_string());
            push_children(&mut stack, pending.node, &path, pending.under_toolbar, pending.depth + 1);
        } else {
            out.push(BookmarkEntry {
                path: pending.parent_path,
                title: title.to_string(),
                url: child.get("url").and_then(Value::as_str).unwrap_or_default().to_string(),
                is_folder: false,
                // Any URL under the bookmarks bar counts as on the toolbar,
                // however deep; only folders stop at depth one.
                in_toolbar: pending.under_toolbar,
                creation_time: chrome_time_to_double(date_added),
            });
        }
    }

    true
}

// Reverse push so children pop in document order.
fn push_children<'a>(
    stack: &mut Vec<Pending<'a>>,
    folder: &'a Value,
    path: &[String],
    under_toolbar: bool,
    depth: usize,
) {
    let Some(children) = folder.get("children").and_then(Value::as_array) else {
        return;
    };
    for node in children.iter().rev() {
        stack.push(Pending {
            node,
            parent_path: path.to_vec(),
            under_toolbar,
            depth,
        });
    }
}

fn parse_date_added(value: Option<&Value>) -> Option<i64> {
    match value? {
        Value::String(s) => s.trim().parse::<i64>().ok(),
        Value::Number(n) => n.as_i64(),
        _ => None,
    }
}
