//! Favicon reader.
//!
//! Works in two passes over `Favicons`: first collect which pages use each
//! icon, then resolve each icon's row into either embedded PNG bytes or a
//! remote icon URL.

use crate::cancel::Cancellation;
use crate::error::{ImportError, Result};
use crate::profile::{SourceProfile, FAVICONS_FILE};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use image::imageops::FilterType;
use image::ImageFormat;
use rusqlite::types::ValueRef;
use rusqlite::OptionalExtension;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::io::Cursor;
use tracing::debug;
use url::Url;

/// Edge length favicons are downscaled to.
pub const FAVICON_SIZE: u32 = 16;

/// Turns raw favicon bytes into PNG bytes, or `None` if they cannot be decoded.
pub type FaviconReencoder = dyn Fn(&[u8]) -> Option<Vec<u8>> + Send + Sync;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FaviconData {
    Png(Vec<u8>),
    Remote(String),
}

/// An icon and the pages that show it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FaviconUsage {
    /// Never empty.
    pub urls: BTreeSet<String>,
    pub data: FaviconData,
}

pub fn read_favicons(
    profile: &SourceProfile,
    reencode: &FaviconReencoder,
    cancel: &dyn Cancellation,
) -> Result<Vec<FaviconUsage>> {
    let store = profile.open_store(FAVICONS_FILE)?;
    let path = profile.file(FAVICONS_FILE);
    let conn = store.conn();

    let mut icon_pages: BTreeMap<i64, BTreeSet<String>> = BTreeMap::new();
    {
        let mut stmt = conn
            .prepare("SELECT icon_id, page_url FROM icon_mapping")
            .map_err(|e| ImportError::open(&path, e))?;
        let rows = stmt
            .query_map([], |row| Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?)))
            .map_err(|e| ImportError::open(&path, e))?;
        for row in rows {
            if cancel.is_cancelled() {
                return Ok(Vec::new());
            }
            match row {
                Ok((icon_id, page_url)) => {
                    icon_pages.entry(icon_id).or_default().insert(page_url);
                }
                Err(e) => debug!("Skipping icon_mapping row: {}", e),
            }
        }
    }

    let mut stmt = conn
        .prepare("SELECT url FROM favicons WHERE id = ?1")
        .map_err(|e| ImportError::open(&path, e))?;

    let mut favicons = Vec::new();
    for (icon_id, urls) in icon_pages {
        if cancel.is_cancelled() {
            break;
        }
        let raw = stmt
            .query_row([icon_id], |row| {
                Ok(match row.get_ref(0)? {
                    ValueRef::Text(bytes) | ValueRef::Blob(bytes) => Some(bytes.to_vec()),
                    _ => None,
                })
            })
            .optional();
        let raw = match raw {
            Ok(Some(Some(raw))) => raw,
            Ok(_) => continue,
            Err(e) => {
                debug!("Favicon {} lookup failed: {}", icon_id, e);
                continue;
            }
        };

        match classify_icon(&raw, reencode) {
            Ok(data) => favicons.push(FaviconUsage { urls, data }),
            Err(e) => debug!("Favicon {}: {}", icon_id, e),
        }
    }

    Ok(favicons)
}

fn classify_icon(raw: &[u8], reencode: &FaviconReencoder) -> Result<FaviconData> {
    let text = String::from_utf8_lossy(raw);
    let url = Url::parse(&text)
        .map_err(|e| ImportError::RecordDecodeFailure(format!("invalid icon url: {}", e)))?;

    if url.scheme() != "data" {
        return Ok(FaviconData::Remote(url.to_string()));
    }
    if data_url_payload(raw).is_some_and(|payload| payload.is_empty()) {
        return Err(ImportError::RecordDecodeFailure("empty icon data".to_string()));
    }
    reencode(raw)
        .map(FaviconData::Png)
        .ok_or_else(|| ImportError::RecordDecodeFailure("undecodable icon data".to_string()))
}

/// Default re-encoder: accepts raw image bytes or a `data:` URL, decodes with
/// `image`, shrinks to at most 16×16 and writes PNG.
pub fn reencode_favicon(bytes: &[u8]) -> Option<Vec<u8>> {
    let payload = match data_url_payload(bytes) {
        Some(payload) => payload,
        None => bytes.to_vec(),
    };
    if payload.is_empty() {
        return None;
    }

    let mut img = image::load_from_memory(&payload).ok()?;
    if img.width() > FAVICON_SIZE || img.height() > FAVICON_SIZE {
        img = img.resize(FAVICON_SIZE, FAVICON_SIZE, FilterType::Lanczos3);
    }

    let mut out = Cursor::new(Vec::new());
    img.write_to(&mut out, ImageFormat::Png).ok()?;
    Some(out.into_inner())
}

fn data_url_payload(bytes: &[u8]) -> Option<Vec<u8>> {
    let rest = bytes.strip_prefix(b"data:")?;
    let comma = rest.iter().position(|&b| b == b',')?;
    let (header, body) = (&rest[..comma], &rest[comma + 1..]);

    if header.ends_with(b";base64") {
        let cleaned: Vec<u8> = body.iter().copied().filter(|b| !b.is_ascii_whitespace()).collect();
        STANDARD.decode(cleaned).ok()
    } else {
        Some(percent_decode(body))
    }
}

fn percent_decode(input: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(input.len());
    let mut i = 0;
    while i < input.len() {
        if input[i] == b'%' && i + 2 < input.len() {
            let hex = std::str::from_utf8(&input[i + 1..i + 3]).ok();
            if let Some(byte) = hex.and_then(|h| u8::from_str_radix(h, 16).ok()) {
                out.push(byte);
                i += 3;
                continue;
            }
        }
        out.push(input[i]);
        i += 1;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cancel::CancellationFlag;
    use image::{DynamicImage, RgbaImage};
    use rusqlite::{params, Connection};

    fn png_bytes(size: u32) -> Vec<u8> {
        let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(size, size, image::Rgba([200, 30, 30, 255])));
        let mut out = Cursor::new(Vec::new());
        img.write_to(&mut out, ImageFormat::Png).unwrap();
        out.into_inner()
    }

    fn stub_reencode(bytes: &[u8]) -> Option<Vec<u8>> {
        if bytes.ends_with(b"broken") {
            None
        } else {
            Some(b"PNG".to_vec())
        }
    }

    #[test]
    fn test_reencode_data_url_downscales() {
        let data_url = format!("data:image/png;base64,{}", STANDARD.encode(png_bytes(32)));
        let png = reencode_favicon(data_url.as_bytes()).unwrap();
        let decoded = image::load_from_memory(&png).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (16, 16));
    }

    #[test]
    fn test_reencode_rejects_garbage() {
        assert!(reencode_favicon(b"data:image/png;base64,!!!").is_none());
        assert!(reencode_favicon(b"not an image").is_none());
        assert!(reencode_favicon(b"").is_none());
    }

    #[test]
    fn test_percent_decode() {
        assert_eq!(percent_decode(b"a%20b%zz%4"), b"a b%zz%4".to_vec());
    }

    #[test]
    fn test_data_url_without_payload_is_rejected() {
        for raw in [&b"data:image/png;base64,"[..], b"data:image/png,"] {
            let err = classify_icon(raw, &stub_reencode).unwrap_err();
            assert!(matches!(err, ImportError::RecordDecodeFailure(ref m) if m == "empty icon data"));
        }
        assert!(matches!(
            classify_icon(b"data:image/png;base64,AAAA", &stub_reencode),
            Ok(FaviconData::Png(_))
        ));
    }

    #[test]
    fn test_classification() {
        let dir = tempfile::tempdir().unwrap();
        {
            let conn = Connection::open(dir.path().join(FAVICONS_FILE)).unwrap();
            conn.execute_batch(
                "CREATE TABLE icon_mapping (id INTEGER PRIMARY KEY, page_url LONGVARCHAR NOT NULL, icon_id INTEGER);
                 CREATE TABLE favicons (id INTEGER PRIMARY KEY, url LONGVARCHAR NOT NULL, icon_type INTEGER DEFAULT 1);",
            )
            .unwrap();
            let icons: [(i64, &[u8]); 5] = [
                (1, b"https://www.rust-lang.org/favicon.ico"),
                (2, b"data:image/png;base64,AAAA"),
                (3, b"data:image/png;base64,broken"),
                (4, b"not a url"),
                (5, b"https://orphan.example/favicon.ico"),
            ];
            for (id, url) in icons {
                conn.execute("INSERT INTO favicons (id, url) VALUES (?1, ?2)", params![id, url])
                    .unwrap();
            }
            let mappings = [
                (1, "https://www.rust-lang.org/"),
                (1, "https://www.rust-lang.org/learn"),
                (2, "https://inline.example/"),
                (3, "https://broken.example/"),
                (4, "https://invalid.example/"),
                (9, "https://no-icon-row.example/"),
            ];
            for (icon_id, page) in mappings {
                conn.execute(
                    "INSERT INTO icon_mapping (page_url, icon_id) VALUES (?1, ?2)",
                    params![page, icon_id],
                )
                .unwrap();
            }
        }

        let favicons = read_favicons(
            &SourceProfile::new(dir.path()),
            &stub_reencode,
            &CancellationFlag::new(),
        )
        .unwrap();

        assert_eq!(favicons.len(), 2);
        assert_eq!(
            favicons[0].data,
            FaviconData::Remote("https://www.rust-lang.org/favicon.ico".to_string())
        );
        assert_eq!(favicons[0].urls.len(), 2);
        assert_eq!(favicons[1].data, FaviconData::Png(b"PNG".to_vec()));
        assert!(favicons[1].urls.contains("https://inline.example/"));
    }
}
