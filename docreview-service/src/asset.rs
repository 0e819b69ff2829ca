//! Document assets available for review.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::storage::StorageEntry;

/// Kind of a reviewable document asset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AssetKind {
    Image,
    Tiff,
    Pdf,
}

impl AssetKind {
    /// Classify a file by extension. Returns `None` for files that are not
    /// reviewable assets (including analysis result files themselves).
    pub fn from_name(name: &str) -> Option<Self> {
        let extension = std::path::Path::new(name)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase())
            .unwrap_or_default();

        match extension.as_str() {
            "jpg" | "jpeg" | "png" | "bmp" => Some(AssetKind::Image),
            "tif" | "tiff" => Some(AssetKind::Tiff),
            "pdf" => Some(AssetKind::Pdf),
            _ => None,
        }
    }
}

/// A document entry available for review
#[derive(Debug, Clone, Serialize)]
pub struct Asset {
    pub id: String,
    /// Percent-decoded name relative to the storage root.
    pub name: String,
    /// Storage key used for reads (as listed, undecoded).
    pub path: String,
    pub kind: AssetKind,
    pub last_modified: Option<DateTime<Utc>>,
}

/// True when `asset_name` sits exactly one path segment below `folder`.
/// Files in nested subfolders do not qualify.
pub fn is_in_exact_folder(asset_name: &str, folder: &str) -> bool {
    if folder.is_empty() {
        return !asset_name.contains('/');
    }

    let prefix = format!("{folder}/");
    asset_name.starts_with(&prefix) && asset_name.rfind('/') == Some(folder.len())
}

/// Build the reviewable asset list from a storage listing: decode
/// percent-encoding in names, keep only files directly inside `folder`,
/// and keep only supported asset kinds.
pub fn assets_from_listing(entries: Vec<StorageEntry>, folder: &str) -> Vec<Asset> {
    entries
        .into_iter()
        .filter_map(|entry| {
            let name = urlencoding::decode(&entry.name)
                .map(|decoded| decoded.into_owned())
                .unwrap_or_else(|_| entry.name.clone());
            if !is_in_exact_folder(&name, folder) {
                return None;
            }
            let kind = AssetKind::from_name(&name)?;
            Some(Asset {
                id: Uuid::new_v4().to_string(),
                name,
                path: entry.name,
                kind,
                last_modified: entry.last_modified,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(name: &str) -> StorageEntry {
        StorageEntry {
            name: name.to_string(),
            size: 0,
            last_modified: None,
        }
    }

    #[test]
    fn test_exact_folder_filtering() {
        assert!(is_in_exact_folder("a/b.png", "a"));
        assert!(is_in_exact_folder("a/e.png", "a"));
        assert!(!is_in_exact_folder("a/c/d.png", "a"));
        assert!(!is_in_exact_folder("b/x.png", "a"));
        assert!(!is_in_exact_folder("ab/x.png", "a"));
    }

    #[test]
    fn test_empty_folder_matches_root_files_only() {
        assert!(is_in_exact_folder("x.png", ""));
        assert!(!is_in_exact_folder("a/x.png", ""));
    }

    #[test]
    fn test_kind_from_extension() {
        assert_eq!(AssetKind::from_name("scan.PNG"), Some(AssetKind::Image));
        assert_eq!(AssetKind::from_name("scan.jpeg"), Some(AssetKind::Image));
        assert_eq!(AssetKind::from_name("scan.tif"), Some(AssetKind::Tiff));
        assert_eq!(AssetKind::from_name("doc.pdf"), Some(AssetKind::Pdf));
        assert_eq!(AssetKind::from_name("doc.pdf.invoice.json"), None);
        assert_eq!(AssetKind::from_name("noextension"), None);
    }

    #[test]
    fn test_listing_decodes_and_filters() {
        let entries = vec![
            entry("a/b.png"),
            entry("a/c/d.png"),
            entry("a/e.png"),
            entry("a/report%20final.pdf"),
            entry("a/b.png.invoice.json"),
        ];

        let assets = assets_from_listing(entries, "a");
        let names: Vec<&str> = assets.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, vec!["a/b.png", "a/e.png", "a/report final.pdf"]);

        // Storage keys keep the undecoded form for reads.
        assert_eq!(assets[2].path, "a/report%20final.pdf");
        assert_eq!(assets[2].kind, AssetKind::Pdf);
    }
}
