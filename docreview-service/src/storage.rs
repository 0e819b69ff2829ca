//! Storage collaborator for asset listing and result reads.
//!
//! The review service only needs three operations from storage: list the
//! files under a folder, read a file as text, and read a file as bytes.
//! `StorageProvider` captures that seam so blob-backed deployments can plug
//! in their own client; `LocalStorageProvider` serves deployments that mount
//! containers as directories, and the tests.

use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::StorageError;

/// A single file entry from a storage listing
#[derive(Debug, Clone, Serialize)]
pub struct StorageEntry {
    /// Name relative to the storage root, with `/` separators.
    pub name: String,
    pub size: u64,
    pub last_modified: Option<DateTime<Utc>>,
}

#[async_trait]
pub trait StorageProvider: Send + Sync {
    /// List all files under `folder` (recursively), names relative to the
    /// storage root. An empty folder lists the whole root.
    async fn list_files(&self, folder: &str) -> Result<Vec<StorageEntry>, StorageError>;

    /// Read a file as text. With `suppress_not_found`, a missing file
    /// resolves to `Ok(None)` instead of an error.
    async fn read_text(
        &self,
        name: &str,
        suppress_not_found: bool,
    ) -> Result<Option<String>, StorageError>;

    /// Read a file as raw bytes.
    async fn read_bytes(&self, name: &str) -> Result<Vec<u8>, StorageError>;
}

/// Storage provider over a local directory tree
pub struct LocalStorageProvider {
    root: PathBuf,
}

impl LocalStorageProvider {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Resolve a storage name to a path under the root. Names must be
    /// relative and must not climb out of the root.
    fn resolve(&self, name: &str) -> Result<PathBuf, StorageError> {
        let rel = Path::new(name);
        let escapes = rel.components().any(|c| {
            matches!(
                c,
                Component::ParentDir | Component::RootDir | Component::Prefix(_)
            )
        });
        if escapes {
            return Err(StorageError::InvalidName {
                name: name.to_string(),
            });
        }
        Ok(self.root.join(rel))
    }
}

#[async_trait]
impl StorageProvider for LocalStorageProvider {
    async fn list_files(&self, folder: &str) -> Result<Vec<StorageEntry>, StorageError> {
        let listing_error = |source: std::io::Error| StorageError::Listing {
            folder: folder.to_string(),
            source,
        };

        let base = self.resolve(folder)?;
        let mut entries = Vec::new();
        let mut pending = vec![base];

        while let Some(dir) = pending.pop() {
            let mut read_dir = tokio::fs::read_dir(&dir).await.map_err(listing_error)?;
            while let Some(entry) = read_dir.next_entry().await.map_err(listing_error)? {
                let path = entry.path();
                let metadata = entry.metadata().await.map_err(listing_error)?;
                if metadata.is_dir() {
                    pending.push(path);
                    continue;
                }
                let name = path
                    .strip_prefix(&self.root)
                    .unwrap_or(&path)
                    .to_string_lossy()
                    .replace('\\', "/");
                entries.push(StorageEntry {
                    name,
                    size: metadata.len(),
                    last_modified: metadata.modified().ok().map(DateTime::<Utc>::from),
                });
            }
        }

        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }

    async fn read_text(
        &self,
        name: &str,
        suppress_not_found: bool,
    ) -> Result<Option<String>, StorageError> {
        let path = self.resolve(name)?;
        match tokio::fs::read_to_string(&path).await {
            Ok(text) => Ok(Some(text)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                if suppress_not_found {
                    Ok(None)
                } else {
                    Err(StorageError::NotFound {
                        name: name.to_string(),
                    })
                }
            }
            Err(e) => Err(StorageError::Read {
                name: name.to_string(),
                source: e,
            }),
        }
    }

    async fn read_bytes(&self, name: &str) -> Result<Vec<u8>, StorageError> {
        let path = self.resolve(name)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(StorageError::NotFound {
                name: name.to_string(),
            }),
            Err(e) => Err(StorageError::Read {
                name: name.to_string(),
                source: e,
            }),
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! In-memory storage provider for unit tests.

    use std::collections::HashMap;
    use std::time::Duration;

    use super::*;

    pub struct MemoryStorage {
        files: HashMap<String, Vec<u8>>,
        /// Artificial latency applied to every read, for staleness tests.
        pub read_delay: Option<Duration>,
    }

    impl MemoryStorage {
        pub fn new() -> Self {
            Self {
                files: HashMap::new(),
                read_delay: None,
            }
        }

        pub fn with_file(mut self, name: &str, bytes: impl Into<Vec<u8>>) -> Self {
            self.files.insert(name.to_string(), bytes.into());
            self
        }

        pub fn with_read_delay(mut self, delay: Duration) -> Self {
            self.read_delay = Some(delay);
            self
        }

        async fn simulate_latency(&self) {
            if let Some(delay) = self.read_delay {
                tokio::time::sleep(delay).await;
            }
        }
    }

    #[async_trait]
    impl StorageProvider for MemoryStorage {
        async fn list_files(&self, folder: &str) -> Result<Vec<StorageEntry>, StorageError> {
            let prefix = if folder.is_empty() {
                String::new()
            } else {
                format!("{folder}/")
            };
            let mut entries: Vec<StorageEntry> = self
                .files
                .iter()
                .filter(|(name, _)| name.starts_with(&prefix))
                .map(|(name, bytes)| StorageEntry {
                    name: name.clone(),
                    size: bytes.len() as u64,
                    last_modified: None,
                })
                .collect();
            entries.sort_by(|a, b| a.name.cmp(&b.name));
            Ok(entries)
        }

        async fn read_text(
            &self,
            name: &str,
            suppress_not_found: bool,
        ) -> Result<Option<String>, StorageError> {
            self.simulate_latency().await;
            match self.files.get(name) {
                Some(bytes) => Ok(Some(String::from_utf8_lossy(bytes).into_owned())),
                None if suppress_not_found => Ok(None),
                None => Err(StorageError::NotFound {
                    name: name.to_string(),
                }),
            }
        }

        async fn read_bytes(&self, name: &str) -> Result<Vec<u8>, StorageError> {
            self.simulate_latency().await;
            self.files
                .get(name)
                .cloned()
                .ok_or_else(|| StorageError::NotFound {
                    name: name.to_string(),
                })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn populate(root: &Path) {
        std::fs::create_dir_all(root.join("invoices/archive")).unwrap();
        std::fs::write(root.join("invoices/a.png"), b"png").unwrap();
        std::fs::write(root.join("invoices/a.png.invoice.json"), b"{}").unwrap();
        std::fs::write(root.join("invoices/archive/old.png"), b"png").unwrap();
        std::fs::write(root.join("top.pdf"), b"pdf").unwrap();
    }

    #[tokio::test]
    async fn test_list_files_is_recursive_and_relative() {
        let dir = tempfile::tempdir().unwrap();
        populate(dir.path());
        let storage = LocalStorageProvider::new(dir.path());

        let entries = storage.list_files("").await.unwrap();
        let names: Vec<&str> = entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "invoices/a.png",
                "invoices/a.png.invoice.json",
                "invoices/archive/old.png",
                "top.pdf",
            ]
        );

        let scoped = storage.list_files("invoices").await.unwrap();
        assert_eq!(scoped.len(), 3);
        assert!(scoped.iter().all(|e| e.name.starts_with("invoices/")));
    }

    #[tokio::test]
    async fn test_read_text_suppresses_not_found_when_asked() {
        let dir = tempfile::tempdir().unwrap();
        populate(dir.path());
        let storage = LocalStorageProvider::new(dir.path());

        let found = storage
            .read_text("invoices/a.png.invoice.json", true)
            .await
            .unwrap();
        assert_eq!(found.as_deref(), Some("{}"));

        let missing = storage.read_text("invoices/missing.json", true).await;
        assert!(matches!(missing, Ok(None)));

        let missing_strict = storage.read_text("invoices/missing.json", false).await;
        assert!(matches!(
            missing_strict,
            Err(StorageError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_names_cannot_escape_the_root() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalStorageProvider::new(dir.path());

        let escape = storage.read_bytes("../etc/passwd").await;
        assert!(matches!(escape, Err(StorageError::InvalidName { .. })));

        let absolute = storage.read_bytes("/etc/passwd").await;
        assert!(matches!(absolute, Err(StorageError::InvalidName { .. })));
    }
}
