use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::category::extension_of;
use super::paths::{check_file_name, contained_path, ensure_inside};
use super::{Category, PathStore, Result, StorageError};

/// One file in a category directory, as listed by the gallery endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputEntry {
    pub name: String,
    /// Local reference path for the file proxy route.
    pub path: String,
    pub category: Category,
    #[serde(rename = "size")]
    pub size_bytes: u64,
    #[serde(rename = "mtime", with = "unix_seconds")]
    pub modified: DateTime<Utc>,
    /// Upper-cased extension, or `UNKNOWN`.
    #[serde(rename = "type")]
    pub extension: String,
}

/// Parsed `/<prefix>/<category>/<file>` reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalRef {
    pub category: Category,
    pub file_name: String,
}

impl LocalRef {
    pub fn parse(reference: &str, prefix: &str) -> Result<Self> {
        let illegal = || StorageError::IllegalReference(reference.to_string());

        let trimmed = reference.trim_matches('/');
        let mut parts = trimmed.splitn(3, '/');
        let (Some(head), Some(category), Some(file_name)) = (parts.next(), parts.next(), parts.next())
        else {
            return Err(illegal());
        };

        if head != prefix {
            return Err(illegal());
        }

        let category: Category = category.parse().map_err(|_| illegal())?;
        check_file_name(file_name)?;

        Ok(Self {
            category,
            file_name: file_name.to_string(),
        })
    }
}

impl PathStore {
    /// Regular, non-hidden files of `category`, most recently modified first.
    /// A directory that does not exist lists as empty.
    pub async fn list_entries(&self, category: Category) -> Result<Vec<OutputEntry>> {
        let dir = self.resolve(category).await;

        let mut reader = match tokio::fs::read_dir(&dir).await {
            Ok(reader) => reader,
            Err(e) => {
                let is_dir = tokio::fs::metadata(&dir)
                    .await
                    .map(|metadata| metadata.is_dir())
                    .unwrap_or(false);
                if !is_dir {
                    debug!(%category, path = %dir.display(), "Output directory missing, listing empty");
                    return Ok(Vec::new());
                }
                return Err(e.into());
            }
        };

        let mut entries = Vec::new();
        while let Some(entry) = reader.next_entry().await? {
            let Some(name) = entry.file_name().to_str().map(str::to_owned) else {
                continue;
            };
            if name.starts_with('.') {
                continue;
            }

            let metadata = match tokio::fs::metadata(entry.path()).await {
                Ok(metadata) => metadata,
                Err(e) => {
                    debug!(file = %name, error = %e, "Skipping unreadable entry");
                    continue;
                }
            };
            if !metadata.is_file() {
                continue;
            }

            let modified = metadata
                .modified()
                .map(DateTime::<Utc>::from)
                .unwrap_or(DateTime::UNIX_EPOCH);
            let extension = extension_of(&name)
                .map(str::to_uppercase)
                .unwrap_or_else(|| "UNKNOWN".to_string());

            entries.push(OutputEntry {
                path: self.reference(category, &name),
                name,
                category,
                size_bytes: metadata.len(),
                modified,
                extension,
            });
        }

        entries.sort_by(|a, b| b.modified.cmp(&a.modified));
        Ok(entries)
    }

    /// Overwrite the file behind a local reference path.
    ///
    /// The reference is validated before the category directory is touched;
    /// anything that would land outside it is rejected.
    pub async fn update_content(&self, reference: &str, content: &str) -> Result<PathBuf> {
        let local = LocalRef::parse(reference, self.proxy_prefix())?;

        let dir = self.resolve(local.category).await;
        let target = contained_path(&dir, &local.file_name)?;
        ensure_inside(&dir, &target).await?;

        tokio::fs::write(&target, content).await?;

        info!(category = %local.category, file = %local.file_name, "File content updated");
        Ok(target)
    }

    /// Path of an existing file in `category`, for the file proxy route.
    pub async fn open_file(&self, category: Category, file_name: &str) -> Result<PathBuf> {
        check_file_name(file_name)?;

        let dir = self.resolve(category).await;
        let target = contained_path(&dir, file_name)?;
        ensure_inside(&dir, &target).await?;

        match tokio::fs::metadata(&target).await {
            Ok(metadata) if metadata.is_file() => Ok(target),
            _ => Err(StorageError::NotFound(self.reference(category, file_name))),
        }
    }
}

/// Float seconds since the epoch, which is what the dashboard expects.
mod unix_seconds {
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer, de::Error};

    pub fn serialize<S: Serializer>(value: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(value.timestamp_millis() as f64 / 1000.0)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        let seconds = f64::deserialize(deserializer)?;
        DateTime::from_timestamp_millis((seconds * 1000.0).round() as i64)
            .ok_or_else(|| D::Error::custom(format!("timestamp out of range: {seconds}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::StorageLayout;
    use std::time::{Duration, SystemTime};
    use tempfile::TempDir;

    fn store(temp: &TempDir) -> PathStore {
        PathStore::open(StorageLayout::new(temp.path()))
    }

    fn touch(path: &std::path::Path, contents: &[u8], age: Duration) {
        std::fs::write(path, contents).unwrap();
        let file = std::fs::File::options().write(true).open(path).unwrap();
        file.set_modified(SystemTime::now() - age).unwrap();
    }

    #[test]
    fn parse_reference() {
        let local = LocalRef::parse("/outputs_proxy/texts/abc.txt", "outputs_proxy").unwrap();
        assert_eq!(local.category, Category::Texts);
        assert_eq!(local.file_name, "abc.txt");
    }

    #[test]
    fn parse_reference_rejects_malformed_input() {
        let prefix = "outputs_proxy";
        assert!(LocalRef::parse("/outputs_proxy/texts", prefix).is_err());
        assert!(LocalRef::parse("/other/texts/a.txt", prefix).is_err());
        assert!(LocalRef::parse("/outputs_proxy/nope/a.txt", prefix).is_err());
        assert!(LocalRef::parse("/outputs_proxy/../../etc/passwd", prefix).is_err());
        assert!(matches!(
            LocalRef::parse("/outputs_proxy/texts/../../etc/passwd", prefix),
            Err(StorageError::PathEscape(_))
        ));
    }

    #[tokio::test]
    async fn lists_newest_first_and_skips_hidden() {
        let temp = TempDir::new().unwrap();
        let store = store(&temp);
        let dir = store.resolve(Category::Images).await;

        touch(&dir.join("old.png"), b"old", Duration::from_secs(300));
        touch(&dir.join("new.jpg"), b"newer!", Duration::from_secs(10));
        touch(&dir.join(".hidden.png"), b"h", Duration::from_secs(1));
        std::fs::create_dir(dir.join("nested")).unwrap();

        let entries = store.list_entries(Category::Images).await.unwrap();
        let names: Vec<_> = entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["new.jpg", "old.png"]);

        assert_eq!(entries[0].size_bytes, 6);
        assert_eq!(entries[0].extension, "JPG");
        assert_eq!(entries[0].path, "/outputs_proxy/images/new.jpg");
    }

    #[tokio::test]
    async fn empty_directory_lists_nothing() {
        let temp = TempDir::new().unwrap();
        let entries = store(&temp).list_entries(Category::Audios).await.unwrap();
        assert!(entries.is_empty());
    }

    #[tokio::test]
    async fn unavailable_directory_lists_nothing() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("blocked"), b"x").unwrap();

        let store = store(&temp);
        let mapping = crate::storage::PathMapping::from([(
            "audios".to_string(),
            "blocked/audios".to_string(),
        )]);
        store.set_paths(mapping).await.unwrap();

        let entries = store.list_entries(Category::Audios).await.unwrap();
        assert!(entries.is_empty());
        assert_eq!(store.unwritable(), vec![Category::Audios]);
    }

    #[tokio::test]
    async fn update_content_overwrites_file() {
        let temp = TempDir::new().unwrap();
        let store = store(&temp);
        let dir = store.resolve(Category::Texts).await;
        std::fs::write(dir.join("prompt.txt"), "old").unwrap();

        let path = store
            .update_content("/outputs_proxy/texts/prompt.txt", "new content")
            .await
            .unwrap();

        assert_eq!(path, dir.join("prompt.txt"));
        assert_eq!(std::fs::read_to_string(path).unwrap(), "new content");
    }

    #[tokio::test]
    async fn update_content_rejects_traversal_without_touching_disk() {
        let temp = TempDir::new().unwrap();
        let store = store(&temp);

        let result = store
            .update_content("/outputs_proxy/texts/../../escape.txt", "pwned")
            .await;

        assert!(result.is_err());
        assert!(!temp.path().join("escape.txt").exists());
        assert!(!temp.path().join("outputs").exists());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn update_content_rejects_symlink_escape() {
        let temp = TempDir::new().unwrap();
        let outside = TempDir::new().unwrap();
        let secret = outside.path().join("secret.txt");
        std::fs::write(&secret, "keep").unwrap();

        let store = store(&temp);
        let dir = store.resolve(Category::Texts).await;
        std::os::unix::fs::symlink(&secret, dir.join("link.txt")).unwrap();

        let result = store.update_content("/outputs_proxy/texts/link.txt", "pwned").await;

        assert!(matches!(result, Err(StorageError::PathEscape(_))));
        assert_eq!(std::fs::read_to_string(secret).unwrap(), "keep");
    }

    #[tokio::test]
    async fn open_file_requires_existing_file() {
        let temp = TempDir::new().unwrap();
        let store = store(&temp);
        let dir = store.resolve(Category::Videos).await;
        std::fs::write(dir.join("clip.mp4"), b"data").unwrap();

        assert_eq!(
            store.open_file(Category::Videos, "clip.mp4").await.unwrap(),
            dir.join("clip.mp4")
        );
        assert!(matches!(
            store.open_file(Category::Videos, "missing.mp4").await,
            Err(StorageError::NotFound(_))
        ));
        assert!(store.open_file(Category::Videos, "../clip.mp4").await.is_err());
    }

    #[test]
    fn entry_wire_format() {
        let entry = OutputEntry {
            name: "a.png".into(),
            path: "/outputs_proxy/images/a.png".into(),
            category: Category::Images,
            size_bytes: 42,
            modified: DateTime::from_timestamp_millis(1_700_000_000_500).unwrap(),
            extension: "PNG".into(),
        };

        let value = serde_json::to_value(&entry).unwrap();
        assert_eq!(value["size"], 42);
        assert_eq!(value["type"], "PNG");
        assert_eq!(value["category"], "images");
        assert_eq!(value["mtime"].as_f64(), Some(1_700_000_000.5));
    }
}
