use std::path::PathBuf;

use reqwest::Url;
use serde::Serialize;
use tracing::{info, warn};

use super::paths::{check_file_name, contained_path, temp_sibling};
use super::{Category, PathStore, Result, StorageError};
use crate::remote::RemoteClient;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SaveStatus {
    /// A non-empty local copy was already there; nothing was downloaded.
    #[serde(rename = "exist")]
    Exist,
    #[serde(rename = "success")]
    Downloaded,
}

impl SaveStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            SaveStatus::Exist => "exist",
            SaveStatus::Downloaded => "success",
        }
    }
}

#[derive(Debug, Clone)]
pub struct SavedArtifact {
    pub status: SaveStatus,
    pub category: Category,
    pub path: PathBuf,
    /// `/<prefix>/<category>/<file>` reference for the dashboard.
    pub local_ref: String,
}

/// Cache a remote artifact in the directory of its category.
///
/// The file name is `suggested_name` or the last segment of the URL path.
/// An existing non-empty file is kept as is, since the operator may have
/// edited it. Downloads land in a temporary sibling first and are renamed
/// into place once complete.
pub async fn save_artifact(
    store: &PathStore,
    remote: &RemoteClient,
    url: &str,
    suggested_name: Option<&str>,
) -> Result<SavedArtifact> {
    let file_name = match suggested_name.filter(|name| !name.is_empty()) {
        Some(name) => name.to_string(),
        None => file_name_from_url(url)?,
    };
    check_file_name(&file_name)?;

    let category = Category::from_file_name(&file_name);
    let dir = store.resolve(category).await;
    let path = contained_path(&dir, &file_name)?;
    let local_ref = store.reference(category, &file_name);

    let existing = tokio::fs::metadata(&path)
        .await
        .map(|metadata| metadata.is_file() && metadata.len() > 0)
        .unwrap_or(false);
    if existing {
        info!(file = %file_name, %category, "File already cached, skipping download");
        return Ok(SavedArtifact {
            status: SaveStatus::Exist,
            category,
            path,
            local_ref,
        });
    }

    let tmp = temp_sibling(&path);
    let downloaded = remote.download_to(url, &tmp).await;
    let size = match downloaded {
        Ok(size) => size,
        Err(e) => {
            let _ = tokio::fs::remove_file(&tmp).await;
            warn!(%url, error = %e, transient = e.is_transient(), "Artifact download failed");
            return Err(e.into());
        }
    };

    if let Err(e) = tokio::fs::rename(&tmp, &path).await {
        let _ = tokio::fs::remove_file(&tmp).await;
        return Err(e.into());
    }

    info!(file = %file_name, %category, size, "Artifact saved");
    Ok(SavedArtifact {
        status: SaveStatus::Downloaded,
        category,
        path,
        local_ref,
    })
}

impl PathStore {
    /// Keep a copy of an uploaded input under the staging directory.
    pub async fn stage_upload(
        &self,
        category: Category,
        file_name: &str,
        contents: &[u8],
    ) -> Result<PathBuf> {
        let dir = self.inputs_dir(category).await?;
        let path = contained_path(&dir, file_name)?;
        tokio::fs::write(&path, contents).await?;
        Ok(path)
    }
}

fn file_name_from_url(url: &str) -> Result<String> {
    let parsed = Url::parse(url).map_err(|_| StorageError::InvalidFileName(url.to_string()))?;

    parsed
        .path_segments()
        .and_then(|mut segments| segments.next_back())
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .ok_or_else(|| StorageError::InvalidFileName(url.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_name_from_url_uses_last_segment() {
        assert_eq!(
            file_name_from_url("https://cdn.example.com/out/2024/abc.png?x-oss=1").unwrap(),
            "abc.png"
        );
        assert!(file_name_from_url("https://cdn.example.com/").is_err());
        assert!(file_name_from_url("not a url").is_err());
    }

    #[test]
    fn save_status_wire_names() {
        assert_eq!(SaveStatus::Exist.as_str(), "exist");
        assert_eq!(SaveStatus::Downloaded.as_str(), "success");
        assert_eq!(
            serde_json::to_value(SaveStatus::Downloaded).unwrap(),
            serde_json::json!("success")
        );
    }
}
