use std::collections::{BTreeMap, BTreeSet};
use std::path::{Component, Path, PathBuf};
use std::sync::{PoisonError, RwLock};

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::{Category, Result, StorageError};

/// Category key → directory (absolute, or relative to the install root).
pub type PathMapping = BTreeMap<String, String>;

pub fn default_paths() -> PathMapping {
    Category::ALL
        .into_iter()
        .map(|category| (category.as_str().to_string(), category.default_path().to_string()))
        .collect()
}

/// Persisted settings file contents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_paths")]
    pub paths: PathMapping,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            paths: default_paths(),
        }
    }
}

/// Where things live on disk and how they are addressed over HTTP.
#[derive(Debug, Clone)]
pub struct StorageLayout {
    pub root: PathBuf,
    /// Settings file; relative paths are taken from `root`.
    pub settings_file: PathBuf,
    /// First segment of local reference paths (`/<prefix>/<category>/<file>`).
    pub proxy_prefix: String,
    /// Upload staging directory; relative paths are taken from `root`.
    pub inputs_dir: PathBuf,
}

impl StorageLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            settings_file: PathBuf::from("config.json"),
            proxy_prefix: "outputs_proxy".to_string(),
            inputs_dir: PathBuf::from("inputs"),
        }
    }
}

/// Owner of the category → directory mapping.
///
/// The mapping is read once when the store is opened and replaced only
/// through [`PathStore::set_paths`]. Directory creation is best effort:
/// categories whose directory cannot be created are recorded and reported by
/// [`PathStore::unwritable`] instead of failing the request.
pub struct PathStore {
    layout: StorageLayout,
    config: RwLock<StorageConfig>,
    unwritable: RwLock<BTreeSet<Category>>,
    write_lock: Mutex<()>,
}

impl PathStore {
    pub fn open(layout: StorageLayout) -> Self {
        let root = std::path::absolute(&layout.root).unwrap_or_else(|_| layout.root.clone());
        let layout = StorageLayout {
            settings_file: root.join(&layout.settings_file),
            inputs_dir: root.join(&layout.inputs_dir),
            root,
            proxy_prefix: layout.proxy_prefix,
        };

        let config = load_settings(&layout.settings_file);
        info!(
            root = %layout.root.display(),
            settings = %layout.settings_file.display(),
            "Storage layout loaded"
        );

        Self {
            layout,
            config: RwLock::new(config),
            unwritable: RwLock::new(BTreeSet::new()),
            write_lock: Mutex::new(()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.layout.root
    }

    pub fn settings_file(&self) -> &Path {
        &self.layout.settings_file
    }

    pub fn proxy_prefix(&self) -> &str {
        &self.layout.proxy_prefix
    }

    /// Current mapping, as it was last persisted.
    pub fn paths(&self) -> PathMapping {
        self.config
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .paths
            .clone()
    }

    /// Directory configured for `category`, without touching the filesystem.
    pub fn configured(&self, category: Category) -> PathBuf {
        let value = {
            let config = self.config.read().unwrap_or_else(PoisonError::into_inner);
            config
                .paths
                .get(category.as_str())
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };
        let value = value.unwrap_or_else(|| category.default_path().to_string());

        let path = Path::new(&value);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.layout.root.join(path)
        }
    }

    /// Directory for `category`, created if missing.
    ///
    /// Creation failures are logged and recorded, never returned: the path is
    /// handed back either way so other operations degrade on their own.
    pub async fn resolve(&self, category: Category) -> PathBuf {
        let dir = self.configured(category);

        if tokio::fs::metadata(&dir).await.is_ok() {
            self.record_writable(category, true);
            return dir;
        }

        match tokio::fs::create_dir_all(&dir).await {
            Ok(()) => {
                debug!(%category, path = %dir.display(), "Created output directory");
                self.record_writable(category, true);
            }
            Err(e) => {
                warn!(%category, path = %dir.display(), error = %e, "Cannot create output directory");
                self.record_writable(category, false);
            }
        }

        dir
    }

    /// Resolve every category once, creating the default layout on first run.
    pub async fn prepare(&self) {
        for category in Category::ALL {
            self.resolve(category).await;
        }
    }

    /// Replace the whole mapping and persist it.
    ///
    /// The file is written next to the target and renamed over it, so readers
    /// see either the old or the new mapping.
    pub async fn set_paths(&self, mapping: PathMapping) -> Result<()> {
        if mapping.is_empty() {
            return Err(StorageError::EmptyMapping);
        }

        let _guard = self.write_lock.lock().await;

        let config = StorageConfig { paths: mapping };
        let contents = serde_json::to_string_pretty(&config)?;
        write_atomic(&self.layout.settings_file, contents.as_bytes()).await?;

        *self.config.write().unwrap_or_else(PoisonError::into_inner) = config;

        info!(settings = %self.layout.settings_file.display(), "Path configuration saved");
        Ok(())
    }

    /// Categories whose directory could not be created on the last attempt.
    pub fn unwritable(&self) -> Vec<Category> {
        self.unwritable
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .copied()
            .collect()
    }

    /// Local reference path served by the file proxy route.
    pub fn reference(&self, category: Category, file_name: &str) -> String {
        format!("/{}/{}/{}", self.layout.proxy_prefix, category, file_name)
    }

    /// Upload staging directory for `category`, created if missing.
    pub async fn inputs_dir(&self, category: Category) -> Result<PathBuf> {
        let dir = self.layout.inputs_dir.join(category.as_str());
        tokio::fs::create_dir_all(&dir).await?;
        Ok(dir)
    }

    fn record_writable(&self, category: Category, writable: bool) {
        let mut unwritable = self.unwritable.write().unwrap_or_else(PoisonError::into_inner);
        if writable {
            unwritable.remove(&category);
        } else {
            unwritable.insert(category);
        }
    }
}

fn load_settings(path: &Path) -> StorageConfig {
    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "No settings file, using default paths");
            return StorageConfig::default();
        }
        Err(e) => {
            error!(path = %path.display(), error = %e, "Failed to read settings file");
            return StorageConfig::default();
        }
    };

    serde_json::from_str(&raw).unwrap_or_else(|e| {
        error!(path = %path.display(), error = %e, "Failed to parse settings file");
        StorageConfig::default()
    })
}

async fn write_atomic(path: &Path, contents: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    let tmp = temp_sibling(path);
    tokio::fs::write(&tmp, contents).await?;

    if let Err(e) = tokio::fs::rename(&tmp, path).await {
        let _ = tokio::fs::remove_file(&tmp).await;
        return Err(e.into());
    }
    Ok(())
}

/// Hidden, uniquely named file in the same directory as `path`.
pub(crate) fn temp_sibling(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!(".{}.{}.tmp", name, Uuid::new_v4().simple()))
}

/// Reject anything but a single plain path component.
pub(crate) fn check_file_name(name: &str) -> Result<()> {
    let mut components = Path::new(name).components();
    let single = matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    );

    if !single || name.contains(['/', '\\']) {
        return Err(StorageError::PathEscape(name.to_string()));
    }
    Ok(())
}

/// `dir/name`, guaranteed to stay inside `dir`.
pub(crate) fn contained_path(dir: &Path, name: &str) -> Result<PathBuf> {
    check_file_name(name)?;

    let path = dir.join(name);
    if path.parent() != Some(dir) {
        return Err(StorageError::PathEscape(name.to_string()));
    }
    Ok(path)
}

/// Follow symlinks and make sure `path` still resolves inside `dir`.
pub(crate) async fn ensure_inside(dir: &Path, path: &Path) -> Result<()> {
    let Ok(real_path) = tokio::fs::canonicalize(path).await else {
        return Ok(());
    };
    let real_dir = tokio::fs::canonicalize(dir).await?;

    if !real_path.starts_with(&real_dir) {
        return Err(StorageError::PathEscape(path.display().to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store(temp: &TempDir) -> PathStore {
        PathStore::open(StorageLayout::new(temp.path()))
    }

    #[tokio::test]
    async fn resolve_creates_default_directory() {
        let temp = TempDir::new().unwrap();
        let store = store(&temp);

        let dir = store.resolve(Category::Images).await;
        assert_eq!(dir, temp.path().join("outputs/images"));
        assert!(dir.is_dir());
        assert!(store.unwritable().is_empty());
    }

    #[tokio::test]
    async fn absolute_paths_are_used_verbatim() {
        let temp = TempDir::new().unwrap();
        let elsewhere = TempDir::new().unwrap();
        let target = elsewhere.path().join("renders");

        let store = store(&temp);
        let mut mapping = default_paths();
        mapping.insert("images".into(), target.display().to_string());
        store.set_paths(mapping).await.unwrap();

        assert_eq!(store.resolve(Category::Images).await, target);
        assert!(target.is_dir());
    }

    #[tokio::test]
    async fn missing_key_falls_back_to_default() {
        let temp = TempDir::new().unwrap();
        let store = store(&temp);

        let mapping = PathMapping::from([("texts".to_string(), "notes".to_string())]);
        store.set_paths(mapping).await.unwrap();

        assert_eq!(store.configured(Category::Texts), temp.path().join("notes"));
        assert_eq!(
            store.configured(Category::Videos),
            temp.path().join("outputs/videos")
        );
    }

    #[tokio::test]
    async fn set_paths_persists_across_reopen() {
        let temp = TempDir::new().unwrap();
        let mapping = PathMapping::from([
            ("images".to_string(), "art".to_string()),
            ("others".to_string(), "misc/stuff".to_string()),
        ]);

        store(&temp).set_paths(mapping.clone()).await.unwrap();

        let reopened = store(&temp);
        assert_eq!(reopened.paths(), mapping);
        assert_eq!(
            reopened.resolve(Category::Others).await,
            temp.path().join("misc/stuff")
        );

        let raw = std::fs::read_to_string(temp.path().join("config.json")).unwrap();
        let on_disk: StorageConfig = serde_json::from_str(&raw).unwrap();
        assert_eq!(on_disk.paths, mapping);
    }

    #[tokio::test]
    async fn empty_mapping_is_rejected_without_change() {
        let temp = TempDir::new().unwrap();
        let store = store(&temp);

        let result = store.set_paths(PathMapping::new()).await;
        assert!(matches!(result, Err(StorageError::EmptyMapping)));
        assert_eq!(store.paths(), default_paths());
        assert!(!temp.path().join("config.json").exists());
    }

    #[tokio::test]
    async fn malformed_settings_fall_back_to_defaults() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("config.json"), "{ not json").unwrap();

        assert_eq!(store(&temp).paths(), default_paths());
    }

    #[tokio::test]
    async fn uncreatable_directory_is_recorded() {
        let temp = TempDir::new().unwrap();
        // A regular file where the directory should go.
        std::fs::write(temp.path().join("blocked"), b"x").unwrap();

        let store = store(&temp);
        let mapping = PathMapping::from([("videos".to_string(), "blocked/videos".to_string())]);
        store.set_paths(mapping).await.unwrap();

        let dir = store.resolve(Category::Videos).await;
        assert!(!dir.exists());
        assert_eq!(store.unwritable(), vec![Category::Videos]);

        // Other categories keep working.
        assert!(store.resolve(Category::Images).await.is_dir());
    }

    #[test]
    fn file_name_checks() {
        assert!(check_file_name("result.png").is_ok());
        assert!(check_file_name("..").is_err());
        assert!(check_file_name("../x").is_err());
        assert!(check_file_name("a/b").is_err());
        assert!(check_file_name("a\\b").is_err());
        assert!(check_file_name("/etc/passwd").is_err());
        assert!(check_file_name("").is_err());
        assert!(check_file_name(".").is_err());
    }

    #[test]
    fn contained_path_stays_in_directory() {
        let dir = Path::new("/srv/outputs/texts");
        assert_eq!(
            contained_path(dir, "a.txt").unwrap(),
            PathBuf::from("/srv/outputs/texts/a.txt")
        );
        assert!(matches!(
            contained_path(dir, "../../etc/passwd"),
            Err(StorageError::PathEscape(_))
        ));
    }
}
