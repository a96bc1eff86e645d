use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::StorageError;

/// Content class used to partition output storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Images,
    Videos,
    Audios,
    Texts,
    Others,
}

impl Category {
    pub const ALL: [Category; 5] = [
        Category::Images,
        Category::Videos,
        Category::Audios,
        Category::Texts,
        Category::Others,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Category::Images => "images",
            Category::Videos => "videos",
            Category::Audios => "audios",
            Category::Texts => "texts",
            Category::Others => "others",
        }
    }

    /// Built-in directory, relative to the install root.
    pub fn default_path(self) -> &'static str {
        match self {
            Category::Images => "outputs/images",
            Category::Videos => "outputs/videos",
            Category::Audios => "outputs/audios",
            Category::Texts => "outputs/texts",
            Category::Others => "outputs/others",
        }
    }

    pub fn from_extension(ext: &str) -> Self {
        match ext.to_ascii_lowercase().as_str() {
            "png" | "jpg" | "jpeg" | "webp" | "gif" => Category::Images,
            "mp4" | "avi" | "mov" | "webm" => Category::Videos,
            "mp3" | "wav" | "flac" => Category::Audios,
            "txt" | "json" | "md" | "xml" => Category::Texts,
            _ => Category::Others,
        }
    }

    pub fn from_file_name(name: &str) -> Self {
        extension_of(name)
            .map(Self::from_extension)
            .unwrap_or(Category::Others)
    }

    /// Maps the upload `fileType` field (`IMAGE`, `VIDEO`, `AUDIO`, ...).
    pub fn from_upload_kind(kind: &str) -> Self {
        match kind {
            "IMAGE" => Category::Images,
            "VIDEO" => Category::Videos,
            "AUDIO" => Category::Audios,
            _ => Category::Others,
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = StorageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Category::ALL
            .into_iter()
            .find(|category| category.as_str() == s)
            .ok_or_else(|| StorageError::UnknownCategory(s.to_string()))
    }
}

/// Text after the last dot, if the name has one.
pub fn extension_of(name: &str) -> Option<&str> {
    name.rsplit_once('.')
        .map(|(_, ext)| ext)
        .filter(|ext| !ext.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_by_extension() {
        assert_eq!(Category::from_file_name("a.PNG"), Category::Images);
        assert_eq!(Category::from_file_name("clip.webm"), Category::Videos);
        assert_eq!(Category::from_file_name("voice.flac"), Category::Audios);
        assert_eq!(Category::from_file_name("notes.md"), Category::Texts);
        assert_eq!(Category::from_file_name("model.safetensors"), Category::Others);
        assert_eq!(Category::from_file_name("README"), Category::Others);
        assert_eq!(Category::from_file_name("trailing."), Category::Others);
    }

    #[test]
    fn parses_wire_names() {
        for category in Category::ALL {
            assert_eq!(category.as_str().parse::<Category>().unwrap(), category);
        }
        assert!(matches!(
            "..".parse::<Category>(),
            Err(StorageError::UnknownCategory(_))
        ));
        assert!("Images".parse::<Category>().is_err());
    }

    #[test]
    fn upload_kinds() {
        assert_eq!(Category::from_upload_kind("IMAGE"), Category::Images);
        assert_eq!(Category::from_upload_kind("VIDEO"), Category::Videos);
        assert_eq!(Category::from_upload_kind("AUDIO"), Category::Audios);
        assert_eq!(Category::from_upload_kind("TEXT"), Category::Others);
    }
}
