//! Category-addressed output storage ("Gallery").
//!
//! Every artifact lives in the directory configured for its [`Category`].
//! The category → directory mapping is persisted as `{"paths": {...}}` in the
//! settings file under the install root and owned by a [`PathStore`]; all
//! resolution, listing and writes go through it.

mod artifact;
mod category;
mod gallery;
mod paths;

pub use artifact::{SaveStatus, SavedArtifact, save_artifact};
pub use category::{Category, extension_of};
pub use gallery::{LocalRef, OutputEntry};
pub use paths::{PathMapping, PathStore, StorageConfig, StorageLayout, default_paths};

use thiserror::Error;

use crate::remote::RemoteError;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("unknown category: {0}")]
    UnknownCategory(String),

    #[error("empty")]
    EmptyMapping,

    #[error("invalid file name: {0}")]
    InvalidFileName(String),

    #[error("illegal path: {0}")]
    IllegalReference(String),

    #[error("path escapes its category directory: {0}")]
    PathEscape(String),

    #[error("file not found: {0}")]
    NotFound(String),

    #[error("download failed: {0}")]
    Download(#[from] RemoteError),

    #[error("settings serialization failed: {0}")]
    Settings(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Storage result type
pub type Result<T> = std::result::Result<T, StorageError>;
