//! JSON document storage
//!
//! Preferences and the show list are plain JSON files. Writes go to a
//! temporary sibling first and are renamed into place, so an interrupted
//! write never leaves a truncated document behind.

use serde::{Deserialize, Serialize};
use std::fs;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors that can occur while reading or writing a document
#[derive(Debug, Error)]
pub enum StoreError {
    /// The document does not exist
    #[error("Could not find {0}")]
    NotFound(PathBuf),

    /// Failed to create the directory holding the document
    #[error("Failed to create directory at {path}: {source}")]
    DirectoryCreationFailed {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Failed to read the document
    #[error("Failed to read {path}: {source}")]
    ReadFailed {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Failed to write the document
    #[error("Failed to write {path}: {source}")]
    WriteFailed {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The document is not valid JSON for the expected type
    #[error("Could not parse {path}: {source}")]
    DeserializationFailed {
        path: PathBuf,
        source: serde_json::Error,
    },

    /// Failed to serialize the document
    #[error("Failed to serialize data: {0}")]
    SerializationFailed(#[from] serde_json::Error),
}

/// A typed JSON document at a fixed path
pub struct JsonFile<T> {
    path: PathBuf,
    _phantom: PhantomData<T>,
}

impl<T> JsonFile<T>
where
    T: Serialize + for<'de> Deserialize<'de>,
{
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            _phantom: PhantomData,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    /// Loads the document, failing if it does not exist
    pub fn load(&self) -> Result<T, StoreError> {
        if !self.exists() {
            return Err(StoreError::NotFound(self.path.clone()));
        }

        let content = fs::read_to_string(&self.path).map_err(|e| StoreError::ReadFailed {
            path: self.path.clone(),
            source: e,
        })?;

        serde_json::from_str(&content).map_err(|e| StoreError::DeserializationFailed {
            path: self.path.clone(),
            source: e,
        })
    }

    /// Loads the document, or returns `None` if it does not exist yet
    pub fn load_optional(&self) -> Result<Option<T>, StoreError> {
        match self.load() {
            Ok(data) => Ok(Some(data)),
            Err(StoreError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Writes the document, replacing any previous version atomically
    pub fn save(&self, data: &T) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| StoreError::DirectoryCreationFailed {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        let content = serde_json::to_string_pretty(data)?;

        let temp_path = self.path.with_extension("json.tmp");
        fs::write(&temp_path, content).map_err(|e| StoreError::WriteFailed {
            path: temp_path.clone(),
            source: e,
        })?;

        fs::rename(&temp_path, &self.path).map_err(|e| StoreError::WriteFailed {
            path: self.path.clone(),
            source: e,
        })?;

        Ok(())
    }
}
