//! Partial file management module
//!
//! This module provides RAII-based handling of files that are being written,
//! so an interrupted download never leaves a truncated file under its final
//! name.

use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};

/// Guard for a file being written next to its final destination
///
/// The data is written to `<destination>.part`. Calling [`PartialFile::commit`]
/// renames it into place; dropping the guard without committing deletes it.
#[derive(Debug)]
pub(crate) struct PartialFile {
    /// Path of the partial file
    path: PathBuf,
    /// Final path the file is renamed to on commit
    destination: PathBuf,
    /// Set once the file was renamed into place
    committed: bool,
}

impl PartialFile {
    /// Creates the partial file for `destination` and returns the guard with
    /// the open file handle
    pub(crate) fn create(destination: &Path) -> io::Result<(Self, File)> {
        let mut name = destination.as_os_str().to_os_string();
        name.push(".part");
        let path = PathBuf::from(name);

        let file = File::create(&path)?;

        Ok((
            Self {
                path,
                destination: destination.to_path_buf(),
                committed: false,
            },
            file,
        ))
    }

    /// Get the path of the partial file
    #[cfg(test)]
    pub(crate) fn path(&self) -> &Path {
        &self.path
    }

    /// Moves the partial file to its destination, replacing any existing file
    pub(crate) fn commit(mut self) -> io::Result<PathBuf> {
        fs::rename(&self.path, &self.destination)?;
        self.committed = true;
        Ok(self.destination.clone())
    }
}

impl Drop for PartialFile {
    fn drop(&mut self) {
        if !self.committed {
            // Silently ignore errors during cleanup
            let _ = fs::remove_file(&self.path);
        }
    }
}
