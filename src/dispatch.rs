//! Downloading chosen episodes
//!
//! The selector hands each chosen episode to an [`EpisodeDispatcher`]. The
//! default implementation saves the torrent file into the download folder and
//! optionally opens it with the system's default application.

use crate::episode::Episode;
use crate::temp::PartialFile;
use humansize::{DECIMAL, format_size};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};

/// Errors that can occur while downloading an episode
#[derive(Debug, Error)]
pub enum DownloadError {
    /// The HTTP client could not be created
    #[error("Failed to create HTTP client: {0}")]
    ClientError(String),

    /// The request failed or the body could not be read
    #[error("Failed to download {url}: {reason}")]
    RequestFailed { url: String, reason: String },

    /// The server answered with an error status
    #[error("HTTP {status} while downloading {url}")]
    HttpStatus { url: String, status: u16 },

    /// The server answered with an empty body
    #[error("Empty response while downloading {0}")]
    EmptyResponse(String),

    /// The file could not be written
    #[error("Failed to write {path}: {source}")]
    WriteFailed { path: PathBuf, source: io::Error },
}

/// Trait for performing the download of a chosen episode
pub trait EpisodeDispatcher {
    /// Downloads the episode and returns where it was saved
    fn dispatch(&self, episode: &Episode<'_>) -> Result<PathBuf, DownloadError>;
}

/// Saves torrent files into a folder
pub struct TorrentDownloader {
    client: reqwest::blocking::Client,
    folder: PathBuf,
    open_after_download: bool,
}

impl TorrentDownloader {
    pub fn new(
        folder: impl Into<PathBuf>,
        open_after_download: bool,
        user_agent: &str,
        timeout: Duration,
    ) -> Result<Self, DownloadError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .build()
            .map_err(|e| DownloadError::ClientError(e.to_string()))?;

        Ok(Self {
            client,
            folder: folder.into(),
            open_after_download,
        })
    }

    fn fetch(&self, url: &str) -> Result<Vec<u8>, DownloadError> {
        let response = self
            .client
            .get(url)
            .send()
            .map_err(|e| DownloadError::RequestFailed {
                url: url.to_string(),
                reason: e.to_string(),
            })?;

        if !response.status().is_success() {
            return Err(DownloadError::HttpStatus {
                url: url.to_string(),
                status: response.status().as_u16(),
            });
        }

        let body = response.bytes().map_err(|e| DownloadError::RequestFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

        if body.is_empty() {
            return Err(DownloadError::EmptyResponse(url.to_string()));
        }

        Ok(body.to_vec())
    }
}

impl EpisodeDispatcher for TorrentDownloader {
    fn dispatch(&self, episode: &Episode<'_>) -> Result<PathBuf, DownloadError> {
        let data = self.fetch(episode.url())?;
        let path = save_file(&self.folder.join(episode.file_name()), &data)?;

        info!(
            "Saved {} ({})",
            path.display(),
            format_size(data.len() as u64, DECIMAL)
        );

        if self.open_after_download {
            open_file(&path);
        }

        Ok(path)
    }
}

/// Writes `data` to `destination` through a partial file
pub(crate) fn save_file(destination: &Path, data: &[u8]) -> Result<PathBuf, DownloadError> {
    let write_failed = |source: io::Error| DownloadError::WriteFailed {
        path: destination.to_path_buf(),
        source,
    };

    let (partial, mut file) = PartialFile::create(destination).map_err(write_failed)?;
    file.write_all(data).map_err(write_failed)?;
    file.sync_all().map_err(write_failed)?;
    drop(file);

    partial.commit().map_err(write_failed)
}

/// Opens a file with the platform's default application
///
/// Failures only produce a warning, the download itself succeeded.
fn open_file(path: &Path) {
    let mut command = if cfg!(target_os = "macos") {
        Command::new("open")
    } else if cfg!(target_os = "windows") {
        let mut command = Command::new("cmd");
        command.args(["/C", "start", ""]);
        command
    } else {
        Command::new("xdg-open")
    };

    let status = command
        .arg(path)
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status();

    match status {
        Ok(status) if status.success() => {}
        Ok(status) => warn!("Opening {} exited with {}", path.display(), status),
        Err(e) => warn!("Unable to open {}: {}", path.display(), e),
    }
}
