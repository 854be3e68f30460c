//! File downloads: extension filter, destination layout and the fetch itself.
//!
//! A drive file `Reports/2024/q1.pdf` lands at `<base_dir>/Reports/2024/q1.pdf`. Only the
//! extensions in [`SUPPORTED_EXTENSIONS`] are fetched; everything else is reported as
//! [`DownloadOutcome::Unsupported`] without touching the network.

use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::error::ItemError;
use crate::graph::GraphClient;
use crate::models::DriveItem;
use crate::sink::{sanitize_segment, write_atomic};

pub const SUPPORTED_EXTENSIONS: [&str; 6] = [".pdf", ".ppt", ".pptx", ".txt", ".docx", ".rtf"];

/// Case-insensitive suffix check against [`SUPPORTED_EXTENSIONS`].
pub fn is_supported(file_name: &str) -> bool {
    let lower = file_name.to_ascii_lowercase();
    SUPPORTED_EXTENSIONS.iter().any(|ext| lower.ends_with(ext))
}

/// Where `item` is written under `base_dir`, mirroring its folder path.
pub fn destination(base_dir: &Path, item: &DriveItem) -> PathBuf {
    let mut path = base_dir.to_path_buf();
    for folder in &item.parent_path {
        path.push(sanitize_segment(folder));
    }
    path.push(sanitize_segment(&item.name));
    path
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadOutcome {
    Written { path: PathBuf, bytes: usize },
    /// `skip_existing` found a file of the expected size already in place.
    Unchanged { path: PathBuf },
    Unsupported,
}

pub struct FileDownloader<'a> {
    client: &'a GraphClient,
    drive_id: String,
    base_dir: PathBuf,
    skip_existing: bool,
}

impl<'a> FileDownloader<'a> {
    pub fn new(client: &'a GraphClient, drive_id: &str, base_dir: &Path) -> Self {
        Self {
            client,
            drive_id: drive_id.to_string(),
            base_dir: base_dir.to_path_buf(),
            skip_existing: false,
        }
    }

    pub fn skip_existing(mut self, skip: bool) -> Self {
        self.skip_existing = skip;
        self
    }

    /// Downloads one drive file into the base directory.
    pub async fn download(&self, item: &DriveItem) -> Result<DownloadOutcome, ItemError> {
        if !is_supported(&item.name) {
            info!(item = %item.display_path(), "Skipping unsupported file type");
            return Ok(DownloadOutcome::Unsupported);
        }

        let path = destination(&self.base_dir, item);
        if self.skip_existing && already_present(&path, item.size) {
            debug!(path = %path.display(), "File already present with expected size");
            return Ok(DownloadOutcome::Unchanged { path });
        }

        let bytes = match &item.download_url {
            Some(url) => self.client.get_binary_preauthenticated(url).await?,
            None => {
                let content = format!("drives/{}/items/{}/content", self.drive_id, item.id);
                self.client.get_binary(&content).await?
            }
        };

        write_atomic(&path, &bytes).map_err(|e| ItemError::io(&path, e))?;
        info!(path = %path.display(), bytes = bytes.len(), "File downloaded");
        Ok(DownloadOutcome::Written {
            path,
            bytes: bytes.len(),
        })
    }
}

fn already_present(path: &Path, expected_size: u64) -> bool {
    std::fs::metadata(path)
        .map(|m| m.is_file() && m.len() == expected_size)
        .unwrap_or(false)
}
