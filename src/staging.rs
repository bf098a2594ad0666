//! Staging directory holding one run's page images.
//!
//! Page files are named `img_0001.png`, `img_0002.png`, ... so that a plain
//! sorted listing is capture order.

use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::constants::staging::{MIN_SEQUENCE_WIDTH, PAGE_EXTENSION, PAGE_PREFIX};
use crate::error::Result;

#[derive(Debug, Clone)]
pub struct StagingDir {
    root: PathBuf,
}

impl StagingDir {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn path(&self) -> &Path {
        &self.root
    }

    pub fn exists(&self) -> bool {
        self.root.is_dir()
    }

    /// File name of page `index` in a run of `total` pages. The sequence is
    /// padded wide enough for `total`, never below four digits.
    pub fn page_file_name(index: u32, total: u32) -> String {
        let width = total.to_string().len().max(MIN_SEQUENCE_WIDTH);
        format!("{}{:0width$}.{}", PAGE_PREFIX, index, PAGE_EXTENSION, width = width)
    }

    pub fn page_path(&self, index: u32, total: u32) -> PathBuf {
        self.root.join(Self::page_file_name(index, total))
    }

    /// Empties the directory left by any earlier run and recreates it.
    pub async fn prepare(&self) -> Result<()> {
        match tokio::fs::remove_dir_all(&self.root).await {
            Ok(()) => debug!(path = %self.root.display(), "cleared stale staging directory"),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        tokio::fs::create_dir_all(&self.root).await?;
        Ok(())
    }

    pub async fn write_page(&self, index: u32, total: u32, png: &[u8]) -> Result<PathBuf> {
        let path = self.page_path(index, total);
        tokio::fs::write(&path, png).await?;
        debug!(path = %path.display(), bytes = png.len(), "page staged");
        Ok(path)
    }

    /// Removes the directory and everything in it. Failures are logged and
    /// swallowed; a missing directory is not a failure.
    pub async fn cleanup(&self) {
        match tokio::fs::remove_dir_all(&self.root).await {
            Ok(()) => debug!(path = %self.root.display(), "staging directory removed"),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => warn!(path = %self.root.display(), error = %e, "cleanup error"),
        }
    }
}
