//! Transient spooling of uploaded files.
//!
//! An upload lives on disk only for the duration of one request. [`TempUpload`] owns that file:
//! the handler removes it explicitly on every exit path, and `Drop` unlinks it as a backstop if
//! the handler never got there.

use anyhow::Context;
use std::path::{Path, PathBuf};
use uuid::Uuid;

use crate::errors::Result;

/// A file spooled under the configured temp directory.
#[derive(Debug)]
pub struct TempUpload {
    path: PathBuf,
    removed: bool,
}

impl TempUpload {
    /// Write `bytes` to a uniquely named file under `dir`.
    pub async fn spool(dir: &Path, bytes: &[u8]) -> Result<Self> {
        let path = dir.join(Uuid::new_v4().to_string());
        tokio::fs::write(&path, bytes)
            .await
            .with_context(|| format!("failed to spool upload to {}", path.display()))?;

        tracing::debug!(path = %path.display(), size = bytes.len(), "Spooled upload");
        Ok(Self { path, removed: false })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Remove the spooled file. Idempotent; deletion errors are logged and swallowed.
    pub async fn remove(&mut self) {
        if self.removed {
            return;
        }
        self.removed = true;

        if let Err(err) = tokio::fs::remove_file(&self.path).await {
            if err.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!(path = %self.path.display(), error = %err, "Failed to remove spooled upload");
            }
        }
    }
}

impl Drop for TempUpload {
    fn drop(&mut self) {
        if !self.removed {
            let _ = std::fs::remove_file(&self.path);
        }
    }
}
