//! JSON snapshot file for the canvas store.
//!
//! Lets the CLI keep canvases between invocations. The file holds a single
//! [`CanvasSnapshot`] and is replaced atomically on save.

use std::path::{Path, PathBuf};

use tracing::debug;

use simcanvas_core::error::Result;

use crate::store::CanvasSnapshot;

pub struct SnapshotFile {
    path: PathBuf,
}

impl SnapshotFile {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the snapshot; a missing file is an empty snapshot.
    pub async fn load(&self) -> Result<CanvasSnapshot> {
        if !self.path.exists() {
            return Ok(CanvasSnapshot::default());
        }
        let data = tokio::fs::read_to_string(&self.path).await?;
        let snapshot: CanvasSnapshot = serde_json::from_str(&data)?;
        debug!(
            path = %self.path.display(),
            canvases = snapshot.canvases.len(),
            "Loaded canvas snapshot"
        );
        Ok(snapshot)
    }

    pub async fn save(&self, snapshot: &CanvasSnapshot) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let data = serde_json::to_string_pretty(snapshot)?;
        // Atomic write: write to temp then rename
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, data.as_bytes()).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        debug!(path = %self.path.display(), "Saved canvas snapshot");
        Ok(())
    }
}
