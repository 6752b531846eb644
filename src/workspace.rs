//! Scoped scratch directory for one pipeline run

use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::debug;

use crate::error::{Error, Result};
use crate::settings::SubtitleFormat;

/// Exclusively owned temporary directory holding a run's intermediate files.
///
/// The directory is removed by [`Workspace::release`], or on drop if the run
/// bailed out early.
#[derive(Debug)]
pub struct Workspace {
    dir: TempDir,
}

impl Workspace {
    /// Create a uniquely named directory under `root`, or the system temp dir
    pub fn acquire(root: Option<&Path>, prefix: &str) -> Result<Self> {
        let mut builder = tempfile::Builder::new();
        builder.prefix(prefix);

        let dir = match root {
            Some(root) => {
                std::fs::create_dir_all(root)
                    .map_err(|e| Error::filesystem("failed to create workspace root", root, e))?;
                builder.tempdir_in(root)
            }
            None => builder.tempdir(),
        }
        .map_err(|e| {
            Error::filesystem(
                "failed to create workspace",
                root.map(Path::to_path_buf).unwrap_or_else(std::env::temp_dir),
                e,
            )
        })?;

        debug!("📁 Workspace acquired: {}", dir.path().display());
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Path for the extracted audio track
    pub fn audio_path(&self, stem: &str, extension: &str) -> PathBuf {
        self.dir.path().join(format!("{}_audio.{}", stem, extension))
    }

    /// Path for the exported subtitle file
    pub fn subtitle_path(&self, stem: &str, format: SubtitleFormat) -> PathBuf {
        self.dir.path().join(format!("{}.{}", stem, format.extension()))
    }

    /// Path for the final video
    pub fn output_path(&self, filename: &str) -> PathBuf {
        self.dir.path().join(filename)
    }

    /// Remove the directory and everything in it
    pub fn release(self) -> Result<()> {
        let path = self.dir.path().to_path_buf();
        self.dir
            .close()
            .map_err(|e| Error::filesystem("failed to remove workspace", &path, e))?;
        debug!("🧹 Workspace released: {}", path.display());
        Ok(())
    }
}
