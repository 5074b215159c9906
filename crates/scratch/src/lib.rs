//! Build relay local scratch storage.
//!
//! Implements [`pipeline::ScratchSpace`] on the local filesystem. Paths are
//! fixed per architecture and overwritten by every run; nothing is cleaned up
//! after a successful relay.
//!
//! | File | Path |
//! |------|------|
//! | Artifact | `{root}/{arch}.zip` |
//! | Commit marker | `{root}/latest-commit.txt` |

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use pipeline::{ArchitectureTag, ScratchError, ScratchSpace};
use tokio::fs;
use tracing::debug;

const COMMIT_MARKER_FILE: &str = "latest-commit.txt";

/// [`ScratchSpace`] rooted at a local directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalScratch {
    root: PathBuf,
}

impl LocalScratch {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Scratch space in a `build-relay` folder under the system temp directory.
    pub fn in_temp_dir() -> Self {
        Self::new(std::env::temp_dir().join("build-relay"))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

#[async_trait]
impl ScratchSpace for LocalScratch {
    fn artifact_path(&self, arch: ArchitectureTag) -> PathBuf {
        self.root.join(arch.artifact_file_name())
    }

    fn commit_marker_path(&self) -> PathBuf {
        self.root.join(COMMIT_MARKER_FILE)
    }

    async fn remove(&self, path: &Path) -> Result<(), ScratchError> {
        match fs::remove_file(path).await {
            Ok(()) => {
                debug!(path = %path.display(), "removed stale scratch file");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(ScratchError {
                path: path.to_path_buf(),
                action: "removed",
                message: e.to_string(),
            }),
        }
    }

    async fn write_text(&self, path: &Path, contents: &str) -> Result<(), ScratchError> {
        let failed = |e: std::io::Error| ScratchError {
            path: path.to_path_buf(),
            action: "written",
            message: e.to_string(),
        };
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await.map_err(failed)?;
        }
        fs::write(path, contents).await.map_err(failed)
    }
}
