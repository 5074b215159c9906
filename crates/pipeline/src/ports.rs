//! Port traits implemented by the infrastructure crates.
//!
//! The relay only ever sees these traits. `unity` implements
//! [`BuildProvider`], `bunny` implements [`ContentDelivery`] and `scratch`
//! implements [`ScratchSpace`]. All traits are dyn-compatible so the relay can
//! hold them as `Arc<dyn ...>`.

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::{
    ArchitectureTag, BuildProviderError, CdnError, CdnPath, CdnResponse, DownloadUrl,
    ScratchError, ShareId,
};

/// The cloud build service that issues notifications and hosts artifacts.
#[async_trait]
pub trait BuildProvider: Send + Sync {
    /// Resolves a share identifier to a direct-download URL.
    async fn resolve_share(&self, share_id: &ShareId) -> Result<DownloadUrl, BuildProviderError>;

    /// Streams the artifact at `url` into `destination`, returning the number
    /// of bytes written.
    ///
    /// Implementations must fail (and must not report success) on transport
    /// errors and non-success HTTP statuses.
    async fn download_artifact(
        &self,
        url: &DownloadUrl,
        destination: &Path,
    ) -> Result<u64, BuildProviderError>;
}

/// CDN origin storage plus edge cache control.
///
/// Every method returns `Ok` as soon as the CDN answered, whatever the status.
/// `Err` means the call never produced a response.
#[async_trait]
pub trait ContentDelivery: Send + Sync {
    /// Deletes the object at `path` in the storage zone.
    async fn delete_object(&self, path: &CdnPath) -> Result<CdnResponse, CdnError>;

    /// Uploads the local file `source` to `path` in the storage zone.
    async fn upload_file(&self, path: &CdnPath, source: &Path) -> Result<CdnResponse, CdnError>;

    /// Purges every cached URL matching `url_pattern` at the edge.
    async fn purge(&self, url_pattern: &str) -> Result<CdnResponse, CdnError>;
}

/// Local scratch storage for artifacts and commit markers.
#[async_trait]
pub trait ScratchSpace: Send + Sync {
    /// Fixed local path of the artifact zip for `arch`.
    fn artifact_path(&self, arch: ArchitectureTag) -> PathBuf;

    /// Fixed local path of the commit-marker file. Shared by all architectures.
    fn commit_marker_path(&self) -> PathBuf;

    /// Removes `path`. A file that does not exist is not an error.
    async fn remove(&self, path: &Path) -> Result<(), ScratchError>;

    /// Writes `contents` to `path`, replacing any previous content.
    async fn write_text(&self, path: &Path, contents: &str) -> Result<(), ScratchError>;
}
