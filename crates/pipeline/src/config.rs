//! Relay settings.
//!
//! [`RelaySettings`] is constructed once by the composition root and handed to
//! [`crate::BuildRelay::new`]. Credentials are not part of it; they belong to
//! the adapter that uses them.

use crate::{ArchitectureTag, CdnPath, MarkerNaming, RelayError};

/// Where artifacts land on the CDN and how the cache is purged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelaySettings {
    cdn_path_prefix: CdnPath,
    marker_naming: MarkerNaming,
    purge_pattern: String,
}

impl RelaySettings {
    /// Default folder inside the storage zone that receives artifacts.
    pub const DEFAULT_CDN_PATH_PREFIX: &'static str = "arena-pvp-game/downloads";

    /// Creates validated settings.
    ///
    /// `cdn_path_prefix` is trimmed of surrounding slashes and must not be
    /// empty afterwards. `purge_pattern` is the wildcard URL sent to the purge
    /// API (e.g. `https://arena.b-cdn.net/*`) and must not be empty.
    pub fn new(
        cdn_path_prefix: &str,
        marker_naming: MarkerNaming,
        purge_pattern: impl Into<String>,
    ) -> Result<Self, RelayError> {
        let prefix = CdnPath::new(cdn_path_prefix.trim_matches('/')).ok_or_else(|| {
            RelayError::Configuration {
                message: "CDN path prefix must not be empty".to_string(),
            }
        })?;

        let purge_pattern = purge_pattern.into();
        if purge_pattern.trim().is_empty() {
            return Err(RelayError::Configuration {
                message: "purge pattern must not be empty".to_string(),
            });
        }

        Ok(Self {
            cdn_path_prefix: prefix,
            marker_naming,
            purge_pattern,
        })
    }

    /// Folder inside the storage zone that receives artifacts.
    pub fn cdn_path_prefix(&self) -> &CdnPath {
        &self.cdn_path_prefix
    }

    /// How commit-marker objects are named.
    pub fn marker_naming(&self) -> MarkerNaming {
        self.marker_naming
    }

    /// Wildcard URL sent to the purge API.
    pub fn purge_pattern(&self) -> &str {
        &self.purge_pattern
    }

    /// CDN object path of the artifact zip for `arch`.
    pub fn artifact_cdn_path(&self, arch: ArchitectureTag) -> CdnPath {
        self.cdn_path_prefix.join(&arch.artifact_file_name())
    }

    /// CDN object path of the commit marker for `arch`.
    pub fn commit_marker_cdn_path(&self, arch: ArchitectureTag) -> CdnPath {
        self.cdn_path_prefix.join(&self.marker_naming.file_name(arch))
    }
}
