//! Shared value types for the relay domain.
//!
//! Unlike the newtype identifiers in [`crate::identifiers`], these types carry
//! derivation rules (architecture classification, commit-marker truncation)
//! or describe the outcome of a relay run.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{CdnPath, DownloadUrl, RelayRunId, RevisionId, ShareId};

// ---------------------------------------------------------------------------
// Inbound notification
// ---------------------------------------------------------------------------

/// The subset of a build-success webhook payload that the relay reads.
///
/// All other fields of the provider's payload are ignored. Field names follow
/// the provider's JSON (`lastBuiltRevision`, `links.share_url.href`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildNotification {
    /// Build target platform, e.g. `"standalonelinux64"`.
    pub platform: String,

    /// Links attached to the build.
    pub links: NotificationLinks,

    /// Revision the build was produced from.
    pub last_built_revision: RevisionId,
}

/// Link section of a [`BuildNotification`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationLinks {
    /// Public share link for the build artifact.
    pub share_url: Href,
}

/// A `{ "href": ... }` link object as used throughout the provider's API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Href {
    /// The link target.
    pub href: String,
}

// ---------------------------------------------------------------------------
// Architecture
// ---------------------------------------------------------------------------

/// Two-way classification of the build target, used to select file paths.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ArchitectureTag {
    /// Linux 64-bit build.
    #[serde(rename = "linux-x64")]
    LinuxX64,
    /// Windows 64-bit build; the fallback for every non-Linux platform.
    #[serde(rename = "win-x64")]
    WinX64,
}

impl ArchitectureTag {
    /// Classifies a platform string.
    ///
    /// Any platform containing `"linux"` (case-sensitive) is Linux; everything
    /// else falls through to Windows.
    pub fn from_platform(platform: &str) -> Self {
        if platform.contains("linux") {
            Self::LinuxX64
        } else {
            Self::WinX64
        }
    }

    /// Returns the tag as used in file and object names.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::LinuxX64 => "linux-x64",
            Self::WinX64 => "win-x64",
        }
    }

    /// File name of the artifact zip for this architecture.
    pub fn artifact_file_name(self) -> String {
        format!("{}.zip", self.as_str())
    }
}

impl std::fmt::Display for ArchitectureTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Commit marker
// ---------------------------------------------------------------------------

/// Number of leading revision characters kept in a [`CommitMarker`].
pub const COMMIT_MARKER_LEN: usize = 7;

/// Short commit hash published next to an artifact.
///
/// Holds at most [`COMMIT_MARKER_LEN`] characters; shorter revisions are kept
/// whole.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CommitMarker(String);

impl CommitMarker {
    /// Derives the marker from a revision by taking its leading characters.
    pub fn from_revision(revision: &RevisionId) -> Self {
        Self(revision.as_str().chars().take(COMMIT_MARKER_LEN).collect())
    }

    /// Returns the marker text as written to the CDN.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for CommitMarker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// How the commit-marker object is named on the CDN.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MarkerNaming {
    /// `latest-commit-{arch}.txt`: one marker per architecture.
    #[default]
    PerArchitecture,
    /// `latest-commit.txt`: a single marker, overwritten by every platform.
    Shared,
}

impl MarkerNaming {
    /// CDN file name of the marker for `arch`.
    pub fn file_name(self, arch: ArchitectureTag) -> String {
        match self {
            Self::PerArchitecture => format!("latest-commit-{arch}.txt"),
            Self::Shared => "latest-commit.txt".to_string(),
        }
    }
}

impl std::str::FromStr for MarkerNaming {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "per-architecture" => Ok(Self::PerArchitecture),
            "shared" => Ok(Self::Shared),
            other => Err(format!(
                "unknown commit marker naming '{other}' (expected 'per-architecture' or 'shared')"
            )),
        }
    }
}

// ---------------------------------------------------------------------------
// CDN call outcomes
// ---------------------------------------------------------------------------

/// HTTP outcome of a CDN call that reached the server.
///
/// The relay never halts on a non-success status; it only records it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CdnResponse {
    /// HTTP status code returned by the CDN.
    pub status: u16,
}

impl CdnResponse {
    /// Wraps an HTTP status code.
    pub fn new(status: u16) -> Self {
        Self { status }
    }

    /// Returns `true` for 2xx statuses.
    pub fn is_success(self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Kind of CDN call issued by the relay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CdnOperation {
    /// Storage object delete.
    Delete,
    /// Storage object upload.
    Upload,
    /// Pull-zone cache purge.
    Purge,
}

impl std::fmt::Display for CdnOperation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Delete => "delete",
            Self::Upload => "upload",
            Self::Purge => "purge",
        })
    }
}

/// One CDN call in the order it was issued.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CdnStep {
    /// Which call was made.
    pub operation: CdnOperation,
    /// Object path for storage calls, purge pattern for purges.
    pub target: String,
    /// Status the CDN answered with.
    pub response: CdnResponse,
}

// ---------------------------------------------------------------------------
// Run report
// ---------------------------------------------------------------------------

/// Summary of a completed relay run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelayReport {
    pub run_id: RelayRunId,
    pub architecture: ArchitectureTag,
    pub share_id: ShareId,
    /// URL the artifact was downloaded from.
    pub download_url: DownloadUrl,
    pub bytes_downloaded: u64,
    /// CDN object path the artifact was uploaded to.
    pub artifact_path: CdnPath,
    pub commit_marker: CommitMarker,
    /// CDN object path the commit marker was uploaded to.
    pub commit_marker_path: CdnPath,
    /// Every CDN call in issue order, including rejected ones.
    pub cdn_steps: Vec<CdnStep>,
    pub started_at: Timestamp,
    pub finished_at: Timestamp,
}

impl RelayReport {
    /// CDN calls that returned a non-success status.
    pub fn rejected_steps(&self) -> impl Iterator<Item = &CdnStep> {
        self.cdn_steps.iter().filter(|s| !s.response.is_success())
    }
}

// ---------------------------------------------------------------------------
// Time
// ---------------------------------------------------------------------------

/// A UTC wall-clock timestamp.
///
/// Wraps [`chrono::DateTime<Utc>`] so callers never depend on `chrono` types
/// directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    /// Returns the current UTC time as a [`Timestamp`].
    pub fn now() -> Self {
        Self(Utc::now())
    }

    /// Returns the underlying [`DateTime<Utc>`].
    pub fn as_datetime(self) -> DateTime<Utc> {
        self.0
    }
}

impl std::fmt::Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.to_rfc3339())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn linux_platforms_map_to_linux_x64() {
        assert_eq!(ArchitectureTag::from_platform("standalonelinux64"), ArchitectureTag::LinuxX64);
        assert_eq!(ArchitectureTag::from_platform("linux"), ArchitectureTag::LinuxX64);
    }

    #[test]
    fn everything_else_maps_to_win_x64() {
        assert_eq!(ArchitectureTag::from_platform("standalonewindows64"), ArchitectureTag::WinX64);
        assert_eq!(ArchitectureTag::from_platform("StandaloneLinux64"), ArchitectureTag::WinX64);
        assert_eq!(ArchitectureTag::from_platform(""), ArchitectureTag::WinX64);
    }

    #[test]
    fn commit_marker_keeps_first_seven_characters() {
        let revision = RevisionId::new("0123456789abcdef0123456789abcdef01234567").unwrap();
        assert_eq!(revision.as_str().len(), 40);
        assert_eq!(CommitMarker::from_revision(&revision).as_str(), "0123456");
    }

    #[test]
    fn short_revision_is_kept_whole() {
        let revision = RevisionId::new("abc").unwrap();
        assert_eq!(CommitMarker::from_revision(&revision).as_str(), "abc");
    }

    #[test]
    fn marker_naming_file_names() {
        assert_eq!(
            MarkerNaming::PerArchitecture.file_name(ArchitectureTag::WinX64),
            "latest-commit-win-x64.txt"
        );
        assert_eq!(MarkerNaming::Shared.file_name(ArchitectureTag::LinuxX64), "latest-commit.txt");
        assert_eq!("shared".parse::<MarkerNaming>(), Ok(MarkerNaming::Shared));
        assert!("both".parse::<MarkerNaming>().is_err());
    }

    #[test]
    fn notification_deserialises_from_provider_payload() {
        let payload = serde_json::json!({
            "projectName": "arena",
            "platform": "standalonelinux64",
            "links": {
                "share_url": { "href": "https://x/?id=abc" },
                "dashboard_url": { "href": "https://dash" }
            },
            "lastBuiltRevision": "0123456789abcdef"
        });
        let n: BuildNotification = serde_json::from_value(payload).unwrap();
        assert_eq!(n.platform, "standalonelinux64");
        assert_eq!(n.links.share_url.href, "https://x/?id=abc");
        assert_eq!(n.last_built_revision.as_str(), "0123456789abcdef");
    }

    #[test]
    fn cdn_response_success_range() {
        assert!(CdnResponse::new(201).is_success());
        assert!(!CdnResponse::new(404).is_success());
        assert!(!CdnResponse::new(500).is_success());
    }
}
