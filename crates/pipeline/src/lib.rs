//! Core orchestration domain for the build relay.
//!
//! This crate contains the relay pipeline, every domain type it works with,
//! and the port traits through which it reaches the outside world.
//! Infrastructure crates implement the traits defined here; they never add
//! domain rules.
//!
//! ## Architectural Layer
//!
//! **Business logic + port definitions.** This crate performs no network or
//! filesystem I/O itself. It defines *what* is needed; infrastructure crates
//! define *how* to supply it.
//!
//! ## Module Layout
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`identifiers`] | Newtype identifiers (`ShareId`, `CdnPath`, `RelayRunId`, etc.) |
//! | [`types`] | Notification, architecture, commit marker, and report types |
//! | [`errors`] | Pipeline-level and port-level error types |
//! | [`ports`] | `BuildProvider`, `ContentDelivery`, `ScratchSpace` traits |
//! | [`config`] | Validated [`RelaySettings`] |
//! | [`relay`] | The [`BuildRelay`] pipeline and its [`RelayTask`] handle |

pub mod config;
pub mod errors;
pub mod identifiers;
pub mod ports;
pub mod relay;
pub mod types;

// Re-export everything at the crate root for ergonomic usage by downstream crates.
pub use config::RelaySettings;
pub use errors::{BuildProviderError, CdnError, RelayError, ScratchError};
pub use identifiers::{CdnPath, DownloadUrl, RelayRunId, RevisionId, ShareId, StorageZone};
pub use ports::{BuildProvider, ContentDelivery, ScratchSpace};
pub use relay::{parse_notification, BuildRelay, RelayLauncher, RelayTask};
pub use types::{
    ArchitectureTag, BuildNotification, CdnOperation, CdnResponse, CdnStep, CommitMarker, Href,
    MarkerNaming, NotificationLinks, RelayReport, Timestamp, COMMIT_MARKER_LEN,
};
