//! Error types for the relay domain.
//!
//! [`RelayError`] covers every condition that aborts a relay run. The
//! port-level errors ([`BuildProviderError`], [`CdnError`], [`ScratchError`])
//! are produced by adapter crates and convert into [`RelayError`] with `?`.
//!
//! Nothing here is retried: a run that fails is simply over, and the next
//! notification starts from scratch.

use std::path::PathBuf;

use thiserror::Error;

// ---------------------------------------------------------------------------
// Port-level errors
// ---------------------------------------------------------------------------

/// Failures talking to the build provider.
#[derive(Debug, Error)]
pub enum BuildProviderError {
    /// The request could not be sent or the response could not be read.
    #[error("Build provider request to {url} failed: {message}")]
    Transport {
        url: String,
        message: String,
    },

    /// The provider answered with a non-success status.
    #[error("Build provider returned HTTP {status} for {url}")]
    Status {
        url: String,
        status: u16,
    },

    /// The response body did not have the expected shape.
    #[error("Unexpected build provider response from {url}: {message}")]
    InvalidResponse {
        url: String,
        message: String,
    },

    /// Writing the downloaded artifact to disk failed.
    #[error("Could not write artifact to {}: {message}", .path.display())]
    Io {
        path: PathBuf,
        message: String,
    },
}

/// Failures talking to the CDN.
///
/// HTTP error statuses are *not* errors at this level; they come back as a
/// [`crate::CdnResponse`] and the relay decides what to do with them.
#[derive(Debug, Error)]
pub enum CdnError {
    /// The request could not be sent or no response was received.
    #[error("CDN {operation} request for {target} failed: {message}")]
    Transport {
        operation: crate::CdnOperation,
        target: String,
        message: String,
    },

    /// The local file to upload could not be read.
    #[error("Could not read upload source {}: {message}", .path.display())]
    Io {
        path: PathBuf,
        message: String,
    },
}

/// Failures managing local scratch files.
#[derive(Debug, Error)]
#[error("Scratch file {} could not be {action}: {message}", .path.display())]
pub struct ScratchError {
    pub path: PathBuf,
    /// What was being attempted, e.g. `"removed"` or `"written"`.
    pub action: &'static str,
    pub message: String,
}

// ---------------------------------------------------------------------------
// Pipeline-level errors
// ---------------------------------------------------------------------------

/// Errors that abort a relay run.
#[derive(Debug, Error)]
pub enum RelayError {
    /// The inbound payload is missing a field the relay reads, or a field has
    /// the wrong type.
    #[error("Malformed build notification: {message}")]
    MalformedNotification {
        message: String,
    },

    /// The share link carries no identifier after `=`.
    #[error("No share identifier in share URL '{share_url}'")]
    MissingShareId {
        share_url: String,
    },

    #[error(transparent)]
    BuildProvider(#[from] BuildProviderError),

    #[error(transparent)]
    Cdn(#[from] CdnError),

    #[error(transparent)]
    Scratch(#[from] ScratchError),

    /// Relay settings are invalid. Produced at construction time; a relay
    /// never starts with invalid settings.
    #[error("Configuration error: {message}")]
    Configuration {
        message: String,
    },

    /// The task running the relay panicked or was cancelled.
    #[error("Relay task did not complete: {message}")]
    TaskFailed {
        message: String,
    },
}

impl From<serde_json::Error> for RelayError {
    fn from(e: serde_json::Error) -> Self {
        RelayError::MalformedNotification {
            message: e.to_string(),
        }
    }
}
