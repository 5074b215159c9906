//! Newtype domain identifiers.
//!
//! Every value that names something outside the process (a share link, a CDN
//! object, a storage zone) is a distinct newtype wrapping a `String`. This
//! prevents accidentally passing, for example, a [`DownloadUrl`] where a
//! [`CdnPath`] is expected, even though both are strings under the hood.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Macro for String-wrapped newtypes.
// Generates: struct, new() returning Option<Self>, as_str(), Display.
// Deserialisation goes through new(), so an empty string is rejected there
// as well.
// ---------------------------------------------------------------------------
macro_rules! string_id {
    (
        $(#[$attr:meta])*
        $name:ident
    ) => {
        $(#[$attr])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(try_from = "String")]
        pub struct $name(String);

        impl $name {
            /// Creates a new identifier, returning `None` if the value is empty.
            pub fn new(value: impl Into<String>) -> Option<Self> {
                let v = value.into();
                if v.is_empty() { None } else { Some(Self(v)) }
            }

            /// Returns the identifier as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl TryFrom<String> for $name {
            type Error = String;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                Self::new(value)
                    .ok_or_else(|| concat!(stringify!($name), " must not be empty").to_string())
            }
        }
    };
}

// ---------------------------------------------------------------------------
// Identifiers — UUID-backed (internally generated)
// ---------------------------------------------------------------------------

/// Identifies a single relay run (one processed notification).
///
/// Generated fresh for every launch; attached to the `relay` span so all
/// activity from a single run can be correlated in logs and traces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RelayRunId(Uuid);

impl RelayRunId {
    /// Generates a new random run identifier.
    pub fn new_random() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates a [`RelayRunId`] from an existing UUID.
    pub fn from_uuid(id: Uuid) -> Self {
        Self(id)
    }

    /// Returns the underlying [`Uuid`].
    pub fn as_uuid(self) -> Uuid {
        self.0
    }
}

impl std::fmt::Display for RelayRunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Identifiers — String-backed
// ---------------------------------------------------------------------------

string_id! {
    /// Identifies a build share on the build provider.
    ///
    /// Taken from the query-parameter value of the share link in a build
    /// notification (see [`ShareId::from_share_url`]).
    ShareId
}

impl ShareId {
    /// Extracts the share identifier from a share-link URL.
    ///
    /// The URL is split on `=` and the second segment is taken, so
    /// `https://host/shares?id=ABC123` yields `ABC123`. Anything after a
    /// second `=` is dropped. Returns `None` when the URL has no `=` or the
    /// segment after it is empty.
    pub fn from_share_url(share_url: &str) -> Option<Self> {
        share_url.split('=').nth(1).and_then(Self::new)
    }
}

string_id! {
    /// A source-control revision reported by the build provider
    /// (`lastBuiltRevision`), typically a 40-character commit SHA.
    RevisionId
}

string_id! {
    /// Name of a CDN storage zone (the origin bucket receiving uploads).
    StorageZone
}

string_id! {
    /// An object path inside the CDN storage zone, without leading or
    /// trailing slashes (e.g. `arena-pvp-game/downloads/linux-x64.zip`).
    CdnPath
}

impl CdnPath {
    /// Joins `file` onto this path with a single `/` separator.
    pub fn join(&self, file: &str) -> CdnPath {
        CdnPath(format!(
            "{}/{}",
            self.0.trim_end_matches('/'),
            file.trim_start_matches('/')
        ))
    }
}

string_id! {
    /// A direct-download URL for a build artifact, resolved from a share.
    DownloadUrl
}
