//! Build relay Unity Cloud Build adapter.
//!
//! Implements the [`pipeline::BuildProvider`] trait against the Unity Cloud
//! Build REST API:
//!
//! - share resolution: `GET {base}/api/v1/shares/{shareId}` with
//!   `Authorization: Basic <api key>`, reading `links.download_primary.href`;
//! - artifact download: a plain `GET` of the resolved URL, streamed chunk by
//!   chunk to the destination file.
//!
//! ## Architectural Layer
//!
//! **Infrastructure.** All HTTP transport and response parsing live here; the
//! [`pipeline`] crate sees only [`pipeline::BuildProvider`].

use std::path::Path;

use async_trait::async_trait;
use pipeline::{BuildProvider, BuildProviderError, DownloadUrl, Href, ShareId};
use reqwest::header::AUTHORIZATION;
use serde::Deserialize;
use thiserror::Error;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

/// Connection settings for the Unity Cloud Build API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnityConfig {
    /// API root, e.g. `https://build-api.cloud.unity3d.com`.
    pub api_base_url: String,
    /// API key, sent verbatim as the Basic credential.
    pub api_key: String,
}

impl UnityConfig {
    pub const DEFAULT_API_BASE_URL: &'static str = "https://build-api.cloud.unity3d.com";

    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_base_url: Self::DEFAULT_API_BASE_URL.to_string(),
            api_key: api_key.into(),
        }
    }

    pub fn with_api_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = url.into();
        self
    }
}

/// Errors constructing the client.
#[derive(Debug, Error)]
pub enum UnityError {
    #[error("Failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),
}

#[derive(Debug, Deserialize)]
struct ShareResponse {
    links: ShareLinks,
}

#[derive(Debug, Deserialize)]
struct ShareLinks {
    download_primary: Href,
}

/// [`BuildProvider`] backed by the Unity Cloud Build API.
#[derive(Debug, Clone)]
pub struct UnityCloudBuildClient {
    http: reqwest::Client,
    config: UnityConfig,
}

impl UnityCloudBuildClient {
    pub fn new(config: UnityConfig) -> Result<Self, UnityError> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("build-relay/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { http, config })
    }

    fn share_url(&self, share_id: &ShareId) -> String {
        format!(
            "{}/api/v1/shares/{}",
            self.config.api_base_url.trim_end_matches('/'),
            share_id
        )
    }
}

#[async_trait]
impl BuildProvider for UnityCloudBuildClient {
    async fn resolve_share(&self, share_id: &ShareId) -> Result<DownloadUrl, BuildProviderError> {
        let url = self.share_url(share_id);
        debug!(%url, "resolving share");

        let response = self
            .http
            .get(&url)
            .header(AUTHORIZATION, format!("Basic {}", self.config.api_key))
            .send()
            .await
            .map_err(|e| BuildProviderError::Transport {
                url: url.clone(),
                message: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(BuildProviderError::Status {
                url,
                status: status.as_u16(),
            });
        }

        let share: ShareResponse =
            response
                .json()
                .await
                .map_err(|e| BuildProviderError::InvalidResponse {
                    url: url.clone(),
                    message: e.to_string(),
                })?;

        DownloadUrl::new(share.links.download_primary.href).ok_or_else(|| {
            BuildProviderError::InvalidResponse {
                url,
                message: "links.download_primary.href is empty".to_string(),
            }
        })
    }

    async fn download_artifact(
        &self,
        url: &DownloadUrl,
        destination: &Path,
    ) -> Result<u64, BuildProviderError> {
        let transport = |e: reqwest::Error| BuildProviderError::Transport {
            url: url.to_string(),
            message: e.to_string(),
        };
        let io = |e: std::io::Error| BuildProviderError::Io {
            path: destination.to_path_buf(),
            message: e.to_string(),
        };

        info!(%url, "downloading artifact");
        let mut response = self.http.get(url.as_str()).send().await.map_err(transport)?;

        let status = response.status();
        if !status.is_success() {
            return Err(BuildProviderError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        if let Some(parent) = destination.parent() {
            fs::create_dir_all(parent).await.map_err(io)?;
        }
        let mut file = fs::File::create(destination).await.map_err(io)?;

        let mut written = 0u64;
        while let Some(chunk) = response.chunk().await.map_err(transport)? {
            file.write_all(&chunk).await.map_err(io)?;
            written += chunk.len() as u64;
        }
        file.flush().await.map_err(io)?;

        info!(path = %destination.display(), bytes = written, "download complete");
        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(base: &str) -> UnityCloudBuildClient {
        UnityCloudBuildClient::new(UnityConfig::new("secret-key").with_api_base_url(base)).unwrap()
    }

    #[tokio::test]
    async fn resolve_share_sends_basic_credentials_and_reads_primary_link() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/api/v1/shares/abc")
            .match_header("authorization", "Basic secret-key")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"shareid":"abc","links":{"download_primary":{"href":"https://dl.example/build.zip","meta":{"type":"ZIP"}}}}"#)
            .create_async()
            .await;

        let url = client(&server.url())
            .resolve_share(&ShareId::new("abc").unwrap())
            .await
            .unwrap();

        assert_eq!(url.as_str(), "https://dl.example/build.zip");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn resolve_share_reports_http_errors() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/api/v1/shares/gone")
            .with_status(404)
            .create_async()
            .await;

        let err = client(&server.url())
            .resolve_share(&ShareId::new("gone").unwrap())
            .await
            .unwrap_err();

        assert!(matches!(err, BuildProviderError::Status { status: 404, .. }), "{err:?}");
    }

    #[tokio::test]
    async fn resolve_share_rejects_body_without_download_link() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/api/v1/shares/abc")
            .with_status(200)
            .with_body(r#"{"links":{}}"#)
            .create_async()
            .await;

        let err = client(&server.url())
            .resolve_share(&ShareId::new("abc").unwrap())
            .await
            .unwrap_err();

        assert!(matches!(err, BuildProviderError::InvalidResponse { .. }), "{err:?}");
    }

    #[tokio::test]
    async fn download_streams_body_into_destination() {
        let mut server = mockito::Server::new_async().await;
        let body = vec![7u8; 64 * 1024];
        server
            .mock("GET", "/builds/linux.zip")
            .with_status(200)
            .with_body(body.clone())
            .create_async()
            .await;
        let dir = tempfile::tempdir().unwrap();
        let destination = dir.path().join("nested").join("linux-x64.zip");
        let url = DownloadUrl::new(format!("{}/builds/linux.zip", server.url())).unwrap();

        let written = client(&server.url())
            .download_artifact(&url, &destination)
            .await
            .unwrap();

        assert_eq!(written, body.len() as u64);
        assert_eq!(std::fs::read(&destination).unwrap(), body);
    }

    #[tokio::test]
    async fn failed_download_leaves_no_file() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/builds/missing.zip")
            .with_status(500)
            .create_async()
            .await;
        let dir = tempfile::tempdir().unwrap();
        let destination = dir.path().join("win-x64.zip");
        let url = DownloadUrl::new(format!("{}/builds/missing.zip", server.url())).unwrap();

        let err = client(&server.url())
            .download_artifact(&url, &destination)
            .await
            .unwrap_err();

        assert!(matches!(err, BuildProviderError::Status { status: 500, .. }), "{err:?}");
        assert!(!destination.exists());
    }

    #[tokio::test]
    async fn unreachable_provider_is_a_transport_error() {
        let err = client("http://127.0.0.1:1")
            .resolve_share(&ShareId::new("abc").unwrap())
            .await
            .unwrap_err();

        assert!(matches!(err, BuildProviderError::Transport { .. }), "{err:?}");
    }
}
