//! Build relay BunnyCDN adapter.
//!
//! Implements the [`pipeline::ContentDelivery`] trait with two BunnyCDN APIs:
//!
//! - **Edge Storage**: `DELETE` / `PUT` `{storage endpoint}/{zone}/{path}`,
//!   authenticated with the storage zone's `AccessKey`;
//! - **Purge**: `POST {api endpoint}/purge?url=<escaped pattern>`,
//!   authenticated with the account `AccessKey`.
//!
//! Every call that reaches BunnyCDN yields a [`CdnResponse`] carrying the HTTP
//! status, successful or not. Only transport failures and unreadable upload
//! sources are errors.
//!
//! ## Architectural Layer
//!
//! **Infrastructure.** The [`pipeline`] crate sees only
//! [`pipeline::ContentDelivery`].

use std::path::Path;

use async_trait::async_trait;
use pipeline::{CdnError, CdnOperation, CdnPath, CdnResponse, ContentDelivery, StorageZone};
use reqwest::header::CONTENT_TYPE;
use thiserror::Error;
use tokio::fs;
use tracing::debug;

const ACCESS_KEY_HEADER: &str = "AccessKey";

/// Connection settings for BunnyCDN.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BunnyConfig {
    /// Storage API root, e.g. `https://storage.bunnycdn.com`.
    pub storage_endpoint: String,
    pub storage_zone: StorageZone,
    /// Key for the storage zone.
    pub storage_access_key: String,
    /// Account API root, e.g. `https://api.bunny.net`.
    pub api_endpoint: String,
    /// Account key, used for purges.
    pub access_key: String,
}

impl BunnyConfig {
    pub const DEFAULT_STORAGE_ENDPOINT: &'static str = "https://storage.bunnycdn.com";
    pub const DEFAULT_API_ENDPOINT: &'static str = "https://api.bunny.net";

    /// Creates a configuration using the default endpoints and the account
    /// key for storage as well.
    pub fn new(storage_zone: StorageZone, access_key: impl Into<String>) -> Self {
        let access_key = access_key.into();
        Self {
            storage_endpoint: Self::DEFAULT_STORAGE_ENDPOINT.to_string(),
            storage_zone,
            storage_access_key: access_key.clone(),
            api_endpoint: Self::DEFAULT_API_ENDPOINT.to_string(),
            access_key,
        }
    }

    pub fn with_storage_access_key(mut self, key: impl Into<String>) -> Self {
        self.storage_access_key = key.into();
        self
    }

    pub fn with_storage_endpoint(mut self, url: impl Into<String>) -> Self {
        self.storage_endpoint = url.into();
        self
    }

    pub fn with_api_endpoint(mut self, url: impl Into<String>) -> Self {
        self.api_endpoint = url.into();
        self
    }
}

/// Errors constructing the client.
#[derive(Debug, Error)]
pub enum BunnyError {
    #[error("Failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),
}

/// [`ContentDelivery`] backed by BunnyCDN.
#[derive(Debug, Clone)]
pub struct BunnyCdnClient {
    http: reqwest::Client,
    config: BunnyConfig,
}

impl BunnyCdnClient {
    pub fn new(config: BunnyConfig) -> Result<Self, BunnyError> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("build-relay/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { http, config })
    }

    fn object_url(&self, path: &CdnPath) -> String {
        format!(
            "{}/{}/{}",
            self.config.storage_endpoint.trim_end_matches('/'),
            self.config.storage_zone,
            path
        )
    }

    async fn send(
        &self,
        operation: CdnOperation,
        target: &str,
        request: reqwest::RequestBuilder,
    ) -> Result<CdnResponse, CdnError> {
        let response = request.send().await.map_err(|e| CdnError::Transport {
            operation,
            target: target.to_string(),
            message: e.to_string(),
        })?;
        let status = response.status().as_u16();
        debug!(%operation, object = target, status, "CDN responded");
        Ok(CdnResponse::new(status))
    }
}

#[async_trait]
impl ContentDelivery for BunnyCdnClient {
    async fn delete_object(&self, path: &CdnPath) -> Result<CdnResponse, CdnError> {
        let request = self
            .http
            .delete(self.object_url(path))
            .header(ACCESS_KEY_HEADER, &self.config.storage_access_key);
        self.send(CdnOperation::Delete, path.as_str(), request).await
    }

    async fn upload_file(&self, path: &CdnPath, source: &Path) -> Result<CdnResponse, CdnError> {
        // TODO: stream the body once artifacts outgrow comfortable memory use.
        let body = fs::read(source).await.map_err(|e| CdnError::Io {
            path: source.to_path_buf(),
            message: e.to_string(),
        })?;
        let request = self
            .http
            .put(self.object_url(path))
            .header(ACCESS_KEY_HEADER, &self.config.storage_access_key)
            .header(CONTENT_TYPE, "application/octet-stream")
            .body(body);
        self.send(CdnOperation::Upload, path.as_str(), request).await
    }

    async fn purge(&self, url_pattern: &str) -> Result<CdnResponse, CdnError> {
        let request = self
            .http
            .post(format!(
                "{}/purge",
                self.config.api_endpoint.trim_end_matches('/')
            ))
            .query(&[("url", url_pattern)])
            .header(ACCESS_KEY_HEADER, &self.config.access_key);
        self.send(CdnOperation::Purge, url_pattern, request).await
    }
}

#[cfg(test)]
mod tests {
    use mockito::Matcher;

    use super::*;

    fn client(server: &mockito::Server) -> BunnyCdnClient {
        let config = BunnyConfig::new(StorageZone::new("arena").unwrap(), "account-key")
            .with_storage_access_key("storage-key")
            .with_storage_endpoint(server.url())
            .with_api_endpoint(server.url());
        BunnyCdnClient::new(config).unwrap()
    }

    fn artifact() -> CdnPath {
        CdnPath::new("arena-pvp-game/downloads/linux-x64.zip").unwrap()
    }

    #[test]
    fn storage_key_defaults_to_account_key() {
        let config = BunnyConfig::new(StorageZone::new("zone").unwrap(), "k");
        assert_eq!(config.storage_access_key, "k");
        assert_eq!(config.storage_endpoint, BunnyConfig::DEFAULT_STORAGE_ENDPOINT);
    }

    #[tokio::test]
    async fn delete_targets_zone_path_with_storage_key() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("DELETE", "/arena/arena-pvp-game/downloads/linux-x64.zip")
            .match_header("accesskey", "storage-key")
            .with_status(200)
            .create_async()
            .await;

        let response = client(&server).delete_object(&artifact()).await.unwrap();

        assert!(response.is_success());
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn missing_object_is_reported_not_raised() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("DELETE", "/arena/arena-pvp-game/downloads/linux-x64.zip")
            .with_status(404)
            .create_async()
            .await;

        let response = client(&server).delete_object(&artifact()).await.unwrap();

        assert_eq!(response, CdnResponse::new(404));
    }

    #[tokio::test]
    async fn upload_puts_raw_file_bytes() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("PUT", "/arena/arena-pvp-game/downloads/linux-x64.zip")
            .match_header("accesskey", "storage-key")
            .match_header("content-type", "application/octet-stream")
            .match_body(Matcher::Exact("PK\u{3}\u{4}zip".to_string()))
            .with_status(201)
            .create_async()
            .await;
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("linux-x64.zip");
        std::fs::write(&source, b"PK\x03\x04zip").unwrap();

        let response = client(&server).upload_file(&artifact(), &source).await.unwrap();

        assert_eq!(response.status, 201);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn unreadable_source_issues_no_request() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("PUT", Matcher::Any)
            .expect(0)
            .create_async()
            .await;
        let dir = tempfile::tempdir().unwrap();

        let err = client(&server)
            .upload_file(&artifact(), &dir.path().join("absent.zip"))
            .await
            .unwrap_err();

        assert!(matches!(err, CdnError::Io { .. }), "{err:?}");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn purge_escapes_pattern_and_uses_account_key() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/purge")
            .match_query(Matcher::UrlEncoded(
                "url".to_string(),
                "https://arena.b-cdn.net/*".to_string(),
            ))
            .match_header("accesskey", "account-key")
            .with_status(204)
            .create_async()
            .await;

        let response = client(&server).purge("https://arena.b-cdn.net/*").await.unwrap();

        assert!(response.is_success());
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn unreachable_cdn_is_a_transport_error() {
        let config = BunnyConfig::new(StorageZone::new("arena").unwrap(), "k")
            .with_api_endpoint("http://127.0.0.1:1");

        let err = BunnyCdnClient::new(config)
            .unwrap()
            .purge("https://arena.b-cdn.net/*")
            .await
            .unwrap_err();

        assert!(
            matches!(err, CdnError::Transport { operation: CdnOperation::Purge, .. }),
            "{err:?}"
        );
    }
}
