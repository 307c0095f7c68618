//! Reqwest-based HTTP client for the KAM service.

use std::time::Duration;

use kam_core::wire::{
    AllRecords, AuthorizeRequest, CheckRequest, CheckResponse, ErrorBody, HealthResponse,
    PackageRecords, ResetResponse, RevokeRequest, RevokeResponse,
};
use kam_core::{AuthorizationRecord, RecordId};
use reqwest::{Client, RequestBuilder, Url};
use serde::de::DeserializeOwned;

use crate::error::{ClientError, Result};

/// Per-request timeout unless overridden with [`KamClient::with_timeout`].
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// KAM HTTP client.
#[derive(Debug, Clone)]
pub struct KamClient {
    client: Client,
    base_url: Url,
}

impl KamClient {
    /// Create a client for the service at `base_url`, e.g. `http://127.0.0.1:8000`.
    pub fn new(base_url: &str) -> Result<Self> {
        Self::with_timeout(base_url, DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(base_url: &str, timeout: Duration) -> Result<Self> {
        let base_url = Url::parse(base_url)
            .map_err(|e| ClientError::InvalidUrl(format!("{}: {}", base_url, e)))?;
        if base_url.cannot_be_a_base() {
            return Err(ClientError::InvalidUrl(base_url.to_string()));
        }
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client, base_url })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Build `base_url/<segments...>`, percent-encoding each segment.
    fn url(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| ClientError::InvalidUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T> {
        let response = request.send().await?;
        let status = response.status();

        if status.is_success() {
            return Ok(response.json::<T>().await?);
        }

        let body = response.bytes().await?;
        let err = match serde_json::from_slice::<ErrorBody>(&body) {
            Ok(ErrorBody { error, message }) => ClientError::Api {
                status: status.as_u16(),
                code: error,
                message,
            },
            Err(_) => ClientError::Api {
                status: status.as_u16(),
                code: "http_error".to_string(),
                message: String::from_utf8_lossy(&body).into_owned(),
            },
        };
        tracing::debug!(%status, error = %err, "kam request failed");
        Err(err)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Mutations
    // ─────────────────────────────────────────────────────────────────────────

    /// `POST /authorize`
    pub async fn authorize(
        &self,
        package_name: &str,
        identity: &str,
        ttl_seconds: i64,
    ) -> Result<AuthorizationRecord> {
        let body = AuthorizeRequest {
            package_name: package_name.to_string(),
            identity: identity.to_string(),
            ttl_seconds,
        };
        self.send(self.client.post(self.url(&["authorize"])?).json(&body))
            .await
    }

    /// `POST /revoke`
    pub async fn revoke(&self, package_name: &str, identity: &str) -> Result<RevokeResponse> {
        let body = RevokeRequest {
            package_name: package_name.to_string(),
            identity: identity.to_string(),
        };
        self.send(self.client.post(self.url(&["revoke"])?).json(&body))
            .await
    }

    /// `POST /admin/reset`
    pub async fn reset(&self) -> Result<ResetResponse> {
        self.send(self.client.post(self.url(&["admin", "reset"])?))
            .await
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Queries
    // ─────────────────────────────────────────────────────────────────────────

    /// `GET /check` evaluated at the server's current time.
    pub async fn check(&self, package_name: &str, identity: &str) -> Result<CheckResponse> {
        self.check_request(package_name, identity, None).await
    }

    /// `GET /check` evaluated at `at_time` (Unix ms).
    pub async fn check_at(
        &self,
        package_name: &str,
        identity: &str,
        at_time: i64,
    ) -> Result<CheckResponse> {
        self.check_request(package_name, identity, Some(at_time)).await
    }

    async fn check_request(
        &self,
        package_name: &str,
        identity: &str,
        at_time: Option<i64>,
    ) -> Result<CheckResponse> {
        let query = CheckRequest {
            package_name: package_name.to_string(),
            identity: identity.to_string(),
            at_time,
        };
        self.send(self.client.get(self.url(&["check"])?).query(&query))
            .await
    }

    /// `GET /packages/{package_name}`
    pub async fn list_package(&self, package_name: &str) -> Result<PackageRecords> {
        self.send(self.client.get(self.url(&["packages", package_name])?))
            .await
    }

    /// Identities holding an active authorization for a package at `at`.
    pub async fn authorized_identities(&self, package_name: &str, at: i64) -> Result<Vec<String>> {
        let listing = self.list_package(package_name).await?;
        Ok(listing
            .records
            .into_iter()
            .filter(|r| r.is_active(at))
            .map(|r| r.identity.into_inner())
            .collect())
    }

    /// `GET /records/{record_id}`
    pub async fn get_record(&self, record_id: RecordId) -> Result<AuthorizationRecord> {
        let id = record_id.to_string();
        self.send(self.client.get(self.url(&["records", &id])?))
            .await
    }

    /// `GET /all`
    pub async fn list_all(&self) -> Result<AllRecords> {
        self.send(self.client.get(self.url(&["all"])?)).await
    }

    /// `GET /health`
    pub async fn health(&self) -> Result<HealthResponse> {
        self.send(self.client.get(self.url(&["health"])?)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_unparseable_base_url() {
        assert!(matches!(
            KamClient::new("not a url"),
            Err(ClientError::InvalidUrl(_))
        ));
        assert!(matches!(
            KamClient::new("mailto:dev@example.com"),
            Err(ClientError::InvalidUrl(_))
        ));
    }

    #[test]
    fn test_url_joins_and_encodes_segments() {
        let client = KamClient::new("http://127.0.0.1:8000").unwrap();
        assert_eq!(
            client.url(&["packages", "left-pad"]).unwrap().as_str(),
            "http://127.0.0.1:8000/packages/left-pad"
        );
        assert_eq!(
            client.url(&["packages", "@scope/name"]).unwrap().as_str(),
            "http://127.0.0.1:8000/packages/@scope%2Fname"
        );
    }

    #[test]
    fn test_url_keeps_base_path_prefix() {
        let client = KamClient::new("http://kam.internal/api/").unwrap();
        assert_eq!(
            client.url(&["admin", "reset"]).unwrap().as_str(),
            "http://kam.internal/api/admin/reset"
        );
    }

    #[tokio::test]
    async fn test_connection_refused_is_transport_error() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let base = format!("http://{}", addr);
        let client = KamClient::with_timeout(&base, Duration::from_secs(2)).unwrap();
        let err = client.health().await.unwrap_err();
        assert!(matches!(err, ClientError::Transport(_)));
        assert_eq!(err.code(), None);
    }
}
