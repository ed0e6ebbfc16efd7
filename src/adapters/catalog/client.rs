//! HTTP working-state catalog client
//!
//! Resolves descriptors with `GET {base_url}/working-states/{id}`. Failed
//! lookups are not retried; callers decide what a miss means.

use super::StateCatalog;
use crate::config::schema::StateCatalogConfig;
use crate::domain::{wire, CatalogError, MedSyncError, Result, WorkingStateDescriptor};
use async_trait::async_trait;
use reqwest::{Client, ClientBuilder, StatusCode};
use secrecy::ExposeSecret;
use std::time::Duration;
use url::Url;

/// Catalog backed by the remote HTTP service
pub struct HttpStateCatalog {
    base_url: Url,
    client: Client,
    config: StateCatalogConfig,
}

impl HttpStateCatalog {
    /// Create a new catalog client
    ///
    /// # Errors
    ///
    /// Returns a configuration error if `base_url` is not an absolute http(s)
    /// URL or the HTTP client cannot be built.
    pub fn new(config: StateCatalogConfig) -> Result<Self> {
        let base_url = Url::parse(config.base_url.trim_end_matches('/')).map_err(|e| {
            MedSyncError::Configuration(format!(
                "Invalid state_catalog.base_url '{}': {}",
                config.base_url, e
            ))
        })?;
        if !matches!(base_url.scheme(), "http" | "https") {
            return Err(MedSyncError::Configuration(format!(
                "state_catalog.base_url must use http or https, got '{}'",
                base_url.scheme()
            )));
        }

        let mut builder = ClientBuilder::new()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .connect_timeout(Duration::from_secs(config.timeout_seconds.min(30)));

        if !config.tls_verify {
            tracing::warn!("TLS verification disabled for state catalog");
            builder = builder.danger_accept_invalid_certs(true);
        }

        let client = builder.build().map_err(|e| {
            MedSyncError::Configuration(format!("Failed to build HTTP client: {}", e))
        })?;

        Ok(Self {
            base_url,
            client,
            config,
        })
    }

    fn descriptor_url(&self, id: i64) -> String {
        format!(
            "{}/working-states/{}",
            self.base_url.as_str().trim_end_matches('/'),
            id
        )
    }

    async fn fetch(&self, id: i64) -> std::result::Result<WorkingStateDescriptor, CatalogError> {
        let url = self.descriptor_url(id);
        tracing::debug!(url = %url, state_id = id, "Resolving working-state descriptor");

        let mut request = self.client.get(&url).header("Accept", "application/json");
        if let Some(token) = &self.config.api_token {
            request = request.bearer_auth(token.expose_secret().as_ref());
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                CatalogError::Timeout(e.to_string())
            } else {
                CatalogError::ConnectionFailed(e.to_string())
            }
        })?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(CatalogError::StateNotFound(id));
        }
        if status.is_server_error() {
            let message = response.text().await.unwrap_or_default();
            return Err(CatalogError::ServerError {
                status: status.as_u16(),
                message,
            });
        }
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(CatalogError::ClientError {
                status: status.as_u16(),
                message,
            });
        }

        let body = response
            .json::<serde_json::Value>()
            .await
            .map_err(|e| CatalogError::InvalidResponse(e.to_string()))?;

        // The catalog shares the HIS driver, so ids may arrive as split words
        serde_json::from_value(wire::decode_deep(body))
            .map_err(|e| CatalogError::InvalidResponse(e.to_string()))
    }
}

#[async_trait]
impl StateCatalog for HttpStateCatalog {
    async fn describe(&self, id: i64) -> Result<WorkingStateDescriptor> {
        Ok(self.fetch(id).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::secret_string;

    fn config(base_url: &str) -> StateCatalogConfig {
        StateCatalogConfig {
            base_url: base_url.to_string(),
            api_token: None,
            timeout_seconds: 5,
            tls_verify: true,
        }
    }

    #[tokio::test]
    async fn test_describe_parses_descriptor() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/working-states/7")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"id":7,"code":"EXPORTED","name":"All exported","sortOrder":2,
                    "createdBy":"admin","version":3,"isActive":true}"#,
            )
            .create_async()
            .await;

        let catalog = HttpStateCatalog::new(config(&server.url())).unwrap();
        let descriptor = catalog.describe(7).await.unwrap();

        assert_eq!(descriptor.id, 7);
        assert_eq!(descriptor.code, "EXPORTED");
        assert_eq!(descriptor.sort_order, 2);
        assert_eq!(descriptor.version, Some(3));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_describe_sends_bearer_token() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/working-states/1")
            .match_header("authorization", "Bearer s3cret")
            .with_status(200)
            .with_body(r#"{"id":1,"code":"A","name":"A"}"#)
            .create_async()
            .await;

        let mut cfg = config(&format!("{}/", server.url()));
        cfg.api_token = Some(secret_string("s3cret".to_string()));
        let catalog = HttpStateCatalog::new(cfg).unwrap();

        catalog.describe(1).await.unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_missing_descriptor_is_not_found() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/working-states/99")
            .with_status(404)
            .create_async()
            .await;

        let catalog = HttpStateCatalog::new(config(&server.url())).unwrap();
        let err = catalog.describe(99).await.unwrap_err();
        assert_eq!(err.code(), "not_found");
    }

    #[tokio::test]
    async fn test_server_error_is_upstream_unavailable() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/working-states/5")
            .with_status(503)
            .with_body("maintenance")
            .expect(1)
            .create_async()
            .await;

        let catalog = HttpStateCatalog::new(config(&server.url())).unwrap();
        let err = catalog.describe(5).await.unwrap_err();
        assert_eq!(err.code(), "upstream_unavailable");
        assert!(err.is_retryable());
        // no retry
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_garbage_body_is_invalid_response() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/working-states/5")
            .with_status(200)
            .with_body("not json")
            .create_async()
            .await;

        let catalog = HttpStateCatalog::new(config(&server.url())).unwrap();
        let err = catalog.describe(5).await.unwrap_err();
        assert!(matches!(err, MedSyncError::UpstreamUnavailable(_)));
        assert!(err.to_string().contains("Invalid response"));
    }

    #[tokio::test]
    async fn test_split_word_fields_are_decoded() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/working-states/30")
            .with_status(200)
            .with_body(r#"{"id":{"low":30,"high":0},"code":"DONE","name":"Done","version":{"lowWord":2,"highWord":0}}"#)
            .create_async()
            .await;

        let catalog = HttpStateCatalog::new(config(&server.url())).unwrap();
        let descriptor = catalog.describe(30).await.unwrap();
        assert_eq!(descriptor.id, 30);
        assert_eq!(descriptor.version, Some(2));
    }

    #[test]
    fn test_rejects_invalid_base_url() {
        assert!(matches!(
            HttpStateCatalog::new(config("not a url")),
            Err(MedSyncError::Configuration(_))
        ));
        assert!(matches!(
            HttpStateCatalog::new(config("ftp://catalog.local")),
            Err(MedSyncError::Configuration(_))
        ));
    }
}
