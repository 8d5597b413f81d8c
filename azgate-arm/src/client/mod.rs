//! Azure Resource Manager REST client.
//!
//! Every ARM operation is described by a type implementing [`ApiRequest`]:
//! the HTTP method, API version, URL path and optional JSON body. The
//! resource-specific traits ([`GatewayApi`], [`SearchApi`]) are what the
//! handlers depend on, so tests can swap in fakes.

pub mod network;
pub mod search;

pub use network::GatewayApi;
pub use search::SearchApi;

use reqwest::{Method, StatusCode};
use serde::{Deserialize, Deserializer};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::{ArmError, Result};

/// Public Azure cloud management endpoint.
pub const DEFAULT_ENDPOINT: &str = "https://management.azure.com";

/// A single ARM REST operation.
pub trait ApiRequest: Send + Sync {
    type Response: DeserializeOwned;

    const API_VERSION: &'static str;
    const METHOD: Method;

    /// Path below the endpoint, starting with `/`.
    fn url_path(&self, subscription_id: &str) -> String;

    /// JSON body, if the request has one.
    fn body(&self) -> Result<Option<Value>> {
        Ok(None)
    }
}

/// Connection settings for [`ArmClient`].
#[derive(Debug, Clone)]
pub struct ArmConfig {
    pub endpoint: String,
    pub subscription_id: String,
    pub access_token: String,
}

impl ArmConfig {
    pub fn new(subscription_id: impl Into<String>, access_token: impl Into<String>) -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            subscription_id: subscription_id.into(),
            access_token: access_token.into(),
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }
}

/// Deserialize a field Azure may send as `null`, reading `null` as the default.
pub(crate) fn null_as_default<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Azure error envelope: `{"error": {"code": "...", "message": "..."}}`.
#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    #[serde(default)]
    code: String,
    #[serde(default)]
    message: String,
}

/// HTTP client for the ARM control plane.
#[derive(Debug, Clone)]
pub struct ArmClient {
    http: reqwest::Client,
    config: ArmConfig,
}

impl ArmClient {
    pub fn new(config: ArmConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            config,
        }
    }

    pub fn subscription_id(&self) -> &str {
        &self.config.subscription_id
    }

    /// Send a request and decode its response.
    ///
    /// 404 maps to [`ArmError::NotFound`]; other failures are decoded from
    /// the Azure error body into [`ArmError::Api`].
    pub async fn send<R: ApiRequest>(&self, request: &R) -> Result<R::Response> {
        let path = request.url_path(&self.config.subscription_id);
        let url = format!("{}{}", self.config.endpoint.trim_end_matches('/'), path);
        let body = request.body()?;
        debug!(method = %R::METHOD, url = %url, "Sending ARM request");

        let mut builder = self
            .http
            .request(R::METHOD, &url)
            .bearer_auth(&self.config.access_token)
            .query(&[("api-version", R::API_VERSION)]);
        if let Some(body) = body {
            builder = builder.json(&body);
        }

        let response = builder.send().await?;
        let status = response.status();
        let bytes = response.bytes().await?;

        if status == StatusCode::NOT_FOUND {
            debug!(url = %url, "Resource not found");
            return Err(ArmError::NotFound(path));
        }
        if !status.is_success() {
            let err = api_error(status, &bytes);
            warn!(url = %url, status = status.as_u16(), error = %err, "ARM request failed");
            return Err(err);
        }

        // DELETE and some async operations answer with an empty body.
        let bytes: &[u8] = if bytes.is_empty() { b"null" } else { &bytes };
        serde_json::from_slice(bytes).map_err(|source| ArmError::Decode { url, source })
    }
}

fn api_error(status: StatusCode, body: &[u8]) -> ArmError {
    match serde_json::from_slice::<ErrorResponse>(body) {
        Ok(resp) => ArmError::Api {
            status: status.as_u16(),
            code: resp.error.code,
            message: resp.error.message,
        },
        Err(_) => ArmError::Api {
            status: status.as_u16(),
            code: status
                .canonical_reason()
                .unwrap_or("Unknown")
                .replace(' ', ""),
            message: String::from_utf8_lossy(body).into_owned(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_error_from_azure_body() {
        let body = br#"{"error": {"code": "InvalidGatewaySku", "message": "Sku Foo is not valid"}}"#;
        match api_error(StatusCode::BAD_REQUEST, body) {
            ArmError::Api {
                status,
                code,
                message,
            } => {
                assert_eq!(status, 400);
                assert_eq!(code, "InvalidGatewaySku");
                assert_eq!(message, "Sku Foo is not valid");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_api_error_from_plain_body() {
        match api_error(StatusCode::SERVICE_UNAVAILABLE, b"upstream unavailable") {
            ArmError::Api { code, message, .. } => {
                assert_eq!(code, "ServiceUnavailable");
                assert_eq!(message, "upstream unavailable");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    struct TupleKeyedBody;

    impl ApiRequest for TupleKeyedBody {
        type Response = serde::de::IgnoredAny;

        const API_VERSION: &'static str = "2016-09-01";
        const METHOD: Method = Method::PUT;

        fn url_path(&self, subscription_id: &str) -> String {
            format!("/subscriptions/{subscription_id}/resourceGroups/rg")
        }

        fn body(&self) -> Result<Option<Value>> {
            // JSON object keys must be strings.
            let map = std::collections::BTreeMap::from([((1u8, 2u8), "v")]);
            serde_json::to_value(map).map(Some).map_err(ArmError::Encode)
        }
    }

    #[tokio::test]
    async fn test_body_encode_failure_is_not_sent() {
        // Nothing listens on port 1; reaching the network would yield Http.
        let client = ArmClient::new(ArmConfig::new("sub", "token").with_endpoint("http://127.0.0.1:1"));

        let err = client.send(&TupleKeyedBody).await.unwrap_err();
        assert!(matches!(err, ArmError::Encode(_)), "got {err:?}");
    }

    #[test]
    fn test_config_endpoint() {
        let config = ArmConfig::new("sub", "token");
        assert_eq!(config.endpoint, DEFAULT_ENDPOINT);
        let config = config.with_endpoint("http://127.0.0.1:8080");
        assert_eq!(config.endpoint, "http://127.0.0.1:8080");
    }
}
