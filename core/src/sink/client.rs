use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue};
use tracing::{debug, warn};

use crate::config::ApiConfig;
use crate::errors::{ConfigError, DeliveryError, ImportError};
use crate::sink::request::{
    ApiRequest, BulkTrackEventRequest, BulkUserUpdateRequest, TrackPurchaseRequest,
};

/// Status and body of a response from the remote API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiResponse {
    pub status: u16,
    pub body: String,
}

impl ApiResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// Client and server errors both count as a failed delivery.
    pub fn is_error(&self) -> bool {
        self.status >= 400
    }
}

/// Delivery backend for the three supported endpoints.
///
/// An `Ok` result means a response was received, whatever its status.
/// `Err` is reserved for requests that never got a response.
#[allow(async_fn_in_trait)]
pub trait ApiClient {
    async fn bulk_update_users(
        &self,
        request: &BulkUserUpdateRequest,
    ) -> Result<ApiResponse, DeliveryError>;

    async fn bulk_track_events(
        &self,
        request: &BulkTrackEventRequest,
    ) -> Result<ApiResponse, DeliveryError>;

    async fn track_purchase(
        &self,
        request: &TrackPurchaseRequest,
    ) -> Result<ApiResponse, DeliveryError>;
}

pub struct HttpApiClient {
    http_client: reqwest::Client,
    base_url: String,
    max_retries: u32,
}

impl HttpApiClient {
    pub fn new(config: &ApiConfig) -> Result<Self, ImportError> {
        config.validate()?;

        let mut headers = HeaderMap::new();
        let api_key = HeaderValue::from_str(&config.api_key).map_err(|_| ConfigError::Invalid {
            message: "api_key contains characters not allowed in a header".to_string(),
        })?;
        headers.insert("Api-Key", api_key);

        let http_client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| DeliveryError::ClientCreation {
                reason: e.to_string(),
            })?;

        Ok(Self {
            http_client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            max_retries: config.max_retries,
        })
    }

    fn url_for<T: ApiRequest>(&self) -> String {
        format!("{}/{}", self.base_url, T::PATH)
    }

    /// Posts the request as JSON. Only transport failures are retried; any
    /// HTTP response, error statuses included, is returned as is.
    async fn post<T: ApiRequest>(&self, request: &T) -> Result<ApiResponse, DeliveryError> {
        let url = self.url_for::<T>();
        let mut attempt = 0;

        let response = loop {
            attempt += 1;
            debug!("making request {} (attempt {})", url, attempt);
            match self.http_client.post(&url).json(request).send().await {
                Ok(response) => break response,
                Err(e) if attempt < self.max_retries => {
                    warn!(
                        "Request to {} failed (attempt {}/{}): {}",
                        url, attempt, self.max_retries, e
                    );
                }
                Err(e) => {
                    return Err(DeliveryError::Transport {
                        url,
                        attempts: attempt,
                        reason: e.to_string(),
                    });
                }
            }
        };

        let status = response.status().as_u16();
        let body = response.text().await.map_err(|e| DeliveryError::Body {
            url: url.clone(),
            reason: e.to_string(),
        })?;
        debug!("got response {} {} {}", url, status, body);

        Ok(ApiResponse { status, body })
    }
}

impl ApiClient for HttpApiClient {
    async fn bulk_update_users(
        &self,
        request: &BulkUserUpdateRequest,
    ) -> Result<ApiResponse, DeliveryError> {
        self.post(request).await
    }

    async fn bulk_track_events(
        &self,
        request: &BulkTrackEventRequest,
    ) -> Result<ApiResponse, DeliveryError> {
        self.post(request).await
    }

    async fn track_purchase(
        &self,
        request: &TrackPurchaseRequest,
    ) -> Result<ApiResponse, DeliveryError> {
        self.post(request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_response_error_classification() {
        assert!(!ApiResponse::new(200, "{}").is_error());
        assert!(!ApiResponse::new(302, "").is_error());
        assert!(ApiResponse::new(400, "bad request").is_error());
        assert!(ApiResponse::new(503, "").is_error());
    }

    #[test]
    fn test_client_creation_rejects_empty_api_key() {
        let result = HttpApiClient::new(&ApiConfig::new(""));
        assert!(matches!(
            result,
            Err(ImportError::Config(ConfigError::MissingField { .. }))
        ));
    }

    #[test]
    fn test_client_creation_rejects_zero_retries() {
        let mut config = ApiConfig::new("some_api_key");
        config.max_retries = 0;
        assert!(HttpApiClient::new(&config).is_err());
    }

    #[test]
    fn test_urls_are_joined_without_double_slash() {
        let mut config = ApiConfig::new("some_api_key");
        config.base_url = "http://localhost:8080/api/".to_string();

        let client = HttpApiClient::new(&config).unwrap();
        assert_eq!(
            client.url_for::<BulkUserUpdateRequest>(),
            "http://localhost:8080/api/users/bulkUpdate"
        );
        assert_eq!(
            client.url_for::<TrackPurchaseRequest>(),
            "http://localhost:8080/api/commerce/trackPurchase"
        );
    }
}
