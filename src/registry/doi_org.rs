//! doi.org handle API client: answers "is this DOI registered?".

use reqwest::StatusCode;
use serde::Deserialize;
use tracing::{debug, instrument};

use crate::fetch::StageError;
use crate::parser::doi_url_path;

use super::ApiClient;

/// Default identifier-resolution registry base URL.
pub const DEFAULT_DOI_REGISTRY_URL: &str = "https://doi.org";

/// Handle API response code for a found handle.
const HANDLE_FOUND: i64 = 1;

#[derive(Debug, Deserialize)]
struct HandleResponse {
    #[serde(rename = "responseCode")]
    response_code: i64,
}

/// Client for the identifier-resolution registry.
#[derive(Debug, Clone)]
pub struct DoiRegistry {
    api: ApiClient,
    base_url: String,
}

impl DoiRegistry {
    /// Creates a client against `base_url` (use [`DEFAULT_DOI_REGISTRY_URL`] in production).
    pub fn new(api: ApiClient, base_url: impl Into<String>) -> Self {
        Self {
            api,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn handle_url(&self, doi: &str) -> String {
        // The handle API addresses the DOI as a path, prefix slash included.
        format!("{}/api/handles/{}?type=none", self.base_url, doi_url_path(doi))
    }

    /// Checks whether `doi` is registered.
    ///
    /// HTTP 200 with `responseCode == 1` is registered; HTTP 404 or any other
    /// response code is not.
    ///
    /// # Errors
    ///
    /// Transport errors other than 404, and malformed bodies.
    #[instrument(skip(self))]
    pub async fn is_registered(&self, doi: &str) -> Result<bool, StageError> {
        let url = self.handle_url(doi);
        match self.api.get_json::<HandleResponse>(&url).await {
            Ok(response) => {
                debug!(response_code = response.response_code, "handle lookup answered");
                Ok(response.response_code == HANDLE_FOUND)
            }
            Err(StageError::HttpStatus { status, .. }) if status == StatusCode::NOT_FOUND.as_u16() => {
                debug!("handle not found");
                Ok(false)
            }
            Err(error) => Err(error),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, ResponseTemplate};

    use super::*;
    use crate::download::RateLimiter;
    use crate::test_support::socket_guard::start_mock_server_or_skip;

    fn registry(base_url: &str) -> DoiRegistry {
        let api = ApiClient::new(
            "bibfetch-test/0",
            Arc::new(RateLimiter::disabled()),
            Duration::from_secs(5),
        )
        .unwrap();
        DoiRegistry::new(api, base_url)
    }

    #[test]
    fn test_handle_url_keeps_slash_and_encodes_segments() {
        let r = registry("https://doi.org/");
        assert_eq!(
            r.handle_url("10.1002/(SICI)1097 x"),
            "https://doi.org/api/handles/10.1002/%28SICI%291097%20x?type=none"
        );
    }

    #[tokio::test]
    async fn test_is_registered_true_for_response_code_one() {
        let Some(server) = start_mock_server_or_skip().await else {
            return;
        };
        Mock::given(method("GET"))
            .and(path("/api/handles/10.1000/182"))
            .and(query_param("type", "none"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "responseCode": 1,
                "handle": "10.1000/182"
            })))
            .expect(1)
            .mount(&server)
            .await;

        assert!(registry(&server.uri()).is_registered("10.1000/182").await.unwrap());
    }

    #[tokio::test]
    async fn test_is_registered_false_for_404() {
        let Some(server) = start_mock_server_or_skip().await else {
            return;
        };
        Mock::given(method("GET"))
            .and(path("/api/handles/10.1000/nope"))
            .respond_with(ResponseTemplate::new(404).set_body_json(serde_json::json!({
                "responseCode": 100,
                "handle": "10.1000/nope"
            })))
            .mount(&server)
            .await;

        assert!(!registry(&server.uri()).is_registered("10.1000/nope").await.unwrap());
    }

    #[tokio::test]
    async fn test_is_registered_false_for_other_response_code() {
        let Some(server) = start_mock_server_or_skip().await else {
            return;
        };
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "responseCode": 200
            })))
            .mount(&server)
            .await;

        assert!(!registry(&server.uri()).is_registered("10.1000/x").await.unwrap());
    }

    #[tokio::test]
    async fn test_is_registered_server_error_propagates() {
        let Some(server) = start_mock_server_or_skip().await else {
            return;
        };
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let err = registry(&server.uri()).is_registered("10.1000/x").await.unwrap_err();
        assert!(matches!(err, StageError::HttpStatus { status: 500, .. }));
    }
}
