//! Shared, rate-limited HTTP client used by every network-facing stage.
//!
//! [`ApiClient`] pairs one `reqwest::Client` with the process-wide
//! [`RateLimiter`] and a default per-request deadline. Every request takes a
//! limiter token first, then carries its own timeout, so an expired deadline
//! fails that request only.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::time::Duration;

use reqwest::{Client, ClientBuilder, Response};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::download::RateLimiter;
use crate::fetch::{SetupError, StageError};

const CONNECT_TIMEOUT_SECS: u64 = 10;

/// Rate-limited GET client with per-request deadlines.
///
/// Cheap to clone: the inner `reqwest::Client` and the limiter are both
/// reference-counted.
#[derive(Debug, Clone)]
pub struct ApiClient {
    client: Client,
    limiter: Arc<RateLimiter>,
    request_timeout: Duration,
}

impl ApiClient {
    /// Builds a client sending `user_agent` and drawing tokens from `limiter`.
    ///
    /// # Errors
    ///
    /// Returns [`SetupError::Client`] when the HTTP client cannot be built.
    pub fn new(
        user_agent: &str,
        limiter: Arc<RateLimiter>,
        request_timeout: Duration,
    ) -> Result<Self, SetupError> {
        let client = build_http_client(user_agent)?;
        Ok(Self {
            client,
            limiter,
            request_timeout,
        })
    }

    /// The shared limiter.
    #[must_use]
    pub fn limiter(&self) -> &Arc<RateLimiter> {
        &self.limiter
    }

    /// Default per-request deadline.
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    /// Issues a GET with the default deadline.
    ///
    /// # Errors
    ///
    /// Returns a transport-class [`StageError`] on connection failure, timeout
    /// or non-success status.
    pub async fn get(&self, url: &str) -> Result<Response, StageError> {
        self.get_with_timeout(url, self.request_timeout).await
    }

    /// Issues a GET with an explicit deadline.
    ///
    /// # Errors
    ///
    /// See [`ApiClient::get`].
    pub async fn get_with_timeout(
        &self,
        url: &str,
        timeout: Duration,
    ) -> Result<Response, StageError> {
        self.limiter.take().await;
        debug!(url, timeout_ms = timeout.as_millis(), "sending request");

        let response = self
            .client
            .get(url)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| StageError::from_reqwest(url, e))?;

        let status = response.status();
        if !status.is_success() {
            debug!(url, status = status.as_u16(), "non-success status");
            return Err(StageError::http_status(url, status.as_u16()));
        }
        Ok(response)
    }

    /// Issues a GET and decodes a JSON body.
    ///
    /// # Errors
    ///
    /// Transport failures as for [`ApiClient::get`]; a body that does not
    /// decode as `T` is [`StageError::Extraction`].
    pub async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T, StageError> {
        let response = self.get(url).await?;
        response.json::<T>().await.map_err(|e| {
            if e.is_decode() {
                StageError::extraction(url, format!("malformed JSON response: {e}"))
            } else {
                StageError::from_reqwest(url, e)
            }
        })
    }

    /// Issues a GET and returns the body as text.
    ///
    /// # Errors
    ///
    /// See [`ApiClient::get`].
    pub async fn get_text(&self, url: &str) -> Result<String, StageError> {
        let response = self.get(url).await?;
        response
            .text()
            .await
            .map_err(|e| StageError::from_reqwest(url, e))
    }

    /// Issues a GET and returns the raw body bytes.
    ///
    /// # Errors
    ///
    /// See [`ApiClient::get`].
    pub async fn get_bytes(&self, url: &str) -> Result<Vec<u8>, StageError> {
        let response = self.get(url).await?;
        response
            .bytes()
            .await
            .map(|bytes| bytes.to_vec())
            .map_err(|e| StageError::from_reqwest(url, e))
    }
}

/// Builds the shared `reqwest::Client`.
///
/// Some restricted sandboxes panic while reading system proxy settings; in
/// that case the client is rebuilt without system proxy lookup.
fn build_http_client(user_agent: &str) -> Result<Client, SetupError> {
    match try_build_client(user_agent, false) {
        Ok(client) => Ok(client),
        Err(BuildClientFailure::Panic) => {
            warn!("HTTP client hit system proxy panic; building without proxy lookup");
            match try_build_client(user_agent, true) {
                Ok(client) => Ok(client),
                Err(BuildClientFailure::Build(error)) => Err(SetupError::Client(error)),
                Err(BuildClientFailure::Panic) => Err(SetupError::ClientPanic),
            }
        }
        Err(BuildClientFailure::Build(error)) => Err(SetupError::Client(error)),
    }
}

enum BuildClientFailure {
    Panic,
    Build(reqwest::Error),
}

fn try_build_client(user_agent: &str, no_proxy: bool) -> Result<Client, BuildClientFailure> {
    let build = || {
        let mut builder = ClientBuilder::new()
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .user_agent(user_agent)
            .gzip(true);
        if no_proxy {
            builder = builder.no_proxy();
        }
        builder.build()
    };

    match catch_unwind(AssertUnwindSafe(build)) {
        Ok(Ok(client)) => Ok(client),
        Ok(Err(error)) => Err(BuildClientFailure::Build(error)),
        Err(_) => Err(BuildClientFailure::Panic),
    }
}
