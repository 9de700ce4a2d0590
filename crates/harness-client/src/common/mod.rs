//! Common utilities for the Harness API client
//!
//! Provides the authenticated, retrying HTTP wrapper used by every endpoint.

pub mod retry;

use crate::error::HarnessError;
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use retry::RetryPolicy;
use serde::Deserialize;
use tracing::{debug, warn};

/// Header carrying the Harness API key
pub const API_KEY_HEADER: &str = "x-api-key";

/// Picks the API key for a request: a non-empty value of the environment
/// variable wins, otherwise the credentials the client was built with.
pub fn resolve_api_key(env_value: Option<String>, credentials: &str) -> Option<String> {
    match env_value {
        Some(key) if !key.trim().is_empty() => Some(key.trim().to_string()),
        _ if !credentials.trim().is_empty() => Some(credentials.trim().to_string()),
        _ => None,
    }
}

/// HTTP client wrapper with authentication and retries
#[derive(Debug)]
pub struct HttpClient {
    client: Client,
    base_url: String,
    credentials: String,
    api_key_env: Option<String>,
    retry: RetryPolicy,
}

impl HttpClient {
    /// Create a new HTTP client wrapper
    pub fn new(
        client: Client,
        base_url: String,
        credentials: String,
        api_key_env: Option<String>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            credentials,
            api_key_env,
            retry,
        }
    }

    /// Get the base URL
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Build a full URL from a path
    pub fn build_url(&self, path: &str) -> String {
        if path.starts_with("http") {
            path.to_string()
        } else {
            format!("{}{}", self.base_url, path)
        }
    }

    /// API key for the next request, read from the environment on every call
    fn api_key(&self) -> Result<String, HarnessError> {
        let env_value = self
            .api_key_env
            .as_deref()
            .and_then(|name| std::env::var(name).ok());
        resolve_api_key(env_value, &self.credentials).ok_or_else(|| {
            HarnessError::Authentication("no Harness API key configured".to_string())
        })
    }

    fn request(&self, method: Method, url: &str, api_key: &str) -> RequestBuilder {
        self.client
            .request(method, url)
            .header(API_KEY_HEADER, api_key)
            .header("Accept", "application/json")
    }

    /// Send a request, retrying transport failures and retryable statuses.
    ///
    /// The last response is returned as-is once retries are exhausted.
    async fn send_with_retry<F>(&self, build: F) -> Result<Response, HarnessError>
    where
        F: Fn() -> RequestBuilder,
    {
        let mut attempt = 0;
        loop {
            match build().send().await {
                Ok(response) => {
                    let status = response.status();
                    if RetryPolicy::should_retry_status(status) && attempt < self.retry.max_retries {
                        let delay = self.retry.delay_for_response(attempt, status, response.headers());
                        warn!("{} from {}, retrying in {:?}", status, response.url(), delay);
                        tokio::time::sleep(delay).await;
                        attempt += 1;
                        continue;
                    }
                    return Ok(response);
                }
                Err(e) if RetryPolicy::should_retry_error(&e) && attempt < self.retry.max_retries => {
                    let delay = self.retry.delay(attempt);
                    warn!("Request failed ({}), retrying in {:?}", e, delay);
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(HarnessError::Http(e)),
            }
        }
    }

    /// Make a GET request
    pub async fn get<T: for<'de> Deserialize<'de>>(&self, path: &str) -> Result<T, HarnessError> {
        let url = self.build_url(path);
        let api_key = self.api_key()?;
        debug!("GET {}", url);

        let response = self
            .send_with_retry(|| self.request(Method::GET, &url, &api_key))
            .await?;
        Self::decode(response, "GET", path).await
    }

    /// Make a POST request
    pub async fn post<T: for<'de> Deserialize<'de>>(
        &self,
        path: &str,
        body: &serde_json::Value,
    ) -> Result<T, HarnessError> {
        let url = self.build_url(path);
        let api_key = self.api_key()?;
        debug!("POST {} with body: {}", url, body);

        let response = self
            .send_with_retry(|| {
                self.request(Method::POST, &url, &api_key)
                    .header("Content-Type", "application/json")
                    .json(body)
            })
            .await?;
        Self::decode(response, "POST", path).await
    }

    async fn decode<T: for<'de> Deserialize<'de>>(
        response: Response,
        method: &str,
        path: &str,
    ) -> Result<T, HarnessError> {
        let status = response.status();
        let body = response.text().await.map_err(HarnessError::Http)?;

        if status == StatusCode::NOT_FOUND {
            return Err(HarnessError::NotFound(format!(
                "Resource not found: {} - {}",
                path, body
            )));
        }

        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(HarnessError::Authentication(format!(
                "{} {} rejected: {} - {}",
                method, path, status, body
            )));
        }

        if !status.is_success() {
            return Err(HarnessError::Api(format!(
                "{} {} failed: {} - {}",
                method, path, status, body
            )));
        }

        Ok(serde_json::from_str(&body)?)
    }

    /// Build query string from filters, skipping empty values
    pub fn build_query_string(filters: &[(&str, &str)]) -> String {
        filters
            .iter()
            .filter(|(_, v)| !v.is_empty())
            .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
            .collect::<Vec<_>>()
            .join("&")
    }
}
