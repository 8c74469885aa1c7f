//! Direct network execution: status mapping, retry, body decoding.
//!
//! This is the ONLY place for status code handling.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, USER_AGENT};
use reqwest::StatusCode;
use serde_json::Value;
use tracing::{debug, warn};

use super::NetworkExecutor;
use crate::config::ClientConfig;
use crate::error::{ApiError, ApiResult};
use crate::types::{Method, NetworkRequest};

pub const USER_AGENT_VALUE: &str = concat!("apicache/", env!("CARGO_PKG_VERSION"));

const MAX_ERROR_MESSAGE: usize = 500;

/// Executes requests with this process's own network access.
#[derive(Debug, Clone)]
pub struct DirectExecutor {
    client: reqwest::Client,
    base_url: Option<String>,
    max_retries: u32,
}

impl DirectExecutor {
    pub fn new(config: &ClientConfig) -> ApiResult<Self> {
        let mut default_headers = HeaderMap::new();
        default_headers.insert(USER_AGENT, HeaderValue::from_static(USER_AGENT_VALUE));

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .default_headers(default_headers)
            .build()
            .map_err(|e| ApiError::Network {
                message: format!("failed to create HTTP client: {}", e),
            })?;

        if let Some(base) = &config.base_url {
            url::Url::parse(base).map_err(|e| ApiError::Config {
                message: format!("invalid base URL {}: {}", base, e),
            })?;
        }

        Ok(Self {
            client,
            base_url: config
                .base_url
                .as_ref()
                .map(|b| b.trim_end_matches('/').to_string()),
            max_retries: config.max_retries,
        })
    }

    /// Absolute URL for a request URL.
    ///
    /// Absolute URLs pass through; relative ones are appended to the base.
    pub fn resolve_url(&self, url: &str) -> ApiResult<url::Url> {
        if let Ok(absolute) = url::Url::parse(url) {
            return Ok(absolute);
        }

        let base = self.base_url.as_ref().ok_or_else(|| ApiError::InvalidRequest {
            message: format!("relative URL {} with no base URL configured", url),
        })?;
        let joined = format!("{}/{}", base, url.trim_start_matches('/'));
        url::Url::parse(&joined).map_err(|e| ApiError::InvalidRequest {
            message: format!("invalid URL {}: {}", joined, e),
        })
    }

    async fn execute_with_retry(&self, request: &NetworkRequest) -> ApiResult<Value> {
        use rand::Rng;

        let url = self.resolve_url(&request.url)?;
        let max_retries = if request.method.is_idempotent() {
            self.max_retries
        } else {
            0
        };
        let mut retries = 0;

        loop {
            match self.execute_once(request, &url).await {
                Ok(body) => return Ok(body),
                Err(e) if e.is_retryable() && retries < max_retries => {
                    retries += 1;

                    let backoff = match &e {
                        ApiError::RateLimited {
                            retry_after: Some(retry_after),
                        } => {
                            let capped = (*retry_after).min(Duration::from_secs(30));
                            let base_ms = capped.as_millis() as u64;
                            let jitter_factor: f64 =
                                rand::thread_rng().gen_range(0.9_f64..=1.1_f64);
                            let jittered_ms = ((base_ms as f64) * jitter_factor).round() as u64;
                            Duration::from_millis(jittered_ms.max(100))
                        }
                        _ => {
                            let factor = 1u64 << retries.min(16);
                            let base_backoff = Duration::from_millis(250u64.saturating_mul(factor))
                                .min(Duration::from_secs(30));
                            let jittered_ms =
                                rand::thread_rng().gen_range(0..=base_backoff.as_millis() as u64);
                            Duration::from_millis(jittered_ms.max(10))
                        }
                    };

                    warn!(
                        error = %e,
                        retry = retries,
                        max_retries = max_retries,
                        backoff_ms = backoff.as_millis(),
                        "retrying request"
                    );

                    tokio::time::sleep(backoff).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn execute_once(&self, request: &NetworkRequest, url: &url::Url) -> ApiResult<Value> {
        let mut builder = self
            .client
            .request(reqwest::Method::from(request.method), url.clone());

        for (name, value) in &request.headers {
            let name = HeaderName::from_bytes(name.as_bytes()).map_err(|e| {
                ApiError::InvalidRequest {
                    message: format!("invalid header name {}: {}", name, e),
                }
            })?;
            let value = HeaderValue::from_str(value).map_err(|e| ApiError::InvalidRequest {
                message: format!("invalid header value for {}: {}", name.as_str(), e),
            })?;
            builder = builder.header(name, value);
        }

        if let Some(data) = &request.data {
            builder = builder.json(data);
        }

        let response = builder.send().await?;
        let status = response.status();

        if status.is_success() {
            if request.method == Method::Head || status == StatusCode::NO_CONTENT {
                return Ok(Value::Null);
            }
            let text = response.text().await.map_err(|e| ApiError::Network {
                message: format!("failed to read response body: {}", e),
            })?;
            return Ok(decode_body(&text));
        }

        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok())
                .map(Duration::from_secs);
            return Err(ApiError::RateLimited { retry_after });
        }

        let body = response.text().await.unwrap_or_default();
        let message = if body.trim().is_empty() {
            status
                .canonical_reason()
                .map(String::from)
                .unwrap_or_else(|| status.to_string())
        } else {
            body.chars().take(MAX_ERROR_MESSAGE).collect()
        };
        Err(ApiError::Http {
            status: status.as_u16(),
            message,
        })
    }
}

#[async_trait]
impl NetworkExecutor for DirectExecutor {
    async fn execute(&self, request: &NetworkRequest) -> ApiResult<Value> {
        debug!(method = %request.method, url = %request.url, "executing request");
        self.execute_with_retry(request).await
    }
}

/// JSON when the body parses, the raw text otherwise, `null` when empty.
pub(crate) fn decode_body(text: &str) -> Value {
    if text.trim().is_empty() {
        return Value::Null;
    }
    serde_json::from_str(text).unwrap_or_else(|_| Value::String(text.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn executor(base: Option<&str>) -> DirectExecutor {
        let mut config = ClientConfig::default();
        config.base_url = base.map(String::from);
        DirectExecutor::new(&config).unwrap()
    }

    #[test]
    fn test_decode_body() {
        assert_eq!(decode_body(""), Value::Null);
        assert_eq!(decode_body("  \n"), Value::Null);
        assert_eq!(decode_body(r#"{"a":1}"#), json!({"a": 1}));
        assert_eq!(decode_body("plain text"), json!("plain text"));
    }

    #[test]
    fn test_resolve_absolute_url_ignores_base() {
        let exec = executor(Some("https://base.test/api"));
        let url = exec.resolve_url("https://other.test/users").unwrap();
        assert_eq!(url.as_str(), "https://other.test/users");
    }

    #[test]
    fn test_resolve_relative_url_appends_to_base() {
        let exec = executor(Some("https://base.test/api/"));
        assert_eq!(
            exec.resolve_url("/users").unwrap().as_str(),
            "https://base.test/api/users"
        );
        assert_eq!(
            exec.resolve_url("users?page=2").unwrap().as_str(),
            "https://base.test/api/users?page=2"
        );
    }

    #[test]
    fn test_relative_url_without_base_is_invalid_request() {
        let exec = executor(None);
        assert!(matches!(
            exec.resolve_url("/users"),
            Err(ApiError::InvalidRequest { .. })
        ));
    }

    #[test]
    fn test_invalid_base_url_is_config_error() {
        let config = ClientConfig::default().with_base_url("not a url");
        assert!(matches!(
            DirectExecutor::new(&config),
            Err(ApiError::Config { .. })
        ));
    }
}
