//! HTTP transport
//!
//! Everything that talks to the network sits behind [`HttpTransport`]: the
//! resource client only builds [`ApiRequest`]s and reads JSON back. Retries,
//! backoff and token refresh happen here.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Method, StatusCode, header};
use serde_json::{Value, json};

use super::auth::TokenProvider;
use super::error::ApiError;
use super::request::ApiRequest;
use super::resilience::{MonitoringConfig, ResilienceConfig, RetryPolicy, parse_retry_after};

/// Sends API requests and returns parsed JSON bodies
#[async_trait]
pub trait HttpTransport: Send + Sync {
    /// Send one request; non-2xx responses come back as [`ApiError`]
    async fn send(&self, request: ApiRequest) -> Result<Value>;

    /// Maximum number of pages a list call may fetch, if capped
    fn page_limit(&self) -> Option<usize> {
        None
    }
}

/// reqwest-backed transport with retries
pub struct ReqwestTransport {
    http: reqwest::Client,
    root_url: String,
    tokens: Arc<dyn TokenProvider>,
    retry: RetryPolicy,
    monitoring: MonitoringConfig,
    page_limit: Option<usize>,
}

impl ReqwestTransport {
    /// `root_url` is the versioned API root, e.g. `https://displayvideo.googleapis.com/v3`
    pub fn new(
        root_url: impl Into<String>,
        tokens: Arc<dyn TokenProvider>,
        resilience: ResilienceConfig,
        timeout: Duration,
    ) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("dv360-sync/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            http,
            root_url: root_url.into().trim_end_matches('/').to_string(),
            tokens,
            retry: RetryPolicy::new(resilience.retry),
            monitoring: resilience.monitoring,
            page_limit: None,
        })
    }

    pub fn with_page_limit(mut self, page_limit: Option<usize>) -> Self {
        self.page_limit = page_limit;
        self
    }

    fn url_for(&self, uri: &str) -> String {
        format!("{}/{}", self.root_url, uri.trim_start_matches('/'))
    }

    fn method_for(request: &ApiRequest) -> Method {
        match request {
            ApiRequest::Get { .. } => Method::GET,
            ApiRequest::Post { .. } => Method::POST,
            ApiRequest::Patch { .. } => Method::PATCH,
            ApiRequest::Delete { .. } => Method::DELETE,
        }
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn send(&self, request: ApiRequest) -> Result<Value> {
        let correlation_id = if self.monitoring.correlation_ids {
            uuid::Uuid::new_v4().to_string()
        } else {
            "-".to_string()
        };
        let url = self.url_for(request.uri());
        let method = Self::method_for(&request);

        let mut attempt: u32 = 0;
        let mut refresh_token = false;

        loop {
            attempt += 1;

            let token = if refresh_token {
                refresh_token = false;
                self.tokens.refresh().await
            } else {
                self.tokens.token().await
            }
            .context("Failed to obtain access token")?;

            log::debug!("[{}] {} {} (attempt {})", correlation_id, method, url, attempt);

            let mut builder = self
                .http
                .request(method.clone(), &url)
                .bearer_auth(token)
                .header(header::ACCEPT, "application/json");
            if let Some(body) = request.body() {
                if self.monitoring.request_logging {
                    log::debug!("[{}] Request body: {}", correlation_id, body);
                }
                builder = builder.json(body);
            }

            let response = match builder.send().await {
                Ok(response) => response,
                Err(e) => {
                    if self.retry.has_attempts_left(attempt)
                        && (e.is_timeout() || e.is_connect() || e.is_request())
                    {
                        let wait = self.retry.delay_for(attempt);
                        log::warn!(
                            "[{}] {} {} failed: {}, retrying in {}ms",
                            correlation_id,
                            method,
                            url,
                            e,
                            wait.as_millis()
                        );
                        tokio::time::sleep(wait).await;
                        continue;
                    }
                    return Err(e).with_context(|| {
                        format!("{} {} failed after {} attempt(s)", method, url, attempt)
                    });
                }
            };

            let status = response.status();
            log::debug!("[{}] {} {} -> {}", correlation_id, method, url, status);

            if status.is_success() {
                let text = response
                    .text()
                    .await
                    .with_context(|| format!("Failed to read response body of {} {}", method, url))?;
                if text.trim().is_empty() {
                    return Ok(json!({}));
                }
                return serde_json::from_str(&text)
                    .with_context(|| format!("Invalid JSON in response to {} {}", method, url));
            }

            if status == StatusCode::UNAUTHORIZED && self.retry.has_attempts_left(attempt) {
                log::warn!("[{}] Token rejected, refreshing and retrying", correlation_id);
                refresh_token = true;
                continue;
            }

            if RetryPolicy::is_retryable_status(status.as_u16())
                && self.retry.has_attempts_left(attempt)
            {
                let retry_after = if status == StatusCode::TOO_MANY_REQUESTS {
                    response
                        .headers()
                        .get(header::RETRY_AFTER)
                        .and_then(|v| v.to_str().ok())
                        .and_then(parse_retry_after)
                } else {
                    None
                };
                let wait = retry_after.unwrap_or_else(|| self.retry.delay_for(attempt));

                log::warn!(
                    "[{}] {} {} returned {}, retrying in {}ms",
                    correlation_id,
                    method,
                    url,
                    status,
                    wait.as_millis()
                );
                tokio::time::sleep(wait).await;
                continue;
            }

            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::new(
                status.as_u16(),
                request.http_method(),
                request.uri(),
                body,
            )
            .into());
        }
    }

    fn page_limit(&self) -> Option<usize> {
        self.page_limit
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::api::auth::StaticToken;

    /// Hands out `stale` until asked to refresh, then `fresh`
    #[derive(Default)]
    struct RotatingToken {
        refreshes: AtomicUsize,
    }

    #[async_trait]
    impl TokenProvider for RotatingToken {
        async fn token(&self) -> Result<String> {
            Ok("stale".to_string())
        }

        async fn refresh(&self) -> Result<String> {
            self.refreshes.fetch_add(1, Ordering::SeqCst);
            Ok("fresh".to_string())
        }
    }

    fn quick_retries(max_attempts: u32) -> ResilienceConfig {
        ResilienceConfig::builder()
            .max_attempts(max_attempts)
            .base_delay(Duration::from_millis(1))
            .max_delay(Duration::from_millis(5))
            .jitter(false)
            .build()
    }

    fn server_transport(server: &MockServer, resilience: ResilienceConfig) -> ReqwestTransport {
        ReqwestTransport::new(
            server.uri(),
            Arc::new(StaticToken::new("t")),
            resilience,
            Duration::from_secs(5),
        )
        .unwrap()
    }

    fn transport(root: &str) -> ReqwestTransport {
        ReqwestTransport::new(
            root,
            Arc::new(StaticToken::new("t")),
            ResilienceConfig::disabled(),
            Duration::from_secs(5),
        )
        .unwrap()
    }

    #[test]
    fn test_url_joining() {
        let transport = transport("https://displayvideo.googleapis.com/v3/");
        assert_eq!(
            transport.url_for("/advertisers/1"),
            "https://displayvideo.googleapis.com/v3/advertisers/1"
        );
        assert_eq!(
            transport.url_for("advertisers?partnerId=2"),
            "https://displayvideo.googleapis.com/v3/advertisers?partnerId=2"
        );
    }

    #[test]
    fn test_page_limit() {
        let transport = transport("http://localhost");
        assert_eq!(HttpTransport::page_limit(&transport), None);
        let transport = transport.with_page_limit(Some(4));
        assert_eq!(HttpTransport::page_limit(&transport), Some(4));
    }

    #[test]
    fn test_method_mapping() {
        assert_eq!(ReqwestTransport::method_for(&ApiRequest::get("a")), Method::GET);
        assert_eq!(
            ReqwestTransport::method_for(&ApiRequest::patch("a", json!({}))),
            Method::PATCH
        );
    }

    #[tokio::test]
    async fn test_sends_bearer_token_and_json_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/advertisers/1/campaigns"))
            .and(header("Authorization", "Bearer t"))
            .and(header("Accept", "application/json"))
            .and(body_json(json!({"displayName": "Spring"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"campaignId": "7"})))
            .expect(1)
            .mount(&server)
            .await;

        let response = server_transport(&server, ResilienceConfig::disabled())
            .send(ApiRequest::post("advertisers/1/campaigns", json!({"displayName": "Spring"})))
            .await
            .unwrap();
        assert_eq!(response, json!({"campaignId": "7"}));
    }

    #[tokio::test]
    async fn test_empty_success_body_is_empty_object() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/advertisers/1/campaigns/7"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let response = server_transport(&server, ResilienceConfig::disabled())
            .send(ApiRequest::delete("advertisers/1/campaigns/7"))
            .await
            .unwrap();
        assert_eq!(response, json!({}));
    }

    #[tokio::test]
    async fn test_server_error_is_retried() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/advertisers/1"))
            .respond_with(ResponseTemplate::new(503).set_body_string("Service Unavailable"))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/advertisers/1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"advertiserId": "1"})))
            .mount(&server)
            .await;

        let response = server_transport(&server, quick_retries(3))
            .send(ApiRequest::get("advertisers/1"))
            .await
            .unwrap();
        assert_eq!(response, json!({"advertiserId": "1"}));
        assert_eq!(server.received_requests().await.map(|r| r.len()), Some(2));
    }

    #[tokio::test]
    async fn test_rate_limit_waits_for_retry_after() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/advertisers/1"))
            .respond_with(
                ResponseTemplate::new(429)
                    .set_body_string("Too Many Requests")
                    .insert_header("Retry-After", "0"),
            )
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/advertisers/1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"advertiserId": "1"})))
            .mount(&server)
            .await;

        // Backoff alone would wait a minute; Retry-After: 0 retries at once
        let slow_backoff = ResilienceConfig::builder()
            .max_attempts(2)
            .base_delay(Duration::from_secs(60))
            .max_delay(Duration::from_secs(60))
            .jitter(false)
            .build();
        let transport = server_transport(&server, slow_backoff);

        let response = tokio::time::timeout(
            Duration::from_secs(10),
            transport.send(ApiRequest::get("advertisers/1")),
        )
        .await
        .unwrap()
        .unwrap();
        assert_eq!(response, json!({"advertiserId": "1"}));
    }

    #[tokio::test]
    async fn test_unauthorized_refreshes_token() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/advertisers/1"))
            .and(header("Authorization", "Bearer stale"))
            .respond_with(ResponseTemplate::new(401))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/advertisers/1"))
            .and(header("Authorization", "Bearer fresh"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"advertiserId": "1"})))
            .expect(1)
            .mount(&server)
            .await;

        let tokens = Arc::new(RotatingToken::default());
        let transport = ReqwestTransport::new(
            server.uri(),
            tokens.clone(),
            quick_retries(3),
            Duration::from_secs(5),
        )
        .unwrap();

        let response = transport.send(ApiRequest::get("advertisers/1")).await.unwrap();
        assert_eq!(response, json!({"advertiserId": "1"}));
        assert_eq!(tokens.refreshes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_attempts_are_bounded() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/advertisers/1"))
            .respond_with(ResponseTemplate::new(503).set_body_string("Service Unavailable"))
            .expect(3)
            .mount(&server)
            .await;

        let error = server_transport(&server, quick_retries(3))
            .send(ApiRequest::get("advertisers/1"))
            .await
            .unwrap_err();

        let api = error.downcast_ref::<ApiError>().unwrap();
        assert_eq!(api.status, 503);
        assert_eq!(server.received_requests().await.map(|r| r.len()), Some(3));
    }

    #[tokio::test]
    async fn test_client_error_becomes_api_error_without_retry() {
        let server = MockServer::start().await;
        Mock::given(method("PATCH"))
            .and(path("/advertisers/1/lineItems/9"))
            .respond_with(
                ResponseTemplate::new(403)
                    .set_body_string(r#"{"error": {"code": 403, "message": "Permission denied"}}"#),
            )
            .expect(1)
            .mount(&server)
            .await;

        let error = server_transport(&server, quick_retries(3))
            .send(ApiRequest::patch("advertisers/1/lineItems/9?updateMask=displayName", json!({})))
            .await
            .unwrap_err();

        let api = error.downcast_ref::<ApiError>().unwrap();
        assert_eq!(api.status, 403);
        assert_eq!(api.method, "PATCH");
        assert_eq!(api.uri, "advertisers/1/lineItems/9?updateMask=displayName");
        assert_eq!(api.message(), "Permission denied");
    }
}
