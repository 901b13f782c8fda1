use std::time::Duration;

use cadence_common::{RetryConfig, RetryDecision, RetryError, RetryExecutor, RetryPolicy};
use cadence_domain::{CadenceError, ProviderError};
use reqwest::header::RETRY_AFTER;
use reqwest::{Client as ReqwestClient, Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::errors::conversions::provider_error_from_http;

/// Longest `Retry-After` the client is willing to honour.
const MAX_RETRY_AFTER: Duration = Duration::from_secs(60);

/// HTTP client with built-in retry and timeout support.
///
/// Every attempt carries the request timeout. Timeouts, connection failures,
/// 5xx and 429 responses are retried with exponential backoff; any other
/// non-success status is classified into a [`ProviderError`] immediately.
#[derive(Clone)]
pub struct HttpClient {
    client: ReqwestClient,
    retry: RetryConfig,
}

impl HttpClient {
    /// Start building a new HTTP client.
    pub fn builder() -> HttpClientBuilder {
        HttpClientBuilder::default()
    }

    /// Convenience constructor with default configuration.
    pub fn new() -> Result<Self, CadenceError> {
        Self::builder().build()
    }

    /// Create a request builder using the underlying reqwest client.
    pub fn request<U>(&self, method: Method, url: U) -> RequestBuilder
    where
        U: reqwest::IntoUrl,
    {
        self.client.request(method, url)
    }

    /// Total attempts per request, including the first.
    pub fn max_attempts(&self) -> u32 {
        self.retry.max_attempts
    }

    /// Execute the request with retry semantics, returning the first
    /// successful (2xx) response.
    pub async fn send(&self, builder: RequestBuilder) -> Result<Response, ProviderError> {
        let executor = RetryExecutor::new(self.retry.clone(), TransientPolicy);

        let result = executor
            .execute(|| {
                let attempt = builder.try_clone();
                let client = &self.client;
                async move {
                    let request = attempt
                        .ok_or_else(|| {
                            ProviderError::Malformed(
                                "request body cannot be cloned; buffer it to enable retries"
                                    .into(),
                            )
                        })?
                        .build()
                        .map_err(|err| provider_error_from_http(&err))?;

                    let method = request.method().clone();
                    let url = request.url().clone();
                    debug!(%method, %url, "sending HTTP request");

                    let response = client
                        .execute(request)
                        .await
                        .map_err(|err| provider_error_from_http(&err))?;
                    let status = response.status();
                    debug!(%method, %url, %status, "received HTTP response");

                    if status.is_success() {
                        return Ok(response);
                    }
                    Err(classify_failure(response).await)
                }
            })
            .await;

        result.map_err(|err| match err {
            RetryError::TimeoutExceeded { last: None, .. } => ProviderError::Timeout,
            other => other.into_source().unwrap_or_else(|| {
                ProviderError::Network("http client exhausted retries without a result".into())
            }),
        })
    }

    /// [`send`](Self::send) and decode the JSON body.
    pub async fn send_json<T: DeserializeOwned>(
        &self,
        builder: RequestBuilder,
    ) -> Result<T, ProviderError> {
        let response = self.send(builder).await?;
        response
            .json::<T>()
            .await
            .map_err(|err| ProviderError::Malformed(format!("failed to decode response: {err}")))
    }
}

impl std::fmt::Debug for HttpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpClient").field("max_attempts", &self.retry.max_attempts).finish()
    }
}

async fn classify_failure(response: Response) -> ProviderError {
    let status = response.status().as_u16();
    let retry_after_secs = response
        .headers()
        .get(RETRY_AFTER)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.trim().parse::<u64>().ok());
    let body = response.text().await.unwrap_or_default();

    match ProviderError::from_status(status, body) {
        ProviderError::RateLimited { .. } => ProviderError::RateLimited { retry_after_secs },
        other => other,
    }
}

/// Retries exactly the errors [`ProviderError::is_transient`] marks.
struct TransientPolicy;

impl RetryPolicy<ProviderError> for TransientPolicy {
    fn should_retry(&self, error: &ProviderError, _attempt: u32) -> RetryDecision {
        match error {
            ProviderError::RateLimited { retry_after_secs: Some(secs) } => {
                RetryDecision::RetryAfter(Duration::from_secs(*secs).min(MAX_RETRY_AFTER))
            }
            err if err.is_transient() => RetryDecision::Retry,
            _ => RetryDecision::Stop,
        }
    }
}

/// Builder for [`HttpClient`].
#[derive(Debug)]
pub struct HttpClientBuilder {
    timeout: Duration,
    max_attempts: u32,
    base_backoff: Duration,
    max_backoff: Duration,
    user_agent: Option<String>,
}

impl Default for HttpClientBuilder {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            max_attempts: 3,
            base_backoff: Duration::from_millis(200),
            max_backoff: Duration::from_secs(10),
            user_agent: None,
        }
    }
}

impl HttpClientBuilder {
    /// Per-attempt request timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Configure the total number of attempts (initial try + retries).
    pub fn max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    pub fn base_backoff(mut self, backoff: Duration) -> Self {
        self.base_backoff = backoff;
        self
    }

    pub fn max_backoff(mut self, backoff: Duration) -> Self {
        self.max_backoff = backoff;
        self
    }

    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.user_agent = Some(agent.into());
        self
    }

    pub fn build(self) -> Result<HttpClient, CadenceError> {
        let mut builder = ReqwestClient::builder().timeout(self.timeout).no_proxy();

        if let Some(agent) = self.user_agent {
            builder = builder.user_agent(agent);
        }

        let client = builder
            .build()
            .map_err(|err| CadenceError::Config(format!("failed to build HTTP client: {err}")))?;

        let retry = RetryConfig::builder()
            .max_attempts(self.max_attempts.max(1))
            .exponential_backoff(self.base_backoff, 2.0, self.max_backoff)
            .equal_jitter()
            .unlimited_time()
            .build()
            .map_err(|err| CadenceError::Config(err.to_string()))?;

        Ok(HttpClient { client, retry })
    }
}

#[cfg(test)]
mod tests {
    use std::net::TcpListener;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use reqwest::{Method, StatusCode};
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn client_with_defaults() -> HttpClient {
        HttpClient::builder()
            .base_backoff(Duration::from_millis(10))
            .max_attempts(3)
            .build()
            .expect("http client")
    }

    #[tokio::test]
    async fn returns_successful_response_without_retry() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_with_defaults();
        let response =
            client.send(client.request(Method::GET, server.uri())).await.expect("response");

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn retries_server_errors_until_success() {
        let server = MockServer::start().await;
        let attempts = Arc::new(AtomicUsize::new(0));
        let attempts_clone = attempts.clone();
        Mock::given(method("GET"))
            .respond_with(move |_req: &wiremock::Request| -> ResponseTemplate {
                if attempts_clone.fetch_add(1, Ordering::SeqCst) < 2 {
                    ResponseTemplate::new(503)
                } else {
                    ResponseTemplate::new(200)
                }
            })
            .expect(3)
            .mount(&server)
            .await;

        let client = client_with_defaults();
        let response =
            client.send(client.request(Method::GET, server.uri())).await.expect("response");

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn honours_retry_after_on_rate_limit() {
        let server = MockServer::start().await;
        let attempts = Arc::new(AtomicUsize::new(0));
        let attempts_clone = attempts.clone();
        Mock::given(method("GET"))
            .respond_with(move |_req: &wiremock::Request| -> ResponseTemplate {
                if attempts_clone.fetch_add(1, Ordering::SeqCst) == 0 {
                    ResponseTemplate::new(429).insert_header("Retry-After", "0")
                } else {
                    ResponseTemplate::new(200)
                }
            })
            .mount(&server)
            .await;

        let client = client_with_defaults();
        client.send(client.request(Method::GET, server.uri())).await.expect("response");
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn gives_up_after_max_attempts() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .expect(3)
            .mount(&server)
            .await;

        let client = client_with_defaults();
        let err = client.send(client.request(Method::GET, server.uri())).await.unwrap_err();
        assert_eq!(err, ProviderError::Server { status: 500, message: "boom".into() });
    }

    #[tokio::test]
    async fn does_not_retry_client_errors() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(401).set_body_string("expired"))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_with_defaults();
        let err = client.send(client.request(Method::GET, server.uri())).await.unwrap_err();
        assert!(err.is_auth());
    }

    #[tokio::test]
    async fn retries_on_network_failure() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener); // release the port so that requests fail with ECONNREFUSED
        let url = format!("http://{addr}");

        let client = HttpClient::builder()
            .base_backoff(Duration::from_millis(5))
            .max_attempts(2)
            .build()
            .expect("http client");

        let err = client.send(client.request(Method::GET, &url)).await.unwrap_err();
        assert!(matches!(err, ProviderError::Network(_)), "got {err:?}");
    }

    #[tokio::test]
    async fn slow_responses_time_out() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(500)))
            .mount(&server)
            .await;

        let client = HttpClient::builder()
            .timeout(Duration::from_millis(50))
            .base_backoff(Duration::from_millis(1))
            .max_attempts(2)
            .build()
            .expect("http client");

        let err = client.send(client.request(Method::GET, server.uri())).await.unwrap_err();
        assert_eq!(err, ProviderError::Timeout);
    }
}
