//! Authenticated HTTP transport for Azure data-plane APIs.
//!
//! [`ServiceClient`] binds an endpoint to an [`AzureCredential`], appends the
//! `api-version` query parameter, authenticates every request and retries
//! transient failures. The search and document adapters build on it.
//!
//! # Examples
//!
//! ## Using an API key
//! ```rust,no_run
//! use azure_chat_core::auth::AzureCredential;
//! use azure_chat_core::client::ServiceClient;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = ServiceClient::builder()
//!     .endpoint("https://contoso.search.windows.net")
//!     .credential(AzureCredential::api_key("your-key"))
//!     .key_header("api-key")
//!     .api_version("2023-11-01")
//!     .build()?;
//!
//! let response = client.get("/indexes/chat/docs/$count").await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Using the managed identity
//! ```rust,no_run
//! use azure_chat_core::auth::{AzureCloud, AzureCredential};
//! use azure_chat_core::client::ServiceClient;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let credential = AzureCredential::managed_identity("https://login.microsoftonline.us");
//! let client = ServiceClient::builder()
//!     .endpoint("https://contoso.search.azure.us")
//!     .token_scope(credential.cloud().search_scope())
//!     .credential(credential)
//!     .build()?;
//! # Ok(())
//! # }
//! ```

use crate::auth::AzureCredential;
use crate::error::{ServiceError, ServiceResult};
use azure_core::credentials::TokenCredential;
use azure_identity::ManagedIdentityCredential;
use reqwest::{Client as HttpClient, Method};
use secrecy::ExposeSecret;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::OnceCell;
use url::Url;

/// Header carrying static keys unless a service overrides it.
pub const DEFAULT_KEY_HEADER: &str = "api-key";

/// Default connection timeout (10 seconds).
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Default read/response timeout (60 seconds).
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(60);

/// Determines if an HTTP status code represents a retriable error.
///
/// Retriable errors are transient server-side issues that may succeed on retry:
/// - 429 Too Many Requests (rate limiting)
/// - 500 Internal Server Error
/// - 502 Bad Gateway
/// - 503 Service Unavailable
/// - 504 Gateway Timeout
#[inline]
pub fn is_retriable_status(status: u16) -> bool {
    matches!(status, 429 | 500 | 502 | 503 | 504)
}

/// Configuration for automatic retry behavior on transient errors.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum number of retry attempts (not counting the initial request).
    pub max_retries: u32,
    /// Initial backoff duration before the first retry.
    /// Subsequent retries use exponential backoff (2^attempt * initial_backoff).
    pub initial_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_backoff: Duration::from_millis(500),
        }
    }
}

impl RetryPolicy {
    /// A policy that sends each request exactly once.
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            initial_backoff: Duration::ZERO,
        }
    }

    /// Backoff before retry number `attempt` (0-based), with ±25% jitter.
    fn backoff(&self, attempt: u32) -> Duration {
        let base = self.initial_backoff * 2_u32.pow(attempt);
        let jitter = 0.75 + fastrand::f64() * 0.5;
        base.mul_f64(jitter)
    }
}

/// Authenticated client bound to one Azure service endpoint.
///
/// The client is cheaply cloneable and can be shared across tasks; clones
/// share the managed identity token source.
#[derive(Clone)]
pub struct ServiceClient {
    pub(crate) http: HttpClient,
    pub(crate) endpoint: Url,
    pub(crate) credential: AzureCredential,
    pub(crate) key_header: &'static str,
    pub(crate) token_scope: Option<String>,
    pub(crate) api_version: Option<String>,
    pub(crate) retry_policy: RetryPolicy,
    tokens: Arc<OnceCell<Arc<dyn TokenCredential>>>,
}

impl std::fmt::Debug for ServiceClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceClient")
            .field("endpoint", &self.endpoint.as_str())
            .field("credential", &self.credential)
            .field("key_header", &self.key_header)
            .field("token_scope", &self.token_scope)
            .field("api_version", &self.api_version)
            .field("retry_policy", &self.retry_policy)
            .finish_non_exhaustive()
    }
}

/// Builder for constructing a [`ServiceClient`].
///
/// Use [`ServiceClient::builder()`] to create a new builder.
#[derive(Default)]
pub struct ServiceClientBuilder {
    endpoint: Option<String>,
    credential: Option<AzureCredential>,
    key_header: Option<&'static str>,
    token_scope: Option<String>,
    token_credential: Option<Arc<dyn TokenCredential>>,
    api_version: Option<String>,
    http_client: Option<HttpClient>,
    connect_timeout: Option<Duration>,
    read_timeout: Option<Duration>,
    retry_policy: Option<RetryPolicy>,
}

impl ServiceClient {
    /// Create a new builder for configuring a `ServiceClient`.
    pub fn builder() -> ServiceClientBuilder {
        ServiceClientBuilder::default()
    }

    /// Get the base endpoint URL.
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Get the credential this client authenticates with.
    pub fn credential(&self) -> &AzureCredential {
        &self.credential
    }

    /// Get the API version appended to every request, if any.
    pub fn api_version(&self) -> Option<&str> {
        self.api_version.as_deref()
    }

    /// Get the retry policy configuration.
    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry_policy
    }

    /// Build a full URL for an API path.
    ///
    /// The path may carry its own query string. The configured `api-version`
    /// is appended unless the path already sets one.
    ///
    /// # Errors
    ///
    /// Returns an error if the path cannot be joined to the endpoint URL.
    pub fn url(&self, path: &str) -> ServiceResult<Url> {
        let mut url = self
            .endpoint
            .join(path)
            .map_err(|e| ServiceError::invalid_endpoint_with_source("failed to construct URL", e))?;

        if let Some(version) = &self.api_version {
            if !url.query_pairs().any(|(key, _)| key == "api-version") {
                url.query_pairs_mut().append_pair("api-version", version);
            }
        }

        Ok(url)
    }

    /// Resolve the authentication header for the next request.
    ///
    /// Static keys go into the service key header. Managed identities are
    /// exchanged for a bearer token for the configured scope.
    pub async fn authorization(&self) -> ServiceResult<(&'static str, String)> {
        match &self.credential {
            AzureCredential::ApiKey(key) => {
                Ok((self.key_header, key.expose_secret().to_string()))
            }
            AzureCredential::ManagedIdentity { authority_host } => {
                let scope = self.token_scope.as_deref().ok_or_else(|| {
                    ServiceError::MissingConfig("token scope for managed identity".into())
                })?;

                let source = self
                    .tokens
                    .get_or_try_init(|| async move {
                        tracing::debug!(authority_host = %authority_host, "initializing managed identity");
                        let credential: Arc<dyn TokenCredential> =
                            ManagedIdentityCredential::new(None).map_err(|e| {
                                ServiceError::Auth(format!("managed identity unavailable: {e}"))
                            })?;
                        Ok::<_, ServiceError>(credential)
                    })
                    .await?;

                let token = source
                    .get_token(&[scope], None)
                    .await
                    .map_err(|e| ServiceError::Auth(format!("failed to acquire token: {e}")))?;

                Ok(("Authorization", format!("Bearer {}", token.token.secret())))
            }
        }
    }

    /// Send a GET request with automatic retry on transient errors.
    pub async fn get(&self, path: &str) -> ServiceResult<reqwest::Response> {
        self.send::<()>(Method::GET, path, None).await
    }

    /// Send a POST request with a JSON body and automatic retry.
    pub async fn post<T: serde::Serialize + ?Sized>(
        &self,
        path: &str,
        body: &T,
    ) -> ServiceResult<reqwest::Response> {
        self.send(Method::POST, path, Some(body)).await
    }

    /// Send a POST request without a body, e.g. to trigger an action.
    pub async fn post_empty(&self, path: &str) -> ServiceResult<reqwest::Response> {
        self.send::<()>(Method::POST, path, None).await
    }

    /// Send a PUT request with a JSON body and automatic retry.
    pub async fn put<T: serde::Serialize + ?Sized>(
        &self,
        path: &str,
        body: &T,
    ) -> ServiceResult<reqwest::Response> {
        self.send(Method::PUT, path, Some(body)).await
    }

    /// Send a DELETE request with automatic retry.
    pub async fn delete(&self, path: &str) -> ServiceResult<reqwest::Response> {
        self.send::<()>(Method::DELETE, path, None).await
    }

    /// Send a request, retrying retriable statuses with jittered exponential backoff.
    ///
    /// # Errors
    ///
    /// Returns an error if authentication fails, the request fails after all
    /// retries, or the server returns a non-retriable error response.
    async fn send<T: serde::Serialize + ?Sized>(
        &self,
        method: Method,
        path: &str,
        body: Option<&T>,
    ) -> ServiceResult<reqwest::Response> {
        let url = self.url(path)?;
        let (header, value) = self.authorization().await?;
        let mut attempt = 0;

        loop {
            let mut request = self
                .http
                .request(method.clone(), url.clone())
                .header(header, &value);
            if let Some(body) = body {
                request = request.json(body);
            }

            let response = request.send().await?;
            if response.status().is_success() {
                return Ok(response);
            }

            let status = response.status().as_u16();
            if !is_retriable_status(status) || attempt >= self.retry_policy.max_retries {
                return Self::check_response(response).await;
            }

            let backoff = self.retry_policy.backoff(attempt);
            tracing::debug!(
                %method,
                status,
                attempt,
                backoff_ms = backoff.as_millis() as u64,
                "transient failure, retrying"
            );
            tokio::time::sleep(backoff).await;
            attempt += 1;
        }
    }

    /// Maximum length for error messages to prevent sensitive data leaks.
    const MAX_ERROR_MESSAGE_LEN: usize = 1000;

    /// Markers after which a secret value follows.
    const SECRET_MARKERS: [&'static str; 4] = ["Bearer ", "api-key: ", "api-key=", "\"api-key\":\""];

    /// Redact bearer tokens and key values from a message.
    pub fn sanitize_error_message(msg: &str) -> String {
        let mut result = msg.to_string();

        for marker in Self::SECRET_MARKERS {
            let mut search_start = 0;
            while let Some(relative_pos) = result[search_start..].find(marker) {
                let value_start = search_start + relative_pos + marker.len();
                let value_end = result[value_start..]
                    .find(|c: char| c.is_whitespace() || c == '"' || c == '\'' || c == ',')
                    .map(|pos| value_start + pos)
                    .unwrap_or(result.len());

                if value_end > value_start && !result[value_start..].starts_with("[REDACTED]") {
                    result.replace_range(value_start..value_end, "[REDACTED]");
                }
                search_start = value_start;
            }
        }

        result
    }

    /// Sanitize, then truncate a message that exceeds the maximum length.
    pub fn truncate_message(msg: &str) -> String {
        let sanitized = Self::sanitize_error_message(msg);

        if sanitized.len() > Self::MAX_ERROR_MESSAGE_LEN {
            let mut cut = Self::MAX_ERROR_MESSAGE_LEN;
            while !sanitized.is_char_boundary(cut) {
                cut -= 1;
            }
            format!("{}... (truncated)", &sanitized[..cut])
        } else {
            sanitized
        }
    }

    /// Turn an error response into a [`ServiceError`].
    async fn check_response(response: reqwest::Response) -> ServiceResult<reqwest::Response> {
        if response.status().is_success() {
            return Ok(response);
        }

        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();

        if let Ok(error) = serde_json::from_str::<serde_json::Value>(&body) {
            if let Some(err_obj) = error.get("error") {
                return Err(ServiceError::Api {
                    code: err_obj
                        .get("code")
                        .and_then(|c| c.as_str())
                        .unwrap_or("unknown")
                        .to_string(),
                    message: Self::truncate_message(
                        err_obj
                            .get("message")
                            .and_then(|m| m.as_str())
                            .unwrap_or(&body),
                    ),
                });
            }
        }

        Err(ServiceError::http(status, Self::truncate_message(&body)))
    }
}

impl ServiceClientBuilder {
    /// Set the service endpoint URL (required).
    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    /// Set the credential to use for authentication (required).
    pub fn credential(mut self, credential: AzureCredential) -> Self {
        self.credential = Some(credential);
        self
    }

    /// Set the header that carries static keys.
    ///
    /// Defaults to [`DEFAULT_KEY_HEADER`] (`api-key`).
    pub fn key_header(mut self, header: &'static str) -> Self {
        self.key_header = Some(header);
        self
    }

    /// Set the token scope requested for managed identity credentials.
    ///
    /// Required when the credential is [`AzureCredential::ManagedIdentity`].
    pub fn token_scope(mut self, scope: impl Into<String>) -> Self {
        self.token_scope = Some(scope.into());
        self
    }

    /// Use a specific token source instead of the platform managed identity.
    pub fn token_credential(mut self, credential: Arc<dyn TokenCredential>) -> Self {
        self.token_credential = Some(credential);
        self
    }

    /// Set the `api-version` query parameter appended to every request.
    pub fn api_version(mut self, version: impl Into<String>) -> Self {
        self.api_version = Some(version.into());
        self
    }

    /// Set a custom HTTP client.
    ///
    /// **Note:** If you provide a custom HTTP client, any timeout configuration
    /// via [`connect_timeout`](Self::connect_timeout) or
    /// [`read_timeout`](Self::read_timeout) is ignored.
    pub fn http_client(mut self, client: HttpClient) -> Self {
        self.http_client = Some(client);
        self
    }

    /// Set the connection timeout.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    /// Set the read timeout, covering the whole request/response cycle.
    pub fn read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = Some(timeout);
        self
    }

    /// Set the retry policy for transient errors.
    ///
    /// Defaults to 3 retries with 500ms initial backoff.
    pub fn retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = Some(policy);
        self
    }

    /// Build the `ServiceClient`.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - No endpoint or credential is provided
    /// - The endpoint URL is invalid
    /// - A managed identity credential has no token scope
    pub fn build(self) -> ServiceResult<ServiceClient> {
        let endpoint_str = self
            .endpoint
            .ok_or_else(|| ServiceError::MissingConfig("endpoint is required".into()))?;

        let endpoint = Url::parse(&endpoint_str)
            .map_err(|e| ServiceError::invalid_endpoint_with_source("invalid endpoint URL", e))?;

        let credential = self
            .credential
            .ok_or_else(|| ServiceError::MissingConfig("credential is required".into()))?;

        if matches!(credential, AzureCredential::ManagedIdentity { .. })
            && self.token_scope.is_none()
        {
            return Err(ServiceError::MissingConfig(
                "token scope is required for managed identity credentials".into(),
            ));
        }

        let http = match self.http_client {
            Some(client) => client,
            None => reqwest::Client::builder()
                .connect_timeout(self.connect_timeout.unwrap_or(DEFAULT_CONNECT_TIMEOUT))
                .timeout(self.read_timeout.unwrap_or(DEFAULT_READ_TIMEOUT))
                .build()?,
        };

        Ok(ServiceClient {
            http,
            endpoint,
            credential,
            key_header: self.key_header.unwrap_or(DEFAULT_KEY_HEADER),
            token_scope: self.token_scope,
            api_version: self.api_version,
            retry_policy: self.retry_policy.unwrap_or_default(),
            tokens: Arc::new(OnceCell::new_with(self.token_credential)),
        })
    }
}
