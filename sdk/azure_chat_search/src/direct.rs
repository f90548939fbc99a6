//! Direct REST fallback for search queries.
//!
//! Some deployments reject requests produced by the standard search client.
//! [`DirectSearchApi`] sends the same query as a single hand-built REST call:
//! always authenticated with the static `api-key`, never retried, no timeout.
//! Failures are logged in full (status, URL, body, response headers) before
//! being returned.

use crate::models::{SearchOptions, SearchRequestBody, SearchResponseBody, SearchResult, SEARCH_API_VERSION};
use crate::query::{DocumentSearch, SearchStrategy};
use async_trait::async_trait;
use azure_chat_core::client::ServiceClient;
use azure_chat_core::error::{ServiceError, ServiceResult};
use reqwest::header::CONTENT_TYPE;
use reqwest::Client as HttpClient;
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;
use std::marker::PhantomData;
use url::Url;

/// Query path fallback that bypasses the standard client.
pub struct DirectSearchApi<T> {
    http: HttpClient,
    url: Url,
    api_key: SecretString,
    debug: bool,
    _document: PhantomData<fn() -> T>,
}

impl<T> Clone for DirectSearchApi<T> {
    fn clone(&self) -> Self {
        Self {
            http: self.http.clone(),
            url: self.url.clone(),
            api_key: self.api_key.clone(),
            debug: self.debug,
            _document: PhantomData,
        }
    }
}

impl<T> std::fmt::Debug for DirectSearchApi<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DirectSearchApi")
            .field("url", &self.url.as_str())
            .field("api_key", &"****")
            .field("debug", &self.debug)
            .finish()
    }
}

impl<T> DirectSearchApi<T> {
    /// Bind the fallback to `{endpoint}/indexes/{index_name}/docs/search`.
    pub fn new(endpoint: &Url, index_name: &str, api_key: SecretString) -> ServiceResult<Self> {
        let mut url = endpoint
            .join(&format!("indexes/{index_name}/docs/search"))
            .map_err(|e| ServiceError::invalid_endpoint_with_source("failed to construct search URL", e))?;
        url.query_pairs_mut()
            .clear()
            .append_pair("api-version", SEARCH_API_VERSION);

        Ok(Self {
            http: HttpClient::new(),
            url,
            api_key,
            debug: false,
            _document: PhantomData,
        })
    }

    /// Use a specific HTTP client.
    pub fn with_http_client(mut self, http: HttpClient) -> Self {
        self.http = http;
        self
    }

    /// Log the request URL and body before sending.
    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    /// The full request URL, including `api-version`.
    pub fn url(&self) -> &Url {
        &self.url
    }
}

impl<T: DeserializeOwned> DirectSearchApi<T> {
    /// Run a query with a single REST call.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::Http`] with the status code and response body
    /// for any non-2xx status, and [`ServiceError::Request`] for transport
    /// failures.
    #[tracing::instrument(
        name = "azure_chat::search::direct_search",
        skip(self, search_text, options),
        fields(url = %self.url)
    )]
    pub async fn search(
        &self,
        search_text: &str,
        options: &SearchOptions,
    ) -> ServiceResult<Vec<SearchResult<T>>> {
        let body = SearchRequestBody::new(search_text, options);

        if self.debug {
            let compact = serde_json::to_string(&body)?;
            tracing::info!(url = %self.url, body = %compact, "direct REST API call");
        }

        let response = self
            .http
            .post(self.url.clone())
            .header(CONTENT_TYPE, "application/json")
            .header("api-key", self.api_key.expose_secret())
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let headers: BTreeMap<String, String> = response
                .headers()
                .iter()
                .map(|(name, value)| {
                    (
                        name.to_string(),
                        value.to_str().unwrap_or("<non-ascii>").to_string(),
                    )
                })
                .collect();
            let error_body = response.text().await.unwrap_or_default();

            tracing::error!(
                status = status.as_u16(),
                status_text = status.canonical_reason().unwrap_or(""),
                url = %self.url,
                error_body = %error_body,
                headers = ?headers,
                "direct search request failed"
            );

            return Err(ServiceError::http(
                status.as_u16(),
                ServiceClient::truncate_message(&error_body),
            ));
        }

        let results = response.json::<SearchResponseBody>().await?.into_results()?;
        tracing::debug!(hits = results.len(), "direct search completed");
        Ok(results)
    }
}

#[async_trait]
impl<T> DocumentSearch<T> for DirectSearchApi<T>
where
    T: DeserializeOwned + Send + 'static,
{
    async fn search(
        &self,
        search_text: &str,
        options: &SearchOptions,
    ) -> ServiceResult<Vec<SearchResult<T>>> {
        DirectSearchApi::search(self, search_text, options).await
    }

    fn strategy(&self) -> SearchStrategy {
        SearchStrategy::DirectApi
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::VectorQuery;
    use crate::test_utils::{TEST_API_KEY, TEST_INDEX};
    use serde_json::{json, Value};
    use std::sync::Arc;
    use wiremock::matchers::{body_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn setup_direct<T>(server: &MockServer) -> DirectSearchApi<T> {
        let endpoint = Url::parse(&server.uri()).expect("mock uri");
        DirectSearchApi::new(&endpoint, TEST_INDEX, SecretString::from(TEST_API_KEY.to_string()))
            .expect("valid url")
    }

    #[test]
    fn url_uses_fixed_api_version() {
        let endpoint = Url::parse("https://contoso.search.azure.us").unwrap();
        let api = DirectSearchApi::<Value>::new(&endpoint, "chat-index", SecretString::from("k".to_string()))
            .unwrap();

        assert_eq!(
            api.url().as_str(),
            "https://contoso.search.azure.us/indexes/chat-index/docs/search?api-version=2023-11-01"
        );
    }

    #[test]
    fn debug_output_hides_key() {
        let endpoint = Url::parse("https://contoso.search.windows.net").unwrap();
        let api = DirectSearchApi::<Value>::new(&endpoint, "idx", SecretString::from("hidden-key".to_string()))
            .unwrap();
        assert!(!format!("{api:?}").contains("hidden-key"));
    }

    #[tokio::test]
    async fn success_returns_scored_documents() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/indexes/chat-index/docs/search"))
            .and(query_param("api-version", "2023-11-01"))
            .and(header("api-key", TEST_API_KEY))
            .and(header("content-type", "application/json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "value": [{"@search.score": 0.87, "id": "x"}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let api = setup_direct::<Value>(&server);
        let results = api.search("x", &SearchOptions::default()).await.expect("search");

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].score, 0.87);
        assert_eq!(results[0].document, json!({"id": "x"}));
    }

    #[tokio::test]
    async fn request_body_carries_vector_queries() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/indexes/chat-index/docs/search"))
            .and(body_json(json!({
                "search": "benefits",
                "top": 4,
                "filter": "user eq 'a'",
                "vectorQueries": [
                    {"vector": [0.5, 0.25], "fields": "embedding,summaryVector", "kind": "vector", "k": 4}
                ]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"value": []})))
            .expect(1)
            .mount(&server)
            .await;

        let api = setup_direct::<Value>(&server);
        let options = SearchOptions::default()
            .top(4)
            .filter("user eq 'a'")
            .vector_query(VectorQuery::new(vec![0.5, 0.25], ["embedding", "summaryVector"], 4));

        let results = api.search("benefits", &options).await.expect("search");
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn non_success_status_fails_without_retry() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/indexes/chat-index/docs/search"))
            .respond_with(ResponseTemplate::new(503).set_body_string("service unavailable"))
            .expect(1)
            .mount(&server)
            .await;

        let api = setup_direct::<Value>(&server);
        let err = api
            .search("x", &SearchOptions::default())
            .await
            .expect_err("should fail");

        let msg = err.to_string();
        assert!(msg.contains("503"), "msg: {msg}");
        assert!(msg.contains("service unavailable"), "msg: {msg}");
        match err {
            ServiceError::Http { status, message } => {
                assert_eq!(status, 503);
                assert_eq!(message, "service unavailable");
            }
            other => panic!("expected Http error, got {other:?}"),
        }
    }

    #[tokio::test]
    #[tracing_test::traced_test]
    async fn failure_logs_status_url_body_and_headers() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/indexes/chat-index/docs/search"))
            .respond_with(
                ResponseTemplate::new(403)
                    .set_body_string("forbidden by policy")
                    .insert_header("x-ms-request-id", "req-123"),
            )
            .mount(&server)
            .await;

        let api = setup_direct::<Value>(&server);
        let _ = api.search("x", &SearchOptions::default()).await;

        assert!(logs_contain("direct search request failed"));
        assert!(logs_contain("403"));
        assert!(logs_contain("Forbidden"));
        assert!(logs_contain("forbidden by policy"));
        assert!(logs_contain("req-123"));
        assert!(logs_contain("/indexes/chat-index/docs/search"));
    }

    #[tokio::test]
    #[tracing_test::traced_test]
    async fn debug_mode_logs_request_body() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/indexes/chat-index/docs/search"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"value": []})))
            .mount(&server)
            .await;

        let api = setup_direct::<Value>(&server).with_debug(true);
        let _ = api.search("needle-text", &SearchOptions::default()).await;

        assert!(logs_contain("direct REST API call"));
        assert!(logs_contain("needle-text"));
        logs_assert(|lines: &[&str]| {
            match lines
                .iter()
                .find(|line| line.contains("direct REST API call"))
            {
                Some(line) if line.contains(" INFO ") && line.contains(r#"body={"search":"needle-text"}"#) => Ok(()),
                Some(line) => Err(format!("unexpected event line: {line}")),
                None => Err("no request event".to_string()),
            }
        });
    }

    #[tokio::test]
    async fn concurrent_searches_are_independent() {
        let server = MockServer::start().await;

        for id in ["a", "b", "c"] {
            Mock::given(method("POST"))
                .and(path("/indexes/chat-index/docs/search"))
                .and(body_json(json!({"search": id})))
                .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                    "value": [{"@search.score": 1.0, "id": id}]
                })))
                .mount(&server)
                .await;
        }

        let api = Arc::new(setup_direct::<Value>(&server));
        let calls = ["a", "b", "c"].map(|id| {
            let api = Arc::clone(&api);
            async move { api.search(id, &SearchOptions::default()).await }
        });

        let outcomes = futures::future::join_all(calls).await;
        for (id, outcome) in ["a", "b", "c"].iter().zip(outcomes) {
            let results = outcome.expect("search");
            assert_eq!(results[0].document, json!({"id": id}));
        }
    }
}
