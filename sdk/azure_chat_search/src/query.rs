//! Querying and indexing documents.
//!
//! [`DocumentSearch`] is the query capability callers depend on. It has two
//! implementations: [`SearchClient`], which goes through the authenticated
//! and retried [`ServiceClient`], and
//! [`DirectSearchApi`](crate::direct::DirectSearchApi), the plain REST
//! fallback. [`SearchClientFactory::document_search`](crate::factory::SearchClientFactory::document_search)
//! picks one from configuration.
//!
//! ## Example
//!
//! ```rust,no_run
//! use azure_chat_core::auth::AzureCredential;
//! use azure_chat_core::client::ServiceClient;
//! use azure_chat_search::models::{SearchOptions, SEARCH_API_VERSION};
//! use azure_chat_search::query::SearchClient;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = ServiceClient::builder()
//!     .endpoint("https://contoso.search.windows.net")
//!     .credential(AzureCredential::api_key("your-key"))
//!     .api_version(SEARCH_API_VERSION)
//!     .build()?;
//!
//! let search = SearchClient::<serde_json::Value>::new(client, "chat-index");
//! let hits = search.search("azure", &SearchOptions::default().top(3)).await?;
//! for hit in hits {
//!     println!("{:.2} {}", hit.score, hit.document);
//! }
//! # Ok(())
//! # }
//! ```

use crate::models::{document_from_json, SearchOptions, SearchRequestBody, SearchResponseBody, SearchResult};
use async_trait::async_trait;
use azure_chat_core::auth::AzureCredential;
use azure_chat_core::client::ServiceClient;
use azure_chat_core::error::{ServiceError, ServiceResult};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::marker::PhantomData;
use url::Url;

/// Which implementation answers queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchStrategy {
    /// [`SearchClient`] over the authenticated service transport.
    Client,
    /// [`DirectSearchApi`](crate::direct::DirectSearchApi) with a static key.
    DirectApi,
}

/// Full-text and vector queries over one index.
#[async_trait]
pub trait DocumentSearch<T>: Send + Sync {
    /// Run a query and return the hits in service order.
    async fn search(
        &self,
        search_text: &str,
        options: &SearchOptions,
    ) -> ServiceResult<Vec<SearchResult<T>>>;

    /// The implementation behind this handle.
    fn strategy(&self) -> SearchStrategy;
}

/// Query and indexing client for one search index.
///
/// `T` is the document type; it must match the index schema.
pub struct SearchClient<T> {
    client: ServiceClient,
    index_name: String,
    _document: PhantomData<fn() -> T>,
}

impl<T> Clone for SearchClient<T> {
    fn clone(&self) -> Self {
        Self {
            client: self.client.clone(),
            index_name: self.index_name.clone(),
            _document: PhantomData,
        }
    }
}

impl<T> std::fmt::Debug for SearchClient<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SearchClient")
            .field("endpoint", &self.client.endpoint().as_str())
            .field("index_name", &self.index_name)
            .field("credential", self.client.credential())
            .finish()
    }
}

impl<T> SearchClient<T> {
    pub fn new(client: ServiceClient, index_name: impl Into<String>) -> Self {
        Self {
            client,
            index_name: index_name.into(),
            _document: PhantomData,
        }
    }

    pub fn endpoint(&self) -> &Url {
        self.client.endpoint()
    }

    pub fn index_name(&self) -> &str {
        &self.index_name
    }

    pub fn credential(&self) -> &AzureCredential {
        self.client.credential()
    }

    fn docs_path(&self, suffix: &str) -> String {
        format!("/indexes/{}/docs{suffix}", self.index_name)
    }

    /// Number of documents in the index.
    #[tracing::instrument(
        name = "azure_chat::search::document_count",
        skip(self),
        fields(index = %self.index_name)
    )]
    pub async fn document_count(&self) -> ServiceResult<u64> {
        let response = self.client.get(&self.docs_path("/$count")).await?;
        let text = response.text().await?;
        // The count endpoint may prefix its plain-text body with a BOM.
        text.trim_start_matches('\u{feff}')
            .trim()
            .parse()
            .map_err(|_| ServiceError::Api {
                code: "InvalidCount".into(),
                message: format!("unexpected document count body: {text}"),
            })
    }
}

impl<T: DeserializeOwned> SearchClient<T> {
    /// Run a full-text and/or vector query.
    #[tracing::instrument(
        name = "azure_chat::search::search",
        skip(self, search_text, options),
        fields(index = %self.index_name)
    )]
    pub async fn search(
        &self,
        search_text: &str,
        options: &SearchOptions,
    ) -> ServiceResult<Vec<SearchResult<T>>> {
        let body = SearchRequestBody::new(search_text, options);
        let response = self.client.post(&self.docs_path("/search"), &body).await?;
        let results = response.json::<SearchResponseBody>().await?.into_results()?;

        tracing::debug!(hits = results.len(), "search completed");
        Ok(results)
    }

    /// Fetch one document by key.
    #[tracing::instrument(
        name = "azure_chat::search::get_document",
        skip(self),
        fields(index = %self.index_name)
    )]
    pub async fn get_document(&self, key: &str) -> ServiceResult<T> {
        let encoded: String = url::form_urlencoded::byte_serialize(key.as_bytes()).collect();
        let response = self.client.get(&self.docs_path(&format!("/{encoded}"))).await?;
        let document = response.json::<serde_json::Map<String, serde_json::Value>>().await?;
        document_from_json(document)
    }
}

impl<T: Serialize> SearchClient<T> {
    /// Apply a batch of indexing actions.
    ///
    /// A batch where only some actions failed still succeeds (HTTP 207);
    /// inspect [`IndexingResult::succeeded`] per key.
    #[tracing::instrument(
        name = "azure_chat::search::index_documents",
        skip(self, batch),
        fields(index = %self.index_name, actions = batch.actions.len())
    )]
    pub async fn index_documents(
        &self,
        batch: &IndexDocumentsBatch<T>,
    ) -> ServiceResult<IndexDocumentsResult> {
        let response = self.client.post(&self.docs_path("/index"), batch).await?;
        let result = response.json::<IndexDocumentsResult>().await?;

        let failed = result.results.iter().filter(|r| !r.succeeded).count();
        if failed > 0 {
            tracing::warn!(failed, "some indexing actions failed");
        }
        Ok(result)
    }

    /// Upload documents, replacing existing ones with the same key.
    pub async fn upload_documents(
        &self,
        documents: impl IntoIterator<Item = T>,
    ) -> ServiceResult<IndexDocumentsResult> {
        self.index_documents(&IndexDocumentsBatch::upload(documents))
            .await
    }

    /// Merge into existing documents, uploading the ones that do not exist.
    pub async fn merge_or_upload_documents(
        &self,
        documents: impl IntoIterator<Item = T>,
    ) -> ServiceResult<IndexDocumentsResult> {
        self.index_documents(&IndexDocumentsBatch::merge_or_upload(documents))
            .await
    }

    /// Delete documents; only their key field matters.
    pub async fn delete_documents(
        &self,
        documents: impl IntoIterator<Item = T>,
    ) -> ServiceResult<IndexDocumentsResult> {
        self.index_documents(&IndexDocumentsBatch::delete(documents))
            .await
    }
}

#[async_trait]
impl<T> DocumentSearch<T> for SearchClient<T>
where
    T: DeserializeOwned + Send + 'static,
{
    async fn search(
        &self,
        search_text: &str,
        options: &SearchOptions,
    ) -> ServiceResult<Vec<SearchResult<T>>> {
        SearchClient::search(self, search_text, options).await
    }

    fn strategy(&self) -> SearchStrategy {
        SearchStrategy::Client
    }
}

// ---------------------------------------------------------------------------
// Indexing batches
// ---------------------------------------------------------------------------

/// The operation applied to one document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum IndexActionType {
    Upload,
    Merge,
    MergeOrUpload,
    Delete,
}

/// One document plus the action to apply to it.
#[derive(Debug, Clone, Serialize)]
pub struct IndexAction<T> {
    #[serde(rename = "@search.action")]
    pub action: IndexActionType,
    #[serde(flatten)]
    pub document: T,
}

/// A set of indexing actions sent in one request.
#[derive(Debug, Clone, Serialize)]
pub struct IndexDocumentsBatch<T> {
    #[serde(rename = "value")]
    pub actions: Vec<IndexAction<T>>,
}

impl<T> Default for IndexDocumentsBatch<T> {
    fn default() -> Self {
        Self {
            actions: Vec::new(),
        }
    }
}

impl<T> IndexDocumentsBatch<T> {
    /// Batch applying `action` to every document.
    pub fn with_action(action: IndexActionType, documents: impl IntoIterator<Item = T>) -> Self {
        let mut batch = Self::default();
        batch.push(action, documents);
        batch
    }

    pub fn upload(documents: impl IntoIterator<Item = T>) -> Self {
        Self::with_action(IndexActionType::Upload, documents)
    }

    pub fn merge_or_upload(documents: impl IntoIterator<Item = T>) -> Self {
        Self::with_action(IndexActionType::MergeOrUpload, documents)
    }

    pub fn delete(documents: impl IntoIterator<Item = T>) -> Self {
        Self::with_action(IndexActionType::Delete, documents)
    }

    /// Append more actions to the batch.
    pub fn push(&mut self, action: IndexActionType, documents: impl IntoIterator<Item = T>) {
        self.actions.extend(
            documents
                .into_iter()
                .map(|document| IndexAction { action, document }),
        );
    }
}

/// Outcome of one indexing action.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexingResult {
    pub key: String,
    #[serde(rename = "status")]
    pub succeeded: bool,
    pub error_message: Option<String>,
    pub status_code: u16,
}

/// Outcome of an indexing batch.
#[derive(Debug, Clone, Deserialize)]
pub struct IndexDocumentsResult {
    #[serde(rename = "value")]
    pub results: Vec<IndexingResult>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::VectorQuery;
    use crate::test_utils::{setup_service_client, TEST_API_KEY, TEST_INDEX};
    use serde_json::{json, Value};
    use wiremock::matchers::{body_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
    struct Chunk {
        id: String,
        content: String,
    }

    async fn setup_client<T>(server: &MockServer) -> SearchClient<T> {
        SearchClient::new(setup_service_client(server).await, TEST_INDEX)
    }

    #[tokio::test]
    async fn search_posts_body_and_parses_hits() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/indexes/chat-index/docs/search"))
            .and(query_param("api-version", "2023-11-01"))
            .and(header("api-key", TEST_API_KEY))
            .and(body_json(json!({
                "search": "hello",
                "top": 2,
                "vectorQueries": [{"vector": [0.25], "fields": "embedding", "kind": "vector", "k": 2}]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "value": [
                    {"@search.score": 2.5, "id": "a", "content": "first"},
                    {"@search.score": 1.25, "id": "b", "content": "second"}
                ]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = setup_client::<Chunk>(&server).await;
        let options = SearchOptions::default()
            .top(2)
            .vector_query(VectorQuery::new(vec![0.25], ["embedding"], 2));

        let hits = client.search("hello", &options).await.expect("search");

        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].score, 2.5);
        assert_eq!(hits[0].document.id, "a");
        assert_eq!(hits[1].document.content, "second");
    }

    #[tokio::test]
    async fn search_error_surfaces_api_error() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/indexes/chat-index/docs/search"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "error": {"code": "InvalidRequestParameter", "message": "Invalid filter"}
            })))
            .mount(&server)
            .await;

        let client = setup_client::<Value>(&server).await;
        let err = client
            .search("*", &SearchOptions::default().filter("bad eq"))
            .await
            .expect_err("should fail");

        assert!(matches!(err, ServiceError::Api { ref code, .. } if code == "InvalidRequestParameter"));
    }

    #[tokio::test]
    async fn trait_object_dispatches_to_client() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/indexes/chat-index/docs/search"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "value": [{"@search.score": 0.5, "id": "z"}]
            })))
            .mount(&server)
            .await;

        let search: Box<dyn DocumentSearch<Value>> = Box::new(setup_client::<Value>(&server).await);
        let hits = search.search("*", &SearchOptions::default()).await.expect("search");

        assert_eq!(search.strategy(), SearchStrategy::Client);
        assert_eq!(hits[0].document, json!({"id": "z"}));
    }

    #[tokio::test]
    async fn get_document_strips_odata_context() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/indexes/chat-index/docs/doc-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "@odata.context": "https://contoso.search.windows.net/indexes('chat-index')/$metadata#docs/$entity",
                "id": "doc-1",
                "content": "hello"
            })))
            .mount(&server)
            .await;

        let client = setup_client::<Chunk>(&server).await;
        let doc = client.get_document("doc-1").await.expect("document");

        assert_eq!(
            doc,
            Chunk {
                id: "doc-1".into(),
                content: "hello".into()
            }
        );
    }

    #[tokio::test]
    async fn document_count_parses_plain_text() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/indexes/chat-index/docs/$count"))
            .respond_with(ResponseTemplate::new(200).set_body_string("\u{feff}42"))
            .mount(&server)
            .await;

        let client = setup_client::<Value>(&server).await;
        assert_eq!(client.document_count().await.expect("count"), 42);
    }

    #[tokio::test]
    async fn upload_documents_sends_actions() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/indexes/chat-index/docs/index"))
            .and(body_json(json!({
                "value": [
                    {"@search.action": "upload", "id": "1", "content": "one"},
                    {"@search.action": "upload", "id": "2", "content": "two"}
                ]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "value": [
                    {"key": "1", "status": true, "errorMessage": null, "statusCode": 201},
                    {"key": "2", "status": true, "errorMessage": null, "statusCode": 201}
                ]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = setup_client::<Chunk>(&server).await;
        let result = client
            .upload_documents(vec![
                Chunk {
                    id: "1".into(),
                    content: "one".into(),
                },
                Chunk {
                    id: "2".into(),
                    content: "two".into(),
                },
            ])
            .await
            .expect("indexing");

        assert_eq!(result.results.len(), 2);
        assert!(result.results.iter().all(|r| r.succeeded));
    }

    #[tokio::test]
    async fn partial_batch_failure_is_reported_per_key() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/indexes/chat-index/docs/index"))
            .respond_with(ResponseTemplate::new(207).set_body_json(json!({
                "value": [
                    {"key": "1", "status": true, "errorMessage": null, "statusCode": 200},
                    {"key": "2", "status": false, "errorMessage": "Document not found.", "statusCode": 404}
                ]
            })))
            .mount(&server)
            .await;

        let client = setup_client::<Value>(&server).await;
        let result = client
            .delete_documents(vec![json!({"id": "1"}), json!({"id": "2"})])
            .await
            .expect("batch");

        assert!(result.results[0].succeeded);
        assert!(!result.results[1].succeeded);
        assert_eq!(result.results[1].status_code, 404);
        assert_eq!(result.results[1].error_message.as_deref(), Some("Document not found."));
    }

    #[test]
    fn batch_serializes_action_annotation() {
        let mut batch = IndexDocumentsBatch::merge_or_upload(vec![json!({"id": "1"})]);
        batch.push(IndexActionType::Delete, vec![json!({"id": "2"})]);

        let body = serde_json::to_value(&batch).unwrap();
        assert_eq!(
            body,
            json!({"value": [
                {"@search.action": "mergeOrUpload", "id": "1"},
                {"@search.action": "delete", "id": "2"}
            ]})
        );
    }

    #[tokio::test]
    #[tracing_test::traced_test]
    async fn search_emits_span() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/indexes/chat-index/docs/search"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"value": []})))
            .mount(&server)
            .await;

        let client = setup_client::<Value>(&server).await;
        let _ = client.search("*", &SearchOptions::default()).await;

        assert!(logs_contain("azure_chat::search::search"));
        assert!(logs_contain("chat-index"));
    }
}
