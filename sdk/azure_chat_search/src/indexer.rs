//! Indexer management: definitions, runs and execution status.

use azure_chat_core::auth::AzureCredential;
use azure_chat_core::client::ServiceClient;
use azure_chat_core::error::ServiceResult;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use url::Url;

/// An indexer pulling documents from a data source into an index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchIndexer {
    pub name: String,
    pub data_source_name: String,
    pub target_index_name: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub skillset_name: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub schedule: Option<IndexingSchedule>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_disabled: Option<bool>,

    #[serde(rename = "@odata.etag", skip_serializing_if = "Option::is_none")]
    pub etag: Option<String>,

    /// Parameters, field mappings and other sections passed through as-is.
    #[serde(flatten)]
    pub additional: Map<String, Value>,
}

impl SearchIndexer {
    pub fn new(
        name: impl Into<String>,
        data_source_name: impl Into<String>,
        target_index_name: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            data_source_name: data_source_name.into(),
            target_index_name: target_index_name.into(),
            skillset_name: None,
            schedule: None,
            is_disabled: None,
            etag: None,
            additional: Map::new(),
        }
    }

    pub fn with_skillset(mut self, skillset_name: impl Into<String>) -> Self {
        self.skillset_name = Some(skillset_name.into());
        self
    }

    pub fn with_schedule(mut self, schedule: IndexingSchedule) -> Self {
        self.schedule = Some(schedule);
        self
    }
}

/// How often an indexer runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexingSchedule {
    /// ISO 8601 duration, e.g. `PT2H`.
    pub interval: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_time: Option<String>,
}

impl IndexingSchedule {
    pub fn every(interval: impl Into<String>) -> Self {
        Self {
            interval: interval.into(),
            start_time: None,
        }
    }
}

/// Overall state of an indexer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum IndexerStatus {
    Unknown,
    Error,
    Running,
}

/// Outcome of a single indexer execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum IndexerExecutionStatus {
    TransientFailure,
    Success,
    InProgress,
    Reset,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexerExecutionResult {
    pub status: IndexerExecutionStatus,
    #[serde(default)]
    pub error_message: Option<String>,
    #[serde(default)]
    pub start_time: Option<String>,
    #[serde(default)]
    pub end_time: Option<String>,
    #[serde(default)]
    pub item_count: u64,
    #[serde(default)]
    pub failed_item_count: u64,
}

/// Status and execution history of an indexer.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchIndexerStatus {
    pub status: IndexerStatus,
    #[serde(default)]
    pub last_result: Option<IndexerExecutionResult>,
    /// Most recent first.
    #[serde(default)]
    pub execution_history: Vec<IndexerExecutionResult>,
}

#[derive(Debug, Deserialize)]
struct IndexerNameList {
    value: Vec<IndexerName>,
}

#[derive(Debug, Deserialize)]
struct IndexerName {
    name: String,
}

/// Manages indexers on one search service.
#[derive(Debug, Clone)]
pub struct SearchIndexerClient {
    client: ServiceClient,
}

impl SearchIndexerClient {
    pub fn new(client: ServiceClient) -> Self {
        Self { client }
    }

    pub fn endpoint(&self) -> &Url {
        self.client.endpoint()
    }

    pub fn credential(&self) -> &AzureCredential {
        self.client.credential()
    }

    #[tracing::instrument(
        name = "azure_chat::search::create_or_update_indexer",
        skip(self, indexer),
        fields(indexer = %indexer.name)
    )]
    pub async fn create_or_update_indexer(
        &self,
        indexer: &SearchIndexer,
    ) -> ServiceResult<SearchIndexer> {
        let response = self
            .client
            .put(&format!("/indexers/{}", indexer.name), indexer)
            .await?;
        Ok(response.json::<SearchIndexer>().await?)
    }

    #[tracing::instrument(name = "azure_chat::search::get_indexer", skip(self))]
    pub async fn get_indexer(&self, name: &str) -> ServiceResult<SearchIndexer> {
        let response = self.client.get(&format!("/indexers/{name}")).await?;
        Ok(response.json::<SearchIndexer>().await?)
    }

    #[tracing::instrument(name = "azure_chat::search::delete_indexer", skip(self))]
    pub async fn delete_indexer(&self, name: &str) -> ServiceResult<()> {
        self.client.delete(&format!("/indexers/{name}")).await?;
        Ok(())
    }

    #[tracing::instrument(name = "azure_chat::search::list_indexer_names", skip(self))]
    pub async fn list_indexer_names(&self) -> ServiceResult<Vec<String>> {
        let response = self.client.get("/indexers?$select=name").await?;
        let list = response.json::<IndexerNameList>().await?;
        Ok(list.value.into_iter().map(|indexer| indexer.name).collect())
    }

    /// Start an indexer run now. The service answers before the run finishes.
    #[tracing::instrument(name = "azure_chat::search::run_indexer", skip(self))]
    pub async fn run_indexer(&self, name: &str) -> ServiceResult<()> {
        self.client.post_empty(&format!("/indexers/{name}/run")).await?;
        tracing::debug!("indexer run requested");
        Ok(())
    }

    /// Clear change tracking so the next run reprocesses every document.
    #[tracing::instrument(name = "azure_chat::search::reset_indexer", skip(self))]
    pub async fn reset_indexer(&self, name: &str) -> ServiceResult<()> {
        self.client.post_empty(&format!("/indexers/{name}/reset")).await?;
        Ok(())
    }

    #[tracing::instrument(name = "azure_chat::search::get_indexer_status", skip(self))]
    pub async fn get_indexer_status(&self, name: &str) -> ServiceResult<SearchIndexerStatus> {
        let response = self.client.get(&format!("/indexers/{name}/status")).await?;
        Ok(response.json::<SearchIndexerStatus>().await?)
    }
}
