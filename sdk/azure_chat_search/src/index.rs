//! Index schema management.
//!
//! ```rust,no_run
//! use azure_chat_search::index::{SearchField, SearchIndex, SearchIndexClient};
//!
//! # async fn example(client: SearchIndexClient) -> Result<(), Box<dyn std::error::Error>> {
//! let index = SearchIndex::new(
//!     "chat-index",
//!     vec![
//!         SearchField::new("id", "Edm.String").key(),
//!         SearchField::new("pageContent", "Edm.String").searchable(),
//!         SearchField::new("user", "Edm.String").filterable(),
//!     ],
//! );
//! client.create_or_update_index(&index).await?;
//! # Ok(())
//! # }
//! ```

use azure_chat_core::auth::AzureCredential;
use azure_chat_core::client::ServiceClient;
use azure_chat_core::error::ServiceResult;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use url::Url;

/// A search index definition.
///
/// Only the name and fields are typed. Everything else the service returns
/// (vector search profiles, semantic configuration, scoring profiles, ...)
/// is kept in [`additional`](Self::additional) and sent back unchanged on
/// update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchIndex {
    pub name: String,

    #[serde(default)]
    pub fields: Vec<SearchField>,

    /// Concurrency token of the stored definition.
    #[serde(rename = "@odata.etag", skip_serializing_if = "Option::is_none")]
    pub etag: Option<String>,

    #[serde(flatten)]
    pub additional: Map<String, Value>,
}

impl SearchIndex {
    pub fn new(name: impl Into<String>, fields: Vec<SearchField>) -> Self {
        Self {
            name: name.into(),
            fields,
            etag: None,
            additional: Map::new(),
        }
    }

    /// Key field of the index, if one is declared.
    pub fn key_field(&self) -> Option<&SearchField> {
        self.fields.iter().find(|field| field.key == Some(true))
    }
}

/// A field in an index schema.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchField {
    pub name: String,

    /// EDM type, e.g. `Edm.String` or `Collection(Edm.Single)`.
    #[serde(rename = "type")]
    pub data_type: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub key: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub searchable: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub filterable: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub sortable: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub facetable: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub retrievable: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub analyzer: Option<String>,

    /// Embedding size of a vector field.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dimensions: Option<u32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub vector_search_profile: Option<String>,

    /// Sub-fields of a complex field.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<SearchField>,
}

impl SearchField {
    pub fn new(name: impl Into<String>, data_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data_type: data_type.into(),
            ..Self::default()
        }
    }

    /// A `Collection(Edm.Single)` field searched by vector queries.
    pub fn vector(name: impl Into<String>, dimensions: u32, profile: impl Into<String>) -> Self {
        Self {
            searchable: Some(true),
            dimensions: Some(dimensions),
            vector_search_profile: Some(profile.into()),
            ..Self::new(name, "Collection(Edm.Single)")
        }
    }

    pub fn key(mut self) -> Self {
        self.key = Some(true);
        self
    }

    pub fn searchable(mut self) -> Self {
        self.searchable = Some(true);
        self
    }

    pub fn filterable(mut self) -> Self {
        self.filterable = Some(true);
        self
    }

    pub fn sortable(mut self) -> Self {
        self.sortable = Some(true);
        self
    }
}

/// Document count and storage usage of an index.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexStatistics {
    pub document_count: u64,
    /// Bytes.
    pub storage_size: u64,
    #[serde(default)]
    pub vector_index_size: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct IndexNameList {
    value: Vec<IndexName>,
}

#[derive(Debug, Deserialize)]
struct IndexName {
    name: String,
}

/// Manages index definitions on one search service.
#[derive(Debug, Clone)]
pub struct SearchIndexClient {
    client: ServiceClient,
}

impl SearchIndexClient {
    pub fn new(client: ServiceClient) -> Self {
        Self { client }
    }

    pub fn endpoint(&self) -> &Url {
        self.client.endpoint()
    }

    pub fn credential(&self) -> &AzureCredential {
        self.client.credential()
    }

    /// Create the index, or replace the definition of an existing one.
    #[tracing::instrument(
        name = "azure_chat::search::create_or_update_index",
        skip(self, index),
        fields(index = %index.name)
    )]
    pub async fn create_or_update_index(&self, index: &SearchIndex) -> ServiceResult<SearchIndex> {
        let response = self
            .client
            .put(&format!("/indexes/{}", index.name), index)
            .await?;
        let stored = response.json::<SearchIndex>().await?;

        tracing::debug!(fields = stored.fields.len(), "index stored");
        Ok(stored)
    }

    #[tracing::instrument(name = "azure_chat::search::get_index", skip(self))]
    pub async fn get_index(&self, name: &str) -> ServiceResult<SearchIndex> {
        let response = self.client.get(&format!("/indexes/{name}")).await?;
        Ok(response.json::<SearchIndex>().await?)
    }

    /// Delete an index and all of its documents.
    #[tracing::instrument(name = "azure_chat::search::delete_index", skip(self))]
    pub async fn delete_index(&self, name: &str) -> ServiceResult<()> {
        self.client.delete(&format!("/indexes/{name}")).await?;
        tracing::debug!("index deleted");
        Ok(())
    }

    /// Names of every index on the service.
    #[tracing::instrument(name = "azure_chat::search::list_index_names", skip(self))]
    pub async fn list_index_names(&self) -> ServiceResult<Vec<String>> {
        let response = self.client.get("/indexes?$select=name").await?;
        let list = response.json::<IndexNameList>().await?;
        Ok(list.value.into_iter().map(|index| index.name).collect())
    }

    #[tracing::instrument(name = "azure_chat::search::get_index_statistics", skip(self))]
    pub async fn get_index_statistics(&self, name: &str) -> ServiceResult<IndexStatistics> {
        let response = self.client.get(&format!("/indexes/{name}/stats")).await?;
        Ok(response.json::<IndexStatistics>().await?)
    }
}
