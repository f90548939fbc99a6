//! Builds search clients from [`ServiceConfig`].
//!
//! Every constructor resolves the credential afresh and returns a new
//! client; the factory itself holds nothing but the configuration reference.

use crate::direct::DirectSearchApi;
use crate::index::SearchIndexClient;
use crate::indexer::SearchIndexerClient;
use crate::models::SEARCH_API_VERSION;
use crate::query::{DocumentSearch, SearchClient};
use azure_chat_core::auth::{AzureCredential, CredentialResolver};
use azure_chat_core::client::ServiceClient;
use azure_chat_core::config::{vars, ServiceConfig};
use azure_chat_core::error::{ServiceError, ServiceResult};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use url::Url;

/// Constructs Azure AI Search clients for the configured service.
#[derive(Debug, Clone, Copy)]
pub struct SearchClientFactory<'a> {
    config: &'a ServiceConfig,
}

impl<'a> SearchClientFactory<'a> {
    pub fn new(config: &'a ServiceConfig) -> Self {
        Self { config }
    }

    /// The service endpoint, `https://{AZURE_SEARCH_NAME}.{AZURE_SEARCH_ENDPOINT_SUFFIX}`.
    pub fn endpoint(&self) -> ServiceResult<String> {
        self.config
            .search
            .endpoint()
            .ok_or_else(|| ServiceError::MissingConfig(vars::AZURE_SEARCH_NAME.into()))
    }

    /// Resolve the search credential.
    ///
    /// # Errors
    ///
    /// Fails with [`ServiceError::MissingConfig`] when managed identities are
    /// off and no search key is configured.
    pub fn credential(&self) -> ServiceResult<AzureCredential> {
        let credential = CredentialResolver::new(&self.config.identity)
            .with_debug(self.config.debug)
            .resolve(self.config.search.api_key.as_ref());

        if credential.is_empty_key() {
            return Err(ServiceError::MissingConfig(vars::AZURE_SEARCH_API_KEY.into()));
        }
        Ok(credential)
    }

    fn index_name(&self) -> ServiceResult<&'a str> {
        self.config
            .search
            .index_name
            .as_deref()
            .ok_or_else(|| ServiceError::MissingConfig(vars::AZURE_SEARCH_INDEX_NAME.into()))
    }

    fn service_client(&self) -> ServiceResult<ServiceClient> {
        let endpoint = self.endpoint()?;
        let credential = self.credential()?;

        ServiceClient::builder()
            .endpoint(endpoint)
            .token_scope(credential.cloud().search_scope())
            .credential(credential)
            .api_version(SEARCH_API_VERSION)
            .build()
    }

    /// Query and indexing client for the configured index.
    pub fn search_client<T>(&self) -> ServiceResult<SearchClient<T>> {
        tracing::info!("creating search client");

        let index_name = self.index_name()?;
        let client = SearchClient::new(self.service_client()?, index_name);

        tracing::info!(client = ?client, "search client created");
        Ok(client)
    }

    /// Index management client.
    pub fn index_client(&self) -> ServiceResult<SearchIndexClient> {
        tracing::info!("creating search index client");

        let client = SearchIndexClient::new(self.service_client()?);

        tracing::info!(endpoint = %client.endpoint(), mode = %client.credential().mode(), "search index client created");
        Ok(client)
    }

    /// Indexer management client.
    pub fn indexer_client(&self) -> ServiceResult<SearchIndexerClient> {
        tracing::info!("creating search indexer client");

        let client = SearchIndexerClient::new(self.service_client()?);

        tracing::info!(endpoint = %client.endpoint(), mode = %client.credential().mode(), "search indexer client created");
        Ok(client)
    }

    /// REST fallback for queries.
    ///
    /// Always authenticates with the search key, even when managed
    /// identities are enabled.
    pub fn direct_search_api<T>(&self) -> ServiceResult<DirectSearchApi<T>> {
        tracing::info!("creating direct search API");

        let endpoint = self.endpoint()?;
        let endpoint = Url::parse(&endpoint)
            .map_err(|e| ServiceError::invalid_endpoint_with_source("invalid search endpoint", e))?;
        let index_name = self.index_name()?;
        let api_key = self
            .config
            .search
            .api_key
            .clone()
            .ok_or_else(|| ServiceError::MissingConfig(vars::AZURE_SEARCH_API_KEY.into()))?;

        let api = DirectSearchApi::new(&endpoint, index_name, api_key)?.with_debug(self.config.debug);

        tracing::info!(api = ?api, "direct search API created");
        Ok(api)
    }

    /// The query capability selected by `AZURE_SEARCH_USE_DIRECT_API`.
    pub fn document_search<T>(&self) -> ServiceResult<Arc<dyn DocumentSearch<T>>>
    where
        T: DeserializeOwned + Send + 'static,
    {
        if self.config.search.use_direct_api {
            Ok(Arc::new(self.direct_search_api::<T>()?))
        } else {
            Ok(Arc::new(self.search_client::<T>()?))
        }
    }
}
