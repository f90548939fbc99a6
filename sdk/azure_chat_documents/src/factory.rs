//! Builds [`DocumentAnalysisClient`]s from [`ServiceConfig`].

use crate::analysis::DocumentAnalysisClient;
use crate::models::DOCUMENT_INTELLIGENCE_API_VERSION;
use azure_chat_core::auth::CredentialResolver;
use azure_chat_core::client::ServiceClient;
use azure_chat_core::config::{vars, ServiceConfig};
use azure_chat_core::error::{ServiceError, ServiceResult};

/// Header carrying the Cognitive Services resource key.
pub const SUBSCRIPTION_KEY_HEADER: &str = "Ocp-Apim-Subscription-Key";

/// Constructs Document Intelligence clients for the configured resource.
#[derive(Debug, Clone, Copy)]
pub struct DocumentAnalysisClientFactory<'a> {
    config: &'a ServiceConfig,
}

impl<'a> DocumentAnalysisClientFactory<'a> {
    pub fn new(config: &'a ServiceConfig) -> Self {
        Self { config }
    }

    /// Build a client for `AZURE_DOCUMENT_INTELLIGENCE_ENDPOINT`.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::MissingConfig`] when the endpoint is not set
    /// (checked before any credential is resolved), or when managed
    /// identities are off and no key is set.
    pub fn create(&self) -> ServiceResult<DocumentAnalysisClient> {
        let settings = &self.config.document_intelligence;
        tracing::info!(endpoint = ?settings.endpoint, "creating document analysis client");

        let endpoint = settings.endpoint.as_deref().ok_or_else(|| {
            ServiceError::MissingConfig(format!(
                "Document Intelligence endpoint is not set ({})",
                vars::AZURE_DOCUMENT_INTELLIGENCE_ENDPOINT
            ))
        })?;

        let credential = CredentialResolver::new(&self.config.identity)
            .with_debug(self.config.debug)
            .resolve(settings.key.as_ref());

        if !self.config.identity.use_managed_identities && settings.key.is_none() {
            return Err(ServiceError::MissingConfig(format!(
                "Document Intelligence key is not set ({})",
                vars::AZURE_DOCUMENT_INTELLIGENCE_KEY
            )));
        }

        let client = ServiceClient::builder()
            .endpoint(endpoint)
            .key_header(SUBSCRIPTION_KEY_HEADER)
            .token_scope(credential.cloud().cognitive_services_scope())
            .credential(credential)
            .api_version(DOCUMENT_INTELLIGENCE_API_VERSION)
            .build()?;
        let client = DocumentAnalysisClient::new(client);

        if self.config.debug {
            tracing::info!(client = ?client, "document analysis client created");
        }
        Ok(client)
    }
}
