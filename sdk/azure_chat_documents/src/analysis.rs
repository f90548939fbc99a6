//! Document analysis client.
//!
//! Analysis is a long-running operation: the submit call answers
//! `202 Accepted` with an `Operation-Location` header, and the result is
//! polled from that URL until it reaches a terminal status.
//!
//! ## Example
//!
//! ```rust,no_run
//! use azure_chat_core::config::ServiceConfig;
//! use azure_chat_documents::factory::DocumentAnalysisClientFactory;
//! use azure_chat_documents::models::{DocumentAnalysisRequest, PREBUILT_READ};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ServiceConfig::from_env();
//! let client = DocumentAnalysisClientFactory::new(&config).create()?;
//!
//! let request = DocumentAnalysisRequest::builder()
//!     .model_id(PREBUILT_READ)
//!     .url_source("https://example.com/handbook.pdf")
//!     .build()?;
//!
//! let result = client.analyze_document(&request).await?;
//! for paragraph in result.paragraph_texts() {
//!     println!("{paragraph}");
//! }
//! # Ok(())
//! # }
//! ```

use crate::models::{
    AnalyzeOperation, AnalyzeOperationError, AnalyzeOperationResult, AnalyzeResult,
    AnalyzeResultStatus, DocumentAnalysisRequest,
};
use azure_chat_core::auth::AzureCredential;
use azure_chat_core::client::ServiceClient;
use azure_chat_core::error::{ServiceError, ServiceResult};
use std::time::Duration;
use url::Url;

/// How [`DocumentAnalysisClient::analyze_document`] waits for a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollOptions {
    pub interval: Duration,
    /// `0` polls without limit.
    pub max_attempts: u32,
}

impl Default for PollOptions {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(1),
            max_attempts: 120,
        }
    }
}

/// Client for one Document Intelligence resource.
#[derive(Debug, Clone)]
pub struct DocumentAnalysisClient {
    client: ServiceClient,
    poll: PollOptions,
}

impl DocumentAnalysisClient {
    pub fn new(client: ServiceClient) -> Self {
        Self {
            client,
            poll: PollOptions::default(),
        }
    }

    pub fn with_poll_options(mut self, poll: PollOptions) -> Self {
        self.poll = poll;
        self
    }

    pub fn endpoint(&self) -> &Url {
        self.client.endpoint()
    }

    pub fn credential(&self) -> &AzureCredential {
        self.client.credential()
    }

    /// Submit a document and return the operation to poll.
    ///
    /// # Errors
    ///
    /// Fails with [`ServiceError::Api`] (`MissingHeader`) when the service
    /// accepts the request without an `Operation-Location` header.
    #[tracing::instrument(
        name = "azure_chat::documents::begin_analyze",
        skip(self, request),
        fields(model_id = %request.model_id)
    )]
    pub async fn begin_analyze_document(
        &self,
        request: &DocumentAnalysisRequest,
    ) -> ServiceResult<AnalyzeOperation> {
        tracing::debug!("submitting document for analysis");

        let response = self
            .client
            .post(&request.analyze_path(), &request.body())
            .await?;

        let operation_location = response
            .headers()
            .get("Operation-Location")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .ok_or_else(|| ServiceError::Api {
                code: "MissingHeader".into(),
                message: "Operation-Location header missing from response".into(),
            })?;

        tracing::debug!(operation_location = %operation_location, "document analysis submitted");
        Ok(AnalyzeOperation { operation_location })
    }

    /// Fetch the current state of an operation.
    #[tracing::instrument(
        name = "azure_chat::documents::get_analyze_result",
        skip(self),
        fields(operation_location = %operation_location)
    )]
    pub async fn get_analyze_result(
        &self,
        operation_location: &str,
    ) -> ServiceResult<AnalyzeOperationResult> {
        let parsed = Url::parse(operation_location).map_err(|e| {
            ServiceError::invalid_endpoint_with_source("failed to parse Operation-Location URL", e)
        })?;
        // Requests go through the configured endpoint; only path and query are kept.
        let relative_path = match parsed.query() {
            Some(q) => format!("{}?{q}", parsed.path()),
            None => parsed.path().to_string(),
        };

        let response = self.client.get(&relative_path).await?;
        let result = response.json::<AnalyzeOperationResult>().await?;

        tracing::debug!(status = %result.status, "analyze result fetched");
        Ok(result)
    }

    /// Poll until the operation succeeds or fails.
    ///
    /// # Errors
    ///
    /// Fails with [`ServiceError::Api`] (`PollTimeout`) when `max_attempts`
    /// polls pass without a terminal status.
    #[tracing::instrument(
        name = "azure_chat::documents::poll_until_complete",
        skip(self),
        fields(operation_location = %operation_location)
    )]
    pub async fn poll_until_complete(
        &self,
        operation_location: &str,
        poll_interval: Duration,
        max_attempts: u32,
    ) -> ServiceResult<AnalyzeOperationResult> {
        let mut attempts = 0u32;

        loop {
            if max_attempts > 0 {
                attempts += 1;
                if attempts > max_attempts {
                    return Err(ServiceError::Api {
                        code: "PollTimeout".into(),
                        message: format!("analysis not finished after {max_attempts} polls"),
                    });
                }
            }

            let result = self.get_analyze_result(operation_location).await?;
            if result.status.is_terminal() {
                return Ok(result);
            }

            tracing::trace!(status = %result.status, attempt = attempts, "analysis in progress");
            tokio::time::sleep(poll_interval).await;
        }
    }

    /// Submit a document and wait for its analysis.
    ///
    /// # Errors
    ///
    /// A failed operation is returned as [`ServiceError::Api`] with the
    /// service error code.
    #[tracing::instrument(
        name = "azure_chat::documents::analyze_document",
        skip(self, request),
        fields(model_id = %request.model_id)
    )]
    pub async fn analyze_document(
        &self,
        request: &DocumentAnalysisRequest,
    ) -> ServiceResult<AnalyzeResult> {
        let operation = self.begin_analyze_document(request).await?;
        let outcome = self
            .poll_until_complete(
                &operation.operation_location,
                self.poll.interval,
                self.poll.max_attempts,
            )
            .await?;

        match outcome.status {
            AnalyzeResultStatus::Succeeded => outcome.analyze_result.ok_or_else(|| ServiceError::Api {
                code: "MissingResult".into(),
                message: "operation succeeded without an analyzeResult".into(),
            }),
            _ => {
                let error = outcome.error.unwrap_or_else(|| AnalyzeOperationError {
                    code: "AnalysisFailed".into(),
                    message: format!("analysis ended with status {}", outcome.status),
                });
                tracing::warn!(code = %error.code, "document analysis failed");
                Err(ServiceError::Api {
                    code: error.code,
                    message: ServiceClient::truncate_message(&error.message),
                })
            }
        }
    }
}
