//! Integration tests for azure_chat_documents.
//!
//! These tests require a live Document Intelligence resource.
//! Run with: `cargo test --features integration-tests`
//!
//! Required environment variables:
//! - `AZURE_DOCUMENT_INTELLIGENCE_ENDPOINT`: The resource endpoint URL
//! - `AZURE_DOCUMENT_INTELLIGENCE_KEY`: The resource key (unless `USE_MANAGED_IDENTITIES=true`)
//!
//! Optional: `DOCUMENT_URL`, a publicly reachable PDF to analyze.

#![cfg(feature = "integration-tests")]

use azure_chat_core::config::ServiceConfig;
use azure_chat_documents::factory::DocumentAnalysisClientFactory;
use azure_chat_documents::models::{AnalyzeResultStatus, DocumentAnalysisRequest, PREBUILT_LAYOUT, PREBUILT_READ};
use std::time::Duration;

const SAMPLE_DOCUMENT: &str =
    "https://raw.githubusercontent.com/Azure-Samples/cognitive-services-REST-api-samples/master/curl/form-recognizer/sample-layout.pdf";

fn document_url() -> String {
    std::env::var("DOCUMENT_URL").unwrap_or_else(|_| SAMPLE_DOCUMENT.to_string())
}

#[tokio::test]
async fn test_read_extracts_paragraphs() {
    let config = ServiceConfig::from_env();
    let client = DocumentAnalysisClientFactory::new(&config)
        .create()
        .expect("client");

    let request = DocumentAnalysisRequest::builder()
        .model_id(PREBUILT_READ)
        .url_source(document_url())
        .build()
        .expect("valid request");

    let result = client.analyze_document(&request).await.expect("analysis");
    assert!(!result.content.is_empty());
    assert!(!result.pages.is_empty());
    assert!(result.paragraph_texts().next().is_some());
}

#[tokio::test]
async fn test_layout_submit_and_poll() {
    let config = ServiceConfig::from_env();
    let client = DocumentAnalysisClientFactory::new(&config)
        .create()
        .expect("client");

    let request = DocumentAnalysisRequest::builder()
        .model_id(PREBUILT_LAYOUT)
        .url_source(document_url())
        .pages("1")
        .build()
        .expect("valid request");

    let operation = client
        .begin_analyze_document(&request)
        .await
        .expect("submitted");
    let outcome = client
        .poll_until_complete(&operation.operation_location, Duration::from_secs(2), 60)
        .await
        .expect("terminal status");

    assert_eq!(outcome.status, AnalyzeResultStatus::Succeeded);
    let result = outcome.analyze_result.expect("analyze result");
    assert_eq!(result.pages.len(), 1);
}
