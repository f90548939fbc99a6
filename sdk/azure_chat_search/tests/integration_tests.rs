//! Integration tests for azure_chat_search.
//!
//! These tests require a live Azure AI Search service with an existing index.
//! Run with: `cargo test --features integration-tests`
//!
//! Required environment variables:
//! - `AZURE_SEARCH_NAME`: The search resource name
//! - `AZURE_SEARCH_INDEX_NAME`: An existing index
//! - `AZURE_SEARCH_API_KEY`: An admin or query key (the direct API always needs it)
//!
//! Optional: `AZURE_SEARCH_ENDPOINT_SUFFIX`, `USE_MANAGED_IDENTITIES`, `AZURE_AUTHORITY_HOST`.

#![cfg(feature = "integration-tests")]

use azure_chat_core::config::ServiceConfig;
use azure_chat_search::factory::SearchClientFactory;
use azure_chat_search::models::SearchOptions;
use serde_json::Value;

#[tokio::test]
async fn test_client_and_direct_api_agree() {
    let config = ServiceConfig::from_env();
    let factory = SearchClientFactory::new(&config);
    let options = SearchOptions::default().top(3);

    let client = factory.search_client::<Value>().expect("search client");
    let via_client = client.search("*", &options).await.expect("client search");

    let direct = factory.direct_search_api::<Value>().expect("direct api");
    let via_direct = direct.search("*", &options).await.expect("direct search");

    assert!(via_client.len() <= 3);
    assert_eq!(via_client.len(), via_direct.len());
    for hit in via_direct {
        assert!(hit.document.get("@search.score").is_none());
    }
}

#[tokio::test]
async fn test_index_statistics_match_count() {
    let config = ServiceConfig::from_env();
    let factory = SearchClientFactory::new(&config);
    let index_name = config.search.index_name.clone().expect("AZURE_SEARCH_INDEX_NAME not set");

    let index_client = factory.index_client().expect("index client");
    let names = index_client.list_index_names().await.expect("list indexes");
    assert!(names.contains(&index_name));

    let index = index_client.get_index(&index_name).await.expect("get index");
    assert!(index.key_field().is_some());

    let stats = index_client
        .get_index_statistics(&index_name)
        .await
        .expect("statistics");
    let count = factory
        .search_client::<Value>()
        .expect("search client")
        .document_count()
        .await
        .expect("document count");
    assert_eq!(stats.document_count, count);
}
