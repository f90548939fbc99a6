//! Query options, results and the search request wire format.

use azure_chat_core::error::ServiceResult;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// REST API version used for every Azure AI Search request.
pub const SEARCH_API_VERSION: &str = "2023-11-01";

/// Response key holding the relevance score of a hit.
pub(crate) const SCORE_KEY: &str = "@search.score";

/// Prefix of the annotations the service adds to each hit.
const SEARCH_ANNOTATION_PREFIX: &str = "@search.";

/// Prefix of OData annotations on single-document responses.
const ODATA_ANNOTATION_PREFIX: &str = "@odata.";

/// Kind of a vector query.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VectorQueryKind {
    /// The query carries a precomputed embedding.
    #[default]
    Vector,
}

/// A nearest-neighbor query over one or more vector fields.
#[derive(Debug, Clone, PartialEq)]
pub struct VectorQuery {
    pub vector: Vec<f32>,
    pub fields: Vec<String>,
    pub kind: VectorQueryKind,
    pub k_nearest_neighbors: u32,
}

impl VectorQuery {
    /// Create a [`VectorQueryKind::Vector`] query.
    pub fn new<I, S>(vector: Vec<f32>, fields: I, k_nearest_neighbors: u32) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            vector,
            fields: fields.into_iter().map(Into::into).collect(),
            kind: VectorQueryKind::Vector,
            k_nearest_neighbors,
        }
    }
}

/// Vector part of a search request.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VectorSearchOptions {
    pub queries: Vec<VectorQuery>,
}

/// Options for a search request.
///
/// ```rust
/// use azure_chat_search::models::{SearchOptions, VectorQuery};
///
/// let options = SearchOptions::default()
///     .top(5)
///     .filter("user eq 'alice'")
///     .vector_query(VectorQuery::new(vec![0.1, 0.2], ["embedding"], 5));
/// assert_eq!(options.top, Some(5));
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchOptions {
    /// Maximum number of results.
    pub top: Option<u32>,
    /// OData filter expression.
    pub filter: Option<String>,
    pub vector_search: Option<VectorSearchOptions>,
}

impl SearchOptions {
    pub fn top(mut self, top: u32) -> Self {
        self.top = Some(top);
        self
    }

    pub fn filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = Some(filter.into());
        self
    }

    /// Add a vector query, creating the vector options if needed.
    pub fn vector_query(mut self, query: VectorQuery) -> Self {
        self.vector_search
            .get_or_insert_with(VectorSearchOptions::default)
            .queries
            .push(query);
        self
    }
}

/// One hit of a search request.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchResult<T> {
    /// Relevance score assigned by the service.
    pub score: f64,
    pub document: T,
}

/// A vector query as the REST API expects it.
#[derive(Debug, Serialize)]
pub(crate) struct VectorQueryBody<'a> {
    vector: &'a [f32],
    /// Comma-separated field names.
    fields: String,
    kind: VectorQueryKind,
    k: u32,
}

/// JSON body of `POST /indexes/{index}/docs/search`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SearchRequestBody<'a> {
    search: &'a str,

    #[serde(skip_serializing_if = "Option::is_none")]
    top: Option<u32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    filter: Option<&'a str>,

    #[serde(skip_serializing_if = "Option::is_none")]
    vector_queries: Option<Vec<VectorQueryBody<'a>>>,
}

impl<'a> SearchRequestBody<'a> {
    pub(crate) fn new(search_text: &'a str, options: &'a SearchOptions) -> Self {
        let vector_queries = options.vector_search.as_ref().map(|vector_search| {
            vector_search
                .queries
                .iter()
                .map(|query| VectorQueryBody {
                    vector: &query.vector,
                    fields: query.fields.join(","),
                    kind: query.kind,
                    k: query.k_nearest_neighbors,
                })
                .collect()
        });

        Self {
            search: search_text,
            top: options.top,
            filter: options.filter.as_deref(),
            vector_queries,
        }
    }
}

/// JSON body returned by the search endpoint.
#[derive(Debug, Deserialize)]
pub(crate) struct SearchResponseBody {
    value: Option<Vec<Map<String, Value>>>,
}

impl SearchResponseBody {
    /// Convert the raw hits into typed results.
    ///
    /// A missing `value` array yields no results. The score comes from
    /// `@search.score` (0.0 when absent) and every `@search.*` annotation is
    /// removed before the document is deserialized.
    pub(crate) fn into_results<T: DeserializeOwned>(self) -> ServiceResult<Vec<SearchResult<T>>> {
        self.value
            .unwrap_or_default()
            .into_iter()
            .map(|mut hit| {
                let score = hit.get(SCORE_KEY).and_then(Value::as_f64).unwrap_or_default();
                hit.retain(|key, _| !key.starts_with(SEARCH_ANNOTATION_PREFIX));
                let document = serde_json::from_value(Value::Object(hit))?;
                Ok(SearchResult { score, document })
            })
            .collect()
    }
}

/// Deserialize a single document, dropping OData annotations.
pub(crate) fn document_from_json<T: DeserializeOwned>(
    mut document: Map<String, Value>,
) -> ServiceResult<T> {
    document.retain(|key, _| !key.starts_with(ODATA_ANNOTATION_PREFIX));
    Ok(serde_json::from_value(Value::Object(document))?)
}
