//! Request and response types of the Form Recognizer analyze API.

use azure_chat_core::error::{ServiceError, ServiceResult};
use serde::{Deserialize, Serialize};

/// REST API version of every Document Intelligence request.
pub const DOCUMENT_INTELLIGENCE_API_VERSION: &str = "2023-07-31";

/// Prebuilt model for general text extraction (OCR).
pub const PREBUILT_READ: &str = "prebuilt-read";
/// Prebuilt model for layout analysis (tables, selection marks, paragraphs).
pub const PREBUILT_LAYOUT: &str = "prebuilt-layout";
/// Prebuilt model for text, layout and key-value pairs of any document.
pub const PREBUILT_DOCUMENT: &str = "prebuilt-document";
pub const PREBUILT_INVOICE: &str = "prebuilt-invoice";
pub const PREBUILT_RECEIPT: &str = "prebuilt-receipt";
/// Prebuilt model for passports and driver licenses.
pub const PREBUILT_ID_DOCUMENT: &str = "prebuilt-idDocument";
pub const PREBUILT_BUSINESS_CARD: &str = "prebuilt-businessCard";

/// Optional add-on capability of an analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentAnalysisFeature {
    /// High-resolution OCR for small or dense text.
    OcrHighResolution,
    Languages,
    Barcodes,
    Formulas,
    KeyValuePairs,
    StyleFont,
}

impl DocumentAnalysisFeature {
    fn as_str(self) -> &'static str {
        match self {
            Self::OcrHighResolution => "ocrHighResolution",
            Self::Languages => "languages",
            Self::Barcodes => "barcodes",
            Self::Formulas => "formulas",
            Self::KeyValuePairs => "keyValuePairs",
            Self::StyleFont => "styleFont",
        }
    }
}

/// A document to analyze, either by URL or inline.
///
/// ```rust
/// use azure_chat_documents::models::{DocumentAnalysisRequest, PREBUILT_READ};
///
/// let request = DocumentAnalysisRequest::builder()
///     .model_id(PREBUILT_READ)
///     .url_source("https://example.com/handbook.pdf")
///     .pages("1-3")
///     .build()
///     .expect("valid request");
/// assert_eq!(request.model_id, PREBUILT_READ);
/// ```
#[derive(Debug, Clone)]
pub struct DocumentAnalysisRequest {
    pub model_id: String,
    source: DocumentSource,
    pages: Option<String>,
    locale: Option<String>,
    features: Vec<DocumentAnalysisFeature>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum DocumentSource {
    Url(String),
    Base64(String),
}

/// JSON body of the analyze call.
#[derive(Debug, Serialize)]
pub(crate) struct DocumentAnalysisBody<'a> {
    #[serde(rename = "urlSource", skip_serializing_if = "Option::is_none")]
    url_source: Option<&'a str>,

    #[serde(rename = "base64Source", skip_serializing_if = "Option::is_none")]
    base64_source: Option<&'a str>,
}

impl DocumentAnalysisRequest {
    pub fn builder() -> DocumentAnalysisRequestBuilder {
        DocumentAnalysisRequestBuilder::default()
    }

    pub(crate) fn body(&self) -> DocumentAnalysisBody<'_> {
        match &self.source {
            DocumentSource::Url(url) => DocumentAnalysisBody {
                url_source: Some(url),
                base64_source: None,
            },
            DocumentSource::Base64(data) => DocumentAnalysisBody {
                url_source: None,
                base64_source: Some(data),
            },
        }
    }

    /// Path and query of the analyze call, without `api-version`.
    pub(crate) fn analyze_path(&self) -> String {
        let mut query = url::form_urlencoded::Serializer::new(String::new());
        if let Some(pages) = &self.pages {
            query.append_pair("pages", pages);
        }
        if let Some(locale) = &self.locale {
            query.append_pair("locale", locale);
        }
        if !self.features.is_empty() {
            let features: Vec<&str> = self.features.iter().map(|f| f.as_str()).collect();
            query.append_pair("features", &features.join(","));
        }

        let query = query.finish();
        let path = format!("/formrecognizer/documentModels/{}:analyze", self.model_id);
        if query.is_empty() {
            path
        } else {
            format!("{path}?{query}")
        }
    }
}

/// Builder for [`DocumentAnalysisRequest`].
#[derive(Debug, Default)]
pub struct DocumentAnalysisRequestBuilder {
    model_id: Option<String>,
    url_source: Option<String>,
    base64_source: Option<String>,
    pages: Option<String>,
    locale: Option<String>,
    features: Vec<DocumentAnalysisFeature>,
}

impl DocumentAnalysisRequestBuilder {
    /// Model to analyze with (required), e.g. [`PREBUILT_READ`].
    pub fn model_id(mut self, model_id: impl Into<String>) -> Self {
        self.model_id = Some(model_id.into());
        self
    }

    /// Publicly reachable document URL. Excludes [`base64_source`](Self::base64_source).
    pub fn url_source(mut self, url: impl Into<String>) -> Self {
        self.url_source = Some(url.into());
        self
    }

    /// Base64-encoded document bytes. Excludes [`url_source`](Self::url_source).
    pub fn base64_source(mut self, data: impl Into<String>) -> Self {
        self.base64_source = Some(data.into());
        self
    }

    /// 1-based page ranges, e.g. `1-3,5`.
    pub fn pages(mut self, pages: impl Into<String>) -> Self {
        self.pages = Some(pages.into());
        self
    }

    pub fn locale(mut self, locale: impl Into<String>) -> Self {
        self.locale = Some(locale.into());
        self
    }

    pub fn feature(mut self, feature: DocumentAnalysisFeature) -> Self {
        if !self.features.contains(&feature) {
            self.features.push(feature);
        }
        self
    }

    /// # Errors
    ///
    /// Returns [`ServiceError::Builder`] if `model_id` is missing or empty,
    /// or if not exactly one non-empty source is set.
    pub fn build(self) -> ServiceResult<DocumentAnalysisRequest> {
        let model_id = self
            .model_id
            .filter(|m| !m.is_empty())
            .ok_or_else(|| ServiceError::Builder("model_id is required".into()))?;

        let url_source = self.url_source.filter(|s| !s.is_empty());
        let base64_source = self.base64_source.filter(|s| !s.is_empty());

        let source = match (url_source, base64_source) {
            (Some(url), None) => DocumentSource::Url(url),
            (None, Some(data)) => DocumentSource::Base64(data),
            (None, None) => {
                return Err(ServiceError::Builder(
                    "source is required: set url_source or base64_source".into(),
                ))
            }
            (Some(_), Some(_)) => {
                return Err(ServiceError::Builder(
                    "only one source allowed: set url_source or base64_source, not both".into(),
                ))
            }
        };

        Ok(DocumentAnalysisRequest {
            model_id,
            source,
            pages: self.pages,
            locale: self.locale,
            features: self.features,
        })
    }
}

/// State of an analyze operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AnalyzeResultStatus {
    NotStarted,
    Running,
    Succeeded,
    Failed,
}

impl AnalyzeResultStatus {
    /// `true` for `succeeded` and `failed`.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }
}

impl std::fmt::Display for AnalyzeResultStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::NotStarted => "notStarted",
            Self::Running => "running",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AnalyzeOperationError {
    pub code: String,
    pub message: String,
}

/// Body of the `Operation-Location` resource.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzeOperationResult {
    pub status: AnalyzeResultStatus,
    #[serde(default)]
    pub created_date_time: Option<String>,
    #[serde(default)]
    pub last_updated_date_time: Option<String>,
    /// Set when `status` is `failed`.
    #[serde(default)]
    pub error: Option<AnalyzeOperationError>,
    /// Set when `status` is `succeeded`.
    #[serde(default)]
    pub analyze_result: Option<AnalyzeResult>,
}

/// Everything extracted from a document.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzeResult {
    pub api_version: String,
    pub model_id: String,
    /// Concatenated text of the whole document.
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub pages: Vec<DocumentPage>,
    #[serde(default)]
    pub paragraphs: Vec<DocumentParagraph>,
    #[serde(default)]
    pub tables: Vec<DocumentTable>,
    #[serde(default)]
    pub key_value_pairs: Vec<DocumentKeyValuePair>,
    #[serde(default)]
    pub documents: Vec<AnalyzedDocument>,
}

impl AnalyzeResult {
    /// Text of every paragraph, in reading order.
    pub fn paragraph_texts(&self) -> impl Iterator<Item = &str> {
        self.paragraphs.iter().map(|p| p.content.as_str())
    }
}

/// A contiguous range of [`AnalyzeResult::content`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct DocumentSpan {
    pub offset: usize,
    pub length: usize,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentPage {
    /// 1-based.
    pub page_number: u32,
    #[serde(default)]
    pub angle: Option<f64>,
    #[serde(default)]
    pub width: Option<f64>,
    #[serde(default)]
    pub height: Option<f64>,
    /// `inch` or `pixel`.
    #[serde(default)]
    pub unit: Option<String>,
    #[serde(default)]
    pub words: Vec<DocumentWord>,
    #[serde(default)]
    pub lines: Vec<DocumentLine>,
    #[serde(default)]
    pub spans: Vec<DocumentSpan>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DocumentWord {
    pub content: String,
    /// 0.0 to 1.0.
    pub confidence: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DocumentLine {
    pub content: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DocumentParagraph {
    /// Semantic role such as `title`, `sectionHeading` or `pageHeader`;
    /// absent for body text.
    #[serde(default)]
    pub role: Option<String>,
    pub content: String,
    #[serde(default)]
    pub spans: Vec<DocumentSpan>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentTable {
    pub row_count: u32,
    pub column_count: u32,
    pub cells: Vec<DocumentTableCell>,
}

impl DocumentTable {
    /// Cell at a 0-based position.
    pub fn cell(&self, row: u32, column: u32) -> Option<&DocumentTableCell> {
        self.cells
            .iter()
            .find(|cell| cell.row_index == row && cell.column_index == column)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentTableCell {
    /// `columnHeader`, `rowHeader` and so on; absent for content cells.
    #[serde(default)]
    pub kind: Option<String>,
    pub row_index: u32,
    pub column_index: u32,
    #[serde(default)]
    pub content: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DocumentKeyValuePair {
    pub key: DocumentKeyValueElement,
    #[serde(default)]
    pub value: Option<DocumentKeyValueElement>,
    pub confidence: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DocumentKeyValueElement {
    pub content: String,
}

/// A typed document found by a prebuilt or custom model.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzedDocument {
    /// e.g. `invoice` or `idDocument.passport`.
    pub doc_type: String,
    /// Field schema depends on the document type.
    #[serde(default)]
    pub fields: serde_json::Map<String, serde_json::Value>,
    #[serde(default)]
    pub confidence: Option<f64>,
}

/// Handle on a submitted analysis.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalyzeOperation {
    /// Absolute URL to poll for the result.
    pub operation_location: String,
}
