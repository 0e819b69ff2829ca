//! Recognition result reading and parsing.
//!
//! Invoice analysis results are produced ahead of time and stored next to
//! the asset as `<asset name>.invoice.json`. This module resolves that file
//! through the storage provider, parses the JSON, and exposes the handful of
//! fields the review page consumes.

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::AnalysisError;
use crate::storage::StorageProvider;

/// Suffix appended to the asset file name to locate its analysis result.
pub const ANALYSIS_FILE_SUFFIX: &str = ".invoice.json";

/// Status value signalling that an asynchronous analysis job finished.
const STATUS_SUCCEEDED: &str = "succeeded";

/// Top-level analysis result document
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisEnvelope {
    pub status: Option<String>,
    pub analyze_result: Option<AnalyzeResult>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzeResult {
    /// Per-page recognizer output; index *n* describes page *n + 1* and
    /// carries the coordinate bounds used for bounding-box mapping.
    #[serde(default)]
    pub read_results: Vec<ReadResult>,

    #[serde(default)]
    pub document_results: Vec<DocumentResult>,
}

/// Per-page recognizer dimensions, the source coordinate space for
/// bounding-box mapping. Other readResult content is not consumed here.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadResult {
    pub width: f64,
    pub height: f64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentResult {
    pub model_id: Option<String>,
    pub doc_type: Option<String>,
    pub doc_type_confidence: Option<f64>,
    /// Extracted fields, keyed by field name. A BTreeMap keeps overlay and
    /// prediction ordering deterministic.
    #[serde(default)]
    pub fields: BTreeMap<String, FieldPrediction>,
}

/// One extracted field
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldPrediction {
    pub text: Option<String>,
    pub page: Option<u32>,
    /// Flat x/y coordinate pairs in the recognizer's page coordinate space.
    pub bounding_box: Option<Vec<f64>>,
    pub confidence: Option<f64>,
}

/// Model identification, surfaced alongside predictions
#[derive(Debug, Clone, Serialize)]
pub struct ModelInfo {
    pub model_id: Option<String>,
    pub doc_type: Option<String>,
    pub doc_type_confidence: Option<f64>,
}

impl AnalysisEnvelope {
    /// Extracted fields of the first document result, if any.
    pub fn fields(&self) -> Option<&BTreeMap<String, FieldPrediction>> {
        self.analyze_result
            .as_ref()?
            .document_results
            .first()
            .map(|doc| &doc.fields)
    }

    /// Case-insensitive field lookup.
    pub fn field(&self, field_name: &str) -> Option<&FieldPrediction> {
        self.fields()?
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(field_name))
            .map(|(_, prediction)| prediction)
    }

    pub fn model_info(&self) -> Option<ModelInfo> {
        let doc = self.analyze_result.as_ref()?.document_results.first()?;
        Some(ModelInfo {
            model_id: doc.model_id.clone(),
            doc_type: doc.doc_type.clone(),
            doc_type_confidence: doc.doc_type_confidence,
        })
    }

    /// Recognizer page dimensions for a page, indexed positionally into
    /// `readResults` (page 1 is the first entry).
    pub fn read_result_for_page(&self, page: u32) -> Option<&ReadResult> {
        if page < 1 {
            return None;
        }
        self.analyze_result
            .as_ref()?
            .read_results
            .get((page - 1) as usize)
    }

    fn has_succeeded_status(&self) -> bool {
        self.status
            .as_deref()
            .is_some_and(|s| s.eq_ignore_ascii_case(STATUS_SUCCEEDED))
    }
}

/// Reads previously computed analysis results from storage
#[derive(Clone)]
pub struct AnalysisReader {
    storage: Arc<dyn StorageProvider>,
}

impl AnalysisReader {
    pub fn new(storage: Arc<dyn StorageProvider>) -> Self {
        Self { storage }
    }

    /// Resolve and parse the analysis result for an asset.
    ///
    /// `Ok(None)` means the result has not been produced yet, which callers
    /// must treat as a valid outcome. A present but unparseable result is an
    /// error.
    pub async fn get_recognized_text(
        &self,
        file_path: &str,
        file_name: &str,
    ) -> Result<Option<AnalysisEnvelope>, AnalysisError> {
        let raw_name = format!("{file_name}{ANALYSIS_FILE_SUFFIX}");
        let result_name = urlencoding::decode(&raw_name)
            .map(|decoded| decoded.into_owned())
            .unwrap_or(raw_name);

        debug!(path = file_path, result = %result_name, "Reading analysis result");

        let Some(json) = self.storage.read_text(&result_name, true).await? else {
            debug!(result = %result_name, "No analysis result produced yet");
            return Ok(None);
        };

        let envelope =
            serde_json::from_str(&json).map_err(|source| AnalysisError::Malformed {
                name: result_name,
                source,
            })?;
        Ok(Some(envelope))
    }
}

/// Polling options for asynchronous analysis jobs
#[derive(Debug, Clone, Copy)]
pub struct PollOptions {
    pub interval: Duration,
    pub timeout: Duration,
}

impl Default for PollOptions {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(100),
            timeout: Duration::from_millis(10_000),
        }
    }
}

/// Repeatedly invoke `producer` until the returned envelope's status reads
/// "succeeded" (case-insensitive) or the timeout elapses.
pub async fn poll_until_succeeded<F, Fut>(
    mut producer: F,
    options: PollOptions,
) -> Result<AnalysisEnvelope, AnalysisError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<AnalysisEnvelope, AnalysisError>>,
{
    let deadline = tokio::time::Instant::now() + options.timeout;

    loop {
        let envelope = producer().await?;
        if envelope.has_succeeded_status() {
            return Ok(envelope);
        }
        if tokio::time::Instant::now() >= deadline {
            return Err(AnalysisError::Timeout);
        }
        tokio::time::sleep(options.interval).await;
    }
}
