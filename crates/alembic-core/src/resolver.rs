//! Resolver facade: analysis, suggestions and request logging in one call.

use crate::analyzer::ErrorAnalyzer;
use crate::context::EngineContext;
use crate::error::{Error, Result};
use crate::feedback::{FeedbackOutcome, FeedbackProcessor, FeedbackRecord};
use crate::patterns::{KindStatistics, UpdateReport};
use crate::record::{Analysis, ErrorKind, ErrorRecord, Suggestion};
use crate::suggestion::{ProgressiveSuggestions, RecordHints, SuggestionEngine};
use futures::future::join_all;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;
use tokio::task::JoinError;
use tracing::{error, info, instrument};

/// Guidance attached to a batch item that could not be resolved
pub const FAILED_ITEM_GUIDANCE: &str =
    "This error could not be processed. Check that the record is well formed and retry.";

/// Response for one resolved error
#[derive(Debug, Clone, Serialize)]
pub struct Resolution {
    /// Id to reference in feedback
    pub error_id: String,
    /// Structured analysis
    pub analysis: Analysis,
    /// Ranked suggestions
    pub suggestions: Vec<Suggestion>,
    /// Human-readable guidance
    pub guidance: String,
    /// Classification confidence
    pub confidence: f64,
    /// Seconds spent resolving
    pub processing_time: f64,
}

/// One entry of a batch response
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum BatchItem {
    /// Resolved normally
    Resolved(Resolution),
    /// Failed; the rest of the batch is unaffected
    Failed {
        /// `error_<index>`
        error_id: String,
        /// The item as submitted
        original_error: Value,
        /// What went wrong
        error: String,
        /// Always empty
        suggestions: Vec<Suggestion>,
        /// Fixed guidance text
        guidance: String,
    },
}

impl BatchItem {
    fn failed(index: usize, original_error: Value, error: String) -> Self {
        Self::Failed {
            error_id: format!("error_{index}"),
            original_error,
            error,
            suggestions: Vec::new(),
            guidance: FAILED_ITEM_GUIDANCE.to_string(),
        }
    }

    /// Entry for a finished item task; a failed task becomes
    /// [`Error::Internal`].
    fn settle(index: usize, item: Value, outcome: std::result::Result<Result<Resolution>, JoinError>) -> Self {
        let outcome = outcome.unwrap_or_else(|join_error| {
            error!(index, error = %join_error, "Batch item task failed");
            Err(Error::Internal(format!("item {index} could not be resolved")))
        });
        match outcome {
            Ok(resolution) => Self::Resolved(resolution),
            Err(e) => Self::failed(index, item, e.to_string()),
        }
    }

    /// Whether the item failed
    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }
}

/// Batch response
#[derive(Debug, Clone, Serialize)]
pub struct BatchResolution {
    /// One entry per submitted item, in order
    pub results: Vec<BatchItem>,
    /// Items processed
    pub total_processed: usize,
    /// Seconds spent on the batch
    pub processing_time: f64,
}

/// Entry point used by every transport
#[derive(Debug, Clone)]
pub struct ValidationResolver {
    context: Arc<EngineContext>,
    analyzer: ErrorAnalyzer,
    suggestions: SuggestionEngine,
    feedback: Arc<FeedbackProcessor>,
}

impl ValidationResolver {
    /// Wire the components over one context
    pub fn new(context: Arc<EngineContext>) -> Self {
        Self {
            analyzer: ErrorAnalyzer::new(context.clone()),
            suggestions: SuggestionEngine::new(context.clone()),
            feedback: Arc::new(FeedbackProcessor::new(context.clone())),
            context,
        }
    }

    /// Shared engine context
    pub fn context(&self) -> &Arc<EngineContext> {
        &self.context
    }

    /// Feedback processor
    pub fn feedback(&self) -> &Arc<FeedbackProcessor> {
        &self.feedback
    }

    /// Resolve one record and log it for later feedback
    #[instrument(skip_all, fields(error_type = %record.error_type))]
    pub async fn resolve(&self, record: ErrorRecord) -> Resolution {
        let started = Instant::now();
        let analysis = self.analyzer.analyze(&record).await;
        let suggestions = self
            .suggestions
            .generate_with_hints(&analysis, &RecordHints::from_record(&record))
            .await;
        let guidance = self.suggestions.guidance(&analysis, &suggestions);

        let resolution = Resolution {
            error_id: analysis.error_id.clone(),
            confidence: analysis.confidence,
            analysis,
            suggestions,
            guidance,
            processing_time: started.elapsed().as_secs_f64(),
        };

        self.feedback
            .log_request(
                record,
                resolution.analysis.clone(),
                resolution.suggestions.clone(),
            )
            .await;
        resolution
    }

    /// Resolve a batch of raw records.
    ///
    /// Every item runs in its own task; a malformed item or a panic becomes
    /// that item's error entry.
    #[instrument(skip_all, fields(count = items.len()))]
    pub async fn resolve_batch(&self, items: Vec<Value>) -> BatchResolution {
        let started = Instant::now();

        let handles = items.iter().cloned().map(|item| {
            let resolver = self.clone();
            tokio::spawn(async move {
                let record = ErrorRecord::from_value(item)?;
                Ok::<_, Error>(resolver.resolve(record).await)
            })
        });
        let outcomes = join_all(handles).await;

        let results: Vec<BatchItem> = outcomes
            .into_iter()
            .zip(items)
            .enumerate()
            .map(|(index, (outcome, item))| BatchItem::settle(index, item, outcome))
            .collect();

        let failed = results.iter().filter(|r| r.is_failed()).count();
        info!(total = results.len(), failed, "Batch resolved");
        BatchResolution {
            total_processed: results.len(),
            results,
            processing_time: started.elapsed().as_secs_f64(),
        }
    }

    /// Analyze a record and return its suggestions as a finite stream
    pub async fn progressive(&self, record: &ErrorRecord) -> ProgressiveSuggestions {
        let stream = self.suggestions.progressive_generate(record).await;
        self.feedback
            .log_request(
                record.clone(),
                stream.analysis().clone(),
                stream.remaining(),
            )
            .await;
        stream
    }

    /// Record a feedback submission
    pub async fn submit_feedback(&self, feedback: FeedbackRecord) -> Result<FeedbackOutcome> {
        self.feedback.process_feedback(feedback).await
    }

    /// Pattern statistics per kind
    pub async fn statistics(&self) -> BTreeMap<ErrorKind, KindStatistics> {
        self.context.store.statistics().await
    }

    /// Merge an administrative pattern document
    pub async fn update_patterns(&self, document: &Value) -> Result<UpdateReport> {
        self.context.store.update(document).await
    }
}
