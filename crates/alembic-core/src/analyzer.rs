//! Error analyzer: normalize, classify, describe.

use crate::classifier::{Classification, ErrorClassifier, Observation, RuleBasedClassifier};
use crate::context::EngineContext;
use crate::record::{value_text, Analysis, ClassifiedBy, ErrorKind, ErrorRecord};
use chrono::{DateTime, Utc};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, instrument};

/// Ceiling for the confidence of an `unknown` analysis
pub const UNKNOWN_CONFIDENCE_CAP: f64 = 0.3;

static SEQUENCE: AtomicU64 = AtomicU64::new(0);

/// Produces an [`Analysis`] for each error record
#[derive(Debug, Clone)]
pub struct ErrorAnalyzer {
    context: Arc<EngineContext>,
    rules: RuleBasedClassifier,
}

impl ErrorAnalyzer {
    /// Create an analyzer over the shared context
    pub fn new(context: Arc<EngineContext>) -> Self {
        Self {
            context,
            rules: RuleBasedClassifier::new(),
        }
    }

    /// Analyze one record. Never fails: anything unrecognized becomes
    /// `unknown` with low confidence.
    #[instrument(skip(self, record), fields(error_type = %record.error_type))]
    pub async fn analyze(&self, record: &ErrorRecord) -> Analysis {
        let analyzed_at = Utc::now();
        let observation = self.observe(record).await;
        let (classification, classified_by) = self.classify(&observation);

        let expected_shape = self
            .expected_shape(classification.kind, &observation)
            .await;

        let analysis = Analysis {
            error_id: generate_error_id(record, analyzed_at),
            error_kind: classification.kind,
            affected_field: observation.field,
            offending_value: observation.value,
            expected_shape,
            confidence: classification.confidence,
            classified_by,
            analyzed_at,
        };
        debug!(
            error_id = %analysis.error_id,
            kind = %analysis.error_kind,
            confidence = analysis.confidence,
            "Analyzed error"
        );
        analysis
    }

    async fn observe(&self, record: &ErrorRecord) -> Observation {
        let store = &self.context.store;
        let field = record
            .affected_columns
            .iter()
            .map(|c| c.trim())
            .find(|c| !c.is_empty())
            .unwrap_or_default()
            .to_string();

        let value = match &record.current_value {
            Value::String(s) => Value::String(s.trim().to_string()),
            other => other.clone(),
        };

        let range = match record.allowed_range() {
            Some(range) => Some(range),
            None => store
                .lookup(ErrorKind::OutOfRange, &field)
                .await
                .and_then(|entry| entry.numeric_bounds()),
        };

        Observation {
            error_type: record.error_type.clone(),
            hint: record.error_type.parse().ok(),
            text: value_text(&value).trim().to_string(),
            value,
            field_type: record.field_type(),
            known_ids: record.known_ids(),
            range,
            field_patterns: store.field_kinds(&field).await,
            field,
        }
    }

    fn classify(&self, observation: &Observation) -> (Classification, ClassifiedBy) {
        let threshold = self.context.config.confidence_threshold;
        let primary = &self.context.classifier;

        let mut result = primary.classify(observation);
        let mut by = primary.strategy();
        if by != ClassifiedBy::RuleBased && result.confidence < threshold {
            debug!(
                confidence = result.confidence,
                "Classifier below threshold, applying rules"
            );
            result = self.rules.classify(observation);
            by = ClassifiedBy::RuleBased;
        }

        if result.kind == ErrorKind::Unknown || result.confidence < threshold {
            let confidence = result.confidence.min(UNKNOWN_CONFIDENCE_CAP);
            return (Classification::unknown(confidence), ClassifiedBy::Fallback);
        }
        (result, by)
    }

    async fn expected_shape(&self, kind: ErrorKind, observation: &Observation) -> String {
        if kind != ErrorKind::Unknown {
            if let Some(entry) = self.context.store.lookup(kind, &observation.field).await {
                return entry.expected_shape();
            }
        }
        match (kind, observation.range) {
            (ErrorKind::OutOfRange, Some((min, max))) => format!("number between {min} and {max}"),
            (ErrorKind::OutOfRange, None) => "number within the allowed range".to_string(),
            (ErrorKind::MalformedList, _) => {
                "well-formed list, e.g. [1,2,3] or a,b,c".to_string()
            }
            (ErrorKind::BrokenStructuredField, _) => "well-formed JSON object".to_string(),
            (ErrorKind::DuplicateIdentifier, _) => {
                "identifier not already in use".to_string()
            }
            (ErrorKind::Unknown, _) => "a value accepted by the column's validation rules".to_string(),
        }
    }
}

/// `err_<yyyymmddHHMMSS>_<12 hex digits>`, unique per process
pub fn generate_error_id(record: &ErrorRecord, at: DateTime<Utc>) -> String {
    let sequence = SEQUENCE.fetch_add(1, Ordering::Relaxed);
    let mut hasher = Sha256::new();
    hasher.update(at.timestamp_nanos_opt().unwrap_or_default().to_le_bytes());
    hasher.update(sequence.to_le_bytes());
    hasher.update(serde_json::to_vec(record).unwrap_or_default());
    let digest = hasher.finalize();
    let hex: String = digest.iter().take(6).map(|b| format!("{b:02x}")).collect();
    format!("err_{}_{hex}", at.format("%Y%m%d%H%M%S"))
}
