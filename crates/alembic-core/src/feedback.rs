//! Feedback processor: request log, feedback log and weighting folds.

use crate::context::EngineContext;
use crate::error::{Error, Result, REQUIRED_FEEDBACK_FIELDS};
use crate::patterns::FoldOutcome;
use crate::record::{value_text, Analysis, ErrorRecord, Suggestion};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, instrument};

/// Which suggestion the user applied
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SuggestionRef {
    /// Rank in the logged response
    Rank(usize),
    /// Candidate value
    Value(String),
}

/// One feedback submission
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedbackRecord {
    /// Id of the analysis the feedback is about
    pub error_id: String,
    /// Applied suggestion
    pub suggestion_used: SuggestionRef,
    /// Whether it fixed the error
    pub was_helpful: bool,
    /// Submission time
    pub timestamp: DateTime<Utc>,
}

impl FeedbackRecord {
    /// Create a record stamped now
    pub fn new(error_id: impl Into<String>, suggestion_used: SuggestionRef, was_helpful: bool) -> Self {
        Self {
            error_id: error_id.into(),
            suggestion_used,
            was_helpful,
            timestamp: Utc::now(),
        }
    }

    /// Parse a raw submission, reporting every missing field
    pub fn from_value(value: &Value) -> Result<Self> {
        let Value::Object(body) = value else {
            return Err(Error::Validation(
                "feedback must be a JSON object".to_string(),
            ));
        };

        let missing: Vec<String> = REQUIRED_FEEDBACK_FIELDS
            .iter()
            .filter(|field| body.get(**field).map_or(true, Value::is_null))
            .map(|field| (*field).to_string())
            .collect();
        if !missing.is_empty() {
            return Err(Error::missing_fields(&REQUIRED_FEEDBACK_FIELDS, missing));
        }

        let error_id = value_text(&body["error_id"]);
        let suggestion_used = match &body["suggestion_used"] {
            Value::Number(n) => match n.as_u64() {
                Some(rank) => SuggestionRef::Rank(rank as usize),
                None => SuggestionRef::Value(n.to_string()),
            },
            Value::String(s) => SuggestionRef::Value(s.clone()),
            other => SuggestionRef::Value(other.to_string()),
        };
        let was_helpful = match &body["was_helpful"] {
            Value::Bool(b) => *b,
            Value::String(s) if s.eq_ignore_ascii_case("true") => true,
            Value::String(s) if s.eq_ignore_ascii_case("false") => false,
            other => {
                return Err(Error::Validation(format!(
                    "was_helpful must be a boolean, got {other}"
                )))
            }
        };
        let timestamp = body
            .get("timestamp")
            .and_then(Value::as_str)
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map_or_else(Utc::now, |t| t.with_timezone(&Utc));

        Ok(Self {
            error_id,
            suggestion_used,
            was_helpful,
            timestamp,
        })
    }
}

/// A resolved request as kept in the request log
#[derive(Debug, Clone, Serialize)]
pub struct RequestLogEntry {
    /// Original record
    pub record: ErrorRecord,
    /// Analysis returned
    pub analysis: Analysis,
    /// Suggestions returned, in rank order
    pub suggestions: Vec<Suggestion>,
    /// When it was logged
    pub logged_at: DateTime<Utc>,
}

/// Result of processing one feedback submission
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeedbackOutcome {
    /// False when an identical submission was already recorded
    pub recorded: bool,
    /// Candidate value the feedback resolved to
    pub candidate_value: String,
    /// Weighting fold triggered by this submission, if any
    pub fold: Option<FoldOutcome>,
}

/// Request log bounded by `capacity`, evicting in insertion order
#[derive(Debug, Default)]
struct RequestLog {
    entries: HashMap<String, RequestLogEntry>,
    order: VecDeque<String>,
}

impl RequestLog {
    fn insert(&mut self, error_id: String, entry: RequestLogEntry, capacity: usize) {
        if self.entries.insert(error_id.clone(), entry).is_none() {
            self.order.push_back(error_id);
        }
        while self.entries.len() > capacity.max(1) {
            let Some(oldest) = self.order.pop_front() else { break };
            self.entries.remove(&oldest);
            debug!(error_id = %oldest, "Evicted request from log");
        }
    }
}

#[derive(Debug, Default)]
struct FeedbackLog {
    records: Vec<FeedbackRecord>,
    seen: HashSet<(String, String, bool)>,
}

/// Owns the request and feedback logs
#[derive(Debug)]
pub struct FeedbackProcessor {
    context: Arc<EngineContext>,
    requests: RwLock<RequestLog>,
    feedback: Mutex<FeedbackLog>,
}

impl FeedbackProcessor {
    /// Create a processor with empty logs
    pub fn new(context: Arc<EngineContext>) -> Self {
        Self {
            context,
            requests: RwLock::new(RequestLog::default()),
            feedback: Mutex::new(FeedbackLog::default()),
        }
    }

    /// Remember a resolved request so feedback can refer to it. Past
    /// `request_log_capacity` the oldest request is dropped and feedback
    /// for it is `NotFound`.
    pub async fn log_request(
        &self,
        record: ErrorRecord,
        analysis: Analysis,
        suggestions: Vec<Suggestion>,
    ) {
        let error_id = analysis.error_id.clone();
        let capacity = self.context.config.request_log_capacity;
        self.requests.write().await.insert(
            error_id.clone(),
            RequestLogEntry {
                record,
                analysis,
                suggestions,
                logged_at: Utc::now(),
            },
            capacity,
        );
        debug!(error_id = %error_id, "Logged request");
    }

    /// Logged request for an error id
    pub async fn request(&self, error_id: &str) -> Option<RequestLogEntry> {
        self.requests.read().await.entries.get(error_id).cloned()
    }

    /// Requests logged so far
    pub async fn request_count(&self) -> usize {
        self.requests.read().await.entries.len()
    }

    /// Feedback records appended so far
    pub async fn feedback_count(&self) -> usize {
        self.feedback.lock().await.records.len()
    }

    /// Record feedback and fold it into the pattern store once the
    /// `(kind, field)` pair has enough events.
    #[instrument(skip(self, feedback), fields(error_id = %feedback.error_id))]
    pub async fn process_feedback(&self, feedback: FeedbackRecord) -> Result<FeedbackOutcome> {
        let (analysis, candidate_value) = {
            let requests = self.requests.read().await;
            let entry = requests.entries.get(&feedback.error_id).ok_or_else(|| {
                Error::NotFound(format!("no request logged for error id {}", feedback.error_id))
            })?;
            let candidate = match &feedback.suggestion_used {
                SuggestionRef::Value(value) => value.clone(),
                SuggestionRef::Rank(rank) => entry
                    .suggestions
                    .get(*rank)
                    .map(|s| s.candidate_value.clone())
                    .ok_or_else(|| {
                        Error::Validation(format!(
                            "suggestion rank {rank} out of range ({} suggestions)",
                            entry.suggestions.len()
                        ))
                    })?,
            };
            (entry.analysis.clone(), candidate)
        };

        {
            let mut log = self.feedback.lock().await;
            let key = (
                feedback.error_id.clone(),
                candidate_value.clone(),
                feedback.was_helpful,
            );
            if !log.seen.insert(key) {
                debug!("Duplicate feedback ignored");
                return Ok(FeedbackOutcome {
                    recorded: false,
                    candidate_value,
                    fold: None,
                });
            }
            log.records.push(feedback.clone());
        }

        let store = &self.context.store;
        let kind = analysis.error_kind;
        let field = analysis.affected_field.as_str();
        store
            .record_outcome(kind, field, &candidate_value, feedback.was_helpful)
            .await;

        let events = store.feedback_count(kind, field).await;
        let fold = if events >= self.context.config.materiality_threshold {
            Some(store.fold_feedback(kind, field).await)
        } else {
            None
        };

        info!(
            kind = %kind,
            field,
            candidate = %candidate_value,
            helpful = feedback.was_helpful,
            events,
            "Feedback recorded"
        );
        Ok(FeedbackOutcome {
            recorded: true,
            candidate_value,
            fold,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::ErrorAnalyzer;
    use crate::context::EngineConfig;
    use crate::patterns::PatternSource;
    use crate::record::ErrorKind;
    use crate::suggestion::SuggestionEngine;
    use serde_json::json;

    struct Fixture {
        context: Arc<EngineContext>,
        processor: FeedbackProcessor,
    }

    impl Fixture {
        fn new() -> Self {
            Self::with_config(EngineConfig::default())
        }

        fn with_config(config: EngineConfig) -> Self {
            let context = Arc::new(EngineContext::with_defaults(config));
            Self {
                processor: FeedbackProcessor::new(context.clone()),
                context,
            }
        }

        async fn resolve(&self, record: ErrorRecord) -> String {
            let analysis = ErrorAnalyzer::new(self.context.clone())
                .analyze(&record)
                .await;
            let suggestions = SuggestionEngine::new(self.context.clone())
                .generate(&analysis)
                .await;
            let id = analysis.error_id.clone();
            self.processor.log_request(record, analysis, suggestions).await;
            id
        }
    }

    fn priority_record() -> ErrorRecord {
        ErrorRecord::new("out_of_range", vec!["PriorityLevel".into()], "9")
    }

    #[test]
    fn test_from_value_reports_missing_fields() {
        let err = FeedbackRecord::from_value(&json!({"error_id": "err_1"})).unwrap_err();
        match err {
            Error::MissingFields { missing, .. } => {
                assert_eq!(missing, vec!["suggestion_used", "was_helpful"]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_from_value_reads_rank_and_value() {
        let rank = FeedbackRecord::from_value(&json!({
            "error_id": "err_1", "suggestion_used": 2, "was_helpful": true
        }))
        .unwrap();
        assert_eq!(rank.suggestion_used, SuggestionRef::Rank(2));

        let value = FeedbackRecord::from_value(&json!({
            "error_id": "err_1", "suggestion_used": "5", "was_helpful": "false"
        }))
        .unwrap();
        assert_eq!(value.suggestion_used, SuggestionRef::Value("5".into()));
        assert!(!value.was_helpful);

        assert!(matches!(
            FeedbackRecord::from_value(&json!({
                "error_id": "err_1", "suggestion_used": "5", "was_helpful": "maybe"
            })),
            Err(Error::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_unknown_error_id_is_not_found() {
        let fixture = Fixture::new();
        let result = fixture
            .processor
            .process_feedback(FeedbackRecord::new(
                "err_missing",
                SuggestionRef::Value("5".into()),
                true,
            ))
            .await;
        assert!(matches!(result, Err(Error::NotFound(_))));
        assert_eq!(fixture.processor.feedback_count().await, 0);
    }

    #[tokio::test]
    async fn test_request_log_evicts_oldest_past_capacity() {
        let fixture = Fixture::with_config(EngineConfig {
            request_log_capacity: 2,
            ..EngineConfig::default()
        });
        let oldest = fixture.resolve(priority_record()).await;
        let middle = fixture.resolve(priority_record()).await;
        let newest = fixture.resolve(priority_record()).await;

        assert_eq!(fixture.processor.request_count().await, 2);
        assert!(fixture.processor.request(&oldest).await.is_none());
        assert!(fixture.processor.request(&middle).await.is_some());
        assert!(fixture.processor.request(&newest).await.is_some());

        let result = fixture
            .processor
            .process_feedback(FeedbackRecord::new(&oldest, SuggestionRef::Rank(0), true))
            .await;
        assert!(matches!(result, Err(Error::NotFound(_))));
    }

    #[tokio::test]
    async fn test_duplicate_feedback_is_idempotent() {
        let fixture = Fixture::new();
        let id = fixture.resolve(priority_record()).await;

        let first = fixture
            .processor
            .process_feedback(FeedbackRecord::new(&id, SuggestionRef::Rank(0), true))
            .await
            .unwrap();
        assert!(first.recorded);
        assert_eq!(first.candidate_value, "5");

        // Same suggestion referenced by value.
        let second = fixture
            .processor
            .process_feedback(FeedbackRecord::new(&id, SuggestionRef::Value("5".into()), true))
            .await
            .unwrap();
        assert!(!second.recorded);

        assert_eq!(fixture.processor.feedback_count().await, 1);
        assert_eq!(
            fixture
                .context
                .store
                .feedback_count(ErrorKind::OutOfRange, "PriorityLevel")
                .await,
            1
        );
    }

    #[tokio::test]
    async fn test_rank_out_of_range_is_rejected() {
        let fixture = Fixture::new();
        let id = fixture.resolve(priority_record()).await;
        let result = fixture
            .processor
            .process_feedback(FeedbackRecord::new(&id, SuggestionRef::Rank(42), true))
            .await;
        assert!(matches!(result, Err(Error::Validation(_))));
    }

    #[tokio::test]
    async fn test_fold_after_materiality_threshold() {
        let fixture = Fixture::new();
        let mut last = None;
        for i in 0..5 {
            let id = fixture.resolve(priority_record()).await;
            let outcome = fixture
                .processor
                .process_feedback(FeedbackRecord::new(&id, SuggestionRef::Value("3".into()), true))
                .await
                .unwrap();
            if i < 4 {
                assert_eq!(outcome.fold, None);
            }
            last = Some(outcome);
        }

        assert_eq!(
            last.unwrap().fold,
            Some(FoldOutcome::Applied { candidates: 5 })
        );
        let entry = fixture
            .context
            .store
            .lookup(ErrorKind::OutOfRange, "PriorityLevel")
            .await
            .unwrap();
        assert_eq!(entry.source, PatternSource::Feedback);
        assert_eq!(entry.candidates()[0], "3");
    }

    #[tokio::test]
    async fn test_fold_never_replaces_administrative_entry() {
        let fixture = Fixture::new();
        fixture
            .context
            .store
            .update(&json!({"out_of_range": {"PriorityLevel": ["1", "2", "3", "4", "5"]}}))
            .await
            .unwrap();

        let mut fold = None;
        for _ in 0..5 {
            let id = fixture.resolve(priority_record()).await;
            fold = fixture
                .processor
                .process_feedback(FeedbackRecord::new(&id, SuggestionRef::Value("5".into()), true))
                .await
                .unwrap()
                .fold;
        }

        assert_eq!(
            fold,
            Some(FoldOutcome::Rejected {
                existing: PatternSource::Administrative
            })
        );
        let entry = fixture
            .context
            .store
            .lookup(ErrorKind::OutOfRange, "PriorityLevel")
            .await
            .unwrap();
        assert_eq!(entry.source, PatternSource::Administrative);
    }
}
