//! Alembic Core - Validation Error Resolution Engine
//!
//! This crate diagnoses validation errors reported by a tabular data-cleaning
//! front-end and proposes concrete fixes:
//! - Patterns: known fixes per error kind and field, with feedback statistics
//! - Classifier: rule-based and trained-model classification strategies
//! - Analyzer: turns a raw error record into a structured analysis
//! - Suggestion: ranked candidate fixes, guidance and progressive delivery
//! - Feedback: request/feedback logs and weighting of the pattern store
//! - Resolver: the facade used by the HTTP and WebSocket transports

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod analyzer;
pub mod classifier;
pub mod context;
pub mod error;
pub mod feedback;
pub mod patterns;
pub mod record;
pub mod resolver;
pub mod suggestion;

pub use analyzer::ErrorAnalyzer;
pub use classifier::{
    select_strategy, Classification, ErrorClassifier, ModelArtifact, Observation,
    RuleBasedClassifier, TrainedModelClassifier,
};
pub use context::{EngineConfig, EngineContext, ModelPaths};
pub use error::{Error, Result, REQUIRED_FEEDBACK_FIELDS, REQUIRED_RECORD_FIELDS};
pub use feedback::{FeedbackOutcome, FeedbackProcessor, FeedbackRecord, SuggestionRef};
pub use patterns::{
    FoldOutcome, KindStatistics, PatternEntry, PatternSource, PatternStore, UpdateReport,
};
pub use record::{
    Analysis, ClassifiedBy, ErrorKind, ErrorRecord, FieldType, Suggestion, SuggestionSource,
};
pub use resolver::{BatchItem, BatchResolution, Resolution, ValidationResolver};
pub use suggestion::{ProgressiveSuggestions, RecordHints, SuggestionEngine, SuggestionUpdate};
