//! Classification strategies.
//!
//! An [`ErrorClassifier`] maps an [`Observation`] (a normalized error
//! record plus what the pattern store knows about its field) to an
//! [`ErrorKind`] with a confidence. The strategy is chosen once at startup:
//! a [`TrainedModelClassifier`] when an artifact is available, otherwise
//! the [`RuleBasedClassifier`], which needs no model at all.

use crate::record::{ClassifiedBy, ErrorKind, FieldType};
use serde::Serialize;
use serde_json::Value;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

/// Classifier backed by a token-weight artifact.
pub mod model;
/// Deterministic rules.
pub mod rules;
/// Value shape checks shared by rules and repairs.
pub mod shape;

pub use model::{ModelArtifact, TrainedModelClassifier};
pub use rules::RuleBasedClassifier;

/// Result of a classification
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Classification {
    /// Chosen kind
    pub kind: ErrorKind,
    /// Confidence (0.0 - 1.0)
    pub confidence: f64,
}

impl Classification {
    /// Build a classification, clamping the confidence into [0, 1]
    pub fn new(kind: ErrorKind, confidence: f64) -> Self {
        let confidence = if confidence.is_finite() {
            confidence.clamp(0.0, 1.0)
        } else {
            0.0
        };
        Self { kind, confidence }
    }

    /// No classification
    pub fn unknown(confidence: f64) -> Self {
        Self::new(ErrorKind::Unknown, confidence)
    }
}

/// A normalized error record, as seen by classifiers
#[derive(Debug, Clone, Default)]
pub struct Observation {
    /// Caller-supplied error type label
    pub error_type: String,
    /// Kind named by the error type label, if it parses
    pub hint: Option<ErrorKind>,
    /// Primary affected field (empty when none was given)
    pub field: String,
    /// Offending value
    pub value: Value,
    /// Offending value as trimmed text
    pub text: String,
    /// Declared field type
    pub field_type: Option<FieldType>,
    /// Identifiers already in use
    pub known_ids: Vec<String>,
    /// Numeric bounds from the record or the field's range pattern
    pub range: Option<(f64, f64)>,
    /// Kinds with a pattern registered for this exact field
    pub field_patterns: Vec<ErrorKind>,
}

impl Observation {
    /// Numeric reading of the value
    pub fn numeric(&self) -> Option<f64> {
        match &self.value {
            Value::Number(n) => n.as_f64(),
            _ => self.text.parse().ok().filter(|n: &f64| n.is_finite()),
        }
    }

    /// Whether the field has a pattern of the given kind
    pub fn has_pattern(&self, kind: ErrorKind) -> bool {
        self.field_patterns.contains(&kind)
    }

    /// Feature tokens used by the trained model
    pub fn features(&self) -> Vec<String> {
        let mut features = Vec::new();
        for token in tokenize(&self.error_type) {
            features.push(format!("type:{token}"));
        }
        for token in tokenize(&self.field) {
            features.push(format!("field:{token}"));
        }
        if self.text.is_empty() {
            features.push("shape:empty".to_string());
        }
        if self.numeric().is_some() {
            features.push("shape:numeric".to_string());
        }
        if shape::looks_structured(&self.text) {
            features.push("shape:object".to_string());
            let parsed = if shape::parses_as_json(&self.text) {
                "shape:json_ok"
            } else {
                "shape:json_err"
            };
            features.push(parsed.to_string());
        }
        if shape::looks_like_list(&self.text) {
            features.push("shape:list".to_string());
            if !shape::is_well_formed_list(&self.text) {
                features.push("shape:list_err".to_string());
            }
        }
        if self.known_ids.iter().any(|id| id == &self.text) {
            features.push("shape:known_id".to_string());
        }
        features
    }
}

/// Lowercase alphanumeric tokens, splitting camelCase and separators
pub fn tokenize(text: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut prev_lower = false;
    for ch in text.chars() {
        if !ch.is_alphanumeric() {
            if !current.is_empty() {
                tokens.push(std::mem::take(&mut current));
            }
            prev_lower = false;
            continue;
        }
        if ch.is_uppercase() && prev_lower && !current.is_empty() {
            tokens.push(std::mem::take(&mut current));
        }
        prev_lower = ch.is_lowercase() || ch.is_numeric();
        current.extend(ch.to_lowercase());
    }
    if !current.is_empty() {
        tokens.push(current);
    }
    tokens
}

/// A classification strategy selected at startup
#[cfg_attr(test, mockall::automock)]
pub trait ErrorClassifier: Send + Sync {
    /// Which strategy this is
    fn strategy(&self) -> ClassifiedBy;

    /// Classify one observation
    fn classify(&self, observation: &Observation) -> Classification;

    /// Extra candidate values the strategy proposes for a kind
    fn candidates(&self, _kind: ErrorKind) -> Vec<String> {
        Vec::new()
    }
}

/// Choose the classification strategy.
///
/// Uses the trained model at `artifact` when it exists and loads; any
/// failure is logged and the rule-based strategy is used instead.
pub fn select_strategy(artifact: Option<&Path>) -> Arc<dyn ErrorClassifier> {
    let Some(path) = artifact else {
        info!("No classifier artifact configured, using rule-based classification");
        return Arc::new(RuleBasedClassifier::new());
    };

    if !path.exists() {
        info!(
            "Classifier artifact {} not found, using rule-based classification",
            path.display()
        );
        return Arc::new(RuleBasedClassifier::new());
    }

    match TrainedModelClassifier::from_path(path) {
        Ok(model) => {
            info!("Loaded classifier artifact {}", path.display());
            Arc::new(model)
        }
        Err(e) => {
            warn!(error = %e, "Failed to load classifier artifact, using rule-based classification");
            Arc::new(RuleBasedClassifier::new())
        }
    }
}
