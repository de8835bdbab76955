//! Engine context shared by every component.

use crate::classifier::{select_strategy, ErrorClassifier};
use crate::patterns::PatternStore;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

/// Engine tuning
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Minimum confidence for a classification to be kept
    pub confidence_threshold: f64,
    /// Maximum suggestions returned per error
    pub max_suggestions: usize,
    /// Feedback events per `(kind, field)` before a weighting fold
    pub materiality_threshold: u64,
    /// Resolved requests kept for feedback; the oldest are evicted first
    pub request_log_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: 0.5,
            max_suggestions: 5,
            materiality_threshold: 5,
            request_log_capacity: 10_000,
        }
    }
}

/// Optional files read once at boot
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelPaths {
    /// Classifier artifact
    pub classifier_path: Option<PathBuf>,
    /// Pattern file merged over the defaults
    pub patterns_path: Option<PathBuf>,
}

/// Pattern store, classifier and settings, owned explicitly
#[derive(Clone)]
pub struct EngineContext {
    /// Pattern store
    pub store: Arc<PatternStore>,
    /// Classification strategy selected at startup
    pub classifier: Arc<dyn ErrorClassifier>,
    /// Engine tuning
    pub config: EngineConfig,
}

impl std::fmt::Debug for EngineContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineContext")
            .field("classifier", &self.classifier.strategy())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl EngineContext {
    /// Assemble a context from parts
    pub fn new(
        store: Arc<PatternStore>,
        classifier: Arc<dyn ErrorClassifier>,
        config: EngineConfig,
    ) -> Self {
        Self {
            store,
            classifier,
            config,
        }
    }

    /// Default patterns, rule-based classification
    pub fn with_defaults(config: EngineConfig) -> Self {
        Self::new(
            Arc::new(PatternStore::with_defaults()),
            select_strategy(None),
            config,
        )
    }

    /// Build the context at startup.
    ///
    /// Missing or unreadable files are logged and the built-in defaults
    /// are used; this never fails.
    pub async fn bootstrap(config: EngineConfig, paths: &ModelPaths) -> Self {
        let store = PatternStore::with_defaults();

        match paths.patterns_path.as_deref() {
            Some(path) if path.exists() => match store.load_file(path).await {
                Ok(report) => info!(
                    inserted = report.inserted,
                    replaced = report.replaced,
                    "Pattern file merged"
                ),
                Err(e) => warn!(error = %e, "Failed to load pattern file, using built-in patterns"),
            },
            Some(path) => info!(
                "Pattern file {} not found, using built-in patterns",
                path.display()
            ),
            None => {}
        }

        let classifier = select_strategy(paths.classifier_path.as_deref());
        Self::new(Arc::new(store), classifier, config)
    }
}
