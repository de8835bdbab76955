use super::{Classification, ErrorClassifier, Observation};
use crate::error::{Error, Result};
use crate::record::{ClassifiedBy, ErrorKind};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::debug;

/// Serialized classifier: per-kind bias and feature-token weights
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelArtifact {
    /// Artifact version label
    #[serde(default)]
    pub version: String,
    /// Per-kind bias
    #[serde(default)]
    pub bias: BTreeMap<ErrorKind, f64>,
    /// Kind -> feature token -> weight
    pub weights: BTreeMap<ErrorKind, BTreeMap<String, f64>>,
    /// Extra candidate values per kind
    #[serde(default)]
    pub candidates: BTreeMap<ErrorKind, Vec<String>>,
}

impl ModelArtifact {
    /// Kinds the artifact can predict
    pub fn kinds(&self) -> Vec<ErrorKind> {
        let mut kinds: Vec<ErrorKind> = self.weights.keys().chain(self.bias.keys()).copied().collect();
        kinds.sort();
        kinds.dedup();
        kinds
    }

    fn score(&self, kind: ErrorKind, features: &[String]) -> f64 {
        let bias = self.bias.get(&kind).copied().unwrap_or(0.0);
        let weights = self.weights.get(&kind);
        bias + features
            .iter()
            .filter_map(|f| weights.and_then(|w| w.get(f)))
            .sum::<f64>()
    }
}

/// Classifier backed by a [`ModelArtifact`]
#[derive(Debug, Clone)]
pub struct TrainedModelClassifier {
    artifact: ModelArtifact,
}

impl TrainedModelClassifier {
    /// Wrap a parsed artifact
    pub fn new(artifact: ModelArtifact) -> Result<Self> {
        if artifact.kinds().is_empty() {
            return Err(Error::Validation(
                "classifier artifact has no kinds".to_string(),
            ));
        }
        Ok(Self { artifact })
    }

    /// Load an artifact from a JSON file
    pub fn from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let artifact: ModelArtifact = serde_json::from_str(&content)
            .map_err(|e| Error::Serialization(format!("{}: {e}", path.display())))?;
        debug!(version = %artifact.version, "Parsed classifier artifact");
        Self::new(artifact)
    }

    /// The loaded artifact
    pub fn artifact(&self) -> &ModelArtifact {
        &self.artifact
    }
}

impl ErrorClassifier for TrainedModelClassifier {
    fn strategy(&self) -> ClassifiedBy {
        ClassifiedBy::TrainedModel
    }

    fn classify(&self, observation: &Observation) -> Classification {
        let features = observation.features();
        let scores: Vec<(ErrorKind, f64)> = self
            .artifact
            .kinds()
            .into_iter()
            .map(|kind| (kind, self.artifact.score(kind, &features)))
            .collect();

        // Softmax, shifted by the max score for stability.
        let max = scores
            .iter()
            .map(|(_, s)| *s)
            .fold(f64::NEG_INFINITY, f64::max);
        let exp: Vec<(ErrorKind, f64)> = scores
            .iter()
            .map(|(kind, s)| (*kind, (s - max).exp()))
            .collect();
        let sum: f64 = exp.iter().map(|(_, e)| e).sum();

        let best = exp
            .iter()
            .fold(None::<(ErrorKind, f64)>, |best, &(kind, e)| match best {
                Some((_, b)) if b >= e => best,
                _ => Some((kind, e)),
            });

        match best {
            Some((kind, e)) if sum > 0.0 => Classification::new(kind, e / sum),
            _ => Classification::unknown(0.0),
        }
    }

    fn candidates(&self, kind: ErrorKind) -> Vec<String> {
        self.artifact
            .candidates
            .get(&kind)
            .cloned()
            .unwrap_or_default()
    }
}
