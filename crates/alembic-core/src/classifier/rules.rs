use super::{shape, Classification, ErrorClassifier, Observation};
use crate::record::{ClassifiedBy, ErrorKind, FieldType};
use tracing::trace;

const HINT_ONLY_CONFIDENCE: f64 = 0.6;
const HINT_AGREEMENT_BOOST: f64 = 0.08;
const MAX_RULE_CONFIDENCE: f64 = 0.98;
const NO_MATCH_CONFIDENCE: f64 = 0.2;

/// Deterministic classifier that needs no model
#[derive(Debug, Default, Clone)]
pub struct RuleBasedClassifier;

impl RuleBasedClassifier {
    /// Create the rule-based classifier
    pub fn new() -> Self {
        Self
    }

    fn id_collision(observation: &Observation) -> Option<f64> {
        if observation.text.is_empty() {
            return None;
        }
        if observation.known_ids.iter().any(|id| id == &observation.text) {
            return Some(0.9);
        }
        let id_like = observation.field_type == Some(FieldType::Identifier)
            || observation.has_pattern(ErrorKind::DuplicateIdentifier)
            || observation.field.to_lowercase().ends_with("id");
        (observation.hint == Some(ErrorKind::DuplicateIdentifier) && id_like).then_some(0.75)
    }

    fn broken_structure(observation: &Observation) -> Option<f64> {
        let text = &observation.text;
        if text.is_empty() || shape::parses_as_json(text) {
            return None;
        }
        if shape::looks_structured(text) {
            return Some(0.85);
        }
        let structured_field = observation.field_type == Some(FieldType::Json)
            || observation.has_pattern(ErrorKind::BrokenStructuredField);
        structured_field.then_some(0.8)
    }

    fn malformed_list(observation: &Observation) -> Option<f64> {
        let text = &observation.text;
        let list_field = observation.field_type == Some(FieldType::List)
            || observation.has_pattern(ErrorKind::MalformedList);
        let bracketed = text.starts_with('[') || text.ends_with(']');
        if !(list_field || bracketed) {
            return None;
        }
        (!shape::is_well_formed_list(text)).then_some(0.8)
    }

    fn out_of_range(observation: &Observation) -> Option<f64> {
        let value = observation.numeric()?;
        if let Some((min, max)) = observation.range {
            if value < min || value > max {
                return Some(0.9);
            }
            return None;
        }
        let numeric_field = observation.field_type == Some(FieldType::Numeric)
            || observation.has_pattern(ErrorKind::OutOfRange);
        (observation.hint == Some(ErrorKind::OutOfRange) && numeric_field)
            .then_some(HINT_ONLY_CONFIDENCE)
    }
}

impl ErrorClassifier for RuleBasedClassifier {
    fn strategy(&self) -> ClassifiedBy {
        ClassifiedBy::RuleBased
    }

    fn classify(&self, observation: &Observation) -> Classification {
        let hint = observation.hint.filter(|k| *k != ErrorKind::Unknown);

        let checks = [
            (ErrorKind::DuplicateIdentifier, Self::id_collision(observation)),
            (ErrorKind::BrokenStructuredField, Self::broken_structure(observation)),
            (ErrorKind::MalformedList, Self::malformed_list(observation)),
            (ErrorKind::OutOfRange, Self::out_of_range(observation)),
        ];

        let mut best: Option<(ErrorKind, f64)> = None;
        for (kind, confidence) in checks {
            let Some(mut confidence) = confidence else {
                continue;
            };
            if hint == Some(kind) {
                confidence = (confidence + HINT_AGREEMENT_BOOST).min(MAX_RULE_CONFIDENCE);
            }
            trace!(kind = %kind, confidence, "Rule matched");
            // Earlier checks win ties.
            if best.map_or(true, |(_, c)| confidence > c) {
                best = Some((kind, confidence));
            }
        }

        match (best, hint) {
            (Some((kind, confidence)), _) => Classification::new(kind, confidence),
            (None, Some(kind)) => Classification::new(kind, HINT_ONLY_CONFIDENCE),
            (None, None) => Classification::unknown(NO_MATCH_CONFIDENCE),
        }
    }
}
