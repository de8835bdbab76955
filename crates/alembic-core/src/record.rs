//! Core data model: incoming error records, analyses and suggestions.

use crate::error::{Error, Result, REQUIRED_RECORD_FIELDS};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Classification bucket for a validation failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Numeric value outside the allowed range
    OutOfRange,
    /// List-typed value with broken syntax
    MalformedList,
    /// Structured (JSON) field that does not parse
    BrokenStructuredField,
    /// Identifier that collides with an existing one
    DuplicateIdentifier,
    /// No confident classification
    Unknown,
}

impl ErrorKind {
    /// All kinds, in a stable order
    pub const ALL: [ErrorKind; 5] = [
        Self::OutOfRange,
        Self::MalformedList,
        Self::BrokenStructuredField,
        Self::DuplicateIdentifier,
        Self::Unknown,
    ];

    /// Kinds that carry fix patterns
    pub const CONCRETE: [ErrorKind; 4] = [
        Self::OutOfRange,
        Self::MalformedList,
        Self::BrokenStructuredField,
        Self::DuplicateIdentifier,
    ];

    /// Returns the string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OutOfRange => "out_of_range",
            Self::MalformedList => "malformed_list",
            Self::BrokenStructuredField => "broken_structured_field",
            Self::DuplicateIdentifier => "duplicate_identifier",
            Self::Unknown => "unknown",
        }
    }

    /// Human-readable label used in guidance text
    pub fn label(&self) -> &'static str {
        match self {
            Self::OutOfRange => "value out of range",
            Self::MalformedList => "malformed list",
            Self::BrokenStructuredField => "broken structured field",
            Self::DuplicateIdentifier => "duplicate identifier",
            Self::Unknown => "unrecognized error",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ErrorKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace(['-', ' '], "_");
        match normalized.as_str() {
            "out_of_range" | "range" | "outofrange" | "value_out_of_range" => Ok(Self::OutOfRange),
            "malformed_list" | "invalid_list" | "list" => Ok(Self::MalformedList),
            "broken_structured_field" | "broken_json" | "invalid_json" | "malformed_json"
            | "json" => Ok(Self::BrokenStructuredField),
            "duplicate_identifier" | "duplicate_ids" | "duplicate_id" | "duplicate" => {
                Ok(Self::DuplicateIdentifier)
            }
            "unknown" => Ok(Self::Unknown),
            _ => Err(format!("unknown error kind: {s}")),
        }
    }
}

/// Declared type of the affected field (from schema hints)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    /// Numeric column
    Numeric,
    /// List-valued column
    List,
    /// JSON column
    Json,
    /// Identifier column
    Identifier,
}

impl std::str::FromStr for FieldType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "numeric" | "number" | "integer" | "int" | "float" => Ok(Self::Numeric),
            "list" | "array" => Ok(Self::List),
            "json" | "object" | "structured" => Ok(Self::Json),
            "identifier" | "id" => Ok(Self::Identifier),
            _ => Err(format!("unknown field type: {s}")),
        }
    }
}

/// A validation error reported by the caller
#[derive(Debug, Clone, Serialize)]
pub struct ErrorRecord {
    /// Error type label supplied by the caller
    pub error_type: String,
    /// Affected columns, in order
    pub affected_columns: Vec<String>,
    /// The offending value as received
    pub current_value: Value,
    /// Any additional keys (row context, schema hints)
    #[serde(flatten)]
    pub metadata: Map<String, Value>,
}

impl ErrorRecord {
    /// Create a record without metadata
    pub fn new(
        error_type: impl Into<String>,
        affected_columns: Vec<String>,
        current_value: impl Into<Value>,
    ) -> Self {
        Self {
            error_type: error_type.into(),
            affected_columns,
            current_value: current_value.into(),
            metadata: Map::new(),
        }
    }

    /// Attach a metadata key
    #[must_use]
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Build a record from a raw request body.
    ///
    /// Only the presence of the required fields is checked here; wrongly
    /// shaped values are tolerated and degrade during analysis.
    pub fn from_value(value: Value) -> Result<Self> {
        let Value::Object(mut body) = value else {
            return Err(Error::Validation(
                "error record must be a JSON object".to_string(),
            ));
        };

        let missing: Vec<String> = REQUIRED_RECORD_FIELDS
            .iter()
            .filter(|field| !body.contains_key(**field))
            .map(|field| (*field).to_string())
            .collect();
        if !missing.is_empty() {
            return Err(Error::missing_fields(&REQUIRED_RECORD_FIELDS, missing));
        }

        let error_type = body
            .remove("error_type")
            .map(|v| value_text(&v))
            .unwrap_or_default();
        let affected_columns = body
            .remove("affected_columns")
            .map(columns_from_value)
            .unwrap_or_default();
        let current_value = body.remove("current_value").unwrap_or(Value::Null);

        Ok(Self {
            error_type,
            affected_columns,
            current_value,
            metadata: body,
        })
    }

    /// First affected column, if any
    pub fn primary_column(&self) -> Option<&str> {
        self.affected_columns.first().map(String::as_str)
    }

    /// Declared field type hint (`field_type` metadata key)
    pub fn field_type(&self) -> Option<FieldType> {
        self.metadata
            .get("field_type")
            .and_then(Value::as_str)
            .and_then(|s| s.parse().ok())
    }

    /// Identifiers already in use (`known_ids` metadata key)
    pub fn known_ids(&self) -> Vec<String> {
        self.metadata
            .get("known_ids")
            .and_then(Value::as_array)
            .map(|ids| ids.iter().map(value_text).collect())
            .unwrap_or_default()
    }

    /// Explicit numeric bounds (`allowed_range` metadata key: `{min, max}` or `[min, max]`)
    pub fn allowed_range(&self) -> Option<(f64, f64)> {
        let range = self.metadata.get("allowed_range")?;
        let (min, max) = match range {
            Value::Object(obj) => (obj.get("min")?.as_f64()?, obj.get("max")?.as_f64()?),
            Value::Array(items) if items.len() == 2 => (items[0].as_f64()?, items[1].as_f64()?),
            _ => return None,
        };
        (min <= max).then_some((min, max))
    }
}

/// Render a JSON value as plain text (strings unquoted, null empty)
pub fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn columns_from_value(value: Value) -> Vec<String> {
    match value {
        Value::Array(items) => items.iter().map(value_text).collect(),
        Value::String(s) => s.split(',').map(|c| c.to_string()).collect(),
        Value::Null => Vec::new(),
        other => vec![value_text(&other)],
    }
}

/// Which strategy produced a classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassifiedBy {
    /// Deterministic rules
    RuleBased,
    /// Loaded classifier artifact
    TrainedModel,
    /// Nothing matched confidently
    Fallback,
}

/// Structured analysis of one error record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Analysis {
    /// Unique id used to correlate feedback
    pub error_id: String,
    /// Resolved error kind
    pub error_kind: ErrorKind,
    /// Field the fix applies to
    pub affected_field: String,
    /// Value as received
    pub offending_value: Value,
    /// Description of what a valid value looks like
    pub expected_shape: String,
    /// Confidence score (0.0 - 1.0)
    pub confidence: f64,
    /// Strategy that produced the classification
    pub classified_by: ClassifiedBy,
    /// When the analysis was produced
    pub analyzed_at: DateTime<Utc>,
}

impl Analysis {
    /// Offending value rendered as text
    pub fn offending_text(&self) -> String {
        value_text(&self.offending_value)
    }
}

/// Where a suggestion came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuggestionSource {
    /// Stored fix pattern
    PatternStore,
    /// Classifier artifact
    Classifier,
    /// Repair derived from the offending value
    Heuristic,
}

/// One candidate fix
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Suggestion {
    /// Proposed replacement value
    pub candidate_value: String,
    /// Why this candidate was proposed
    pub rationale: String,
    /// Position in the ranking (0 = best)
    pub rank: u32,
    /// Origin of the candidate
    pub source: SuggestionSource,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_error_kind_aliases() {
        assert_eq!("broken_json".parse::<ErrorKind>(), Ok(ErrorKind::BrokenStructuredField));
        assert_eq!("duplicate_ids".parse::<ErrorKind>(), Ok(ErrorKind::DuplicateIdentifier));
        assert_eq!("Out-Of-Range".parse::<ErrorKind>(), Ok(ErrorKind::OutOfRange));
        assert!("typo".parse::<ErrorKind>().is_err());
    }

    #[test]
    fn test_from_value_reports_missing_fields() {
        let err = ErrorRecord::from_value(json!({"error_type": "out_of_range"})).unwrap_err();
        match err {
            Error::MissingFields { missing, required } => {
                assert_eq!(missing, vec!["affected_columns", "current_value"]);
                assert_eq!(required.len(), 3);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_from_value_rejects_non_object() {
        assert!(matches!(
            ErrorRecord::from_value(json!([1, 2])),
            Err(Error::Validation(_))
        ));
    }

    #[test]
    fn test_from_value_keeps_metadata() {
        let record = ErrorRecord::from_value(json!({
            "error_type": "duplicate_ids",
            "affected_columns": "TaskID",
            "current_value": "T001",
            "known_ids": ["T001", "T002"],
            "field_type": "identifier"
        }))
        .unwrap();

        assert_eq!(record.affected_columns, vec!["TaskID"]);
        assert_eq!(record.known_ids(), vec!["T001", "T002"]);
        assert_eq!(record.field_type(), Some(FieldType::Identifier));
    }

    #[test]
    fn test_allowed_range_forms() {
        let record = ErrorRecord::new("out_of_range", vec!["X".into()], "9")
            .with_metadata("allowed_range", json!({"min": 1, "max": 5}));
        assert_eq!(record.allowed_range(), Some((1.0, 5.0)));

        let record = ErrorRecord::new("out_of_range", vec!["X".into()], "9")
            .with_metadata("allowed_range", json!([10, 2]));
        assert_eq!(record.allowed_range(), None);
    }
}
