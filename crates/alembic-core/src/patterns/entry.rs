use crate::record::ErrorKind;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Field name for kind-wide patterns
pub const WILDCARD_FIELD: &str = "*";

/// Who wrote a pattern entry, in ascending priority
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatternSource {
    /// Seeded at boot
    Default,
    /// Derived from folded user feedback
    Feedback,
    /// Written through the update interface or a pattern file
    Administrative,
}

impl PatternSource {
    /// Returns the string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Default => "default",
            Self::Feedback => "feedback",
            Self::Administrative => "administrative",
        }
    }
}

/// How acceptable values are produced for a pattern
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PatternRule {
    /// Fixed set of acceptable values, in preference order
    Values {
        /// Candidate values
        values: Vec<String>,
    },
    /// Identifier generation rule such as `{prefix}{timestamp}`
    Template {
        /// Template with `{prefix}` / `{timestamp}` placeholders
        template: String,
        /// Prefix substituted into the template
        prefix: String,
    },
}

/// A stored fix pattern for one `(kind, field)` pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatternEntry {
    /// Error kind this pattern fixes
    pub kind: ErrorKind,
    /// Field name, or [`WILDCARD_FIELD`]
    pub field: String,
    /// Value set or generation rule
    pub rule: PatternRule,
    /// Writer of this entry
    pub source: PatternSource,
    /// Last write time
    pub updated_at: DateTime<Utc>,
}

impl PatternEntry {
    /// Create a value-set entry
    pub fn values(
        kind: ErrorKind,
        field: impl Into<String>,
        values: Vec<String>,
        source: PatternSource,
    ) -> Self {
        Self {
            kind,
            field: field.into(),
            rule: PatternRule::Values { values },
            source,
            updated_at: Utc::now(),
        }
    }

    /// Create a template entry
    pub fn template(
        kind: ErrorKind,
        field: impl Into<String>,
        template: impl Into<String>,
        prefix: impl Into<String>,
        source: PatternSource,
    ) -> Self {
        Self {
            kind,
            field: field.into(),
            rule: PatternRule::Template {
                template: template.into(),
                prefix: prefix.into(),
            },
            source,
            updated_at: Utc::now(),
        }
    }

    /// Candidate values of a value-set rule (empty for templates)
    pub fn candidates(&self) -> &[String] {
        match &self.rule {
            PatternRule::Values { values } => values,
            PatternRule::Template { .. } => &[],
        }
    }

    /// `(min, max)` when every candidate is numeric
    pub fn numeric_bounds(&self) -> Option<(f64, f64)> {
        let values = self.candidates();
        if values.is_empty() {
            return None;
        }
        let mut bounds: Option<(f64, f64)> = None;
        for value in values {
            let n: f64 = value.trim().parse().ok()?;
            bounds = Some(match bounds {
                Some((lo, hi)) => (lo.min(n), hi.max(n)),
                None => (n, n),
            });
        }
        bounds
    }

    /// Description of a valid value under this pattern
    pub fn expected_shape(&self) -> String {
        match &self.rule {
            PatternRule::Template { template, prefix } => format!(
                "unique identifier of the form {template} with prefix '{prefix}'"
            ),
            PatternRule::Values { values } => {
                let shown = values.iter().take(5).cloned().collect::<Vec<_>>().join(", ");
                match (self.kind, self.numeric_bounds()) {
                    (ErrorKind::OutOfRange, Some((lo, hi))) => {
                        format!("number between {lo} and {hi} (allowed: {shown})")
                    }
                    (ErrorKind::MalformedList, _) => {
                        format!("well-formed list, e.g. {shown}")
                    }
                    (ErrorKind::BrokenStructuredField, _) => {
                        let example = values.first().map(String::as_str).unwrap_or("{}");
                        format!("well-formed JSON object, e.g. {example}")
                    }
                    _ => format!("one of: {shown}"),
                }
            }
        }
    }
}

/// What happened to a write
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    /// New key
    Inserted,
    /// Existing entry overwritten
    Replaced,
    /// Write refused: existing entry has higher priority
    Rejected,
}

/// One entry of the per-kind audit trail
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditRecord {
    /// When the write was attempted
    pub at: DateTime<Utc>,
    /// Field of the affected key
    pub field: String,
    /// Outcome
    pub action: AuditAction,
    /// Source of the attempted write
    pub incoming: PatternSource,
    /// Source of the entry that was there before
    pub previous: Option<PatternSource>,
}

/// Summary of a batch of writes
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UpdateReport {
    /// Keys created
    pub inserted: usize,
    /// Keys overwritten
    pub replaced: usize,
    /// Writes refused by priority
    pub rejected: usize,
}

impl UpdateReport {
    pub(crate) fn count(&mut self, action: AuditAction) {
        match action {
            AuditAction::Inserted => self.inserted += 1,
            AuditAction::Replaced => self.replaced += 1,
            AuditAction::Rejected => self.rejected += 1,
        }
    }
}
