//! Suggestion engine: ranked candidate fixes and guidance text.
//!
//! Candidates come from the pattern entry for the analyzed field, the
//! classifier, and repairs derived from the offending value itself. They are
//! ranked by acceptance rate (neutral 0.5 without feedback), then by
//! proximity to the offending value, then by the order they were produced.

use crate::analyzer::ErrorAnalyzer;
use crate::classifier::{shape, ErrorClassifier};
use crate::context::EngineContext;
use crate::patterns::{PatternEntry, PatternRule};
use crate::record::{Analysis, ErrorKind, ErrorRecord, Suggestion, SuggestionSource};
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, instrument};

/// Rank score for candidates without feedback
pub const NEUTRAL_ACCEPTANCE: f64 = 0.5;

const IDENTIFIER_SUCCESSORS: usize = 2;

/// Record details that sharpen candidate generation
#[derive(Debug, Clone, Default)]
pub struct RecordHints {
    /// Identifiers already in use
    pub known_ids: Vec<String>,
    /// Explicit numeric bounds
    pub allowed_range: Option<(f64, f64)>,
}

impl RecordHints {
    /// Hints carried in a record's metadata
    pub fn from_record(record: &ErrorRecord) -> Self {
        Self {
            known_ids: record.known_ids(),
            allowed_range: record.allowed_range(),
        }
    }
}

struct Candidate {
    value: String,
    rationale: String,
    source: SuggestionSource,
}

/// Builds ranked suggestions for analyses
#[derive(Debug, Clone)]
pub struct SuggestionEngine {
    context: Arc<EngineContext>,
    analyzer: ErrorAnalyzer,
}

impl SuggestionEngine {
    /// Create an engine over the shared context
    pub fn new(context: Arc<EngineContext>) -> Self {
        Self {
            analyzer: ErrorAnalyzer::new(context.clone()),
            context,
        }
    }

    /// Ranked suggestions for an analysis
    pub async fn generate(&self, analysis: &Analysis) -> Vec<Suggestion> {
        self.generate_with_hints(analysis, &RecordHints::default())
            .await
    }

    /// Ranked suggestions, using record metadata when available
    #[instrument(skip_all, fields(error_id = %analysis.error_id, kind = %analysis.error_kind))]
    pub async fn generate_with_hints(
        &self,
        analysis: &Analysis,
        hints: &RecordHints,
    ) -> Vec<Suggestion> {
        let kind = analysis.error_kind;
        let field = analysis.affected_field.as_str();
        let offending = analysis.offending_text();
        let entry = self.context.store.lookup(kind, field).await;

        let mut candidates = Vec::new();
        if let Some(entry) = &entry {
            candidates.extend(pattern_candidates(entry, analysis, hints));
        }
        candidates.extend(
            self.context
                .classifier
                .candidates(kind)
                .into_iter()
                .map(|value| Candidate {
                    value,
                    rationale: format!("proposed by the classifier for {}", kind.label()),
                    source: SuggestionSource::Classifier,
                }),
        );
        candidates.extend(heuristic_candidates(kind, &offending, entry.as_ref(), hints));

        let offending_key = dedup_key(&offending);
        let mut seen = HashSet::new();
        candidates.retain(|c| {
            let key = dedup_key(&c.value);
            !c.value.is_empty() && key != offending_key && seen.insert(key)
        });

        let rates = self.context.store.candidate_rates(kind, field).await;
        let mut scored: Vec<(f64, f64, Candidate)> = candidates
            .into_iter()
            .map(|c| {
                let rate = rates.get(&c.value).copied().unwrap_or(NEUTRAL_ACCEPTANCE);
                (rate, proximity(&offending, &c.value), c)
            })
            .collect();
        // Stable: equal keys keep production order.
        scored.sort_by(|a, b| b.0.total_cmp(&a.0).then_with(|| a.1.total_cmp(&b.1)));

        let suggestions: Vec<Suggestion> = scored
            .into_iter()
            .take(self.context.config.max_suggestions)
            .enumerate()
            .map(|(rank, (_, _, c))| Suggestion {
                candidate_value: c.value,
                rationale: c.rationale,
                rank: rank as u32,
                source: c.source,
            })
            .collect();
        debug!(count = suggestions.len(), "Generated suggestions");
        suggestions
    }

    /// Human-readable guidance; never empty
    pub fn guidance(&self, analysis: &Analysis, suggestions: &[Suggestion]) -> String {
        let field = if analysis.affected_field.is_empty() {
            "the affected column".to_string()
        } else {
            format!("'{}'", analysis.affected_field)
        };
        let value = analysis.offending_text();

        if analysis.error_kind == ErrorKind::Unknown {
            let mut text = format!(
                "Could not determine why value '{value}' in {field} failed validation."
            );
            match suggestions.first() {
                Some(top) => text.push_str(&format!(
                    " A possible replacement is '{}'.",
                    top.candidate_value
                )),
                None => text.push_str(
                    " No automatic fix is available; review the value against the column's rules.",
                ),
            }
            return text;
        }

        let mut text = format!(
            "Detected {} in {field}: '{value}'. Expected {}.",
            analysis.error_kind.label(),
            analysis.expected_shape
        );
        match suggestions.first() {
            Some(top) => text.push_str(&format!(
                " Suggested fix: '{}' ({}).",
                top.candidate_value, top.rationale
            )),
            None => text.push_str(" No candidate fix is available; correct the value manually."),
        }
        if suggestions.len() > 1 {
            text.push_str(&format!(" {} alternatives available.", suggestions.len() - 1));
        }
        text
    }

    /// Analyze a record and snapshot its ranked suggestions for
    /// one-at-a-time delivery.
    pub async fn progressive_generate(&self, record: &ErrorRecord) -> ProgressiveSuggestions {
        let analysis = self.analyzer.analyze(record).await;
        let suggestions = self
            .generate_with_hints(&analysis, &RecordHints::from_record(record))
            .await;
        ProgressiveSuggestions::new(analysis, suggestions)
    }
}

/// One element of a progressive stream
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SuggestionUpdate {
    /// Position in the stream, from 0
    pub index: usize,
    /// The suggestion
    pub suggestion: Suggestion,
    /// Stream length
    pub total: usize,
}

/// Finite producer over a ranked snapshot.
///
/// Later feedback never reorders a stream already handed out.
#[derive(Debug)]
pub struct ProgressiveSuggestions {
    analysis: Analysis,
    items: std::iter::Enumerate<std::vec::IntoIter<Suggestion>>,
    total: usize,
}

impl ProgressiveSuggestions {
    fn new(analysis: Analysis, suggestions: Vec<Suggestion>) -> Self {
        Self {
            analysis,
            total: suggestions.len(),
            items: suggestions.into_iter().enumerate(),
        }
    }

    /// Analysis the stream was produced for
    pub fn analysis(&self) -> &Analysis {
        &self.analysis
    }

    /// Number of updates the stream yields in total
    pub fn total(&self) -> usize {
        self.total
    }

    /// Suggestions not yet yielded, without consuming them
    pub fn remaining(&self) -> Vec<Suggestion> {
        self.items.clone().map(|(_, s)| s).collect()
    }
}

impl Iterator for ProgressiveSuggestions {
    type Item = SuggestionUpdate;

    fn next(&mut self) -> Option<Self::Item> {
        self.items.next().map(|(index, suggestion)| SuggestionUpdate {
            index,
            suggestion,
            total: self.total,
        })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.items.size_hint()
    }
}

impl ExactSizeIterator for ProgressiveSuggestions {}

fn pattern_candidates(
    entry: &PatternEntry,
    analysis: &Analysis,
    hints: &RecordHints,
) -> Vec<Candidate> {
    match &entry.rule {
        PatternRule::Template { template, prefix } => {
            let stamp = analysis.analyzed_at.format("%Y%m%d%H%M%S").to_string();
            let value = template
                .replace("{prefix}", prefix)
                .replace("{timestamp}", &stamp);
            vec![Candidate {
                value,
                rationale: format!("new identifier from template {template}"),
                source: SuggestionSource::PatternStore,
            }]
        }
        PatternRule::Values { values } => values
            .iter()
            .filter(|value| match (analysis.error_kind, hints.allowed_range) {
                (ErrorKind::OutOfRange, Some((min, max))) => value
                    .trim()
                    .parse::<f64>()
                    .map_or(true, |n| n >= min && n <= max),
                _ => true,
            })
            .map(|value| Candidate {
                value: value.clone(),
                rationale: match analysis.error_kind {
                    ErrorKind::OutOfRange => "allowed value for this field".to_string(),
                    ErrorKind::MalformedList => "known list format for this field".to_string(),
                    ErrorKind::BrokenStructuredField => "well-formed JSON template".to_string(),
                    _ => "known valid value".to_string(),
                },
                source: SuggestionSource::PatternStore,
            })
            .collect(),
    }
}

fn heuristic_candidates(
    kind: ErrorKind,
    offending: &str,
    entry: Option<&PatternEntry>,
    hints: &RecordHints,
) -> Vec<Candidate> {
    let heuristic = |value: String, rationale: &str| Candidate {
        value,
        rationale: rationale.to_string(),
        source: SuggestionSource::Heuristic,
    };

    match kind {
        ErrorKind::OutOfRange => {
            let bounds = hints
                .allowed_range
                .or_else(|| entry.and_then(PatternEntry::numeric_bounds));
            let number = offending.trim().parse::<f64>().ok().or_else(|| {
                shape::extract_numbers(offending)
                    .first()
                    .and_then(|n| n.parse().ok())
            });
            match (number, bounds) {
                (Some(n), Some((min, max))) if n.is_finite() => {
                    vec![heuristic(format_number(n.clamp(min, max)), "nearest allowed value")]
                }
                _ => Vec::new(),
            }
        }
        ErrorKind::MalformedList => shape::normalize_list(offending)
            .map(|list| vec![heuristic(list, "same items with consistent delimiters")])
            .unwrap_or_default(),
        ErrorKind::BrokenStructuredField => shape::repair_json(offending)
            .map(|json| vec![heuristic(json, "repaired JSON syntax")])
            .unwrap_or_default(),
        ErrorKind::DuplicateIdentifier => identifier_successors(offending, &hints.known_ids)
            .into_iter()
            .map(|id| heuristic(id, "next identifier not in use"))
            .collect(),
        ErrorKind::Unknown => Vec::new(),
    }
}

/// JSON-equivalent values compare equal (`[1, 2]` and `[1,2]`)
fn dedup_key(value: &str) -> String {
    serde_json::from_str::<serde_json::Value>(value.trim())
        .map(|v| v.to_string())
        .unwrap_or_else(|_| value.trim().to_string())
}

/// Integral values without a fractional part
fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}

/// Identifiers following `offending` (same prefix, next free numbers)
fn identifier_successors(offending: &str, known_ids: &[String]) -> Vec<String> {
    let digits_at = offending
        .char_indices()
        .rev()
        .take_while(|(_, c)| c.is_ascii_digit())
        .last()
        .map(|(i, _)| i);

    let (prefix, width, start) = match digits_at {
        Some(i) => {
            let digits = &offending[i..];
            match digits.parse::<u64>().ok().and_then(|n| n.checked_add(1)) {
                Some(next) => (&offending[..i], digits.len(), next),
                None => return Vec::new(),
            }
        }
        None if offending.is_empty() => return Vec::new(),
        None => (offending, 0, 2),
    };

    let taken: HashSet<&str> = known_ids.iter().map(String::as_str).collect();
    (start..=u64::MAX)
        .take(1000)
        .map(|n| {
            if width > 0 {
                format!("{prefix}{n:0width$}")
            } else {
                format!("{prefix}_{n}")
            }
        })
        .filter(|id| !taken.contains(id.as_str()))
        .take(IDENTIFIER_SUCCESSORS)
        .collect()
}

/// Distance between the offending value and a candidate (lower is closer)
fn proximity(offending: &str, candidate: &str) -> f64 {
    match (
        offending.trim().parse::<f64>(),
        candidate.trim().parse::<f64>(),
    ) {
        (Ok(a), Ok(b)) if a.is_finite() && b.is_finite() => (a - b).abs(),
        _ => levenshtein(offending, candidate) as f64,
    }
}

fn levenshtein(a: &str, b: &str) -> usize {
    let b: Vec<char> = b.chars().collect();
    let mut row: Vec<usize> = (0..=b.len()).collect();
    for (i, ca) in a.chars().enumerate() {
        let mut diagonal = row[0];
        row[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let above = row[j + 1];
            row[j + 1] = if ca == *cb {
                diagonal
            } else {
                1 + diagonal.min(above).min(row[j])
            };
            diagonal = above;
        }
    }
    row[b.len()]
}
