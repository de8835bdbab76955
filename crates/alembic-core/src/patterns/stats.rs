use super::entry::{AuditAction, PatternEntry, PatternRule, PatternSource};
use super::PatternStore;
use crate::record::ErrorKind;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, info, instrument};

/// Feedback counts for one candidate value
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Outcome {
    /// Events marked helpful
    pub helpful: u64,
    /// All events
    pub total: u64,
}

impl Outcome {
    /// Raw acceptance rate (0 when no feedback)
    pub fn rate(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.helpful as f64 / self.total as f64
        }
    }

    /// Laplace-smoothed rate; 0.5 with no feedback
    pub fn smoothed_rate(&self) -> f64 {
        (self.helpful as f64 + 1.0) / (self.total as f64 + 2.0)
    }
}

/// The most referenced candidate of a kind
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PatternUsage {
    /// Field the candidate belongs to
    pub field: String,
    /// Candidate value
    pub candidate_value: String,
    /// Feedback events referencing it
    pub uses: u64,
}

/// Statistics for one error kind
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KindStatistics {
    /// Stored entries
    pub entry_count: usize,
    /// Candidate with the most feedback, if any
    pub most_used_pattern: Option<PatternUsage>,
    /// Helpful / total feedback across the kind (0 without feedback)
    pub acceptance_rate: f64,
    /// Feedback events across the kind
    pub feedback_count: u64,
}

/// Result of folding feedback into the store
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum FoldOutcome {
    /// A feedback-derived entry was written
    Applied {
        /// Candidates in the written entry
        candidates: usize,
    },
    /// An entry with higher priority holds the key
    Rejected {
        /// Source of the entry that was kept
        existing: PatternSource,
    },
    /// Weighting produced the entry already stored
    Unchanged,
    /// The key has no value-set pattern to reweight
    NotApplicable,
}

impl PatternStore {
    /// Count one feedback event for a candidate
    #[instrument(skip(self))]
    pub async fn record_outcome(
        &self,
        kind: ErrorKind,
        field: &str,
        candidate: &str,
        helpful: bool,
    ) {
        let mut shelf = self.shelf(kind).write().await;
        let outcome = shelf
            .outcomes
            .entry(field.to_string())
            .or_default()
            .entry(candidate.to_string())
            .or_default();
        outcome.total += 1;
        if helpful {
            outcome.helpful += 1;
        }
    }

    /// Acceptance rate of one candidate, `None` without feedback
    pub async fn acceptance_rate(
        &self,
        kind: ErrorKind,
        field: &str,
        candidate: &str,
    ) -> Option<f64> {
        let shelf = self.shelf(kind).read().await;
        shelf
            .outcomes
            .get(field)
            .and_then(|candidates| candidates.get(candidate))
            .filter(|o| o.total > 0)
            .map(Outcome::rate)
    }

    /// Acceptance rates of every candidate with feedback for a field
    pub async fn candidate_rates(&self, kind: ErrorKind, field: &str) -> HashMap<String, f64> {
        let shelf = self.shelf(kind).read().await;
        shelf
            .outcomes
            .get(field)
            .map(|candidates| {
                candidates
                    .iter()
                    .filter(|(_, o)| o.total > 0)
                    .map(|(c, o)| (c.clone(), o.rate()))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Feedback events recorded for a field
    pub async fn feedback_count(&self, kind: ErrorKind, field: &str) -> u64 {
        let shelf = self.shelf(kind).read().await;
        shelf
            .outcomes
            .get(field)
            .map(|candidates| candidates.values().map(|o| o.total).sum())
            .unwrap_or(0)
    }

    /// Per-kind statistics
    pub async fn statistics(&self) -> BTreeMap<ErrorKind, KindStatistics> {
        let mut stats = BTreeMap::new();
        for kind in ErrorKind::ALL {
            let shelf = self.shelf(kind).read().await;

            let mut helpful = 0;
            let mut total = 0;
            let mut most_used: Option<PatternUsage> = None;
            for (field, candidates) in &shelf.outcomes {
                for (candidate, outcome) in candidates {
                    helpful += outcome.helpful;
                    total += outcome.total;
                    // Strict comparison keeps the first (field, candidate) in key order on ties.
                    if most_used.as_ref().map_or(true, |m| outcome.total > m.uses) {
                        most_used = Some(PatternUsage {
                            field: field.clone(),
                            candidate_value: candidate.clone(),
                            uses: outcome.total,
                        });
                    }
                }
            }

            stats.insert(
                kind,
                KindStatistics {
                    entry_count: shelf.entries.len(),
                    most_used_pattern: most_used.filter(|m| m.uses > 0),
                    acceptance_rate: Outcome { helpful, total }.rate(),
                    feedback_count: total,
                },
            );
        }
        stats
    }

    /// Reweight the pattern of `(kind, field)` from its feedback.
    ///
    /// Candidates are ordered by smoothed acceptance, helpful values not yet
    /// in the pattern are appended, and the result is written with
    /// [`PatternSource::Feedback`]. Entries of higher priority are kept; the
    /// refused write is recorded in the audit trail.
    #[instrument(skip(self))]
    pub async fn fold_feedback(&self, kind: ErrorKind, field: &str) -> FoldOutcome {
        let mut shelf = self.shelf(kind).write().await;

        let base: Vec<String> = match shelf.effective(field) {
            Some(PatternEntry {
                rule: PatternRule::Template { .. },
                ..
            }) => return FoldOutcome::NotApplicable,
            Some(entry) if entry.source > PatternSource::Feedback => {
                let existing = entry.source;
                shelf.reject(field, PatternSource::Feedback, existing);
                info!(kind = %kind, field, existing = existing.as_str(), "Feedback fold kept higher-priority pattern");
                return FoldOutcome::Rejected { existing };
            }
            Some(entry) => entry.candidates().to_vec(),
            None => Vec::new(),
        };

        let outcomes = shelf.outcomes.get(field).cloned().unwrap_or_default();
        let mut candidates = base;
        let mut learned: Vec<(&String, &Outcome)> = outcomes
            .iter()
            .filter(|(c, o)| o.helpful > 0 && !candidates.contains(*c))
            .collect();
        learned.sort_by(|a, b| b.1.helpful.cmp(&a.1.helpful).then_with(|| a.0.cmp(b.0)));
        candidates.extend(learned.into_iter().map(|(c, _)| c.clone()));

        if candidates.is_empty() {
            return FoldOutcome::NotApplicable;
        }

        let score = |c: &String| outcomes.get(c).copied().unwrap_or_default().smoothed_rate();
        // Stable sort: equal scores keep pattern order.
        candidates.sort_by(|a, b| score(b).total_cmp(&score(a)));

        if let Some(existing) = shelf.entries.get(field) {
            if existing.source == PatternSource::Feedback && existing.candidates() == candidates {
                debug!(kind = %kind, field, "Feedback fold produced no change");
                return FoldOutcome::Unchanged;
            }
        }

        let count = candidates.len();
        let entry = PatternEntry::values(kind, field, candidates, PatternSource::Feedback);
        match shelf.upsert(entry) {
            AuditAction::Rejected => {
                let existing = shelf
                    .entries
                    .get(field)
                    .map(|e| e.source)
                    .unwrap_or(PatternSource::Administrative);
                info!(kind = %kind, field, existing = existing.as_str(), "Feedback fold kept higher-priority pattern");
                FoldOutcome::Rejected { existing }
            }
            _ => {
                info!(kind = %kind, field, candidates = count, "Folded feedback into pattern");
                FoldOutcome::Applied { candidates: count }
            }
        }
    }
}
