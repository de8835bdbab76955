//! Pattern store: known fixes per `(error kind, field)`.
//!
//! Entries live in one shelf per [`ErrorKind`], each behind its own
//! `RwLock`, so a write to one kind never blocks readers of another.
//! Every write passes the priority rule
//! (`administrative > feedback > default`) and leaves an audit record.

use crate::error::{Error, Result};
use crate::record::ErrorKind;
use chrono::Utc;
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::Path;
use tokio::sync::RwLock;
use tracing::{debug, info, instrument, warn};

/// Built-in patterns and the pattern document format.
pub mod defaults;
/// Entry, rule and audit types.
pub mod entry;
/// Feedback statistics and weighting fold.
pub mod stats;

#[cfg(test)]
mod tests;

pub use defaults::{default_document, default_entries, parse_document};
pub use entry::{
    AuditAction, AuditRecord, PatternEntry, PatternRule, PatternSource, UpdateReport,
    WILDCARD_FIELD,
};
pub use stats::{FoldOutcome, KindStatistics, Outcome, PatternUsage};

/// Everything stored for one error kind
#[derive(Debug, Default)]
pub(crate) struct Shelf {
    /// Field -> entry
    pub(crate) entries: BTreeMap<String, PatternEntry>,
    /// Field -> candidate -> feedback counts
    pub(crate) outcomes: BTreeMap<String, BTreeMap<String, Outcome>>,
    /// Every attempted write, in order
    pub(crate) audit: Vec<AuditRecord>,
}

impl Shelf {
    /// Exact field match, else the kind-wide entry. A kind-wide entry of
    /// higher priority overrides the field entry.
    pub(crate) fn effective(&self, field: &str) -> Option<&PatternEntry> {
        let exact = self.entries.get(field);
        let wide = self.entries.get(WILDCARD_FIELD);
        match (exact, wide) {
            (Some(e), Some(w)) if w.source > e.source => Some(w),
            (Some(e), _) => Some(e),
            (None, w) => w,
        }
    }

    /// Record a refused write without touching the entries
    pub(crate) fn reject(&mut self, field: &str, incoming: PatternSource, existing: PatternSource) {
        self.audit.push(AuditRecord {
            at: Utc::now(),
            field: field.to_string(),
            action: AuditAction::Rejected,
            incoming,
            previous: Some(existing),
        });
    }

    /// Apply the priority rule and record the attempt
    pub(crate) fn upsert(&mut self, mut entry: PatternEntry) -> AuditAction {
        let previous = self.entries.get(&entry.field).map(|e| e.source);
        let action = match previous {
            Some(existing) if existing > entry.source => AuditAction::Rejected,
            Some(_) => AuditAction::Replaced,
            None => AuditAction::Inserted,
        };

        self.audit.push(AuditRecord {
            at: Utc::now(),
            field: entry.field.clone(),
            action,
            incoming: entry.source,
            previous,
        });

        if action != AuditAction::Rejected {
            entry.updated_at = Utc::now();
            self.entries.insert(entry.field.clone(), entry);
        }
        action
    }
}

const KIND_COUNT: usize = ErrorKind::ALL.len();

fn shelf_index(kind: ErrorKind) -> usize {
    match kind {
        ErrorKind::OutOfRange => 0,
        ErrorKind::MalformedList => 1,
        ErrorKind::BrokenStructuredField => 2,
        ErrorKind::DuplicateIdentifier => 3,
        ErrorKind::Unknown => 4,
    }
}

/// Concurrent store of fix patterns
pub struct PatternStore {
    shelves: [RwLock<Shelf>; KIND_COUNT],
}

impl Default for PatternStore {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl PatternStore {
    /// Create an empty store
    pub fn empty() -> Self {
        Self {
            shelves: std::array::from_fn(|_| RwLock::new(Shelf::default())),
        }
    }

    /// Create a store seeded with the built-in patterns
    pub fn with_defaults() -> Self {
        let mut store = Self::empty();
        for entry in default_entries() {
            store.shelves[shelf_index(entry.kind)].get_mut().upsert(entry);
        }
        debug!("Pattern store seeded with built-in patterns");
        store
    }

    pub(crate) fn shelf(&self, kind: ErrorKind) -> &RwLock<Shelf> {
        &self.shelves[shelf_index(kind)]
    }

    /// Pattern for `(kind, field)`, falling back to the kind-wide entry
    pub async fn lookup(&self, kind: ErrorKind, field: &str) -> Option<PatternEntry> {
        self.shelf(kind).read().await.effective(field).cloned()
    }

    /// Kinds holding an entry for exactly this field (no wildcard)
    pub async fn field_kinds(&self, field: &str) -> Vec<ErrorKind> {
        let mut kinds = Vec::new();
        for kind in ErrorKind::ALL {
            if self.shelf(kind).read().await.entries.contains_key(field) {
                kinds.push(kind);
            }
        }
        kinds
    }

    /// All entries of one kind, ordered by field
    pub async fn entries(&self, kind: ErrorKind) -> Vec<PatternEntry> {
        self.shelf(kind).read().await.entries.values().cloned().collect()
    }

    /// Audit trail of one kind
    pub async fn audit_trail(&self, kind: ErrorKind) -> Vec<AuditRecord> {
        self.shelf(kind).read().await.audit.clone()
    }

    /// Merge entries, honouring source priority per key
    #[instrument(skip(self, entries), fields(count = entries.len()))]
    pub async fn apply(&self, entries: Vec<PatternEntry>) -> UpdateReport {
        let mut by_kind: BTreeMap<ErrorKind, Vec<PatternEntry>> = BTreeMap::new();
        for entry in entries {
            by_kind.entry(entry.kind).or_default().push(entry);
        }

        let mut report = UpdateReport::default();
        for (kind, group) in by_kind {
            let mut shelf = self.shelf(kind).write().await;
            for entry in group {
                let field = entry.field.clone();
                let action = shelf.upsert(entry);
                if action == AuditAction::Rejected {
                    warn!(kind = %kind, field = %field, "Pattern write rejected by higher-priority entry");
                }
                report.count(action);
            }
        }

        debug!(
            inserted = report.inserted,
            replaced = report.replaced,
            rejected = report.rejected,
            "Applied pattern entries"
        );
        report
    }

    /// Merge an administrative pattern document.
    ///
    /// The whole document is validated before anything is written.
    #[instrument(skip(self, document))]
    pub async fn update(&self, document: &Value) -> Result<UpdateReport> {
        let entries = parse_document(document, PatternSource::Administrative)?;
        let report = self.apply(entries).await;
        info!(
            inserted = report.inserted,
            replaced = report.replaced,
            "Pattern store updated"
        );
        Ok(report)
    }

    /// Merge a pattern file (same format as [`PatternStore::update`])
    pub async fn load_file(&self, path: &Path) -> Result<UpdateReport> {
        let content = tokio::fs::read_to_string(path).await?;
        let document: Value = serde_json::from_str(&content)
            .map_err(|e| Error::Serialization(format!("{}: {e}", path.display())))?;
        let report = self.update(&document).await?;
        info!("Loaded pattern file {}", path.display());
        Ok(report)
    }
}
