use super::*;
use serde_json::json;
use std::io::Write;

#[tokio::test]
async fn test_defaults_are_loaded() {
    let store = PatternStore::with_defaults();

    let entry = store
        .lookup(ErrorKind::OutOfRange, "PriorityLevel")
        .await
        .unwrap();
    assert_eq!(entry.candidates(), ["1", "2", "3", "4", "5"]);
    assert_eq!(entry.source, PatternSource::Default);

    let stats = store.statistics().await;
    for kind in ErrorKind::CONCRETE {
        assert!(stats[&kind].entry_count > 0, "{kind} has no entries");
    }
}

#[tokio::test]
async fn test_lookup_falls_back_to_wildcard() {
    let store = PatternStore::with_defaults();
    let entry = store
        .lookup(ErrorKind::BrokenStructuredField, "Attributes")
        .await
        .unwrap();
    assert_eq!(entry.field, WILDCARD_FIELD);
    assert!(store.lookup(ErrorKind::OutOfRange, "Nope").await.is_none());

    assert_eq!(
        store.field_kinds("AvailableSlots").await,
        vec![ErrorKind::MalformedList]
    );
    assert!(store.field_kinds("Attributes").await.is_empty());
}

#[tokio::test]
async fn test_update_merges_and_replaces() {
    let store = PatternStore::with_defaults();
    let report = store
        .update(&json!({
            "out_of_range": {"PriorityLevel": ["1", "2", "3"], "Rating": ["1", "10"]}
        }))
        .await
        .unwrap();

    assert_eq!(report.inserted, 1);
    assert_eq!(report.replaced, 1);

    let entry = store
        .lookup(ErrorKind::OutOfRange, "PriorityLevel")
        .await
        .unwrap();
    assert_eq!(entry.candidates(), ["1", "2", "3"]);
    assert_eq!(entry.source, PatternSource::Administrative);
}

#[tokio::test]
async fn test_malformed_update_leaves_store_untouched() {
    let store = PatternStore::with_defaults();
    let result = store
        .update(&json!({
            "out_of_range": {"PriorityLevel": ["9"]},
            "malformed_list": {"AvailableSlots": "not a list"}
        }))
        .await;

    assert!(matches!(result, Err(Error::Validation(_))));
    let entry = store
        .lookup(ErrorKind::OutOfRange, "PriorityLevel")
        .await
        .unwrap();
    assert_eq!(entry.source, PatternSource::Default);
}

#[tokio::test]
async fn test_lower_priority_write_is_rejected_and_audited() {
    let store = PatternStore::with_defaults();
    store
        .update(&json!({"out_of_range": {"PriorityLevel": ["1", "2"]}}))
        .await
        .unwrap();

    let report = store
        .apply(vec![PatternEntry::values(
            ErrorKind::OutOfRange,
            "PriorityLevel",
            vec!["5".into()],
            PatternSource::Feedback,
        )])
        .await;
    assert_eq!(report.rejected, 1);

    let entry = store
        .lookup(ErrorKind::OutOfRange, "PriorityLevel")
        .await
        .unwrap();
    assert_eq!(entry.candidates(), ["1", "2"]);

    let trail = store.audit_trail(ErrorKind::OutOfRange).await;
    let last = trail.last().unwrap();
    assert_eq!(last.action, AuditAction::Rejected);
    assert_eq!(last.incoming, PatternSource::Feedback);
    assert_eq!(last.previous, Some(PatternSource::Administrative));
}

#[tokio::test]
async fn test_statistics_acceptance_rate() {
    let store = PatternStore::with_defaults();
    let stats = store.statistics().await;
    assert_eq!(stats[&ErrorKind::OutOfRange].acceptance_rate, 0.0);
    assert!(stats[&ErrorKind::OutOfRange].most_used_pattern.is_none());

    store
        .record_outcome(ErrorKind::OutOfRange, "PriorityLevel", "5", true)
        .await;
    store
        .record_outcome(ErrorKind::OutOfRange, "PriorityLevel", "5", false)
        .await;
    store
        .record_outcome(ErrorKind::OutOfRange, "PriorityLevel", "4", true)
        .await;

    let stats = store.statistics().await;
    let range = &stats[&ErrorKind::OutOfRange];
    assert_eq!(range.feedback_count, 3);
    assert!((range.acceptance_rate - 2.0 / 3.0).abs() < 1e-9);
    let most_used = range.most_used_pattern.as_ref().unwrap();
    assert_eq!(most_used.candidate_value, "5");
    assert_eq!(most_used.uses, 2);

    assert_eq!(
        store
            .acceptance_rate(ErrorKind::OutOfRange, "PriorityLevel", "5")
            .await,
        Some(0.5)
    );
    assert_eq!(
        store
            .acceptance_rate(ErrorKind::OutOfRange, "PriorityLevel", "1")
            .await,
        None
    );
}

#[tokio::test]
async fn test_fold_reorders_default_pattern() {
    let store = PatternStore::with_defaults();
    for _ in 0..3 {
        store
            .record_outcome(ErrorKind::OutOfRange, "PriorityLevel", "5", true)
            .await;
    }
    store
        .record_outcome(ErrorKind::OutOfRange, "PriorityLevel", "1", false)
        .await;

    let outcome = store
        .fold_feedback(ErrorKind::OutOfRange, "PriorityLevel")
        .await;
    assert_eq!(outcome, FoldOutcome::Applied { candidates: 5 });

    let entry = store
        .lookup(ErrorKind::OutOfRange, "PriorityLevel")
        .await
        .unwrap();
    assert_eq!(entry.source, PatternSource::Feedback);
    assert_eq!(entry.candidates(), ["5", "2", "3", "4", "1"]);

    assert_eq!(
        store
            .fold_feedback(ErrorKind::OutOfRange, "PriorityLevel")
            .await,
        FoldOutcome::Unchanged
    );
}

#[tokio::test]
async fn test_fold_learns_helpful_values() {
    let store = PatternStore::with_defaults();
    store
        .record_outcome(ErrorKind::OutOfRange, "Rating", "7", true)
        .await;

    let outcome = store.fold_feedback(ErrorKind::OutOfRange, "Rating").await;
    assert_eq!(outcome, FoldOutcome::Applied { candidates: 1 });
    let entry = store.lookup(ErrorKind::OutOfRange, "Rating").await.unwrap();
    assert_eq!(entry.candidates(), ["7"]);
}

#[tokio::test]
async fn test_fold_never_demotes_administrative_entry() {
    let store = PatternStore::with_defaults();
    store
        .update(&json!({"out_of_range": {"PriorityLevel": ["1", "2", "3", "4", "5"]}}))
        .await
        .unwrap();
    for _ in 0..5 {
        store
            .record_outcome(ErrorKind::OutOfRange, "PriorityLevel", "5", true)
            .await;
    }

    let outcome = store
        .fold_feedback(ErrorKind::OutOfRange, "PriorityLevel")
        .await;
    assert_eq!(
        outcome,
        FoldOutcome::Rejected {
            existing: PatternSource::Administrative
        }
    );

    let entry = store
        .lookup(ErrorKind::OutOfRange, "PriorityLevel")
        .await
        .unwrap();
    assert_eq!(entry.source, PatternSource::Administrative);
    assert_eq!(entry.candidates()[0], "1");
}

#[tokio::test]
async fn test_fold_keeps_administrative_kind_wide_entry() {
    let store = PatternStore::with_defaults();
    store
        .update(&json!({"broken_json": ["{\"a\": 1}", "{\"b\": 2}"]}))
        .await
        .unwrap();
    for _ in 0..5 {
        store
            .record_outcome(ErrorKind::BrokenStructuredField, "Attributes", "{\"b\": 2}", true)
            .await;
    }

    let outcome = store
        .fold_feedback(ErrorKind::BrokenStructuredField, "Attributes")
        .await;
    assert_eq!(
        outcome,
        FoldOutcome::Rejected {
            existing: PatternSource::Administrative
        }
    );
    let last = store
        .audit_trail(ErrorKind::BrokenStructuredField)
        .await
        .pop()
        .unwrap();
    assert_eq!(last.action, AuditAction::Rejected);
    assert_eq!(last.field, "Attributes");
    assert_eq!(last.incoming, PatternSource::Feedback);

    store
        .update(&json!({"broken_json": ["{\"c\": 3}"]}))
        .await
        .unwrap();
    let entry = store
        .lookup(ErrorKind::BrokenStructuredField, "Attributes")
        .await
        .unwrap();
    assert_eq!(entry.source, PatternSource::Administrative);
    assert_eq!(entry.candidates(), ["{\"c\": 3}"]);
}

#[tokio::test]
async fn test_administrative_kind_wide_entry_overrides_learned_field_entry() {
    let store = PatternStore::with_defaults();
    store
        .apply(vec![PatternEntry::values(
            ErrorKind::BrokenStructuredField,
            "Attributes",
            vec!["{\"old\": true}".to_string()],
            PatternSource::Feedback,
        )])
        .await;
    assert_eq!(
        store
            .lookup(ErrorKind::BrokenStructuredField, "Attributes")
            .await
            .unwrap()
            .source,
        PatternSource::Feedback
    );

    store
        .update(&json!({"broken_json": ["{\"c\": 3}"]}))
        .await
        .unwrap();
    let entry = store
        .lookup(ErrorKind::BrokenStructuredField, "Attributes")
        .await
        .unwrap();
    assert_eq!(entry.field, WILDCARD_FIELD);
    assert_eq!(entry.candidates(), ["{\"c\": 3}"]);
}

#[tokio::test]
async fn test_fold_skips_templates() {
    let store = PatternStore::with_defaults();
    store
        .record_outcome(ErrorKind::DuplicateIdentifier, "TaskID", "T002", true)
        .await;
    assert_eq!(
        store
            .fold_feedback(ErrorKind::DuplicateIdentifier, "TaskID")
            .await,
        FoldOutcome::NotApplicable
    );
}

#[tokio::test]
async fn test_load_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, r#"{{"malformed_list": {{"Skills": ["a,b", "c"]}}}}"#).unwrap();

    let store = PatternStore::with_defaults();
    let report = store.load_file(file.path()).await.unwrap();
    assert_eq!(report.inserted, 1);
    let entry = store
        .lookup(ErrorKind::MalformedList, "Skills")
        .await
        .unwrap();
    assert_eq!(entry.source, PatternSource::Administrative);
}

#[tokio::test]
async fn test_load_missing_file_fails() {
    let store = PatternStore::with_defaults();
    let result = store
        .load_file(std::path::Path::new("/nonexistent/alembic/patterns.json"))
        .await;
    assert!(matches!(result, Err(Error::Io(_))));
}
