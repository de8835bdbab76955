//! Built-in pattern set and the pattern document format.
//!
//! The document format is the one accepted by the update interface and by
//! pattern files:
//!
//! ```text
//! {
//!   "out_of_range":   { "PriorityLevel": ["1", "2", "3"] },      // field -> values
//!   "broken_json":    ["{\"status\": \"active\"}"],                // kind-wide values
//!   "duplicate_ids":  { "pattern": "{prefix}{timestamp}",          // templates
//!                       "prefixes": { "TaskID": "T" } },
//!   "duplicate_identifier": { "OrderID": { "template": "...", "prefix": "O" } }
//! }
//! ```

use super::entry::{PatternEntry, PatternSource, WILDCARD_FIELD};
use crate::error::{Error, Result};
use crate::record::ErrorKind;
use serde_json::{json, Map, Value};

/// The pattern set every store boots with
pub fn default_document() -> Value {
    json!({
        "out_of_range": {
            "PriorityLevel": ["1", "2", "3", "4", "5"],
            "Duration": ["1", "2", "3", "4", "5", "6"],
            "QualificationLevel": ["1", "2", "3", "4", "5"]
        },
        "malformed_list": {
            "AvailableSlots": ["[1,2,3]", "[1,3,5]", "[2,4]"],
            "PreferredPhases": ["[1,2]", "[2,3,4]", "1-3", "2-5"],
            "RequestedTaskIDs": ["T001,T002", "T001,T003,T004"]
        },
        "broken_json": [
            "{\"status\": \"active\"}",
            "{\"priority\": \"high\", \"category\": \"urgent\"}",
            "{\"department\": \"IT\", \"location\": \"office\"}"
        ],
        "duplicate_ids": {
            "pattern": "{prefix}{timestamp}",
            "prefixes": {"ClientID": "C", "WorkerID": "W", "TaskID": "T"}
        }
    })
}

/// Built-in entries, tagged with [`PatternSource::Default`]
pub fn default_entries() -> Vec<PatternEntry> {
    // The built-in document is static and covered by tests.
    parse_document(&default_document(), PatternSource::Default).unwrap_or_default()
}

/// Parse a pattern document into entries.
///
/// Fails on the first malformed section; nothing is returned partially.
pub fn parse_document(document: &Value, source: PatternSource) -> Result<Vec<PatternEntry>> {
    let Value::Object(sections) = document else {
        return Err(Error::Validation(
            "pattern document must be a JSON object".to_string(),
        ));
    };

    let mut entries = Vec::new();
    for (kind_name, section) in sections {
        let kind: ErrorKind = kind_name.parse().map_err(Error::Validation)?;
        match section {
            Value::Array(items) => {
                let values = parse_values(kind_name, WILDCARD_FIELD, items)?;
                entries.push(PatternEntry::values(kind, WILDCARD_FIELD, values, source));
            }
            Value::Object(fields) if fields.contains_key("pattern") => {
                entries.extend(parse_prefix_table(kind, kind_name, fields, source)?);
            }
            Value::Object(fields) => {
                for (field, field_rule) in fields {
                    entries.push(parse_field(kind, kind_name, field, field_rule, source)?);
                }
            }
            _ => {
                return Err(Error::Validation(format!(
                    "patterns for '{kind_name}' must be a list or an object"
                )))
            }
        }
    }

    Ok(entries)
}

fn parse_field(
    kind: ErrorKind,
    kind_name: &str,
    field: &str,
    field_rule: &Value,
    source: PatternSource,
) -> Result<PatternEntry> {
    if field.trim().is_empty() {
        return Err(Error::Validation(format!(
            "empty field name in patterns for '{kind_name}'"
        )));
    }
    match field_rule {
        Value::Array(items) => {
            let values = parse_values(kind_name, field, items)?;
            Ok(PatternEntry::values(kind, field, values, source))
        }
        Value::Object(obj) => {
            let template = obj.get("template").and_then(Value::as_str);
            let prefix = obj.get("prefix").and_then(Value::as_str);
            match (template, prefix) {
                (Some(template), Some(prefix)) => {
                    Ok(PatternEntry::template(kind, field, template, prefix, source))
                }
                _ => Err(Error::Validation(format!(
                    "template pattern for '{kind_name}.{field}' needs string 'template' and 'prefix'"
                ))),
            }
        }
        _ => Err(Error::Validation(format!(
            "pattern for '{kind_name}.{field}' must be a list of values or a template object"
        ))),
    }
}

fn parse_prefix_table(
    kind: ErrorKind,
    kind_name: &str,
    fields: &Map<String, Value>,
    source: PatternSource,
) -> Result<Vec<PatternEntry>> {
    let template = fields
        .get("pattern")
        .and_then(Value::as_str)
        .ok_or_else(|| Error::Validation(format!("'{kind_name}.pattern' must be a string")))?;
    let prefixes = fields
        .get("prefixes")
        .and_then(Value::as_object)
        .ok_or_else(|| Error::Validation(format!("'{kind_name}.prefixes' must be an object")))?;

    prefixes
        .iter()
        .map(|(field, prefix)| {
            let prefix = prefix.as_str().ok_or_else(|| {
                Error::Validation(format!("prefix for '{kind_name}.{field}' must be a string"))
            })?;
            Ok(PatternEntry::template(kind, field, template, prefix, source))
        })
        .collect()
}

fn parse_values(kind_name: &str, field: &str, items: &[Value]) -> Result<Vec<String>> {
    if items.is_empty() {
        return Err(Error::Validation(format!(
            "pattern values for '{kind_name}.{field}' must not be empty"
        )));
    }
    items
        .iter()
        .map(|item| match item {
            Value::String(s) => Ok(s.clone()),
            Value::Number(n) => Ok(n.to_string()),
            _ => Err(Error::Validation(format!(
                "pattern values for '{kind_name}.{field}' must be strings or numbers"
            ))),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::patterns::entry::PatternRule;

    #[test]
    fn test_defaults_cover_concrete_kinds() {
        let entries = default_entries();
        for kind in ErrorKind::CONCRETE {
            assert!(
                entries.iter().any(|e| e.kind == kind),
                "no default pattern for {kind}"
            );
        }
        assert!(entries.iter().all(|e| e.source == PatternSource::Default));
    }

    #[test]
    fn test_prefix_table_expands_per_field() {
        let entries = default_entries();
        let task = entries
            .iter()
            .find(|e| e.kind == ErrorKind::DuplicateIdentifier && e.field == "TaskID")
            .unwrap();
        assert_eq!(
            task.rule,
            PatternRule::Template {
                template: "{prefix}{timestamp}".into(),
                prefix: "T".into()
            }
        );
    }

    #[test]
    fn test_numbers_are_accepted_as_values() {
        let entries = parse_document(
            &json!({"out_of_range": {"Rating": [1, 2, 3]}}),
            PatternSource::Administrative,
        )
        .unwrap();
        assert_eq!(entries[0].candidates(), ["1", "2", "3"]);
    }

    #[test]
    fn test_malformed_documents_are_rejected() {
        let cases = [
            json!("not an object"),
            json!({"no_such_kind": ["a"]}),
            json!({"out_of_range": 5}),
            json!({"out_of_range": {"Rating": []}}),
            json!({"out_of_range": {"Rating": [{"nested": true}]}}),
            json!({"duplicate_ids": {"pattern": "{prefix}", "prefixes": {"TaskID": 1}}}),
            json!({"duplicate_identifier": {"OrderID": {"template": "{prefix}"}}}),
        ];
        for case in cases {
            assert!(
                matches!(
                    parse_document(&case, PatternSource::Administrative),
                    Err(Error::Validation(_))
                ),
                "accepted malformed document: {case}"
            );
        }
    }
}
