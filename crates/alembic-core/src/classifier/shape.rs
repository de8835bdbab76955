use regex::Regex;
use serde_json::Value;
use std::sync::LazyLock;

#[allow(clippy::expect_used)]
static RE_RANGE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*-?\d+(\.\d+)?\s*-\s*-?\d+(\.\d+)?\s*$").expect("valid regex"));
#[allow(clippy::expect_used)]
static RE_LIST_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_.]+$").expect("valid regex"));
#[allow(clippy::expect_used)]
static RE_NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"-?\d+(\.\d+)?").expect("valid regex"));

/// Object-like text (`{...`, `...}` or `"key": value`)
pub fn looks_structured(text: &str) -> bool {
    let t = text.trim();
    t.starts_with('{') || t.ends_with('}') || (t.contains("\":") && t.contains('"'))
}

/// Text parses as a JSON object or array
pub fn parses_as_json(text: &str) -> bool {
    matches!(
        serde_json::from_str::<Value>(text.trim()),
        Ok(Value::Object(_)) | Ok(Value::Array(_))
    )
}

/// Text that is trying to be a list: brackets or delimiters
pub fn looks_like_list(text: &str) -> bool {
    let t = text.trim();
    t.starts_with('[') || t.ends_with(']') || t.contains(',') || t.contains(';') || t.contains('|')
}

/// Accepted list forms: JSON array of scalars, `a,b,c`, `1-3`, or one token
pub fn is_well_formed_list(text: &str) -> bool {
    let t = text.trim();
    if t.is_empty() {
        return false;
    }
    if t.starts_with('[') || t.ends_with(']') {
        return match serde_json::from_str::<Value>(t) {
            Ok(Value::Array(items)) => items
                .iter()
                .all(|v| matches!(v, Value::Number(_) | Value::String(_))),
            _ => false,
        };
    }
    if RE_RANGE.is_match(t) {
        return true;
    }
    t.split(',')
        .map(str::trim)
        .all(|token| RE_LIST_TOKEN.is_match(token))
}

/// Numbers appearing in the text, in order
pub fn extract_numbers(text: &str) -> Vec<String> {
    RE_NUMBER
        .find_iter(text)
        .map(|m| m.as_str().to_string())
        .collect()
}

/// Rebuild a list from whatever delimiters were used.
///
/// Numeric items come back as a JSON array (`[1,2,3]`), anything else as
/// comma-separated text (`T001,T002`).
pub fn normalize_list(text: &str) -> Option<String> {
    let items: Vec<&str> = text
        .split(|c: char| matches!(c, '[' | ']' | ',' | ';' | '|') || c.is_whitespace())
        .map(|item| item.trim_matches(|c: char| c == '"' || c == '\''))
        .filter(|item| !item.is_empty())
        .collect();
    if items.is_empty() {
        return None;
    }
    if items.iter().all(|item| item.parse::<f64>().is_ok()) {
        Some(format!("[{}]", items.join(",")))
    } else {
        Some(items.join(","))
    }
}

/// Best-effort repair of almost-JSON text.
///
/// Handles single quotes, unquoted keys and bare word values, trailing
/// commas and missing closing braces. Returns compact JSON when the
/// repaired text parses as an object.
pub fn repair_json(text: &str) -> Option<String> {
    #[allow(clippy::expect_used)]
    static RE_BARE_KEY: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r#"([{,]\s*)([A-Za-z_][A-Za-z0-9_]*)\s*:"#).expect("valid regex")
    });
    #[allow(clippy::expect_used)]
    static RE_BARE_VALUE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r#"(:\s*)([A-Za-z_][A-Za-z0-9_ ]*?)(\s*[,}])"#).expect("valid regex")
    });
    #[allow(clippy::expect_used)]
    static RE_TRAILING_COMMA: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r",\s*([}\]])").expect("valid regex"));

    let mut fixed = text.trim().replace('\'', "\"");
    if fixed.is_empty() {
        return None;
    }
    if !fixed.starts_with('{') {
        fixed.insert(0, '{');
    }
    let opens = fixed.matches('{').count();
    let closes = fixed.matches('}').count();
    if opens > closes {
        fixed.push_str(&"}".repeat(opens - closes));
    }

    let fixed = RE_BARE_KEY.replace_all(&fixed, "$1\"$2\":");
    let fixed = RE_BARE_VALUE.replace_all(&fixed, |caps: &regex::Captures<'_>| {
        let word = caps[2].trim();
        if matches!(word, "true" | "false" | "null") {
            format!("{}{}{}", &caps[1], word, &caps[3])
        } else {
            format!("{}\"{}\"{}", &caps[1], word, &caps[3])
        }
    });
    let fixed = RE_TRAILING_COMMA.replace_all(&fixed, "$1");

    match serde_json::from_str::<Value>(&fixed) {
        Ok(value @ Value::Object(_)) => serde_json::to_string(&value).ok(),
        _ => None,
    }
}
