use std::collections::BTreeSet;

use serde_json::Value;

use crate::catalog::Catalog;

/// Parse the persisted favorites representation.
///
/// Anything that is not a JSON array of strings degrades to the empty list:
/// a malformed value left by an earlier run must never stop the portal.
pub fn parse_stored(raw: Option<&str>) -> Vec<String> {
    let Some(raw) = raw else {
        return Vec::new();
    };

    match serde_json::from_str::<Value>(raw) {
        Ok(Value::Array(items)) => items
            .into_iter()
            .filter_map(|item| match item {
                Value::String(s) => Some(s),
                _ => None,
            })
            .collect(),
        Ok(other) => {
            tracing::warn!(kind = value_kind(&other), "stored favorites are not an array; discarding");
            Vec::new()
        }
        Err(err) => {
            tracing::warn!(error = %err, "stored favorites are not valid JSON; discarding");
            Vec::new()
        }
    }
}

/// Translate raw entries into a de-duplicated set of canonical catalog paths.
///
/// Legacy keys and name slugs are mapped through the catalog; entries with no
/// mapping are dropped. Applying this to its own output changes nothing.
pub fn normalize<I, S>(raw: I, catalog: &Catalog) -> BTreeSet<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    raw.into_iter()
        .filter_map(|entry| catalog.canonical_path(entry.as_ref()).map(str::to_string))
        .collect()
}

/// Storage representation of a favorites set
pub fn serialize(favorites: &BTreeSet<String>) -> String {
    // A BTreeSet of strings always serializes
    serde_json::to_string(favorites).unwrap_or_else(|_| "[]".to_string())
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
