//! Structured Documents
//!
//! JSON file reading with shallow introspection, and recursive key search
//! producing dotted/bracketed paths (`a.b.key`, `list[0].key`).

use std::path::Path;

use serde_json::Value;

use crate::ToolError;

/// A parsed document plus shallow structure info.
#[derive(Debug, Clone)]
pub struct DocumentInfo {
    pub data: Value,
    /// JSON type of the root: object, array, string, number, boolean, null.
    pub data_type: &'static str,
    /// Top-level keys when the root is an object.
    pub keys: Option<Vec<String>>,
    /// Item count when the root is an array.
    pub num_items: Option<usize>,
    /// Keys of the first element when the root is an array of objects.
    pub sample_keys: Option<Vec<String>>,
}

/// One occurrence of a searched key.
#[derive(Debug, Clone, PartialEq)]
pub struct KeyMatch {
    pub path: String,
    pub value: Value,
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Object(_) => "object",
        Value::Array(_) => "array",
        Value::String(_) => "string",
        Value::Number(_) => "number",
        Value::Bool(_) => "boolean",
        Value::Null => "null",
    }
}

fn load(path: &Path) -> Result<Value, ToolError> {
    let text = std::fs::read_to_string(path).map_err(|e| ToolError::io(path, e))?;
    serde_json::from_str(&text).map_err(|e| ToolError::parse(path, e.to_string()))
}

/// Read a JSON document and describe its top-level structure.
pub fn read_document(path: &Path) -> Result<DocumentInfo, ToolError> {
    let data = load(path)?;

    let mut keys = None;
    let mut num_items = None;
    let mut sample_keys = None;
    match &data {
        Value::Object(map) => {
            keys = Some(map.keys().cloned().collect());
        }
        Value::Array(items) => {
            num_items = Some(items.len());
            if let Some(Value::Object(first)) = items.first() {
                sample_keys = Some(first.keys().cloned().collect());
            }
        }
        _ => {}
    }

    Ok(DocumentInfo {
        data_type: json_type_name(&data),
        data,
        keys,
        num_items,
        sample_keys,
    })
}

/// Find every occurrence of `key` at any nesting depth.
///
/// Mapping keys extend the path with a dot, sequence elements with a
/// bracketed index. Matches are returned in traversal order, parents before
/// their children.
pub fn search_document(path: &Path, key: &str) -> Result<Vec<KeyMatch>, ToolError> {
    let data = load(path)?;
    let mut matches = Vec::new();
    find_key(&data, key, "", &mut matches);
    Ok(matches)
}

fn find_key(value: &Value, key: &str, path: &str, out: &mut Vec<KeyMatch>) {
    match value {
        Value::Object(map) => {
            for (k, v) in map {
                let child = if path.is_empty() {
                    k.clone()
                } else {
                    format!("{path}.{k}")
                };
                if k == key {
                    out.push(KeyMatch {
                        path: child.clone(),
                        value: v.clone(),
                    });
                }
                find_key(v, key, &child, out);
            }
        }
        Value::Array(items) => {
            for (i, item) in items.iter().enumerate() {
                find_key(item, key, &format!("{path}[{i}]"), out);
            }
        }
        _ => {}
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
