//! Tool Executor
//!
//! Dispatches model-requested tool calls against the bound data files and
//! wraps every outcome, success or failure, in a serialized envelope the
//! model can read. Failures here are data, not errors: the orchestration
//! loop always receives a well-formed `ToolCallResult` and keeps going.

use std::sync::Arc;

use serde_json::{json, Value};
use tracing::{debug, warn};

use tabqa_tools::{read_document, search_document, Table, ToolError};

use crate::binding::FileBinding;
use crate::registry;
use crate::types::{ToolCallRequest, ToolCallResult};

// ---------------------------------------------------------------------------
// Executor
// ---------------------------------------------------------------------------

/// Executes tool calls against a fixed file binding.
///
/// Stateless apart from the binding reference; one executor instance serves
/// a whole conversation and may be shared across tasks.
#[derive(Clone)]
pub struct ToolExecutor {
    binding: Arc<FileBinding>,
}

impl ToolExecutor {
    pub fn new(binding: Arc<FileBinding>) -> Self {
        Self { binding }
    }

    /// Execute one tool call and produce its result envelope.
    ///
    /// Dispatch is by exact name against the registry; arguments are
    /// validated against the declared schema before any file is opened.
    pub fn execute(&self, call: &ToolCallRequest) -> ToolCallResult {
        debug!(tool = %call.name, id = %call.id, "executing tool call");

        let envelope = match registry::find(&call.name) {
            None => {
                warn!(tool = %call.name, "model requested unknown tool");
                json!({ "success": false, "error": format!("Unknown tool: {}", call.name) })
            }
            Some(descriptor) => match descriptor.validate_args(&call.arguments) {
                Err(message) => json!({ "success": false, "error": message }),
                Ok(()) => self.dispatch(call),
            },
        };

        let is_error = envelope["success"] != json!(true);
        ToolCallResult {
            tool_call_id: call.id.clone(),
            content: envelope.to_string(),
            is_error,
        }
    }

    fn dispatch(&self, call: &ToolCallRequest) -> Value {
        match call.name.as_str() {
            "read_table" => self.read_table(&call.arguments),
            "query_table" => self.query_table(&call.arguments),
            "get_column_values" => self.get_column_values(&call.arguments),
            "read_document" => self.read_document(&call.arguments),
            "search_document" => self.search_document(&call.arguments),
            "list_available_files" => self.list_available_files(),
            // The registry and this match are maintained together; a
            // descriptor without a handler is a bug, not a model error.
            other => json!({
                "success": false,
                "error": format!("tool '{other}' has no handler"),
            }),
        }
    }

    // -----------------------------------------------------------------------
    // Handlers
    // -----------------------------------------------------------------------

    fn read_table(&self, args: &Value) -> Value {
        let file_path = str_arg(args, "file_path");
        let (path, file_path) = match self.resolve(file_path) {
            Ok(pair) => pair,
            Err(envelope) => return envelope,
        };

        let sheet = str_arg(args, "sheet_name");
        let max_rows = int_arg(args, "max_rows");

        match Table::load(&path, sheet, max_rows) {
            Ok(table) => {
                let column_types: Value = table
                    .column_types()
                    .into_iter()
                    .map(|(name, kind)| (name, json!(kind)))
                    .collect::<serde_json::Map<_, _>>()
                    .into();
                json!({
                    "success": true,
                    "file_path": file_path,
                    "sheet_name": table.sheet_name,
                    "all_sheets": table.all_sheets,
                    "num_rows": table.num_rows(),
                    "num_columns": table.num_columns(),
                    "columns": table.columns,
                    "column_types": column_types,
                    "sample_data": table.head_records(5),
                    "summary_stats": table.summary_stats(),
                })
            }
            Err(e) => tool_failure(&file_path, e),
        }
    }

    fn query_table(&self, args: &Value) -> Value {
        let (path, file_path) = match self.resolve(str_arg(args, "file_path")) {
            Ok(pair) => pair,
            Err(envelope) => return envelope,
        };
        let query = str_arg(args, "query").unwrap_or_default().to_string();
        let sheet = str_arg(args, "sheet_name");

        let table = match Table::load(&path, sheet, None) {
            Ok(table) => table,
            Err(e) => return tool_failure(&file_path, e),
        };

        match table.filter(&query) {
            Ok(indices) => {
                let results: Vec<Value> = indices
                    .iter()
                    .map(|&i| table.record_from_row(&table.rows[i]))
                    .collect();
                json!({
                    "success": true,
                    "file_path": file_path,
                    "sheet_name": table.sheet_name,
                    "query": query,
                    "num_results": results.len(),
                    "results": results,
                })
            }
            Err(e) => {
                let mut envelope = tool_failure(&file_path, e);
                envelope["query"] = json!(query);
                envelope
            }
        }
    }

    fn get_column_values(&self, args: &Value) -> Value {
        let (path, file_path) = match self.resolve(str_arg(args, "file_path")) {
            Ok(pair) => pair,
            Err(envelope) => return envelope,
        };
        let column = str_arg(args, "column_name").unwrap_or_default().to_string();
        let sheet = str_arg(args, "sheet_name");
        let unique = bool_arg(args, "unique").unwrap_or(false);

        let table = match Table::load(&path, sheet, None) {
            Ok(table) => table,
            Err(e) => return tool_failure(&file_path, e),
        };

        match table.column_values(&column, unique) {
            Ok(values) => {
                let rendered: Vec<Value> = values.iter().map(|c| c.to_json()).collect();
                json!({
                    "success": true,
                    "file_path": file_path,
                    "sheet_name": table.sheet_name,
                    "column_name": column,
                    "num_values": rendered.len(),
                    "values": rendered,
                })
            }
            Err(e) => tool_failure(&file_path, e),
        }
    }

    fn read_document(&self, args: &Value) -> Value {
        let (path, file_path) = match self.resolve(str_arg(args, "file_path")) {
            Ok(pair) => pair,
            Err(envelope) => return envelope,
        };

        match read_document(&path) {
            Ok(doc) => {
                let mut envelope = json!({
                    "success": true,
                    "file_path": file_path,
                    "data": doc.data,
                    "data_type": doc.data_type,
                });
                if let Some(keys) = doc.keys {
                    envelope["keys"] = json!(keys);
                }
                if let Some(n) = doc.num_items {
                    envelope["num_items"] = json!(n);
                }
                if let Some(keys) = doc.sample_keys {
                    envelope["sample_keys"] = json!(keys);
                }
                envelope
            }
            Err(e) => tool_failure(&file_path, e),
        }
    }

    fn search_document(&self, args: &Value) -> Value {
        let (path, file_path) = match self.resolve(str_arg(args, "file_path")) {
            Ok(pair) => pair,
            Err(envelope) => return envelope,
        };
        let key = str_arg(args, "search_key").unwrap_or_default().to_string();

        match search_document(&path, &key) {
            Ok(matches) => {
                let results: Vec<Value> = matches
                    .into_iter()
                    .map(|m| json!({ "path": m.path, "value": m.value }))
                    .collect();
                json!({
                    "success": true,
                    "file_path": file_path,
                    "search_key": key,
                    "num_occurrences": results.len(),
                    "results": results,
                })
            }
            Err(e) => tool_failure(&file_path, e),
        }
    }

    fn list_available_files(&self) -> Value {
        let files = self.binding.ids();
        json!({
            "success": true,
            "num_files": files.len(),
            "files": files,
        })
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    /// Resolve a `file_path` argument through the binding.
    ///
    /// Returns the local path and the identifier to echo in envelopes, or a
    /// ready-made failure envelope listing the bound files.
    fn resolve(
        &self,
        file_path: Option<&str>,
    ) -> std::result::Result<(std::path::PathBuf, String), Value> {
        let id = file_path.unwrap_or_default();
        match self.binding.resolve(id) {
            Some(path) => Ok((path.to_path_buf(), id.to_string())),
            None => Err(json!({
                "success": false,
                "error": format!("file '{id}' is not available"),
                "file_path": id,
                "available_files": self.binding.ids(),
            })),
        }
    }
}

/// Failure envelope for an underlying tool error, echoing the file path.
/// Missing-column errors additionally carry the actual column list.
fn tool_failure(file_path: &str, error: ToolError) -> Value {
    match error {
        ToolError::UnknownColumn { column, available } => json!({
            "success": false,
            "error": format!("Column '{column}' not found"),
            "file_path": file_path,
            "available_columns": available,
        }),
        other => json!({
            "success": false,
            "error": other.to_string(),
            "file_path": file_path,
        }),
    }
}

fn str_arg<'a>(args: &'a Value, name: &str) -> Option<&'a str> {
    args.get(name).and_then(|v| v.as_str())
}

fn int_arg(args: &Value, name: &str) -> Option<usize> {
    args.get(name).and_then(|v| v.as_u64()).map(|v| v as usize)
}

fn bool_arg(args: &Value, name: &str) -> Option<bool> {
    args.get(name).and_then(|v| v.as_bool())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
