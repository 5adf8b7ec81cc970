//! Tool Registry
//!
//! The fixed catalog of operations the model may invoke, with their declared
//! input schemas. `descriptors()` is pure and deterministic: same order,
//! same schemas, every call. The executor validates arguments against these
//! declarations before anything touches a file.

use serde_json::{json, Value};

use crate::types::ToolDefinition;

// ---------------------------------------------------------------------------
// Descriptors
// ---------------------------------------------------------------------------

/// One declared parameter of a tool.
#[derive(Debug, Clone, Copy)]
pub struct ParamSpec {
    pub name: &'static str,
    /// JSON Schema type: "string", "integer", or "boolean".
    pub kind: &'static str,
    pub required: bool,
    pub description: &'static str,
}

/// A tool's declared contract.
#[derive(Debug, Clone, Copy)]
pub struct ToolDescriptor {
    pub name: &'static str,
    pub description: &'static str,
    pub params: &'static [ParamSpec],
}

const FILE_PATH: ParamSpec = ParamSpec {
    name: "file_path",
    kind: "string",
    required: true,
    description: "Identifier of the file, as listed by list_available_files",
};

const SHEET_NAME: ParamSpec = ParamSpec {
    name: "sheet_name",
    kind: "string",
    required: false,
    description: "Worksheet to read (Excel only; first sheet if omitted)",
};

/// The declared tool set, in the order it is advertised to the model.
const TOOLS: &[ToolDescriptor] = &[
    ToolDescriptor {
        name: "read_table",
        description: "Read a tabular file (CSV or Excel) and get its structure: \
                      row and column counts, column names and types, a sample of \
                      the first rows, and summary statistics for numeric columns",
        params: &[
            FILE_PATH,
            SHEET_NAME,
            ParamSpec {
                name: "max_rows",
                kind: "integer",
                required: false,
                description: "Maximum number of rows to read",
            },
        ],
    },
    ToolDescriptor {
        name: "query_table",
        description: "Filter a tabular file with a boolean expression over its \
                      columns, e.g. age > 25 and city == \"New York\". Returns \
                      the matching rows and their count",
        params: &[
            FILE_PATH,
            ParamSpec {
                name: "query",
                kind: "string",
                required: true,
                description: "Boolean filter expression using column names, \
                              comparison operators, and/or/not",
            },
            SHEET_NAME,
        ],
    },
    ToolDescriptor {
        name: "get_column_values",
        description: "Get all values from one column of a tabular file",
        params: &[
            FILE_PATH,
            ParamSpec {
                name: "column_name",
                kind: "string",
                required: true,
                description: "Name of the column",
            },
            SHEET_NAME,
            ParamSpec {
                name: "unique",
                kind: "boolean",
                required: false,
                description: "Return only distinct values (default false)",
            },
        ],
    },
    ToolDescriptor {
        name: "read_document",
        description: "Read a JSON file and get its content and top-level structure",
        params: &[FILE_PATH],
    },
    ToolDescriptor {
        name: "search_document",
        description: "Find every occurrence of a key at any nesting depth in a \
                      JSON file, with the path to each occurrence",
        params: &[
            FILE_PATH,
            ParamSpec {
                name: "search_key",
                kind: "string",
                required: true,
                description: "Key to search for",
            },
        ],
    },
    ToolDescriptor {
        name: "list_available_files",
        description: "List the data files currently available to the other tools",
        params: &[],
    },
];

/// All tool descriptors, in advertised order.
pub fn descriptors() -> &'static [ToolDescriptor] {
    TOOLS
}

/// Look up a descriptor by exact name.
pub fn find(name: &str) -> Option<&'static ToolDescriptor> {
    TOOLS.iter().find(|t| t.name == name)
}

/// Render every descriptor into the provider-facing definition format.
pub fn definitions() -> Vec<ToolDefinition> {
    TOOLS.iter().map(|t| t.definition()).collect()
}

impl ToolDescriptor {
    /// JSON Schema rendering of this tool's parameters.
    pub fn definition(&self) -> ToolDefinition {
        let mut properties = serde_json::Map::new();
        let mut required = Vec::new();
        for param in self.params {
            properties.insert(
                param.name.to_string(),
                json!({ "type": param.kind, "description": param.description }),
            );
            if param.required {
                required.push(param.name);
            }
        }

        ToolDefinition {
            name: self.name.to_string(),
            description: self.description.to_string(),
            parameters: json!({
                "type": "object",
                "properties": properties,
                "required": required,
            }),
        }
    }

    /// Validate an argument object against the declared parameters.
    ///
    /// Rejects missing required parameters, undeclared parameters, and
    /// values of the wrong JSON type, before any file is touched.
    pub fn validate_args(&self, args: &Value) -> std::result::Result<(), String> {
        let obj = match args {
            Value::Object(map) => map,
            Value::Null => {
                return if self.params.iter().any(|p| p.required) {
                    Err(format!("tool '{}' requires arguments", self.name))
                } else {
                    Ok(())
                };
            }
            _ => return Err(format!("arguments for '{}' must be an object", self.name)),
        };

        for param in self.params.iter().filter(|p| p.required) {
            if !obj.contains_key(param.name) {
                return Err(format!(
                    "missing required parameter '{}' for tool '{}'",
                    param.name, self.name
                ));
            }
        }

        for (key, value) in obj {
            let Some(param) = self.params.iter().find(|p| p.name == key) else {
                return Err(format!(
                    "unknown parameter '{}' for tool '{}'",
                    key, self.name
                ));
            };
            // Absent optional values arrive as null from some models.
            if value.is_null() && !param.required {
                continue;
            }
            let ok = match param.kind {
                "string" => value.is_string(),
                "integer" => value.is_i64() || value.is_u64(),
                "boolean" => value.is_boolean(),
                _ => true,
            };
            if !ok {
                return Err(format!(
                    "parameter '{}' of tool '{}' must be a {}",
                    key, self.name, param.kind
                ));
            }
        }

        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
