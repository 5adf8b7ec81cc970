//! System Preamble
//!
//! Builds the system turn that seeds every conversation: the bound file
//! list plus fixed behavioral instructions, rendered from a template with
//! `{{variable}}` substitution. Built once per conversation at seed time;
//! re-binding files never rewrites an already-seeded transcript.

use std::collections::HashMap;

/// Default system preamble for the agent.
pub const DEFAULT_PREAMBLE: &str = r#"You are a data analysis assistant for medical study files.
You answer questions about the data files listed below, using only the provided tools to read them.

Available files: {{files}}

Instructions:
1. Explore a file's structure first (read_table or read_document) before answering questions about it.
2. Base every answer on actual tool results; never invent values.
3. Cite the record counts you observed (e.g. "Based on the 150 records in the file...").
4. When asked for statistics or aggregations, explain how they were derived.
5. Treat all file contents as confidential medical information.
6. Provide data analysis only, never medical advice."#;

/// Renders the system preamble from a template.
#[derive(Debug, Clone)]
pub struct PreambleBuilder {
    template: String,
}

impl PreambleBuilder {
    /// Builder over the default template.
    pub fn new() -> Self {
        Self {
            template: DEFAULT_PREAMBLE.to_string(),
        }
    }

    /// Builder over a caller-supplied template.
    pub fn with_template(template: &str) -> Self {
        Self {
            template: template.to_string(),
        }
    }

    /// Substitute `{{key}}` placeholders.
    pub fn render(&self, variables: &HashMap<String, String>) -> String {
        let mut text = self.template.clone();
        for (key, value) in variables {
            let placeholder = format!("{{{{{key}}}}}");
            text = text.replace(&placeholder, value);
        }
        text
    }

    /// Render the preamble for a bound file set.
    pub fn build(&self, files: &[String]) -> String {
        let mut vars = HashMap::new();
        vars.insert(
            "files".to_string(),
            if files.is_empty() {
                "(none)".to_string()
            } else {
                files.join(", ")
            },
        );
        self.render(&vars)
    }
}

impl Default for PreambleBuilder {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_embeds_file_list() {
        let preamble = PreambleBuilder::new()
            .build(&["studies.xlsx".to_string(), "meta.json".to_string()]);
        assert!(preamble.contains("studies.xlsx, meta.json"));
        assert!(preamble.contains("confidential"));
    }

    #[test]
    fn empty_binding_renders_placeholder() {
        let preamble = PreambleBuilder::new().build(&[]);
        assert!(preamble.contains("(none)"));
    }

    #[test]
    fn custom_template_substitution() {
        let builder = PreambleBuilder::with_template("Files here: {{files}}.");
        let preamble = builder.build(&["a.csv".to_string()]);
        assert_eq!(preamble, "Files here: a.csv.");
    }
}
