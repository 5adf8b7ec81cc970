//! Conversation Transcript
//!
//! Ordered turn store owned by the agent. Enforces the seeding invariant
//! (one system turn, always first) and provides the append operations the
//! orchestration loop uses. Conversations are short-lived, so there is no
//! compaction; `clear()` starts over.

use crate::types::{Message, MessageContent, Role, ToolCallRequest, ToolCallResult};

/// The ordered conversation transcript.
#[derive(Debug, Default)]
pub struct Transcript {
    messages: Vec<Message>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the transcript has been seeded with a system preamble.
    pub fn is_seeded(&self) -> bool {
        matches!(
            self.messages.first(),
            Some(Message {
                role: Role::System,
                ..
            })
        )
    }

    /// Seed the conversation: system preamble first, then the user turn.
    ///
    /// Only valid on an empty transcript; the preamble is built once per
    /// conversation and never rebuilt mid-flight.
    pub fn seed(&mut self, preamble: &str, question: &str) {
        debug_assert!(self.messages.is_empty(), "seed on a non-empty transcript");
        self.messages.push(Message::system(preamble));
        self.messages.push(Message::user(question));
    }

    pub fn push_user(&mut self, text: &str) {
        self.messages.push(Message::user(text));
    }

    pub fn push_assistant_text(&mut self, text: &str) {
        self.messages.push(Message::assistant(text));
    }

    pub fn push_tool_calls(&mut self, calls: Vec<ToolCallRequest>) {
        self.messages.push(Message::tool_calls(calls));
    }

    /// Append tool results, one turn per result, in the order given.
    pub fn push_tool_results(&mut self, results: Vec<ToolCallResult>) {
        for result in results {
            self.messages.push(Message::tool_result(result));
        }
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn message_count(&self) -> usize {
        self.messages.len()
    }

    /// Drop every turn. Usage counters live elsewhere and are not touched.
    pub fn clear(&mut self) {
        self.messages.clear();
    }

    /// The role sequence of the transcript, for structural assertions.
    pub fn roles(&self) -> Vec<Role> {
        self.messages.iter().map(|m| m.role).collect()
    }

    /// Ids of tool calls in the last assistant tool-call turn that have no
    /// matching tool-result turn yet. Empty when the transcript is balanced
    /// and ready for the next provider call.
    pub fn unanswered_tool_calls(&self) -> Vec<String> {
        let mut pending: Vec<String> = Vec::new();
        for message in &self.messages {
            match &message.content {
                MessageContent::ToolCalls(calls) => {
                    pending = calls.iter().map(|c| c.id.clone()).collect();
                }
                MessageContent::ToolResult(result) => {
                    pending.retain(|id| id != &result.tool_call_id);
                }
                MessageContent::Text(_) => {}
            }
        }
        pending
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn seed_puts_system_first() {
        let mut transcript = Transcript::new();
        assert!(!transcript.is_seeded());

        transcript.seed("preamble", "question");
        assert!(transcript.is_seeded());
        assert_eq!(transcript.roles(), vec![Role::System, Role::User]);
    }

    #[test]
    fn clear_resets_structure() {
        let mut transcript = Transcript::new();
        transcript.seed("preamble", "question");
        transcript.push_assistant_text("answer");
        transcript.clear();

        assert_eq!(transcript.message_count(), 0);
        assert!(!transcript.is_seeded());
    }

    #[test]
    fn tool_calls_are_tracked_until_answered() {
        let mut transcript = Transcript::new();
        transcript.seed("p", "q");
        transcript.push_tool_calls(vec![
            ToolCallRequest {
                id: "call_1".into(),
                name: "read_table".into(),
                arguments: json!({}),
            },
            ToolCallRequest {
                id: "call_2".into(),
                name: "list_available_files".into(),
                arguments: json!({}),
            },
        ]);
        assert_eq!(transcript.unanswered_tool_calls(), vec!["call_1", "call_2"]);

        transcript.push_tool_results(vec![ToolCallResult {
            tool_call_id: "call_1".into(),
            content: "{}".into(),
            is_error: false,
        }]);
        assert_eq!(transcript.unanswered_tool_calls(), vec!["call_2"]);

        transcript.push_tool_results(vec![ToolCallResult {
            tool_call_id: "call_2".into(),
            content: "{}".into(),
            is_error: false,
        }]);
        assert!(transcript.unanswered_tool_calls().is_empty());
    }
}
