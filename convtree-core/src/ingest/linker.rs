//! Tool linker
//!
//! Builds an index from tool-use id to the invocation and to its result so a
//! result can be classified knowing which tool produced it, without
//! re-scanning the conversation.
//!
//! The index is rebuilt wholesale on every refresh rather than patched.

use crate::message::{Message, ToolResult, ToolUse};
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;

/// A tool invocation plus where it was found.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexedToolUse {
    pub tool_use: ToolUse,
    /// Position of the owning message in the indexed sequence
    pub message_index: usize,
    pub message_uuid: Option<String>,
}

/// A tool result plus where it was found.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexedToolResult {
    pub tool_result: ToolResult,
    pub message_index: usize,
    pub message_uuid: Option<String>,
}

/// A tool invocation composed with its result, ready for classification.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LinkedContext {
    pub tool_use_id: String,
    pub tool_name: String,
    pub input: Value,
    /// Compact JSON rendering of `input`
    pub input_content: String,
    /// Result content flattened to text
    pub result_content: String,
    pub is_error: bool,
}

/// A tool result whose invocation never appeared in the stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LinkMismatch {
    pub tool_use_id: String,
    pub message_index: usize,
    pub message_uuid: Option<String>,
}

impl std::fmt::Display for LinkMismatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "tool result {} (message #{}) has no matching tool use",
            self.tool_use_id, self.message_index
        )
    }
}

/// Index of tool invocations and results keyed by tool-use id.
#[derive(Debug, Clone, Default)]
pub struct ToolIndex {
    pub tool_uses: HashMap<String, IndexedToolUse>,
    pub tool_results: HashMap<String, IndexedToolResult>,
    /// Ids seen more than once (last write won)
    pub duplicate_ids: Vec<String>,
}

impl ToolIndex {
    pub fn tool_for(&self, tool_use_id: &str) -> Option<&ToolUse> {
        self.tool_uses.get(tool_use_id).map(|e| &e.tool_use)
    }

    pub fn result_for(&self, tool_use_id: &str) -> Option<&ToolResult> {
        self.tool_results.get(tool_use_id).map(|e| &e.tool_result)
    }

    /// Linked context for an id when both halves are present.
    pub fn linked(&self, tool_use_id: &str) -> Option<LinkedContext> {
        let tool_use = self.tool_for(tool_use_id)?;
        let tool_result = self.result_for(tool_use_id)?;
        Some(link(tool_use, tool_result))
    }

    /// Results with no matching invocation, in stream order.
    pub fn orphan_results(&self) -> Vec<LinkMismatch> {
        let mut orphans: Vec<LinkMismatch> = self
            .tool_results
            .iter()
            .filter(|(id, _)| !self.tool_uses.contains_key(*id))
            .map(|(id, entry)| LinkMismatch {
                tool_use_id: id.clone(),
                message_index: entry.message_index,
                message_uuid: entry.message_uuid.clone(),
            })
            .collect();
        orphans.sort_by(|a, b| {
            a.message_index
                .cmp(&b.message_index)
                .then_with(|| a.tool_use_id.cmp(&b.tool_use_id))
        });
        orphans
    }

    /// Invocations still waiting for a result, in stream order.
    pub fn pending_tool_uses(&self) -> Vec<&ToolUse> {
        let mut pending: Vec<&IndexedToolUse> = self
            .tool_uses
            .iter()
            .filter(|(id, _)| !self.tool_results.contains_key(*id))
            .map(|(_, entry)| entry)
            .collect();
        pending.sort_by(|a, b| {
            a.message_index
                .cmp(&b.message_index)
                .then_with(|| a.tool_use.id.cmp(&b.tool_use.id))
        });
        pending.into_iter().map(|e| &e.tool_use).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.tool_uses.is_empty() && self.tool_results.is_empty()
    }
}

/// Build the index in a single forward pass.
///
/// Assistant messages contribute `tool_use` blocks; user messages contribute
/// `tool_result` blocks. Duplicate ids are last-write-wins and logged.
pub fn build_index(messages: &[Message]) -> ToolIndex {
    let mut index = ToolIndex::default();

    for (message_index, message) in messages.iter().enumerate() {
        match message {
            Message::Assistant(_) => {
                for tool_use in message.tool_uses() {
                    let entry = IndexedToolUse {
                        tool_use: tool_use.clone(),
                        message_index,
                        message_uuid: message.uuid().map(String::from),
                    };
                    if index.tool_uses.insert(tool_use.id.clone(), entry).is_some() {
                        tracing::warn!(
                            tool_use_id = %tool_use.id,
                            message_index,
                            "Duplicate tool_use id; keeping the later invocation"
                        );
                        index.duplicate_ids.push(tool_use.id.clone());
                    }
                }
            }
            Message::User(_) => {
                for tool_result in message.tool_results() {
                    let entry = IndexedToolResult {
                        tool_result: tool_result.clone(),
                        message_index,
                        message_uuid: message.uuid().map(String::from),
                    };
                    if index
                        .tool_results
                        .insert(tool_result.tool_use_id.clone(), entry)
                        .is_some()
                    {
                        tracing::warn!(
                            tool_use_id = %tool_result.tool_use_id,
                            message_index,
                            "Duplicate tool_result id; keeping the later result"
                        );
                        index.duplicate_ids.push(tool_result.tool_use_id.clone());
                    }
                }
            }
            Message::System(_) | Message::Summary(_) | Message::Result(_) | Message::Other(_) => {}
        }
    }

    tracing::debug!(
        tool_uses = index.tool_uses.len(),
        tool_results = index.tool_results.len(),
        "Built tool index"
    );

    index
}

/// Compose an invocation with its result.
pub fn link(tool_use: &ToolUse, tool_result: &ToolResult) -> LinkedContext {
    LinkedContext {
        tool_use_id: tool_use.id.clone(),
        tool_name: tool_use.name.clone(),
        input: tool_use.input.clone(),
        input_content: tool_use.input_json(),
        result_content: tool_result.content_text(),
        is_error: tool_result.is_error,
    }
}
