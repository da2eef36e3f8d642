//! Tree node types and display labels.

use crate::format;
use crate::message::{MessageKind, Role};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

const LABEL_PREVIEW_CHARS: usize = 60;

/// One node of the conversation tree.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TreeNode {
    /// Deterministic id, unique within the tree
    pub id: String,
    pub parent_id: Option<String>,
    pub children: Vec<TreeNode>,
    pub expanded: bool,
    pub data: NodeData,
}

/// Variant payload of a [`TreeNode`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NodeData {
    Session(SessionNode),
    Message(MessageNode),
    ToolCall(ToolCallNode),
    Result(ResultNode),
    Text(TextNode),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionNode {
    pub session_id: Option<String>,
    pub title: Option<String>,
    /// Host-supplied metadata is still loading
    pub metadata_pending: bool,
    pub message_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MessageNode {
    pub kind: MessageKind,
    /// Raw `type` string; differs from `kind` for opaque records
    pub type_name: String,
    pub role: Option<Role>,
    pub uuid: Option<String>,
    pub timestamp: Option<DateTime<Utc>>,
    pub model: Option<String>,
    pub preview: String,
}

/// Lifecycle of a tool call as seen in the transcript so far.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolStatus {
    /// No result yet
    Pending,
    Completed,
    /// Result flagged `is_error`
    Failed,
}

impl ToolStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ToolStatus::Pending => "pending",
            ToolStatus::Completed => "completed",
            ToolStatus::Failed => "failed",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolCallNode {
    pub tool_use_id: String,
    pub tool_name: String,
    pub input: Value,
    pub status: ToolStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResultNode {
    pub tool_use_id: String,
    /// Known only when the invocation was found
    pub tool_name: Option<String>,
    pub content: String,
    pub is_error: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TextNode {
    pub text: String,
    pub thinking: bool,
}

impl TreeNode {
    pub(crate) fn new(id: String, parent_id: Option<String>, data: NodeData) -> Self {
        Self {
            id,
            parent_id,
            children: Vec::new(),
            expanded: false,
            data,
        }
    }

    pub fn kind_str(&self) -> &'static str {
        match &self.data {
            NodeData::Session(_) => "session",
            NodeData::Message(_) => "message",
            NodeData::ToolCall(_) => "tool_call",
            NodeData::Result(_) => "result",
            NodeData::Text(_) => "text",
        }
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    /// Depth-first search for `id`.
    pub fn find(&self, id: &str) -> Option<&TreeNode> {
        if self.id == id {
            return Some(self);
        }
        self.children.iter().find_map(|c| c.find(id))
    }

    pub fn find_mut(&mut self, id: &str) -> Option<&mut TreeNode> {
        if self.id == id {
            return Some(self);
        }
        self.children.iter_mut().find_map(|c| c.find_mut(id))
    }

    /// Pre-order traversal with depth (this node is depth 0).
    pub fn walk<F>(&self, f: &mut F)
    where
        F: FnMut(&TreeNode, usize),
    {
        self.walk_at(0, f);
    }

    fn walk_at<F>(&self, depth: usize, f: &mut F)
    where
        F: FnMut(&TreeNode, usize),
    {
        f(self, depth);
        for child in &self.children {
            child.walk_at(depth + 1, f);
        }
    }

    pub(crate) fn walk_mut<F>(&mut self, f: &mut F)
    where
        F: FnMut(&mut TreeNode),
    {
        f(self);
        for child in &mut self.children {
            child.walk_mut(f);
        }
    }

    /// One-line display label.
    pub fn label(&self) -> String {
        match &self.data {
            NodeData::Session(s) => {
                let mut label = format!("session {}", s.session_id.as_deref().unwrap_or("unknown"));
                if let Some(title) = &s.title {
                    label.push_str(": ");
                    label.push_str(&format::truncate_preview(title, LABEL_PREVIEW_CHARS));
                }
                if s.metadata_pending {
                    label.push_str(" (loading…)");
                }
                label
            }
            NodeData::Message(m) => {
                let tag = match m.role {
                    Some(role) => role.as_str(),
                    None => m.type_name.as_str(),
                };
                if m.preview.is_empty() {
                    format!("[{}]", tag)
                } else {
                    format!("[{}] {}", tag, m.preview)
                }
            }
            NodeData::ToolCall(t) => match tool_argument(&t.input) {
                Some(arg) => format!(
                    "{}({}) [{}]",
                    t.tool_name,
                    format::truncate_preview(arg, 40),
                    t.status.as_str()
                ),
                None => format!("{} [{}]", t.tool_name, t.status.as_str()),
            },
            NodeData::Result(r) => {
                let marker = if r.is_error { "✗" } else { "→" };
                let body = format::preview(&r.content, LABEL_PREVIEW_CHARS);
                if body.is_empty() {
                    format!("{} (no content)", marker)
                } else {
                    format!("{} {}", marker, body)
                }
            }
            NodeData::Text(t) => {
                let body = format::preview(&t.text, LABEL_PREVIEW_CHARS);
                if t.thinking {
                    format!("(thinking) {}", body)
                } else {
                    body
                }
            }
        }
    }
}

/// The most telling argument of a tool call, for labels.
fn tool_argument(input: &Value) -> Option<&str> {
    ["command", "file_path", "path", "pattern", "url", "query", "description"]
        .iter()
        .find_map(|key| input.get(*key).and_then(|v| v.as_str()))
        .map(format::first_line)
        .filter(|s| !s.is_empty())
}
