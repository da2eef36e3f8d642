//! Typed message model for Claude transcripts
//!
//! Every JSONL record becomes one [`Message`]. The enum is closed over the
//! record types the Claude CLI emits (`system`, `user`, `assistant`,
//! `summary`, `result`); anything else is carried as [`Message::Other`] so
//! newer CLI versions never fail to load.
//!
//! ## Lossless capture
//!
//! Each variant keeps the complete decoded record in `raw`, so fields this
//! crate does not model are still available to consumers.
//!
//! ## Field spelling
//!
//! Claude Code transcripts use camelCase envelope fields (`parentUuid`,
//! `sessionId`, `gitBranch`) while `--output-format stream-json` uses
//! snake_case. Both are accepted.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

// ============================================
// Kinds and roles
// ============================================

/// Discriminant of a [`Message`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    System,
    User,
    Assistant,
    Summary,
    Result,
    /// A well-formed record with a `type` this crate does not model
    Other,
}

impl MessageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageKind::System => "system",
            MessageKind::User => "user",
            MessageKind::Assistant => "assistant",
            MessageKind::Summary => "summary",
            MessageKind::Result => "result",
            MessageKind::Other => "other",
        }
    }

    /// Map a record `type` string to a kind. Unknown strings map to `Other`.
    pub fn from_type(record_type: &str) -> Self {
        match record_type {
            "system" => MessageKind::System,
            "user" => MessageKind::User,
            "assistant" => MessageKind::Assistant,
            "summary" => MessageKind::Summary,
            "result" => MessageKind::Result,
            _ => MessageKind::Other,
        }
    }
}

impl std::fmt::Display for MessageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Conversational role of a message's author.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
    System,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::System => "system",
        }
    }
}

// ============================================
// Envelope (fields shared by every record)
// ============================================

/// Fields common to every transcript record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Envelope {
    /// Record discriminant, always non-empty on a parsed message
    #[serde(rename = "type")]
    pub record_type: String,
    pub uuid: Option<String>,
    #[serde(alias = "parentUuid")]
    pub parent_uuid: Option<String>,
    #[serde(alias = "sessionId")]
    pub session_id: Option<String>,
    pub cwd: Option<String>,
    #[serde(alias = "gitBranch")]
    pub git_branch: Option<String>,
    pub version: Option<String>,
    pub timestamp: Option<String>,
    #[serde(alias = "isSidechain")]
    pub is_sidechain: Option<bool>,
}

impl Envelope {
    /// Parse `timestamp` as RFC 3339.
    pub fn timestamp_utc(&self) -> Option<DateTime<Utc>> {
        self.timestamp
            .as_deref()
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|dt| dt.with_timezone(&Utc))
    }
}

// ============================================
// Content blocks
// ============================================

/// A tool invocation requested by the assistant.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ToolUse {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub input: Value,
}

impl ToolUse {
    /// Compact JSON rendering of the input.
    pub fn input_json(&self) -> String {
        serde_json::to_string(&self.input).unwrap_or_default()
    }

    /// The file path argument, for tools that take one.
    pub fn input_path(&self) -> Option<&str> {
        ["file_path", "filePath", "path", "notebook_path"]
            .iter()
            .find_map(|key| self.input.get(*key).and_then(|v| v.as_str()))
    }
}

/// The output of a tool invocation, linked back by `tool_use_id`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    #[serde(default)]
    pub tool_use_id: String,
    /// Either a string or an array of content blocks
    #[serde(default)]
    pub content: Value,
    #[serde(default, deserialize_with = "lenient_bool")]
    pub is_error: bool,
}

impl ToolResult {
    /// Flatten `content` to display text.
    ///
    /// Arrays of blocks are joined with newlines; image blocks become a
    /// `[image]` marker.
    pub fn content_text(&self) -> String {
        match &self.content {
            Value::Null => String::new(),
            Value::String(s) => s.clone(),
            Value::Array(items) => items
                .iter()
                .map(|item| match item.get("type").and_then(|t| t.as_str()) {
                    Some("text") => item
                        .get("text")
                        .and_then(|t| t.as_str())
                        .unwrap_or_default()
                        .to_string(),
                    Some("image") => "[image]".to_string(),
                    _ => match item {
                        Value::String(s) => s.clone(),
                        other => other.to_string(),
                    },
                })
                .collect::<Vec<_>>()
                .join("\n"),
            other => other.to_string(),
        }
    }

    pub fn has_content(&self) -> bool {
        match &self.content {
            Value::Null => false,
            Value::String(s) => !s.is_empty(),
            Value::Array(items) => !items.is_empty(),
            _ => true,
        }
    }
}

/// One entry of a message's `content` array.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    Text {
        #[serde(default)]
        text: String,
    },
    ToolUse(ToolUse),
    ToolResult(ToolResult),
    Thinking {
        #[serde(default)]
        thinking: String,
    },
    Image {
        #[serde(default)]
        source: Value,
    },
    // Catch-all for block types we don't model
    #[serde(other)]
    Unknown,
}

impl ContentBlock {
    pub fn kind_str(&self) -> &'static str {
        match self {
            ContentBlock::Text { .. } => "text",
            ContentBlock::ToolUse(_) => "tool_use",
            ContentBlock::ToolResult(_) => "tool_result",
            ContentBlock::Thinking { .. } => "thinking",
            ContentBlock::Image { .. } => "image",
            ContentBlock::Unknown => "unknown",
        }
    }
}

/// `message.content`: a bare string or an ordered list of blocks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Blocks(Vec<ContentBlock>),
}

impl Default for MessageContent {
    fn default() -> Self {
        MessageContent::Text(String::new())
    }
}

impl MessageContent {
    /// Content blocks; a bare string has none.
    pub fn blocks(&self) -> &[ContentBlock] {
        match self {
            MessageContent::Text(_) => &[],
            MessageContent::Blocks(blocks) => blocks,
        }
    }

    /// Convert into a block list; a non-empty bare string becomes one text block.
    pub fn into_blocks(self) -> Vec<ContentBlock> {
        match self {
            MessageContent::Text(text) if text.is_empty() => Vec::new(),
            MessageContent::Text(text) => vec![ContentBlock::Text { text }],
            MessageContent::Blocks(blocks) => blocks,
        }
    }

    /// Append `other` after the current content, preserving order.
    pub fn append(&mut self, other: MessageContent) {
        let mut blocks = std::mem::take(self).into_blocks();
        blocks.extend(other.into_blocks());
        *self = MessageContent::Blocks(blocks);
    }

    /// Text of the bare string or of all text blocks, newline-joined.
    pub fn text(&self) -> String {
        match self {
            MessageContent::Text(text) => text.clone(),
            MessageContent::Blocks(blocks) => blocks
                .iter()
                .filter_map(|b| match b {
                    ContentBlock::Text { text } => Some(text.as_str()),
                    _ => None,
                })
                .collect::<Vec<_>>()
                .join("\n"),
        }
    }
}

// ============================================
// Message variants
// ============================================

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct SystemMessage {
    #[serde(skip)]
    pub envelope: Envelope,
    pub subtype: Option<String>,
    pub content: Option<String>,
    pub level: Option<String>,
    #[serde(alias = "toolUseID", alias = "toolUseId")]
    pub tool_use_id: Option<String>,
    /// Present on stream-json `init` records
    pub model: Option<String>,
    /// Present on stream-json `init` records
    pub tools: Vec<String>,
    #[serde(skip)]
    pub raw: Value,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct UserBody {
    pub role: Option<String>,
    pub content: MessageContent,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct UserMessage {
    #[serde(skip)]
    pub envelope: Envelope,
    pub message: UserBody,
    #[serde(skip)]
    pub raw: Value,
}

/// Token usage reported on assistant messages.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Usage {
    pub input_tokens: Option<u64>,
    pub output_tokens: Option<u64>,
    pub cache_creation_input_tokens: Option<u64>,
    pub cache_read_input_tokens: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct AssistantBody {
    /// Stream identifier shared by every chunk of one assistant turn
    pub id: Option<String>,
    pub model: Option<String>,
    pub role: Option<String>,
    pub content: MessageContent,
    pub stop_reason: Option<String>,
    pub usage: Option<Usage>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct AssistantMessage {
    #[serde(skip)]
    pub envelope: Envelope,
    pub message: AssistantBody,
    #[serde(skip)]
    pub raw: Value,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct SummaryMessage {
    #[serde(skip)]
    pub envelope: Envelope,
    pub summary: String,
    #[serde(alias = "leafUuid")]
    pub leaf_uuid: Option<String>,
    #[serde(skip)]
    pub raw: Value,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct ResultMessage {
    #[serde(skip)]
    pub envelope: Envelope,
    pub subtype: Option<String>,
    pub total_cost_usd: Option<f64>,
    pub duration_ms: Option<u64>,
    pub duration_api_ms: Option<u64>,
    pub num_turns: Option<u32>,
    pub is_error: Option<bool>,
    pub result: Option<String>,
    #[serde(skip)]
    pub raw: Value,
}

/// A record whose `type` is not one of the modelled kinds.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OpaqueMessage {
    pub envelope: Envelope,
    pub raw: Value,
}

/// One logical transcript message.
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    System(SystemMessage),
    User(UserMessage),
    Assistant(AssistantMessage),
    Summary(SummaryMessage),
    Result(ResultMessage),
    Other(OpaqueMessage),
}

impl Message {
    pub fn kind(&self) -> MessageKind {
        match self {
            Message::System(_) => MessageKind::System,
            Message::User(_) => MessageKind::User,
            Message::Assistant(_) => MessageKind::Assistant,
            Message::Summary(_) => MessageKind::Summary,
            Message::Result(_) => MessageKind::Result,
            Message::Other(_) => MessageKind::Other,
        }
    }

    pub fn envelope(&self) -> &Envelope {
        match self {
            Message::System(m) => &m.envelope,
            Message::User(m) => &m.envelope,
            Message::Assistant(m) => &m.envelope,
            Message::Summary(m) => &m.envelope,
            Message::Result(m) => &m.envelope,
            Message::Other(m) => &m.envelope,
        }
    }

    /// The raw `type` string as it appeared in the record.
    pub fn type_name(&self) -> &str {
        &self.envelope().record_type
    }

    pub fn uuid(&self) -> Option<&str> {
        self.envelope().uuid.as_deref()
    }

    pub fn parent_uuid(&self) -> Option<&str> {
        self.envelope().parent_uuid.as_deref()
    }

    pub fn session_id(&self) -> Option<&str> {
        self.envelope().session_id.as_deref()
    }

    pub fn timestamp_utc(&self) -> Option<DateTime<Utc>> {
        self.envelope().timestamp_utc()
    }

    /// Complete decoded record.
    pub fn raw(&self) -> &Value {
        match self {
            Message::System(m) => &m.raw,
            Message::User(m) => &m.raw,
            Message::Assistant(m) => &m.raw,
            Message::Summary(m) => &m.raw,
            Message::Result(m) => &m.raw,
            Message::Other(m) => &m.raw,
        }
    }

    pub fn role(&self) -> Option<Role> {
        match self {
            Message::System(_) => Some(Role::System),
            Message::User(_) => Some(Role::User),
            Message::Assistant(_) => Some(Role::Assistant),
            Message::Summary(_) | Message::Result(_) | Message::Other(_) => None,
        }
    }

    /// Ordered content blocks (empty for records without block content).
    pub fn content_blocks(&self) -> &[ContentBlock] {
        match self {
            Message::User(m) => m.message.content.blocks(),
            Message::Assistant(m) => m.message.content.blocks(),
            Message::System(_) | Message::Summary(_) | Message::Result(_) | Message::Other(_) => {
                &[]
            }
        }
    }

    /// Human-readable text carried by the message.
    pub fn text_content(&self) -> String {
        match self {
            Message::System(m) => m.content.clone().unwrap_or_default(),
            Message::User(m) => m.message.content.text(),
            Message::Assistant(m) => m.message.content.text(),
            Message::Summary(m) => m.summary.clone(),
            Message::Result(m) => m.result.clone().unwrap_or_default(),
            Message::Other(_) => String::new(),
        }
    }

    pub fn tool_uses(&self) -> Vec<&ToolUse> {
        self.content_blocks()
            .iter()
            .filter_map(|b| match b {
                ContentBlock::ToolUse(tu) => Some(tu),
                _ => None,
            })
            .collect()
    }

    pub fn tool_results(&self) -> Vec<&ToolResult> {
        self.content_blocks()
            .iter()
            .filter_map(|b| match b {
                ContentBlock::ToolResult(tr) => Some(tr),
                _ => None,
            })
            .collect()
    }

    /// Stream identifier (`message.id`) of an assistant chunk.
    pub fn stream_id(&self) -> Option<&str> {
        match self {
            Message::Assistant(m) => m.message.id.as_deref(),
            _ => None,
        }
    }

    pub fn model(&self) -> Option<&str> {
        match self {
            Message::Assistant(m) => m.message.model.as_deref(),
            Message::System(m) => m.model.as_deref(),
            _ => None,
        }
    }

    /// True for user messages that only carry tool results.
    pub fn is_tool_result_only(&self) -> bool {
        match self {
            Message::User(m) => {
                let blocks = m.message.content.blocks();
                !blocks.is_empty()
                    && blocks
                        .iter()
                        .all(|b| matches!(b, ContentBlock::ToolResult(_)))
            }
            _ => false,
        }
    }
}

/// Accept `true`/`false`/`null`, treating `null` as `false`.
fn lenient_bool<'de, D>(deserializer: D) -> std::result::Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<bool>::deserialize(deserializer)?.unwrap_or(false))
}
