//! Content classification
//!
//! Decides how a block of content should be displayed, using the structured
//! context the transcript provides (which tool produced it, whether it is an
//! error, the tool's input) before ever looking at the content's shape.
//!
//! ## Decision table
//!
//! Rules are evaluated in order; the first match wins.
//!
//! | # | Condition                          | Content type        | Strategy                    |
//! |---|------------------------------------|---------------------|-----------------------------|
//! | 1 | `tool_use` block                   | `TOOL_INPUT`        | `json_popup_always`         |
//! | 2 | result flagged `is_error`          | `ERROR_OBJECT` / `ERROR_CONTENT` | `error_popup_highlighted` |
//! | 3 | shell tool                         | `COMMAND_OUTPUT`    | `terminal_style_popup`      |
//! | 4 | MCP tool with JSON content         | `JSON_API_RESPONSE` | `json_popup_with_folding`   |
//! | 5 | file-read tool                     | `FILE_CONTENT`      | inline or popup by size     |
//! | 6 | list / web / any other tool        | `FILE_LIST` / `WEB_CONTENT` / `GENERIC_TEXT` | inline or popup by size |
//! | 7 | no tool context                    | sniffed             | by shape and size           |
//!
//! Classification is total and deterministic: identical inputs produce
//! identical results, including metadata order.

mod cache;
pub mod heuristics;
pub mod language;

pub use cache::{cache_key, ClassificationCache};

use crate::config::ClassifierConfig;
use crate::ingest::LinkedContext;
use crate::message::{ContentBlock, Role};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// What a piece of content is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ContentType {
    ToolInput,
    ErrorContent,
    ErrorObject,
    CommandOutput,
    JsonApiResponse,
    FileContent,
    FileList,
    WebContent,
    GenericText,
}

impl ContentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentType::ToolInput => "TOOL_INPUT",
            ContentType::ErrorContent => "ERROR_CONTENT",
            ContentType::ErrorObject => "ERROR_OBJECT",
            ContentType::CommandOutput => "COMMAND_OUTPUT",
            ContentType::JsonApiResponse => "JSON_API_RESPONSE",
            ContentType::FileContent => "FILE_CONTENT",
            ContentType::FileList => "FILE_LIST",
            ContentType::WebContent => "WEB_CONTENT",
            ContentType::GenericText => "GENERIC_TEXT",
        }
    }
}

impl std::fmt::Display for ContentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// How the presentation layer should show a piece of content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisplayStrategy {
    JsonPopupAlways,
    ErrorPopupHighlighted,
    TerminalStylePopup,
    JsonPopupWithFolding,
    InlineWithSyntax,
    SyntaxHighlightedPopup,
    InlineTextOnly,
    LargeContentPopup,
}

impl DisplayStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            DisplayStrategy::JsonPopupAlways => "json_popup_always",
            DisplayStrategy::ErrorPopupHighlighted => "error_popup_highlighted",
            DisplayStrategy::TerminalStylePopup => "terminal_style_popup",
            DisplayStrategy::JsonPopupWithFolding => "json_popup_with_folding",
            DisplayStrategy::InlineWithSyntax => "inline_with_syntax",
            DisplayStrategy::SyntaxHighlightedPopup => "syntax_highlighted_popup",
            DisplayStrategy::InlineTextOnly => "inline_text_only",
            DisplayStrategy::LargeContentPopup => "large_content_popup",
        }
    }

    /// Everything except the two inline strategies opens a popup.
    pub fn forces_popup(&self) -> bool {
        !matches!(
            self,
            DisplayStrategy::InlineWithSyntax | DisplayStrategy::InlineTextOnly
        )
    }
}

impl std::fmt::Display for DisplayStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Outcome of classifying one piece of content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationResult {
    pub content_type: ContentType,
    /// 1.0 when decided from structured context, lower when sniffed
    pub confidence: f64,
    pub display_strategy: DisplayStrategy,
    pub metadata: BTreeMap<String, String>,
    pub force_popup: bool,
}

impl ClassificationResult {
    fn new(content_type: ContentType, display_strategy: DisplayStrategy, confidence: f64) -> Self {
        Self {
            content_type,
            confidence,
            display_strategy,
            metadata: BTreeMap::new(),
            force_popup: display_strategy.forces_popup(),
        }
    }

    fn with(mut self, key: &str, value: impl Into<String>) -> Self {
        self.metadata.insert(key.to_string(), value.into());
        self
    }

    pub fn meta(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).map(String::as_str)
    }
}

/// The part of a content block that matters to classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockKind {
    ToolUse,
    ToolResult { is_error: bool },
    /// Text, thinking and anything else without tool semantics
    Text,
}

impl BlockKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BlockKind::ToolUse => "tool_use",
            BlockKind::ToolResult { .. } => "tool_result",
            BlockKind::Text => "text",
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, BlockKind::ToolResult { is_error: true })
    }
}

impl From<&ContentBlock> for BlockKind {
    fn from(block: &ContentBlock) -> Self {
        match block {
            ContentBlock::ToolUse(_) => BlockKind::ToolUse,
            ContentBlock::ToolResult(tr) => BlockKind::ToolResult {
                is_error: tr.is_error,
            },
            ContentBlock::Text { .. }
            | ContentBlock::Thinking { .. }
            | ContentBlock::Image { .. }
            | ContentBlock::Unknown => BlockKind::Text,
        }
    }
}

/// Structured context available for a block.
#[derive(Debug, Clone, Copy, Default)]
pub struct ClassifyContext<'a> {
    /// Name of the tool that produced (or is) the content
    pub tool_name: Option<&'a str>,
    /// Role of the message carrying the block
    pub message_role: Option<Role>,
    /// Input of the originating tool call
    pub tool_input: Option<&'a Value>,
}

impl<'a> ClassifyContext<'a> {
    /// Context of a result whose invocation is known.
    pub fn linked(linked: &'a LinkedContext, message_role: Option<Role>) -> Self {
        Self {
            tool_name: Some(linked.tool_name.as_str()),
            message_role,
            tool_input: Some(&linked.input),
        }
    }

    pub fn has_tool(&self) -> bool {
        self.tool_name.is_some_and(|n| !n.is_empty())
    }

    fn input_str(&self, key: &str) -> Option<&'a str> {
        self.tool_input?.get(key)?.as_str()
    }

    fn input_path(&self) -> Option<&'a str> {
        ["file_path", "filePath", "path", "notebook_path"]
            .iter()
            .find_map(|key| self.input_str(key))
    }
}

/// Rule-table classifier.
#[derive(Debug, Clone, Default)]
pub struct Classifier {
    config: ClassifierConfig,
}

impl Classifier {
    pub fn new(config: ClassifierConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ClassifierConfig {
        &self.config
    }

    /// Classify content using its block kind and structured context.
    pub fn classify_from_structured_data(
        &self,
        block: BlockKind,
        content: &str,
        context: &ClassifyContext<'_>,
    ) -> ClassificationResult {
        if block == BlockKind::ToolUse {
            let result = ClassificationResult::new(
                ContentType::ToolInput,
                DisplayStrategy::JsonPopupAlways,
                1.0,
            );
            return match context.tool_name {
                Some(name) => result.with("tool_name", name),
                None => result,
            };
        }

        if block.is_error() {
            return self.classify_error(content);
        }

        match context.tool_name.filter(|n| !n.is_empty()) {
            Some(tool) => self.classify_tool_output(tool, content, context),
            None => self.classify_by_shape(content),
        }
    }

    /// [`Self::classify_from_structured_data`] through a cache.
    pub fn classify_cached(
        &self,
        cache: &mut ClassificationCache,
        block: BlockKind,
        content: &str,
        context: &ClassifyContext<'_>,
    ) -> ClassificationResult {
        let key = cache_key(&block, content, context);
        cache.get_or_insert_with(key, || {
            self.classify_from_structured_data(block, content, context)
        })
    }

    fn classify_error(&self, content: &str) -> ClassificationResult {
        let content_type = if heuristics::is_json_object(content) {
            ContentType::ErrorObject
        } else {
            ContentType::ErrorContent
        };
        ClassificationResult::new(content_type, DisplayStrategy::ErrorPopupHighlighted, 1.0)
            .with("error_type", heuristics::error_type(content))
    }

    fn classify_tool_output(
        &self,
        tool: &str,
        content: &str,
        context: &ClassifyContext<'_>,
    ) -> ClassificationResult {
        let cfg = &self.config;

        if is_listed(&cfg.shell_tools, tool) {
            let result = ClassificationResult::new(
                ContentType::CommandOutput,
                DisplayStrategy::TerminalStylePopup,
                1.0,
            );
            return match context.input_str("command") {
                Some(command) => result.with("command", command),
                None => result,
            };
        }

        if let Some((server, api_tool)) = heuristics::split_mcp_name(tool, &cfg.mcp_prefix) {
            if heuristics::is_structured_json(content) {
                return ClassificationResult::new(
                    ContentType::JsonApiResponse,
                    DisplayStrategy::JsonPopupWithFolding,
                    1.0,
                )
                .with("api_server", server)
                .with("api_tool", api_tool);
            }
        }

        if is_listed(&cfg.file_read_tools, tool) {
            return self.classify_file_content(content, context);
        }

        let content_type = if is_listed(&cfg.list_tools, tool) {
            ContentType::FileList
        } else if is_listed(&cfg.web_tools, tool) {
            ContentType::WebContent
        } else {
            ContentType::GenericText
        };
        ClassificationResult::new(content_type, self.text_strategy(content), 1.0)
    }

    fn classify_file_content(
        &self,
        content: &str,
        context: &ClassifyContext<'_>,
    ) -> ClassificationResult {
        let (lines, chars) = heuristics::size_of(content);
        let inline = lines <= self.config.file_inline_max_lines
            && chars <= self.config.file_inline_max_chars;
        let strategy = if inline {
            DisplayStrategy::InlineWithSyntax
        } else {
            DisplayStrategy::SyntaxHighlightedPopup
        };

        let path = context.input_path();
        let lang = match path {
            Some(p) => language::from_path(p),
            None => language::sniff(content),
        };

        let result = ClassificationResult::new(ContentType::FileContent, strategy, 1.0)
            .with("language", lang.unwrap_or("text"))
            .with("line_count", lines.to_string());
        match path {
            Some(p) => result.with("file_path", p),
            None => result,
        }
    }

    fn classify_by_shape(&self, content: &str) -> ClassificationResult {
        if heuristics::is_structured_json(content) {
            return ClassificationResult::new(
                ContentType::JsonApiResponse,
                DisplayStrategy::JsonPopupWithFolding,
                0.6,
            );
        }
        ClassificationResult::new(ContentType::GenericText, self.text_strategy(content), 0.5)
    }

    fn text_strategy(&self, content: &str) -> DisplayStrategy {
        let (lines, chars) = heuristics::size_of(content);
        if lines <= self.config.text_inline_max_lines && chars <= self.config.text_inline_max_chars
        {
            DisplayStrategy::InlineTextOnly
        } else {
            DisplayStrategy::LargeContentPopup
        }
    }
}

fn is_listed(tools: &[String], name: &str) -> bool {
    tools.iter().any(|t| t == name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn classifier() -> Classifier {
        Classifier::new(ClassifierConfig::default())
    }

    fn tool_ctx<'a>(name: &'a str, input: &'a Value) -> ClassifyContext<'a> {
        ClassifyContext {
            tool_name: Some(name),
            message_role: Some(Role::User),
            tool_input: Some(input),
        }
    }

    const OK: BlockKind = BlockKind::ToolResult { is_error: false };
    const ERR: BlockKind = BlockKind::ToolResult { is_error: true };

    #[test]
    fn test_tool_use_block_is_tool_input() {
        let input = json!({"command": "ls"});
        let result = classifier().classify_from_structured_data(
            BlockKind::ToolUse,
            "{}",
            &tool_ctx("Bash", &input),
        );
        assert_eq!(result.content_type, ContentType::ToolInput);
        assert_eq!(result.display_strategy, DisplayStrategy::JsonPopupAlways);
        assert!(result.force_popup);
        assert_eq!(result.confidence, 1.0);
    }

    #[test]
    fn test_bash_output_is_command_output() {
        let input = json!({"command": "ls"});
        let result =
            classifier().classify_from_structured_data(OK, "file.txt", &tool_ctx("Bash", &input));
        assert_eq!(result.content_type, ContentType::CommandOutput);
        assert_eq!(result.display_strategy, DisplayStrategy::TerminalStylePopup);
        assert_eq!(result.meta("command"), Some("ls"));
        assert!(result.force_popup);
    }

    #[test]
    fn test_error_beats_tool_rules() {
        let input = json!({"command": "cat nope"});
        let ctx = tool_ctx("Bash", &input);

        let text = classifier().classify_from_structured_data(
            ERR,
            "cat: nope: No such file or directory",
            &ctx,
        );
        assert_eq!(text.content_type, ContentType::ErrorContent);
        assert_eq!(text.display_strategy, DisplayStrategy::ErrorPopupHighlighted);
        assert_eq!(text.meta("error_type"), Some("file_not_found"));

        let object = classifier().classify_from_structured_data(
            ERR,
            r#"{"code": 403, "message": "Permission denied"}"#,
            &ctx,
        );
        assert_eq!(object.content_type, ContentType::ErrorObject);
        assert_eq!(object.meta("error_type"), Some("permission_denied"));
    }

    #[test]
    fn test_mcp_json_response() {
        let input = json!({"repo": "x"});
        let result = classifier().classify_from_structured_data(
            OK,
            r#"{"issues": []}"#,
            &tool_ctx("mcp__github__list_issues", &input),
        );
        assert_eq!(result.content_type, ContentType::JsonApiResponse);
        assert_eq!(result.meta("api_server"), Some("github"));
        assert_eq!(result.meta("api_tool"), Some("list_issues"));
    }

    #[test]
    fn test_mcp_plain_text_falls_through() {
        let input = json!({});
        let result = classifier().classify_from_structured_data(
            OK,
            "created issue #4",
            &tool_ctx("mcp__github__create_issue", &input),
        );
        assert_eq!(result.content_type, ContentType::GenericText);
        assert_eq!(result.display_strategy, DisplayStrategy::InlineTextOnly);
        assert_eq!(result.confidence, 1.0);
    }

    #[test]
    fn test_read_uses_path_language() {
        let input = json!({"file_path": "/repo/src/lib.py"});
        // Content looks like rust, but the path is authoritative
        let result = classifier().classify_from_structured_data(
            OK,
            "     1→fn main() {}",
            &tool_ctx("Read", &input),
        );
        assert_eq!(result.content_type, ContentType::FileContent);
        assert_eq!(result.display_strategy, DisplayStrategy::InlineWithSyntax);
        assert!(!result.force_popup);
        assert_eq!(result.meta("language"), Some("python"));
        assert_eq!(result.meta("file_path"), Some("/repo/src/lib.py"));
        assert_eq!(result.meta("line_count"), Some("1"));
    }

    #[test]
    fn test_read_without_path_sniffs() {
        let input = json!({});
        let result = classifier().classify_from_structured_data(
            OK,
            "#!/bin/bash\necho hi",
            &tool_ctx("Read", &input),
        );
        assert_eq!(result.meta("language"), Some("bash"));
        assert_eq!(result.meta("file_path"), None);
    }

    #[test]
    fn test_large_file_goes_to_popup() {
        let input = json!({"file_path": "big.rs"});
        let content = "let x = 1;\n".repeat(50);
        let result =
            classifier().classify_from_structured_data(OK, &content, &tool_ctx("Read", &input));
        assert_eq!(result.display_strategy, DisplayStrategy::SyntaxHighlightedPopup);
        assert!(result.force_popup);
        assert_eq!(result.meta("line_count"), Some("50"));
    }

    #[test]
    fn test_list_web_and_other_tools() {
        let input = json!({});
        let c = classifier();
        assert_eq!(
            c.classify_from_structured_data(OK, "a.rs\nb.rs", &tool_ctx("Glob", &input))
                .content_type,
            ContentType::FileList
        );
        assert_eq!(
            c.classify_from_structured_data(OK, "<html>", &tool_ctx("WebFetch", &input))
                .content_type,
            ContentType::WebContent
        );
        let other = c.classify_from_structured_data(OK, "done", &tool_ctx("TodoWrite", &input));
        assert_eq!(other.content_type, ContentType::GenericText);
        assert_eq!(other.confidence, 1.0);
    }

    #[test]
    fn test_shape_sniffing_without_context() {
        let c = classifier();
        let ctx = ClassifyContext::default();

        let json = c.classify_from_structured_data(OK, r#"[{"a": 1}]"#, &ctx);
        assert_eq!(json.content_type, ContentType::JsonApiResponse);
        assert_eq!(json.confidence, 0.6);

        let short = c.classify_from_structured_data(BlockKind::Text, "hello", &ctx);
        assert_eq!(short.content_type, ContentType::GenericText);
        assert_eq!(short.display_strategy, DisplayStrategy::InlineTextOnly);
        assert_eq!(short.confidence, 0.5);

        let long = c.classify_from_structured_data(BlockKind::Text, &"x".repeat(900), &ctx);
        assert_eq!(long.display_strategy, DisplayStrategy::LargeContentPopup);
        assert!(long.force_popup);
    }

    #[test]
    fn test_thresholds_come_from_config() {
        let config = ClassifierConfig {
            text_inline_max_chars: 3,
            ..Default::default()
        };
        let c = Classifier::new(config);
        let result =
            c.classify_from_structured_data(BlockKind::Text, "four", &ClassifyContext::default());
        assert_eq!(result.display_strategy, DisplayStrategy::LargeContentPopup);
    }

    #[test]
    fn test_deterministic_and_cached() {
        let c = classifier();
        let input = json!({"file_path": "main.go"});
        let ctx = tool_ctx("Read", &input);
        let fresh = c.classify_from_structured_data(OK, "package main", &ctx);

        let mut cache = ClassificationCache::new();
        let first = c.classify_cached(&mut cache, OK, "package main", &ctx);
        let second = c.classify_cached(&mut cache, OK, "package main", &ctx);
        assert_eq!(fresh, first);
        assert_eq!(first, second);
        assert_eq!(cache.hits(), 1);
        assert_eq!(
            serde_json::to_string(&fresh).unwrap(),
            serde_json::to_string(&second).unwrap()
        );
    }

    #[test]
    fn test_serialized_names() {
        let result = classifier().classify_from_structured_data(
            BlockKind::Text,
            "hi",
            &ClassifyContext::default(),
        );
        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(value["content_type"], "GENERIC_TEXT");
        assert_eq!(value["display_strategy"], "inline_text_only");
    }
}
