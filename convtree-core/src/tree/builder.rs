//! Tree builder
//!
//! Turns consolidated messages plus a [`ToolIndex`] into a [`Tree`]. Building
//! is a pure function of its inputs: the same messages always yield the same
//! node ids, in the same order, with the same classifications.
//!
//! ## Node ids
//!
//! | Node      | Id                                                          |
//! |-----------|-------------------------------------------------------------|
//! | Session   | `session:<session_id>` (`session:unknown` when absent)      |
//! | Message   | `msg:<uuid>`, else `msg:<stream id>`, else `msg:<type>#<n>` |
//! | ToolCall  | `tool:<tool_use_id>`                                        |
//! | Result    | `result:<tool_use_id>`                                      |
//! | Text      | `<parent id>/text:<n>`                                      |
//!
//! A base id that is already taken gets a `~<n>` suffix (`~1`, `~2`, ...) in
//! build order.

use super::node::{
    MessageNode, NodeData, ResultNode, SessionNode, TextNode, ToolCallNode, ToolStatus, TreeNode,
};
use super::Tree;
use crate::classify::{
    BlockKind, ClassificationCache, ClassificationResult, Classifier, ClassifyContext,
};
use crate::config::TreeOptions;
use crate::format;
use crate::ingest::{build_index, ToolIndex};
use crate::message::{ContentBlock, Message, MessageContent, Role, ToolUse};
use crate::session::SessionInfo;
use std::collections::{BTreeMap, HashMap, HashSet};

const MESSAGE_PREVIEW_CHARS: usize = 80;

/// Hands out unique node ids.
#[derive(Debug, Default)]
pub struct IdAllocator {
    used: HashSet<String>,
    collisions: HashMap<String, usize>,
}

impl IdAllocator {
    /// Claim `base`, or the first free `base~<n>` if it is taken.
    pub fn claim(&mut self, base: String) -> String {
        if self.used.insert(base.clone()) {
            return base;
        }
        let counter = self.collisions.entry(base.clone()).or_insert(0);
        loop {
            *counter += 1;
            let candidate = format!("{}~{}", base, counter);
            if self.used.insert(candidate.clone()) {
                tracing::debug!(base = %base, id = %candidate, "Node id collision");
                return candidate;
            }
        }
    }
}

/// Builds trees with a fixed classifier and options.
pub struct TreeBuilder<'a> {
    classifier: &'a Classifier,
    options: &'a TreeOptions,
    cache: Option<&'a mut ClassificationCache>,
}

impl<'a> TreeBuilder<'a> {
    pub fn new(classifier: &'a Classifier, options: &'a TreeOptions) -> Self {
        Self {
            classifier,
            options,
            cache: None,
        }
    }

    /// Route classifications through `cache`.
    pub fn with_cache(mut self, cache: &'a mut ClassificationCache) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Build a tree, indexing tool calls on the way.
    pub fn build_tree(&mut self, messages: &[Message], session: &SessionInfo) -> Tree {
        let index = build_index(messages);
        self.build_tree_with_index(messages, &index, session)
    }

    /// Build a tree from messages already indexed by the caller.
    pub fn build_tree_with_index(
        &mut self,
        messages: &[Message],
        index: &ToolIndex,
        session: &SessionInfo,
    ) -> Tree {
        let mut remaining_tool_uses: HashMap<String, usize> = HashMap::new();
        for message in messages.iter().filter(|m| matches!(m, Message::Assistant(_))) {
            for tool_use in message.tool_uses() {
                *remaining_tool_uses.entry(tool_use.id.clone()).or_insert(0) += 1;
            }
        }

        let mut build = Build {
            builder: self,
            index,
            ids: IdAllocator::default(),
            classifications: BTreeMap::new(),
            remaining_tool_uses,
        };

        let root_id = build.ids.claim(format!(
            "session:{}",
            session.session_id.as_deref().unwrap_or("unknown")
        ));
        let mut root = TreeNode::new(
            root_id.clone(),
            None,
            NodeData::Session(SessionNode {
                session_id: session.session_id.clone(),
                title: session.title.clone(),
                metadata_pending: session.enrichment.is_pending(),
                message_count: messages.len(),
            }),
        );

        let mut ordinals: HashMap<&str, usize> = HashMap::new();
        for message in messages {
            let ordinal = ordinals.entry(message.type_name()).or_insert(0);
            let position = *ordinal;
            *ordinal += 1;

            if !build.should_render(message) {
                continue;
            }
            root.children.push(build.message_node(message, position, &root_id));
        }

        let classifications = build.classifications;
        let expand_depth = self.options.expand_depth;
        set_initial_expansion(&mut root, 0, expand_depth);

        Tree {
            root,
            classifications,
        }
    }
}

/// Convenience wrapper: default classifier cacheless build.
pub fn build_tree(
    messages: &[Message],
    session: &SessionInfo,
    classifier: &Classifier,
    options: &TreeOptions,
) -> Tree {
    TreeBuilder::new(classifier, options).build_tree(messages, session)
}

fn set_initial_expansion(node: &mut TreeNode, depth: usize, expand_depth: usize) {
    node.expanded = depth < expand_depth && !node.children.is_empty();
    for child in &mut node.children {
        set_initial_expansion(child, depth + 1, expand_depth);
    }
}

/// State of one build pass.
struct Build<'b, 'a> {
    builder: &'b mut TreeBuilder<'a>,
    index: &'b ToolIndex,
    ids: IdAllocator,
    classifications: BTreeMap<String, ClassificationResult>,
    /// Invocations per tool-use id not yet built; the index keeps the last
    remaining_tool_uses: HashMap<String, usize>,
}

impl Build<'_, '_> {
    fn should_render(&self, message: &Message) -> bool {
        match message {
            Message::Other(_) => self.builder.options.include_opaque,
            Message::User(_) if self.builder.options.fold_tool_result_messages => {
                // Only fold when every result will appear under its tool call
                !(message.is_tool_result_only()
                    && message
                        .tool_results()
                        .iter()
                        .all(|r| self.index.tool_for(&r.tool_use_id).is_some()))
            }
            _ => true,
        }
    }

    fn classify(
        &mut self,
        node_id: &str,
        block: BlockKind,
        content: &str,
        ctx: &ClassifyContext<'_>,
    ) {
        let classifier = self.builder.classifier;
        let result = match self.builder.cache.as_deref_mut() {
            Some(cache) => classifier.classify_cached(cache, block, content, ctx),
            None => classifier.classify_from_structured_data(block, content, ctx),
        };
        self.classifications.insert(node_id.to_string(), result);
    }

    fn message_node(&mut self, message: &Message, position: usize, parent_id: &str) -> TreeNode {
        let base = match (message.uuid(), message.stream_id()) {
            (Some(uuid), _) if !uuid.is_empty() => format!("msg:{}", uuid),
            (_, Some(stream_id)) if !stream_id.is_empty() => format!("msg:{}", stream_id),
            _ => format!("msg:{}#{}", message.type_name(), position),
        };
        let id = self.ids.claim(base);

        let mut node = TreeNode::new(
            id.clone(),
            Some(parent_id.to_string()),
            NodeData::Message(MessageNode {
                kind: message.kind(),
                type_name: message.type_name().to_string(),
                role: message.role(),
                uuid: message.uuid().map(String::from),
                timestamp: message.timestamp_utc(),
                model: message.model().map(String::from),
                preview: format::preview(&message.text_content(), MESSAGE_PREVIEW_CHARS),
            }),
        );

        let role = message.role();
        let mut texts = 0;
        match message {
            Message::Assistant(m) => {
                for block in m.message.content.blocks() {
                    match block {
                        ContentBlock::Text { text } => {
                            node.children.push(self.text_node(&id, &mut texts, text, false, role));
                        }
                        ContentBlock::Thinking { thinking } => {
                            node.children
                                .push(self.text_node(&id, &mut texts, thinking, true, role));
                        }
                        ContentBlock::ToolUse(tool_use) => {
                            node.children.push(self.tool_call_node(tool_use, &id));
                        }
                        ContentBlock::ToolResult(_)
                        | ContentBlock::Image { .. }
                        | ContentBlock::Unknown => {}
                    }
                }
                if let MessageContent::Text(text) = &m.message.content {
                    if !text.is_empty() {
                        node.children.push(self.text_node(&id, &mut texts, text, false, role));
                    }
                }
            }
            Message::User(m) => match &m.message.content {
                MessageContent::Text(text) => {
                    if !text.is_empty() {
                        node.children.push(self.text_node(&id, &mut texts, text, false, role));
                    }
                }
                MessageContent::Blocks(blocks) => {
                    for block in blocks {
                        match block {
                            ContentBlock::Text { text } => {
                                node.children
                                    .push(self.text_node(&id, &mut texts, text, false, role));
                            }
                            ContentBlock::ToolResult(tr) => {
                                // Linked results render under their tool call
                                if self.index.tool_for(&tr.tool_use_id).is_none() {
                                    let content = tr.content_text();
                                    node.children.push(self.result_node(
                                        &tr.tool_use_id,
                                        None,
                                        content,
                                        tr.is_error,
                                        &id,
                                        &ClassifyContext {
                                            message_role: role,
                                            ..Default::default()
                                        },
                                    ));
                                }
                            }
                            ContentBlock::Thinking { .. }
                            | ContentBlock::ToolUse(_)
                            | ContentBlock::Image { .. }
                            | ContentBlock::Unknown => {}
                        }
                    }
                }
            },
            Message::System(_) | Message::Summary(_) | Message::Result(_) => {
                let text = message.text_content();
                if !text.is_empty() {
                    node.children.push(self.text_node(&id, &mut texts, &text, false, role));
                }
            }
            Message::Other(_) => {}
        }

        node
    }

    fn text_node(
        &mut self,
        parent_id: &str,
        counter: &mut usize,
        text: &str,
        thinking: bool,
        role: Option<Role>,
    ) -> TreeNode {
        let id = self.ids.claim(format!("{}/text:{}", parent_id, counter));
        *counter += 1;
        self.classify(
            &id,
            BlockKind::Text,
            text,
            &ClassifyContext {
                message_role: role,
                ..Default::default()
            },
        );
        TreeNode::new(
            id,
            Some(parent_id.to_string()),
            NodeData::Text(TextNode {
                text: text.to_string(),
                thinking,
            }),
        )
    }

    fn tool_call_node(&mut self, tool_use: &ToolUse, parent_id: &str) -> TreeNode {
        let id = self.ids.claim(format!("tool:{}", tool_use.id));
        let tool_ctx = ClassifyContext {
            tool_name: Some(tool_use.name.as_str()),
            message_role: Some(Role::Assistant),
            tool_input: Some(&tool_use.input),
        };
        self.classify(&id, BlockKind::ToolUse, &tool_use.input_json(), &tool_ctx);

        // Only the invocation the index kept owns the result
        let superseded = match self.remaining_tool_uses.get_mut(&tool_use.id) {
            Some(remaining) => {
                *remaining = remaining.saturating_sub(1);
                *remaining > 0
            }
            None => false,
        };
        if superseded {
            tracing::debug!(
                tool_use_id = %tool_use.id,
                "Tool call superseded by a later duplicate"
            );
        }

        let index = self.index;
        let result = if superseded {
            None
        } else {
            index.result_for(&tool_use.id)
        };
        let status = match result {
            None => ToolStatus::Pending,
            Some(r) if r.is_error => ToolStatus::Failed,
            Some(_) => ToolStatus::Completed,
        };

        let mut node = TreeNode::new(
            id.clone(),
            Some(parent_id.to_string()),
            NodeData::ToolCall(ToolCallNode {
                tool_use_id: tool_use.id.clone(),
                tool_name: tool_use.name.clone(),
                input: tool_use.input.clone(),
                status,
            }),
        );

        if let Some(linked) = index.linked(&tool_use.id).filter(|_| !superseded) {
            let ctx = ClassifyContext::linked(&linked, Some(Role::User));
            let child = self.result_node(
                &linked.tool_use_id,
                Some(linked.tool_name.clone()),
                linked.result_content.clone(),
                linked.is_error,
                &id,
                &ctx,
            );
            node.children.push(child);
        }

        node
    }

    fn result_node(
        &mut self,
        tool_use_id: &str,
        tool_name: Option<String>,
        content: String,
        is_error: bool,
        parent_id: &str,
        ctx: &ClassifyContext<'_>,
    ) -> TreeNode {
        let id = self.ids.claim(format!("result:{}", tool_use_id));
        self.classify(&id, BlockKind::ToolResult { is_error }, &content, ctx);
        TreeNode::new(
            id,
            Some(parent_id.to_string()),
            NodeData::Result(ResultNode {
                tool_use_id: tool_use_id.to_string(),
                tool_name,
                content,
                is_error,
            }),
        )
    }
}
