//! # convtree-core
//!
//! Core library for convtree - a conversation tree builder for Claude CLI
//! and Claude Code transcripts.
//!
//! This library provides:
//! - A typed message model for JSONL transcript records
//! - Parsing, consolidation of streamed chunks, and tool call linking
//! - Deterministic content classification for display
//! - A navigable tree with stable node ids across rebuilds
//! - Batch and streaming session processing
//! - Configuration management and logging infrastructure
//!
//! ## Architecture
//!
//! Data flows through four stages, each a pure pass over memory:
//! - **Parse:** raw lines to [`Message`]s, collecting per-line [`ParseError`]s
//! - **Consolidate:** assistant chunks sharing a stream id merge into one message
//! - **Link:** tool invocations are indexed against their results
//! - **Build:** messages become a [`Tree`] with a classification per node
//!
//! [`SessionProcessor`] runs the stages; [`StreamDriver`] feeds it from an
//! async line source.
//!
//! ## Example
//!
//! ```rust
//! use convtree_core::stream::process_batch;
//!
//! let snapshot = process_batch([
//!     r#"{"type":"assistant","uuid":"a1","message":{"id":"m1","content":[{"type":"tool_use","id":"t1","name":"Bash","input":{"command":"ls"}}]}}"#,
//!     r#"{"type":"user","uuid":"u1","message":{"content":[{"type":"tool_result","tool_use_id":"t1","content":"file.txt"}]}}"#,
//! ]);
//!
//! let result = snapshot.tree.classification("result:t1").unwrap();
//! assert_eq!(result.content_type.as_str(), "COMMAND_OUTPUT");
//! ```

// Re-export commonly used items at the crate root
pub use classify::{
    BlockKind, ClassificationCache, ClassificationResult, Classifier, ClassifyContext,
    ContentType, DisplayStrategy,
};
pub use config::{ClassifierConfig, Config, StreamConfig, TreeOptions};
pub use error::{Error, ParseError, ParseErrorKind, Result};
pub use ingest::{
    build_index, consolidate, parse_line, parse_lines, LinkMismatch, LinkedContext, ParseResult,
    ToolIndex,
};
pub use message::{ContentBlock, Message, MessageKind, Role, ToolResult, ToolUse};
pub use session::{Enrichment, SessionInfo, SessionMetadata};
pub use stream::{
    LineSink, SessionProcessor, Snapshot, StreamDriver, StreamEnd, StreamEvent, StreamOutcome,
};
pub use tree::{NodeData, Tree, TreeBuilder, TreeNode};

// Public modules
pub mod classify;
pub mod config;
pub mod error;
pub mod format;
pub mod ingest;
pub mod logging;
pub mod message;
pub mod session;
pub mod stream;
pub mod tree;
