//! Ingestion layer: raw lines to linked messages
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   ┌──────────────┐   ┌───────────────┐   ┌──────────────┐
//! │  raw lines   │──►│ parse_line / │──►│  consolidate  │──►│ build_index  │
//! │ (JSONL text) │   │ parse_lines  │   │ (stream ids)  │   │ (tool links) │
//! └──────────────┘   └──────────────┘   └───────────────┘   └──────────────┘
//! ```
//!
//! Each stage is a pure pass over an in-memory sequence. The tree builder
//! consumes the consolidated messages and the index.
//!
//! ## Usage
//!
//! ```rust
//! use convtree_core::ingest::{build_index, consolidate, parse_lines};
//!
//! let parsed = parse_lines([
//!     r#"{"type":"assistant","message":{"id":"m1","content":[{"type":"tool_use","id":"t1","name":"Bash","input":{"command":"ls"}}]}}"#,
//!     r#"{"type":"user","message":{"content":[{"type":"tool_result","tool_use_id":"t1","content":"file.txt"}]}}"#,
//! ]);
//! let messages = consolidate(parsed.messages);
//! let index = build_index(&messages);
//! assert_eq!(index.linked("t1").unwrap().tool_name, "Bash");
//! ```

mod consolidate;
mod linker;
mod parser;

pub use consolidate::{consolidate, Consolidator};
pub use linker::{
    build_index, link, IndexedToolResult, IndexedToolUse, LinkMismatch, LinkedContext, ToolIndex,
};
pub use parser::{message_from_value, parse_line, parse_lines, parse_reader, ParseResult};
