//! Session processing
//!
//! [`SessionProcessor`] is the single owner of a conversation's state: the
//! append-only message buffer, collected parse errors, the classifier with
//! its cache, and tree options. Lines go in one at a time (or all at once);
//! [`SessionProcessor::refresh`] turns the buffer into a [`Snapshot`].
//!
//! ## Parity
//!
//! Batch and incremental ingestion share the same code path: a batch is
//! just every line pushed in order followed by one refresh. Consolidation
//! runs incrementally as lines arrive; the tool index and the tree are
//! rebuilt wholesale on each refresh.

mod driver;

pub use driver::{StreamDriver, StreamEnd, StreamEvent, StreamOutcome};

use crate::classify::{ClassificationCache, Classifier};
use crate::config::{Config, TreeOptions};
use crate::error::ParseError;
use crate::ingest::{build_index, parse_line, Consolidator, LinkMismatch};
use crate::message::Message;
use crate::session::{SessionInfo, SessionMetadata};
use crate::tree::{Tree, TreeBuilder};
use serde::Serialize;
use std::time::Instant;

/// Push interface for line sources.
pub trait LineSink {
    /// One raw line, without its trailing newline.
    fn on_line(&mut self, line: &str);
    /// The source has no more lines.
    fn on_complete(&mut self);
    /// The source failed; lines received so far stay valid.
    fn on_error(&mut self, error: &str);
}

/// Everything the presentation layer needs after a refresh.
#[derive(Debug, Clone, Serialize)]
pub struct Snapshot {
    pub tree: Tree,
    pub metadata: SessionMetadata,
    /// Every parse error so far, in line order
    pub errors: Vec<ParseError>,
    /// Consolidated message count
    pub message_count: usize,
    pub link_mismatches: Vec<LinkMismatch>,
    /// Errors reported by the line source
    pub source_errors: Vec<String>,
    /// The source signalled completion
    pub complete: bool,
}

/// Owns one conversation's buffer and builds snapshots from it.
#[derive(Debug, Clone)]
pub struct SessionProcessor {
    consolidator: Consolidator,
    errors: Vec<ParseError>,
    source_errors: Vec<String>,
    lines_seen: usize,
    complete: bool,
    classifier: Classifier,
    cache: ClassificationCache,
    options: TreeOptions,
    /// Host-supplied session info; derived from the transcript when absent
    session: Option<SessionInfo>,
}

impl Default for SessionProcessor {
    fn default() -> Self {
        Self::new(Classifier::default(), TreeOptions::default())
    }
}

impl SessionProcessor {
    pub fn new(classifier: Classifier, options: TreeOptions) -> Self {
        Self {
            consolidator: Consolidator::new(),
            errors: Vec::new(),
            source_errors: Vec::new(),
            lines_seen: 0,
            complete: false,
            classifier,
            cache: ClassificationCache::new(),
            options,
            session: None,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            Classifier::new(config.classifier.clone()),
            config.tree.clone(),
        )
    }

    /// Use host-supplied session info (e.g. with pending enrichment).
    pub fn with_session(mut self, session: SessionInfo) -> Self {
        self.session = Some(session);
        self
    }

    pub fn set_session(&mut self, session: SessionInfo) {
        self.session = Some(session);
    }

    /// Parse and buffer one line. Blank lines only advance the line counter.
    pub fn ingest_line(&mut self, line: &str) {
        self.lines_seen += 1;
        match parse_line(line) {
            Ok(Some(message)) => self.consolidator.push(message),
            Ok(None) => {}
            Err(e) => {
                let e = e.at_line(self.lines_seen);
                tracing::warn!(line = self.lines_seen, kind = e.kind.as_str(), "{}", e.message);
                self.errors.push(e);
            }
        }
    }

    pub fn ingest_lines<I, S>(&mut self, lines: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for line in lines {
            self.ingest_line(line.as_ref());
        }
    }

    /// Rebuild index, metadata and tree from the current buffer.
    pub fn refresh(&mut self) -> Snapshot {
        let started = Instant::now();
        let messages = self.consolidator.messages();

        let index = build_index(messages);
        let metadata = SessionMetadata::from_messages(messages);
        let session = match &self.session {
            Some(info) => {
                let mut info = info.clone();
                if info.session_id.is_none() {
                    info.session_id = metadata.session_id.clone();
                }
                info
            }
            None => SessionInfo::from_metadata(&metadata),
        };

        let tree = TreeBuilder::new(&self.classifier, &self.options)
            .with_cache(&mut self.cache)
            .build_tree_with_index(messages, &index, &session);
        let link_mismatches = index.orphan_results();

        tracing::debug!(
            messages = messages.len(),
            nodes = tree.node_count(),
            parse_errors = self.errors.len(),
            orphans = link_mismatches.len(),
            cache_entries = self.cache.len(),
            elapsed_us = started.elapsed().as_micros() as u64,
            "Refreshed session tree"
        );

        Snapshot {
            tree,
            metadata,
            errors: self.errors.clone(),
            message_count: messages.len(),
            link_mismatches,
            source_errors: self.source_errors.clone(),
            complete: self.complete,
        }
    }

    /// Drop cached classifications. Output is unaffected.
    pub fn clear_cache(&mut self) {
        self.cache.clear();
    }

    /// Consolidated messages buffered so far.
    pub fn messages(&self) -> &[Message] {
        self.consolidator.messages()
    }

    pub fn message_count(&self) -> usize {
        self.consolidator.len()
    }

    pub fn errors(&self) -> &[ParseError] {
        &self.errors
    }

    pub fn source_errors(&self) -> &[String] {
        &self.source_errors
    }

    pub fn lines_seen(&self) -> usize {
        self.lines_seen
    }

    pub fn is_complete(&self) -> bool {
        self.complete
    }

    pub fn cache(&self) -> &ClassificationCache {
        &self.cache
    }

    /// Batch entry point: ingest every line, then refresh once.
    pub fn process_batch<I, S>(&mut self, lines: I) -> Snapshot
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.ingest_lines(lines);
        self.on_complete();
        self.refresh()
    }
}

impl LineSink for SessionProcessor {
    fn on_line(&mut self, line: &str) {
        self.ingest_line(line);
    }

    fn on_complete(&mut self) {
        self.complete = true;
    }

    fn on_error(&mut self, error: &str) {
        tracing::warn!(error, "Line source reported an error");
        self.source_errors.push(error.to_string());
    }
}

/// Run the batch pipeline over `lines` with default settings.
pub fn process_batch<I, S>(lines: I) -> Snapshot
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    SessionProcessor::default().process_batch(lines)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ParseErrorKind;
    use crate::session::Enrichment;
    use crate::tree::NodeData;

    const LINES: [&str; 5] = [
        r#"{"type":"user","uuid":"u1","sessionId":"s1","message":{"content":"hi"}}"#,
        r#"{"type":"assistant","uuid":"a1","message":{"id":"m1","content":[{"type":"text","text":"Hello"}]}}"#,
        "{not json",
        r#"{"type":"assistant","uuid":"a2","message":{"id":"m1","content":[{"type":"text","text":" world"}]}}"#,
        r#"{"type":"user","uuid":"u2","message":{"content":[{"type":"tool_result","tool_use_id":"ghost","content":"?"}]}}"#,
    ];

    #[test]
    fn test_incremental_matches_batch() {
        let batch = process_batch(LINES);

        let mut incremental = SessionProcessor::default();
        for line in LINES {
            incremental.on_line(line);
            incremental.refresh();
        }
        incremental.on_complete();
        let last = incremental.refresh();

        assert_eq!(batch.tree, last.tree);
        assert_eq!(batch.errors, last.errors);
        assert_eq!(batch.metadata, last.metadata);
        assert_eq!(batch.message_count, 3);
    }

    #[test]
    fn test_error_isolation() {
        let snapshot = process_batch(LINES);
        assert_eq!(snapshot.errors.len(), 1);
        assert_eq!(snapshot.errors[0].line, 3);
        assert_eq!(snapshot.errors[0].kind, ParseErrorKind::Decode);
        // The chunk after the bad line still merged
        let texts: Vec<String> = snapshot
            .tree
            .find("msg:a1")
            .unwrap()
            .children
            .iter()
            .map(|c| c.label())
            .collect();
        assert_eq!(texts, vec!["Hello", "world"]);
    }

    #[test]
    fn test_link_mismatches_reported() {
        let snapshot = process_batch(LINES);
        assert_eq!(snapshot.link_mismatches.len(), 1);
        assert_eq!(snapshot.link_mismatches[0].tool_use_id, "ghost");
        assert!(snapshot.tree.find("result:ghost").is_some());
    }

    #[test]
    fn test_session_id_from_transcript() {
        let snapshot = process_batch(LINES);
        assert_eq!(snapshot.tree.root.id, "session:s1");
        assert!(snapshot.complete);
    }

    #[test]
    fn test_host_session_info() {
        let mut processor = SessionProcessor::default()
            .with_session(SessionInfo::default().with_enrichment(Enrichment::Pending));
        let snapshot = processor.process_batch(LINES);
        assert_eq!(snapshot.tree.root.id, "session:s1");
        assert!(matches!(
            &snapshot.tree.root.data,
            NodeData::Session(s) if s.metadata_pending
        ));
    }

    #[test]
    fn test_clear_cache_keeps_output() {
        let mut processor = SessionProcessor::default();
        processor.ingest_lines(LINES);
        let before = processor.refresh();
        assert!(!processor.cache().is_empty());

        processor.clear_cache();
        assert!(processor.cache().is_empty());
        let after = processor.refresh();
        assert_eq!(before.tree, after.tree);
    }

    #[test]
    fn test_cache_hits_on_refresh() {
        let mut processor = SessionProcessor::default();
        processor.ingest_lines(LINES);
        processor.refresh();
        let misses = processor.cache().misses();
        processor.refresh();
        assert_eq!(processor.cache().misses(), misses);
        assert!(processor.cache().hits() > 0);
    }

    #[test]
    fn test_blank_lines_count_toward_line_numbers() {
        let mut processor = SessionProcessor::default();
        processor.ingest_lines(["", "   ", "[1]"]);
        assert_eq!(processor.lines_seen(), 3);
        assert_eq!(processor.errors()[0].line, 3);
        assert_eq!(
            processor.errors()[0].kind,
            ParseErrorKind::UnrecognizedType
        );
        assert_eq!(processor.message_count(), 0);
    }

    #[test]
    fn test_source_error_is_recorded() {
        let mut processor = SessionProcessor::default();
        processor.on_line(LINES[0]);
        processor.on_error("pipe closed");
        let snapshot = processor.refresh();
        assert_eq!(snapshot.source_errors, vec!["pipe closed"]);
        assert_eq!(snapshot.message_count, 1);
        assert!(!snapshot.complete);
    }

    #[test]
    fn test_empty_batch() {
        let snapshot = process_batch(Vec::<String>::new());
        assert!(snapshot.tree.root.children.is_empty());
        assert_eq!(snapshot.tree.root.id, "session:unknown");
        assert_eq!(snapshot.message_count, 0);
        assert!(snapshot.errors.is_empty());
    }
}
