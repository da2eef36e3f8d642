//! Message consolidation
//!
//! The Claude CLI streams one assistant turn as several records that share
//! `message.id`: typically a text chunk, then one record per tool call.
//! Consolidation folds those chunks back into a single logical message.
//!
//! ## Rules
//!
//! - Assistant chunks with the same stream id merge into the first chunk of
//!   the run; content blocks are concatenated in encounter order and never
//!   deduplicated.
//! - Non-assistant records (tool results, system notes) may sit between
//!   chunks without breaking the run.
//! - An assistant record with a different (or missing) stream id closes the run.
//!
//! [`consolidate`] is a fold over [`Consolidator::push`], so feeding messages
//! one at a time and finishing produces exactly the batch result.

use crate::message::{AssistantMessage, Message};

/// Incremental consolidator.
#[derive(Debug, Default, Clone)]
pub struct Consolidator {
    messages: Vec<Message>,
    /// Stream id of the open assistant run and its position in `messages`
    open_run: Option<(String, usize)>,
}

impl Consolidator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed the next message in stream order.
    pub fn push(&mut self, message: Message) {
        let chunk = match message {
            Message::Assistant(chunk) => chunk,
            other => {
                self.messages.push(other);
                return;
            }
        };

        let run_idx = match (&chunk.message.id, &self.open_run) {
            (Some(stream_id), Some((open_id, idx))) if stream_id == open_id => Some(*idx),
            _ => None,
        };
        if let Some(idx) = run_idx {
            if let Some(Message::Assistant(target)) = self.messages.get_mut(idx) {
                tracing::trace!(stream_id = ?target.message.id, "Merging assistant chunk");
                merge_chunk(target, chunk);
                return;
            }
        }

        self.open_run = chunk
            .message
            .id
            .clone()
            .map(|id| (id, self.messages.len()));
        self.messages.push(Message::Assistant(chunk));
    }

    /// Messages consolidated so far.
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn finish(self) -> Vec<Message> {
        self.messages
    }
}

/// Merge a later chunk into the first chunk of its run.
///
/// The target keeps its envelope and raw record; `stop_reason` and `usage`
/// follow the latest chunk that reports them.
fn merge_chunk(target: &mut AssistantMessage, chunk: AssistantMessage) {
    let body = chunk.message;
    target.message.content.append(body.content);
    if body.stop_reason.is_some() {
        target.message.stop_reason = body.stop_reason;
    }
    if body.usage.is_some() {
        target.message.usage = body.usage;
    }
    if target.message.model.is_none() {
        target.message.model = body.model;
    }
}

/// Consolidate a full message sequence.
pub fn consolidate<I>(messages: I) -> Vec<Message>
where
    I: IntoIterator<Item = Message>,
{
    let mut consolidator = Consolidator::new();
    for message in messages {
        consolidator.push(message);
    }
    consolidator.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::parser::{parse_line, parse_lines};
    use crate::message::{ContentBlock, MessageKind};

    fn msg(line: &str) -> Message {
        parse_line(line).unwrap().unwrap()
    }

    fn texts(message: &Message) -> Vec<String> {
        message
            .content_blocks()
            .iter()
            .filter_map(|b| match b {
                ContentBlock::Text { text } => Some(text.clone()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_same_stream_id_merges_in_order() {
        let merged = consolidate(vec![
            msg(r#"{"type":"assistant","message":{"id":"m1","content":[{"type":"text","text":"Hello"}]}}"#),
            msg(r#"{"type":"assistant","message":{"id":"m1","content":[{"type":"text","text":" world"}]}}"#),
        ]);

        assert_eq!(merged.len(), 1);
        assert_eq!(texts(&merged[0]), vec!["Hello", " world"]);
    }

    #[test]
    fn test_duplicate_blocks_are_kept() {
        let line = r#"{"type":"assistant","message":{"id":"m1","content":[{"type":"text","text":"same"}]}}"#;
        let merged = consolidate(vec![msg(line), msg(line)]);
        assert_eq!(texts(&merged[0]), vec!["same", "same"]);
    }

    #[test]
    fn test_distinct_ids_stay_separate() {
        let merged = consolidate(vec![
            msg(r#"{"type":"assistant","message":{"id":"m1","content":[{"type":"text","text":"a"}]}}"#),
            msg(r#"{"type":"assistant","message":{"id":"m2","content":[{"type":"text","text":"b"}]}}"#),
            msg(r#"{"type":"assistant","message":{"id":"m1","content":[{"type":"text","text":"c"}]}}"#),
        ]);
        assert_eq!(merged.len(), 3);
    }

    #[test]
    fn test_missing_stream_id_never_merges() {
        let line = r#"{"type":"assistant","message":{"content":[{"type":"text","text":"x"}]}}"#;
        let merged = consolidate(vec![msg(line), msg(line)]);
        assert_eq!(merged.len(), 2);
    }

    #[test]
    fn test_non_assistant_between_chunks_keeps_run_open() {
        let merged = consolidate(vec![
            msg(r#"{"type":"assistant","message":{"id":"m1","content":[{"type":"tool_use","id":"t1","name":"Read","input":{}}]}}"#),
            msg(r#"{"type":"user","message":{"content":[{"type":"tool_result","tool_use_id":"t1","content":"x"}]}}"#),
            msg(r#"{"type":"assistant","message":{"id":"m1","content":[{"type":"tool_use","id":"t2","name":"Read","input":{}}]}}"#),
        ]);

        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].kind(), MessageKind::Assistant);
        assert_eq!(merged[0].tool_uses().len(), 2);
        assert_eq!(merged[1].kind(), MessageKind::User);
    }

    #[test]
    fn test_merge_keeps_first_envelope_and_latest_stop_reason() {
        let merged = consolidate(vec![
            msg(r#"{"type":"assistant","uuid":"first","message":{"id":"m1","content":[{"type":"text","text":"a"}]}}"#),
            msg(r#"{"type":"assistant","uuid":"second","message":{"id":"m1","stop_reason":"end_turn","usage":{"output_tokens":7},"content":[{"type":"text","text":"b"}]}}"#),
        ]);

        assert_eq!(merged[0].uuid(), Some("first"));
        match &merged[0] {
            Message::Assistant(m) => {
                assert_eq!(m.message.stop_reason.as_deref(), Some("end_turn"));
                assert_eq!(m.message.usage.as_ref().unwrap().output_tokens, Some(7));
            }
            other => panic!("expected assistant, got {:?}", other.kind()),
        }
    }

    #[test]
    fn test_incremental_matches_batch() {
        let lines = [
            r#"{"type":"assistant","message":{"id":"m1","content":[{"type":"text","text":"a"}]}}"#,
            r#"{"type":"assistant","message":{"id":"m1","content":[{"type":"tool_use","id":"t1","name":"Bash","input":{}}]}}"#,
            r#"{"type":"user","message":{"content":[{"type":"tool_result","tool_use_id":"t1","content":"ok"}]}}"#,
            r#"{"type":"assistant","message":{"id":"m2","content":[{"type":"text","text":"done"}]}}"#,
        ];
        let batch = consolidate(parse_lines(lines).messages);

        let mut incremental = Consolidator::new();
        for line in lines {
            if let Ok(Some(m)) = parse_line(line) {
                incremental.push(m);
            }
        }
        assert_eq!(incremental.messages(), batch.as_slice());
        assert_eq!(incremental.finish(), batch);
    }

    #[test]
    fn test_consolidate_is_idempotent() {
        let once = consolidate(vec![
            msg(r#"{"type":"assistant","message":{"id":"m1","content":[{"type":"text","text":"a"}]}}"#),
            msg(r#"{"type":"assistant","message":{"id":"m1","content":[{"type":"text","text":"b"}]}}"#),
        ]);
        let twice = consolidate(once.clone());
        assert_eq!(once, twice);
    }

    #[test]
    fn test_empty_input() {
        assert!(consolidate(Vec::new()).is_empty());
        assert!(Consolidator::new().is_empty());
    }
}
