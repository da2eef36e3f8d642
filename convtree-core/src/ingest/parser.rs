//! Line parser for Claude JSONL transcripts
//!
//! ## Design Principles
//!
//! 1. **Lossless capture**: Every parsed message preserves the complete record in `raw`
//! 2. **Resilience**: A bad line yields a [`ParseError`] but never stops a batch
//! 3. **Forward compatibility**: Unknown `type` values become [`Message::Other`]

use crate::error::{ParseError, Result};
use crate::message::{
    AssistantMessage, Envelope, Message, MessageKind, OpaqueMessage, ResultMessage,
    SummaryMessage, SystemMessage, UserMessage,
};
use serde::Deserialize;
use serde_json::Value;
use std::io::BufRead;

/// Result of parsing a batch of lines.
///
/// Holds every message that parsed and every line that did not, in line order.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ParseResult {
    /// Messages in input order
    pub messages: Vec<Message>,
    /// Per-line failures (non-fatal)
    pub errors: Vec<ParseError>,
}

impl ParseResult {
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn error_count(&self) -> usize {
        self.errors.len()
    }
}

/// Parse one raw line.
///
/// - Empty or whitespace-only → `Ok(None)`
/// - Invalid JSON → [`ParseErrorKind::Decode`](crate::error::ParseErrorKind::Decode)
/// - JSON without a usable `type` → [`ParseErrorKind::UnrecognizedType`](crate::error::ParseErrorKind::UnrecognizedType)
/// - Otherwise the matching [`Message`] variant
pub fn parse_line(raw: &str) -> std::result::Result<Option<Message>, ParseError> {
    let line = raw.trim();
    if line.is_empty() {
        return Ok(None);
    }

    let value: Value = serde_json::from_str(line)
        .map_err(|e| ParseError::decode(format!("JSON parse error: {}", e)))?;

    message_from_value(value).map(Some)
}

/// Build a [`Message`] from an already-decoded record.
pub fn message_from_value(value: Value) -> std::result::Result<Message, ParseError> {
    if !value.is_object() {
        return Err(ParseError::unrecognized("record is not a JSON object"));
    }

    let record_type = match value.get("type") {
        Some(Value::String(s)) if !s.trim().is_empty() => s.clone(),
        Some(Value::String(_)) => return Err(ParseError::unrecognized("empty `type` field")),
        Some(_) => return Err(ParseError::unrecognized("`type` field is not a string")),
        None => return Err(ParseError::unrecognized("missing `type` field")),
    };

    let envelope = Envelope::deserialize(&value)
        .map_err(|e| ParseError::decode(format!("invalid {} envelope: {}", record_type, e)))?;
    let shape_error =
        |e: serde_json::Error| ParseError::decode(format!("invalid {} record: {}", record_type, e));

    let message = match MessageKind::from_type(&record_type) {
        MessageKind::System => {
            let mut m = SystemMessage::deserialize(&value).map_err(shape_error)?;
            m.envelope = envelope;
            m.raw = value;
            Message::System(m)
        }
        MessageKind::User => {
            let mut m = UserMessage::deserialize(&value).map_err(shape_error)?;
            m.envelope = envelope;
            m.raw = value;
            Message::User(m)
        }
        MessageKind::Assistant => {
            let mut m = AssistantMessage::deserialize(&value).map_err(shape_error)?;
            m.envelope = envelope;
            m.raw = value;
            Message::Assistant(m)
        }
        MessageKind::Summary => {
            let mut m = SummaryMessage::deserialize(&value).map_err(shape_error)?;
            m.envelope = envelope;
            m.raw = value;
            Message::Summary(m)
        }
        MessageKind::Result => {
            let mut m = ResultMessage::deserialize(&value).map_err(shape_error)?;
            m.envelope = envelope;
            m.raw = value;
            Message::Result(m)
        }
        MessageKind::Other => {
            tracing::trace!(record_type = %record_type, "Passing through unrecognised record type");
            Message::Other(OpaqueMessage {
                envelope,
                raw: value,
            })
        }
    };

    Ok(message)
}

/// Parse every line, collecting all successes and all failures.
///
/// Errors carry 1-based line numbers. One malformed line never hides the rest.
pub fn parse_lines<I, S>(lines: I) -> ParseResult
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut result = ParseResult::default();

    for (idx, line) in lines.into_iter().enumerate() {
        let line_number = idx + 1;
        match parse_line(line.as_ref()) {
            Ok(Some(message)) => result.messages.push(message),
            Ok(None) => {}
            Err(e) => {
                let e = e.at_line(line_number);
                tracing::warn!(line = line_number, kind = e.kind.as_str(), "{}", e.message);
                result.errors.push(e);
            }
        }
    }

    tracing::debug!(
        messages = result.messages.len(),
        errors = result.errors.len(),
        "Parsed transcript lines"
    );

    result
}

/// Parse lines from a reader.
///
/// Lines that cannot be read (e.g. invalid UTF-8) are recorded as decode
/// errors. Only the caller opens files; this just consumes the stream.
pub fn parse_reader<R: BufRead>(reader: R) -> Result<ParseResult> {
    let mut result = ParseResult::default();

    for (idx, line_result) in reader.lines().enumerate() {
        let line_number = idx + 1;
        let line = match line_result {
            Ok(l) => l,
            Err(e) if e.kind() == std::io::ErrorKind::InvalidData => {
                tracing::warn!(line = line_number, error = %e, "Unreadable line");
                result
                    .errors
                    .push(ParseError::decode(format!("read error: {}", e)).at_line(line_number));
                continue;
            }
            Err(e) => return Err(e.into()),
        };

        match parse_line(&line) {
            Ok(Some(message)) => result.messages.push(message),
            Ok(None) => {}
            Err(e) => {
                let e = e.at_line(line_number);
                tracing::warn!(line = line_number, kind = e.kind.as_str(), "{}", e.message);
                result.errors.push(e);
            }
        }
    }

    Ok(result)
}
