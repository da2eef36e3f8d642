//! Error types for convtree-core

use serde::Serialize;
use thiserror::Error;

/// Main error type for the convtree-core library
#[derive(Error, Debug)]
pub enum Error {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A transcript line could not be turned into a message
    #[error(transparent)]
    Parse(#[from] ParseError),

    /// JSON parsing error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Stream driver error
    #[error("stream error: {0}")]
    Stream(String),
}

/// Result type alias for convtree-core
pub type Result<T> = std::result::Result<T, Error>;

/// Why a single transcript line was skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ParseErrorKind {
    /// The line is not valid JSON, or a known record has the wrong shape
    Decode,
    /// Valid JSON without a usable `type` discriminant
    UnrecognizedType,
}

impl ParseErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ParseErrorKind::Decode => "decode_error",
            ParseErrorKind::UnrecognizedType => "unrecognized_type",
        }
    }
}

/// A recoverable, per-line parse failure.
///
/// These are collected next to successfully parsed messages and never abort
/// a batch.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
#[error("line {line}: {kind_str}: {message}", kind_str = .kind.as_str())]
pub struct ParseError {
    pub kind: ParseErrorKind,
    /// 1-based line number, or 0 when the line was parsed in isolation
    pub line: usize,
    pub message: String,
}

impl ParseError {
    pub fn decode(message: impl Into<String>) -> Self {
        Self {
            kind: ParseErrorKind::Decode,
            line: 0,
            message: message.into(),
        }
    }

    pub fn unrecognized(message: impl Into<String>) -> Self {
        Self {
            kind: ParseErrorKind::UnrecognizedType,
            line: 0,
            message: message.into(),
        }
    }

    /// Attach the line number this error came from.
    pub fn at_line(mut self, line: usize) -> Self {
        self.line = line;
        self
    }
}
