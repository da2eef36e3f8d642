//! Session-level metadata
//!
//! Identity fields (session id, cwd, branch, CLI version, model) are spread
//! across records and often only present on some of them. The first
//! non-empty value wins. Summary and result records describe the session as
//! a whole, so the last one wins.

use crate::message::Message;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

/// Aggregated facts about one conversation.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SessionMetadata {
    pub session_id: Option<String>,
    pub cwd: Option<String>,
    pub git_branch: Option<String>,
    pub version: Option<String>,
    pub model: Option<String>,
    pub message_count: usize,
    pub summary: Option<String>,
    pub total_cost_usd: Option<f64>,
    pub duration_ms: Option<u64>,
    pub num_turns: Option<u32>,
    pub first_timestamp: Option<DateTime<Utc>>,
    pub last_timestamp: Option<DateTime<Utc>>,
}

impl SessionMetadata {
    pub fn from_messages(messages: &[Message]) -> Self {
        let mut meta = SessionMetadata {
            message_count: messages.len(),
            ..Default::default()
        };

        for message in messages {
            let env = message.envelope();
            fill(&mut meta.session_id, env.session_id.as_deref());
            fill(&mut meta.cwd, env.cwd.as_deref());
            fill(&mut meta.git_branch, env.git_branch.as_deref());
            fill(&mut meta.version, env.version.as_deref());
            fill(&mut meta.model, message.model());

            if let Some(ts) = message.timestamp_utc() {
                meta.first_timestamp = Some(meta.first_timestamp.map_or(ts, |f| f.min(ts)));
                meta.last_timestamp = Some(meta.last_timestamp.map_or(ts, |l| l.max(ts)));
            }

            match message {
                Message::Summary(s) if !s.summary.is_empty() => {
                    meta.summary = Some(s.summary.clone());
                }
                Message::Result(r) => {
                    if r.total_cost_usd.is_some() {
                        meta.total_cost_usd = r.total_cost_usd;
                    }
                    if r.duration_ms.is_some() {
                        meta.duration_ms = r.duration_ms;
                    }
                    if r.num_turns.is_some() {
                        meta.num_turns = r.num_turns;
                    }
                }
                _ => {}
            }
        }

        meta
    }

    /// Wall-clock span between the first and last timestamped record.
    pub fn span(&self) -> Option<chrono::Duration> {
        Some(self.last_timestamp? - self.first_timestamp?)
    }
}

fn fill(slot: &mut Option<String>, value: Option<&str>) {
    if slot.is_none() {
        if let Some(v) = value.filter(|v| !v.is_empty()) {
            *slot = Some(v.to_string());
        }
    }
}

/// Metadata supplied by the host that may still be loading.
///
/// The tree builder never waits on it; a pending enrichment only flags the
/// root so the host knows to rebuild once it resolves. Defaults to an empty
/// resolved set; hosts opt in to `Pending` explicitly.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", content = "fields", rename_all = "snake_case")]
pub enum Enrichment {
    Pending,
    Resolved(BTreeMap<String, String>),
}

impl Default for Enrichment {
    fn default() -> Self {
        Enrichment::Resolved(BTreeMap::new())
    }
}

impl Enrichment {
    pub fn is_pending(&self) -> bool {
        matches!(self, Enrichment::Pending)
    }
}

/// Session identity handed to the tree builder.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SessionInfo {
    pub session_id: Option<String>,
    /// Display title, e.g. the session summary
    pub title: Option<String>,
    pub enrichment: Enrichment,
}

impl SessionInfo {
    pub fn new(session_id: impl Into<String>) -> Self {
        Self {
            session_id: Some(session_id.into()),
            title: None,
            enrichment: Enrichment::default(),
        }
    }

    /// Session info derived from the transcript itself; nothing is pending.
    pub fn from_metadata(meta: &SessionMetadata) -> Self {
        Self {
            session_id: meta.session_id.clone(),
            title: meta.summary.clone(),
            enrichment: Enrichment::default(),
        }
    }

    pub fn with_enrichment(mut self, enrichment: Enrichment) -> Self {
        self.enrichment = enrichment;
        self
    }
}
