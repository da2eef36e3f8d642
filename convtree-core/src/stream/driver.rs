//! Async stream driver
//!
//! Bridges an asynchronous line source to a [`SessionProcessor`]. The source
//! pushes [`StreamEvent`]s into an `mpsc` channel; the driver ingests them,
//! publishes a [`Snapshot`] every `refresh_every` lines and once more when
//! the source ends, and stops early when the `watch` cancel flag flips to
//! `true`.
//!
//! Cancellation never loses data: the processor (with everything ingested
//! so far) is handed back in [`StreamOutcome`].

use super::{LineSink, SessionProcessor, Snapshot};
use crate::config::Config;
use tokio::sync::{mpsc, watch};

/// One item from a line source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    Line(String),
    /// The source finished cleanly
    Complete,
    /// The source failed and will send nothing more
    Error(String),
}

/// Why the driver stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEnd {
    Completed,
    Cancelled,
    Failed(String),
    /// Every event sender was dropped without a `Complete`
    SourceClosed,
}

/// What the driver hands back when it stops.
#[derive(Debug)]
pub struct StreamOutcome {
    pub processor: SessionProcessor,
    pub end: StreamEnd,
    pub snapshots_published: usize,
}

/// Feeds streamed lines into a processor and publishes snapshots.
#[derive(Debug)]
pub struct StreamDriver {
    processor: SessionProcessor,
    refresh_every: usize,
    since_refresh: usize,
    published: usize,
}

impl StreamDriver {
    pub fn new(processor: SessionProcessor, refresh_every: usize) -> Self {
        Self {
            processor,
            refresh_every: refresh_every.max(1),
            since_refresh: 0,
            published: 0,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            SessionProcessor::from_config(config),
            config.stream.refresh_every,
        )
    }

    /// Drive the stream to its end.
    pub async fn run(
        mut self,
        mut events: mpsc::Receiver<StreamEvent>,
        snapshots: mpsc::Sender<Snapshot>,
        mut cancel: watch::Receiver<bool>,
    ) -> StreamOutcome {
        let cancelled = *cancel.borrow_and_update();
        if cancelled {
            tracing::debug!("Stream cancelled before start");
            return self.finish(StreamEnd::Cancelled);
        }

        // Cleared once every cancel sender is gone; the stream can then only
        // end through the event channel.
        let mut cancel_live = true;

        let end = loop {
            tokio::select! {
                biased;

                changed = cancel.changed(), if cancel_live => {
                    if changed.is_err() {
                        cancel_live = false;
                    } else if *cancel.borrow_and_update() {
                        break StreamEnd::Cancelled;
                    }
                }
                event = events.recv() => {
                    let end = match event {
                        Some(StreamEvent::Line(line)) => {
                            self.processor.on_line(&line);
                            self.since_refresh += 1;
                            if self.since_refresh < self.refresh_every {
                                continue;
                            }
                            None
                        }
                        Some(StreamEvent::Complete) => {
                            self.processor.on_complete();
                            Some(StreamEnd::Completed)
                        }
                        Some(StreamEvent::Error(error)) => {
                            self.processor.on_error(&error);
                            Some(StreamEnd::Failed(error))
                        }
                        None => Some(StreamEnd::SourceClosed),
                    };

                    if !self.publish(&snapshots, &mut cancel, &mut cancel_live).await {
                        break StreamEnd::Cancelled;
                    }
                    if let Some(end) = end {
                        break end;
                    }
                }
            }
        };

        self.finish(end)
    }

    /// Send a fresh snapshot, waiting for room in the channel.
    ///
    /// Returns `false` when cancelled while the receiver is full.
    async fn publish(
        &mut self,
        snapshots: &mpsc::Sender<Snapshot>,
        cancel: &mut watch::Receiver<bool>,
        cancel_live: &mut bool,
    ) -> bool {
        self.since_refresh = 0;
        let snapshot = self.processor.refresh();
        let send = snapshots.send(snapshot);
        tokio::pin!(send);

        loop {
            tokio::select! {
                biased;

                changed = cancel.changed(), if *cancel_live => {
                    if changed.is_err() {
                        *cancel_live = false;
                    } else if *cancel.borrow_and_update() {
                        tracing::debug!("Stream cancelled while publishing");
                        return false;
                    }
                }
                sent = &mut send => {
                    if sent.is_err() {
                        tracing::debug!("Snapshot receiver dropped; continuing without publishing");
                    } else {
                        self.published += 1;
                    }
                    return true;
                }
            }
        }
    }

    fn finish(self, end: StreamEnd) -> StreamOutcome {
        tracing::info!(
            end = ?end,
            lines = self.processor.lines_seen(),
            messages = self.processor.message_count(),
            snapshots = self.published,
            "Stream finished"
        );
        StreamOutcome {
            processor: self.processor,
            end,
            snapshots_published: self.published,
        }
    }
}
