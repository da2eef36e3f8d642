//! convtree-watch - follow a growing transcript and rebuild its tree
//!
//! Polls a JSONL transcript for appended lines and streams them into the
//! conversation tree as they arrive. Uses polling to reliably detect append
//! operations on macOS. Each refresh prints a one-line progress event; the
//! final tree is printed when the stream ends or Ctrl+C is pressed.

use anyhow::{Context, Result};
use clap::Parser;
use convtree_core::{Config, Snapshot, StreamDriver, StreamEnd, StreamEvent};
use serde::Serialize;
use std::io::{self, SeekFrom};
use std::path::PathBuf;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tokio::sync::{mpsc, watch};

#[derive(Parser)]
#[command(name = "convtree-watch")]
#[command(about = "Watch a Claude transcript and rebuild its tree as it grows")]
#[command(version)]
struct Args {
    /// Path to the JSONL transcript to watch
    #[arg(required = true)]
    path: PathBuf,

    /// Emit JSON lines instead of text
    #[arg(long)]
    json: bool,

    /// Poll interval in milliseconds (default: stream.poll_interval_ms)
    #[arg(long)]
    poll: Option<u64>,

    /// Rebuild the tree after this many lines (default: stream.refresh_every)
    #[arg(long)]
    refresh_every: Option<usize>,

    /// Skip content already in the file and only follow new lines
    #[arg(long)]
    tail: bool,

    /// Stop after this many consecutive polls without new content
    #[arg(long)]
    exit_after_idle: Option<u32>,

    /// Print only progress events, not the final tree
    #[arg(long)]
    summary: bool,

    /// Config file (default: ~/.config/convtree/config.toml)
    #[arg(long)]
    config: Option<PathBuf>,
}

/// One progress event per published snapshot
#[derive(Serialize)]
struct RefreshEvent<'a> {
    event: &'static str,
    file: &'a str,
    message_count: usize,
    node_count: usize,
    parse_errors: usize,
    unlinked_results: usize,
    complete: bool,
}

impl<'a> RefreshEvent<'a> {
    fn new(file: &'a str, snapshot: &Snapshot) -> Self {
        Self {
            event: "refresh",
            file,
            message_count: snapshot.message_count,
            node_count: snapshot.tree.node_count(),
            parse_errors: snapshot.errors.len(),
            unlinked_results: snapshot.link_mismatches.len(),
            complete: snapshot.complete,
        }
    }
}

/// Tracks the read position of the watched file.
///
/// Bytes after the last newline stay buffered until the line is finished.
struct Tailer {
    path: PathBuf,
    offset: u64,
    partial: Vec<u8>,
    /// Started mid-line; drop bytes up to the next newline
    skip_fragment: bool,
}

impl Tailer {
    fn new(path: PathBuf, offset: u64) -> Self {
        Self {
            path,
            offset,
            partial: Vec::new(),
            skip_fragment: false,
        }
    }

    /// Start at the current end of the file, skipping a line the writer
    /// is still in the middle of.
    async fn at_end(path: PathBuf) -> io::Result<Self> {
        let len = tokio::fs::metadata(&path).await?.len();
        let mut tailer = Self::new(path, len);
        if len > 0 {
            let mut file = tokio::fs::File::open(&tailer.path).await?;
            file.seek(SeekFrom::Start(len - 1)).await?;
            let mut last = [0u8; 1];
            file.read_exact(&mut last).await?;
            tailer.skip_fragment = last[0] != b'\n';
        }
        Ok(tailer)
    }

    /// Read complete lines appended since the last call.
    async fn read_new_lines(&mut self) -> io::Result<Vec<String>> {
        let len = tokio::fs::metadata(&self.path).await?.len();
        if len < self.offset {
            return Err(io::Error::new(
                io::ErrorKind::Other,
                format!(
                    "file shrank from {} to {} bytes; transcript was truncated",
                    self.offset, len
                ),
            ));
        }
        if len == self.offset {
            return Ok(Vec::new());
        }

        let mut file = tokio::fs::File::open(&self.path).await?;
        file.seek(SeekFrom::Start(self.offset)).await?;
        let mut buf = Vec::new();
        let read = file.take(len - self.offset).read_to_end(&mut buf).await?;
        self.offset += read as u64;
        self.partial.extend_from_slice(&buf);

        if self.skip_fragment {
            match self.partial.iter().position(|b| *b == b'\n') {
                Some(pos) => {
                    self.partial.drain(..=pos);
                    self.skip_fragment = false;
                }
                None => self.partial.clear(),
            }
        }

        let mut lines = Vec::new();
        while let Some(pos) = self.partial.iter().position(|b| *b == b'\n') {
            let raw: Vec<u8> = self.partial.drain(..=pos).collect();
            lines.push(decode_line(&raw[..raw.len() - 1]));
        }
        Ok(lines)
    }

    /// Hand out an unterminated trailing line, if any.
    fn flush(&mut self) -> Option<String> {
        if self.partial.is_empty() || self.skip_fragment {
            self.partial.clear();
            return None;
        }
        let raw = std::mem::take(&mut self.partial);
        Some(decode_line(&raw))
    }
}

fn decode_line(raw: &[u8]) -> String {
    let line = String::from_utf8_lossy(raw);
    let line: &str = &line;
    line.strip_suffix('\r').unwrap_or(line).to_string()
}

/// Poll the file and push appended lines into the driver's channel.
async fn follow(
    mut tailer: Tailer,
    poll: Duration,
    exit_after_idle: Option<u32>,
    events: mpsc::Sender<StreamEvent>,
    mut cancel: watch::Receiver<bool>,
) {
    let mut idle_polls = 0u32;

    loop {
        match tailer.read_new_lines().await {
            Ok(lines) if lines.is_empty() => idle_polls = idle_polls.saturating_add(1),
            Ok(lines) => {
                idle_polls = 0;
                tracing::debug!(lines = lines.len(), offset = tailer.offset, "Read appended lines");
                for line in lines {
                    if events.send(StreamEvent::Line(line)).await.is_err() {
                        return;
                    }
                }
            }
            Err(e) => {
                tracing::warn!(
                    path = %tailer.path.display(),
                    error = %e,
                    "Failed to read transcript"
                );
                let _ = events.send(StreamEvent::Error(e.to_string())).await;
                return;
            }
        }

        if exit_after_idle.is_some_and(|limit| idle_polls >= limit) {
            if let Some(line) = tailer.flush() {
                if events.send(StreamEvent::Line(line)).await.is_err() {
                    return;
                }
            }
            let _ = events.send(StreamEvent::Complete).await;
            return;
        }

        tokio::select! {
            _ = tokio::time::sleep(poll) => {}
            changed = cancel.changed() => {
                if changed.is_err() || *cancel.borrow() {
                    return;
                }
            }
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => Config::load_from(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => Config::load().context("Failed to load config")?,
    };
    if let Some(n) = args.refresh_every {
        config.stream.refresh_every = n.max(1);
    }

    let log_guard =
        convtree_core::logging::init(&config.logging).context("Failed to initialize logging")?;
    tracing::debug!(log_file = %log_guard.log_file().display(), "Writing logs");

    if !args.path.is_file() {
        anyhow::bail!("File does not exist: {}", args.path.display());
    }

    let tailer = if args.tail {
        Tailer::at_end(args.path.clone())
            .await
            .with_context(|| format!("Failed to read metadata: {}", args.path.display()))?
    } else {
        Tailer::new(args.path.clone(), 0)
    };
    let poll = Duration::from_millis(args.poll.unwrap_or(config.stream.poll_interval_ms));
    let file = args.path.display().to_string();

    eprintln!(
        "Watching {} (poll every {}ms). Ctrl+C to stop...",
        file,
        poll.as_millis()
    );

    let (event_tx, event_rx) = mpsc::channel(config.stream.channel_capacity);
    let (snapshot_tx, mut snapshot_rx) = mpsc::channel::<Snapshot>(16);
    let (cancel_tx, cancel_rx) = watch::channel(false);

    ctrlc::set_handler(move || {
        let _ = cancel_tx.send(true);
    })
    .context("Failed to set Ctrl+C handler")?;

    let follower = tokio::spawn(follow(
        tailer,
        poll,
        args.exit_after_idle,
        event_tx,
        cancel_rx.clone(),
    ));
    let driver = tokio::spawn(StreamDriver::from_config(&config).run(
        event_rx,
        snapshot_tx,
        cancel_rx,
    ));

    while let Some(snapshot) = snapshot_rx.recv().await {
        print_refresh(&file, &snapshot, args.json)?;
    }

    let outcome = driver.await.context("Stream driver task failed")?;
    follower.abort();

    let mut processor = outcome.processor;
    let snapshot = processor.refresh();
    match &outcome.end {
        StreamEnd::Completed => {}
        StreamEnd::Cancelled => eprintln!("Stopped after {} lines", processor.lines_seen()),
        StreamEnd::Failed(error) => eprintln!("Warning: {}", error),
        StreamEnd::SourceClosed => eprintln!("Warning: line source closed unexpectedly"),
    }

    if !args.summary {
        print_final(&snapshot, args.json)?;
    }

    Ok(())
}

fn print_refresh(file: &str, snapshot: &Snapshot, json: bool) -> Result<()> {
    let event = RefreshEvent::new(file, snapshot);
    if json {
        println!("{}", serde_json::to_string(&event)?);
    } else {
        println!(
            "[refresh] {} messages, {} nodes, {} parse errors, {} unlinked results",
            event.message_count, event.node_count, event.parse_errors, event.unlinked_results
        );
    }
    Ok(())
}

fn print_final(snapshot: &Snapshot, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string(snapshot)?);
    } else {
        println!();
        print!("{}", snapshot.tree.render_outline(false));
    }
    Ok(())
}
