//! convtree - render Claude CLI transcripts as a conversation tree
//!
//! Reads one or more JSONL transcripts (or stdin) and prints the tree built
//! from each, either as an indented outline or as JSON.

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use convtree_core::format::{format_cost_usd, format_duration_ms, format_timestamp_opt};
use convtree_core::{
    Config, LinkMismatch, ParseError, SessionMetadata, SessionProcessor, Snapshot, Tree,
};
use serde::Serialize;
use std::collections::BTreeMap;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "convtree")]
#[command(about = "Render Claude conversation transcripts as a navigable tree")]
#[command(version)]
struct Args {
    /// Path(s) to JSONL transcript(s); reads stdin when omitted or `-`
    files: Vec<PathBuf>,

    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,

    /// Compact JSON output (default: pretty)
    #[arg(long)]
    compact: bool,

    /// Show only session metadata and counts (no tree)
    #[arg(long)]
    summary: bool,

    /// Render records with unrecognised types as nodes
    #[arg(long)]
    include_opaque: bool,

    /// Hide user messages whose results already appear under their tool call
    #[arg(long)]
    fold_results: bool,

    /// Nodes shallower than this depth start expanded
    #[arg(long)]
    expand_depth: Option<usize>,

    /// Only print children of expanded nodes in the outline
    #[arg(long)]
    collapsed: bool,

    /// Config file (default: ~/.config/convtree/config.toml)
    #[arg(long)]
    config: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

/// Output structure for one processed transcript
#[derive(Serialize)]
struct TreeOutput {
    file: String,
    metadata: SessionMetadata,
    #[serde(skip_serializing_if = "Option::is_none")]
    tree: Option<Tree>,
    stats: Stats,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    errors: Vec<ParseError>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    link_mismatches: Vec<LinkMismatch>,
}

#[derive(Serialize)]
struct Stats {
    message_count: usize,
    node_count: usize,
    parse_errors: usize,
    /// Node count per classified content type
    content_types: BTreeMap<String, usize>,
}

impl Stats {
    fn from_snapshot(snapshot: &Snapshot) -> Self {
        let mut content_types = BTreeMap::new();
        for result in snapshot.tree.classifications.values() {
            *content_types
                .entry(result.content_type.as_str().to_string())
                .or_insert(0) += 1;
        }
        Self {
            message_count: snapshot.message_count,
            node_count: snapshot.tree.node_count(),
            parse_errors: snapshot.errors.len(),
            content_types,
        }
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => Config::load_from(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => Config::load().context("Failed to load config")?,
    };
    if args.include_opaque {
        config.tree.include_opaque = true;
    }
    if args.fold_results {
        config.tree.fold_tool_result_messages = true;
    }
    if let Some(depth) = args.expand_depth {
        config.tree.expand_depth = depth;
    }

    let log_guard =
        convtree_core::logging::init(&config.logging).context("Failed to initialize logging")?;
    tracing::debug!(log_file = %log_guard.log_file().display(), "Writing logs");

    let sources: Vec<PathBuf> = if args.files.is_empty() {
        vec![PathBuf::from("-")]
    } else {
        args.files.clone()
    };

    let mut outputs = Vec::new();
    for source in &sources {
        let lines = match read_source(source) {
            Ok(Some(lines)) => lines,
            Ok(None) => {
                eprintln!("Warning: File not found: {}", source.display());
                continue;
            }
            Err(e) => {
                eprintln!("Warning: Failed to read {}: {:#}", source.display(), e);
                continue;
            }
        };

        tracing::info!(source = %source.display(), lines = lines.len(), "Processing transcript");
        let snapshot = SessionProcessor::from_config(&config).process_batch(&lines);
        outputs.push((source_name(source), snapshot));
    }

    if outputs.is_empty() {
        anyhow::bail!("No transcripts were successfully processed");
    }

    match args.format {
        OutputFormat::Json => print_json(&args, outputs)?,
        OutputFormat::Text => print_text(&args, &outputs),
    }

    Ok(())
}

/// Read all lines from a file, or from stdin for `-`.
///
/// Returns `Ok(None)` when the file does not exist. Invalid UTF-8 is
/// replaced rather than rejected so the parser can report the bad line.
fn read_source(source: &Path) -> Result<Option<Vec<String>>> {
    let bytes = if source == Path::new("-") {
        let mut buf = Vec::new();
        io::stdin()
            .lock()
            .read_to_end(&mut buf)
            .context("Failed to read stdin")?;
        buf
    } else {
        if !source.exists() {
            return Ok(None);
        }
        std::fs::read(source).with_context(|| format!("Failed to read {}", source.display()))?
    };

    let text = String::from_utf8_lossy(&bytes);
    Ok(Some(text.lines().map(str::to_string).collect()))
}

fn source_name(source: &Path) -> String {
    if source == Path::new("-") {
        "<stdin>".to_string()
    } else {
        source.display().to_string()
    }
}

fn print_json(args: &Args, outputs: Vec<(String, Snapshot)>) -> Result<()> {
    let outputs: Vec<TreeOutput> = outputs
        .into_iter()
        .map(|(file, snapshot)| {
            let stats = Stats::from_snapshot(&snapshot);
            TreeOutput {
                file,
                metadata: snapshot.metadata,
                tree: (!args.summary).then_some(snapshot.tree),
                stats,
                errors: snapshot.errors,
                link_mismatches: snapshot.link_mismatches,
            }
        })
        .collect();

    // Output: single object for one file, array for multiple
    let json = if outputs.len() == 1 {
        if args.compact {
            serde_json::to_string(&outputs[0])?
        } else {
            serde_json::to_string_pretty(&outputs[0])?
        }
    } else if args.compact {
        serde_json::to_string(&outputs)?
    } else {
        serde_json::to_string_pretty(&outputs)?
    };

    println!("{}", json);
    Ok(())
}

fn print_text(args: &Args, outputs: &[(String, Snapshot)]) {
    for (i, (file, snapshot)) in outputs.iter().enumerate() {
        if i > 0 {
            println!();
        }
        if outputs.len() > 1 {
            println!("== {} ==", file);
        }

        print_metadata(&snapshot.metadata, snapshot.message_count);
        if !args.summary {
            println!();
            print!("{}", snapshot.tree.render_outline(args.collapsed));
        }

        for error in &snapshot.errors {
            eprintln!("{}: {}", file, error);
        }
        for mismatch in &snapshot.link_mismatches {
            eprintln!("{}: {}", file, mismatch);
        }
    }
}

fn print_metadata(meta: &SessionMetadata, message_count: usize) {
    println!(
        "Session: {}",
        meta.session_id.as_deref().unwrap_or("(unknown)")
    );
    if let Some(summary) = &meta.summary {
        println!("Summary: {}", summary);
    }
    if let Some(cwd) = &meta.cwd {
        println!("Directory: {}", cwd);
    }
    if let Some(branch) = &meta.git_branch {
        println!("Branch: {}", branch);
    }
    if let Some(model) = &meta.model {
        println!("Model: {}", model);
    }
    println!("Messages: {}", message_count);
    println!(
        "Started: {}  Last activity: {}",
        format_timestamp_opt(meta.first_timestamp),
        format_timestamp_opt(meta.last_timestamp)
    );
    if let Some(cost) = meta.total_cost_usd {
        println!("Cost: {}", format_cost_usd(cost));
    }
    if let Some(ms) = meta.duration_ms {
        println!("Duration: {}", format_duration_ms(ms));
    }
}
