//! Formatting helpers for node labels and CLI output.

use chrono::{DateTime, Utc};

/// Truncate to at most `max_chars` characters, appending `…` when cut.
pub fn truncate_preview(input: &str, max_chars: usize) -> String {
    if input.chars().count() <= max_chars {
        return input.to_string();
    }
    let cut = input
        .char_indices()
        .nth(max_chars.saturating_sub(1))
        .map(|(idx, _)| &input[..idx])
        .unwrap_or(input);
    format!("{}…", cut)
}

/// First non-blank line, trimmed.
pub fn first_line(input: &str) -> &str {
    input
        .lines()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .unwrap_or("")
}

/// One-line preview: first non-blank line, truncated.
pub fn preview(input: &str, max_chars: usize) -> String {
    truncate_preview(first_line(input), max_chars)
}

/// Format a duration in milliseconds (e.g., "850ms", "4.2s", "3m 05s").
pub fn format_duration_ms(ms: u64) -> String {
    if ms < 1000 {
        format!("{}ms", ms)
    } else if ms < 60_000 {
        format!("{:.1}s", ms as f64 / 1000.0)
    } else {
        let secs = ms / 1000;
        format!("{}m {:02}s", secs / 60, secs % 60)
    }
}

/// Format a USD cost with four decimals (e.g., "$0.0123").
pub fn format_cost_usd(cost: f64) -> String {
    format!("${:.4}", cost)
}

/// Format an optional timestamp as `YYYY-MM-DD HH:MM:SS`, or `-` if missing.
pub fn format_timestamp_opt(ts: Option<DateTime<Utc>>) -> String {
    match ts {
        Some(ts) => ts.format("%Y-%m-%d %H:%M:%S").to_string(),
        None => "-".to_string(),
    }
}
