//! Configuration loading and management
//!
//! Configuration is loaded from `~/.config/convtree/config.toml`
//!
//! This module follows the XDG Base Directory Specification:
//! - Config: `$XDG_CONFIG_HOME/convtree/` (~/.config/convtree/)
//! - State/Logs: `$XDG_STATE_HOME/convtree/` (~/.local/state/convtree/)
//!
//! Every section is optional; a missing file yields [`Config::default`].

use crate::error::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Returns a best-effort home directory path.
fn home_dir() -> PathBuf {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Returns XDG_CONFIG_HOME or ~/.config
fn xdg_config_home() -> PathBuf {
    std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".config"))
}

/// Returns XDG_STATE_HOME or ~/.local/state
fn xdg_state_home() -> PathBuf {
    std::env::var("XDG_STATE_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".local/state"))
}

/// Main configuration struct
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    /// Content classification thresholds and tool name tables
    #[serde(default)]
    pub classifier: ClassifierConfig,

    /// Tree building options
    #[serde(default)]
    pub tree: TreeOptions,

    /// Streaming ingestion settings
    #[serde(default)]
    pub stream: StreamConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Thresholds and tool tables used by the content classifier.
///
/// The inline/popup size limits are UX tuning knobs; content at or below
/// both the line and char limit is displayed inline.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct ClassifierConfig {
    /// Max lines for generic text to stay inline
    pub text_inline_max_lines: usize,
    /// Max chars for generic text to stay inline
    pub text_inline_max_chars: usize,
    /// Max lines for file content to stay inline
    pub file_inline_max_lines: usize,
    /// Max chars for file content to stay inline
    pub file_inline_max_chars: usize,
    /// Tools whose output is terminal output
    pub shell_tools: Vec<String>,
    /// Tools whose output is file content
    pub file_read_tools: Vec<String>,
    /// Tools whose output is a list of paths or matches
    pub list_tools: Vec<String>,
    /// Tools whose output is fetched web content
    pub web_tools: Vec<String>,
    /// Namespace prefix of MCP tool names (`mcp__<server>__<tool>`)
    pub mcp_prefix: String,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            text_inline_max_lines: 10,
            text_inline_max_chars: 800,
            file_inline_max_lines: 20,
            file_inline_max_chars: 2000,
            shell_tools: to_strings(&["Bash", "BashOutput"]),
            file_read_tools: to_strings(&["Read", "NotebookRead"]),
            list_tools: to_strings(&["Glob", "Grep", "LS"]),
            web_tools: to_strings(&["WebFetch", "WebSearch"]),
            mcp_prefix: "mcp__".to_string(),
        }
    }
}

fn to_strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

/// Options controlling which nodes the tree builder emits.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct TreeOptions {
    /// Render records with unrecognised `type` values as message nodes
    pub include_opaque: bool,
    /// Skip user messages that only carry results already shown under their tool call
    pub fold_tool_result_messages: bool,
    /// Nodes shallower than this depth start expanded (root is depth 0)
    pub expand_depth: usize,
}

impl Default for TreeOptions {
    fn default() -> Self {
        Self {
            include_opaque: false,
            fold_tool_result_messages: false,
            expand_depth: 1,
        }
    }
}

/// Streaming ingestion configuration
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct StreamConfig {
    /// Rebuild the tree after this many ingested lines
    pub refresh_every: usize,
    /// Capacity of the line channel feeding the stream driver
    pub channel_capacity: usize,
    /// Poll interval for file watching, in milliseconds
    pub poll_interval_ms: u64,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            refresh_every: 25,
            channel_capacity: 1024,
            poll_interval_ms: 500,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Maximum number of log files to keep
    #[serde(default = "default_max_log_files")]
    pub max_files: usize,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            max_files: default_max_log_files(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_max_log_files() -> usize {
    5
}

impl Config {
    /// Load configuration from the default path
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path();

        if !config_path.exists() {
            tracing::info!("No config file found at {:?}, using defaults", config_path);
            return Ok(Config::default());
        }

        Self::load_from(&config_path)
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("failed to read config file {:?}: {}", path, e)))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("failed to parse config: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Reject settings that would make classification or streaming misbehave.
    pub fn validate(&self) -> Result<()> {
        let c = &self.classifier;
        if c.text_inline_max_lines == 0 || c.text_inline_max_chars == 0 {
            return Err(Error::Config(
                "classifier.text_inline_max_* must be greater than 0".to_string(),
            ));
        }
        if c.file_inline_max_lines == 0 || c.file_inline_max_chars == 0 {
            return Err(Error::Config(
                "classifier.file_inline_max_* must be greater than 0".to_string(),
            ));
        }
        if c.mcp_prefix.is_empty() {
            return Err(Error::Config(
                "classifier.mcp_prefix must not be empty".to_string(),
            ));
        }
        if self.stream.refresh_every == 0 {
            return Err(Error::Config(
                "stream.refresh_every must be greater than 0".to_string(),
            ));
        }
        if self.stream.channel_capacity == 0 {
            return Err(Error::Config(
                "stream.channel_capacity must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }

    /// Returns the default config file path
    ///
    /// `$XDG_CONFIG_HOME/convtree/config.toml` (~/.config/convtree/config.toml)
    pub fn config_path() -> PathBuf {
        xdg_config_home().join("convtree").join("config.toml")
    }

    /// Returns the state directory path (for logs)
    ///
    /// `$XDG_STATE_HOME/convtree/` (~/.local/state/convtree/)
    pub fn state_dir() -> PathBuf {
        xdg_state_home().join("convtree")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.classifier.text_inline_max_lines, 10);
        assert_eq!(config.classifier.mcp_prefix, "mcp__");
        assert!(config.classifier.shell_tools.contains(&"Bash".to_string()));
        assert_eq!(config.tree.expand_depth, 1);
        assert_eq!(config.stream.refresh_every, 25);
        assert_eq!(config.logging.level, "info");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_config() {
        let toml = r#"
[classifier]
file_inline_max_lines = 40
shell_tools = ["Bash", "Shell"]

[tree]
include_opaque = true

[stream]
refresh_every = 5

[logging]
level = "debug"
"#;
        let config: Config = toml::from_str(toml).unwrap();

        assert_eq!(config.classifier.file_inline_max_lines, 40);
        // Unset fields in a present section keep their defaults
        assert_eq!(config.classifier.file_inline_max_chars, 2000);
        assert_eq!(config.classifier.shell_tools, vec!["Bash", "Shell"]);
        assert!(config.tree.include_opaque);
        assert!(!config.tree.fold_tool_result_messages);
        assert_eq!(config.stream.refresh_every, 5);
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_validate_rejects_zero_thresholds() {
        let mut config = Config::default();
        config.classifier.text_inline_max_lines = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.stream.refresh_every = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[classifier]\ntext_inline_max_chars = 120\n").unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.classifier.text_inline_max_chars, 120);
    }

    #[test]
    fn test_load_from_invalid_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[stream]\nrefresh_every = 0\n").unwrap();
        assert!(matches!(Config::load_from(&path), Err(Error::Config(_))));

        std::fs::write(&path, "not = [valid").unwrap();
        assert!(matches!(Config::load_from(&path), Err(Error::Config(_))));
    }

    #[test]
    fn test_state_dir() {
        assert!(Config::state_dir().ends_with("convtree"));
    }
}
