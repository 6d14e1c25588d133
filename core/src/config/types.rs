//! Configuration types for narrow core
//!
//! Core only accepts fully resolved, validated configuration.
//! All discovery, loading, and merging happens in CLI layer.

use crate::error::ConfigError;
use crate::job::SearchMode;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Case matching policy passed to the worker
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CaseMatching {
    /// Case-insensitive unless the query contains an uppercase letter
    #[default]
    Smart,
    /// Always case-insensitive
    Ignore,
}

impl CaseMatching {
    /// Get the policy name as the worker expects it
    pub fn as_str(&self) -> &'static str {
        match self {
            CaseMatching::Smart => "smart",
            CaseMatching::Ignore => "ignore",
        }
    }
}

/// Debounce windows, in milliseconds
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DebounceConfig {
    /// Quiescence window before dispatching a job for heavy sources
    pub on_typed_ms: u64,
    /// Window used when the source is held in memory
    pub in_memory_ms: u64,
    /// Window for cursor movement before a preview is requested
    pub on_move_ms: u64,
    /// Shrink the typing window for smaller cached sources
    pub scale_by_source_size: bool,
}

impl Default for DebounceConfig {
    fn default() -> Self {
        Self {
            on_typed_ms: 300,
            in_memory_ms: 0,
            on_move_ms: 50,
            scale_by_source_size: true,
        }
    }
}

impl DebounceConfig {
    pub fn on_typed(&self) -> Duration {
        Duration::from_millis(self.on_typed_ms)
    }

    pub fn in_memory(&self) -> Duration {
        Duration::from_millis(self.in_memory_ms)
    }

    pub fn on_move(&self) -> Duration {
        Duration::from_millis(self.on_move_ms)
    }
}

/// Forerunner prefetch settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ForerunnerConfig {
    /// Whether sessions prefetch their source when they open
    pub enabled: bool,
    /// Results with more lines than this are written to a temp file
    pub output_threshold: usize,
}

impl Default for ForerunnerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            output_threshold: 30_000,
        }
    }
}

/// A fully resolved finder configuration ready for use by core
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FinderConfig {
    /// Matching worker executable, looked up on `PATH` when spawned
    pub worker_program: String,
    /// Debounce windows
    pub debounce: DebounceConfig,
    /// Forerunner prefetch settings
    pub forerunner: ForerunnerConfig,
    /// Upper bound for the `--number` result cap
    pub max_results: usize,
    /// Ask the worker to run in parallel
    pub par_run: bool,
    /// Display width used when the session does not report one
    pub default_winwidth: usize,
    /// Display height used when the session does not report one
    pub default_display_lines: usize,
    /// Shell command listing files, handed to the worker for `SourceKind::Files`
    pub files_command: String,
    /// Shell command listing tracked files for `SourceKind::GitFiles`
    pub git_files_command: String,
    /// Grep command line handed to the worker for live grep
    pub grep_command: String,
}

impl Default for FinderConfig {
    fn default() -> Self {
        Self {
            worker_program: "maple".to_string(),
            debounce: DebounceConfig::default(),
            forerunner: ForerunnerConfig::default(),
            max_results: 200,
            par_run: false,
            default_winwidth: 100,
            default_display_lines: 30,
            files_command: "rg --files --hidden --glob '!.git'".to_string(),
            git_files_command: "git ls-files --cached --others --exclude-standard".to_string(),
            grep_command: "rg --column --line-number --no-heading --color=never --smart-case"
                .to_string(),
        }
    }
}

impl FinderConfig {
    /// Set the worker executable
    pub fn with_worker_program(mut self, program: impl Into<String>) -> Self {
        self.worker_program = program.into();
        self
    }

    /// Set the debounce windows
    pub fn with_debounce(mut self, debounce: DebounceConfig) -> Self {
        self.debounce = debounce;
        self
    }

    /// Set the forerunner settings
    pub fn with_forerunner(mut self, forerunner: ForerunnerConfig) -> Self {
        self.forerunner = forerunner;
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.worker_program.trim().is_empty() {
            return Err(ConfigError::MissingField {
                field: "worker_program".to_string(),
            });
        }

        if self.max_results == 0 {
            return Err(ConfigError::InvalidValue {
                field: "max_results".to_string(),
                value: "0".to_string(),
            });
        }

        if self.debounce.on_move_ms == 0 {
            return Err(ConfigError::InvalidValue {
                field: "debounce.on_move_ms".to_string(),
                value: "0".to_string(),
            });
        }

        Ok(())
    }
}

/// Per-session context reported by the host when a finder opens
#[derive(Debug, Clone)]
pub struct SessionOptions {
    /// Directory every command runs in
    pub working_dir: PathBuf,
    /// Which worker subcommand serves this session
    pub mode: SearchMode,
    /// Width of the result window, for truncation
    pub winwidth: Option<usize>,
    /// Number of rows the result window can show
    pub display_lines: Option<usize>,
    /// Force case-insensitive matching
    pub ignore_case: bool,
    /// Ask the worker to decorate lines with an icon
    pub enable_icon: bool,
    /// Source command for dynamic lists
    pub source_cmd: Option<String>,
    /// Tag files searched in `SearchMode::Tags`
    pub tag_files: Vec<PathBuf>,
}

impl SessionOptions {
    /// Create options with defaults for everything but the directory and mode
    pub fn new(working_dir: impl Into<PathBuf>, mode: SearchMode) -> Self {
        Self {
            working_dir: working_dir.into(),
            mode,
            winwidth: None,
            display_lines: None,
            ignore_case: false,
            enable_icon: false,
            source_cmd: None,
            tag_files: Vec::new(),
        }
    }

    pub fn with_winwidth(mut self, winwidth: usize) -> Self {
        self.winwidth = Some(winwidth);
        self
    }

    pub fn with_display_lines(mut self, display_lines: usize) -> Self {
        self.display_lines = Some(display_lines);
        self
    }

    pub fn with_ignore_case(mut self, ignore_case: bool) -> Self {
        self.ignore_case = ignore_case;
        self
    }

    pub fn with_icon(mut self, enable_icon: bool) -> Self {
        self.enable_icon = enable_icon;
        self
    }

    pub fn with_source_cmd(mut self, source_cmd: impl Into<String>) -> Self {
        self.source_cmd = Some(source_cmd.into());
        self
    }

    pub fn with_tag_files(mut self, tag_files: Vec<PathBuf>) -> Self {
        self.tag_files = tag_files;
        self
    }

    /// Case policy derived from the session context
    pub fn case_matching(&self) -> CaseMatching {
        if self.ignore_case {
            CaseMatching::Ignore
        } else {
            CaseMatching::Smart
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::SourceKind;

    #[test]
    fn test_default_config_is_valid() {
        assert!(FinderConfig::default().validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_empty_worker() {
        let config = FinderConfig::default().with_worker_program("  ");
        assert!(matches!(
            config.validate(),
            Err(ConfigError::MissingField { .. })
        ));
    }

    #[test]
    fn test_validate_rejects_zero_move_window() {
        let config = FinderConfig::default().with_debounce(DebounceConfig {
            on_move_ms: 0,
            ..Default::default()
        });
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: FinderConfig =
            serde_json::from_str(r#"{"worker_program": "maple2", "debounce": {"on_typed_ms": 120}}"#)
                .unwrap();

        assert_eq!(config.worker_program, "maple2");
        assert_eq!(config.debounce.on_typed_ms, 120);
        assert_eq!(config.debounce.on_move_ms, 50);
        assert_eq!(config.max_results, 200);
    }

    #[test]
    fn test_case_matching_follows_session_context() {
        let options = SessionOptions::new("/repo", SearchMode::StaticFilter(SourceKind::Files));
        assert_eq!(options.case_matching(), CaseMatching::Smart);
        assert_eq!(
            options.with_ignore_case(true).case_matching(),
            CaseMatching::Ignore
        );
    }
}
