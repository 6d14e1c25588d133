//! Session options as given on the command line or in a `new_session` request

use anyhow::{anyhow, Result};
use clap::{Args, ValueEnum};
use narrow_core::{SearchMode, SessionOptions, SourceKind};
use serde::Deserialize;
use std::path::PathBuf;

/// Finder mode names understood by the CLI and the stdio protocol
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Mode {
    /// Filter every file under the working directory
    #[default]
    Files,
    /// Filter files tracked by git
    GitFiles,
    /// Filter the output of `--cmd`
    Command,
    /// Live grep
    Grep,
    /// Filter tag files
    Tags,
    /// Filter the streaming output of `--cmd`
    Dynamic,
}

impl Mode {
    pub fn search_mode(self, source_cmd: Option<&str>) -> Result<SearchMode> {
        Ok(match self {
            Mode::Files => SearchMode::StaticFilter(SourceKind::Files),
            Mode::GitFiles => SearchMode::StaticFilter(SourceKind::GitFiles),
            Mode::Command => {
                let cmd = source_cmd.ok_or_else(|| anyhow!("--mode command requires --cmd"))?;
                SearchMode::StaticFilter(SourceKind::Command(cmd.to_string()))
            }
            Mode::Grep => SearchMode::LiveGrep,
            Mode::Tags => SearchMode::Tags,
            Mode::Dynamic => SearchMode::DynamicList,
        })
    }
}

/// Per-session flags
#[derive(Debug, Clone, Default, Args, Deserialize)]
pub struct SessionArgs {
    /// Finder mode
    #[arg(long, value_enum, default_value_t = Mode::Files)]
    #[serde(default)]
    pub mode: Mode,

    /// Directory the finder runs in (defaults to the current directory)
    #[arg(long)]
    pub cwd: Option<PathBuf>,

    /// Source command for `command` and `dynamic` modes
    #[arg(long = "cmd")]
    pub source_cmd: Option<String>,

    /// Width of the result window
    #[arg(long)]
    pub winwidth: Option<usize>,

    /// Number of result rows
    #[arg(long = "lines")]
    pub display_lines: Option<usize>,

    /// Always match case-insensitively
    #[arg(long)]
    #[serde(default)]
    pub ignore_case: bool,

    /// Ask the worker to prepend icons
    #[arg(long = "icon")]
    #[serde(default)]
    pub enable_icon: bool,

    /// Tag file for `tags` mode (repeatable)
    #[arg(long = "tag-file")]
    #[serde(default)]
    pub tag_files: Vec<PathBuf>,
}

impl SessionArgs {
    /// Resolve into core session options
    pub fn to_options(&self) -> Result<SessionOptions> {
        let working_dir = match &self.cwd {
            Some(dir) => crate::config::expand_path(dir),
            None => std::env::current_dir()?,
        };
        let mode = self.mode.search_mode(self.source_cmd.as_deref())?;

        let mut options = SessionOptions::new(working_dir, mode)
            .with_ignore_case(self.ignore_case)
            .with_icon(self.enable_icon)
            .with_tag_files(
                self.tag_files
                    .iter()
                    .map(|file| crate::config::expand_path(file))
                    .collect(),
            );
        if let Some(winwidth) = self.winwidth {
            options = options.with_winwidth(winwidth);
        }
        if let Some(lines) = self.display_lines {
            options = options.with_display_lines(lines);
        }
        if let Some(cmd) = &self.source_cmd {
            options = options.with_source_cmd(cmd.clone());
        }
        Ok(options)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_mode_needs_cmd() {
        assert!(Mode::Command.search_mode(None).is_err());
        assert_eq!(
            Mode::Command.search_mode(Some("fd")).unwrap(),
            SearchMode::StaticFilter(SourceKind::Command("fd".to_string()))
        );
    }

    #[test]
    fn test_request_fields_deserialize() {
        let args: SessionArgs = serde_json::from_str(
            r#"{"mode": "git-files", "cwd": "/repo", "winwidth": 90, "ignore_case": true}"#,
        )
        .unwrap();

        let options = args.to_options().unwrap();
        assert_eq!(options.mode, SearchMode::StaticFilter(SourceKind::GitFiles));
        assert_eq!(options.working_dir, PathBuf::from("/repo"));
        assert_eq!(options.winwidth, Some(90));
        assert!(options.ignore_case);
    }
}
