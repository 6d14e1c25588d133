//! Jobs: one spawned matching worker per dispatched query

pub mod args;
pub mod dispatcher;

pub use args::{build_worker_args, result_cap, worker_command, JobInput};
pub use dispatcher::JobDispatcher;

use crate::config::FinderConfig;
use crate::generation::Generation;
use crate::process::ProcessHandle;
use std::time::Duration;
use tokio::time::Instant;

/// Where a static filter gets its candidates from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceKind {
    /// Every file under the working directory
    Files,
    /// Files known to git
    GitFiles,
    /// Output of an arbitrary shell command
    Command(String),
}

impl SourceKind {
    /// Shell command the worker runs to enumerate this source
    pub fn shell_command<'a>(&'a self, config: &'a FinderConfig) -> &'a str {
        match self {
            SourceKind::Files => &config.files_command,
            SourceKind::GitFiles => &config.git_files_command,
            SourceKind::Command(cmd) => cmd,
        }
    }
}

/// Selects the worker subcommand and argument shape of a session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchMode {
    /// Filter a fixed candidate list, one final batch per query
    StaticFilter(SourceKind),
    /// Run the grep command for every query
    LiveGrep,
    /// Filter tag files
    Tags,
    /// Filter a source that streams, progress batches per query
    DynamicList,
}

impl SearchMode {
    /// Worker subcommand
    pub fn subcommand(&self) -> &'static str {
        match self {
            SearchMode::StaticFilter(_) | SearchMode::DynamicList => "filter",
            SearchMode::LiveGrep => "grep",
            SearchMode::Tags => "tags",
        }
    }

    /// Decoration hint passed with `--icon`
    pub fn icon(&self) -> &'static str {
        match self {
            SearchMode::StaticFilter(_) | SearchMode::DynamicList => "file",
            SearchMode::LiveGrep => "grep",
            SearchMode::Tags => "tags",
        }
    }

    /// Whether a forerunner may warm a cache for this mode
    pub fn is_cacheable(&self) -> bool {
        matches!(self, SearchMode::StaticFilter(_) | SearchMode::LiveGrep)
    }

    /// Whether the worker subcommand can filter candidates piped to stdin.
    ///
    /// `grep` only reads `--input`, so its cached sources always live in a
    /// temp file.
    pub fn reads_stdin(&self) -> bool {
        matches!(self, SearchMode::StaticFilter(_))
    }
}

/// A running worker owned by a session
#[derive(Debug)]
pub struct Job {
    generation: Generation,
    query: String,
    process: ProcessHandle,
    spawn_time: Instant,
    error_reported: bool,
}

impl Job {
    pub fn new(generation: Generation, query: String, process: ProcessHandle) -> Self {
        Self {
            generation,
            query,
            process,
            spawn_time: Instant::now(),
            error_reported: false,
        }
    }

    pub fn generation(&self) -> Generation {
        self.generation
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn pid(&self) -> Option<u32> {
        self.process.pid()
    }

    pub fn elapsed(&self) -> Duration {
        self.spawn_time.elapsed()
    }

    /// Advisory kill; returns immediately.
    pub fn terminate(&mut self) -> bool {
        self.process.terminate()
    }

    /// Remember that the worker already produced an error record.
    pub fn mark_error_reported(&mut self) {
        self.error_reported = true;
    }

    pub fn error_reported(&self) -> bool {
        self.error_reported
    }
}
