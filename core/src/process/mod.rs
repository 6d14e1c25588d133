//! Process runner: spawns worker processes and streams their stdout
//!
//! A spawned process reports back through an unbounded channel of
//! [`JobEvent`]s, each tagged with the generation the process was started
//! for. The [`ProcessHandle`] only carries the ability to ask for
//! termination; reading and reaping happen on a background task.

pub mod runner;
pub mod shell;

pub use runner::TokioProcessRunner;
pub use shell::{collect_lines, shell_command};

use crate::error::SpawnError;
use crate::generation::Generation;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};

/// A fully described process invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    /// Executable name or path
    pub program: String,
    /// Argument vector, without the program itself
    pub args: Vec<String>,
    /// Working directory of the process
    pub cwd: Option<PathBuf>,
    /// Lines piped to the process' stdin, newline-terminated
    pub stdin: Option<Arc<Vec<String>>>,
}

impl CommandSpec {
    /// Create a spec with no working directory and no stdin
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
            cwd: None,
            stdin: None,
        }
    }

    pub fn with_cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }

    pub fn with_stdin(mut self, lines: Arc<Vec<String>>) -> Self {
        self.stdin = Some(lines);
        self
    }
}

/// Output of a spawned process
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobEvent {
    /// One line of stdout, without the trailing newline
    Line { generation: Generation, line: Vec<u8> },
    /// The process is gone and has been reaped
    Exited {
        generation: Generation,
        /// Exit code, `None` when killed by a signal
        code: Option<i32>,
        /// Termination was requested before the process finished
        terminated: bool,
        /// Tail of stderr, for diagnostics
        stderr: String,
    },
}

impl JobEvent {
    /// Generation of the job that produced this event
    pub fn generation(&self) -> Generation {
        match self {
            JobEvent::Line { generation, .. } | JobEvent::Exited { generation, .. } => *generation,
        }
    }
}

/// Sender half handed to runners
pub type JobEventSender = mpsc::UnboundedSender<JobEvent>;

/// Receiver half consumed by the session loop
pub type JobEventReceiver = mpsc::UnboundedReceiver<JobEvent>;

/// Handle to a spawned process.
///
/// Termination is advisory: [`ProcessHandle::terminate`] returns
/// immediately and the background task kills and reaps the process.
/// Dropping the handle terminates as well.
#[derive(Debug)]
pub struct ProcessHandle {
    pid: Option<u32>,
    kill: Option<oneshot::Sender<()>>,
}

impl ProcessHandle {
    /// Create a handle from a pid and the kill trigger of its reader task
    pub fn new(pid: Option<u32>, kill: oneshot::Sender<()>) -> Self {
        Self {
            pid,
            kill: Some(kill),
        }
    }

    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    /// Ask the process to stop. Returns false if already requested.
    pub fn terminate(&mut self) -> bool {
        match self.kill.take() {
            Some(kill) => {
                // The reader task may already be done; nothing to do then.
                let _ = kill.send(());
                true
            }
            None => false,
        }
    }

    /// Whether termination was already requested
    pub fn is_terminating(&self) -> bool {
        self.kill.is_none()
    }
}

impl Drop for ProcessHandle {
    fn drop(&mut self) {
        self.terminate();
    }
}

/// Spawns processes whose output is streamed as [`JobEvent`]s
pub trait ProcessRunner: Send + Sync {
    /// Start `spec` and stream its stdout lines into `events`, tagged with
    /// `generation`. Fails synchronously when the program cannot be started.
    fn spawn(
        &self,
        spec: CommandSpec,
        generation: Generation,
        events: JobEventSender,
    ) -> Result<ProcessHandle, SpawnError>;
}
