//! Generation-gated routing of worker output
//!
//! Each stdout line of a worker is one JSON record:
//!
//! ```text
//! {"total": 120, "lines": ["src/main.rs", ...], "indices": [[0, 4], ...]}
//! {"error": "..."}
//! ```
//!
//! `indices` may be omitted. A record is only handed to the display when it
//! was produced for the live generation.

use crate::error::DecodeError;
use crate::generation::{Generation, GenerationClock};
use crate::output::{DisplaySink, ResultBatch};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, error, trace, warn};

/// A decoded worker record
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum WorkerMessage {
    Error {
        error: String,
    },
    Results {
        total: usize,
        lines: Vec<String>,
        #[serde(default)]
        indices: Vec<Vec<usize>>,
    },
}

impl WorkerMessage {
    /// Decode one stdout line
    pub fn decode(raw: &[u8]) -> Result<Self, DecodeError> {
        let text = std::str::from_utf8(raw).map_err(|_| DecodeError::InvalidUtf8)?;
        let message: WorkerMessage = serde_json::from_str(text.trim())?;

        if let WorkerMessage::Results { lines, indices, .. } = &message {
            if !indices.is_empty() && indices.len() != lines.len() {
                return Err(DecodeError::IndicesMismatch {
                    lines: lines.len(),
                    indices: indices.len(),
                });
            }
        }

        Ok(message)
    }

    fn into_batch(self, generation: Generation) -> Result<ResultBatch, String> {
        match self {
            WorkerMessage::Error { error } => Err(error),
            WorkerMessage::Results {
                total,
                lines,
                indices,
            } => {
                if indices.is_empty() {
                    Ok(ResultBatch::unranked(generation, total, lines))
                } else {
                    Ok(ResultBatch::new(generation, total, lines, indices))
                }
            }
        }
    }
}

/// What happened to a routed line or exit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteOutcome {
    /// A result batch reached the display
    Delivered,
    /// An error record reached the display
    ErrorDelivered,
    /// The job finished and completion was signalled
    Completed,
    /// The job crashed and one error line was shown
    Crashed,
    /// Produced for an older generation; dropped
    Stale,
    /// Undecodable; dropped
    Malformed,
}

/// Decodes worker output and forwards what is still wanted.
///
/// Holds nothing but the display and a view of the generation clock.
#[derive(Clone)]
pub struct MessageRouter {
    clock: GenerationClock,
    display: Arc<dyn DisplaySink>,
}

impl MessageRouter {
    pub fn new(clock: GenerationClock, display: Arc<dyn DisplaySink>) -> Self {
        Self { clock, display }
    }

    /// Route one stdout line of the job started for `job_generation`
    pub fn on_line(&self, raw: &[u8], job_generation: Generation) -> RouteOutcome {
        let message = match WorkerMessage::decode(raw) {
            Ok(message) => message,
            Err(err) => {
                warn!(
                    generation = job_generation,
                    %err,
                    line = %String::from_utf8_lossy(raw),
                    "skipping undecodable worker line"
                );
                return RouteOutcome::Malformed;
            }
        };

        if !self.clock.is_current(job_generation) {
            trace!(
                generation = job_generation,
                current = self.clock.current(),
                "dropping stale worker record"
            );
            return RouteOutcome::Stale;
        }

        match message.into_batch(job_generation) {
            Ok(batch) => {
                debug!(
                    generation = job_generation,
                    total = batch.total,
                    lines = batch.lines.len(),
                    "delivering batch"
                );
                self.display.accept(batch);
                RouteOutcome::Delivered
            }
            Err(message) => {
                self.display.accept_error(message);
                RouteOutcome::ErrorDelivered
            }
        }
    }

    /// Route the exit of the job started for `job_generation`.
    ///
    /// A non-zero exit is shown once, unless the worker already printed an
    /// error record or was terminated on purpose.
    pub fn on_exit(
        &self,
        job_generation: Generation,
        code: Option<i32>,
        terminated: bool,
        stderr: &str,
        error_reported: bool,
    ) -> RouteOutcome {
        if !self.clock.is_current(job_generation) {
            trace!(generation = job_generation, ?code, "ignoring exit of stale job");
            return RouteOutcome::Stale;
        }

        let failed = !terminated && code != Some(0);
        if failed && !error_reported {
            error!(generation = job_generation, ?code, stderr, "worker crashed");
            self.display.accept_error(crash_message(code, stderr));
            return RouteOutcome::Crashed;
        }

        self.display.complete(job_generation);
        RouteOutcome::Completed
    }

    /// Surface an error that did not come from a worker record
    pub fn report_error(&self, message: impl Into<String>) {
        self.display.accept_error(message.into());
    }

    pub fn display(&self) -> &Arc<dyn DisplaySink> {
        &self.display
    }

    pub fn clock(&self) -> &GenerationClock {
        &self.clock
    }
}

fn crash_message(code: Option<i32>, stderr: &str) -> String {
    let status = match code {
        Some(code) => format!("exit code {code}"),
        None => "killed by signal".to_string(),
    };
    match stderr.lines().rev().find(|line| !line.trim().is_empty()) {
        Some(last) => format!("worker failed ({status}): {}", last.trim()),
        None => format!("worker failed ({status})"),
    }
}
