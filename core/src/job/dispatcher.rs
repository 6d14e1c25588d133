//! Job dispatcher: turns a query into a running worker

use super::args::{build_worker_args, JobInput};
use super::Job;
use crate::config::{FinderConfig, SessionOptions};
use crate::error::SpawnError;
use crate::generation::Generation;
use crate::process::{CommandSpec, JobEventSender, ProcessRunner};
use std::sync::Arc;
use tracing::{debug, error};

/// Spawns workers for one session and keeps at most one of them active.
///
/// A new dispatch always supersedes the active job; it never queues
/// behind it.
pub struct JobDispatcher {
    runner: Arc<dyn ProcessRunner>,
    config: Arc<FinderConfig>,
    events: JobEventSender,
    active: Option<Job>,
}

impl JobDispatcher {
    pub fn new(runner: Arc<dyn ProcessRunner>, config: Arc<FinderConfig>, events: JobEventSender) -> Self {
        Self {
            runner,
            config,
            events,
            active: None,
        }
    }

    /// Spawn a worker for `query` tagged with `generation`.
    ///
    /// The previous job is asked to terminate first, whether or not the
    /// new one starts. `stdin` pipes cached candidates to the worker.
    pub fn dispatch(
        &mut self,
        query: &str,
        generation: Generation,
        options: &SessionOptions,
        input: JobInput<'_>,
        stdin: Option<Arc<Vec<String>>>,
    ) -> Result<&Job, SpawnError> {
        self.terminate_active();

        let args = build_worker_args(query, options, &self.config, input)?;

        let mut spec = CommandSpec::new(self.config.worker_program.clone(), args)
            .with_cwd(options.working_dir.clone());
        if let Some(lines) = stdin {
            spec = spec.with_stdin(lines);
        }
        debug!(generation, query, args = ?spec.args, "spawning worker");

        let process = self
            .runner
            .spawn(spec, generation, self.events.clone())
            .map_err(|err| {
                error!(generation, %err, "failed to dispatch job");
                err
            })?;

        debug!(generation, pid = ?process.pid(), "dispatched job");

        let job: &Job = self
            .active
            .insert(Job::new(generation, query.to_string(), process));
        Ok(job)
    }

    /// Advisory kill of the active job, if any. Never waits.
    pub fn terminate_active(&mut self) -> Option<Generation> {
        let mut job = self.active.take()?;
        let generation = job.generation();
        if job.terminate() {
            debug!(generation, pid = ?job.pid(), elapsed = ?job.elapsed(), "superseded job");
        }
        Some(generation)
    }

    pub fn active(&self) -> Option<&Job> {
        self.active.as_ref()
    }

    /// The active job if it belongs to `generation`
    pub fn active_for(&mut self, generation: Generation) -> Option<&mut Job> {
        self.active
            .as_mut()
            .filter(|job| job.generation() == generation)
    }

    /// Forget the active job once its process has exited.
    pub fn finish(&mut self, generation: Generation) -> Option<Job> {
        if self.active.as_ref().map(Job::generation) == Some(generation) {
            self.active.take()
        } else {
            None
        }
    }
}
