//! Query session controller
//!
//! A [`Session`] turns query edits into cache answers or worker dispatches
//! and decides which worker output may still reach the display. It is a
//! plain state machine: timers and channels live in [`event_loop`], which
//! drives it.
//!
//! Every query edit advances the generation exactly once. A job dispatched
//! for that edit carries the same generation, so anything an older job
//! prints afterwards is stale by construction, even when the query text
//! was typed and then reverted.

pub mod debounce;
pub mod event_loop;

pub use debounce::Debouncer;
pub use event_loop::{spawn_session, SessionContext, SessionHandle, SessionRequest};

use crate::cache::{Enumeration, ForerunnerCache, PrefetchStatus};
use crate::config::{FinderConfig, SessionOptions};
use crate::generation::{Generation, GenerationClock};
use crate::job::{Job, JobDispatcher, JobInput};
use crate::output::{DisplaySink, ResultBatch};
use crate::process::{JobEvent, JobEventSender, ProcessRunner};
use crate::router::{MessageRouter, RouteOutcome};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Cached sources below this many lines are filtered after the short window
const SMALL_SOURCE_LINES: usize = 100_000;
/// Cached sources below this many lines are filtered after the medium window
const MEDIUM_SOURCE_LINES: usize = 200_000;
const SMALL_SOURCE_WINDOW: Duration = Duration::from_millis(50);
const MEDIUM_SOURCE_WINDOW: Duration = Duration::from_millis(100);

/// What a query edit turned into
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryAction {
    /// Answered synchronously from the forerunner cache
    Served { generation: Generation },
    /// Dispatch after `window` of quiet, unless superseded
    Debounce { generation: Generation, window: Duration },
    /// Nothing to do
    Ignored,
}

/// Result of a debounced dispatch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    Dispatched { generation: Generation },
    /// The generation moved on while the dispatch was pending
    Superseded,
    /// The worker could not be started; one error line was shown
    Failed,
}

/// State of one live finder
pub struct Session {
    id: u64,
    options: SessionOptions,
    config: Arc<FinderConfig>,
    query: String,
    clock: GenerationClock,
    dispatcher: JobDispatcher,
    router: MessageRouter,
    cache: ForerunnerCache,
    closed: bool,
}

impl Session {
    /// Create a session whose jobs report into `events`
    pub fn new(
        id: u64,
        options: SessionOptions,
        config: Arc<FinderConfig>,
        runner: Arc<dyn ProcessRunner>,
        cache: ForerunnerCache,
        display: Arc<dyn DisplaySink>,
        events: JobEventSender,
    ) -> Self {
        let clock = GenerationClock::new();
        Self {
            id,
            router: MessageRouter::new(clock.clone(), display),
            dispatcher: JobDispatcher::new(runner, config.clone(), events),
            options,
            config,
            query: String::new(),
            clock,
            cache,
            closed: false,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn generation(&self) -> Generation {
        self.clock.current()
    }

    pub fn clock(&self) -> &GenerationClock {
        &self.clock
    }

    pub fn options(&self) -> &SessionOptions {
        &self.options
    }

    pub fn working_dir(&self) -> &Path {
        &self.options.working_dir
    }

    pub fn active_job(&self) -> Option<&Job> {
        self.dispatcher.active()
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Warm the cache for the working directory, when the mode allows it
    pub fn start_forerunner(&self) -> Option<PrefetchStatus> {
        if self.closed || !self.config.forerunner.enabled || !self.options.mode.is_cacheable() {
            return None;
        }
        let enumeration = Enumeration::for_mode(&self.options.mode, &self.config)?;
        let threshold = if self.options.mode.reads_stdin() {
            self.config.forerunner.output_threshold
        } else {
            0
        };
        let status = self.cache.prefetch(
            self.options.working_dir.clone(),
            enumeration,
            threshold,
            self.config.max_results,
        );
        debug!(
            session_id = self.id,
            working_dir = %self.options.working_dir.display(),
            ?status,
            "forerunner requested"
        );
        Some(status)
    }

    /// Handle an edit of the query text
    pub fn on_query_changed(&mut self, new_query: &str) -> QueryAction {
        if self.closed {
            return QueryAction::Ignored;
        }

        let generation = self.clock.bump();
        self.dispatcher.terminate_active();
        self.query = new_query.to_string();

        if new_query.is_empty() {
            if let Some(entry) = self.cached_entry() {
                let lines = entry.head(self.display_lines());
                debug!(
                    session_id = self.id,
                    generation,
                    total = entry.total(),
                    age = ?entry.created_at().elapsed(),
                    "serving empty query from cache"
                );
                let display = self.router.display();
                display.accept(ResultBatch::unranked(generation, entry.total(), lines));
                display.complete(generation);
                return QueryAction::Served { generation };
            }
        }

        QueryAction::Debounce {
            generation,
            window: self.debounce_window(),
        }
    }

    /// Start the worker for the edit that produced `generation`
    pub fn dispatch_pending(&mut self, generation: Generation) -> DispatchOutcome {
        if self.closed || !self.clock.is_current(generation) {
            return DispatchOutcome::Superseded;
        }

        let entry = self
            .cached_entry()
            .filter(|entry| !entry.is_in_memory() || self.options.mode.reads_stdin());
        let (input, stdin) = match &entry {
            Some(entry) => (entry.job_input(), entry.stdin()),
            None => (JobInput::Enumerate, None),
        };

        match self
            .dispatcher
            .dispatch(&self.query, generation, &self.options, input, stdin)
        {
            Ok(job) => {
                debug!(
                    session_id = self.id,
                    generation,
                    query = job.query(),
                    cached = entry.is_some(),
                    "job dispatched"
                );
                DispatchOutcome::Dispatched { generation }
            }
            Err(err) => {
                self.router.report_error(err.to_string());
                DispatchOutcome::Failed
            }
        }
    }

    /// Feed one event of a worker process
    pub fn on_job_event(&mut self, event: JobEvent) -> RouteOutcome {
        match event {
            JobEvent::Line { generation, line } => {
                let outcome = self.router.on_line(&line, generation);
                if outcome == RouteOutcome::ErrorDelivered {
                    if let Some(job) = self.dispatcher.active_for(generation) {
                        job.mark_error_reported();
                    }
                }
                outcome
            }
            JobEvent::Exited {
                generation,
                code,
                terminated,
                stderr,
            } => {
                let error_reported = self
                    .dispatcher
                    .active_for(generation)
                    .map(|job| job.error_reported())
                    .unwrap_or(false);
                let outcome = self
                    .router
                    .on_exit(generation, code, terminated, &stderr, error_reported);
                if let Some(job) = self.dispatcher.finish(generation) {
                    debug!(
                        session_id = self.id,
                        generation,
                        ?code,
                        elapsed = ?job.elapsed(),
                        "job finished"
                    );
                }
                outcome
            }
        }
    }

    /// Move the session to another directory.
    ///
    /// Everything tied to the old directory becomes stale.
    pub fn on_working_dir_changed(&mut self, dir: PathBuf) -> Generation {
        let generation = self.clock.bump();
        if self.closed {
            return generation;
        }

        self.dispatcher.terminate_active();
        self.cache.invalidate(&self.options.working_dir);
        info!(
            session_id = self.id,
            from = %self.options.working_dir.display(),
            to = %dir.display(),
            "working directory changed"
        );
        self.options.working_dir = dir;
        self.start_forerunner();
        generation
    }

    /// Release the job and the cache entry. Safe to call repeatedly.
    pub fn on_session_close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.clock.bump();
        self.dispatcher.terminate_active();
        self.cache.invalidate(&self.options.working_dir);
        debug!(session_id = self.id, "session closed");
    }

    /// Quiet window before a typed query is dispatched
    pub fn debounce_window(&self) -> Duration {
        let debounce = &self.config.debounce;
        let Some(entry) = self.cached_entry() else {
            return debounce.on_typed();
        };

        if entry.is_in_memory() {
            return debounce.in_memory();
        }
        if !debounce.scale_by_source_size {
            return debounce.on_typed();
        }

        let window = if entry.total() < SMALL_SOURCE_LINES {
            SMALL_SOURCE_WINDOW
        } else if entry.total() < MEDIUM_SOURCE_LINES {
            MEDIUM_SOURCE_WINDOW
        } else {
            debounce.on_typed()
        };
        window.min(debounce.on_typed())
    }

    fn cached_entry(&self) -> Option<Arc<crate::cache::CacheEntry>> {
        if !self.options.mode.is_cacheable() {
            return None;
        }
        self.cache.get(&self.options.working_dir)
    }

    fn display_lines(&self) -> usize {
        self.options
            .display_lines
            .unwrap_or(self.config.default_display_lines)
            .min(self.config.max_results)
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.on_session_close();
    }
}
