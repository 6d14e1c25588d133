//! The task that drives a [`Session`]
//!
//! One loop owns the session and multiplexes host requests, the debounce
//! timer and worker output. Nothing here blocks; a failure is shown or
//! logged and the loop keeps going.

use super::{DispatchOutcome, QueryAction, Session};
use crate::cache::ForerunnerCache;
use crate::config::{FinderConfig, SessionOptions};
use crate::generation::Generation;
use crate::output::{DisplaySink, PreviewSink};
use crate::preview::PreviewScheduler;
use crate::process::{JobEventReceiver, ProcessRunner};
use crate::session::Debouncer;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, trace};

/// Host events delivered to a running session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionRequest {
    QueryChanged(String),
    Moved(usize),
    WorkingDirChanged(PathBuf),
    Close,
}

/// Owner-side handle of a running session.
///
/// Dropping the handle closes the session.
pub struct SessionHandle {
    id: u64,
    requests: mpsc::UnboundedSender<SessionRequest>,
    task: JoinHandle<()>,
}

impl SessionHandle {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn on_typed(&self, query: impl Into<String>) {
        self.send(SessionRequest::QueryChanged(query.into()));
    }

    pub fn on_move(&self, selected_index: usize) {
        self.send(SessionRequest::Moved(selected_index));
    }

    pub fn on_working_dir_changed(&self, dir: impl Into<PathBuf>) {
        self.send(SessionRequest::WorkingDirChanged(dir.into()));
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Close the session and wait for its loop to release everything
    pub async fn close(self) {
        self.send(SessionRequest::Close);
        if let Err(err) = self.task.await {
            debug!(session_id = self.id, %err, "session task ended abnormally");
        }
    }

    fn send(&self, request: SessionRequest) {
        if self.requests.send(request).is_err() {
            trace!(session_id = self.id, "session already closed");
        }
    }
}

/// Everything a session needs from its host
pub struct SessionContext {
    pub config: Arc<FinderConfig>,
    pub runner: Arc<dyn ProcessRunner>,
    pub cache: ForerunnerCache,
    pub display: Arc<dyn DisplaySink>,
    pub preview: Arc<dyn PreviewSink>,
}

/// Open a session and start driving it on a new task.
///
/// The forerunner starts right away, before the first keystroke.
pub fn spawn_session(id: u64, options: SessionOptions, context: SessionContext) -> SessionHandle {
    let (requests, requests_rx) = mpsc::unbounded_channel();
    let (events_tx, events_rx) = mpsc::unbounded_channel();

    let preview = PreviewScheduler::spawn(context.preview, context.config.debounce.on_move());
    let session = Session::new(
        id,
        options,
        context.config,
        context.runner,
        context.cache,
        context.display,
        events_tx,
    );
    session.start_forerunner();

    let task = tokio::spawn(run(session, preview, requests_rx, events_rx));
    SessionHandle { id, requests, task }
}

async fn run(
    mut session: Session,
    preview: PreviewScheduler,
    mut requests: mpsc::UnboundedReceiver<SessionRequest>,
    mut events: JobEventReceiver,
) {
    let mut pending: Debouncer<Generation> = Debouncer::new();

    loop {
        tokio::select! {
            request = requests.recv() => match request {
                Some(SessionRequest::QueryChanged(query)) => {
                    match session.on_query_changed(&query) {
                        QueryAction::Debounce { generation, window } => {
                            pending.schedule(generation, window);
                        }
                        QueryAction::Served { .. } | QueryAction::Ignored => {
                            pending.cancel();
                        }
                    }
                    preview.cancel();
                }
                Some(SessionRequest::Moved(selected_index)) => {
                    preview.on_move(selected_index, session.generation());
                }
                Some(SessionRequest::WorkingDirChanged(dir)) => {
                    pending.cancel();
                    preview.cancel();
                    session.on_working_dir_changed(dir);
                }
                Some(SessionRequest::Close) | None => break,
            },
            generation = pending.ready() => {
                if let DispatchOutcome::Superseded = session.dispatch_pending(generation) {
                    trace!(session_id = session.id(), generation, "pending dispatch superseded");
                }
            }
            Some(event) = events.recv() => {
                session.on_job_event(event);
            }
        }
    }

    preview.shutdown();
    session.on_session_close();
}
