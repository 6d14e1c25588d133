//! Stdio host bridge
//!
//! Reads one JSON request per line from stdin and drives a single live
//! session; everything the session shows is written to stdout as JSON lines.
//!
//! ```text
//! {"method": "new_session", "cwd": "/repo", "mode": "files"}
//! {"method": "on_typed", "query": "main"}
//! {"method": "on_move", "index": 3}
//! {"method": "cwd_changed", "cwd": "/other"}
//! {"method": "exit"}
//! ```

use crate::config::CliConfigLoader;
use crate::options::SessionArgs;
use crate::output::stdio::Outgoing;
use crate::output::{spawn_writer, StdioSink};
use anyhow::Result;
use narrow_core::{
    spawn_session, FinderConfig, ForerunnerCache, SessionContext, SessionHandle, TokioProcessRunner,
};
use serde::Deserialize;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// One line of stdin
#[derive(Debug, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum Request {
    NewSession(SessionArgs),
    OnTyped { query: String },
    OnMove { index: usize },
    CwdChanged { cwd: PathBuf },
    Exit,
}

/// Serve sessions over stdio until `exit` or end of input
pub async fn serve_command(config_loader: CliConfigLoader) -> Result<()> {
    let config = Arc::new(config_loader.load().await?);
    info!(worker = %config.worker_program, "serving on stdio");

    let (writer, writer_task) = spawn_writer(tokio::io::stdout());
    let mut host = Host::new(config, writer);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        let request = match serde_json::from_str::<Request>(&line) {
            Ok(request) => request,
            Err(err) => {
                warn!(%err, %line, "ignoring malformed request");
                continue;
            }
        };
        if !host.handle(request).await {
            break;
        }
    }

    host.shutdown().await;
    writer_task.await??;
    Ok(())
}

/// Owns the live session on behalf of the editor
struct Host {
    config: Arc<FinderConfig>,
    runner: Arc<TokioProcessRunner>,
    cache: ForerunnerCache,
    writer: mpsc::UnboundedSender<Outgoing>,
    session: Option<SessionHandle>,
    next_id: u64,
}

impl Host {
    fn new(config: Arc<FinderConfig>, writer: mpsc::UnboundedSender<Outgoing>) -> Self {
        Self {
            config,
            runner: Arc::new(TokioProcessRunner::new()),
            cache: ForerunnerCache::new(),
            writer,
            session: None,
            next_id: 1,
        }
    }

    /// Apply one request. Returns false when the host should stop.
    async fn handle(&mut self, request: Request) -> bool {
        match request {
            Request::NewSession(args) => {
                if let Some(previous) = self.session.take() {
                    previous.close().await;
                }
                let options = match args.to_options() {
                    Ok(options) => options,
                    Err(err) => {
                        warn!(%err, "cannot open session");
                        return true;
                    }
                };

                let id = self.next_id;
                self.next_id += 1;
                let sink = Arc::new(StdioSink::new(id, self.writer.clone()));
                info!(session_id = id, working_dir = %options.working_dir.display(), "new session");
                self.session = Some(spawn_session(
                    id,
                    options,
                    SessionContext {
                        config: self.config.clone(),
                        runner: self.runner.clone(),
                        cache: self.cache.clone(),
                        display: sink.clone(),
                        preview: sink,
                    },
                ));
            }
            Request::OnTyped { query } => match &self.session {
                Some(session) => session.on_typed(query),
                None => debug!("on_typed without a session"),
            },
            Request::OnMove { index } => match &self.session {
                Some(session) => session.on_move(index),
                None => debug!("on_move without a session"),
            },
            Request::CwdChanged { cwd } => match &self.session {
                Some(session) => session.on_working_dir_changed(crate::config::expand_path(&cwd)),
                None => debug!("cwd_changed without a session"),
            },
            Request::Exit => return false,
        }
        true
    }

    async fn shutdown(mut self) {
        if let Some(session) = self.session.take() {
            session.close().await;
        }
        self.cache.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::Mode;

    #[test]
    fn test_requests_deserialize() {
        let request: Request =
            serde_json::from_str(r#"{"method":"new_session","cwd":"/repo","mode":"grep"}"#).unwrap();
        match request {
            Request::NewSession(args) => {
                assert_eq!(args.mode, Mode::Grep);
                assert_eq!(args.cwd, Some(PathBuf::from("/repo")));
            }
            other => panic!("unexpected request: {other:?}"),
        }

        assert!(matches!(
            serde_json::from_str::<Request>(r#"{"method":"on_typed","query":"ma"}"#).unwrap(),
            Request::OnTyped { query } if query == "ma"
        ));
        assert!(matches!(
            serde_json::from_str::<Request>(r#"{"method":"on_move","index":4}"#).unwrap(),
            Request::OnMove { index: 4 }
        ));
        assert!(matches!(
            serde_json::from_str::<Request>(r#"{"method":"exit"}"#).unwrap(),
            Request::Exit
        ));
        assert!(serde_json::from_str::<Request>(r#"{"method":"launch"}"#).is_err());
    }
}
