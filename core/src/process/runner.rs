//! [`ProcessRunner`] backed by [`tokio::process`]

use super::{CommandSpec, JobEvent, JobEventSender, ProcessHandle, ProcessRunner};
use crate::error::SpawnError;
use crate::generation::Generation;
use parking_lot::Mutex;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::process::{ChildStdin, Command};
use tokio::sync::oneshot;
use tracing::{debug, trace, warn};

/// Bytes of stderr kept for diagnostics
const STDERR_TAIL_LIMIT: usize = 4096;
/// How long stderr may stay open once the worker has exited
const STDERR_GRACE: Duration = Duration::from_millis(100);

/// Spawns real OS processes.
///
/// Must be used from within a tokio runtime.
#[derive(Debug, Default, Clone)]
pub struct TokioProcessRunner;

impl TokioProcessRunner {
    pub fn new() -> Self {
        Self
    }
}

impl ProcessRunner for TokioProcessRunner {
    fn spawn(
        &self,
        spec: CommandSpec,
        generation: Generation,
        events: JobEventSender,
    ) -> Result<ProcessHandle, SpawnError> {
        let program = which::which(&spec.program).map_err(|_| SpawnError::NotFound {
            program: spec.program.clone(),
        })?;

        let mut cmd = Command::new(&program);
        cmd.args(&spec.args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        if let Some(cwd) = &spec.cwd {
            cmd.current_dir(cwd);
        }

        cmd.stdin(if spec.stdin.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        });

        let mut child = cmd.spawn().map_err(|source| SpawnError::Launch {
            program: spec.program.clone(),
            source,
        })?;

        let pid = child.id();
        let stdout = child.stdout.take().ok_or_else(|| SpawnError::InvalidArgs {
            message: "failed to capture stdout".to_string(),
        })?;
        let stderr = child.stderr.take();

        if let (Some(stdin), Some(lines)) = (child.stdin.take(), spec.stdin.clone()) {
            tokio::spawn(feed_stdin(stdin, lines, generation));
        }

        let (kill_tx, mut kill_rx) = oneshot::channel::<()>();

        debug!(generation, ?pid, program = %program.display(), "spawned worker");

        tokio::spawn(async move {
            let stderr_tail = Arc::new(Mutex::new(Vec::new()));
            let mut stderr_task = tokio::spawn(read_tail(stderr, stderr_tail.clone()));
            let mut lines = BufReader::new(stdout).split(b'\n');
            let mut terminated = false;

            loop {
                tokio::select! {
                    // A dropped handle counts as a termination request too.
                    _ = &mut kill_rx => {
                        terminated = true;
                        break;
                    }
                    next = lines.next_segment() => match next {
                        Ok(Some(mut line)) => {
                            if line.last() == Some(&b'\r') {
                                line.pop();
                            }
                            if events.send(JobEvent::Line { generation, line }).is_err() {
                                // Nobody is listening anymore.
                                terminated = true;
                                break;
                            }
                        }
                        Ok(None) => break,
                        Err(err) => {
                            warn!(generation, ?err, "failed to read worker stdout");
                            break;
                        }
                    }
                }
            }

            if terminated {
                if let Err(err) = child.start_kill() {
                    trace!(generation, ?err, "worker already gone");
                }
            }

            // stdout may close long before the process ends
            let status = if terminated {
                child.wait().await
            } else {
                tokio::select! {
                    status = child.wait() => status,
                    _ = &mut kill_rx => {
                        terminated = true;
                        if let Err(err) = child.start_kill() {
                            trace!(generation, ?err, "worker already gone");
                        }
                        child.wait().await
                    }
                }
            };
            let code = match status {
                Ok(status) => status.code(),
                Err(err) => {
                    warn!(generation, ?err, "failed to reap worker");
                    None
                }
            };

            // Grandchildren may keep stderr open after the worker is gone.
            if !terminated
                && tokio::time::timeout(STDERR_GRACE, &mut stderr_task)
                    .await
                    .is_err()
            {
                trace!(generation, "stderr still open after exit");
            }
            stderr_task.abort();
            let stderr = String::from_utf8_lossy(&stderr_tail.lock()).trim().to_string();

            debug!(generation, ?pid, ?code, terminated, "worker exited");

            let _ = events.send(JobEvent::Exited {
                generation,
                code,
                terminated,
                stderr,
            });
        });

        Ok(ProcessHandle::new(pid, kill_tx))
    }
}

async fn feed_stdin(mut stdin: ChildStdin, lines: Arc<Vec<String>>, generation: Generation) {
    for line in lines.iter() {
        let written = async {
            stdin.write_all(line.as_bytes()).await?;
            stdin.write_all(b"\n").await
        }
        .await;

        if let Err(err) = written {
            // Broken pipe once the worker is killed or stops reading.
            trace!(generation, ?err, "stopped feeding worker stdin");
            return;
        }
    }
    let _ = stdin.shutdown().await;
}

async fn read_tail<R: AsyncRead + Unpin>(reader: Option<R>, tail: Arc<Mutex<Vec<u8>>>) {
    let Some(mut reader) = reader else {
        return;
    };

    let mut chunk = [0u8; 1024];
    loop {
        match reader.read(&mut chunk).await {
            Ok(0) | Err(_) => return,
            Ok(n) => {
                let mut tail = tail.lock();
                tail.extend_from_slice(&chunk[..n]);
                let excess = tail.len().saturating_sub(STDERR_TAIL_LIMIT);
                tail.drain(..excess);
            }
        }
    }
}
