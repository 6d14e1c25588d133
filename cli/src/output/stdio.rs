//! JSON-lines output on stdout

use anyhow::{Context, Result};
use async_trait::async_trait;
use narrow_core::{DisplayEvent, DisplaySink, Generation, PreviewSink, ResultBatch};
use serde_json::Value;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::trace;

/// An event on its way to stdout
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outgoing {
    pub session_id: u64,
    pub event: DisplayEvent,
}

impl Outgoing {
    /// The event with its session id, as one JSON object
    pub fn to_json(&self) -> Result<Value> {
        let mut value = serde_json::to_value(&self.event)?;
        if let Value::Object(map) = &mut value {
            map.insert("session_id".to_string(), Value::from(self.session_id));
        }
        Ok(value)
    }
}

/// Display and preview sink of one session
#[derive(Debug, Clone)]
pub struct StdioSink {
    session_id: u64,
    tx: mpsc::UnboundedSender<Outgoing>,
}

impl StdioSink {
    pub fn new(session_id: u64, tx: mpsc::UnboundedSender<Outgoing>) -> Self {
        Self { session_id, tx }
    }

    fn send(&self, event: DisplayEvent) {
        let outgoing = Outgoing {
            session_id: self.session_id,
            event,
        };
        if self.tx.send(outgoing).is_err() {
            trace!(session_id = self.session_id, "stdout writer gone");
        }
    }
}

impl DisplaySink for StdioSink {
    fn accept(&self, batch: ResultBatch) {
        self.send(DisplayEvent::Batch(batch));
    }

    fn accept_error(&self, message: String) {
        self.send(DisplayEvent::Error { message });
    }

    fn complete(&self, generation: Generation) {
        self.send(DisplayEvent::Complete { generation });
    }
}

#[async_trait]
impl PreviewSink for StdioSink {
    async fn request_preview(
        &self,
        selected_index: usize,
        generation: Generation,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        self.send(DisplayEvent::Preview {
            selected_index,
            generation,
        });
        Ok(())
    }
}

/// Start the task writing queued events to `writer`, one JSON object per line.
///
/// The task ends once every sender is dropped.
pub fn spawn_writer<W>(mut writer: W) -> (mpsc::UnboundedSender<Outgoing>, JoinHandle<Result<()>>)
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (tx, mut rx) = mpsc::unbounded_channel::<Outgoing>();
    let task = tokio::spawn(async move {
        while let Some(outgoing) = rx.recv().await {
            let mut line = serde_json::to_vec(&outgoing.to_json()?)?;
            line.push(b'\n');
            writer
                .write_all(&line)
                .await
                .context("Failed to write to stdout")?;
            writer.flush().await?;
        }
        Ok::<(), anyhow::Error>(())
    });
    (tx, task)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outgoing_json_carries_session_id() {
        let outgoing = Outgoing {
            session_id: 3,
            event: DisplayEvent::Batch(ResultBatch::unranked(2, 5, vec!["a.rs".to_string()])),
        };

        let json = outgoing.to_json().unwrap();

        assert_eq!(json["session_id"], 3);
        assert_eq!(json["kind"], "batch");
        assert_eq!(json["generation"], 2);
        assert_eq!(json["lines"][0], "a.rs");
        assert_eq!(json["truncated"], true);
    }

    #[tokio::test]
    async fn test_writer_emits_one_line_per_event() {
        let (client, mut server) = tokio::io::duplex(4096);
        let (tx, task) = spawn_writer(client);
        let sink = StdioSink::new(1, tx);

        sink.accept_error("worker executable not found: maple".to_string());
        sink.complete(4);
        drop(sink);
        task.await.unwrap().unwrap();

        let mut output = String::new();
        tokio::io::AsyncReadExt::read_to_string(&mut server, &mut output)
            .await
            .unwrap();
        let lines: Vec<Value> = output
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();

        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["kind"], "error");
        assert_eq!(lines[1]["kind"], "complete");
        assert_eq!(lines[1]["generation"], 4);
    }
}
