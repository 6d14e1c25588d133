//! Output abstraction layer for narrow core
//!
//! Core only decides *what* reaches the display; how batches are rendered,
//! and how previews are produced, belongs to the host. These traits are the
//! seams the host implements.

use crate::generation::Generation;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// One decoded batch of ranked results
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultBatch {
    /// Generation of the query these results answer
    pub generation: Generation,
    /// Total number of matches, possibly more than `lines`
    pub total: usize,
    /// Display lines, best match first
    pub lines: Vec<String>,
    /// Per-line matched character positions, for highlighting
    pub rank_indices: Vec<Vec<usize>>,
    /// Whether `lines` holds fewer entries than `total`
    pub truncated: bool,
}

impl ResultBatch {
    /// Build a batch from already-ranked lines
    pub fn new(generation: Generation, total: usize, lines: Vec<String>, rank_indices: Vec<Vec<usize>>) -> Self {
        let truncated = lines.len() < total;
        Self {
            generation,
            total,
            lines,
            rank_indices,
            truncated,
        }
    }

    /// A batch without highlight positions, e.g. unfiltered cached lines
    pub fn unranked(generation: Generation, total: usize, lines: Vec<String>) -> Self {
        let rank_indices = vec![Vec::new(); lines.len()];
        Self::new(generation, total, lines, rank_indices)
    }
}

/// Receives everything the user is allowed to see.
///
/// Called from the session event loop, so implementations must not block.
pub trait DisplaySink: Send + Sync {
    /// Results for the current query
    fn accept(&self, batch: ResultBatch);

    /// A single inline error line
    fn accept_error(&self, message: String);

    /// The current query's worker finished
    fn complete(&self, _generation: Generation) {}
}

/// Produces previews for the selected result
#[async_trait]
pub trait PreviewSink: Send + Sync {
    /// Preview the entry at `selected_index` of the list shown for `generation`
    async fn request_preview(
        &self,
        selected_index: usize,
        generation: Generation,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;
}

/// Sink that discards everything (useful for testing and headless runs)
pub struct NullSink;

impl DisplaySink for NullSink {
    fn accept(&self, _batch: ResultBatch) {}

    fn accept_error(&self, _message: String) {}
}

#[async_trait]
impl PreviewSink for NullSink {
    async fn request_preview(
        &self,
        _selected_index: usize,
        _generation: Generation,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        Ok(())
    }
}

/// Everything a session can tell its host
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DisplayEvent {
    Batch(ResultBatch),
    Error { message: String },
    Complete { generation: Generation },
    Preview { selected_index: usize, generation: Generation },
}

/// Forwards display and preview traffic into a channel
#[derive(Debug, Clone)]
pub struct ChannelSink {
    sender: mpsc::UnboundedSender<DisplayEvent>,
}

impl ChannelSink {
    pub fn new(sender: mpsc::UnboundedSender<DisplayEvent>) -> Self {
        Self { sender }
    }

    /// Create a sink together with the receiving end
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<DisplayEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(tx), rx)
    }

    fn send(&self, event: DisplayEvent) {
        if self.sender.send(event).is_err() {
            tracing::trace!("display receiver dropped");
        }
    }
}

impl DisplaySink for ChannelSink {
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
impl PreviewSink for ChannelSink {
    async fn request_preview(
        &self,
        selected_index: usize,
        generation: Generation,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        self.sender.send(DisplayEvent::Preview {
            selected_index,
            generation,
        })?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncated_when_total_exceeds_lines() {
        let batch = ResultBatch::unranked(1, 10, vec!["a".to_string(), "b".to_string()]);
        assert!(batch.truncated);
        assert_eq!(batch.rank_indices, vec![Vec::<usize>::new(); 2]);

        let full = ResultBatch::unranked(1, 2, vec!["a".to_string(), "b".to_string()]);
        assert!(!full.truncated);
    }

    #[tokio::test]
    async fn test_channel_sink_forwards_in_order() {
        let (sink, mut rx) = ChannelSink::channel();

        sink.accept(ResultBatch::unranked(2, 1, vec!["x".to_string()]));
        sink.accept_error("boom".to_string());
        sink.complete(2);
        sink.request_preview(0, 2).await.unwrap();

        assert!(matches!(rx.recv().await, Some(DisplayEvent::Batch(_))));
        assert_eq!(
            rx.recv().await,
            Some(DisplayEvent::Error {
                message: "boom".to_string()
            })
        );
        assert_eq!(rx.recv().await, Some(DisplayEvent::Complete { generation: 2 }));
        assert_eq!(
            rx.recv().await,
            Some(DisplayEvent::Preview {
                selected_index: 0,
                generation: 2
            })
        );
    }

    #[test]
    fn test_display_event_json_shape() {
        let event = DisplayEvent::Error {
            message: "worker not found".to_string(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["kind"], "error");
        assert_eq!(json["message"], "worker not found");
    }
}
