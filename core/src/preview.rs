//! Debounced preview requests for cursor movement
//!
//! Runs on its own task so a slow preview never holds up result batches.

use crate::generation::Generation;
use crate::output::PreviewSink;
use crate::session::Debouncer;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

#[derive(Debug)]
enum MoveRequest {
    Moved { selected_index: usize, generation: Generation },
    Cancel,
}

/// Coalesces move events into at most one preview request per quiet window
pub struct PreviewScheduler {
    requests: mpsc::UnboundedSender<MoveRequest>,
    task: JoinHandle<()>,
}

impl PreviewScheduler {
    /// Start the scheduler task. Must be called within a tokio runtime.
    pub fn spawn(preview: Arc<dyn PreviewSink>, window: Duration) -> Self {
        let (requests, rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(run(preview, window, rx));
        Self { requests, task }
    }

    /// The selection moved to `selected_index` of the list shown for `generation`
    pub fn on_move(&self, selected_index: usize, generation: Generation) {
        let _ = self.requests.send(MoveRequest::Moved {
            selected_index,
            generation,
        });
    }

    /// Forget a move that has not fired yet
    pub fn cancel(&self) {
        let _ = self.requests.send(MoveRequest::Cancel);
    }

    /// Stop the scheduler; pending moves are dropped
    pub fn shutdown(&self) {
        self.task.abort();
    }
}

impl Drop for PreviewScheduler {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn run(
    preview: Arc<dyn PreviewSink>,
    window: Duration,
    mut requests: mpsc::UnboundedReceiver<MoveRequest>,
) {
    let mut debouncer = Debouncer::new();

    loop {
        tokio::select! {
            request = requests.recv() => match request {
                Some(MoveRequest::Moved { selected_index, generation }) => {
                    debouncer.schedule((selected_index, generation), window);
                }
                Some(MoveRequest::Cancel) => {
                    debouncer.cancel();
                }
                None => break,
            },
            (selected_index, generation) = debouncer.ready() => {
                debug!(selected_index, generation, "requesting preview");
                let preview = preview.clone();
                tokio::spawn(async move {
                    if let Err(err) = preview.request_preview(selected_index, generation).await {
                        warn!(selected_index, generation, %err, "preview request failed");
                    }
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::{ChannelSink, DisplayEvent};
    use async_trait::async_trait;
    use tokio::sync::mpsc::UnboundedReceiver;
    use tokio::time::sleep;

    fn drain(rx: &mut UnboundedReceiver<DisplayEvent>) -> Vec<DisplayEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    #[tokio::test(start_paused = true)]
    async fn test_rapid_moves_issue_one_request_for_last_index() {
        let (sink, mut rx) = ChannelSink::channel();
        let scheduler = PreviewScheduler::spawn(Arc::new(sink), Duration::from_millis(50));

        for index in 0..10 {
            scheduler.on_move(index, 3);
            sleep(Duration::from_millis(4)).await;
        }
        sleep(Duration::from_millis(200)).await;

        assert_eq!(
            drain(&mut rx),
            vec![DisplayEvent::Preview {
                selected_index: 9,
                generation: 3
            }]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_spaced_moves_each_request_preview() {
        let (sink, mut rx) = ChannelSink::channel();
        let scheduler = PreviewScheduler::spawn(Arc::new(sink), Duration::from_millis(50));

        scheduler.on_move(1, 1);
        sleep(Duration::from_millis(100)).await;
        scheduler.on_move(2, 1);
        sleep(Duration::from_millis(100)).await;

        assert_eq!(drain(&mut rx).len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_suppresses_pending_move() {
        let (sink, mut rx) = ChannelSink::channel();
        let scheduler = PreviewScheduler::spawn(Arc::new(sink), Duration::from_millis(50));

        scheduler.on_move(5, 1);
        scheduler.cancel();
        sleep(Duration::from_millis(200)).await;

        assert!(drain(&mut rx).is_empty());
    }

    struct SlowPreview;

    #[async_trait]
    impl PreviewSink for SlowPreview {
        async fn request_preview(
            &self,
            _selected_index: usize,
            _generation: Generation,
        ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
            sleep(Duration::from_secs(10)).await;
            Err("too slow".into())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_preview_does_not_block_scheduler() {
        let scheduler = PreviewScheduler::spawn(Arc::new(SlowPreview), Duration::from_millis(50));

        scheduler.on_move(1, 1);
        sleep(Duration::from_millis(60)).await;
        scheduler.on_move(2, 1);
        sleep(Duration::from_millis(60)).await;

        assert!(!scheduler.task.is_finished());
    }
}
