use std::pin::Pin;
use std::time::Duration;
use tokio::time::{sleep_until, Instant, Sleep};

/// Deadline used while nothing is scheduled
const IDLE: Duration = Duration::from_secs(86_400 * 365);

/// Holds the latest scheduled value until its window passes quietly.
///
/// Every [`Debouncer::schedule`] replaces the pending value and restarts the
/// window, so a burst of calls yields only the last value. Meant to be
/// polled from a `select!` loop through [`Debouncer::ready`].
#[derive(Debug)]
pub struct Debouncer<T> {
    timer: Pin<Box<Sleep>>,
    pending: Option<T>,
}

impl<T> Default for Debouncer<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Debouncer<T> {
    pub fn new() -> Self {
        Self {
            timer: Box::pin(sleep_until(Instant::now() + IDLE)),
            pending: None,
        }
    }

    /// Replace the pending value and fire `window` from now
    pub fn schedule(&mut self, value: T, window: Duration) {
        self.pending = Some(value);
        self.timer.as_mut().reset(Instant::now() + window);
    }

    /// Drop the pending value, if any
    pub fn cancel(&mut self) -> Option<T> {
        self.timer.as_mut().reset(Instant::now() + IDLE);
        self.pending.take()
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    pub fn pending(&self) -> Option<&T> {
        self.pending.as_ref()
    }

    /// Resolves with the pending value once its window has passed.
    ///
    /// Never resolves while nothing is pending. Cancel safe.
    pub async fn ready(&mut self) -> T {
        loop {
            if self.pending.is_none() {
                std::future::pending::<()>().await;
            }
            self.timer.as_mut().await;
            self.timer.as_mut().reset(Instant::now() + IDLE);
            if let Some(value) = self.pending.take() {
                return value;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::timeout;
    use tokio_test::assert_pending;

    #[tokio::test(start_paused = true)]
    async fn test_burst_yields_last_value() {
        let mut debouncer = Debouncer::new();
        for i in 0..5 {
            debouncer.schedule(i, Duration::from_millis(300));
            tokio::time::advance(Duration::from_millis(10)).await;
        }

        let started = Instant::now();
        assert_eq!(debouncer.ready().await, 4);
        assert_eq!(started.elapsed(), Duration::from_millis(290));
        assert!(!debouncer.is_pending());
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_debouncer_never_fires() {
        let mut debouncer: Debouncer<u64> = Debouncer::new();
        let mut ready = tokio_test::task::spawn(debouncer.ready());
        assert_pending!(ready.poll());

        tokio::time::advance(Duration::from_secs(60)).await;
        assert_pending!(ready.poll());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_drops_pending() {
        let mut debouncer = Debouncer::new();
        debouncer.schedule("q", Duration::from_millis(50));
        assert_eq!(debouncer.pending(), Some(&"q"));
        assert_eq!(debouncer.cancel(), Some("q"));

        let result = timeout(Duration::from_secs(1), debouncer.ready()).await;
        assert!(result.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_window_fires_immediately() {
        let mut debouncer = Debouncer::new();
        debouncer.schedule(7, Duration::ZERO);
        let started = Instant::now();
        assert_eq!(debouncer.ready().await, 7);
        assert_eq!(started.elapsed(), Duration::ZERO);
    }
}
