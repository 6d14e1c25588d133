//! Monotonic generation counter shared by a session and its router

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// A generation number. Strictly increasing within one session.
pub type Generation = u64;

/// Monotonic generation clock.
///
/// Clones observe the same counter. Only the owning session advances it;
/// everything else reads [`GenerationClock::current`] to decide whether a
/// piece of output is still wanted.
#[derive(Debug, Default, Clone)]
pub struct GenerationClock {
    current: Arc<AtomicU64>,
}

impl GenerationClock {
    /// Creates a clock at generation 0.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the live generation.
    pub fn current(&self) -> Generation {
        self.current.load(Ordering::Acquire)
    }

    /// Advances to the next generation and returns it.
    pub fn bump(&self) -> Generation {
        self.current.fetch_add(1, Ordering::AcqRel).wrapping_add(1)
    }

    /// Returns true if `generation` is the live one.
    pub fn is_current(&self, generation: Generation) -> bool {
        self.current() == generation
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bump_is_strictly_increasing() {
        let clock = GenerationClock::new();
        assert_eq!(clock.current(), 0);

        let first = clock.bump();
        let second = clock.bump();
        assert_eq!(first, 1);
        assert_eq!(second, 2);
        assert!(clock.is_current(2));
        assert!(!clock.is_current(1));
    }

    #[test]
    fn test_clones_share_state() {
        let clock = GenerationClock::new();
        let observer = clock.clone();

        clock.bump();
        clock.bump();

        assert_eq!(observer.current(), 2);
    }
}
