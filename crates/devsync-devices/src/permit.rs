//! Counter permits that release when dropped.

use std::sync::atomic::{AtomicUsize, Ordering};

/// Holds one unit of a shared counter until dropped.
///
/// Used for the throttler's in-flight count and the synchronizer's write
/// suppression guard: the count goes back down when the holder finishes,
/// fails, or its future is cancelled.
#[derive(Debug)]
pub(crate) struct CountPermit<'a> {
    counter: &'a AtomicUsize,
    /// Counter value before this permit was taken
    position: usize,
}

impl<'a> CountPermit<'a> {
    pub(crate) fn acquire(counter: &'a AtomicUsize) -> Self {
        let position = counter.fetch_add(1, Ordering::SeqCst);
        Self { counter, position }
    }

    pub(crate) fn position(&self) -> usize {
        self.position
    }
}

impl Drop for CountPermit<'_> {
    fn drop(&mut self) {
        self.counter.fetch_sub(1, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_permits_count_and_release() {
        let counter = AtomicUsize::new(0);

        let first = CountPermit::acquire(&counter);
        let second = CountPermit::acquire(&counter);
        assert_eq!(first.position(), 0);
        assert_eq!(second.position(), 1);
        assert_eq!(counter.load(Ordering::SeqCst), 2);

        drop(first);
        assert_eq!(counter.load(Ordering::SeqCst), 1);
        drop(second);
        assert_eq!(counter.load(Ordering::SeqCst), 0);
    }
}
