//! Frame-budgeted work queue.
//!
//! Packing work is submitted during a frame and drained inside the per-frame
//! update under a wall-clock budget, so a burst of newly visible images
//! cannot stall a single frame. Items not reached within the budget are
//! handed back to the caller; re-submitting them on the next frame is the
//! caller's responsibility, not the queue's.

use std::time::{Duration, Instant};

use tracing::{debug, trace};

/// A unit of deferred work executed against a context of type `Ctx`.
pub trait QueuedWork<Ctx> {
    /// Identifier used to cancel the item before it runs.
    fn work_id(&self) -> u64;

    fn run(self: Box<Self>, ctx: &mut Ctx);
}

/// What one queue tick did.
pub struct TickOutcome<Ctx> {
    /// Items executed this tick.
    pub processed: usize,
    /// Items the budget did not reach, in the order they would have run.
    /// The caller decides whether each is still relevant and re-adds it.
    pub abandoned: Vec<Box<dyn QueuedWork<Ctx>>>,
    pub elapsed: Duration,
}

/// A flat LIFO queue drained under a per-tick time budget.
///
/// Newest items run first, favoring work requested most recently (an image
/// that just scrolled into view beats one queued several frames ago).
pub struct OperationQueue<Ctx> {
    items: Vec<Box<dyn QueuedWork<Ctx>>>,
    budget: Duration,
}

impl<Ctx> OperationQueue<Ctx> {
    pub const DEFAULT_BUDGET: Duration = Duration::from_millis(10);

    pub fn new() -> Self {
        Self::with_budget(Self::DEFAULT_BUDGET)
    }

    pub fn with_budget(budget: Duration) -> Self {
        Self { items: Vec::new(), budget }
    }

    pub fn budget(&self) -> Duration {
        self.budget
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn add(&mut self, work: Box<dyn QueuedWork<Ctx>>) {
        trace!(work_id = work.work_id(), queued = self.items.len() + 1, "work queued");
        self.items.push(work);
    }

    /// Remove every queued item with the given id without running it.
    /// Returns how many were removed.
    pub fn cancel(&mut self, work_id: u64) -> usize {
        let before = self.items.len();
        self.items.retain(|w| w.work_id() != work_id);
        before - self.items.len()
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    /// Run queued items newest-first until the queue empties or the budget
    /// elapses. The first item always runs, so a tick makes progress even
    /// under a zero budget; the budget is checked after each item.
    pub fn update(&mut self, ctx: &mut Ctx) -> TickOutcome<Ctx> {
        let start = Instant::now();
        let mut processed = 0;

        while let Some(work) = self.items.pop() {
            work.run(ctx);
            processed += 1;
            if start.elapsed() >= self.budget {
                break;
            }
        }

        let elapsed = start.elapsed();
        // Hand back whatever the budget did not reach, newest-first to match
        // the order they would have run in.
        let mut abandoned = Vec::with_capacity(self.items.len());
        while let Some(work) = self.items.pop() {
            abandoned.push(work);
        }
        if !abandoned.is_empty() {
            debug!(processed, abandoned = abandoned.len(), ?elapsed, "tick budget exhausted");
        }
        TickOutcome { processed, abandoned, elapsed }
    }
}

impl<Ctx> Default for OperationQueue<Ctx> {
    fn default() -> Self {
        Self::new()
    }
}

impl<Ctx> std::fmt::Debug for OperationQueue<Ctx> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OperationQueue")
            .field("items", &self.items.len())
            .field("budget", &self.budget)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Tag(u64);

    impl QueuedWork<Vec<u64>> for Tag {
        fn work_id(&self) -> u64 {
            self.0
        }

        fn run(self: Box<Self>, log: &mut Vec<u64>) {
            log.push(self.0);
        }
    }

    #[test]
    fn test_newest_items_run_first() {
        let mut queue: OperationQueue<Vec<u64>> = OperationQueue::new();
        for id in 1..=3 {
            queue.add(Box::new(Tag(id)));
        }

        let mut log = Vec::new();
        let outcome = queue.update(&mut log);
        assert_eq!(outcome.processed, 3);
        assert!(outcome.abandoned.is_empty());
        assert_eq!(log, vec![3, 2, 1]);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_cancel_removes_without_running() {
        let mut queue: OperationQueue<Vec<u64>> = OperationQueue::new();
        queue.add(Box::new(Tag(7)));
        queue.add(Box::new(Tag(8)));
        queue.add(Box::new(Tag(7)));

        assert_eq!(queue.cancel(7), 2);
        let mut log = Vec::new();
        queue.update(&mut log);
        assert_eq!(log, vec![8]);
    }

    #[test]
    fn test_zero_budget_still_makes_progress() {
        let mut queue: OperationQueue<Vec<u64>> = OperationQueue::with_budget(Duration::ZERO);
        for id in 1..=4 {
            queue.add(Box::new(Tag(id)));
        }

        let mut log = Vec::new();
        let outcome = queue.update(&mut log);
        assert_eq!(outcome.processed, 1);
        assert_eq!(log, vec![4]);
        assert_eq!(outcome.abandoned.len(), 3);
        assert!(queue.is_empty(), "unreached items leave the queue");

        // Abandoned items come back in the order they would have run.
        let ids: Vec<u64> = outcome.abandoned.iter().map(|w| w.work_id()).collect();
        assert_eq!(ids, vec![3, 2, 1]);
    }
}
