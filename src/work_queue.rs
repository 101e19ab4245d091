//! C5 — Parallel Work Queue.
//!
//! Schedules classpath elements across a rayon thread pool while preserving
//! the notion of a `scanOrderKey`-ordered result set. Grounded in the
//! teacher's `Engine::analyze` (`engine.rs`), which fans a `Vec<AnalysisUnit>`
//! out over `rayon::prelude::par_iter` and collects back into a single
//! ordered `Vec`; generalized here to also admit *new* work discovered while
//! scanning (manifest `Class-Path` children), which `Engine::analyze`'s
//! static unit list never needed.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use crossbeam_channel::{unbounded, Receiver, Sender};
use rayon::prelude::*;
use tracing::warn;

use crate::classpath_element::child_order_key;

/// One unit of work submitted to the queue: an opaque seed plus the key it
/// should sort under in the final, shadow-resolved result.
pub struct WorkItem<T> {
    pub scan_order_key: String,
    pub seed: T,
}

/// Outcome of processing one [`WorkItem`]: the produced value plus any
/// further work it spawned (manifest-linked children), which get
/// `parentKey + "." + zeroPaddedIndex` keys.
pub struct WorkOutcome<T, O> {
    pub output: O,
    pub children: Vec<T>,
}

/// Coordinates a parallel, possibly-multi-round scan: each round processes
/// the current batch with rayon, collects spawned children, and repeats
/// until no round produces new work. A shared `killed` flag lets a fatal
/// error in one unit short-circuit the rest.
pub struct WorkQueue {
    killed: Arc<AtomicBool>,
    pending: Arc<AtomicUsize>,
}

impl WorkQueue {
    pub fn new() -> Self {
        Self {
            killed: Arc::new(AtomicBool::new(false)),
            pending: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn is_killed(&self) -> bool {
        self.killed.load(Ordering::SeqCst)
    }

    pub fn kill_all(&self) {
        self.killed.store(true, Ordering::SeqCst);
    }

    pub fn pending_count(&self) -> usize {
        self.pending.load(Ordering::SeqCst)
    }

    /// Run `process` over `seeds` to a fixed point, expanding children in
    /// breadth-first rounds, then return every produced output ordered by
    /// `scan_order_key`. Final re-ordering and shadowing happen in the
    /// caller, which also needs access to identity for dedup — this just
    /// guarantees key-sorted output.
    pub fn run<T, O, F>(&self, seeds: Vec<WorkItem<T>>, process: F) -> Vec<(String, O)>
    where
        T: Send,
        O: Send,
        F: Fn(&T) -> anyhow::Result<WorkOutcome<T, O>> + Sync,
    {
        let mut results: Vec<(String, O)> = Vec::new();
        let mut frontier = seeds;
        self.pending.store(frontier.len(), Ordering::SeqCst);

        while !frontier.is_empty() {
            if self.is_killed() {
                warn!("work queue killed; abandoning {} pending items", frontier.len());
                break;
            }

            let outcomes: Vec<(String, Option<WorkOutcome<T, O>>)> = frontier
                .par_iter()
                .map(|item| {
                    if self.is_killed() {
                        return (item.scan_order_key.clone(), None);
                    }
                    match process(&item.seed) {
                        Ok(outcome) => (item.scan_order_key.clone(), Some(outcome)),
                        Err(err) => {
                            warn!(key = %item.scan_order_key, error = %err, "work item failed");
                            (item.scan_order_key.clone(), None)
                        }
                    }
                })
                .collect();

            self.pending.fetch_sub(frontier.len(), Ordering::SeqCst);

            let mut next_frontier = Vec::new();
            for (key, outcome) in outcomes {
                let Some(outcome) = outcome else { continue };
                for (index, child_seed) in outcome.children.into_iter().enumerate() {
                    next_frontier.push(WorkItem {
                        scan_order_key: child_order_key(&key, index),
                        seed: child_seed,
                    });
                }
                results.push((key, outcome.output));
            }

            self.pending.fetch_add(next_frontier.len(), Ordering::SeqCst);
            frontier = next_frontier;
        }

        results.sort_by(|a, b| a.0.cmp(&b.0));
        results
    }
}

impl Default for WorkQueue {
    fn default() -> Self {
        Self::new()
    }
}

/// Lightweight handle pair for callers that want to drive cancellation from
/// outside the queue (e.g. a signal handler or a timeout).
pub fn cancellation_channel() -> (Sender<()>, Receiver<()>) {
    unbounded()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize as StdAtomicUsize;

    #[test]
    fn processes_seeds_and_sorts_by_key() {
        let queue = WorkQueue::new();
        let seeds = vec![
            WorkItem { scan_order_key: "001".to_string(), seed: 1u32 },
            WorkItem { scan_order_key: "000".to_string(), seed: 0u32 },
        ];
        let results = queue.run(seeds, |seed| {
            Ok(WorkOutcome { output: *seed * 10, children: Vec::new() })
        });
        let keys: Vec<_> = results.iter().map(|(k, _)| k.clone()).collect();
        assert_eq!(keys, vec!["000".to_string(), "001".to_string()]);
        assert_eq!(results[0].1, 0);
        assert_eq!(results[1].1, 10);
    }

    #[test]
    fn expands_children_across_rounds() {
        let queue = WorkQueue::new();
        let seeds = vec![WorkItem { scan_order_key: "000".to_string(), seed: 2u32 }];
        let results = queue.run(seeds, |seed| {
            let children = if *seed > 0 { vec![*seed - 1] } else { Vec::new() };
            Ok(WorkOutcome { output: *seed, children })
        });
        assert_eq!(results.len(), 3);
        let outputs: Vec<_> = results.iter().map(|(_, v)| *v).collect();
        assert_eq!(outputs, vec![0, 1, 2]);
    }

    #[test]
    fn kill_all_stops_subsequent_rounds() {
        let queue = WorkQueue::new();
        let processed = Arc::new(StdAtomicUsize::new(0));
        let seeds = vec![WorkItem { scan_order_key: "000".to_string(), seed: 5u32 }];
        let processed_clone = processed.clone();
        let killed_flag = queue.killed.clone();
        let results = queue.run(seeds, move |seed| {
            processed_clone.fetch_add(1, Ordering::SeqCst);
            killed_flag.store(true, Ordering::SeqCst);
            let children = if *seed > 0 { vec![*seed - 1] } else { Vec::new() };
            Ok(WorkOutcome { output: *seed, children })
        });
        assert_eq!(processed.load(Ordering::SeqCst), 1);
        assert_eq!(results.len(), 1);
    }

    #[test]
    fn pending_count_reaches_zero_when_done() {
        let queue = WorkQueue::new();
        let seeds = vec![WorkItem { scan_order_key: "000".to_string(), seed: 0u32 }];
        let _ = queue.run(seeds, |seed| Ok(WorkOutcome { output: *seed, children: Vec::new() }));
        assert_eq!(queue.pending_count(), 0);
    }
}
